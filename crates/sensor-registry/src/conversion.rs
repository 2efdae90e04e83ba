//! Raw-to-physical conversion formulas

use serde::{Deserialize, Serialize};

/// Formula turning an unconverted raw magnitude into a physical quantity.
///
/// Every sensor table entry carries one of these instead of a closure so the
/// tables stay `const` and comparable in tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Conversion {
    /// raw
    Identity,
    /// raw + offset
    Offset(f64),
    /// raw * factor
    Scale(f64),
    /// raw / divisor
    Divide(f64),
    /// raw * scale + offset
    Linear { scale: f64, offset: f64 },
    /// (raw + offset) * scale
    OffsetScale { offset: f64, scale: f64 },
    /// numerator / raw
    Reciprocal(f64),
}

impl Conversion {
    /// Apply the formula. The result may be non-finite (e.g. a reciprocal of zero);
    /// callers decide how to treat that.
    pub fn apply(&self, raw: f64) -> f64 {
        match *self {
            Conversion::Identity => raw,
            Conversion::Offset(offset) => raw + offset,
            Conversion::Scale(factor) => raw * factor,
            Conversion::Divide(divisor) => raw / divisor,
            Conversion::Linear { scale, offset } => raw * scale + offset,
            Conversion::OffsetScale { offset, scale } => (raw + offset) * scale,
            Conversion::Reciprocal(numerator) => numerator / raw,
        }
    }
}

impl Default for Conversion {
    fn default() -> Self {
        Conversion::Identity
    }
}
