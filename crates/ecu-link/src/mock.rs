//! In-memory link for running without hardware

use crate::error::EcuError;
use crate::link::EcuLink;
use crate::protocol::LineSettings;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Something the mock link was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Reset,
    Purge,
    Configure { baud_rate: u32 },
    Break(bool),
    Write(Vec<u8>),
}

/// How the simulated device answers a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Make these bytes readable
    Bytes(Vec<u8>),
    /// Say nothing; reads stay pending
    Silence,
    /// Drop the link; later reads hit EOF and writes fail
    Disconnect,
}

type Responder = Box<dyn FnMut(&[u8]) -> MockReply + Send>;

/// Shared view of everything a [`MockLink`] recorded
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<LinkEvent>>>);

impl EventLog {
    fn push(&self, event: LinkEvent) {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }

    /// Snapshot of the recorded events
    pub fn events(&self) -> Vec<LinkEvent> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Payloads of every write, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LinkEvent::Write(bytes) => Some(bytes),
                _ => None,
            })
            .collect()
    }
}

/// Simulated ECU link driven by a responder closure
pub struct MockLink {
    responder: Responder,
    pending: VecDeque<u8>,
    log: EventLog,
    disconnected: bool,
}

impl MockLink {
    /// Create a link whose device answers every write through `responder`
    pub fn new<F>(responder: F) -> Self
    where
        F: FnMut(&[u8]) -> MockReply + Send + 'static,
    {
        Self {
            responder: Box::new(responder),
            pending: VecDeque::new(),
            log: EventLog::default(),
            disconnected: false,
        }
    }

    /// Answer successive writes with successive replies, then stay silent
    pub fn scripted(replies: Vec<MockReply>) -> Self {
        let mut replies = VecDeque::from(replies);
        Self::new(move |_| replies.pop_front().unwrap_or(MockReply::Silence))
    }

    /// A well-behaved ECU: answers the handshake with a two byte id and every
    /// two byte sensor request with `value(sensor_id)`.
    pub fn ecu<F>(mut value: F) -> Self
    where
        F: FnMut(u16) -> MockReply + Send + 'static,
    {
        Self::new(move |written| match written {
            [0xFF] => MockReply::Bytes(vec![0x4D]),
            [0xFE] => MockReply::Bytes(vec![0x55]),
            [hi, lo] => value(u16::from_be_bytes([*hi, *lo])),
            _ => MockReply::Silence,
        })
    }

    /// Handle for inspecting events after the link has been moved elsewhere
    pub fn event_log(&self) -> EventLog {
        self.log.clone()
    }
}

impl EcuLink for MockLink {
    fn reset(&mut self) -> Result<(), EcuError> {
        self.log.push(LinkEvent::Reset);
        Ok(())
    }

    fn purge(&mut self) -> Result<(), EcuError> {
        self.pending.clear();
        self.log.push(LinkEvent::Purge);
        Ok(())
    }

    fn configure(&mut self, settings: &LineSettings) -> Result<(), EcuError> {
        self.log.push(LinkEvent::Configure {
            baud_rate: settings.baud_rate,
        });
        Ok(())
    }

    fn set_break_condition(&mut self, asserted: bool) -> Result<(), EcuError> {
        self.log.push(LinkEvent::Break(asserted));
        Ok(())
    }
}

impl AsyncRead for MockLink {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.pending.is_empty() {
            // EOF once disconnected, otherwise wait; callers bound reads with a timeout
            return if this.disconnected {
                Poll::Ready(Ok(()))
            } else {
                Poll::Pending
            };
        }

        let count = buf.remaining().min(this.pending.len());
        let bytes: Vec<u8> = this.pending.drain(..count).collect();
        buf.put_slice(&bytes);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockLink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.disconnected {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock link disconnected",
            )));
        }

        this.log.push(LinkEvent::Write(buf.to_vec()));
        match (this.responder)(buf) {
            MockReply::Bytes(bytes) => this.pending.extend(bytes),
            MockReply::Silence => {}
            MockReply::Disconnect => this.disconnected = true,
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_scripted_replies() {
        let mut link = MockLink::scripted(vec![MockReply::Bytes(vec![1, 2])]);
        let log = link.event_log();

        link.write_all(&[0x00, 0x21]).await.unwrap();
        let mut buf = [0u8; 4];
        let n = link.read(&mut buf).await.unwrap();

        assert_eq!(&buf[..n], &[1, 2]);
        assert_eq!(log.writes(), vec![vec![0x00, 0x21]]);
    }

    #[tokio::test]
    async fn test_disconnect_gives_eof() {
        let mut link = MockLink::scripted(vec![MockReply::Disconnect]);
        link.write_all(&[0x00, 0x21]).await.unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(link.read(&mut buf).await.unwrap(), 0);
        assert!(link.write_all(&[0x00, 0x21]).await.is_err());
    }
}
