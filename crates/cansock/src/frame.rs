//! CAN frames
//!
//! [`CanFrame`] is the validated, interface-aware frame callers work with.
//! [`RawFrame`] is the flat form handed to and from a
//! [`BusTransport`](crate::transport::BusTransport).

use std::fmt;

use crate::error::{CanSocketError, Result};
use crate::id::CanId;
use crate::interface::CanInterface;

/// Maximum payload of a classic CAN frame
pub const CAN_MAX_DLEN: usize = 8;
/// Maximum payload of a CAN FD frame
pub const CANFD_MAX_DLEN: usize = 64;

/// Classic (≤ 8 bytes) or flexible data-rate (≤ 64 bytes) framing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FrameKind {
    #[default]
    Classic,
    Fd,
}

impl FrameKind {
    /// Largest payload this kind carries
    pub const fn max_len(self) -> usize {
        match self {
            FrameKind::Classic => CAN_MAX_DLEN,
            FrameKind::Fd => CANFD_MAX_DLEN,
        }
    }
}

/// Transport-level frame: interface index, raw identifier word and payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFrame {
    pub ifindex: u32,
    pub can_id: u32,
    pub data: Vec<u8>,
    pub kind: FrameKind,
}

/// An immutable CAN frame bound to an interface
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanFrame {
    interface: CanInterface,
    id: CanId,
    data: Vec<u8>,
    kind: FrameKind,
}

impl CanFrame {
    /// Classic frame; fails with `InvalidPayload` above 8 bytes
    pub fn new(interface: CanInterface, id: CanId, data: impl Into<Vec<u8>>) -> Result<Self> {
        Self::with_kind(interface, id, data.into(), FrameKind::Classic)
    }

    /// FD frame; fails with `InvalidPayload` above 64 bytes
    ///
    /// Sending one requires FD frames to be enabled on the socket.
    pub fn new_fd(interface: CanInterface, id: CanId, data: impl Into<Vec<u8>>) -> Result<Self> {
        Self::with_kind(interface, id, data.into(), FrameKind::Fd)
    }

    fn with_kind(interface: CanInterface, id: CanId, data: Vec<u8>, kind: FrameKind) -> Result<Self> {
        if data.len() > kind.max_len() {
            return Err(CanSocketError::InvalidPayload {
                len: data.len(),
                max: kind.max_len(),
            });
        }
        Ok(Self {
            interface,
            id,
            data,
            kind,
        })
    }

    /// Rebuild a frame from its transport form; the interface carries no name
    pub fn from_raw(raw: RawFrame) -> Result<Self> {
        Self::with_kind(
            CanInterface::from_index(raw.ifindex),
            CanId::new(raw.can_id),
            raw.data,
            raw.kind,
        )
    }

    /// Flatten into the transport form
    pub fn to_raw(&self) -> RawFrame {
        RawFrame {
            ifindex: self.interface.index(),
            can_id: self.id.raw(),
            data: self.data.clone(),
            kind: self.kind,
        }
    }

    pub fn interface(&self) -> &CanInterface {
        &self.interface
    }

    pub fn id(&self) -> CanId {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn is_fd(&self) -> bool {
        self.kind == FrameKind::Fd
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = match self.kind {
            FrameKind::Classic => format!("[{}]", self.data.len()),
            FrameKind::Fd => format!("[{:02}]", self.data.len()),
        };
        write!(f, "{}  {}   {}", self.interface, self.id, len)?;
        for byte in &self.data {
            write!(f, " {:02X}", byte)?;
        }
        Ok(())
    }
}
