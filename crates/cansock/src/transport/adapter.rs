//! Bus transport trait and types

use std::fmt;

use super::TransportError;
use crate::frame::RawFrame;

/// Opaque handle to one open transport socket
///
/// Transports allocate handles uniquely and never hand a released handle
/// out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportHandle(i32);

impl TransportHandle {
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Protocol constants of the SocketCAN ABI
///
/// Populated once when a transport is constructed and read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConstants {
    /// Size of a classic `can_frame` / MTU of a classic interface
    pub can_mtu: usize,
    /// Size of a `canfd_frame` / MTU of an FD-capable interface
    pub canfd_mtu: usize,
    /// `CAN_RAW_FILTER` option id
    pub raw_filter: i32,
    /// `CAN_RAW_ERR_FILTER` option id
    pub raw_err_filter: i32,
    /// `CAN_RAW_LOOPBACK` option id
    pub raw_loopback: i32,
    /// `CAN_RAW_RECV_OWN_MSGS` option id
    pub raw_recv_own_msgs: i32,
    /// `CAN_RAW_FD_FRAMES` option id
    pub raw_fd_frames: i32,
}

impl ProtocolConstants {
    /// Values from `<linux/can.h>` and `<linux/can/raw.h>`
    pub const LINUX: ProtocolConstants = ProtocolConstants {
        can_mtu: 16,
        canfd_mtu: 72,
        raw_filter: 1,
        raw_err_filter: 2,
        raw_loopback: 3,
        raw_recv_own_msgs: 4,
        raw_fd_frames: 5,
    };
}

impl Default for ProtocolConstants {
    fn default() -> Self {
        Self::LINUX
    }
}

/// The syscall surface a [`CanSocket`](crate::CanSocket) is built on
///
/// Every method maps to one kernel operation. Implementations must not
/// retry, buffer or swallow errors. `recv` may block indefinitely; closing
/// the same handle from another thread must make it return an error. Once
/// closed, a handle must fail every call with [`TransportError::Closed`].
pub trait BusTransport: Send + Sync {
    /// Protocol constants for this transport
    fn constants(&self) -> &ProtocolConstants;

    /// Open a raw CAN socket
    fn open_raw(&self) -> Result<TransportHandle, TransportError>;

    /// Open a broadcast manager socket
    fn open_bcm(&self) -> Result<TransportHandle, TransportError>;

    /// Release a handle
    fn close(&self, handle: TransportHandle) -> Result<(), TransportError>;

    /// Bind a handle to an interface index (0 = all interfaces)
    fn bind(&self, handle: TransportHandle, ifindex: u32) -> Result<(), TransportError>;

    /// Transmit one frame on the interface named by `frame.ifindex`
    fn send(&self, handle: TransportHandle, frame: &RawFrame) -> Result<(), TransportError>;

    /// Block until one frame arrives
    fn recv(&self, handle: TransportHandle) -> Result<RawFrame, TransportError>;

    /// Interface name to index
    fn resolve_index(&self, handle: TransportHandle, name: &str) -> Result<u32, TransportError>;

    /// Interface index to name
    fn resolve_name(&self, handle: TransportHandle, index: u32) -> Result<String, TransportError>;

    /// MTU the named interface reports
    fn fetch_mtu(&self, handle: TransportHandle, name: &str) -> Result<i32, TransportError>;

    /// Set an integer `SOL_CAN_RAW` option
    fn set_sockopt(
        &self,
        handle: TransportHandle,
        option: i32,
        value: i32,
    ) -> Result<(), TransportError>;

    /// Read an integer `SOL_CAN_RAW` option
    fn get_sockopt(&self, handle: TransportHandle, option: i32) -> Result<i32, TransportError>;
}
