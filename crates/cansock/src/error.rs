//! Socket-level errors

use thiserror::Error;

use crate::socket::{SocketMode, SocketOption};
use crate::transport::TransportError;

/// Result type for socket operations
pub type Result<T> = std::result::Result<T, CanSocketError>;

/// Errors returned by [`CanSocket`](crate::CanSocket) and the frame/interface types
///
/// Every variant except `InvalidPayload`, `FdNotEnabled`, `UnexpectedMtu`
/// and `AlreadyClosed` wraps the transport failure that caused it.
#[derive(Debug, Error)]
pub enum CanSocketError {
    /// Payload longer than the frame kind allows
    #[error("Invalid payload: {len} bytes exceeds maximum of {max}")]
    InvalidPayload { len: usize, max: usize },

    /// FD frame sent on a socket without FD frames enabled
    #[error("FD frame requires FD mode to be enabled on the socket")]
    FdNotEnabled,

    /// Interface name unknown to the system
    #[error("Interface not found: {name}")]
    InterfaceNotFound {
        name: String,
        #[source]
        source: TransportError,
    },

    /// Transport rejected the bind
    #[error("Failed to bind to interface index {index}")]
    Bind {
        index: u32,
        #[source]
        source: TransportError,
    },

    /// Transport could not allocate a socket
    #[error("Failed to open {mode} socket")]
    Open {
        mode: SocketMode,
        #[source]
        source: TransportError,
    },

    #[error("Send failed")]
    Send(#[source] TransportError),

    #[error("Receive failed")]
    Receive(#[source] TransportError),

    /// Transport rejected a get/set of a socket option
    #[error("Socket option {option} failed")]
    Option {
        option: SocketOption,
        #[source]
        source: TransportError,
    },

    /// Transport failed the MTU query
    #[error("Failed to fetch MTU of {name}")]
    Mtu {
        name: String,
        #[source]
        source: TransportError,
    },

    /// MTU is neither the classic nor the FD frame size
    #[error("Illegal interface MTU on {name}: {mtu}")]
    UnexpectedMtu { name: String, mtu: i32 },

    #[error("Failed to close socket")]
    Close(#[source] TransportError),

    #[error("Socket already closed")]
    AlreadyClosed,
}
