//! Transport layer for CAN socket access
//!
//! This module provides the syscall surface a [`CanSocket`](crate::CanSocket)
//! delegates to:
//! - SocketCAN transport over the kernel `AF_CAN` family (Linux only)
//! - Mock transport for testing
//!
//! # Example
//!
//! ```ignore
//! use cansock::transport::create_transport;
//! use cansock::config::TransportConfig;
//! use cansock::{CanSocket, SocketMode};
//!
//! let transport = create_transport(&TransportConfig::SocketCan)?;
//! let socket = CanSocket::open(transport, SocketMode::Raw)?;
//! ```

mod adapter;
pub mod error;
pub mod mock;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

pub use adapter::{BusTransport, ProtocolConstants, TransportHandle};
pub use error::TransportError;

use std::sync::Arc;

use crate::config::TransportConfig;

/// Create a transport based on configuration
pub fn create_transport(config: &TransportConfig) -> Result<Arc<dyn BusTransport>, TransportError> {
    match config {
        #[cfg(all(target_os = "linux", feature = "socketcan"))]
        TransportConfig::SocketCan => Ok(Arc::new(socketcan::SocketCanTransport::new())),
        #[cfg(not(all(target_os = "linux", feature = "socketcan")))]
        TransportConfig::SocketCan => Err(TransportError::Unsupported(
            "SocketCAN requires Linux and the 'socketcan' feature".to_string(),
        )),
        TransportConfig::Mock(cfg) => Ok(Arc::new(mock::MockTransport::new(cfg))),
    }
}
