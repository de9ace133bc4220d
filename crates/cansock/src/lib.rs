//! cansock - SocketCAN raw and BCM socket access
//!
//! This crate provides typed access to CAN buses through the kernel
//! `AF_CAN` socket family: identifier words with their flag bits, frames,
//! interface handles, and a socket with bind/send/recv and option control.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        CanSocket                            │
//! │  Open ──bind──▶ Bound ──close──▶ Closed                     │
//! │                                                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │ CanId       │  │CanInterface │  │ CanFrame            │  │
//! │  │ (flag bits) │  │ (index/name)│  │ (classic / FD)      │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! │                          │                                  │
//! │                 ┌────────┴────────┐                         │
//! │                 │  BusTransport   │                         │
//! │                 │ (SocketCAN/mock)│                         │
//! │                 └─────────────────┘                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cansock::config::TransportConfig;
//! use cansock::transport::create_transport;
//! use cansock::{CanFrame, CanId, CanInterface, CanSocket, SocketMode};
//!
//! let transport = create_transport(&TransportConfig::SocketCan)?;
//! let mut socket = CanSocket::open(transport, SocketMode::Raw)?;
//! let can0 = CanInterface::lookup(&socket, "can0")?;
//! socket.bind(&can0)?;
//! socket.send(&CanFrame::new(can0, CanId::new(0x30001).set_eff(), [0x00, 0x91])?)?;
//! let reply = socket.recv()?;
//! ```

pub mod config;
pub mod error;
pub mod frame;
pub mod id;
pub mod interface;
pub mod socket;
pub mod transport;

pub use config::TransportConfig;
pub use error::{CanSocketError, Result};
pub use frame::{CanFrame, FrameKind, RawFrame, CANFD_MAX_DLEN, CAN_MAX_DLEN};
pub use id::{CanId, IdFlag};
pub use interface::{CanInterface, ALL_INTERFACES};
pub use socket::{CanSocket, SocketCloser, SocketMode, SocketOption, SocketState};
pub use transport::{create_transport, BusTransport, ProtocolConstants, TransportError};

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use transport::socketcan::SocketCanTransport;
