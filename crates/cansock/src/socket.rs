//! CAN socket lifecycle
//!
//! ```text
//!            open(mode)            bind(iface)
//!   ∅ ───────────────────▶ Open ─────────────────▶ Bound ──┐
//!                            │                       ▲     │ bind(iface)
//!                            │                       └─────┘ (last bind wins)
//!                            │ close()                 │ close()
//!                            ▼                         ▼
//!                          Closed ◀────────────────────┘
//! ```
//!
//! Each operation issues exactly one transport call; nothing is buffered or
//! retried. A `CanSocket` is not internally synchronized: `recv` may run on
//! one thread while another sends through a shared reference, but state
//! changes (`bind`, `set_option`, `close`) need `&mut self`. To unblock a
//! pending `recv` from another thread, take a [`SocketCloser`] with
//! [`CanSocket::closer`] and close through it; the socket is then `Closed`
//! and refuses every further operation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::error::{CanSocketError, Result};
use crate::frame::{CanFrame, FrameKind};
use crate::id::CanId;
use crate::interface::CanInterface;
use crate::transport::{BusTransport, TransportError, TransportHandle};

/// Protocol a socket is opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketMode {
    /// Raw frame access (`CAN_RAW`)
    Raw,
    /// Broadcast manager (`CAN_BCM`)
    Bcm,
}

impl fmt::Display for SocketMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketMode::Raw => f.write_str("RAW"),
            SocketMode::Bcm => f.write_str("BCM"),
        }
    }
}

/// Boolean `SOL_CAN_RAW` socket options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketOption {
    /// Echo locally transmitted frames to other local sockets
    Loopback,
    /// Deliver this socket's own transmitted frames to its receive queue
    RecvOwnMsgs,
    /// Accept and emit CAN FD frames
    FdFrames,
}

impl fmt::Display for SocketOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SocketOption::Loopback => "CAN_RAW_LOOPBACK",
            SocketOption::RecvOwnMsgs => "CAN_RAW_RECV_OWN_MSGS",
            SocketOption::FdFrames => "CAN_RAW_FD_FRAMES",
        };
        f.write_str(s)
    }
}

/// Where a socket is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketState {
    /// Handle valid, never bound
    Open,
    /// Handle valid, bound to this interface
    Bound(CanInterface),
    /// Handle released
    Closed,
}

/// A raw or BCM CAN socket over a [`BusTransport`]
pub struct CanSocket {
    transport: Arc<dyn BusTransport>,
    handle: TransportHandle,
    mode: SocketMode,
    state: SocketState,
    closed: Arc<AtomicBool>,
    fd_frames: bool,
}

impl CanSocket {
    /// Open a new socket of the given mode
    pub fn open(transport: Arc<dyn BusTransport>, mode: SocketMode) -> Result<Self> {
        let opened = match mode {
            SocketMode::Raw => transport.open_raw(),
            SocketMode::Bcm => transport.open_bcm(),
        };
        let handle = opened.map_err(|source| CanSocketError::Open { mode, source })?;
        debug!(%mode, %handle, "CAN socket opened");

        Ok(Self {
            transport,
            handle,
            mode,
            state: SocketState::Open,
            closed: Arc::new(AtomicBool::new(false)),
            fd_frames: false,
        })
    }

    /// Bind to an interface, replacing any previous binding
    pub fn bind(&mut self, interface: &CanInterface) -> Result<()> {
        self.ensure_open()?;
        self.transport
            .bind(self.handle, interface.index())
            .map_err(|source| CanSocketError::Bind {
                index: interface.index(),
                source,
            })?;
        debug!(handle = %self.handle, ifindex = interface.index(), "CAN socket bound");
        self.state = SocketState::Bound(interface.clone());
        Ok(())
    }

    /// Transmit one frame on the frame's interface
    pub fn send(&self, frame: &CanFrame) -> Result<()> {
        self.ensure_open()?;
        if frame.kind() == FrameKind::Fd && !self.fd_frames {
            return Err(CanSocketError::FdNotEnabled);
        }
        trace!(
            handle = %self.handle,
            ifindex = frame.interface().index(),
            can_id = %frame.id(),
            len = frame.len(),
            "Sending CAN frame"
        );
        self.transport
            .send(self.handle, &frame.to_raw())
            .map_err(CanSocketError::Send)
    }

    /// Block until a frame arrives
    ///
    /// The frame's interface carries only the index; use
    /// [`CanInterface::resolved`] to look up its name.
    pub fn recv(&self) -> Result<CanFrame> {
        self.ensure_open()?;
        let raw = self
            .transport
            .recv(self.handle)
            .map_err(CanSocketError::Receive)?;
        trace!(
            handle = %self.handle,
            ifindex = raw.ifindex,
            can_id = %CanId::new(raw.can_id),
            len = raw.data.len(),
            "Received CAN frame"
        );
        CanFrame::from_raw(raw)
    }

    /// MTU of the named interface, either the classic or the FD frame size
    ///
    /// Any other value is reported as `UnexpectedMtu`.
    pub fn mtu(&self, name: &str) -> Result<usize> {
        self.ensure_open()?;
        let mtu = self
            .transport
            .fetch_mtu(self.handle, name)
            .map_err(|source| CanSocketError::Mtu {
                name: name.to_string(),
                source,
            })?;
        let constants = self.transport.constants();
        match usize::try_from(mtu) {
            Ok(value) if value == constants.can_mtu || value == constants.canfd_mtu => Ok(value),
            _ => Err(CanSocketError::UnexpectedMtu {
                name: name.to_string(),
                mtu,
            }),
        }
    }

    /// Whether the named interface reports the FD frame MTU
    pub fn is_fd_capable(&self, name: &str) -> Result<bool> {
        Ok(self.mtu(name)? == self.transport.constants().canfd_mtu)
    }

    pub fn set_option(&mut self, option: SocketOption, on: bool) -> Result<()> {
        self.ensure_open()?;
        let id = self.option_id(option);
        self.transport
            .set_sockopt(self.handle, id, i32::from(on))
            .map_err(|source| CanSocketError::Option { option, source })?;
        debug!(handle = %self.handle, %option, on, "Socket option set");
        if option == SocketOption::FdFrames {
            self.fd_frames = on;
        }
        Ok(())
    }

    pub fn option(&self, option: SocketOption) -> Result<bool> {
        self.ensure_open()?;
        let id = self.option_id(option);
        let value = self
            .transport
            .get_sockopt(self.handle, id)
            .map_err(|source| CanSocketError::Option { option, source })?;
        Ok(value == 1)
    }

    pub fn set_loopback(&mut self, on: bool) -> Result<()> {
        self.set_option(SocketOption::Loopback, on)
    }

    pub fn loopback(&self) -> Result<bool> {
        self.option(SocketOption::Loopback)
    }

    pub fn set_recv_own_msgs(&mut self, on: bool) -> Result<()> {
        self.set_option(SocketOption::RecvOwnMsgs, on)
    }

    pub fn recv_own_msgs(&self) -> Result<bool> {
        self.option(SocketOption::RecvOwnMsgs)
    }

    pub fn set_fd_frames(&mut self, on: bool) -> Result<()> {
        self.set_option(SocketOption::FdFrames, on)
    }

    pub fn fd_frames(&self) -> Result<bool> {
        self.option(SocketOption::FdFrames)
    }

    /// Release the transport handle
    ///
    /// A second call returns `AlreadyClosed`. The socket is considered
    /// closed even if the transport reports an error.
    pub fn close(&mut self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(CanSocketError::AlreadyClosed);
        }
        self.state = SocketState::Closed;
        self.transport
            .close(self.handle)
            .map_err(CanSocketError::Close)?;
        debug!(handle = %self.handle, "CAN socket closed");
        Ok(())
    }

    /// Name of the interface with the given index, `None` if it cannot be resolved
    pub fn interface_name(&self, index: u32) -> Option<String> {
        if self.is_closed() {
            return None;
        }
        match self.transport.resolve_name(self.handle, index) {
            Ok(name) => Some(name),
            Err(e) => {
                debug!(index, error = %e, "Interface name not resolved");
                None
            }
        }
    }

    pub fn mode(&self) -> SocketMode {
        self.mode
    }

    pub fn state(&self) -> SocketState {
        if self.is_closed() {
            return SocketState::Closed;
        }
        self.state.clone()
    }

    /// Interface of the most recent successful bind
    pub fn bound_interface(&self) -> Option<&CanInterface> {
        if self.is_closed() {
            return None;
        }
        match &self.state {
            SocketState::Bound(interface) => Some(interface),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// A closer that shares this socket's lifecycle, for use on another thread
    pub fn closer(&self) -> SocketCloser {
        SocketCloser {
            transport: self.transport.clone(),
            handle: self.handle,
            closed: self.closed.clone(),
        }
    }

    /// Underlying transport handle
    pub fn handle(&self) -> TransportHandle {
        self.handle
    }

    pub fn transport(&self) -> &Arc<dyn BusTransport> {
        &self.transport
    }

    fn option_id(&self, option: SocketOption) -> i32 {
        let constants = self.transport.constants();
        match option {
            SocketOption::Loopback => constants.raw_loopback,
            SocketOption::RecvOwnMsgs => constants.raw_recv_own_msgs,
            SocketOption::FdFrames => constants.raw_fd_frames,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(CanSocketError::AlreadyClosed);
        }
        Ok(())
    }
}

impl fmt::Debug for CanSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanSocket")
            .field("handle", &self.handle)
            .field("mode", &self.mode)
            .field("state", &self.state())
            .field("fd_frames", &self.fd_frames)
            .finish()
    }
}

impl Drop for CanSocket {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.transport.close(self.handle) {
            Ok(()) => {}
            Err(TransportError::Closed) => {
                debug!(handle = %self.handle, "Handle already released by the transport");
            }
            Err(e) => {
                warn!(handle = %self.handle, error = %e, "Failed to close CAN socket on drop");
            }
        }
    }
}

/// Closes a [`CanSocket`] from another thread
///
/// A `recv` blocked on the socket returns `Receive(Closed)`; every later
/// operation on the socket, including a second close through either side,
/// returns `AlreadyClosed`.
#[derive(Clone)]
pub struct SocketCloser {
    transport: Arc<dyn BusTransport>,
    handle: TransportHandle,
    closed: Arc<AtomicBool>,
}

impl SocketCloser {
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(CanSocketError::AlreadyClosed);
        }
        self.transport
            .close(self.handle)
            .map_err(CanSocketError::Close)?;
        debug!(handle = %self.handle, "CAN socket closed by closer");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for SocketCloser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketCloser")
            .field("handle", &self.handle)
            .field("closed", &self.is_closed())
            .finish()
    }
}
