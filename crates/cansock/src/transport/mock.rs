//! Mock transport for testing
//!
//! Records what sockets do and serves frames queued by the test. It does
//! not route frames between sockets.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::{Condvar, Mutex};

use super::{BusTransport, ProtocolConstants, TransportError, TransportHandle};
use crate::config::{MockConfig, MockInterfaceConfig};
use crate::frame::{FrameKind, RawFrame};
use crate::socket::SocketMode;

const IFNAMSIZ: usize = 16;

/// Transport operations, for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Open,
    Close,
    Bind,
    Send,
    Recv,
    ResolveIndex,
    ResolveName,
    FetchMtu,
    SetSockopt,
    GetSockopt,
}

/// A frame accepted by [`MockTransport::send`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub handle: TransportHandle,
    /// The frame as transmitted; `ifindex` 0 is replaced by the bound interface
    pub frame: RawFrame,
}

#[derive(Debug)]
struct MockSocket {
    mode: SocketMode,
    bound: Option<u32>,
    options: HashMap<i32, i32>,
    inbox: VecDeque<RawFrame>,
    closed: bool,
}

#[derive(Debug, Default)]
struct MockState {
    sockets: HashMap<TransportHandle, MockSocket>,
    sent: Vec<SentFrame>,
    binds: Vec<(TransportHandle, u32)>,
    failures: HashMap<MockOp, TransportError>,
    calls: HashMap<MockOp, usize>,
}

impl MockState {
    /// Count the call and take any failure queued for it
    fn enter(&mut self, op: MockOp) -> Result<(), TransportError> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn socket(&mut self, handle: TransportHandle) -> Result<&mut MockSocket, TransportError> {
        match self.sockets.get_mut(&handle) {
            Some(socket) if !socket.closed => Ok(socket),
            _ => Err(TransportError::Closed),
        }
    }
}

/// In-memory [`BusTransport`]
pub struct MockTransport {
    constants: ProtocolConstants,
    interfaces: Vec<MockInterfaceConfig>,
    state: Mutex<MockState>,
    frame_ready: Condvar,
    next_handle: AtomicI32,
}

impl MockTransport {
    pub fn new(config: &MockConfig) -> Self {
        Self {
            constants: ProtocolConstants::LINUX,
            interfaces: config.interfaces.clone(),
            state: Mutex::new(MockState::default()),
            frame_ready: Condvar::new(),
            next_handle: AtomicI32::new(3),
        }
    }

    /// Queue a frame for the next `recv` on `handle`
    pub fn push_frame(&self, handle: TransportHandle, frame: RawFrame) {
        let mut state = self.state.lock();
        if let Some(socket) = state.sockets.get_mut(&handle) {
            socket.inbox.push_back(frame);
        }
        self.frame_ready.notify_all();
    }

    /// Make the next call of `op` fail with `error`
    pub fn fail_next(&self, op: MockOp, error: TransportError) {
        self.state.lock().failures.insert(op, error);
    }

    /// Frames accepted so far, oldest first
    pub fn sent_frames(&self) -> Vec<SentFrame> {
        self.state.lock().sent.clone()
    }

    /// Successful binds so far, oldest first
    pub fn binds(&self) -> Vec<(TransportHandle, u32)> {
        self.state.lock().binds.clone()
    }

    /// Interface index `handle` is currently bound to
    pub fn bound_index(&self, handle: TransportHandle) -> Option<u32> {
        self.state
            .lock()
            .sockets
            .get(&handle)
            .and_then(|socket| socket.bound)
    }

    /// Whether `handle` was opened and not yet closed
    pub fn is_open(&self, handle: TransportHandle) -> bool {
        self.state
            .lock()
            .sockets
            .get(&handle)
            .is_some_and(|socket| !socket.closed)
    }

    /// Mode `handle` was opened with
    pub fn mode(&self, handle: TransportHandle) -> Option<SocketMode> {
        self.state.lock().sockets.get(&handle).map(|socket| socket.mode)
    }

    /// Number of times `op` was invoked, failed calls included
    pub fn calls(&self, op: MockOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Total number of transport calls
    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.values().sum()
    }

    fn open(&self, mode: SocketMode) -> Result<TransportHandle, TransportError> {
        let mut state = self.state.lock();
        state.enter(MockOp::Open)?;

        let handle = TransportHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let mut options = HashMap::new();
        if mode == SocketMode::Raw {
            options.insert(self.constants.raw_loopback, 1);
            options.insert(self.constants.raw_recv_own_msgs, 0);
            options.insert(self.constants.raw_fd_frames, 0);
        }
        state.sockets.insert(
            handle,
            MockSocket {
                mode,
                bound: None,
                options,
                inbox: VecDeque::new(),
                closed: false,
            },
        );
        tracing::debug!(%handle, ?mode, "Mock transport: opened socket");
        Ok(handle)
    }

    fn find_by_name(&self, name: &str) -> Result<&MockInterfaceConfig, TransportError> {
        if name.len() > IFNAMSIZ - 1 {
            return Err(TransportError::InvalidArgument(format!(
                "illegal interface name: {}",
                name
            )));
        }
        self.interfaces
            .iter()
            .find(|iface| iface.name == name)
            .ok_or_else(|| no_such_device(name))
    }

    fn is_known_index(&self, index: u32) -> bool {
        self.interfaces.iter().any(|iface| iface.index == index)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new(&MockConfig::default())
    }
}

fn no_such_device(what: impl std::fmt::Display) -> TransportError {
    TransportError::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("No such device: {}", what),
    ))
}

fn not_supported(what: &str) -> TransportError {
    TransportError::Io(io::Error::new(io::ErrorKind::Unsupported, what.to_string()))
}

impl BusTransport for MockTransport {
    fn constants(&self) -> &ProtocolConstants {
        &self.constants
    }

    fn open_raw(&self) -> Result<TransportHandle, TransportError> {
        self.open(SocketMode::Raw)
    }

    fn open_bcm(&self) -> Result<TransportHandle, TransportError> {
        self.open(SocketMode::Bcm)
    }

    fn close(&self, handle: TransportHandle) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.enter(MockOp::Close)?;
        state.socket(handle)?.closed = true;
        // wake receivers blocked on this handle
        self.frame_ready.notify_all();
        Ok(())
    }

    fn bind(&self, handle: TransportHandle, ifindex: u32) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.enter(MockOp::Bind)?;
        let socket = state.socket(handle)?;
        if ifindex != 0 && !self.is_known_index(ifindex) {
            return Err(no_such_device(ifindex));
        }
        if socket.mode == SocketMode::Bcm {
            return Err(not_supported("bind on BCM socket"));
        }
        socket.bound = Some(ifindex);
        state.binds.push((handle, ifindex));
        Ok(())
    }

    fn send(&self, handle: TransportHandle, frame: &RawFrame) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.enter(MockOp::Send)?;
        let fd_frames = self.constants.raw_fd_frames;
        let socket = state.socket(handle)?;

        let ifindex = match (frame.ifindex, socket.bound) {
            (0, Some(bound)) if bound != 0 => bound,
            (0, _) => return Err(no_such_device("no interface to send on")),
            (index, _) if self.is_known_index(index) => index,
            (index, _) => return Err(no_such_device(index)),
        };
        if frame.kind == FrameKind::Fd && socket.options.get(&fd_frames).copied() != Some(1) {
            return Err(TransportError::InvalidArgument(
                "FD frame on socket without CAN_RAW_FD_FRAMES".to_string(),
            ));
        }

        let sent = SentFrame {
            handle,
            frame: RawFrame {
                ifindex,
                ..frame.clone()
            },
        };
        tracing::debug!(%handle, ifindex, can_id = frame.can_id, "Mock transport: sent frame");
        state.sent.push(sent);
        Ok(())
    }

    fn recv(&self, handle: TransportHandle) -> Result<RawFrame, TransportError> {
        let mut state = self.state.lock();
        state.enter(MockOp::Recv)?;
        loop {
            let socket = state.socket(handle)?;
            if let Some(frame) = socket.inbox.pop_front() {
                return Ok(frame);
            }
            self.frame_ready.wait(&mut state);
        }
    }

    fn resolve_index(&self, handle: TransportHandle, name: &str) -> Result<u32, TransportError> {
        let mut state = self.state.lock();
        state.enter(MockOp::ResolveIndex)?;
        state.socket(handle)?;
        Ok(self.find_by_name(name)?.index)
    }

    fn resolve_name(&self, handle: TransportHandle, index: u32) -> Result<String, TransportError> {
        let mut state = self.state.lock();
        state.enter(MockOp::ResolveName)?;
        state.socket(handle)?;
        self.interfaces
            .iter()
            .find(|iface| iface.index == index)
            .map(|iface| iface.name.clone())
            .ok_or_else(|| no_such_device(index))
    }

    fn fetch_mtu(&self, handle: TransportHandle, name: &str) -> Result<i32, TransportError> {
        let mut state = self.state.lock();
        state.enter(MockOp::FetchMtu)?;
        state.socket(handle)?;
        Ok(self.find_by_name(name)?.mtu)
    }

    fn set_sockopt(
        &self,
        handle: TransportHandle,
        option: i32,
        value: i32,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.enter(MockOp::SetSockopt)?;
        let socket = state.socket(handle)?;
        if socket.mode == SocketMode::Bcm {
            return Err(not_supported("SOL_CAN_RAW option on BCM socket"));
        }
        socket.options.insert(option, value);
        Ok(())
    }

    fn get_sockopt(&self, handle: TransportHandle, option: i32) -> Result<i32, TransportError> {
        let mut state = self.state.lock();
        state.enter(MockOp::GetSockopt)?;
        let socket = state.socket(handle)?;
        if socket.mode == SocketMode::Bcm {
            return Err(not_supported("SOL_CAN_RAW option on BCM socket"));
        }
        Ok(socket.options.get(&option).copied().unwrap_or(0))
    }
}
