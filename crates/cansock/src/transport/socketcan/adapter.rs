//! SocketCAN transport using raw `libc` socket calls

use std::collections::HashMap;
use std::io;
use std::mem::size_of;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use libc::{c_int, c_void, socklen_t};
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::abi::{
    CanFdFrameAbi, CanFrameAbi, IfReq, SockaddrCan, CAN_BCM, CAN_MIN_NAMELEN, CAN_RAW,
    CAN_RAW_ERR_FILTER, CAN_RAW_FD_FRAMES, CAN_RAW_FILTER, CAN_RAW_LOOPBACK,
    CAN_RAW_RECV_OWN_MSGS, IFNAMSIZ, PF_CAN, SIOCGIFINDEX, SIOCGIFMTU, SIOCGIFNAME, SOL_CAN_RAW,
};
use crate::frame::{FrameKind, RawFrame, CANFD_MAX_DLEN, CAN_MAX_DLEN};
use crate::transport::{BusTransport, ProtocolConstants, TransportError, TransportHandle};

/// One open kernel socket and the eventfd that wakes its receivers
struct OpenSocket {
    fd: OwnedFd,
    waker: OwnedFd,
}

impl OpenSocket {
    fn raw(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// Kernel SocketCAN transport
///
/// Handles are allocated from a counter and never reused, so a handle
/// released by `close` resolves to `Closed` for every later call even when
/// the kernel hands its descriptor number to a new socket. The descriptor
/// itself is released once no call on another thread still uses it.
pub struct SocketCanTransport {
    constants: ProtocolConstants,
    sockets: Mutex<HashMap<TransportHandle, Arc<OpenSocket>>>,
    next_handle: AtomicI32,
}

impl SocketCanTransport {
    pub fn new() -> Self {
        Self {
            constants: ProtocolConstants {
                can_mtu: size_of::<CanFrameAbi>(),
                canfd_mtu: size_of::<CanFdFrameAbi>(),
                raw_filter: CAN_RAW_FILTER,
                raw_err_filter: CAN_RAW_ERR_FILTER,
                raw_loopback: CAN_RAW_LOOPBACK,
                raw_recv_own_msgs: CAN_RAW_RECV_OWN_MSGS,
                raw_fd_frames: CAN_RAW_FD_FRAMES,
            },
            sockets: Mutex::new(HashMap::new()),
            next_handle: AtomicI32::new(1),
        }
    }

    fn open(&self, socket_type: c_int, protocol: c_int) -> Result<TransportHandle, TransportError> {
        let fd = unsafe { libc::socket(PF_CAN, socket_type | libc::SOCK_CLOEXEC, protocol) };
        if fd == -1 {
            return Err(io::Error::last_os_error().into());
        }
        // SAFETY: `fd` was just returned by socket(2) and is owned by nobody else
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let waker = unsafe { libc::eventfd(0, libc::EFD_CLOEXEC) };
        if waker == -1 {
            return Err(io::Error::last_os_error().into());
        }
        // SAFETY: as above, for eventfd(2)
        let waker = unsafe { OwnedFd::from_raw_fd(waker) };

        let handle = TransportHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
        debug!(%handle, fd = fd.as_raw_fd(), "Opened AF_CAN socket");
        self.sockets
            .lock()
            .insert(handle, Arc::new(OpenSocket { fd, waker }));
        Ok(handle)
    }

    fn socket(&self, handle: TransportHandle) -> Result<Arc<OpenSocket>, TransportError> {
        self.sockets
            .lock()
            .get(&handle)
            .cloned()
            .ok_or(TransportError::Closed)
    }

    /// Block until the socket is readable; `Closed` if it was closed meanwhile
    fn wait_readable(socket: &OpenSocket) -> Result<(), TransportError> {
        let mut fds = [
            libc::pollfd {
                fd: socket.raw(),
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: socket.waker.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];

        loop {
            let res = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
            if res >= 0 {
                break;
            }
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err.into());
        }

        if fds[1].revents != 0 {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn ioctl_ifreq(fd: RawFd, request: u64, req: &mut IfReq) -> Result<(), TransportError> {
        let rv = unsafe { libc::ioctl(fd, request as _, req as *mut IfReq) };
        if rv == -1 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }
}

impl Default for SocketCanTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn check_interface_name(name: &str) -> Result<(), TransportError> {
    if name.is_empty() || name.len() > IFNAMSIZ - 1 || name.contains('\0') {
        return Err(TransportError::InvalidArgument(format!(
            "illegal interface name: {:?}",
            name
        )));
    }
    Ok(())
}

fn check_payload(frame: &RawFrame, max: usize) -> Result<(), TransportError> {
    if frame.data.len() > max {
        return Err(TransportError::InvalidArgument(format!(
            "payload of {} bytes exceeds {}",
            frame.data.len(),
            max
        )));
    }
    Ok(())
}

/// Lay out a classic frame as `struct can_frame`
fn encode_classic(frame: &RawFrame) -> Result<CanFrameAbi, TransportError> {
    check_payload(frame, CAN_MAX_DLEN)?;
    let mut abi = CanFrameAbi {
        can_id: frame.can_id,
        len: frame.data.len() as u8,
        ..Default::default()
    };
    abi.data[..frame.data.len()].copy_from_slice(&frame.data);
    Ok(abi)
}

/// Lay out an FD frame as `struct canfd_frame`
fn encode_fd(frame: &RawFrame) -> Result<CanFdFrameAbi, TransportError> {
    check_payload(frame, CANFD_MAX_DLEN)?;
    let mut abi = CanFdFrameAbi {
        can_id: frame.can_id,
        len: frame.data.len() as u8,
        ..Default::default()
    };
    abi.data[..frame.data.len()].copy_from_slice(&frame.data);
    Ok(abi)
}

/// Interpret `nbytes` read into `buf`
///
/// A classic `can_frame` shares the header and data offsets of
/// `canfd_frame`, so both arrive in the same buffer. The length byte is
/// clamped to the frame kind's maximum.
fn decode(
    buf: &CanFdFrameAbi,
    nbytes: usize,
    ifindex: u32,
    constants: &ProtocolConstants,
) -> Result<RawFrame, TransportError> {
    let (kind, max) = if nbytes == constants.can_mtu {
        (FrameKind::Classic, CAN_MAX_DLEN)
    } else if nbytes == constants.canfd_mtu {
        (FrameKind::Fd, CANFD_MAX_DLEN)
    } else {
        return Err(TransportError::MalformedFrame(format!(
            "invalid length of received frame: {}",
            nbytes
        )));
    };
    let len = usize::from(buf.len).min(max);

    Ok(RawFrame {
        ifindex,
        can_id: buf.can_id,
        data: buf.data[..len].to_vec(),
        kind,
    })
}

fn write_frame<T>(fd: RawFd, frame: &T, addr: &SockaddrCan) -> Result<(), TransportError> {
    let written = unsafe {
        libc::sendto(
            fd,
            frame as *const T as *const c_void,
            size_of::<T>(),
            0,
            addr as *const SockaddrCan as *const libc::sockaddr,
            size_of::<SockaddrCan>() as socklen_t,
        )
    };
    if written == -1 {
        return Err(io::Error::last_os_error().into());
    }
    if written as usize != size_of::<T>() {
        return Err(TransportError::ShortWrite {
            written: written as usize,
            expected: size_of::<T>(),
        });
    }
    Ok(())
}

impl BusTransport for SocketCanTransport {
    fn constants(&self) -> &ProtocolConstants {
        &self.constants
    }

    fn open_raw(&self) -> Result<TransportHandle, TransportError> {
        self.open(libc::SOCK_RAW, CAN_RAW)
    }

    fn open_bcm(&self) -> Result<TransportHandle, TransportError> {
        self.open(libc::SOCK_DGRAM, CAN_BCM)
    }

    fn close(&self, handle: TransportHandle) -> Result<(), TransportError> {
        let socket = self
            .sockets
            .lock()
            .remove(&handle)
            .ok_or(TransportError::Closed)?;

        let one: u64 = 1;
        let rv = unsafe {
            libc::write(
                socket.waker.as_raw_fd(),
                &one as *const u64 as *const c_void,
                size_of::<u64>(),
            )
        };
        if rv == -1 {
            debug!(%handle, error = %io::Error::last_os_error(), "Failed to wake receivers");
        }

        match Arc::try_unwrap(socket) {
            Ok(socket) => {
                let fd = socket.fd.into_raw_fd();
                if unsafe { libc::close(fd) } == -1 {
                    return Err(io::Error::last_os_error().into());
                }
            }
            Err(_) => {
                // a call on another thread still holds the descriptor and drops it on return
                debug!(%handle, "Descriptor release deferred to in-flight call");
            }
        }
        Ok(())
    }

    fn bind(&self, handle: TransportHandle, ifindex: u32) -> Result<(), TransportError> {
        let socket = self.socket(handle)?;
        let addr = SockaddrCan::new(ifindex);
        let rv = unsafe {
            libc::bind(
                socket.raw(),
                &addr as *const SockaddrCan as *const libc::sockaddr,
                size_of::<SockaddrCan>() as socklen_t,
            )
        };
        if rv != 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }

    fn send(&self, handle: TransportHandle, frame: &RawFrame) -> Result<(), TransportError> {
        let socket = self.socket(handle)?;
        let addr = SockaddrCan::new(frame.ifindex);
        match frame.kind {
            FrameKind::Classic => write_frame(socket.raw(), &encode_classic(frame)?, &addr),
            FrameKind::Fd => write_frame(socket.raw(), &encode_fd(frame)?, &addr),
        }
    }

    fn recv(&self, handle: TransportHandle) -> Result<RawFrame, TransportError> {
        let socket = self.socket(handle)?;
        Self::wait_readable(&socket)?;

        let mut buf = CanFdFrameAbi::default();
        let mut addr = SockaddrCan::default();
        let mut addr_len = size_of::<SockaddrCan>() as socklen_t;

        let nbytes = unsafe {
            libc::recvfrom(
                socket.raw(),
                &mut buf as *mut CanFdFrameAbi as *mut c_void,
                size_of::<CanFdFrameAbi>(),
                0,
                &mut addr as *mut SockaddrCan as *mut libc::sockaddr,
                &mut addr_len,
            )
        };
        if nbytes == -1 {
            return Err(io::Error::last_os_error().into());
        }
        if (addr_len as usize) < CAN_MIN_NAMELEN {
            return Err(TransportError::MalformedFrame(format!(
                "illegal AF_CAN address length {}",
                addr_len
            )));
        }

        trace!(%handle, nbytes, ifindex = addr.can_ifindex, "recvfrom");
        decode(
            &buf,
            nbytes as usize,
            addr.can_ifindex as u32,
            &self.constants,
        )
    }

    fn resolve_index(&self, handle: TransportHandle, name: &str) -> Result<u32, TransportError> {
        check_interface_name(name)?;
        let socket = self.socket(handle)?;
        let mut req = IfReq::with_name(name);
        Self::ioctl_ifreq(socket.raw(), SIOCGIFINDEX, &mut req)?;
        Ok(req.ifr_value as u32)
    }

    fn resolve_name(&self, handle: TransportHandle, index: u32) -> Result<String, TransportError> {
        let socket = self.socket(handle)?;
        let mut req = IfReq::zeroed();
        req.ifr_value = index as c_int;
        Self::ioctl_ifreq(socket.raw(), SIOCGIFNAME, &mut req)?;
        Ok(req.name())
    }

    fn fetch_mtu(&self, handle: TransportHandle, name: &str) -> Result<i32, TransportError> {
        check_interface_name(name)?;
        let socket = self.socket(handle)?;
        let mut req = IfReq::with_name(name);
        Self::ioctl_ifreq(socket.raw(), SIOCGIFMTU, &mut req)?;
        Ok(req.ifr_value)
    }

    fn set_sockopt(
        &self,
        handle: TransportHandle,
        option: i32,
        value: i32,
    ) -> Result<(), TransportError> {
        let socket = self.socket(handle)?;
        let value: c_int = value;
        let rv = unsafe {
            libc::setsockopt(
                socket.raw(),
                SOL_CAN_RAW,
                option,
                &value as *const c_int as *const c_void,
                size_of::<c_int>() as socklen_t,
            )
        };
        if rv == -1 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }

    fn get_sockopt(&self, handle: TransportHandle, option: i32) -> Result<i32, TransportError> {
        let socket = self.socket(handle)?;
        let mut value: c_int = 0;
        let mut len = size_of::<c_int>() as socklen_t;
        let rv = unsafe {
            libc::getsockopt(
                socket.raw(),
                SOL_CAN_RAW,
                option,
                &mut value as *mut c_int as *mut c_void,
                &mut len,
            )
        };
        if rv == -1 {
            return Err(io::Error::last_os_error().into());
        }
        if len as usize != size_of::<c_int>() {
            return Err(TransportError::InvalidArgument(format!(
                "getsockopt returned {} bytes",
                len
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(kind: FrameKind, can_id: u32, data: Vec<u8>) -> RawFrame {
        RawFrame {
            ifindex: 3,
            can_id,
            data,
            kind,
        }
    }

    /// Open a raw socket, `None` where the kernel has no AF_CAN support
    fn open_or_skip(transport: &SocketCanTransport) -> Option<TransportHandle> {
        match transport.open_raw() {
            Ok(handle) => Some(handle),
            Err(e) => {
                eprintln!("Skipping: AF_CAN unavailable ({})", e);
                None
            }
        }
    }

    #[test]
    fn test_constants_match_kernel_sizes() {
        let transport = SocketCanTransport::new();
        assert_eq!(*transport.constants(), ProtocolConstants::LINUX);
    }

    #[test]
    fn test_interface_name_validation() {
        assert!(check_interface_name("vcan0").is_ok());
        assert!(check_interface_name("fifteen-chars-x").is_ok());
        assert!(check_interface_name("sixteen-chars-xx").is_err());
        assert!(check_interface_name("").is_err());
        assert!(check_interface_name("can\0").is_err());
    }

    #[test]
    fn test_ifreq_name_round_trip() {
        let req = IfReq::with_name("vcan0");
        assert_eq!(req.name(), "vcan0");
    }

    #[test]
    fn test_encode_classic() {
        let abi = encode_classic(&raw(FrameKind::Classic, 0x8003_0001, vec![0x00, 0x91])).unwrap();
        assert_eq!(abi.can_id, 0x8003_0001);
        assert_eq!(abi.len, 2);
        assert_eq!(abi.data, [0x00, 0x91, 0, 0, 0, 0, 0, 0]);
        assert_eq!(abi.len8_dlc, 0);

        let full = encode_classic(&raw(FrameKind::Classic, 0x123, vec![0xFF; 8])).unwrap();
        assert_eq!(full.len, 8);
        assert!(encode_classic(&raw(FrameKind::Classic, 0x123, vec![0; 9])).is_err());
    }

    #[test]
    fn test_encode_fd() {
        let abi = encode_fd(&raw(FrameKind::Fd, 0x100, vec![0xAB; 48])).unwrap();
        assert_eq!(abi.len, 48);
        assert_eq!(abi.flags, 0);
        assert!(abi.data[..48].iter().all(|b| *b == 0xAB));
        assert!(abi.data[48..].iter().all(|b| *b == 0));

        assert_eq!(encode_fd(&raw(FrameKind::Fd, 0x100, vec![0; 64])).unwrap().len, 64);
        assert!(matches!(
            encode_fd(&raw(FrameKind::Fd, 0x100, vec![0; 65])),
            Err(TransportError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_decode_classic() {
        let mut buf = CanFdFrameAbi {
            can_id: 0x8003_0001,
            len: 2,
            ..Default::default()
        };
        buf.data[..2].copy_from_slice(&[0x00, 0x91]);

        let frame = decode(&buf, 16, 3, &ProtocolConstants::LINUX).unwrap();
        assert_eq!(frame, raw(FrameKind::Classic, 0x8003_0001, vec![0x00, 0x91]));
    }

    #[test]
    fn test_decode_fd() {
        let mut buf = CanFdFrameAbi {
            can_id: 0x7FF,
            len: 12,
            ..Default::default()
        };
        buf.data[..12].copy_from_slice(&[0x5A; 12]);

        let frame = decode(&buf, 72, 7, &ProtocolConstants::LINUX).unwrap();
        assert_eq!(frame.kind, FrameKind::Fd);
        assert_eq!(frame.ifindex, 7);
        assert_eq!(frame.data, vec![0x5A; 12]);
    }

    #[test]
    fn test_decode_clamps_length() {
        let buf = CanFdFrameAbi {
            can_id: 0x1,
            len: 15,
            ..Default::default()
        };
        assert_eq!(
            decode(&buf, 16, 1, &ProtocolConstants::LINUX)
                .unwrap()
                .data
                .len(),
            8
        );

        let buf = CanFdFrameAbi {
            len: 200,
            ..Default::default()
        };
        assert_eq!(
            decode(&buf, 72, 1, &ProtocolConstants::LINUX)
                .unwrap()
                .data
                .len(),
            64
        );
    }

    #[test]
    fn test_decode_rejects_other_sizes() {
        let buf = CanFdFrameAbi::default();
        for nbytes in [0, 8, 15, 17, 71, 73] {
            assert!(matches!(
                decode(&buf, nbytes, 1, &ProtocolConstants::LINUX),
                Err(TransportError::MalformedFrame(_))
            ));
        }
    }

    #[test]
    fn test_close_unknown_handle() {
        let transport = SocketCanTransport::new();
        assert!(matches!(
            transport.close(TransportHandle::new(-1)),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn test_released_handle_is_never_reused() {
        let transport = SocketCanTransport::new();
        let Some(first) = open_or_skip(&transport) else {
            return;
        };
        transport.close(first).unwrap();

        // the kernel typically reuses the descriptor number here
        let second = transport.open_raw().unwrap();
        assert_ne!(first, second);

        let frame = raw(FrameKind::Classic, 0x10, vec![1]);
        assert!(matches!(
            transport.send(first, &frame),
            Err(TransportError::Closed)
        ));
        assert!(matches!(
            transport.set_sockopt(first, CAN_RAW_LOOPBACK, 0),
            Err(TransportError::Closed)
        ));
        assert!(matches!(transport.close(first), Err(TransportError::Closed)));

        assert_eq!(transport.get_sockopt(second, CAN_RAW_LOOPBACK).unwrap(), 1);
        transport.close(second).unwrap();
    }

    #[test]
    fn test_close_wakes_blocked_recv() {
        let transport = Arc::new(SocketCanTransport::new());
        let Some(handle) = open_or_skip(&transport) else {
            return;
        };

        let receiver = {
            let transport = transport.clone();
            std::thread::spawn(move || transport.recv(handle))
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        transport.close(handle).unwrap();

        assert!(matches!(
            receiver.join().unwrap(),
            Err(TransportError::Closed)
        ));
    }
}
