//! Kernel structures and constants from `<linux/can.h>`, `<linux/can/raw.h>`,
//! `<linux/sockios.h>` and `<net/if.h>`

use std::mem::{offset_of, size_of};

use libc::{c_char, c_int, sa_family_t};

pub const AF_CAN: c_int = 29;
pub const PF_CAN: c_int = AF_CAN;

pub const CAN_RAW: c_int = 1;
pub const CAN_BCM: c_int = 2;

pub const SOL_CAN_BASE: c_int = 100;
pub const SOL_CAN_RAW: c_int = SOL_CAN_BASE + CAN_RAW;

pub const CAN_RAW_FILTER: c_int = 1;
pub const CAN_RAW_ERR_FILTER: c_int = 2;
pub const CAN_RAW_LOOPBACK: c_int = 3;
pub const CAN_RAW_RECV_OWN_MSGS: c_int = 4;
pub const CAN_RAW_FD_FRAMES: c_int = 5;

pub const SIOCGIFNAME: u64 = 0x8910;
pub const SIOCGIFMTU: u64 = 0x8921;
pub const SIOCGIFINDEX: u64 = 0x8933;

pub const IFNAMSIZ: usize = 16;

/// `struct can_frame`
#[repr(C, align(8))]
#[derive(Debug, Clone, Copy, Default)]
pub struct CanFrameAbi {
    pub can_id: u32,
    pub len: u8,
    pub pad: u8,
    pub res0: u8,
    pub len8_dlc: u8,
    pub data: [u8; 8],
}

/// `struct canfd_frame`
#[repr(C, align(8))]
#[derive(Debug, Clone, Copy)]
pub struct CanFdFrameAbi {
    pub can_id: u32,
    pub len: u8,
    pub flags: u8,
    pub res0: u8,
    pub res1: u8,
    pub data: [u8; 64],
}

impl Default for CanFdFrameAbi {
    fn default() -> Self {
        Self {
            can_id: 0,
            len: 0,
            flags: 0,
            res0: 0,
            res1: 0,
            data: [0; 64],
        }
    }
}

/// `struct sockaddr_can`; the trailing union covers the ISO-TP and J1939 addresses
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SockaddrCan {
    pub can_family: sa_family_t,
    pub can_ifindex: c_int,
    pub can_addr: [u64; 2],
}

impl SockaddrCan {
    pub fn new(ifindex: u32) -> Self {
        Self {
            can_family: AF_CAN as sa_family_t,
            can_ifindex: ifindex as c_int,
            can_addr: [0; 2],
        }
    }
}

/// Shortest address the kernel returns from `recvfrom` on a raw socket
pub const CAN_MIN_NAMELEN: usize = offset_of!(SockaddrCan, can_ifindex) + size_of::<c_int>();

/// `struct ifreq` restricted to the integer member of its union
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct IfReq {
    pub ifr_name: [c_char; IFNAMSIZ],
    /// `ifr_ifindex` or `ifr_mtu`
    pub ifr_value: c_int,
    pub _pad: [u8; 20],
}

impl IfReq {
    pub fn zeroed() -> Self {
        Self {
            ifr_name: [0; IFNAMSIZ],
            ifr_value: 0,
            _pad: [0; 20],
        }
    }

    /// Copy `name` into `ifr_name`; the caller has checked its length
    pub fn with_name(name: &str) -> Self {
        let mut req = Self::zeroed();
        for (dst, src) in req.ifr_name.iter_mut().zip(name.bytes()) {
            *dst = src as c_char;
        }
        req
    }

    pub fn name(&self) -> String {
        let bytes: Vec<u8> = self
            .ifr_name
            .iter()
            .take_while(|c| **c != 0)
            .map(|c| *c as u8)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

const _: () = assert!(size_of::<CanFrameAbi>() == 16);
const _: () = assert!(size_of::<CanFdFrameAbi>() == 72);
const _: () = assert!(size_of::<SockaddrCan>() == 24);
const _: () = assert!(CAN_MIN_NAMELEN == 8);
const _: () = assert!(size_of::<IfReq>() == 40);
