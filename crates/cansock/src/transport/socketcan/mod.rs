//! SocketCAN transport over the kernel `AF_CAN` family (Linux only)

mod abi;
mod adapter;

pub use adapter::SocketCanTransport;
