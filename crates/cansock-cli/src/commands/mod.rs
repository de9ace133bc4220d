//! Command implementations for the cansock CLI

pub mod dump;
pub mod iface;
pub mod mtu;
pub mod opts;
pub mod parse;
pub mod send;

pub use dump::dump;
pub use iface::iface;
pub use mtu::mtu;
pub use opts::opts;
pub use send::{send, SendArgs};
