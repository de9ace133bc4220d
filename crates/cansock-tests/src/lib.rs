//! Integration tests for cansock against the kernel
//!
//! These tests open real `AF_CAN` sockets and need a virtual CAN
//! interface (vcan0). Tests skip with a message when it is missing.
//!
//! # Running Tests
//!
//! ```bash
//! # Set up vcan0 (requires sudo)
//! sudo modprobe vcan
//! sudo ip link add dev vcan0 type vcan
//! sudo ip link set up vcan0
//!
//! # Run tests (single-threaded due to the shared interface)
//! cargo test -p cansock-tests -- --test-threads=1
//! ```
//!
//! # Test Structure
//!
//! - `vcan_test.rs` - socket lifecycle, frame I/O, MTU and options on vcan0

use std::path::Path;

/// Interface the kernel tests run on
pub const VCAN_INTERFACE: &str = "vcan0";

/// Whether `name` exists as a network interface
pub fn interface_exists(name: &str) -> bool {
    Path::new("/sys/class/net").join(name).exists()
}

/// Install a test log subscriber once; `RUST_LOG` selects the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Return early from a test when vcan0 is not available
#[macro_export]
macro_rules! require_vcan {
    () => {
        if !$crate::interface_exists($crate::VCAN_INTERFACE) {
            eprintln!(
                "Skipping: {} not found (see cansock-tests docs for setup)",
                $crate::VCAN_INTERFACE
            );
            return;
        }
        $crate::init_tracing();
    };
}
