//! Transport configuration
//!
//! Selects which [`BusTransport`](crate::transport::BusTransport)
//! [`create_transport`](crate::transport::create_transport) builds.

use serde::{Deserialize, Serialize};

// =============================================================================
// Transport Configuration
// =============================================================================

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Kernel SocketCAN (Linux only)
    SocketCan,
    /// In-memory transport for testing
    Mock(MockConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        if cfg!(target_os = "linux") {
            Self::SocketCan
        } else {
            Self::Mock(MockConfig::default())
        }
    }
}

/// Mock transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockConfig {
    /// Interfaces the mock answers name/index and MTU queries for
    #[serde(default = "default_mock_interfaces")]
    pub interfaces: Vec<MockInterfaceConfig>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            interfaces: default_mock_interfaces(),
        }
    }
}

/// One interface known to the mock transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockInterfaceConfig {
    /// Interface name (e.g., "vcan0")
    pub name: String,
    /// Kernel interface index, must be non-zero
    pub index: u32,
    /// Reported MTU
    #[serde(default = "default_mtu")]
    pub mtu: i32,
}

fn default_mtu() -> i32 {
    16
}

fn default_mock_interfaces() -> Vec<MockInterfaceConfig> {
    vec![MockInterfaceConfig {
        name: "vcan0".to_string(),
        index: 1,
        mtu: default_mtu(),
    }]
}
