//! CAN network interface handles

use std::fmt;
use std::sync::Arc;

use crate::error::{CanSocketError, Result};
use crate::socket::CanSocket;

/// Wildcard handle: bind target matching every CAN interface
pub const ALL_INTERFACES: CanInterface = CanInterface {
    index: 0,
    name: None,
};

/// A kernel network interface, by index and (once known) by name
///
/// Handles are immutable; cloning shares the name. Equality compares both
/// index and name, so a resolved handle differs from its unresolved copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanInterface {
    index: u32,
    name: Option<Arc<str>>,
}

impl CanInterface {
    /// Handle for a known index with no name
    pub const fn from_index(index: u32) -> Self {
        Self { index, name: None }
    }

    /// Handle for a known index and name, no lookup performed
    pub fn with_name(index: u32, name: impl Into<Arc<str>>) -> Self {
        Self {
            index,
            name: Some(name.into()),
        }
    }

    /// Look up an interface by name through the socket's transport
    pub fn lookup(socket: &CanSocket, name: &str) -> Result<Self> {
        let index = socket
            .transport()
            .resolve_index(socket.handle(), name)
            .map_err(|source| CanSocketError::InterfaceNotFound {
                name: name.to_string(),
                source,
            })?;
        Ok(Self::with_name(index, name))
    }

    /// Copy of this handle with the name filled in
    ///
    /// Returns the handle unchanged if the name is already known, if this is
    /// the wildcard handle, or if the lookup fails.
    pub fn resolved(&self, socket: &CanSocket) -> Self {
        if self.name.is_some() || self.is_all() {
            return self.clone();
        }
        match socket.interface_name(self.index) {
            Some(name) => Self::with_name(self.index, name),
            None => self.clone(),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether this is the all-interfaces wildcard (index 0)
    pub fn is_all(&self) -> bool {
        self.index == 0
    }
}

impl fmt::Display for CanInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, self.index) {
            (Some(name), _) => f.write_str(name),
            (None, 0) => f.write_str("any"),
            (None, index) => write!(f, "#{}", index),
        }
    }
}
