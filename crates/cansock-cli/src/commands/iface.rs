//! Interface command - resolve interface names and indexes

use anyhow::{anyhow, Result};
use cansock::{CanInterface, CanSocket};

use crate::output::OutputContext;

/// Resolve `target` given either as an index or as a name
pub fn iface(socket: &CanSocket, target: &str, ctx: &OutputContext) -> Result<()> {
    let resolved = match target.parse::<u32>() {
        Ok(index) => {
            let named = CanInterface::from_index(index).resolved(socket);
            if named.name().is_none() && !named.is_all() {
                return Err(anyhow!("No interface with index {}", index));
            }
            named
        }
        Err(_) => CanInterface::lookup(socket, target)?,
    };

    ctx.print_kv(&[
        ("index", resolved.index().to_string()),
        ("name", resolved.to_string()),
    ]);
    Ok(())
}
