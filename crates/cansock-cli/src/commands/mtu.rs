//! MTU command

use anyhow::{Context, Result};
use cansock::CanSocket;

use crate::output::OutputContext;

pub fn mtu(socket: &CanSocket, interface: &str, ctx: &OutputContext) -> Result<()> {
    let mtu = socket
        .mtu(interface)
        .with_context(|| format!("Failed to query MTU of {}", interface))?;
    let fd_capable = mtu == socket.transport().constants().canfd_mtu;

    ctx.print_kv(&[
        ("interface", interface.to_string()),
        ("mtu", mtu.to_string()),
        ("fd_capable", fd_capable.to_string()),
    ]);
    Ok(())
}
