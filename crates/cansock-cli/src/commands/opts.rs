//! Options command - set and show raw socket options

use anyhow::{Context, Result};
use cansock::{CanSocket, SocketOption};

use crate::output::OutputContext;

pub fn opts(
    socket: &mut CanSocket,
    loopback: Option<bool>,
    recv_own_msgs: Option<bool>,
    ctx: &OutputContext,
) -> Result<()> {
    apply(socket, SocketOption::Loopback, loopback)?;
    apply(socket, SocketOption::RecvOwnMsgs, recv_own_msgs)?;

    let mut pairs = Vec::new();
    for option in [
        SocketOption::Loopback,
        SocketOption::RecvOwnMsgs,
        SocketOption::FdFrames,
    ] {
        let on = socket
            .option(option)
            .with_context(|| format!("Failed to read {}", option))?;
        pairs.push((option_key(option), if on { "on" } else { "off" }.to_string()));
    }
    ctx.print_kv(&pairs);
    Ok(())
}

/// Set `option` when a value was given
pub fn apply(socket: &mut CanSocket, option: SocketOption, value: Option<bool>) -> Result<()> {
    if let Some(on) = value {
        socket
            .set_option(option, on)
            .with_context(|| format!("Failed to set {}", option))?;
    }
    Ok(())
}

fn option_key(option: SocketOption) -> &'static str {
    match option {
        SocketOption::Loopback => "loopback",
        SocketOption::RecvOwnMsgs => "recv_own_msgs",
        SocketOption::FdFrames => "fd_frames",
    }
}
