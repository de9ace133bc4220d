//! Send command - transmit a single frame

use anyhow::{Context, Result};
use cansock::{CanFrame, CanInterface, CanSocket};

use super::parse::{parse_can_id, parse_data};
use crate::output::OutputContext;

/// Options of the send command
#[derive(Debug, Clone, Default)]
pub struct SendArgs {
    pub id: String,
    pub data: String,
    pub extended: bool,
    pub rtr: bool,
    pub fd: bool,
}

pub fn send(
    socket: &mut CanSocket,
    interface: &str,
    args: &SendArgs,
    ctx: &OutputContext,
) -> Result<()> {
    let id = parse_can_id(&args.id, args.extended, args.rtr)?;
    let data = parse_data(&args.data)?;

    let iface = CanInterface::lookup(socket, interface)
        .with_context(|| format!("Failed to look up interface {}", interface))?;
    socket.bind(&iface)?;

    let frame = if args.fd {
        socket
            .set_fd_frames(true)
            .context("Failed to enable FD frames")?;
        CanFrame::new_fd(iface, id, data)?
    } else {
        CanFrame::new(iface, id, data)?
    };

    socket.send(&frame).context("Failed to send frame")?;
    ctx.print_frame(&frame);
    ctx.success("Sent");
    Ok(())
}
