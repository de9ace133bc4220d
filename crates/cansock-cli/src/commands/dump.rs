//! Dump command - print received frames

use anyhow::{Context, Result};
use cansock::{CanFrame, CanInterface, CanSocket, FrameKind, ALL_INTERFACES};

use crate::output::OutputContext;

/// Receive and print frames until `count` have been shown, or forever
///
/// The interface name `any` binds to every CAN interface.
pub fn dump(
    socket: &mut CanSocket,
    interface: &str,
    count: Option<usize>,
    ctx: &OutputContext,
) -> Result<()> {
    let iface = if interface == "any" {
        ALL_INTERFACES
    } else {
        CanInterface::lookup(socket, interface)
            .with_context(|| format!("Failed to look up interface {}", interface))?
    };
    socket.bind(&iface)?;
    tracing::info!(interface = %iface, ?count, "Dumping frames");

    let mut received = 0usize;
    while count.map_or(true, |limit| received < limit) {
        let frame = socket.recv().context("Failed to receive frame")?;
        ctx.print_frame(&with_interface_name(socket, frame)?);
        received += 1;
    }
    Ok(())
}

/// Received frames carry only the interface index
fn with_interface_name(socket: &CanSocket, frame: CanFrame) -> Result<CanFrame> {
    let named = frame.interface().resolved(socket);
    if named.name().is_none() {
        tracing::debug!(interface = %named, "Interface name unavailable");
        return Ok(frame);
    }
    let frame = match frame.kind() {
        FrameKind::Classic => CanFrame::new(named, frame.id(), frame.data())?,
        FrameKind::Fd => CanFrame::new_fd(named, frame.id(), frame.data())?,
    };
    Ok(frame)
}
