//! Argument parsers shared by the commands

use anyhow::{anyhow, bail, Result};
use cansock::CanId;

/// Parse a hex CAN identifier, with or without a `0x` prefix
///
/// Addresses above the 11-bit range, or any address when `extended` is
/// set, produce an extended-format identifier.
pub fn parse_can_id(s: &str, extended: bool, rtr: bool) -> Result<CanId> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let address =
        u32::from_str_radix(digits, 16).map_err(|e| anyhow!("Invalid CAN ID '{}': {}", s, e))?;

    let id = if extended || address > 0x7FF {
        CanId::extended(address)
    } else {
        CanId::standard(address as u16)
    };
    let id = id.ok_or_else(|| anyhow!("CAN ID out of range: {}", s))?;
    Ok(if rtr { id.set_rtr() } else { id })
}

/// Parse frame payload bytes from hex, `0091` or `00.91`
pub fn parse_data(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let digits: String = s.chars().filter(|c| *c != '.').collect();
    if digits.len() % 2 != 0 {
        bail!("Hex data must have an even number of digits");
    }
    hex::decode(&digits).map_err(|e| anyhow!("Invalid hex data '{}': {}", s, e))
}

/// Parse an `on`/`off` switch for clap
pub fn parse_switch(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Ok(true),
        "off" | "0" | "false" => Ok(false),
        other => Err(format!("expected on or off, got '{}'", other)),
    }
}
