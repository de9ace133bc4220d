//! Output formatting for the cansock CLI (text, json)

use cansock::{CanFrame, FrameKind};
use colored::Colorize;
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// candump-style text (default)
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format }
    }

    /// Print a success message (text mode only)
    pub fn success(&self, msg: &str) {
        if self.format == OutputFormat::Text {
            println!("{}", msg.green());
        }
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print one received or sent frame
    pub fn print_frame(&self, frame: &CanFrame) {
        match self.format {
            OutputFormat::Text => println!("{}", frame),
            OutputFormat::Json => print_json(&FrameRow::from(frame)),
        }
    }

    /// Print key-value pairs
    pub fn print_kv(&self, pairs: &[(&str, String)]) {
        match self.format {
            OutputFormat::Text => {
                for (key, value) in pairs {
                    println!("{}: {}", key.bold(), value);
                }
            }
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
                    .collect();
                print_json(&map);
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("{}", format!("JSON encoding failed: {}", e).red()),
    }
}

/// JSON shape of a frame
#[derive(Debug, Serialize, PartialEq)]
pub struct FrameRow {
    pub ifindex: u32,
    pub interface: Option<String>,
    pub id: String,
    pub extended: bool,
    pub rtr: bool,
    pub error: bool,
    pub fd: bool,
    pub len: usize,
    pub data: String,
}

impl From<&CanFrame> for FrameRow {
    fn from(frame: &CanFrame) -> Self {
        let id = frame.id();
        Self {
            ifindex: frame.interface().index(),
            interface: frame.interface().name().map(String::from),
            id: format!("{:X}", id.address()),
            extended: id.is_extended(),
            rtr: id.is_remote(),
            error: id.is_error(),
            fd: frame.kind() == FrameKind::Fd,
            len: frame.len(),
            data: hex::encode_upper(frame.data()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cansock::{CanId, CanInterface};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_frame_row() {
        let frame = CanFrame::new(
            CanInterface::with_name(3, "can0"),
            CanId::new(0x30001).set_eff(),
            vec![0x00, 0x91],
        )
        .unwrap();

        assert_eq!(
            FrameRow::from(&frame),
            FrameRow {
                ifindex: 3,
                interface: Some("can0".into()),
                id: "30001".into(),
                extended: true,
                rtr: false,
                error: false,
                fd: false,
                len: 2,
                data: "0091".into(),
            }
        );
    }

    #[test]
    fn test_frame_row_json() {
        let frame = CanFrame::new(
            CanInterface::from_index(7),
            CanId::new(0x123).set_rtr(),
            Vec::<u8>::new(),
        )
        .unwrap();
        let json = serde_json::to_value(FrameRow::from(&frame)).unwrap();
        assert_eq!(json["id"], "123");
        assert_eq!(json["rtr"], true);
        assert_eq!(json["interface"], serde_json::Value::Null);
        assert_eq!(json["data"], "");
    }
}
