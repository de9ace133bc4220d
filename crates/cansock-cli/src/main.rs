//! cansock - command-line tool for SocketCAN raw sockets
//!
//! Sends, dumps and inspects frames on a CAN interface through the
//! `cansock` library.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use cansock::{create_transport, CanSocket, SocketMode, SocketOption};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::parse::parse_switch;
use crate::commands::SendArgs;
use crate::config::{Config, MergedConfig};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "cansock")]
#[command(author, version, about = "SocketCAN raw socket tool")]
#[command(propagate_version = true)]
struct Cli {
    /// CAN interface name
    #[arg(short, long, env = "CANSOCK_INTERFACE")]
    interface: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "CANSOCK_CONFIG")]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single frame
    Send {
        /// CAN ID in hex (e.g., 123 or 0x18DAF110)
        id: String,

        /// Payload bytes in hex (e.g., 0091 or 00.91)
        #[arg(default_value = "")]
        data: String,

        /// Force an extended (29-bit) identifier
        #[arg(short, long)]
        extended: bool,

        /// Send a remote transmission request
        #[arg(short, long)]
        rtr: bool,

        /// Send a CAN FD frame (up to 64 bytes)
        #[arg(long)]
        fd: bool,
    },

    /// Print received frames (interface "any" listens on all)
    Dump {
        /// Stop after this many frames
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Show the interface MTU
    Mtu,

    /// Resolve an interface name or index
    Iface {
        /// Interface name or numeric index
        target: String,
    },

    /// Set and show raw socket options
    Opts {
        /// Local loopback of sent frames: on or off
        #[arg(long, value_parser = parse_switch)]
        loopback: Option<bool>,

        /// Receive own sent frames: on or off
        #[arg(long, value_parser = parse_switch)]
        recv_own: Option<bool>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };
    let merged = config.merge_with_args(cli.interface.as_deref(), cli.no_color);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let ctx = OutputContext::new(format, merged.no_color);

    match run(&cli.command, &merged, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ctx.error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn run(command: &Commands, merged: &MergedConfig, ctx: &OutputContext) -> Result<()> {
    let mut socket = open_socket(merged)?;
    let interface = merged.interface.as_str();

    match command {
        Commands::Send {
            id,
            data,
            extended,
            rtr,
            fd,
        } => {
            let args = SendArgs {
                id: id.clone(),
                data: data.clone(),
                extended: *extended,
                rtr: *rtr,
                fd: *fd,
            };
            commands::send(&mut socket, interface, &args, ctx)?;
        }

        Commands::Dump { count } => {
            commands::dump(&mut socket, interface, *count, ctx)?;
        }

        Commands::Mtu => {
            commands::mtu(&socket, interface, ctx)?;
        }

        Commands::Iface { target } => {
            commands::iface(&socket, target, ctx)?;
        }

        Commands::Opts { loopback, recv_own } => {
            commands::opts(&mut socket, *loopback, *recv_own, ctx)?;
        }
    }

    socket.close().context("Failed to close socket")?;
    Ok(())
}

/// Open a raw socket and apply the options from the config file
fn open_socket(merged: &MergedConfig) -> Result<CanSocket> {
    let transport = create_transport(&merged.transport).context("Failed to create transport")?;
    let mut socket =
        CanSocket::open(transport, SocketMode::Raw).context("Failed to open CAN socket")?;

    commands::opts::apply(&mut socket, SocketOption::Loopback, merged.loopback)?;
    commands::opts::apply(&mut socket, SocketOption::RecvOwnMsgs, merged.recv_own_msgs)?;
    Ok(socket)
}
