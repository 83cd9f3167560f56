use std::sync::mpsc;
use std::time::Duration;

use clap::{Args, Subcommand};
use hublink_conn::{Connection, EnumerateEvent};

use crate::exit::{protocol_error, CliError, CliResult, TIMEOUT, USAGE};
use crate::output::OutputFormat;

pub mod enumerate;
pub mod envinfo;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Discover devices behind a gateway.
    Enumerate(EnumerateArgs),
    /// Stream device presence changes until interrupted.
    Watch(WatchArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Print build and environment diagnostics.
    Envinfo(EnvinfoArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Enumerate(args) => enumerate::run(args, format),
        Command::Watch(args) => watch::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Envinfo(args) => envinfo::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct GatewayArgs {
    /// Gateway host.
    #[arg(default_value = "localhost")]
    pub host: String,
    /// Gateway port.
    #[arg(long, short = 'p', default_value = "4223", env = "HUBLINK_PORT")]
    pub port: u16,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct EnumerateArgs {
    #[command(flatten)]
    pub gateway: GatewayArgs,
    /// How long to collect enumerate callbacks (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub window: String,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub gateway: GatewayArgs,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {}

/// Open a connection and wait for it to come up, with enumerate callbacks
/// routed into a channel the command loops can drain.
pub(crate) fn connect_gateway(
    args: &GatewayArgs,
) -> CliResult<(Connection, mpsc::Receiver<EnumerateEvent>)> {
    let timeout = parse_duration(&args.timeout)?;
    let connection = Connection::new();

    let (event_tx, event_rx) = mpsc::channel();
    connection.on_enumerate(move |event| {
        let _ = event_tx.send(event);
    });

    let (status_tx, status_rx) = mpsc::channel();
    let connected_tx = status_tx.clone();
    connection.on_connected(move |_| {
        let _ = connected_tx.send(Ok(()));
    });
    connection.connect(
        &args.host,
        args.port,
        Some(Box::new(move |code| {
            let _ = status_tx.send(Err(code));
        })),
    );

    match status_rx.recv_timeout(timeout) {
        Ok(Ok(())) => Ok((connection, event_rx)),
        Ok(Err(code)) => Err(protocol_error("connect failed", code)),
        Err(_) => Err(CliError::new(
            TIMEOUT,
            format!("connect to {}:{} timed out", args.host, args.port),
        )),
    }
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(USAGE, format!("invalid duration unit: {input}"))),
    }
}
