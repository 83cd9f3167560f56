use std::time::Instant;

use tracing::info;

use crate::cmd::{connect_gateway, parse_duration, EnumerateArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_events, OutputFormat};

pub fn run(args: EnumerateArgs, format: OutputFormat) -> CliResult<i32> {
    let window = parse_duration(&args.window)?;
    let (connection, events) = connect_gateway(&args.gateway)?;

    connection.enumerate();

    let mut discovered = Vec::new();
    let deadline = Instant::now() + window;
    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        match events.recv_timeout(deadline - now) {
            Ok(event) => discovered.push(event),
            Err(_) => break,
        }
    }

    if discovered.is_empty() {
        info!("no devices reported within the window");
    }
    print_events(&discovered, format);

    connection.disconnect(None);
    Ok(SUCCESS)
}
