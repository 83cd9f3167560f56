use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use hublink_conn::{EnumerateEvent, EnumerationType};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EventOutput<'a> {
    uid: &'a str,
    connected_uid: &'a str,
    position: char,
    hardware_version: String,
    firmware_version: String,
    device_identifier: u16,
    enumeration_type: &'static str,
}

impl<'a> EventOutput<'a> {
    fn from_event(event: &'a EnumerateEvent) -> Self {
        Self {
            uid: &event.uid,
            connected_uid: &event.connected_uid,
            position: event.position,
            hardware_version: version_string(event.hardware_version),
            firmware_version: version_string(event.firmware_version),
            device_identifier: event.device_identifier,
            enumeration_type: type_name(event.enumeration_type),
        }
    }
}

/// Print one enumerate event in the selected format.
pub fn print_event(event: &EnumerateEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = EventOutput::from_event(event);
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = event_table();
            add_event_row(&mut table, event);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "uid={} parent={} position={} hw={} fw={} type={} ({})",
                event.uid,
                event.connected_uid,
                event.position,
                version_string(event.hardware_version),
                version_string(event.firmware_version),
                event.device_identifier,
                type_name(event.enumeration_type),
            );
        }
        OutputFormat::Raw => println!("{}", event.uid),
    }
}

/// Print a batch of enumerate events, one table for all of them.
pub fn print_events(events: &[EnumerateEvent], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = event_table();
            for event in events {
                add_event_row(&mut table, event);
            }
            println!("{table}");
        }
        _ => {
            for event in events {
                print_event(event, format);
            }
        }
    }
}

fn event_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["UID", "PARENT", "POS", "HW", "FW", "DEVICE", "TYPE"]);
    table
}

fn add_event_row(table: &mut Table, event: &EnumerateEvent) {
    table.add_row(vec![
        event.uid.clone(),
        event.connected_uid.clone(),
        event.position.to_string(),
        version_string(event.hardware_version),
        version_string(event.firmware_version),
        event.device_identifier.to_string(),
        type_name(event.enumeration_type).to_string(),
    ]);
}

fn version_string(version: [u8; 3]) -> String {
    format!("{}.{}.{}", version[0], version[1], version[2])
}

pub fn type_name(enumeration_type: EnumerationType) -> &'static str {
    match enumeration_type {
        EnumerationType::Available => "available",
        EnumerationType::Connected => "connected",
        EnumerationType::Disconnected => "disconnected",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> EnumerateEvent {
        EnumerateEvent {
            uid: "6wVEsP".to_string(),
            connected_uid: "0".to_string(),
            position: 'a',
            hardware_version: [1, 0, 0],
            firmware_version: [2, 0, 4],
            device_identifier: 13,
            enumeration_type: EnumerationType::Available,
        }
    }

    #[test]
    fn json_output_serializes() {
        let event = sample_event();
        let out = EventOutput::from_event(&event);
        let json = serde_json::to_string(&out).expect("event output should serialize");
        assert!(json.contains("\"uid\":\"6wVEsP\""));
        assert!(json.contains("\"hardware_version\":\"1.0.0\""));
        assert!(json.contains("\"enumeration_type\":\"available\""));
    }

    #[test]
    fn version_formatting() {
        assert_eq!(version_string([2, 0, 4]), "2.0.4");
    }
}
