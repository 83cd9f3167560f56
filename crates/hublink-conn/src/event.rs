use hublink_codec::Value;

/// Unpack format of the broadcast enumerate callback payload.
pub const ENUMERATE_FORMAT: &str = "s8 s8 c B3 B3 H B";

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connected = 1,
    /// Auto-reconnect in progress.
    Pending = 2,
}

impl ConnectionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connected,
            2 => ConnectionState::Pending,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Why the connected callback fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectReason {
    /// An explicit `connect` call succeeded.
    Request,
    /// An auto-reconnect attempt succeeded.
    AutoReconnect,
}

/// Why the disconnected callback fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// An explicit `disconnect` call completed.
    Request,
    /// The connection was lost or a connect attempt failed.
    Error,
    /// The peer reset the connection.
    Shutdown,
}

/// Presence change reported by an enumerate callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationType {
    Available = 0,
    Connected = 1,
    Disconnected = 2,
}

impl EnumerationType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(EnumerationType::Available),
            1 => Some(EnumerationType::Connected),
            2 => Some(EnumerationType::Disconnected),
            _ => None,
        }
    }
}

/// One decoded broadcast enumerate callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerateEvent {
    /// Identifier of the enumerated device.
    pub uid: String,
    /// Identifier of the device it is attached to.
    pub connected_uid: String,
    /// Attachment position.
    pub position: char,
    pub hardware_version: [u8; 3],
    pub firmware_version: [u8; 3],
    /// Numeric device type code.
    pub device_identifier: u16,
    pub enumeration_type: EnumerationType,
}

impl EnumerateEvent {
    /// Build an event from the values decoded with [`ENUMERATE_FORMAT`].
    ///
    /// Returns `None` when the argument shape does not match; the dispatcher
    /// drops such packets.
    pub(crate) fn from_values(values: &[Value]) -> Option<Self> {
        if values.len() != 7 {
            return None;
        }
        Some(Self {
            uid: values[0].as_str()?.to_string(),
            connected_uid: values[1].as_str()?.to_string(),
            position: values[2].as_char()?,
            hardware_version: version_triple(&values[3])?,
            firmware_version: version_triple(&values[4])?,
            device_identifier: values[5].as_u16()?,
            enumeration_type: EnumerationType::from_u8(values[6].as_u8()?)?,
        })
    }
}

fn version_triple(value: &Value) -> Option<[u8; 3]> {
    let list = value.as_list()?;
    if list.len() != 3 {
        return None;
    }
    Some([list[0].as_u8()?, list[1].as_u8()?, list[2].as_u8()?])
}
