//! Connection core for the hublink gateway protocol.
//!
//! [`Connection`] owns a worker thread that runs the lifecycle state machine
//! (connect, disconnect, auto-reconnect, keepalive probes), correlates
//! requests with responses by sequence number, and dispatches unsolicited
//! callbacks to handlers registered on [`Device`] handles. All outcomes are
//! delivered through caller-supplied callbacks; no operation blocks on the
//! network.

pub mod connection;
pub mod device;
pub mod error;
pub mod event;

pub(crate) mod worker;

pub use connection::{Connection, ConnectionConfig};
pub use device::Device;
pub use error::{ErrorCode, RequestError};
pub use event::{
    ConnectReason, ConnectionState, DisconnectReason, EnumerateEvent, EnumerationType,
    ENUMERATE_FORMAT,
};

pub use hublink_codec::Value;

/// Callback invoked when an operation fails.
pub type ErrorCallback = Box<dyn FnOnce(ErrorCode) + Send + 'static>;

/// Callback invoked with the decoded values of a successful response.
pub type ResponseCallback = Box<dyn FnOnce(Vec<Value>) + Send + 'static>;
