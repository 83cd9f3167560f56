use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use hublink_codec::Value;

use crate::error::ErrorCode;
use crate::{ErrorCallback, ResponseCallback};

/// Per-function callback handler registered on a device.
///
/// Stored behind its own lock so the dispatcher can invoke it without
/// holding the table lock (a handler may re-register callbacks).
pub(crate) type CallbackHandler = Arc<Mutex<dyn FnMut(Vec<Value>) + Send + 'static>>;

/// All devices registered on one connection, keyed by identity.
pub(crate) type DeviceRegistry = Arc<Mutex<HashMap<u32, Device>>>;

/// One outstanding request awaiting its response.
///
/// Owned by the addressed device's table; created and resolved only by the
/// connection worker. At most one record matches a given
/// (identity, function id, sequence number) tuple at a time.
pub(crate) struct PendingRequest {
    pub function_id: u8,
    pub sequence: u8,
    pub unpack_format: String,
    pub deadline: Instant,
    pub on_success: Option<ResponseCallback>,
    pub on_error: Option<ErrorCallback>,
}

/// An addressable peripheral endpoint behind the gateway.
///
/// Cheap to clone; clones share the same tables. Device bindings seed the
/// response-expected policy per function id and register callback handlers
/// with their decode formats; the connection core consumes both.
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

struct DeviceInner {
    uid: u32,
    response_expected: Mutex<HashMap<u8, bool>>,
    handlers: Mutex<HashMap<u8, CallbackHandler>>,
    formats: Mutex<HashMap<u8, String>>,
    pending: Mutex<Vec<PendingRequest>>,
    auth_key: Mutex<Option<String>>,
}

impl Device {
    /// Create a device with the given identity and register it on the
    /// connection.
    pub fn new(uid: u32, connection: &crate::Connection) -> Self {
        let device = Self {
            inner: Arc::new(DeviceInner {
                uid,
                response_expected: Mutex::new(HashMap::new()),
                handlers: Mutex::new(HashMap::new()),
                formats: Mutex::new(HashMap::new()),
                pending: Mutex::new(Vec::new()),
                auth_key: Mutex::new(None),
            }),
        };
        connection.register_device(&device);
        device
    }

    /// The 32-bit device identity.
    pub fn uid(&self) -> u32 {
        self.inner.uid
    }

    /// Set whether a given function id expects a response packet.
    pub fn set_response_expected(&self, function_id: u8, expected: bool) {
        lock(&self.inner.response_expected).insert(function_id, expected);
    }

    /// Whether a response is expected for this function id.
    ///
    /// Fails with [`ErrorCode::InvalidFunctionId`] when no policy is known,
    /// which aborts the outgoing packet before anything hits the wire.
    pub fn response_expected(&self, function_id: u8) -> Result<bool, ErrorCode> {
        lock(&self.inner.response_expected)
            .get(&function_id)
            .copied()
            .ok_or(ErrorCode::InvalidFunctionId)
    }

    /// Register a callback handler and its decode format for a function id.
    ///
    /// An empty format means the handler is invoked with no arguments.
    pub fn register_callback(
        &self,
        function_id: u8,
        format: &str,
        handler: impl FnMut(Vec<Value>) + Send + 'static,
    ) {
        lock(&self.inner.handlers).insert(function_id, Arc::new(Mutex::new(handler)));
        lock(&self.inner.formats).insert(function_id, format.to_string());
    }

    /// Set or clear this device's authentication key (sets the informational
    /// auth bit on packets addressed to it).
    pub fn set_auth_key(&self, key: Option<String>) {
        *lock(&self.inner.auth_key) = key;
    }

    pub(crate) fn has_auth_key(&self) -> bool {
        lock(&self.inner.auth_key).is_some()
    }

    pub(crate) fn handler_for(&self, function_id: u8) -> Option<CallbackHandler> {
        lock(&self.inner.handlers).get(&function_id).cloned()
    }

    pub(crate) fn format_for(&self, function_id: u8) -> Option<String> {
        lock(&self.inner.formats).get(&function_id).cloned()
    }

    pub(crate) fn pending(&self) -> MutexGuard<'_, Vec<PendingRequest>> {
        lock(&self.inner.pending)
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device").field("uid", &self.inner.uid).finish()
    }
}

/// Lock a mutex, recovering the data if a callback panicked while holding it.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
