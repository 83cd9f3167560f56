use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use hublink_codec::Value;
use hublink_frame::{FrameError, MAX_PAYLOAD};
use tracing::debug;

use crate::device::{lock, Device, DeviceRegistry};
use crate::error::RequestError;
use crate::event::{ConnectReason, ConnectionState, DisconnectReason, EnumerateEvent};
use crate::worker::{Command, Worker, WorkerEvent};
use crate::{ErrorCallback, ResponseCallback};

/// Tunable connection parameters.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Deadline for each request expecting a response. Default: 2500 ms.
    pub request_timeout: Duration,
    /// Whether an unrequested disconnect triggers reconnect attempts.
    pub auto_reconnect: bool,
    /// Interval between disconnect-probe packets. Default: 5000 ms.
    pub probe_interval: Duration,
    /// Interval between auto-reconnect attempts. Default: 2000 ms.
    pub retry_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(2500),
            auto_reconnect: true,
            probe_interval: Duration::from_millis(5000),
            retry_interval: Duration::from_millis(2000),
        }
    }
}

/// State observable from outside the worker thread.
pub(crate) struct Shared {
    state: AtomicU8,
    auto_reconnect: AtomicBool,
    timeout_ms: AtomicU64,
    auth_key: Mutex<Option<String>>,
}

impl Shared {
    fn new(config: &ConnectionConfig) -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            auto_reconnect: AtomicBool::new(config.auto_reconnect),
            timeout_ms: AtomicU64::new(config.request_timeout.as_millis() as u64),
            auth_key: Mutex::new(None),
        }
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub(crate) fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn auto_reconnect(&self) -> bool {
        self.auto_reconnect.load(Ordering::SeqCst)
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::SeqCst))
    }

    pub(crate) fn has_auth_key(&self) -> bool {
        lock(&self.auth_key).is_some()
    }
}

/// A connection to one gateway.
///
/// All protocol work happens on a dedicated worker thread owned by this
/// handle; every operation returns immediately and reports its outcome
/// through caller-supplied callbacks. Dropping the handle stops the worker
/// and tears down the socket.
pub struct Connection {
    tx: mpsc::Sender<WorkerEvent>,
    shared: Arc<Shared>,
    devices: DeviceRegistry,
    worker: Option<JoinHandle<()>>,
}

impl Connection {
    /// Create a connection with default configuration. No socket is opened
    /// until [`connect`](Self::connect) is called.
    pub fn new() -> Self {
        Self::with_config(ConnectionConfig::default())
    }

    /// Create a connection with explicit configuration.
    pub fn with_config(config: ConnectionConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(Shared::new(&config));
        let devices: DeviceRegistry = Arc::new(Mutex::new(Default::default()));

        let worker = Worker::new(rx, tx.clone(), shared.clone(), devices.clone(), config);
        let handle = std::thread::spawn(move || worker.run());

        Self {
            tx,
            shared,
            devices,
            worker: Some(handle),
        }
    }

    /// Open a connection to `host:port`.
    ///
    /// Rejected via `on_error` with [`AlreadyConnected`] while connected and
    /// [`AutoReconnectInProgress`] while an auto-reconnect is pending.
    /// Success is reported through the connected callback; a failed attempt
    /// through the disconnected callback (or `on_error` with
    /// [`ConnectFailed`] when none is registered).
    ///
    /// [`AlreadyConnected`]: crate::ErrorCode::AlreadyConnected
    /// [`AutoReconnectInProgress`]: crate::ErrorCode::AutoReconnectInProgress
    /// [`ConnectFailed`]: crate::ErrorCode::ConnectFailed
    pub fn connect(&self, host: &str, port: u16, on_error: Option<ErrorCallback>) {
        self.send(Command::Connect {
            host: host.to_string(),
            port,
            on_error,
        });
    }

    /// Close the connection.
    ///
    /// Rejected via `on_error` with
    /// [`AlreadyDisconnected`](crate::ErrorCode::AlreadyDisconnected) when
    /// not connected. Completion is reported through the disconnected
    /// callback with [`DisconnectReason::Request`]; all outstanding requests
    /// are cleared and their timers canceled.
    pub fn disconnect(&self, on_error: Option<ErrorCallback>) {
        self.send(Command::Disconnect { on_error });
    }

    /// Broadcast an enumerate request. Discovered devices are reported
    /// through the enumerate callback. Ignored while not connected.
    pub fn enumerate(&self) {
        self.send(Command::Enumerate);
    }

    /// Send a request to a device.
    ///
    /// Returns immediately; the decoded response arrives via `on_success`,
    /// failures ([`NotConnected`](crate::ErrorCode::NotConnected),
    /// [`Timeout`](crate::ErrorCode::Timeout), protocol errors) via
    /// `on_error`. Only malformed local arguments are reported synchronously.
    #[allow(clippy::too_many_arguments)]
    pub fn send_request(
        &self,
        device: &Device,
        function_id: u8,
        args: &[Value],
        pack_format: &str,
        unpack_format: &str,
        on_success: Option<ResponseCallback>,
        on_error: Option<ErrorCallback>,
    ) -> Result<(), RequestError> {
        let payload = hublink_codec::pack(args, pack_format)?;
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD,
            }
            .into());
        }

        self.send(Command::SendRequest {
            device: device.clone(),
            function_id,
            payload,
            unpack_format: unpack_format.to_string(),
            on_success,
            on_error,
        });
        Ok(())
    }

    /// Register the connected callback.
    pub fn on_connected(&self, callback: impl FnMut(ConnectReason) + Send + 'static) {
        self.send(Command::OnConnected(Box::new(callback)));
    }

    /// Register the disconnected callback.
    pub fn on_disconnected(&self, callback: impl FnMut(DisconnectReason) + Send + 'static) {
        self.send(Command::OnDisconnected(Box::new(callback)));
    }

    /// Register the broadcast enumerate callback.
    pub fn on_enumerate(&self, callback: impl FnMut(EnumerateEvent) + Send + 'static) {
        self.send(Command::OnEnumerate(Box::new(callback)));
    }

    /// Current lifecycle state.
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Enable or disable auto-reconnect. Takes effect on the next
    /// unrequested disconnect.
    pub fn set_auto_reconnect(&self, enabled: bool) {
        self.shared.auto_reconnect.store(enabled, Ordering::SeqCst);
    }

    pub fn auto_reconnect(&self) -> bool {
        self.shared.auto_reconnect()
    }

    /// Set the per-request response deadline. Applies to requests sent after
    /// the change.
    pub fn set_request_timeout(&self, timeout: Duration) {
        self.shared
            .timeout_ms
            .store(timeout.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn request_timeout(&self) -> Duration {
        self.shared.request_timeout()
    }

    /// Set or clear the connection-wide authentication key (sets the
    /// informational auth bit on broadcast packets; no handshake is
    /// performed).
    pub fn set_auth_key(&self, key: Option<String>) {
        *lock(&self.shared.auth_key) = key;
    }

    pub(crate) fn register_device(&self, device: &Device) {
        lock(&self.devices).insert(device.uid(), device.clone());
    }

    fn send(&self, command: Command) {
        // The worker outlives every handle operation; a failed send can only
        // happen during teardown and is deliberately dropped.
        if self.tx.send(WorkerEvent::Command(command)).is_err() {
            debug!("worker gone; command dropped");
        }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.tx.send(WorkerEvent::Command(Command::Shutdown));
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.connection_state())
            .finish()
    }
}
