//! The per-connection worker thread.
//!
//! Every socket event, timer, and caller command for one connection is
//! serialized onto this thread, so the lifecycle state, the merge buffer,
//! and the outstanding-request tables never see concurrent mutation.
//! Timers are plain deadlines: the loop computes the nearest one and waits
//! on the command channel with that timeout.

use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use hublink_codec::unpack;
use hublink_frame::{
    decode_packet, encode_packet, Packet, PacketHeader, SequenceCounter, BROADCAST_UID,
    CALLBACK_ENUMERATE, FUNCTION_DISCONNECT_PROBE, FUNCTION_ENUMERATE, HEADER_SIZE,
};
use hublink_transport::{is_reset_by_peer, GatewaySocket, TransportError};
use tracing::{debug, info, warn};

use crate::connection::{ConnectionConfig, Shared};
use crate::device::{lock, Device, DeviceRegistry, PendingRequest};
use crate::error::ErrorCode;
use crate::event::{
    ConnectReason, ConnectionState, DisconnectReason, EnumerateEvent, ENUMERATE_FORMAT,
};
use crate::{ErrorCallback, ResponseCallback};

/// Caller-issued operations, executed on the worker thread.
pub(crate) enum Command {
    Connect {
        host: String,
        port: u16,
        on_error: Option<ErrorCallback>,
    },
    Disconnect {
        on_error: Option<ErrorCallback>,
    },
    Enumerate,
    SendRequest {
        device: Device,
        function_id: u8,
        payload: Bytes,
        unpack_format: String,
        on_success: Option<ResponseCallback>,
        on_error: Option<ErrorCallback>,
    },
    OnConnected(Box<dyn FnMut(ConnectReason) + Send + 'static>),
    OnDisconnected(Box<dyn FnMut(DisconnectReason) + Send + 'static>),
    OnEnumerate(Box<dyn FnMut(EnumerateEvent) + Send + 'static>),
    Shutdown,
}

/// Everything the worker can wake up for.
///
/// Socket events carry the generation of the socket they came from; events
/// from a torn-down socket are dropped instead of corrupting the state of
/// its successor.
pub(crate) enum WorkerEvent {
    Command(Command),
    ConnectFinished {
        generation: u64,
        result: Result<GatewaySocket, TransportError>,
    },
    Data {
        generation: u64,
        bytes: Vec<u8>,
    },
    ResetByPeer {
        generation: u64,
    },
    Closed {
        generation: u64,
    },
}

pub(crate) struct Worker {
    rx: Receiver<WorkerEvent>,
    tx: Sender<WorkerEvent>,
    shared: Arc<Shared>,
    devices: DeviceRegistry,
    config: ConnectionConfig,

    generation: u64,
    socket: Option<GatewaySocket>,
    merge_buf: BytesMut,
    sequence: SequenceCounter,

    endpoint: Option<(String, u16)>,
    attempt: Option<ConnectReason>,
    connect_error_cb: Option<ErrorCallback>,
    disconnect_requested: bool,

    probe_at: Option<Instant>,
    retry_at: Option<Instant>,

    on_connected: Option<Box<dyn FnMut(ConnectReason) + Send + 'static>>,
    on_disconnected: Option<Box<dyn FnMut(DisconnectReason) + Send + 'static>>,
    on_enumerate: Option<Box<dyn FnMut(EnumerateEvent) + Send + 'static>>,
}

impl Worker {
    pub(crate) fn new(
        rx: Receiver<WorkerEvent>,
        tx: Sender<WorkerEvent>,
        shared: Arc<Shared>,
        devices: DeviceRegistry,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            rx,
            tx,
            shared,
            devices,
            config,
            generation: 0,
            socket: None,
            merge_buf: BytesMut::new(),
            sequence: SequenceCounter::new(),
            endpoint: None,
            attempt: None,
            connect_error_cb: None,
            disconnect_requested: false,
            probe_at: None,
            retry_at: None,
            on_connected: None,
            on_disconnected: None,
            on_enumerate: None,
        }
    }

    pub(crate) fn run(mut self) {
        loop {
            self.fire_due_timers(Instant::now());

            let event = match self.next_deadline() {
                Some(deadline) => {
                    let now = Instant::now();
                    if deadline <= now {
                        continue;
                    }
                    match self.rx.recv_timeout(deadline - now) {
                        Ok(event) => event,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match self.rx.recv() {
                    Ok(event) => event,
                    Err(_) => break,
                },
            };

            match event {
                WorkerEvent::Command(Command::Shutdown) => break,
                WorkerEvent::Command(command) => self.handle_command(command),
                WorkerEvent::ConnectFinished { generation, result } => {
                    self.handle_connect_finished(generation, result)
                }
                WorkerEvent::Data { generation, bytes } => self.handle_data(generation, bytes),
                WorkerEvent::ResetByPeer { generation } => {
                    if generation == self.generation {
                        self.fire_disconnected(DisconnectReason::Shutdown);
                    }
                }
                WorkerEvent::Closed { generation } => self.handle_closed(generation),
            }
        }

        if let Some(socket) = self.socket.take() {
            socket.shutdown();
        }
        self.shared.set_state(ConnectionState::Disconnected);
    }

    // ---- commands ----------------------------------------------------------

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect {
                host,
                port,
                on_error,
            } => self.handle_connect(host, port, on_error),
            Command::Disconnect { on_error } => self.handle_disconnect(on_error),
            Command::Enumerate => self.handle_enumerate(),
            Command::SendRequest {
                device,
                function_id,
                payload,
                unpack_format,
                on_success,
                on_error,
            } => self.handle_send_request(
                device,
                function_id,
                payload,
                unpack_format,
                on_success,
                on_error,
            ),
            Command::OnConnected(callback) => self.on_connected = Some(callback),
            Command::OnDisconnected(callback) => self.on_disconnected = Some(callback),
            Command::OnEnumerate(callback) => self.on_enumerate = Some(callback),
            Command::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    fn handle_connect(&mut self, host: String, port: u16, on_error: Option<ErrorCallback>) {
        match self.shared.state() {
            ConnectionState::Connected => {
                fail(on_error, ErrorCode::AlreadyConnected);
                return;
            }
            ConnectionState::Pending => {
                fail(on_error, ErrorCode::AutoReconnectInProgress);
                return;
            }
            ConnectionState::Disconnected if self.attempt.is_some() => {
                fail(on_error, ErrorCode::AlreadyConnected);
                return;
            }
            ConnectionState::Disconnected => {}
        }

        self.endpoint = Some((host, port));
        self.connect_error_cb = on_error;
        self.disconnect_requested = false;
        self.start_connect_attempt(ConnectReason::Request);
    }

    fn handle_disconnect(&mut self, on_error: Option<ErrorCallback>) {
        if self.shared.state() != ConnectionState::Connected {
            fail(on_error, ErrorCode::AlreadyDisconnected);
            return;
        }

        self.disconnect_requested = true;
        self.retry_at = None;
        // One last probe so the peer sees traffic before the close; errors
        // here are irrelevant, the socket is going away either way.
        self.send_probe();
        if let Some(socket) = self.socket.as_ref() {
            socket.shutdown();
        }
        // Completion is reported from the reader's close event.
    }

    fn handle_enumerate(&mut self) {
        if self.shared.state() != ConnectionState::Connected {
            debug!("enumerate while not connected; dropped");
            return;
        }
        let sequence = self.sequence.next();
        let auth = self.shared.has_auth_key();
        match PacketHeader::request(BROADCAST_UID, 0, FUNCTION_ENUMERATE, sequence, false, auth) {
            Ok(header) => self.write_packet(&header, &[]),
            Err(err) => debug!(?err, "enumerate header rejected"),
        }
    }

    fn handle_send_request(
        &mut self,
        device: Device,
        function_id: u8,
        payload: Bytes,
        unpack_format: String,
        on_success: Option<ResponseCallback>,
        on_error: Option<ErrorCallback>,
    ) {
        if self.shared.state() != ConnectionState::Connected {
            fail(on_error, ErrorCode::NotConnected);
            return;
        }

        let response_expected = match device.response_expected(function_id) {
            Ok(expected) => expected,
            Err(code) => {
                fail(on_error, code);
                return;
            }
        };

        let sequence = self.sequence.next();
        let auth = device.has_auth_key() || self.shared.has_auth_key();
        let header = match PacketHeader::request(
            device.uid(),
            payload.len(),
            function_id,
            sequence,
            response_expected,
            auth,
        ) {
            Ok(header) => header,
            Err(err) => {
                // Payload size is validated before the command is queued.
                debug!(?err, "request header rejected");
                return;
            }
        };

        if response_expected {
            device.pending().push(PendingRequest {
                function_id,
                sequence,
                unpack_format,
                deadline: Instant::now() + self.shared.request_timeout(),
                on_success,
                on_error,
            });
        }

        self.write_packet(&header, &payload);
    }

    // ---- connect / teardown ------------------------------------------------

    fn start_connect_attempt(&mut self, reason: ConnectReason) {
        let Some((host, port)) = self.endpoint.clone() else {
            return;
        };
        self.generation += 1;
        self.attempt = Some(reason);

        let generation = self.generation;
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let result = GatewaySocket::connect(&host, port);
            let _ = tx.send(WorkerEvent::ConnectFinished { generation, result });
        });
    }

    fn handle_connect_finished(
        &mut self,
        generation: u64,
        result: Result<GatewaySocket, TransportError>,
    ) {
        if generation != self.generation {
            // A teardown raced the attempt; close the orphan socket.
            if let Ok(socket) = result {
                socket.shutdown();
            }
            return;
        }

        let reason = self.attempt.take().unwrap_or(ConnectReason::Request);
        let socket = match result {
            Ok(socket) => socket,
            Err(err) => {
                self.handle_connect_failed(reason, err);
                return;
            }
        };

        let reader = match socket.try_clone() {
            Ok(reader) => reader,
            Err(err) => {
                socket.shutdown();
                self.handle_connect_failed(reason, err);
                return;
            }
        };
        self.spawn_reader(reader, self.generation);

        if let Ok(peer) = socket.peer_addr() {
            info!(%peer, ?reason, "connected");
        }
        self.socket = Some(socket);
        self.merge_buf.clear();
        self.disconnect_requested = false;
        self.retry_at = None;
        self.probe_at = Some(Instant::now() + self.config.probe_interval);
        self.connect_error_cb = None;
        self.shared.set_state(ConnectionState::Connected);
        self.fire_connected(reason);
    }

    fn handle_connect_failed(&mut self, reason: ConnectReason, err: TransportError) {
        match reason {
            ConnectReason::Request => {
                warn!(%err, "connect failed");
                self.shared.set_state(ConnectionState::Disconnected);
                if self.on_disconnected.is_some() {
                    self.connect_error_cb = None;
                    self.fire_disconnected(DisconnectReason::Error);
                } else {
                    fail(self.connect_error_cb.take(), ErrorCode::ConnectFailed);
                }
            }
            ConnectReason::AutoReconnect => {
                debug!(%err, "reconnect attempt failed; retrying");
                self.retry_at = Some(Instant::now() + self.config.retry_interval);
            }
        }
    }

    /// Drop the current socket and everything tied to it. Events still in
    /// flight from its reader carry the old generation and are ignored.
    fn teardown_socket(&mut self) {
        self.generation += 1;
        if let Some(socket) = self.socket.take() {
            socket.shutdown();
        }
        self.merge_buf.clear();
        self.probe_at = None;
    }

    fn handle_closed(&mut self, generation: u64) {
        if generation != self.generation {
            return;
        }
        let was_connected = self.shared.state() == ConnectionState::Connected;
        self.teardown_socket();

        if self.disconnect_requested {
            self.disconnect_requested = false;
            self.clear_pending_requests();
            self.shared.set_state(ConnectionState::Disconnected);
            info!("disconnected");
            self.fire_disconnected(DisconnectReason::Request);
            return;
        }

        if !was_connected {
            return;
        }

        if self.shared.auto_reconnect() && self.endpoint.is_some() {
            self.shared.set_state(ConnectionState::Pending);
            warn!("connection lost; auto-reconnect armed");
            self.retry_at = Some(Instant::now() + self.config.retry_interval);
            self.fire_disconnected(DisconnectReason::Error);
        } else {
            self.shared.set_state(ConnectionState::Disconnected);
            warn!("connection lost");
            self.fire_disconnected(DisconnectReason::Error);
        }
    }

    fn spawn_reader(&self, mut socket: GatewaySocket, generation: u64) {
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let mut buf = [0u8; 8192];
            loop {
                match socket.read(&mut buf) {
                    Ok(0) => {
                        let _ = tx.send(WorkerEvent::Closed { generation });
                        break;
                    }
                    Ok(n) => {
                        let bytes = buf[..n].to_vec();
                        if tx.send(WorkerEvent::Data { generation, bytes }).is_err() {
                            break;
                        }
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        if is_reset_by_peer(&err) {
                            let _ = tx.send(WorkerEvent::ResetByPeer { generation });
                        }
                        let _ = tx.send(WorkerEvent::Closed { generation });
                        break;
                    }
                }
            }
        });
    }

    // ---- receive path ------------------------------------------------------

    fn handle_data(&mut self, generation: u64, bytes: Vec<u8>) {
        if generation != self.generation {
            return;
        }
        self.merge_buf.extend_from_slice(&bytes);

        loop {
            match decode_packet(&mut self.merge_buf) {
                Ok(Some(packet)) => self.route_packet(packet),
                Ok(None) => break,
                Err(err) => {
                    // The stream cannot be re-synchronized; force a close and
                    // let the regular close handling run.
                    warn!(%err, "corrupt packet stream");
                    if let Some(socket) = self.socket.as_ref() {
                        socket.shutdown();
                    }
                    break;
                }
            }
        }
    }

    fn route_packet(&mut self, packet: Packet) {
        if packet.header.is_callback() {
            self.dispatch_callback(packet);
        } else {
            self.handle_response(packet);
        }
    }

    fn handle_response(&mut self, packet: Packet) {
        let header = packet.header;
        let Some(device) = lock(&self.devices).get(&header.uid).cloned() else {
            debug!(uid = header.uid, "response for unknown device dropped");
            return;
        };

        let request = {
            let mut pending = device.pending();
            let position = pending.iter().position(|request| {
                request.function_id == header.function_id && request.sequence == header.sequence
            });
            match position {
                Some(index) => pending.remove(index),
                None => {
                    debug!(
                        uid = header.uid,
                        function_id = header.function_id,
                        sequence = header.sequence,
                        "unmatched response dropped"
                    );
                    return;
                }
            }
        };

        match header.error_code {
            0 => match unpack(&packet.payload, &request.unpack_format) {
                Ok(values) => {
                    if let Some(on_success) = request.on_success {
                        on_success(values);
                    }
                }
                Err(err) => debug!(%err, "undecodable response dropped"),
            },
            1 => fail(request.on_error, ErrorCode::InvalidParameter),
            2 => fail(request.on_error, ErrorCode::FunctionNotSupported),
            code => debug!(code, "response with unknown error code dropped"),
        }
    }

    fn dispatch_callback(&mut self, packet: Packet) {
        let header = packet.header;

        if header.function_id == CALLBACK_ENUMERATE {
            match unpack(&packet.payload, ENUMERATE_FORMAT) {
                Ok(values) => match EnumerateEvent::from_values(&values) {
                    Some(event) => {
                        if let Some(on_enumerate) = self.on_enumerate.as_mut() {
                            on_enumerate(event);
                        }
                    }
                    None => debug!("malformed enumerate callback dropped"),
                },
                Err(err) => debug!(%err, "undecodable enumerate callback dropped"),
            }
            return;
        }

        let Some(device) = lock(&self.devices).get(&header.uid).cloned() else {
            debug!(uid = header.uid, "callback for unknown device dropped");
            return;
        };
        let Some(handler) = device.handler_for(header.function_id) else {
            debug!(
                uid = header.uid,
                function_id = header.function_id,
                "callback without handler dropped"
            );
            return;
        };
        let Some(format) = device.format_for(header.function_id) else {
            return;
        };

        match unpack(&packet.payload, &format) {
            Ok(values) => {
                let mut handler = lock(&handler);
                (*handler)(values);
            }
            Err(err) => debug!(%err, "undecodable callback dropped"),
        }
    }

    // ---- timers ------------------------------------------------------------

    fn fire_due_timers(&mut self, now: Instant) {
        if self.retry_at.is_some_and(|at| at <= now) {
            self.retry_at = None;
            if self.shared.state() == ConnectionState::Pending {
                self.start_connect_attempt(ConnectReason::AutoReconnect);
            }
        }

        if self.probe_at.is_some_and(|at| at <= now) {
            if self.shared.state() == ConnectionState::Connected {
                self.send_probe();
                self.probe_at = Some(now + self.config.probe_interval);
            } else {
                self.probe_at = None;
            }
        }

        self.fire_expired_requests(now);
    }

    fn fire_expired_requests(&mut self, now: Instant) {
        let mut expired: Vec<ErrorCallback> = Vec::new();
        let devices: Vec<Device> = lock(&self.devices).values().cloned().collect();
        for device in devices {
            let mut pending = device.pending();
            let mut index = 0;
            while index < pending.len() {
                if pending[index].deadline <= now {
                    let request = pending.remove(index);
                    debug!(
                        uid = device.uid(),
                        function_id = request.function_id,
                        sequence = request.sequence,
                        "request timed out"
                    );
                    if let Some(on_error) = request.on_error {
                        expired.push(on_error);
                    }
                } else {
                    index += 1;
                }
            }
        }
        for on_error in expired {
            on_error(ErrorCode::Timeout);
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        let mut next = min_opt(self.probe_at, self.retry_at);
        for device in lock(&self.devices).values() {
            for request in device.pending().iter() {
                next = min_opt(next, Some(request.deadline));
            }
        }
        next
    }

    // ---- wire helpers ------------------------------------------------------

    fn send_probe(&mut self) {
        let sequence = self.sequence.next();
        let auth = self.shared.has_auth_key();
        match PacketHeader::request(
            BROADCAST_UID,
            0,
            FUNCTION_DISCONNECT_PROBE,
            sequence,
            false,
            auth,
        ) {
            Ok(header) => self.write_packet(&header, &[]),
            Err(err) => debug!(?err, "probe header rejected"),
        }
    }

    fn write_packet(&mut self, header: &PacketHeader, payload: &[u8]) {
        let Some(socket) = self.socket.as_mut() else {
            return;
        };
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        if let Err(err) = encode_packet(header, payload, &mut buf) {
            debug!(?err, "packet encoding rejected");
            return;
        }
        if let Err(err) = socket.write_all(&buf) {
            warn!(%err, "socket write failed");
            socket.shutdown();
        }
    }

    fn clear_pending_requests(&mut self) {
        let devices: Vec<Device> = lock(&self.devices).values().cloned().collect();
        for device in devices {
            device.pending().clear();
        }
    }

    // ---- callback plumbing -------------------------------------------------

    fn fire_connected(&mut self, reason: ConnectReason) {
        if let Some(on_connected) = self.on_connected.as_mut() {
            on_connected(reason);
        }
    }

    fn fire_disconnected(&mut self, reason: DisconnectReason) {
        if let Some(on_disconnected) = self.on_disconnected.as_mut() {
            on_disconnected(reason);
        }
    }
}

fn fail(on_error: Option<ErrorCallback>, code: ErrorCode) {
    match on_error {
        Some(on_error) => on_error(code),
        None => debug!(code = code.code(), "unhandled operation error"),
    }
}

fn min_opt(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
