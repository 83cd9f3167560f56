//! An in-process stand-in for the gateway: a plain TCP listener that speaks
//! the wire format, driven synchronously by the tests.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::time::Duration;

use bytes::BytesMut;
use hublink_frame::{decode_packet, encode_packet, Packet, PacketHeader};

pub const WAIT: Duration = Duration::from_secs(5);

pub struct FakeGateway {
    listener: TcpListener,
}

impl FakeGateway {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        Self { listener }
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().unwrap().port()
    }

    /// Wait for the next inbound connection.
    pub fn accept(&self) -> GatewayPeer {
        let (stream, _) = self.listener.accept().unwrap();
        stream.set_read_timeout(Some(WAIT)).unwrap();
        GatewayPeer {
            stream,
            buf: BytesMut::new(),
        }
    }
}

pub struct GatewayPeer {
    stream: TcpStream,
    buf: BytesMut,
}

impl GatewayPeer {
    /// Read until one whole packet is available.
    pub fn read_packet(&mut self) -> Packet {
        loop {
            if let Some(packet) = decode_packet(&mut self.buf).unwrap() {
                return packet;
            }
            let mut chunk = [0u8; 1024];
            let n = self.stream.read(&mut chunk).unwrap();
            assert!(n > 0, "client closed while a packet was expected");
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Send a response packet correlated by (uid, function id, sequence).
    pub fn send_response(
        &mut self,
        uid: u32,
        function_id: u8,
        sequence: u8,
        error_code: u8,
        payload: &[u8],
    ) {
        let mut header =
            PacketHeader::request(uid, payload.len(), function_id, sequence, false, false).unwrap();
        header.error_code = error_code;
        self.send_raw(&header, payload);
    }

    /// Send an unsolicited callback packet (sequence number zero).
    pub fn send_callback(&mut self, uid: u32, function_id: u8, payload: &[u8]) {
        let header =
            PacketHeader::request(uid, payload.len(), function_id, 0, false, false).unwrap();
        self.send_raw(&header, payload);
    }

    fn send_raw(&mut self, header: &PacketHeader, payload: &[u8]) {
        let mut wire = BytesMut::new();
        encode_packet(header, payload, &mut wire).unwrap();
        self.stream.write_all(&wire).unwrap();
    }

    /// Drop the connection from the gateway side.
    pub fn close(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
