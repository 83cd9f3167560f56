mod common;

use std::sync::mpsc;
use std::time::Duration;

use common::{FakeGateway, GatewayPeer, WAIT};
use hublink_codec::pack;
use hublink_conn::{Connection, Device, ErrorCode, Value};

fn connected(gateway: &FakeGateway) -> (Connection, GatewayPeer) {
    let connection = Connection::new();
    let (tx, rx) = mpsc::channel();
    connection.on_connected(move |_| tx.send(()).unwrap());
    connection.connect("127.0.0.1", gateway.port(), None);
    let peer = gateway.accept();
    rx.recv_timeout(WAIT).unwrap();
    (connection, peer)
}

#[test]
fn request_response_roundtrip() {
    let gateway = FakeGateway::start();
    let (connection, mut peer) = connected(&gateway);

    let device = Device::new(99, &connection);
    device.set_response_expected(3, true);

    let (tx, rx) = mpsc::channel();
    connection
        .send_request(
            &device,
            3,
            &[Value::U16(512)],
            "H",
            "I H",
            Some(Box::new(move |values| tx.send(values).unwrap())),
            None,
        )
        .unwrap();

    let packet = peer.read_packet();
    assert_eq!(packet.header.uid, 99);
    assert_eq!(packet.header.function_id, 3);
    assert!(packet.header.response_expected);
    assert!((1..=15).contains(&packet.header.sequence));
    assert_eq!(packet.payload.as_ref(), &512u16.to_le_bytes());

    let payload = pack(&[Value::U32(7), Value::U16(8)], "I H").unwrap();
    peer.send_response(99, 3, packet.header.sequence, 0, &payload);

    let values = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(values, vec![Value::U32(7), Value::U16(8)]);
}

#[test]
fn peer_error_codes_reach_the_error_callback() {
    let gateway = FakeGateway::start();
    let (connection, mut peer) = connected(&gateway);

    let device = Device::new(5, &connection);
    device.set_response_expected(1, true);
    device.set_response_expected(2, true);

    let (tx, rx) = mpsc::channel();
    let invalid_tx = tx.clone();
    connection
        .send_request(
            &device,
            1,
            &[],
            "",
            "",
            None,
            Some(Box::new(move |code| invalid_tx.send(code).unwrap())),
        )
        .unwrap();
    let first = peer.read_packet();
    peer.send_response(5, 1, first.header.sequence, 1, &[]);
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), ErrorCode::InvalidParameter);

    connection
        .send_request(
            &device,
            2,
            &[],
            "",
            "",
            None,
            Some(Box::new(move |code| tx.send(code).unwrap())),
        )
        .unwrap();
    let second = peer.read_packet();
    peer.send_response(5, 2, second.header.sequence, 2, &[]);
    assert_eq!(
        rx.recv_timeout(WAIT).unwrap(),
        ErrorCode::FunctionNotSupported
    );
}

#[test]
fn timeout_fires_once_and_late_response_is_dropped() {
    let gateway = FakeGateway::start();
    let (connection, mut peer) = connected(&gateway);
    connection.set_request_timeout(Duration::from_millis(100));

    let device = Device::new(5, &connection);
    device.set_response_expected(1, true);

    let (success_tx, success_rx) = mpsc::channel();
    let (err_tx, err_rx) = mpsc::channel();
    connection
        .send_request(
            &device,
            1,
            &[],
            "",
            "B",
            Some(Box::new(move |values| success_tx.send(values).unwrap())),
            Some(Box::new(move |code| err_tx.send(code).unwrap())),
        )
        .unwrap();

    let packet = peer.read_packet();
    assert_eq!(err_rx.recv_timeout(WAIT).unwrap(), ErrorCode::Timeout);

    // The request record is gone; this response no longer matches anything.
    peer.send_response(5, 1, packet.header.sequence, 0, &[42]);
    assert!(success_rx.recv_timeout(Duration::from_millis(300)).is_err());
    assert!(err_rx.try_recv().is_err());
}

#[test]
fn responses_are_matched_per_device() {
    let gateway = FakeGateway::start();
    let (connection, mut peer) = connected(&gateway);

    let first = Device::new(10, &connection);
    let second = Device::new(20, &connection);
    first.set_response_expected(6, true);
    first.set_response_expected(7, false);
    second.set_response_expected(6, true);

    let (first_tx, first_rx) = mpsc::channel();
    connection
        .send_request(
            &first,
            6,
            &[],
            "",
            "B",
            Some(Box::new(move |values| first_tx.send(values).unwrap())),
            None,
        )
        .unwrap();
    let seq = peer.read_packet().header.sequence;

    // Cycle the shared sequence counter all the way around so the second
    // device's request reuses the same (function id, sequence) pair.
    for _ in 0..14 {
        connection
            .send_request(&first, 7, &[], "", "", None, None)
            .unwrap();
        peer.read_packet();
    }

    let (second_tx, second_rx) = mpsc::channel();
    connection
        .send_request(
            &second,
            6,
            &[],
            "",
            "B",
            Some(Box::new(move |values| second_tx.send(values).unwrap())),
            None,
        )
        .unwrap();
    let duplicate = peer.read_packet();
    assert_eq!(duplicate.header.sequence, seq);

    // Identity disambiguates: each response resolves only its own device.
    peer.send_response(20, 6, seq, 0, &[2]);
    assert_eq!(second_rx.recv_timeout(WAIT).unwrap(), vec![Value::U8(2)]);
    assert!(first_rx.try_recv().is_err());

    peer.send_response(10, 6, seq, 0, &[1]);
    assert_eq!(first_rx.recv_timeout(WAIT).unwrap(), vec![Value::U8(1)]);
}

#[test]
fn unmatched_responses_are_ignored() {
    let gateway = FakeGateway::start();
    let (connection, mut peer) = connected(&gateway);

    let device = Device::new(5, &connection);
    device.set_response_expected(1, true);

    // Unknown device, then a wrong sequence number for a known one.
    peer.send_response(777, 1, 4, 0, &[]);
    peer.send_response(5, 1, 9, 0, &[]);

    // The stream is still healthy afterwards.
    let (tx, rx) = mpsc::channel();
    connection
        .send_request(
            &device,
            1,
            &[],
            "",
            "",
            Some(Box::new(move |values| tx.send(values).unwrap())),
            None,
        )
        .unwrap();
    let packet = peer.read_packet();
    peer.send_response(5, 1, packet.header.sequence, 0, &[]);
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), Vec::<Value>::new());
}

#[test]
fn unknown_function_id_is_rejected_before_the_wire() {
    let gateway = FakeGateway::start();
    let (connection, _peer) = connected(&gateway);

    let device = Device::new(5, &connection);

    let (tx, rx) = mpsc::channel();
    connection
        .send_request(
            &device,
            200,
            &[],
            "",
            "",
            None,
            Some(Box::new(move |code| tx.send(code).unwrap())),
        )
        .unwrap();
    assert_eq!(
        rx.recv_timeout(WAIT).unwrap(),
        ErrorCode::InvalidFunctionId
    );
}

#[test]
fn fire_and_forget_requests_carry_no_response_flag() {
    let gateway = FakeGateway::start();
    let (connection, mut peer) = connected(&gateway);

    let device = Device::new(5, &connection);
    device.set_response_expected(9, false);

    connection
        .send_request(&device, 9, &[Value::I32(-1)], "i", "", None, None)
        .unwrap();

    let packet = peer.read_packet();
    assert_eq!(packet.header.function_id, 9);
    assert!(!packet.header.response_expected);
    assert_ne!(packet.header.sequence, 0);
    assert_eq!(packet.payload.as_ref(), &(-1i32).to_le_bytes());
}
