//! UDP exchange behavior against loopback peers.

use std::net::UdpSocket;
use std::thread;
use std::time::Duration;

use sntp_liar::{exchange, Error, ExchangeOptions};

#[test]
fn test_exchange_returns_first_reply() {
    let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = peer.local_addr().unwrap().port();
    let echo = thread::spawn(move || {
        let mut buf = [0u8; 64];
        let (len, from) = peer.recv_from(&mut buf).unwrap();
        peer.send_to(&buf[..len], from).unwrap();
    });

    let options = ExchangeOptions {
        tries: 2,
        timeout: Duration::from_secs(2),
    };
    let reply = exchange(b"ping", "127.0.0.1", port, &options).unwrap();
    assert_eq!(reply, b"ping");
    echo.join().unwrap();
}

#[test]
fn test_exchange_resends_after_timeout() {
    let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = peer.local_addr().unwrap().port();
    // Ignore the first request, answer the second.
    let flaky = thread::spawn(move || {
        let mut buf = [0u8; 64];
        peer.recv_from(&mut buf).unwrap();
        let (len, from) = peer.recv_from(&mut buf).unwrap();
        peer.send_to(&buf[..len], from).unwrap();
    });

    let options = ExchangeOptions {
        tries: 3,
        timeout: Duration::from_millis(200),
    };
    let reply = exchange(b"again", "127.0.0.1", port, &options).unwrap();
    assert_eq!(reply, b"again");
    flaky.join().unwrap();
}

#[test]
fn test_exchange_times_out_after_tries() {
    let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = peer.local_addr().unwrap().port();

    let options = ExchangeOptions {
        tries: 3,
        timeout: Duration::from_millis(100),
    };
    match exchange(b"hello", "127.0.0.1", port, &options) {
        Err(Error::Timeout { tries }) => assert_eq!(tries, 4),
        other => panic!("unexpected result {:?}", other),
    }

    // The first send plus three resends reached the peer.
    peer.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
    let mut buf = [0u8; 64];
    let mut received = 0;
    while peer.recv_from(&mut buf).is_ok() {
        received += 1;
    }
    assert_eq!(received, 4);
}

#[test]
fn test_default_options_send_five_times() {
    let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = peer.local_addr().unwrap().port();

    let options = ExchangeOptions {
        timeout: Duration::from_millis(50),
        ..ExchangeOptions::default()
    };
    assert!(matches!(
        exchange(b"hello", "127.0.0.1", port, &options),
        Err(Error::Timeout { tries: 5 })
    ));

    peer.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
    let mut buf = [0u8; 64];
    let mut received = 0;
    while peer.recv_from(&mut buf).is_ok() {
        received += 1;
    }
    assert_eq!(received, 5);
}
