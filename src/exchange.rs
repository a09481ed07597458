//! Blocking request/reply over UDP with a bounded number of tries.
//!
//! The reply's source address is not checked against the destination.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;

use crate::error::{Error, Result};
use crate::sntp::{Mode, SntpMessage};

/// Standard SNTP server port.
pub const SNTP_PORT: u16 = 123;

const RECV_BUF_LEN: usize = 1024;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExchangeOptions {
    /// Resends allowed after the first unanswered send. Zero means no bound.
    pub tries: u32,
    /// How long to wait for a reply after each send.
    pub timeout: Duration,
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        ExchangeOptions {
            tries: 4,
            timeout: Duration::from_secs(2),
        }
    }
}

impl ExchangeOptions {
    fn exhausted(&self, attempts: u32) -> bool {
        self.tries > 0 && attempts > self.tries
    }
}

/// Returns `0.0.0.0:0` for IPv4 targets and `[::]:0` for IPv6 targets.
pub(crate) fn bind_addr_for(target: &SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
    }
}

/// Resolves `host:port`, preferring an IPv4 address.
pub(crate) fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{}:{} resolved to no addresses", host, port),
            )
        })
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Sends `request` to `host:port` and returns the first datagram received.
///
/// Each unanswered send is followed by a resend, up to `options.tries`
/// resends. When the last one also goes unanswered, [`Error::Timeout`] reports
/// the total number of sends.
pub fn exchange(request: &[u8], host: &str, port: u16, options: &ExchangeOptions) -> Result<Vec<u8>> {
    let dest = resolve(host, port)?;
    let sock = UdpSocket::bind(bind_addr_for(&dest))?;
    sock.set_read_timeout(Some(options.timeout))?;

    let mut recv_buf = [0u8; RECV_BUF_LEN];
    let mut attempts = 0;
    loop {
        attempts += 1;
        sock.send_to(request, dest)?;
        match sock.recv_from(&mut recv_buf) {
            Ok((len, src_addr)) => {
                debug!("received {} bytes from {} after {} tries", len, src_addr, attempts);
                return Ok(recv_buf[..len].to_vec());
            }
            Err(e) if is_timeout(&e) => {
                if options.exhausted(attempts) {
                    return Err(Error::Timeout { tries: attempts });
                }
                debug!(
                    "no reply from {} within {:?}, trying again",
                    dest, options.timeout
                );
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// [`exchange`] against the standard SNTP port.
pub fn send_sntp_request(request: &[u8], host: &str, options: &ExchangeOptions) -> Result<Vec<u8>> {
    exchange(request, host, SNTP_PORT, options)
}

/// Asks `host:port` for the time and returns the reply's transmit timestamp.
pub fn get_time_from_port(host: &str, port: u16, options: &ExchangeOptions) -> Result<DateTime<Utc>> {
    let request = SntpMessage::client_request(None).encode()?;
    let reply = exchange(&request, host, port, options)?;
    let reply = SntpMessage::decode(&reply, &[Mode::Server])?;
    reply
        .transmit_ts
        .ok_or_else(|| Error::MissingTransmitTimestamp(format!("{}:{}", host, port)))
}

/// Asks an SNTP server on the standard port for the time.
pub fn get_time_from(host: &str, options: &ExchangeOptions) -> Result<DateTime<Utc>> {
    get_time_from_port(host, SNTP_PORT, options)
}
