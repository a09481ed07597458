//! An SNTP server that answers client requests with a deliberately offset clock.
//!
//! The server is single-threaded: each datagram is decoded, answered and sent
//! before the next one is read. A datagram that fails to decode is logged and
//! dropped without a reply.
//!
//! ```no_run
//! # fn main() -> sntp_liar::Result<()> {
//! use sntp_liar::{LiarServer, ServerConfig};
//!
//! let config = ServerConfig::new("127.0.0.1", 1123).with_lying_seconds(3600)?;
//! let mut server = LiarServer::new(config);
//! server.bind()?;
//! let stop = server.stop_handle()?;
//! let worker = std::thread::spawn(move || server.serve());
//! // ...
//! stop.stop()?;
//! worker.join().expect("server thread panicked")?;
//! # Ok(())
//! # }
//! ```

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::exchange::bind_addr_for;
use crate::sntp::{
    LeapIndicator, Mode, SntpMessage, ORIGIN_TS_RANGE, SNTP_MESSAGE_LENGTH, TRANSMIT_TS_RANGE,
};

/// Reference identifier of a server disciplined by its own local clock.
pub const REFERENCE_ID: [u8; 4] = *b"LOCL";

const RECV_BUF_LEN: usize = 1024;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServerState {
    Stopped,
    Bound,
    Serving,
}

/// Builds the reply to `request` as seen at `now`.
///
/// The request must decode as a client message. The reply's origin timestamp
/// is a verbatim copy of the request's transmit timestamp bytes.
pub fn build_reply(request: &[u8], now: DateTime<Utc>) -> Result<[u8; SNTP_MESSAGE_LENGTH]> {
    SntpMessage::decode(request, &[Mode::Client])?;

    let reply = SntpMessage {
        leap_indicator: LeapIndicator::NoWarning,
        version: 4,
        mode: Mode::Server,
        stratum: 1,
        poll: 4,
        precision: -20,
        root_delay: 0.0,
        root_dispersion: 0.0,
        reference_id: REFERENCE_ID,
        reference_ts: Some(now),
        origin_ts: None,
        receive_ts: Some(now),
        transmit_ts: Some(now),
    };
    let mut bytes = reply.encode()?;
    bytes[ORIGIN_TS_RANGE].copy_from_slice(&request[TRANSMIT_TS_RANGE]);
    Ok(bytes)
}

/// Stops a serving [`LiarServer`] from another thread.
#[derive(Clone, Debug)]
pub struct StopHandle {
    stopping: Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl StopHandle {
    /// Flags the server to stop and wakes its pending receive with an empty
    /// datagram.
    pub fn stop(&self) -> io::Result<()> {
        self.stopping.store(true, Ordering::SeqCst);
        let sock = UdpSocket::bind(bind_addr_for(&self.wake_addr))?;
        sock.send_to(&[], self.wake_addr)?;
        Ok(())
    }
}

// A socket bound to the unspecified address is reached through loopback.
fn wake_addr_for(local: SocketAddr) -> SocketAddr {
    let ip = match local.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, local.port())
}

pub struct LiarServer {
    config: ServerConfig,
    sock: Option<UdpSocket>,
    state: ServerState,
    stopping: Arc<AtomicBool>,
}

impl LiarServer {
    pub fn new(config: ServerConfig) -> LiarServer {
        LiarServer {
            config,
            sock: None,
            state: ServerState::Stopped,
            stopping: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// The configured `host:port`.
    pub fn address(&self) -> String {
        self.config.address()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.sock.as_ref().and_then(|sock| sock.local_addr().ok())
    }

    /// Binds the server socket. Binding an already bound server is a no-op.
    pub fn bind(&mut self) -> Result<SocketAddr> {
        if let Some(sock) = &self.sock {
            return Ok(sock.local_addr()?);
        }
        let sock = UdpSocket::bind((self.config.host.as_str(), self.config.port)).map_err(
            |source| Error::Bind {
                addr: self.config.address(),
                source,
            },
        )?;
        let local = sock.local_addr()?;

        self.stopping.store(false, Ordering::SeqCst);
        self.sock = Some(sock);
        self.state = ServerState::Bound;
        info!("server will lie for {}", self.config.lying_offset);
        info!("started server at {}", local);
        Ok(local)
    }

    /// A handle that stops this server. The server must be bound.
    pub fn stop_handle(&self) -> Result<StopHandle> {
        let local = self.sock.as_ref().ok_or(Error::NotBound)?.local_addr()?;
        Ok(StopHandle {
            stopping: self.stopping.clone(),
            wake_addr: wake_addr_for(local),
        })
    }

    /// Answers requests until stopped, then releases the socket.
    ///
    /// Returns an error only if the socket itself fails.
    pub fn serve(&mut self) -> Result<()> {
        let sock = self.sock.take().ok_or(Error::NotBound)?;
        self.state = ServerState::Serving;
        let result = self.serve_on(&sock);
        drop(sock);
        self.state = ServerState::Stopped;
        info!("stopping...");
        result
    }

    /// Binds and serves.
    pub fn start(&mut self) -> Result<()> {
        self.bind()?;
        self.serve()
    }

    fn serve_on(&self, sock: &UdpSocket) -> Result<()> {
        let mut recv_buf = [0u8; RECV_BUF_LEN];
        loop {
            let (len, src_addr) = match sock.recv_from(&mut recv_buf) {
                Ok(received) => received,
                // ICMP errors for earlier replies surface here on some platforms.
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                    warn!("receive failed: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if self.stopping.load(Ordering::SeqCst) {
                return Ok(());
            }
            self.handle_datagram(sock, &recv_buf[..len], src_addr);
        }
    }

    /// The wall clock shifted by the lying offset, if still representable.
    fn lying_now(&self) -> Option<DateTime<Utc>> {
        Utc::now().checked_add_signed(self.config.lying_offset)
    }

    fn handle_datagram(&self, sock: &UdpSocket, datagram: &[u8], src_addr: SocketAddr) {
        let now = match self.lying_now() {
            Some(now) => now,
            None => {
                warn!(
                    "dropped message from {}: lying offset {} overflows the clock",
                    src_addr, self.config.lying_offset
                );
                return;
            }
        };
        match build_reply(datagram, now) {
            Ok(reply) => match sock.send_to(&reply, src_addr) {
                Ok(_) => debug!("answered request from {}", src_addr),
                Err(e) => warn!("cannot answer {}: {}", src_addr, e),
            },
            Err(e) => warn!("dropped message from {}: {}", src_addr, e),
        }
    }
}
