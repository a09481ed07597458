//! # sntp-liar
//!
//! ## Overview
//!
//! sntp-liar encodes and decodes the 48-byte SNTP message, sends requests over
//! UDP with a bounded number of tries, and runs a server that answers client
//! requests with a clock shifted by a fixed offset. The lying server is meant
//! for exercising client-side clock skew handling.
//!
//! Timestamps are era-aware: the top bit of the seconds field selects between
//! the 1900 and 2036 epochs. Root delay and root dispersion travel as signed
//! and unsigned 16.16 fixed point.
//!
//! ```
//! use sntp_liar::{Mode, SntpMessage};
//!
//! let request = SntpMessage::client_request(None).encode().unwrap();
//! let decoded = SntpMessage::decode(&request, &[Mode::Client]).unwrap();
//! assert_eq!(decoded.mode, Mode::Client);
//! assert!(SntpMessage::decode(&request, &[Mode::Server]).is_err());
//! ```

// add missing_docs
#![deny(
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications
)]

pub use config::{read_offset_file, ServerConfig, DEFAULT_PORT};
pub use error::{ConfigError, Error, RangeError, Result};
pub use exchange::{
    exchange, get_time_from, get_time_from_port, send_sntp_request, ExchangeOptions, SNTP_PORT,
};
pub use server::{build_reply, LiarServer, ServerState, StopHandle, REFERENCE_ID};
pub use sntp::*;

pub mod config;
pub mod error;
pub mod exchange;
pub mod fixed_point;
pub mod server;
pub mod sntp;
pub mod timestamp;
