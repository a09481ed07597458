//! Error types for SNTP encoding, decoding and transport.
//!
//! Codec functions return [`RangeError`] when a value cannot be represented on
//! the wire. Everything else surfaces as [`Error`], which wraps `RangeError`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::sntp::Mode;

/// A value that cannot be represented in an SNTP timestamp or fixed-point field.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RangeError {
    #[error("cannot encode instants before 1968-01-01 (got {0})")]
    BeforeFloor(String),
    #[error("cannot encode instants past the era window (got {0})")]
    PastEraWindow(String),
    #[error("cannot encode negative value {0} as unsigned fixed point")]
    NegativeUnsigned(f64),
    #[error("value {value} does not fit {int_bits} integer bits")]
    IntegerOverflow { value: f64, int_bits: u32 },
    #[error("fraction start bit {bit} is out of range for a {len}-byte field")]
    FractionStartBit { bit: u32, len: usize },
    #[error("cannot encode non-finite value {0}")]
    NotFinite(f64),
}

/// Errors raised while loading the liar server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read offset file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("offset file {} is empty", .0.display())]
    Empty(PathBuf),
    #[error("offset file {} does not hold an integer: {content:?}", .path.display())]
    NotAnInteger { path: PathBuf, content: String },
    #[error("lying offset of {0} seconds is out of range")]
    OffsetOutOfRange(i64),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid message length: expected one of {expected:?}, got {len}")]
    FrameLength { len: usize, expected: &'static [usize] },
    #[error("unexpected mode: expected one of {expected:?}, got {mode:?}")]
    UnexpectedMode { mode: Mode, expected: Vec<Mode> },
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error("no reply after {tries} sends")]
    Timeout { tries: u32 },
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("server is not bound")]
    NotBound,
    #[error("reply from {0} carries no transmit timestamp")]
    MissingTransmitTimestamp(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
