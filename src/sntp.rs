//! The 48-byte SNTP message and its frame codec.

use std::convert::TryFrom;
use std::ops::Range;

use chrono::{DateTime, Utc};
use nom::bits::bits;
use nom::bits::streaming::take as b_take;
use nom::bytes::streaming::take;
use nom::combinator::map_res;
use nom::error::Error as NomError;
use nom::number::streaming::{be_i8, be_u8};
use nom::sequence::tuple;
use nom::IResult;

use crate::error::{Error, RangeError, Result};
use crate::fixed_point::{self, SHORT_FRACTION_START_BIT};
use crate::timestamp;

/// Size of every encoded message.
pub const SNTP_MESSAGE_LENGTH: usize = 48;

/// Lengths accepted on decode: bare header, plus key identifier, plus digest,
/// plus key identifier and digest. Trailing bytes are not interpreted.
pub const SNTP_MESSAGE_LENGTHS: &[usize] = &[48, 48 + 4, 48 + 16, 48 + 16 + 4];

pub const REFERENCE_TS_RANGE: Range<usize> = 16..24;
pub const ORIGIN_TS_RANGE: Range<usize> = 24..32;
pub const RECEIVE_TS_RANGE: Range<usize> = 32..40;
pub const TRANSMIT_TS_RANGE: Range<usize> = 40..48;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LeapIndicator {
    NoWarning,
    InsertedLeapSecond,
    DeletedLeapSecond,
    Unsynchronized,
}

impl LeapIndicator {
    /// Maps the low two bits of `bits`.
    pub fn from_bits(bits: u8) -> LeapIndicator {
        match bits & 0b11 {
            0 => LeapIndicator::NoWarning,
            1 => LeapIndicator::InsertedLeapSecond,
            2 => LeapIndicator::DeletedLeapSecond,
            _ => LeapIndicator::Unsynchronized,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Mode {
    Reserved,
    SymmetricActive,
    SymmetricPassive,
    Client,
    Server,
    Broadcast,
    NtpControlReserved,
    PrivateReserved,
}

impl Mode {
    /// Maps the low three bits of `bits`.
    pub fn from_bits(bits: u8) -> Mode {
        match bits & 0b111 {
            0 => Mode::Reserved,
            1 => Mode::SymmetricActive,
            2 => Mode::SymmetricPassive,
            3 => Mode::Client,
            4 => Mode::Server,
            5 => Mode::Broadcast,
            6 => Mode::NtpControlReserved,
            _ => Mode::PrivateReserved,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// One SNTP message. Unset timestamps are `None` and travel as eight zero bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct SntpMessage {
    pub leap_indicator: LeapIndicator,
    pub version: u8,
    pub mode: Mode,
    pub stratum: u8,
    /// log2 seconds
    pub poll: u8,
    /// log2 seconds
    pub precision: i8,
    /// Seconds, signed 16.16 fixed point on the wire.
    pub root_delay: f64,
    /// Seconds, unsigned 16.16 fixed point on the wire.
    pub root_dispersion: f64,
    pub reference_id: [u8; 4],
    pub reference_ts: Option<DateTime<Utc>>,
    pub origin_ts: Option<DateTime<Utc>>,
    pub receive_ts: Option<DateTime<Utc>>,
    pub transmit_ts: Option<DateTime<Utc>>,
}

impl Default for SntpMessage {
    fn default() -> Self {
        SntpMessage {
            leap_indicator: LeapIndicator::NoWarning,
            version: 4,
            mode: Mode::PrivateReserved,
            stratum: 255,
            poll: 0,
            precision: -20,
            root_delay: 0.0,
            root_dispersion: 0.0,
            reference_id: [0; 4],
            reference_ts: None,
            origin_ts: None,
            receive_ts: None,
            transmit_ts: None,
        }
    }
}

// Wire fields in order, before any interpretation.
struct RawFrame {
    leap_indicator: u8,
    version: u8,
    mode: u8,
    stratum: u8,
    poll: u8,
    precision: i8,
    root_delay: [u8; 4],
    root_dispersion: [u8; 4],
    reference_id: [u8; 4],
    reference_ts: [u8; 8],
    origin_ts: [u8; 8],
    receive_ts: [u8; 8],
    transmit_ts: [u8; 8],
}

fn be_array<const N: usize>(i: &[u8]) -> IResult<&[u8], [u8; N]> {
    map_res(take(N), |bytes: &[u8]| <[u8; N]>::try_from(bytes))(i)
}

fn parse_frame(i: &[u8]) -> IResult<&[u8], RawFrame> {
    let (i, b0) =
        bits::<_, _, NomError<_>, _, _>(|d| tuple((b_take(2u8), b_take(3u8), b_take(3u8)))(d))(i)?;
    let (i, stratum) = be_u8(i)?;
    let (i, poll) = be_u8(i)?;
    let (i, precision) = be_i8(i)?;
    let (i, root_delay) = be_array(i)?;
    let (i, root_dispersion) = be_array(i)?;
    let (i, reference_id) = be_array(i)?;
    let (i, reference_ts) = be_array(i)?;
    let (i, origin_ts) = be_array(i)?;
    let (i, receive_ts) = be_array(i)?;
    let (i, transmit_ts) = be_array(i)?;
    let frame = RawFrame {
        leap_indicator: b0.0,
        version: b0.1,
        mode: b0.2,
        stratum,
        poll,
        precision,
        root_delay,
        root_dispersion,
        reference_id,
        reference_ts,
        origin_ts,
        receive_ts,
        transmit_ts,
    };
    Ok((i, frame))
}

impl SntpMessage {
    /// A client request stamped with `transmit_ts`, or with the current time.
    pub fn client_request(transmit_ts: Option<DateTime<Utc>>) -> SntpMessage {
        SntpMessage {
            mode: Mode::Client,
            transmit_ts: Some(transmit_ts.unwrap_or_else(Utc::now)),
            ..SntpMessage::default()
        }
    }

    /// Decodes `bytes`, rejecting any message whose mode is not in
    /// `accepted_modes`.
    pub fn decode(bytes: &[u8], accepted_modes: &[Mode]) -> Result<SntpMessage> {
        let length_error = || Error::FrameLength {
            len: bytes.len(),
            expected: SNTP_MESSAGE_LENGTHS,
        };
        if !SNTP_MESSAGE_LENGTHS.contains(&bytes.len()) {
            return Err(length_error());
        }
        let (_, frame) = parse_frame(bytes).map_err(|_| length_error())?;

        let mode = Mode::from_bits(frame.mode);
        if !accepted_modes.contains(&mode) {
            return Err(Error::UnexpectedMode {
                mode,
                expected: accepted_modes.to_vec(),
            });
        }

        Ok(SntpMessage {
            leap_indicator: LeapIndicator::from_bits(frame.leap_indicator),
            version: frame.version,
            mode,
            stratum: frame.stratum,
            poll: frame.poll,
            precision: frame.precision,
            root_delay: fixed_point::decode(&frame.root_delay, SHORT_FRACTION_START_BIT, true),
            root_dispersion: fixed_point::decode(
                &frame.root_dispersion,
                SHORT_FRACTION_START_BIT,
                false,
            ),
            reference_id: frame.reference_id,
            reference_ts: timestamp::decode_optional(&frame.reference_ts),
            origin_ts: timestamp::decode_optional(&frame.origin_ts),
            receive_ts: timestamp::decode_optional(&frame.receive_ts),
            transmit_ts: timestamp::decode_optional(&frame.transmit_ts),
        })
    }

    /// Encodes the message into its 48-byte wire form.
    pub fn encode(&self) -> Result<[u8; SNTP_MESSAGE_LENGTH], RangeError> {
        let mut buf = [0; SNTP_MESSAGE_LENGTH];
        buf[0] = (self.leap_indicator.bits() << 6)
            | ((self.version & 0b111) << 3)
            | self.mode.bits();
        buf[1] = self.stratum;
        buf[2] = self.poll;
        buf[3] = self.precision.to_be_bytes()[0];
        buf[4..8].copy_from_slice(&fixed_point::encode::<4>(
            self.root_delay,
            SHORT_FRACTION_START_BIT,
            true,
        )?);
        buf[8..12].copy_from_slice(&fixed_point::encode::<4>(
            self.root_dispersion,
            SHORT_FRACTION_START_BIT,
            false,
        )?);
        buf[12..16].copy_from_slice(&self.reference_id);

        let timestamps = [
            (REFERENCE_TS_RANGE, &self.reference_ts),
            (ORIGIN_TS_RANGE, &self.origin_ts),
            (RECEIVE_TS_RANGE, &self.receive_ts),
            (TRANSMIT_TS_RANGE, &self.transmit_ts),
        ];
        for (range, ts) in timestamps.iter() {
            buf[range.clone()].copy_from_slice(&timestamp::encode_optional(ts.as_ref())?);
        }
        Ok(buf)
    }
}
