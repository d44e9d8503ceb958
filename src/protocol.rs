/// Binary wire format for the exchange feed
///
/// Request frame: 2 bytes
///   - kind: u8 (1 = stream all, 2 = resend one)
///   - param: u8 (sequence to resend, unused for stream all)
///
/// Response frame: 17 bytes, one record per frame, big-endian integers
///   - symbol: [u8; 4]
///   - side: u8
///   - quantity: u32
///   - price: u32
///   - sequence: u32

use thiserror::Error;

pub const RECORD_SIZE: usize = 17;
pub const REQUEST_SIZE: usize = 2;

/// Highest sequence number a resend request can carry (one-byte parameter)
pub const MAX_RESEND_SEQUENCE: u32 = u8::MAX as u32;

/// A fixed-width field inside a response frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub offset: usize,
    pub width: usize,
}

impl Field {
    pub const fn new(offset: usize, width: usize) -> Self {
        Field { offset, width }
    }

    pub const fn end(&self) -> usize {
        self.offset + self.width
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.end()
    }
}

pub const SYMBOL: Field = Field::new(0, 4);
pub const SIDE: Field = Field::new(SYMBOL.end(), 1);
pub const QUANTITY: Field = Field::new(SIDE.end(), 4);
pub const PRICE: Field = Field::new(QUANTITY.end(), 4);
pub const SEQUENCE: Field = Field::new(PRICE.end(), 4);

// Compile-time assertion: the schema covers the frame exactly
const _: () = assert!(SEQUENCE.end() == RECORD_SIZE);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("sequence {0} cannot be re-requested: resend parameter is limited to 0..={max}", max = MAX_RESEND_SEQUENCE)]
    SequenceOutOfRange(u32),

    #[error("invalid request kind: {0}")]
    InvalidRequestKind(u8),
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    StreamAll = 1,
    Resend = 2,
}

impl RequestKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(RequestKind::StreamAll),
            2 => Some(RequestKind::Resend),
            _ => None,
        }
    }
}

/// Client to server request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    StreamAll,
    Resend(u8),
}

impl Request {
    /// Build a resend request, refusing sequences the one-byte parameter can't carry
    pub fn resend(sequence: u32) -> Result<Self, ProtocolError> {
        u8::try_from(sequence)
            .map(Request::Resend)
            .map_err(|_| ProtocolError::SequenceOutOfRange(sequence))
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            Request::StreamAll => RequestKind::StreamAll,
            Request::Resend(_) => RequestKind::Resend,
        }
    }

    pub fn encode(&self) -> [u8; REQUEST_SIZE] {
        match *self {
            Request::StreamAll => [RequestKind::StreamAll as u8, 0],
            Request::Resend(seq) => [RequestKind::Resend as u8, seq],
        }
    }

    /// Parse a request frame (server side)
    pub fn decode(frame: [u8; REQUEST_SIZE]) -> Result<Self, ProtocolError> {
        match RequestKind::from_u8(frame[0]) {
            Some(RequestKind::StreamAll) => Ok(Request::StreamAll),
            Some(RequestKind::Resend) => Ok(Request::Resend(frame[1])),
            None => Err(ProtocolError::InvalidRequestKind(frame[0])),
        }
    }
}
