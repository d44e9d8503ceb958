/// Record decoder
///
/// Turns a 17-byte response frame into a typed `Record`. Field positions come
/// from the schema in `protocol`; integers are big-endian on the wire.

use crate::protocol::*;
use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame length mismatch: expected {expected} bytes, got {actual}")]
    FrameLength { expected: usize, actual: usize },
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// One market-data event
///
/// Symbol and side are passed through verbatim; price is raw fixed-point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Record {
    pub symbol: [u8; 4],
    pub side: u8,
    pub quantity: u32,
    pub price: u32,
    pub sequence: u32,
}

impl Record {
    pub fn new(symbol: [u8; 4], side: u8, quantity: u32, price: u32, sequence: u32) -> Self {
        Record {
            symbol,
            side,
            quantity,
            price,
            sequence,
        }
    }

    /// Encode back into a wire frame
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut frame = [0u8; RECORD_SIZE];
        frame[SYMBOL.range()].copy_from_slice(&self.symbol);
        frame[SIDE.offset] = self.side;
        BigEndian::write_u32(&mut frame[QUANTITY.range()], self.quantity);
        BigEndian::write_u32(&mut frame[PRICE.range()], self.price);
        BigEndian::write_u32(&mut frame[SEQUENCE.range()], self.sequence);
        frame
    }

    /// Symbol as text; non-UTF-8 bytes are replaced
    pub fn symbol_str(&self) -> String {
        String::from_utf8_lossy(&self.symbol).into_owned()
    }

    pub fn side_char(&self) -> char {
        char::from(self.side)
    }
}

pub struct Decoder;

impl Decoder {
    /// Decode a frame, rejecting anything that is not exactly one record long
    pub fn decode(buffer: &[u8]) -> DecodeResult<Record> {
        let frame: &[u8; RECORD_SIZE] =
            buffer.try_into().map_err(|_| DecodeError::FrameLength {
                expected: RECORD_SIZE,
                actual: buffer.len(),
            })?;
        Ok(Self::decode_frame(frame))
    }

    /// Decode a frame whose length is already known to be correct
    pub fn decode_frame(frame: &[u8; RECORD_SIZE]) -> Record {
        let mut symbol = [0u8; 4];
        symbol.copy_from_slice(&frame[SYMBOL.range()]);

        Record {
            symbol,
            side: frame[SIDE.offset],
            quantity: BigEndian::read_u32(&frame[QUANTITY.range()]),
            price: BigEndian::read_u32(&frame[PRICE.range()]),
            sequence: BigEndian::read_u32(&frame[SEQUENCE.range()]),
        }
    }
}
