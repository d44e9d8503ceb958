#![allow(dead_code)]

use feed_reconciler::{Record, Request, Transport, RECORD_SIZE};
use std::collections::{HashMap, VecDeque};
use std::io::{self, ErrorKind};

pub fn rec(seq: u32) -> Record {
    Record::new(*b"TSLA", if seq % 2 == 0 { b'B' } else { b'S' }, 10 + seq, 20_000 + seq, seq)
}

/// In-memory exchange: answers requests from canned data, goes quiet otherwise
#[derive(Default)]
pub struct MockExchange {
    stream: Vec<u8>,
    resends: HashMap<u8, Vec<u8>>,
    pending: VecDeque<u8>,
    pub requests: Vec<Request>,
}

impl MockExchange {
    /// Stream-all replies with these records, in this order
    pub fn streaming(records: &[Record]) -> Self {
        let mut exchange = MockExchange::default();
        for r in records {
            exchange.stream.extend_from_slice(&r.encode());
        }
        exchange
    }

    /// Answer a resend for `seq` with `record`
    pub fn on_resend(mut self, seq: u8, record: Record) -> Self {
        self.resends.insert(seq, record.encode().to_vec());
        self
    }

    /// Answer a resend for `seq` with raw bytes
    pub fn on_resend_raw(mut self, seq: u8, bytes: Vec<u8>) -> Self {
        self.resends.insert(seq, bytes);
        self
    }

    /// Append raw bytes to the initial stream
    pub fn with_stream_tail(mut self, bytes: &[u8]) -> Self {
        self.stream.extend_from_slice(bytes);
        self
    }

    pub fn resend_requests(&self) -> Vec<u8> {
        self.requests
            .iter()
            .filter_map(|r| match r {
                Request::Resend(seq) => Some(*seq),
                Request::StreamAll => None,
            })
            .collect()
    }
}

impl Transport for MockExchange {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let frame: [u8; 2] = bytes
            .try_into()
            .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "bad request length"))?;
        let request = Request::decode(frame)
            .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))?;
        self.requests.push(request);

        match request {
            Request::StreamAll => self.pending.extend(self.stream.iter().copied()),
            Request::Resend(seq) => {
                if let Some(reply) = self.resends.get(&seq) {
                    self.pending.extend(reply.iter().copied());
                }
            }
        }
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            return Err(ErrorKind::WouldBlock.into());
        }
        // Hand out at most one frame per call, like a datagram-sized recv
        let n = buf.len().min(self.pending.len()).min(RECORD_SIZE);
        for slot in buf.iter_mut().take(n) {
            *slot = self.pending.pop_front().unwrap();
        }
        Ok(n)
    }

    fn discard(&mut self) -> io::Result<usize> {
        let dropped = self.pending.len();
        self.pending.clear();
        Ok(dropped)
    }
}
