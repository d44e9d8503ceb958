/// Mock exchange feed server
///
/// Serves a synthetic record stream over TCP with random drops so the client
/// has gaps to backfill. Answers resend requests from the full record list.
///
/// Usage: mock_exchange [addr] [record_count] [drop_percent]

use std::env;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use feed_reconciler::{Record, Request, REQUEST_SIZE};
use rand::Rng;

const SYMBOLS: [&[u8; 4]; 5] = [b"AAPL", b"MSFT", b"AMZN", b"META", b"NVDA"];

fn generate(count: u32) -> Vec<Record> {
    let mut rng = rand::thread_rng();

    (1..=count)
        .map(|sequence| {
            let symbol = *SYMBOLS[rng.gen_range(0..SYMBOLS.len())];
            let side = if rng.gen_bool(0.5) { b'B' } else { b'S' };
            let quantity = rng.gen_range(1u32..1000);
            let price = rng.gen_range(9_000u32..11_000);
            Record::new(symbol, side, quantity, price, sequence)
        })
        .collect()
}

fn serve(mut stream: TcpStream, records: &[Record], drop_percent: u32) -> io::Result<()> {
    let mut rng = rand::thread_rng();
    let mut frame = [0u8; REQUEST_SIZE];

    loop {
        match stream.read_exact(&mut frame) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        }

        match Request::decode(frame) {
            Ok(Request::StreamAll) => {
                let mut dropped = 0;
                for record in records {
                    if rng.gen_range(0..100) < drop_percent {
                        dropped += 1;
                        continue;
                    }
                    stream.write_all(&record.encode())?;
                }
                println!("Streamed {} records, dropped {}", records.len() - dropped, dropped);
            }
            Ok(Request::Resend(seq)) => {
                if let Some(record) = records.iter().find(|r| r.sequence == seq as u32) {
                    stream.write_all(&record.encode())?;
                    println!("Resent {}", seq);
                } else {
                    println!("No record for resend {}", seq);
                }
            }
            Err(e) => println!("Ignoring request: {}", e),
        }
    }
}

fn main() -> io::Result<()> {
    let args: Vec<String> = env::args().collect();

    let addr = if args.len() > 1 {
        args[1].clone()
    } else {
        "127.0.0.1:3000".to_string()
    };

    let record_count: u32 = if args.len() > 2 {
        args[2].parse().unwrap_or(100)
    } else {
        100
    };

    let drop_percent: u32 = if args.len() > 3 {
        args[3].parse().unwrap_or(10).min(100)
    } else {
        10
    };

    let records = generate(record_count);
    let listener = TcpListener::bind(&addr)?;
    println!(
        "Serving {} records on {} ({}% dropped from the initial stream)",
        record_count, addr, drop_percent
    );

    for stream in listener.incoming() {
        let stream = stream?;
        println!("Client connected: {:?}", stream.peer_addr().ok());
        if let Err(e) = serve(stream, &records, drop_percent) {
            println!("Client error: {}", e);
        }
    }

    Ok(())
}
