/// JSON projection of a reconciled record set
///
/// Every field is rendered as text, numbers in decimal.

use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::decoder::Record;
use crate::record_set::RecordSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    pub symbol: String,
    #[serde(rename = "buysellindicator")]
    pub side: String,
    pub quantity: String,
    pub price: String,
    #[serde(rename = "packetSequence")]
    pub sequence: String,
}

impl From<&Record> for OutputRecord {
    fn from(record: &Record) -> Self {
        OutputRecord {
            symbol: record.symbol_str(),
            side: record.side_char().to_string(),
            quantity: record.quantity.to_string(),
            price: record.price.to_string(),
            sequence: record.sequence.to_string(),
        }
    }
}

/// Records in ascending sequence order
pub fn project(records: &RecordSet) -> Vec<OutputRecord> {
    records.iter().map(OutputRecord::from).collect()
}

pub fn write_json<W: Write>(records: &[OutputRecord], mut writer: W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Write the document to `path`, creating parent directories if needed
pub fn write_json_file(records: &[OutputRecord], path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    write_json(records, BufWriter::new(file))
}
