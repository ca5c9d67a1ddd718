// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sequential record scan over the block log.

use std::path::Path;

use super::block_log::{LogEntry, LogReader};
use super::record::{LogRecord, RecordError, ShortKey};
use super::LogResult;

/// A record that decoded cleanly.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedRecord {
    pub offset: u64,
    /// `None` when the record has no key field.
    pub short_key: Option<ShortKey>,
    pub record: LogRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanItem {
    Record(ScannedRecord),
    /// A record that could not be decoded. Scanning carries on past it.
    Corrupt { offset: u64, reason: String },
}

/// Lazy scan from the start of the log, one block in memory at a time.
///
/// Only I/O failures surface as `Err`; after one the scan ends.
#[derive(Debug)]
pub struct LogScanner {
    reader: LogReader,
}

impl LogScanner {
    pub fn open(path: impl AsRef<Path>) -> LogResult<Self> {
        Ok(Self {
            reader: LogReader::open(path)?,
        })
    }

    fn decode(offset: u64, payload: &[u8]) -> Result<ScannedRecord, RecordError> {
        let short_key = ShortKey::from_encoded(payload)?;
        let record = LogRecord::decode(payload)?;
        Ok(ScannedRecord {
            offset,
            short_key,
            record,
        })
    }
}

impl Iterator for LogScanner {
    type Item = LogResult<ScanItem>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = match self.reader.next()? {
            Ok(LogEntry::Record { offset, payload }) => match Self::decode(offset, &payload) {
                Ok(record) => ScanItem::Record(record),
                Err(e) => ScanItem::Corrupt {
                    offset,
                    reason: e.to_string(),
                },
            },
            Ok(LogEntry::Truncated { offset }) => ScanItem::Corrupt {
                offset,
                reason: "record runs past the end of its block".to_string(),
            },
            Err(e) => return Some(Err(e)),
        };
        if let ScanItem::Corrupt { offset, reason } = &item {
            tracing::warn!(offset, %reason, "skipping undecodable record");
        }
        Some(Ok(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::bipf::{self, Value};
    use crate::log::block_log::AppendLog;
    use tempfile::TempDir;

    fn key(n: u8) -> String {
        format!("%{}.sha256", char::from(b'A' + n).to_string().repeat(44))
    }

    fn payload(k: &str) -> Vec<u8> {
        LogRecord {
            key: Some(k.to_string()),
            value: Some(Value::Int(1)),
            timestamp: Some(1.0),
        }
        .encode()
    }

    #[test]
    fn scan_reports_records_and_corruption_in_offset_order() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("log.bipf");
        let mut log = AppendLog::open(&path).unwrap();
        let first = log.append(&payload(&key(0))).unwrap();
        let broken = log.append(&[0xff, 0xff, 0xff]).unwrap();
        let keyless = log
            .append(&bipf::encode(&Value::Object(vec![(
                "value".into(),
                Value::Null,
            )])))
            .unwrap();
        let last = log.append(&payload(&key(1))).unwrap();

        let items: Vec<ScanItem> = LogScanner::open(&path)
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(items.len(), 4);

        match &items[0] {
            ScanItem::Record(rec) => {
                assert_eq!(rec.offset, first);
                assert_eq!(
                    rec.short_key,
                    Some(ShortKey::from_key(key(0).as_bytes()).unwrap())
                );
            }
            other => panic!("expected record, got {other:?}"),
        }
        assert!(matches!(&items[1], ScanItem::Corrupt { offset, .. } if *offset == broken));
        assert!(matches!(
            &items[2],
            ScanItem::Record(ScannedRecord { offset, short_key: None, .. }) if *offset == keyless
        ));
        assert!(matches!(&items[3], ScanItem::Record(rec) if rec.offset == last));
    }

    #[test]
    fn deleted_records_are_not_scanned() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("log.bipf");
        let mut log = AppendLog::open(&path).unwrap();
        let gone = log.append(&payload(&key(0))).unwrap();
        log.append(&payload(&key(1))).unwrap();
        log.delete(gone).unwrap();

        assert_eq!(LogScanner::open(&path).unwrap().count(), 1);
    }
}
