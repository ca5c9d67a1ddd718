// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Legacy offset log (`flume/log.offset`).
//!
//! Each frame is `u32 BE length | JSON | u32 BE length`. The trailing copy
//! of the length lets a reader tell a complete frame from one cut short by
//! a crash.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use super::{LogError, LogResult};

const LEN_FIELD: u64 = 4;

/// One frame read from the legacy log.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyEntry {
    Record {
        offset: u64,
        value: serde_json::Value,
    },
    /// A frame that could not be used. When the framing itself is broken
    /// this is the last entry.
    Corrupt { offset: u64, reason: String },
}

/// Sequential reader over the legacy log.
#[derive(Debug)]
pub struct LegacyReader {
    path: PathBuf,
    reader: BufReader<File>,
    file_len: u64,
    pos: u64,
    done: bool,
}

impl LegacyReader {
    pub fn open(path: impl AsRef<Path>) -> LogResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| LogError::io(&path, e))?;
        let file_len = file.metadata().map_err(|e| LogError::io(&path, e))?.len();
        Ok(Self {
            path,
            reader: BufReader::new(file),
            file_len,
            pos: 0,
            done: false,
        })
    }

    /// Size of the file when it was opened.
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.pos
    }

    fn corrupt(&mut self, offset: u64, reason: impl Into<String>) -> LegacyEntry {
        self.done = true;
        LegacyEntry::Corrupt {
            offset,
            reason: reason.into(),
        }
    }

    fn read_len(&mut self) -> io::Result<Option<u64>> {
        let mut buf = [0u8; LEN_FIELD as usize];
        let n = read_full(&mut self.reader, &mut buf)?;
        Ok((n == buf.len()).then(|| u64::from(u32::from_be_bytes(buf))))
    }

    fn next_entry(&mut self) -> io::Result<Option<LegacyEntry>> {
        loop {
            let offset = self.pos;
            if offset >= self.file_len {
                self.done = true;
                return Ok(None);
            }

            let Some(len) = self.read_len()? else {
                return Ok(Some(self.corrupt(offset, "partial length prefix")));
            };
            if offset + 2 * LEN_FIELD + len > self.file_len {
                return Ok(Some(self.corrupt(offset, "frame runs past end of file")));
            }

            let mut body = vec![0u8; len as usize];
            self.reader.read_exact(&mut body)?;
            let trailer = self.read_len()?;
            if trailer != Some(len) {
                return Ok(Some(self.corrupt(offset, "length trailer mismatch")));
            }
            self.pos = offset + 2 * LEN_FIELD + len;

            if len == 0 {
                continue;
            }
            return Ok(Some(match serde_json::from_slice(&body) {
                Ok(value) => LegacyEntry::Record { offset, value },
                Err(e) => LegacyEntry::Corrupt {
                    offset,
                    reason: format!("invalid JSON: {e}"),
                },
            }));
        }
    }
}

impl Iterator for LegacyReader {
    type Item = LogResult<LegacyEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entry() {
            Ok(entry) => entry.map(Ok),
            Err(e) => {
                self.done = true;
                Some(Err(LogError::io(&self.path, e)))
            }
        }
    }
}

/// Read until `buf` is full or the reader is exhausted.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
pub(crate) use writer::LegacyWriter;
