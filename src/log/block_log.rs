// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Block-aligned append-only log (`db2/log.bipf`).
//!
//! The file is a sequence of [`BLOCK_SIZE`] blocks. Inside a block each
//! record is a little-endian `u16` payload length followed by the payload.
//! A zero length, or fewer than two bytes left, ends the block. Records
//! never straddle blocks, so a record's offset is stable forever.
//!
//! Deleting a record overwrites its payload with zeros in place. Readers
//! skip all-zero payloads, which is why [`AppendLog::append`] refuses them.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{LogError, LogResult};

pub const BLOCK_SIZE: usize = 64 * 1024;

const LEN_PREFIX: usize = 2;

/// Largest payload that fits in a single block.
pub const MAX_RECORD_LEN: usize = BLOCK_SIZE - LEN_PREFIX;

/// Result of [`AppendLog::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyDeleted,
    /// No record starts at that offset.
    NotFound,
}

/// One physical entry produced by [`LogReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Record { offset: u64, payload: Vec<u8> },
    /// A record whose bytes run past the end of the block or file. The
    /// rest of that block is skipped.
    Truncated { offset: u64 },
}

enum Step {
    Record { pos: usize, len: usize },
    Torn { pos: usize },
    End,
}

fn step(block: &[u8], pos: usize) -> Step {
    let header_end = pos + LEN_PREFIX;
    if header_end > block.len() {
        // A stray byte at the very end of a short block is a half-written
        // length prefix.
        return match block.get(pos) {
            Some(&b) if b != 0 && block.len() < BLOCK_SIZE => Step::Torn { pos },
            _ => Step::End,
        };
    }
    let len = usize::from(u16::from_le_bytes([block[pos], block[pos + 1]]));
    if len == 0 {
        return Step::End;
    }
    if header_end + len > block.len() {
        return Step::Torn { pos };
    }
    Step::Record { pos, len }
}

fn is_zeroed(payload: &[u8]) -> bool {
    payload.iter().all(|&b| b == 0)
}

fn block_start(offset: u64) -> u64 {
    offset - offset % BLOCK_SIZE as u64
}

fn read_block(file: &mut File, start: u64, file_len: u64) -> io::Result<Vec<u8>> {
    let len = file_len.saturating_sub(start).min(BLOCK_SIZE as u64) as usize;
    let mut block = vec![0u8; len];
    file.seek(SeekFrom::Start(start))?;
    file.read_exact(&mut block)?;
    Ok(block)
}

/// Writable handle on a block log.
#[derive(Debug)]
pub struct AppendLog {
    path: PathBuf,
    file: File,
    /// Offset where the next record may start.
    write_pos: u64,
    file_len: u64,
}

impl AppendLog {
    /// Open the log at `path`, creating it (and its directory) if needed.
    pub fn open(path: impl AsRef<Path>) -> LogResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| LogError::io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| LogError::io(&path, e))?;
        let file_len = file.metadata().map_err(|e| LogError::io(&path, e))?.len();
        let write_pos =
            Self::find_write_pos(&mut file, file_len).map_err(|e| LogError::io(&path, e))?;

        if write_pos < file_len {
            tracing::warn!(
                path = %path.display(),
                file_len,
                write_pos,
                "log ends with a partial record; it will be cut on the next append"
            );
        }

        Ok(Self {
            path,
            file,
            write_pos,
            file_len,
        })
    }

    fn find_write_pos(file: &mut File, file_len: u64) -> io::Result<u64> {
        if file_len == 0 {
            return Ok(0);
        }
        let start = block_start(file_len - 1);
        let block = read_block(file, start, file_len)?;
        if block.len() == BLOCK_SIZE {
            return Ok(start + BLOCK_SIZE as u64);
        }

        let mut pos = 0;
        while let Step::Record { pos: at, len } = step(&block, pos) {
            pos = at + LEN_PREFIX + len;
        }
        Ok(start + pos as u64)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset just past the last complete record.
    pub fn end_offset(&self) -> u64 {
        self.write_pos
    }

    /// Append one record and return its offset.
    pub fn append(&mut self, payload: &[u8]) -> LogResult<u64> {
        if is_zeroed(payload) {
            return Err(LogError::EmptyRecord);
        }
        let len = u16::try_from(payload.len())
            .ok()
            .filter(|&len| usize::from(len) <= MAX_RECORD_LEN)
            .ok_or(LogError::RecordTooLarge {
                len: payload.len(),
                max: MAX_RECORD_LEN,
            })?;

        if self.write_pos < self.file_len {
            self.file
                .set_len(self.write_pos)
                .map_err(|e| LogError::io(&self.path, e))?;
            self.file_len = self.write_pos;
        }

        let frame_len = LEN_PREFIX + payload.len();
        let mut offset = self.write_pos;
        let in_block = (offset % BLOCK_SIZE as u64) as usize;
        if in_block + frame_len > BLOCK_SIZE {
            // The gap past EOF reads back as zeros, which closes the block.
            offset += (BLOCK_SIZE - in_block) as u64;
        }

        let mut frame = Vec::with_capacity(frame_len);
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(payload);
        self.write_at(offset, &frame)?;

        self.write_pos = offset + frame_len as u64;
        self.file_len = self.file_len.max(self.write_pos);
        Ok(offset)
    }

    /// Mark the record starting at `offset` as deleted.
    ///
    /// Offsets that are not a record start, or whose record is already
    /// zeroed, leave the file untouched.
    pub fn delete(&mut self, offset: u64) -> LogResult<DeleteOutcome> {
        if offset >= self.write_pos {
            return Ok(DeleteOutcome::NotFound);
        }
        let start = block_start(offset);
        let block = read_block(&mut self.file, start, self.file_len)
            .map_err(|e| LogError::io(&self.path, e))?;
        let target = (offset - start) as usize;

        let mut pos = 0;
        let len = loop {
            match step(&block, pos) {
                Step::Record { pos: at, len } if at == target => break len,
                Step::Record { pos: at, len } if at < target => pos = at + LEN_PREFIX + len,
                _ => return Ok(DeleteOutcome::NotFound),
            }
        };

        let body = target + LEN_PREFIX;
        if is_zeroed(&block[body..body + len]) {
            return Ok(DeleteOutcome::AlreadyDeleted);
        }
        self.write_at(offset + LEN_PREFIX as u64, &vec![0u8; len])?;
        tracing::debug!(path = %self.path.display(), offset, "record deleted");
        Ok(DeleteOutcome::Deleted)
    }

    /// Flush written records to disk.
    pub fn sync(&self) -> LogResult<()> {
        self.file.sync_all().map_err(|e| LogError::io(&self.path, e))
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> LogResult<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.write_all(bytes))
            .map_err(|e| LogError::io(&self.path, e))
    }
}

/// Streaming reader over a block log, one block in memory at a time.
///
/// Deleted records are skipped. The file length is taken when the reader
/// opens; records appended afterwards are not seen.
#[derive(Debug)]
pub struct LogReader {
    path: PathBuf,
    file: File,
    file_len: u64,
    next_block: u64,
    block_start: u64,
    block: Vec<u8>,
    pos: usize,
    loaded: bool,
    failed: bool,
}

impl LogReader {
    pub fn open(path: impl AsRef<Path>) -> LogResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| LogError::io(&path, e))?;
        let file_len = file.metadata().map_err(|e| LogError::io(&path, e))?.len();
        Ok(Self {
            path,
            file,
            file_len,
            next_block: 0,
            block_start: 0,
            block: Vec::new(),
            pos: 0,
            loaded: false,
            failed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_next_block(&mut self) -> Option<LogResult<()>> {
        if self.next_block >= self.file_len {
            return None;
        }
        match read_block(&mut self.file, self.next_block, self.file_len) {
            Ok(block) => {
                self.block = block;
                self.block_start = self.next_block;
                self.next_block += BLOCK_SIZE as u64;
                self.pos = 0;
                self.loaded = true;
                Some(Ok(()))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(LogError::io(&self.path, e)))
            }
        }
    }
}

impl Iterator for LogReader {
    type Item = LogResult<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            if !self.loaded {
                if let Err(e) = self.load_next_block()? {
                    return Some(Err(e));
                }
            }

            match step(&self.block, self.pos) {
                Step::Record { pos, len } => {
                    self.pos = pos + LEN_PREFIX + len;
                    let payload = &self.block[pos + LEN_PREFIX..self.pos];
                    if is_zeroed(payload) {
                        continue;
                    }
                    return Some(Ok(LogEntry::Record {
                        offset: self.block_start + pos as u64,
                        payload: payload.to_vec(),
                    }));
                }
                Step::Torn { pos } => {
                    self.loaded = false;
                    return Some(Ok(LogEntry::Truncated {
                        offset: self.block_start + pos as u64,
                    }));
                }
                Step::End => self.loaded = false,
            }
        }
    }
}
