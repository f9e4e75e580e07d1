//! Sequential chunk reading.
//!
//! Reads the input line by line and groups lines into chunks whose byte
//! total (line length plus one terminator each) reaches the configured
//! threshold. Lines are never split across chunks, and an empty chunk means
//! the input is exhausted.

use crate::constants::READ_BUFFER_BYTES;
use crate::error::{AggregatorError, Result};
use crate::models::Chunk;

use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, trace};

/// Yields line-aligned chunks from any buffered async source
#[derive(Debug)]
pub struct ChunkReader<R> {
    source: R,
    path: PathBuf,
    chunk_size: usize,
    line_buffer: Vec<u8>,
    next_index: usize,
    lines_read: u64,
    bytes_read: u64,
    exhausted: bool,
}

impl ChunkReader<BufReader<File>> {
    /// Open a file on disk for chunked reading
    pub async fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        let file = File::open(path)
            .await
            .map_err(|e| AggregatorError::io(path, e))?;
        debug!("Opened {} for chunked reading", path.display());

        Ok(Self::new(
            BufReader::with_capacity(READ_BUFFER_BYTES, file),
            path,
            chunk_size,
        ))
    }
}

impl<R: AsyncBufRead + Unpin> ChunkReader<R> {
    /// Wrap a source; `path` is only used to label errors
    pub fn new(source: R, path: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            source,
            path: path.into(),
            chunk_size,
            line_buffer: Vec::with_capacity(256),
            next_index: 0,
            lines_read: 0,
            bytes_read: 0,
            exhausted: false,
        }
    }

    /// Read the next chunk. Returns an empty chunk once the source is drained.
    pub async fn next_chunk(&mut self) -> Result<Chunk> {
        let mut chunk = Chunk {
            index: self.next_index,
            ..Chunk::default()
        };

        while !self.exhausted && chunk.bytes < self.chunk_size {
            self.line_buffer.clear();
            let read = self
                .source
                .read_until(b'\n', &mut self.line_buffer)
                .await
                .map_err(|e| AggregatorError::io(&self.path, e))?;

            if read == 0 {
                self.exhausted = true;
                break;
            }

            self.bytes_read += read as u64;
            self.lines_read += 1;

            let line = trim_line_ending(&self.line_buffer);
            chunk.bytes += line.len() + 1;
            chunk.lines.push(decode_line(line));
        }

        if !chunk.is_empty() {
            self.next_index += 1;
            trace!(
                "Chunk {} closed with {} lines ({} bytes)",
                chunk.index,
                chunk.len(),
                chunk.bytes
            );
        }

        Ok(chunk)
    }

    /// Lines consumed so far
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Raw bytes consumed so far, terminators included
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Non-empty chunks returned so far
    pub fn chunks_read(&self) -> usize {
        self.next_index
    }
}

/// Strip `\n` and a preceding `\r`
fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Invalid UTF-8 becomes an empty line, which workers reject like any
/// other malformed record
fn decode_line(line: &[u8]) -> String {
    match std::str::from_utf8(line) {
        Ok(text) => text.to_owned(),
        Err(_) => {
            trace!("Dropping line with invalid UTF-8 ({} bytes)", line.len());
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_all(input: &'static [u8], chunk_size: usize) -> Vec<Chunk> {
        let mut reader = ChunkReader::new(input, "memory", chunk_size);
        let mut chunks = Vec::new();
        loop {
            let chunk = reader.next_chunk().await.unwrap();
            if chunk.is_empty() {
                break;
            }
            chunks.push(chunk);
        }
        chunks
    }

    #[tokio::test]
    async fn test_empty_source_yields_empty_chunk() {
        let chunks = read_all(b"", 1024).await;
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_chunk_closes_once_threshold_reached() {
        // "a;1.0" is 5 bytes + terminator = 6 per line
        let input = b"a;1.0\nb;2.0\nc;3.0\nd;4.0\ne;5.0\n";
        let chunks = read_all(input, 12).await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].lines, vec!["a;1.0", "b;2.0"]);
        assert_eq!(chunks[0].bytes, 12);
        assert_eq!(chunks[1].lines, vec!["c;3.0", "d;4.0"]);
        assert_eq!(chunks[2].lines, vec!["e;5.0"]);
        assert_eq!(chunks[2].index, 2);
    }

    #[tokio::test]
    async fn test_one_byte_threshold_gives_one_line_per_chunk() {
        let chunks = read_all(b"x;1\ny;2\nz;3\n", 1).await;
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|chunk| chunk.len() == 1));
    }

    #[tokio::test]
    async fn test_final_line_without_newline() {
        let chunks = read_all(b"Hamburg;12.0\nOslo;-3.4", 1 << 20).await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].lines, vec!["Hamburg;12.0", "Oslo;-3.4"]);
    }

    #[tokio::test]
    async fn test_crlf_and_blank_lines() {
        let chunks = read_all(b"a;1.0\r\n\r\nb;2.0\r\n", 1 << 20).await;
        assert_eq!(chunks[0].lines, vec!["a;1.0", "", "b;2.0"]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_becomes_empty_line() {
        let chunks = read_all(b"ok;1.0\n\xff\xfe;2.0\n", 1 << 20).await;
        assert_eq!(chunks[0].lines, vec!["ok;1.0", ""]);
    }

    #[tokio::test]
    async fn test_counters_track_consumed_input() {
        let input: &'static [u8] = b"a;1.0\nb;2.0\nc;3.0\n";
        let mut reader = ChunkReader::new(input, "memory", 6);
        while !reader.next_chunk().await.unwrap().is_empty() {}

        assert_eq!(reader.lines_read(), 3);
        assert_eq!(reader.bytes_read(), input.len() as u64);
        assert_eq!(reader.chunks_read(), 3);
    }

    #[tokio::test]
    async fn test_open_missing_file_is_io_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.txt");

        let result = ChunkReader::open(&missing, 1024).await;
        match result {
            Err(AggregatorError::Io { path, .. }) => assert_eq!(path, missing),
            other => panic!("Expected Io error, got {:?}", other.map(|_| ())),
        }
    }
}
