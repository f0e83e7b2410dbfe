//! Real-time pacing
//!
//! Releases bytes from a reader no faster than the playback byte rate, so
//! that a file read from disk in milliseconds reaches listeners at the
//! speed it would be heard.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Upper bound for a single released chunk
pub const MAX_CHUNK_SIZE: usize = 64 * 1024;

/// Bytes/sec for a bitrate in bits/sec
pub fn byte_rate(bitrate: u64, divisor: u64) -> u64 {
    (bitrate / divisor.max(1)).max(1)
}

/// Chunk size covering `interval` of playback at `bytes_per_second`
pub fn chunk_size_for(bytes_per_second: u64, interval: Duration) -> usize {
    let size = (bytes_per_second as u128 * interval.as_millis()) / 1000;
    size.clamp(1, MAX_CHUNK_SIZE as u128) as usize
}

/// A reader paced to a fixed byte rate.
///
/// Chunk `k` is released no earlier than `bytes_before_k / rate` after the
/// first chunk. The rate never changes for the lifetime of the source.
pub struct RateLimitedSource<R> {
    reader: R,
    bytes_per_second: u64,
    buffer: Vec<u8>,
    cancel: CancellationToken,
    started_at: Option<Instant>,
    released: u64,
    finished: bool,
}

impl<R: AsyncRead + Unpin> RateLimitedSource<R> {
    pub fn new(reader: R, bytes_per_second: u64, chunk_size: usize, cancel: CancellationToken) -> Self {
        Self {
            reader,
            bytes_per_second: bytes_per_second.max(1),
            buffer: vec![0u8; chunk_size.clamp(1, MAX_CHUNK_SIZE)],
            cancel,
            started_at: None,
            released: 0,
            finished: false,
        }
    }

    /// Total bytes handed out so far
    pub fn released(&self) -> u64 {
        self.released
    }

    /// Next paced chunk; `None` at end of input or once cancelled
    pub async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>> {
        if self.finished || self.cancel.is_cancelled() {
            self.finished = true;
            return Ok(None);
        }

        let len = self.fill().await?;
        if len == 0 {
            self.finished = true;
            return Ok(None);
        }

        let started_at = *self.started_at.get_or_insert_with(Instant::now);
        let due = started_at + self.offset_of(self.released);

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.finished = true;
                return Ok(None);
            }
            _ = tokio::time::sleep_until(due) => {}
        }

        self.released += len as u64;
        Ok(Some(Bytes::copy_from_slice(&self.buffer[..len])))
    }

    /// Read until the buffer is full or the reader is exhausted
    async fn fill(&mut self) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < self.buffer.len() {
            let n = self.reader.read(&mut self.buffer[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    fn offset_of(&self, bytes: u64) -> Duration {
        let micros = (bytes as u128 * 1_000_000) / self.bytes_per_second as u128;
        Duration::from_micros(micros.min(u64::MAX as u128) as u64)
    }
}
