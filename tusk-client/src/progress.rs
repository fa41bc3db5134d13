//! Upload progress snapshots

use std::time::{Duration, Instant};

/// Progress at a chunk boundary.
///
/// Speed is the cumulative average over the current session: bytes sent
/// since the upload (or resume) started, divided by elapsed time. Bytes the
/// server already held when a resume began count toward `bytes_uploaded`
/// but not toward speed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Durable offset on the server
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
    /// Bytes sent during this session
    pub session_bytes: u64,
    pub elapsed: Duration,
    pub chunks_completed: u64,
    pub total_chunks: u64,
    /// Chunks that needed more than one attempt
    pub chunks_retried: u64,
}

impl ProgressSnapshot {
    /// Bytes per second, 0.0 before any time has passed
    pub fn speed(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.session_bytes as f64 / secs
        } else {
            0.0
        }
    }

    /// Time left at the current average speed; `None` while the speed is zero
    pub fn eta(&self) -> Option<Duration> {
        let remaining = self.remaining_bytes();
        if remaining == 0 {
            return Some(Duration::ZERO);
        }

        let speed = self.speed();
        if speed > 0.0 {
            Some(Duration::from_secs_f64(remaining as f64 / speed))
        } else {
            None
        }
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.bytes_uploaded)
    }

    /// 0.0 to 100.0
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        self.bytes_uploaded as f64 * 100.0 / self.total_bytes as f64
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_uploaded >= self.total_bytes
    }
}

/// `ceil(total / chunk_size)`
pub fn total_chunks(total_bytes: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    total_bytes.div_ceil(chunk_size)
}

/// Accumulates the counters a snapshot is built from
#[derive(Debug, Clone)]
pub(crate) struct ProgressTracker {
    started: Instant,
    total_bytes: u64,
    chunk_size: u64,
    session_bytes: u64,
    chunks_completed: u64,
    chunks_retried: u64,
}

impl ProgressTracker {
    pub(crate) fn new(total_bytes: u64, chunk_size: u64) -> Self {
        ProgressTracker {
            started: Instant::now(),
            total_bytes,
            chunk_size,
            session_bytes: 0,
            chunks_completed: 0,
            chunks_retried: 0,
        }
    }

    /// Count `bytes` that landed in one step. A step that skipped past
    /// bytes the server already held may cover several chunks.
    pub(crate) fn record_chunk(&mut self, bytes: u64, retried: bool) {
        self.session_bytes += bytes;
        self.chunks_completed += total_chunks(bytes, self.chunk_size).max(1);
        if retried {
            self.chunks_retried += 1;
        }
    }

    pub(crate) fn snapshot(&self, offset: u64) -> ProgressSnapshot {
        ProgressSnapshot {
            bytes_uploaded: offset,
            total_bytes: self.total_bytes,
            session_bytes: self.session_bytes,
            elapsed: self.started.elapsed(),
            chunks_completed: self.chunks_completed,
            total_chunks: total_chunks(self.total_bytes, self.chunk_size),
            chunks_retried: self.chunks_retried,
        }
    }
}
