//! Receiver-side throughput and latency sampling.
//!
//! The receiver asks for exactly one message per read. A read that comes back
//! short or empty means the sender is gone, and the run ends there. Elapsed
//! time is taken after every receipt so the final figure reflects the last
//! byte seen, not the moment the loop gave up.

use std::fmt;
use std::io::{self, Read};
use std::time::{Duration, Instant};

/// Running totals for one receiving connection.
#[derive(Debug, Clone)]
pub struct Sample {
    total_bytes: u64,
    started: Instant,
    elapsed: Duration,
}

impl Sample {
    pub fn start() -> Self {
        Self {
            total_bytes: 0,
            started: Instant::now(),
            elapsed: Duration::ZERO,
        }
    }

    /// Account `bytes` just received and stamp the elapsed time.
    pub fn record(&mut self, bytes: usize) {
        self.total_bytes += bytes as u64;
        self.elapsed = self.started.elapsed();
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Time from start to the last receipt.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn report(&self, message_size: usize) -> Report {
        Report::from_totals(self.total_bytes, message_size, self.elapsed)
    }
}

/// Final figures for one connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Report {
    Measured {
        /// Bits per second over the elapsed time.
        throughput_bps: f64,
        /// Microseconds per complete message.
        latency_us: f64,
        messages: u64,
    },
    /// No complete message arrived, or no time elapsed.
    NoData,
}

impl Report {
    pub fn from_totals(total_bytes: u64, message_size: usize, elapsed: Duration) -> Self {
        if message_size == 0 {
            return Report::NoData;
        }
        let messages = total_bytes / message_size as u64;
        let secs = elapsed.as_secs_f64();
        if messages == 0 || secs <= 0.0 {
            return Report::NoData;
        }
        Report::Measured {
            throughput_bps: total_bytes as f64 * 8.0 / secs,
            latency_us: secs * 1e6 / messages as f64,
            messages,
        }
    }

    pub fn throughput_gbps(&self) -> Option<f64> {
        match self {
            Report::Measured { throughput_bps, .. } => Some(throughput_bps / 1e9),
            Report::NoData => None,
        }
    }

    pub fn latency_us(&self) -> Option<f64> {
        match self {
            Report::Measured { latency_us, .. } => Some(*latency_us),
            Report::NoData => None,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Measured {
                throughput_bps,
                latency_us,
                ..
            } => write!(
                f,
                "Throughput: {:.4} Gbps, Latency: {:.2} us",
                throughput_bps / 1e9,
                latency_us
            ),
            Report::NoData => f.write_str("Throughput: no data, Latency: no data"),
        }
    }
}

/// Fill `buf` completely unless the stream ends first.
///
/// Returns the number of bytes read; anything short of `buf.len()` means the
/// peer closed mid-message. `EINTR` is retried.
pub fn recv_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Receive `message_size`-byte messages until `budget` elapses or the stream
/// ends. Read errors end the run like a closed stream.
pub fn run_sampler<R: Read>(reader: &mut R, message_size: usize, budget: Duration) -> Sample {
    let mut buf = vec![0u8; message_size];
    let mut sample = Sample::start();

    if message_size == 0 {
        return sample;
    }

    loop {
        let n = match recv_full(reader, &mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, "receive failed, ending sample");
                break;
            }
        };
        sample.record(n);
        if n < message_size {
            tracing::debug!(received = n, expected = message_size, "short receive, sender closed");
            break;
        }
        if sample.elapsed() >= budget {
            break;
        }
    }

    sample
}
