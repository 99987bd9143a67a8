// Progress reporting for uploads.
// The session only knows the `ProgressObserver` trait; the console bar
// below is what the CLI plugs in.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Size of one read buffer during transfer, and the progress granularity.
pub const BUFFER_SIZE: usize = 1024 * 1024;

/// Receives progress ticks from a transfer. Runs on the transferring
/// thread, so implementations must return quickly.
pub trait ProgressObserver: Send + Sync {
    /// A transfer attempt begins at `offset` of a `total`-byte file.
    fn attempt_started(&self, _offset: u64, _total: u64) {}

    /// `sent` bytes of the current attempt have been handed to the network.
    fn on_progress(&self, sent: u64, total: u64);

    /// The upload this observer was created for is over, whatever the outcome.
    fn finished(&self) {}
}

impl<F> ProgressObserver for F
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn on_progress(&self, sent: u64, total: u64) {
        self(sent, total)
    }
}

/// Observer that ignores every tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _sent: u64, _total: u64) {}
}

/// Terminal progress bar showing bytes, throughput and ETA.
pub struct ConsoleProgress {
    bar: ProgressBar,
    offset: AtomicU64,
}

impl ConsoleProgress {
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] {bar:40} {bytes}/{total_bytes} {binary_bytes_per_sec} eta {eta}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        ConsoleProgress {
            bar,
            offset: AtomicU64::new(0),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressObserver for ConsoleProgress {
    fn attempt_started(&self, offset: u64, total: u64) {
        self.offset.store(offset, Ordering::Relaxed);
        self.bar.set_length(total);
        self.bar.set_position(offset);
    }

    fn on_progress(&self, sent: u64, _total: u64) {
        self.bar
            .set_position(self.offset.load(Ordering::Relaxed) + sent);
    }

    fn finished(&self) {
        self.finish();
    }
}

/// Reader adapter that reports cumulative bytes read every `BUFFER_SIZE`
/// bytes and once more when the last byte of the body has been read.
pub(crate) struct ProgressReader<R> {
    inner: R,
    sent: u64,
    len: u64,
    total: u64,
    next_tick: u64,
    observer: Arc<dyn ProgressObserver>,
}

impl<R: Read> ProgressReader<R> {
    /// `len` is the size of this body, `total` the size of the whole file.
    pub(crate) fn new(inner: R, len: u64, total: u64, observer: Arc<dyn ProgressObserver>) -> Self {
        ProgressReader {
            inner,
            sent: 0,
            len,
            total,
            next_tick: BUFFER_SIZE as u64,
            observer,
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.sent += n as u64;
            if self.sent >= self.next_tick || self.sent == self.len {
                self.observer.on_progress(self.sent, self.total);
                self.next_tick = (self.sent / BUFFER_SIZE as u64 + 1) * BUFFER_SIZE as u64;
            }
        }
        Ok(n)
    }
}
