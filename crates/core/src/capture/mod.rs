use std::sync::{Mutex, MutexGuard};

use crate::{config::TailPolicy, Result, ScopeError};

/// Handoff point between the audio callback and the consumer.
///
/// A channel owns the live buffer and its revision counter behind one lock.
/// The backend holds an `Arc` to it inside the stream callback and calls one
/// of the `deliver` methods; the [`BufferExchange`](crate::BufferExchange)
/// copies it out once per frame. Deliveries never allocate or log and hold
/// the lock only for a single buffer write.
#[derive(Debug)]
pub struct CaptureChannel {
    len: usize,
    live: Mutex<LiveBuffer>,
}

#[derive(Debug)]
struct LiveBuffer {
    samples: Vec<f32>,
    revision: u64,
    policy: TailPolicy,
    open: bool,
}

impl CaptureChannel {
    /// Creates an open channel with `len` zeroed samples and revision 0.
    pub fn new(len: usize, policy: TailPolicy) -> Self {
        Self {
            len,
            live: Mutex::new(LiveBuffer {
                samples: vec![0.0; len],
                revision: 0,
                policy,
                open: true,
            }),
        }
    }

    /// Length of the live buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn deliver(&self, samples: &[f32]) {
        self.deliver_iter(samples.iter().copied());
    }

    /// Delivers a raw byte span holding native-endian `f32` samples. Trailing
    /// bytes that do not form a whole sample are ignored.
    pub fn deliver_bytes(&self, bytes: &[u8]) {
        self.deliver_iter(
            bytes
                .chunks_exact(4)
                .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]])),
        );
    }

    /// Writes one callback's worth of samples into the live buffer and bumps
    /// the revision by one, even when `samples` is empty.
    ///
    /// Deliveries to a closed channel, or while the lock is poisoned, are
    /// dropped.
    pub fn deliver_iter<I>(&self, samples: I)
    where
        I: ExactSizeIterator<Item = f32>,
    {
        let mut live = match self.live.lock() {
            Ok(live) => live,
            Err(_) => return,
        };
        if !live.open {
            return;
        }
        live.write(samples);
        live.revision = live.revision.wrapping_add(1);
    }

    /// Current revision counter.
    pub fn revision(&self) -> Result<u64> {
        Ok(self.lock()?.revision)
    }

    /// Copies the whole live buffer into `dst` and returns the revision that
    /// was current while the copy was made.
    pub(crate) fn copy_into(&self, dst: &mut [f32]) -> Result<u64> {
        let live = self.lock()?;
        dst.copy_from_slice(&live.samples);
        Ok(live.revision)
    }

    /// Stops accepting deliveries. Once this returns, no delivery is in
    /// progress and every later one is ignored.
    pub fn close(&self) {
        let mut live = match self.live.lock() {
            Ok(live) => live,
            Err(poisoned) => poisoned.into_inner(),
        };
        live.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.live.lock().map(|live| live.open).unwrap_or(false)
    }

    fn lock(&self) -> Result<MutexGuard<'_, LiveBuffer>> {
        self.live
            .lock()
            .map_err(|_| ScopeError::Poisoned("capture channel"))
    }
}

impl LiveBuffer {
    fn write<I>(&mut self, samples: I)
    where
        I: ExactSizeIterator<Item = f32>,
    {
        let len = self.samples.len();
        let count = samples.len().min(len);

        match self.policy {
            TailPolicy::Retain => fill(&mut self.samples[..count], samples),
            TailPolicy::ZeroFill => {
                fill(&mut self.samples[..count], samples);
                self.samples[count..].fill(0.0);
            }
            TailPolicy::Rolling => {
                let skip = samples.len() - count;
                self.samples.copy_within(count.., 0);
                fill(&mut self.samples[len - count..], samples.skip(skip));
            }
        }
    }
}

fn fill(dst: &mut [f32], src: impl Iterator<Item = f32>) {
    for (slot, sample) in dst.iter_mut().zip(src) {
        *slot = sample;
    }
}
