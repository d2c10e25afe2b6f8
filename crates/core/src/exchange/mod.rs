use std::sync::Arc;

use crate::{CaptureChannel, Result};

/// Consumer side of the capture handoff.
///
/// Owns the snapshot buffer and the last revision it observed. The capture
/// channel is only locked for the duration of one fixed-size copy, so the
/// analysis that follows never holds up the producer.
#[derive(Debug)]
pub struct BufferExchange {
    channel: Option<Arc<CaptureChannel>>,
    snapshot: Vec<f32>,
    observed: u64,
}

impl BufferExchange {
    pub fn new(len: usize) -> Self {
        Self {
            channel: None,
            snapshot: vec![0.0; len],
            observed: 0,
        }
    }

    /// Starts reading from `channel` with the baseline reset to revision 0,
    /// the revision of a freshly created channel. Anything delivered before
    /// the first acquisition, including deliveries made while the backend was
    /// still starting the stream, is reported as new data.
    pub fn attach(&mut self, channel: Arc<CaptureChannel>) {
        self.observed = 0;
        if self.snapshot.len() != channel.len() {
            self.snapshot = vec![0.0; channel.len()];
        }
        self.channel = Some(channel);
    }

    /// Stops reading. The last snapshot stays available.
    pub fn detach(&mut self) {
        self.channel = None;
    }

    pub fn is_attached(&self) -> bool {
        self.channel.is_some()
    }

    /// Copies the live buffer into the snapshot and reports whether any
    /// delivery happened since the previous call.
    ///
    /// The copy is unconditional and always covers the whole buffer. Without
    /// an attached channel nothing is copied and `false` is returned.
    pub fn acquire_snapshot(&mut self) -> Result<bool> {
        let channel = match &self.channel {
            Some(channel) => channel,
            None => return Ok(false),
        };

        let current = channel.copy_into(&mut self.snapshot)?;
        let has_new_data = current != self.observed;
        self.observed = current;
        Ok(has_new_data)
    }

    pub fn snapshot(&self) -> &[f32] {
        &self.snapshot
    }

    /// Revision seen by the most recent acquisition.
    pub fn observed_revision(&self) -> u64 {
        self.observed
    }
}
