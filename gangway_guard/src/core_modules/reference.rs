// THEORY:
// The `ReferenceManager` owns the baseline image that every frame is diffed
// against. A fixed baseline slowly goes stale (lighting drift, a chair that was
// moved an hour ago), so the manager watches the segmenter's verdict: once the
// scene has shown no foreground at all for a continuous stretch, the current
// frame silently becomes the new baseline. The manager reports that event to its
// caller instead of reaching into other components; the pipeline is the one that
// clears tracker state in response.

use crate::core_modules::frame::Frame;
use std::time::Duration;

/// What an observation did to the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceEvent {
    /// There was no baseline yet; the observed frame became it.
    Adopted,
    /// The baseline is unchanged.
    Retained,
    /// The no-change timer expired and the observed frame replaced the baseline.
    Reset,
}

pub struct ReferenceManager {
    reference: Option<Frame>,
    /// Timestamp of the first frame in the current foreground-free run.
    no_change_since: Option<Duration>,
    reset_after: Duration,
}

impl ReferenceManager {
    pub fn new(reset_after: Duration) -> Self {
        Self {
            reference: None,
            no_change_since: None,
            reset_after,
        }
    }

    pub fn current_reference(&self) -> Option<&Frame> {
        self.reference.as_ref()
    }

    /// Feeds one frame's segmentation verdict into the no-change timer.
    pub fn observe(&mut self, frame: &Frame, has_foreground: bool) -> ReferenceEvent {
        if self.reference.is_none() {
            self.reference = Some(frame.clone());
            self.no_change_since = None;
            return ReferenceEvent::Adopted;
        }

        if has_foreground {
            self.no_change_since = None;
            return ReferenceEvent::Retained;
        }

        let now = frame.timestamp();
        match self.no_change_since {
            None => {
                self.no_change_since = Some(now);
                ReferenceEvent::Retained
            }
            Some(since) if now.saturating_sub(since) >= self.reset_after => {
                self.reference = Some(frame.clone());
                self.no_change_since = None;
                ReferenceEvent::Reset
            }
            Some(_) => ReferenceEvent::Retained,
        }
    }

    /// Replaces the baseline unconditionally and restarts the timer.
    pub fn force_reset(&mut self, frame: Frame) {
        self.reference = Some(frame);
        self.no_change_since = None;
    }
}
