// THEORY:
// The `BlockageStateMachine` is the only owner of the system state. It is
// deliberately small: it does not look at pixels and does not write files. It
// consumes the tracker's signal and answers one question per frame, "has a
// blockage just been declared?", and it accepts exactly one external command,
// resume.
//
//   Monitoring --(persistence | window full)--> Frozen
//   Frozen     --(operator resume)-------------> Resetting
//   Resetting  --(fresh baseline adopted)------> Monitoring
//
// `Resetting` exists so that the frame adopted as the new baseline is one
// captured after the operator acknowledged the blockage, never the frame that
// was on screen when the freeze happened.

use crate::core_modules::candidate::CandidateBox;
use crate::core_modules::frame::Frame;
use crate::core_modules::tracker::TrackerSignal;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SystemState {
    #[default]
    Monitoring,
    Frozen,
    /// Resume was requested; waiting for the next frame to become the baseline.
    Resetting,
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SystemState::Monitoring => "MONITORING",
            SystemState::Frozen => "FROZEN",
            SystemState::Resetting => "RESETTING",
        };
        f.write_str(name)
    }
}

/// Which tracker signal caused a freeze.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeTrigger {
    /// A single candidate outlived the persistence limit.
    Persistence,
    /// Every frame in the occupancy window had a candidate.
    OccupancyWindow,
    /// Both fired on the same frame.
    Both,
}

impl FreezeTrigger {
    fn from_signal(signal: TrackerSignal) -> Option<Self> {
        match (signal.persisted_long_enough, signal.window_full) {
            (true, true) => Some(FreezeTrigger::Both),
            (true, false) => Some(FreezeTrigger::Persistence),
            (false, true) => Some(FreezeTrigger::OccupancyWindow),
            (false, false) => None,
        }
    }
}

/// Snapshot taken when a blockage is declared.
#[derive(Debug, Clone)]
pub struct BlockageRecord {
    pub snapshot: Frame,
    pub candidates: Vec<CandidateBox>,
    pub trigger: FreezeTrigger,
    pub declared_at: Duration,
}

#[derive(Debug, Default)]
pub struct BlockageStateMachine {
    state: SystemState,
    record: Option<BlockageRecord>,
    declarations: u64,
}

impl BlockageStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    pub fn record(&self) -> Option<&BlockageRecord> {
        self.record.as_ref()
    }

    /// Total number of blockages declared since start-up.
    pub fn declarations(&self) -> u64 {
        self.declarations
    }

    /// Freezes when the signal fires while monitoring. Returns the new record.
    pub fn evaluate(
        &mut self,
        signal: TrackerSignal,
        frame: &Frame,
        candidates: &[CandidateBox],
    ) -> Option<&BlockageRecord> {
        if self.state != SystemState::Monitoring {
            return None;
        }
        let trigger = FreezeTrigger::from_signal(signal)?;

        self.state = SystemState::Frozen;
        self.declarations += 1;
        self.record = Some(BlockageRecord {
            snapshot: frame.clone(),
            candidates: candidates.to_vec(),
            trigger,
            declared_at: frame.timestamp(),
        });
        self.record.as_ref()
    }

    /// Operator acknowledgement. Only meaningful while frozen.
    pub fn resume(&mut self) -> bool {
        if self.state != SystemState::Frozen {
            return false;
        }
        self.state = SystemState::Resetting;
        self.record = None;
        true
    }

    /// Called once the fresh baseline has been adopted.
    pub fn complete_reset(&mut self) {
        if self.state == SystemState::Resetting {
            self.state = SystemState::Monitoring;
        }
    }
}
