// THEORY:
// The `pipeline` module is the top-level API of the blockage engine. A
// `BlockagePipeline` is the single, explicitly owned context that holds every
// piece of mutable state: the baseline, the tracker and its occupancy window,
// the state machine, and the last blockage thumbnail. Each stage is a plain
// component called in order for one frame at a time; nothing is shared and
// nothing runs concurrently, so reset semantics can be read straight off
// `process_frame` and `resume`.
//
// Time inside the pipeline is frame time. The settle delay after a resume is
// measured against frame timestamps, so the caller keeps feeding (and showing)
// frames while it runs instead of sleeping.

use crate::config::GuardConfig;
use crate::core_modules::annotate;
use crate::core_modules::artifact::ArtifactSink;
use crate::core_modules::blockage::{BlockageStateMachine, FreezeTrigger};
use crate::core_modules::candidate_extractor::CandidateExtractor;
use crate::core_modules::reconciler::{PersonReconciler, Reconciliation, confident_persons};
use crate::core_modules::reference::{ReferenceEvent, ReferenceManager};
use crate::core_modules::segmenter::ForegroundSegmenter;
use crate::core_modules::tracker::PersistenceTracker;
use crate::error::{GuardError, Result};
use image::RgbImage;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

// Re-export key data structures for the public API.
pub use crate::core_modules::blockage::{BlockageRecord, SystemState};
pub use crate::core_modules::candidate::{BoundingBox, CandidateBox, PersonBox};
pub use crate::core_modules::frame::Frame;
pub use crate::core_modules::tracker::{OccupancyWindow, TrackedEntry, TrackerSignal};

/// Per-frame results of a monitoring pass.
#[derive(Debug, Clone, Default)]
pub struct FrameAnalysis {
    /// Candidates that count as blockage evidence.
    pub valid: Vec<CandidateBox>,
    /// Candidates overlapping a person, shown for debugging only.
    pub suppressed: Vec<CandidateBox>,
    /// Person detections that passed the confidence filter.
    pub persons: Vec<PersonBox>,
    pub foreground_pixels: u64,
    pub signal: TrackerSignal,
    /// The baseline was silently replaced on this frame.
    pub reference_reset: bool,
}

/// Outcome of persisting the blockage snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactStatus {
    Written(PathBuf),
    Failed(String),
}

/// The primary output of the pipeline for a single frame.
#[derive(Debug, Clone)]
pub enum Report {
    /// The frame became the baseline and was not analysed.
    BaselineAdopted,
    /// Resume was acknowledged; frames are skipped until the settle delay ends.
    Settling,
    /// Normal monitoring; no blockage declared.
    Monitoring(FrameAnalysis),
    /// A blockage was declared on this frame and the pipeline is now frozen.
    BlockageDeclared {
        analysis: FrameAnalysis,
        trigger: FreezeTrigger,
        artifact: ArtifactStatus,
    },
    /// The pipeline is frozen; the frame was not analysed.
    Frozen,
}

/// Operator-facing label of a drawn box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Blockage,
    Person,
    /// A candidate discarded because a person overlaps it.
    PersonBlockage,
}

impl LabelKind {
    pub fn text(&self) -> &'static str {
        match self {
            LabelKind::Blockage => "Blockage",
            LabelKind::Person => "Person",
            LabelKind::PersonBlockage => "Person_Blockage",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxLabel {
    pub bounds: BoundingBox,
    pub kind: LabelKind,
}

impl Report {
    fn analysis(&self) -> Option<&FrameAnalysis> {
        match self {
            Report::Monitoring(analysis) => Some(analysis),
            Report::BlockageDeclared { analysis, .. } => Some(analysis),
            Report::BaselineAdopted | Report::Settling | Report::Frozen => None,
        }
    }

    /// Every box of an analysed frame with its text label.
    pub fn labels(&self) -> Vec<BoxLabel> {
        let Some(analysis) = self.analysis() else {
            return Vec::new();
        };
        let persons = analysis.persons.iter().map(|p| (p.bounds, LabelKind::Person));
        let suppressed = analysis.suppressed.iter().map(|c| (c.bounds, LabelKind::PersonBlockage));
        let valid = analysis.valid.iter().map(|c| (c.bounds, LabelKind::Blockage));
        persons
            .chain(suppressed)
            .chain(valid)
            .map(|(bounds, kind)| BoxLabel { bounds, kind })
            .collect()
    }
}

pub struct BlockagePipeline {
    config: GuardConfig,
    reference: ReferenceManager,
    segmenter: ForegroundSegmenter,
    extractor: CandidateExtractor,
    tracker: PersistenceTracker,
    reconciler: PersonReconciler,
    state: BlockageStateMachine,
    artifacts: Box<dyn ArtifactSink>,
    /// Picture-in-picture copy of the most recent blockage snapshot.
    last_thumbnail: Option<RgbImage>,
    /// Timestamp of the latest frame handed to `process_frame`.
    last_timestamp: Duration,
    /// Frames before this timestamp are skipped while resetting.
    settle_until: Duration,
}

impl BlockagePipeline {
    pub fn new(config: GuardConfig, artifacts: Box<dyn ArtifactSink>) -> Self {
        Self {
            reference: ReferenceManager::new(config.no_change_reset()),
            segmenter: ForegroundSegmenter::new(config.diff_threshold, config.open_kernel, config.close_kernel),
            extractor: CandidateExtractor::new(config.min_area, config.max_area),
            tracker: PersistenceTracker::new(config.window_capacity(), config.persistence(), config.match_iou),
            reconciler: PersonReconciler::new(config.containment),
            state: BlockageStateMachine::new(),
            artifacts,
            last_thumbnail: None,
            last_timestamp: Duration::ZERO,
            settle_until: Duration::ZERO,
            config,
        }
    }

    pub fn process_frame(&mut self, frame: Frame, persons: &[PersonBox]) -> Result<Report> {
        self.last_timestamp = frame.timestamp();
        match self.state.state() {
            SystemState::Frozen => return Ok(Report::Frozen),
            SystemState::Resetting if frame.timestamp() < self.settle_until => {
                return Ok(Report::Settling);
            }
            SystemState::Resetting => {
                info!(sequence = frame.sequence(), "fresh baseline adopted after resume");
                self.reference.force_reset(frame);
                self.state.complete_reset();
                return Ok(Report::BaselineAdopted);
            }
            SystemState::Monitoring => {}
        }

        // Stage 1: Baseline
        let reference = match self.reference.current_reference() {
            Some(reference) => reference,
            None => {
                self.reference.observe(&frame, false);
                info!(sequence = frame.sequence(), "initial baseline adopted");
                return Ok(Report::BaselineAdopted);
            }
        };

        // Stage 2: Segmentation
        let mask = match self.segmenter.segment(&frame, reference) {
            Ok(mask) => mask,
            Err(GuardError::FrameMismatch { frame: size, reference: old }) => {
                // The source changed resolution; nothing tracked so far is comparable.
                warn!(?size, ?old, "frame size changed, baseline replaced");
                self.reference.force_reset(frame);
                self.tracker.reset();
                return Ok(Report::BaselineAdopted);
            }
            Err(e) => return Err(e),
        };
        let foreground_pixels = mask.count_set();

        // Stage 2.5: Baseline maintenance
        let reference_reset = self.reference.observe(&frame, !mask.is_empty()) == ReferenceEvent::Reset;
        if reference_reset {
            self.tracker.reset();
            info!(sequence = frame.sequence(), "scene quiet, baseline refreshed");
        }

        // Stage 3: Candidate extraction
        let candidates = self.extractor.extract(&mask);

        // Stage 4: Person reconciliation
        let persons = confident_persons(persons, self.config.person_min_confidence);
        let Reconciliation { valid, suppressed } = self.reconciler.reconcile(candidates, &persons);
        if !suppressed.is_empty() {
            debug!(suppressed = suppressed.len(), "candidates overlapping people");
        }

        // Stage 5: Persistence
        let signal = self.tracker.update(&valid, frame.timestamp());

        let analysis = FrameAnalysis {
            valid,
            suppressed,
            persons,
            foreground_pixels,
            signal,
            reference_reset,
        };

        // Stage 6: Freeze decision
        let record = match self.state.evaluate(signal, &frame, &analysis.valid) {
            Some(record) => record,
            None => return Ok(Report::Monitoring(analysis)),
        };
        let trigger = record.trigger;
        let snapshot = annotate::render_blockage(record);
        warn!(
            sequence = frame.sequence(),
            declared_at = ?record.declared_at,
            ?trigger,
            boxes = record.candidates.len(),
            largest_area = record.candidates.iter().map(|c| c.region_area).max().unwrap_or(0),
            "blockage detected, frame frozen"
        );

        if self.config.thumbnail_size > 0 {
            self.last_thumbnail = Some(annotate::thumbnail(&snapshot, self.config.thumbnail_size));
        }
        let artifact = match self.artifacts.persist(&snapshot) {
            Ok(path) => {
                info!(path = %path.display(), "blockage image saved");
                ArtifactStatus::Written(path)
            }
            Err(e) => {
                warn!(error = %e, "could not save blockage image");
                ArtifactStatus::Failed(e.to_string())
            }
        };

        Ok(Report::BlockageDeclared {
            analysis,
            trigger,
            artifact,
        })
    }

    /// Operator acknowledgement of a blockage. The first frame captured once
    /// the settle delay has passed becomes the new baseline. Returns false
    /// when not frozen.
    pub fn resume(&mut self) -> bool {
        if !self.state.resume() {
            return false;
        }
        self.tracker.reset();
        self.settle_until = self.last_timestamp.saturating_add(self.config.resume_settle());
        info!(settle_until = ?self.settle_until, "resuming, waiting for a fresh baseline");
        true
    }

    /// Builds the annotated view of `frame` for the display sink.
    pub fn render(&self, frame: &Frame, report: &Report) -> RgbImage {
        let mut view = frame.image().clone();
        for label in report.labels() {
            let color = match label.kind {
                LabelKind::Person => annotate::PERSON_COLOR,
                LabelKind::PersonBlockage => annotate::SUPPRESSED_COLOR,
                LabelKind::Blockage => annotate::BLOCKAGE_COLOR,
            };
            annotate::draw_box(&mut view, &label.bounds, color, annotate::BOX_THICKNESS);
        }
        if self.state.state() == SystemState::Frozen {
            annotate::draw_banner(&mut view, annotate::BLOCKAGE_COLOR);
        }
        if let Some(thumbnail) = &self.last_thumbnail {
            annotate::overlay_thumbnail(&mut view, thumbnail);
        }
        view
    }

    pub fn state(&self) -> SystemState {
        self.state.state()
    }

    pub fn record(&self) -> Option<&BlockageRecord> {
        self.state.record()
    }

    pub fn current_reference(&self) -> Option<&Frame> {
        self.reference.current_reference()
    }

    pub fn tracked_entries(&self) -> &[TrackedEntry] {
        self.tracker.entries()
    }

    pub fn occupancy_window(&self) -> &OccupancyWindow {
        self.tracker.window()
    }

    pub fn declarations(&self) -> u64 {
        self.state.declarations()
    }
}
