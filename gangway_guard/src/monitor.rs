// THEORY:
// The `monitor` module is the run loop around a `BlockagePipeline`. It owns the
// three external collaborators (video source, person detector, display sink)
// behind small traits, and it receives operator commands over a tokio channel
// instead of blocking on a key press. That keeps acquisition and rendering
// alive while the pipeline is frozen: frames keep flowing to the display with
// the blockage marker, but none of them are analysed until a resume arrives.
//
// The loop is strictly sequential. Commands are drained once per iteration,
// which is also where cancellation is observed. Nothing is queued: a frame is
// read, handled and dropped before the next one is requested. Nothing in the
// loop sleeps; the post-resume settle delay is counted in frame time by the
// pipeline while frames keep reaching the display.

use crate::core_modules::blockage::SystemState;
use crate::core_modules::candidate::PersonBox;
use crate::core_modules::frame::Frame;
use crate::error::Result;
use crate::pipeline::{BlockagePipeline, BoxLabel, Report};
use image::RgbImage;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info, warn};

/// Produces frames in capture order.
pub trait FrameSource {
    /// Reads the next frame. Any error is treated as end of stream.
    fn read(&mut self) -> Result<Frame>;
}

/// External person detector. Only its output contract matters to the core.
pub trait PersonDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<PersonBox>>;
}

/// Detector used when no model is configured: never reports anyone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPersonDetector;

impl PersonDetector for NoPersonDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<PersonBox>> {
        Ok(Vec::new())
    }
}

/// Receives every frame the monitor decides to show, with the labelled
/// boxes already drawn into `view`.
pub trait DisplaySink {
    fn show(&mut self, view: &RgbImage, state: SystemState, labels: &[BoxLabel]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Acknowledge a blockage and return to monitoring.
    Resume,
    /// Stop the monitor from any state.
    Quit,
}

/// Cloneable sending half of the operator channel.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<OperatorCommand>,
}

impl ControlHandle {
    pub fn send(&self, command: OperatorCommand) -> bool {
        self.tx.send(command).is_ok()
    }

    pub fn resume(&self) -> bool {
        self.send(OperatorCommand::Resume)
    }

    pub fn quit(&self) -> bool {
        self.send(OperatorCommand::Quit)
    }
}

/// Creates the operator channel.
pub fn control_channel() -> (ControlHandle, mpsc::UnboundedReceiver<OperatorCommand>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ControlHandle { tx }, rx)
}

/// Why the monitor loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    OperatorQuit,
    /// The video source failed or ran dry.
    AcquisitionFailed(String),
    /// Every control handle was dropped while frozen, so nothing could resume.
    ControlClosed,
}

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames_read: u64,
    pub frames_analysed: u64,
    pub blockages: u64,
}

pub struct Monitor<S, P, D> {
    pipeline: BlockagePipeline,
    source: S,
    detector: P,
    display: D,
    commands: mpsc::UnboundedReceiver<OperatorCommand>,
    stats: RunStats,
}

impl<S, P, D> Monitor<S, P, D>
where
    S: FrameSource,
    P: PersonDetector,
    D: DisplaySink,
{
    pub fn new(
        pipeline: BlockagePipeline,
        source: S,
        detector: P,
        display: D,
        commands: mpsc::UnboundedReceiver<OperatorCommand>,
    ) -> Self {
        Self {
            pipeline,
            source,
            detector,
            display,
            commands,
            stats: RunStats::default(),
        }
    }

    pub fn pipeline(&self) -> &BlockagePipeline {
        &self.pipeline
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Runs until quit or acquisition failure. Any other failure is logged
    /// and the frame is dropped.
    pub async fn run(&mut self) -> ShutdownReason {
        info!("monitor started");
        loop {
            if let Some(reason) = self.drain_commands() {
                info!(?reason, stats = ?self.stats, "monitor stopped");
                return reason;
            }

            let frame = match self.source.read() {
                Ok(frame) => frame,
                Err(e) => {
                    error!(error = %e, "failed to capture frame");
                    let reason = ShutdownReason::AcquisitionFailed(e.to_string());
                    info!(?reason, stats = ?self.stats, "monitor stopped");
                    return reason;
                }
            };
            self.stats.frames_read += 1;

            let persons = if self.pipeline.state() == SystemState::Monitoring {
                self.detector.detect(&frame).unwrap_or_else(|e| {
                    warn!(error = %e, "person detector failed, treating frame as empty");
                    Vec::new()
                })
            } else {
                Vec::new()
            };

            let report = match self.pipeline.process_frame(frame.clone(), &persons) {
                Ok(report) => report,
                Err(e) => {
                    error!(error = %e, sequence = frame.sequence(), "frame dropped");
                    tokio::task::yield_now().await;
                    continue;
                }
            };
            match &report {
                Report::Monitoring(_) => self.stats.frames_analysed += 1,
                Report::BlockageDeclared { .. } => {
                    self.stats.frames_analysed += 1;
                    self.stats.blockages += 1;
                }
                Report::BaselineAdopted | Report::Settling | Report::Frozen => {}
            }

            let view = self.pipeline.render(&frame, &report);
            if let Err(e) = self.display.show(&view, self.pipeline.state(), &report.labels()) {
                warn!(error = %e, "display sink rejected frame");
            }

            tokio::task::yield_now().await;
        }
    }

    /// Applies every pending command. Returns a reason when the loop must stop.
    fn drain_commands(&mut self) -> Option<ShutdownReason> {
        loop {
            match self.commands.try_recv() {
                Ok(OperatorCommand::Quit) => return Some(ShutdownReason::OperatorQuit),
                Ok(OperatorCommand::Resume) => {
                    if !self.pipeline.resume() {
                        debug!(state = %self.pipeline.state(), "resume ignored");
                    }
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    if self.pipeline.state() == SystemState::Frozen {
                        return Some(ShutdownReason::ControlClosed);
                    }
                    return None;
                }
            }
        }
    }
}
