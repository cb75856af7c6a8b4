use anyhow::Context;
use clap::Parser;
use gangway_guard::core_modules::artifact::JpegArtifactWriter;
use gangway_guard::monitor::{DisplaySink, FrameSource, NoPersonDetector};
use gangway_guard::pipeline::{BoxLabel, Frame, LabelKind, SystemState};
use gangway_guard::{
    BlockagePipeline, ControlHandle, GuardConfig, GuardError, Monitor, ShutdownReason,
    control_channel,
};
use image::RgbImage;
use opencv::{
    core::{self, Mat, Point, Scalar},
    highgui, imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const WINDOW_NAME: &str = "Gangway Monitor";
const KEY_ENTER: i32 = 13;
const KEY_LINE_FEED: i32 = 10;

/// Watches a gangway camera (or a recording) and freezes on a blockage.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Camera index to open when no input file is given.
    #[arg(long, default_value_t = 0)]
    camera: i32,
    /// Video file to replay instead of a live camera.
    #[arg(long)]
    input: Option<PathBuf>,
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Where to write the blockage snapshot.
    #[arg(long)]
    artifact: Option<PathBuf>,
    /// Nominal frame rate, used to size the occupancy window.
    #[arg(long)]
    fps: Option<u32>,
}

/// Frames from an OpenCV capture device, converted to RGB.
struct CameraSource {
    capture: VideoCapture,
    started: Instant,
    /// Recordings are timestamped from the frame index, cameras from the wall clock.
    replay_rate: Option<u32>,
    sequence: u64,
}

impl CameraSource {
    fn open_camera(index: i32) -> anyhow::Result<Self> {
        let capture = VideoCapture::new(index, videoio::CAP_ANY)?;
        Self::from_capture(capture, None).with_context(|| format!("could not open camera {index}"))
    }

    fn open_file(path: &Path, frame_rate: u32) -> anyhow::Result<Self> {
        let name = path.to_string_lossy();
        let capture = VideoCapture::from_file(&name, videoio::CAP_ANY)?;
        Self::from_capture(capture, Some(frame_rate)).with_context(|| format!("could not open {name}"))
    }

    fn from_capture(capture: VideoCapture, replay_rate: Option<u32>) -> anyhow::Result<Self> {
        if !capture.is_opened()? {
            anyhow::bail!("capture device is not open");
        }
        Ok(Self {
            capture,
            started: Instant::now(),
            replay_rate,
            sequence: 0,
        })
    }

    fn timestamp(&self) -> Duration {
        match self.replay_rate {
            Some(rate) => Duration::from_secs_f64(self.sequence as f64 / f64::from(rate)),
            None => self.started.elapsed(),
        }
    }

    fn grab(&mut self) -> opencv::Result<Option<RgbImage>> {
        let mut bgr = Mat::default();
        if !self.capture.read(&mut bgr)? || bgr.empty() {
            return Ok(None);
        }
        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
        let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
        Ok(RgbImage::from_raw(width, height, rgb.data_bytes()?.to_vec()))
    }
}

impl FrameSource for CameraSource {
    fn read(&mut self) -> gangway_guard::Result<Frame> {
        let image = self
            .grab()
            .map_err(|e| GuardError::Acquisition(e.to_string()))?
            .ok_or_else(|| GuardError::Acquisition("no frame from capture device".to_string()))?;
        let frame = Frame::new(image, self.timestamp(), self.sequence);
        self.sequence += 1;
        Ok(frame)
    }
}

/// Text colour for a box label, in BGR to match the drawn outline.
fn label_color(kind: LabelKind) -> Scalar {
    match kind {
        LabelKind::Blockage => Scalar::new(0.0, 0.0, 255.0, 0.0),
        LabelKind::Person => Scalar::new(0.0, 255.0, 0.0, 0.0),
        LabelKind::PersonBlockage => Scalar::new(0.0, 160.0, 255.0, 0.0),
    }
}

/// HighGUI window that also turns key presses into operator commands.
/// The window is destroyed when the display is dropped.
struct HighGuiDisplay {
    control: ControlHandle,
}

impl HighGuiDisplay {
    fn new(control: ControlHandle) -> anyhow::Result<Self> {
        highgui::named_window(WINDOW_NAME, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self { control })
    }

    fn to_mat(view: &RgbImage) -> opencv::Result<Mat> {
        let mut rgb = Mat::new_rows_cols_with_default(
            view.height() as i32,
            view.width() as i32,
            core::CV_8UC3,
            Scalar::all(0.0),
        )?;
        rgb.data_bytes_mut()?.copy_from_slice(view.as_raw());
        let mut bgr = Mat::default();
        imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
        Ok(bgr)
    }

    fn present(&mut self, view: &RgbImage, state: SystemState, labels: &[BoxLabel]) -> opencv::Result<()> {
        let mut output = Self::to_mat(view)?;
        for label in labels {
            let origin = Point::new(label.bounds.x1 as i32, label.bounds.y1.saturating_sub(10) as i32);
            imgproc::put_text(
                &mut output,
                label.kind.text(),
                origin,
                imgproc::FONT_HERSHEY_SIMPLEX,
                0.9,
                label_color(label.kind),
                2,
                imgproc::LINE_8,
                false,
            )?;
        }
        if state == SystemState::Frozen {
            imgproc::put_text(
                &mut output,
                "Blockage detected",
                Point::new(50, 50),
                imgproc::FONT_HERSHEY_SIMPLEX,
                1.0,
                Scalar::new(0.0, 0.0, 255.0, 0.0), // Red (BGR)
                2,
                imgproc::LINE_8,
                false,
            )?;
        }
        highgui::imshow(WINDOW_NAME, &output)?;

        let key = highgui::wait_key(1)?;
        let resume = key == KEY_ENTER || key == KEY_LINE_FEED || key == i32::from(b'r');
        if resume && state == SystemState::Frozen {
            info!("operator acknowledged blockage");
            self.control.resume();
        } else if key == i32::from(b'q') {
            self.control.quit();
        }
        Ok(())
    }
}

impl DisplaySink for HighGuiDisplay {
    fn show(&mut self, view: &RgbImage, state: SystemState, labels: &[BoxLabel]) -> gangway_guard::Result<()> {
        self.present(view, state, labels)
            .map_err(|e| GuardError::Display(e.to_string()))
    }
}

impl Drop for HighGuiDisplay {
    fn drop(&mut self) {
        match highgui::destroy_all_windows() {
            Ok(()) => debug!("display windows closed"),
            Err(e) => warn!(error = %e, "could not close display windows"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Argument Parsing & Setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GuardConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => GuardConfig::default(),
    };
    if let Some(path) = args.artifact {
        config.artifact_path = path;
    }
    if let Some(fps) = args.fps {
        config.frame_rate = fps;
    }
    config.validate()?;
    info!(
        frame_rate = config.frame_rate,
        window = config.window_capacity(),
        artifact = %config.artifact_path.display(),
        "configuration loaded"
    );

    // --- 2. Video I/O Initialization ---
    let source = match &args.input {
        Some(path) => CameraSource::open_file(path, config.frame_rate)?,
        None => CameraSource::open_camera(args.camera)?,
    };

    // --- 3. Operator Controls ---
    let (control, commands) = control_channel();
    let display = HighGuiDisplay::new(control.clone())?;
    let interrupt = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            interrupt.quit();
        }
    });

    // --- 4. Main Processing Loop ---
    let artifacts = JpegArtifactWriter::new(config.artifact_path.clone());
    let pipeline = BlockagePipeline::new(config, Box::new(artifacts));
    let mut monitor = Monitor::new(pipeline, source, NoPersonDetector, display, commands);
    let reason = monitor.run().await;

    // --- 5. Teardown ---
    let stats = monitor.stats();
    info!(declarations = monitor.pipeline().declarations(), state = %monitor.pipeline().state(), "final pipeline state");
    drop(monitor);
    match reason {
        ShutdownReason::OperatorQuit => info!(?stats, "stopped by operator"),
        ShutdownReason::AcquisitionFailed(cause) => warn!(%cause, ?stats, "video source ended"),
        ShutdownReason::ControlClosed => warn!(?stats, "operator controls closed while frozen"),
    }
    drop(control);
    Ok(())
}
