use gangway_guard::core_modules::artifact::{ArtifactSink, JpegArtifactWriter};
use gangway_guard::core_modules::blockage::FreezeTrigger;
use gangway_guard::core_modules::reconciler::ContainmentTest;
use gangway_guard::pipeline::{
    ArtifactStatus, BoundingBox, Frame, LabelKind, PersonBox, Report, SystemState,
};
use gangway_guard::{BlockagePipeline, GuardConfig, Result};
use image::{Rgb, RgbImage};
use std::path::PathBuf;
use std::time::Duration;

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

/// Grey scene with optional white squares `(x, y, side)`.
fn scene(sequence: u64, millis: u64, squares: &[(u32, u32, u32)]) -> Frame {
    sized_scene(WIDTH, HEIGHT, sequence, millis, squares)
}

fn sized_scene(width: u32, height: u32, sequence: u64, millis: u64, squares: &[(u32, u32, u32)]) -> Frame {
    let mut image = RgbImage::from_pixel(width, height, Rgb([40, 40, 40]));
    for &(x, y, side) in squares {
        for py in y..y + side {
            for px in x..x + side {
                image.put_pixel(px, py, Rgb([230, 230, 230]));
            }
        }
    }
    Frame::new(image, Duration::from_millis(millis), sequence)
}

struct FailingArtifacts;

impl ArtifactSink for FailingArtifacts {
    fn persist(&mut self, _image: &RgbImage) -> Result<PathBuf> {
        Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume").into())
    }
}

fn pipeline_with(config: GuardConfig, dir: &tempfile::TempDir) -> BlockagePipeline {
    let writer = JpegArtifactWriter::new(dir.path().join("blockage.jpg"));
    BlockagePipeline::new(config, Box::new(writer))
}

/// Feeds frames until the pipeline freezes; returns the index of the freezing frame.
fn run_until_frozen(pipeline: &mut BlockagePipeline, frames: Vec<Frame>) -> Option<(usize, Report)> {
    for (i, frame) in frames.into_iter().enumerate() {
        let report = pipeline.process_frame(frame, &[]).unwrap();
        if matches!(report, Report::BlockageDeclared { .. }) {
            return Some((i, report));
        }
    }
    None
}

#[test]
fn first_frame_becomes_the_reference() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline_with(GuardConfig::default(), &dir);
    let first = scene(0, 0, &[(10, 10, 100)]);

    let report = pipeline.process_frame(first.clone(), &[]).unwrap();
    assert!(matches!(report, Report::BaselineAdopted));
    assert!(pipeline.current_reference().unwrap().is_same_capture(&first));
}

#[test]
fn stationary_box_freezes_after_five_seconds_and_writes_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline_with(GuardConfig::default(), &dir);

    // Baseline, then the same 100x100 box every 300ms.
    let mut frames = vec![scene(0, 0, &[])];
    frames.extend((1..=20).map(|i| scene(i, 300 * i, &[(50, 50, 100)])));

    let (index, report) = run_until_frozen(&mut pipeline, frames).expect("pipeline never froze");
    // First sighting at 0.3s; 5.1s have elapsed at frame 18, 4.8s at frame 17.
    assert_eq!(index, 18);
    match report {
        Report::BlockageDeclared { analysis, trigger, artifact } => {
            assert_eq!(trigger, FreezeTrigger::Persistence);
            assert_eq!(analysis.valid.len(), 1);
            assert_eq!(analysis.valid[0].bounds, BoundingBox::new(50, 50, 150, 150));
            assert_eq!(artifact, ArtifactStatus::Written(dir.path().join("blockage.jpg")));
        }
        other => panic!("unexpected report {other:?}"),
    }
    assert_eq!(pipeline.state(), SystemState::Frozen);
    assert!(dir.path().join("blockage.jpg").exists());

    let record = pipeline.record().unwrap();
    assert_eq!(record.snapshot.sequence(), 18);
    assert_eq!(record.candidates.len(), 1);
}

#[test]
fn frozen_pipeline_does_not_analyse_frames() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline_with(GuardConfig::default(), &dir);
    let mut frames = vec![scene(0, 0, &[])];
    frames.extend((1..=20).map(|i| scene(i, 300 * i, &[(50, 50, 100)])));
    run_until_frozen(&mut pipeline, frames).unwrap();

    let window_len = pipeline.occupancy_window().len();
    for i in 21..40 {
        let report = pipeline.process_frame(scene(i, 300 * i, &[(50, 50, 100)]), &[]).unwrap();
        assert!(matches!(report, Report::Frozen));
    }
    assert_eq!(pipeline.occupancy_window().len(), window_len);
    assert_eq!(pipeline.record().unwrap().snapshot.sequence(), 18);
    assert_eq!(pipeline.declarations(), 1);
}

#[test]
fn one_pixel_jitter_is_the_same_object() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline_with(GuardConfig::default(), &dir);

    let mut frames = vec![scene(0, 0, &[])];
    frames.extend((1..=20).map(|i| {
        let x = if i % 2 == 0 { 50 } else { 51 };
        scene(i, 300 * i, &[(x, 50, 100)])
    }));

    let (index, _) = run_until_frozen(&mut pipeline, frames).expect("jitter reset the timer");
    assert_eq!(index, 18);
}

#[test]
fn full_occupancy_window_freezes_without_a_stable_object() {
    let dir = tempfile::tempdir().unwrap();
    // Two frames per second: a 10 frame window.
    let config = GuardConfig { frame_rate: 2, ..GuardConfig::default() };
    let mut pipeline = pipeline_with(config, &dir);

    // A box hopping between two far-apart spots never keeps an identity.
    let mut frames = vec![scene(0, 0, &[])];
    frames.extend((1..=15).map(|i| {
        let x = if i % 2 == 0 { 10 } else { 200 };
        scene(i, 500 * i, &[(x, 60, 100)])
    }));

    let (index, report) = run_until_frozen(&mut pipeline, frames).expect("window never filled");
    assert_eq!(index, 10);
    match report {
        Report::BlockageDeclared { trigger, analysis, .. } => {
            assert_eq!(trigger, FreezeTrigger::OccupancyWindow);
            assert!(!analysis.signal.persisted_long_enough);
            assert!(analysis.signal.window_full);
        }
        other => panic!("unexpected report {other:?}"),
    }
}

#[test]
fn resume_clears_state_and_takes_a_fresh_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline_with(GuardConfig::default(), &dir);
    let mut frames = vec![scene(0, 0, &[])];
    frames.extend((1..=20).map(|i| scene(i, 300 * i, &[(50, 50, 100)])));
    run_until_frozen(&mut pipeline, frames).unwrap();
    let freeze_frame = pipeline.record().unwrap().snapshot.clone();

    assert!(pipeline.resume());
    assert_eq!(pipeline.state(), SystemState::Resetting);
    assert!(pipeline.tracked_entries().is_empty());
    assert!(pipeline.occupancy_window().is_empty());
    assert!(pipeline.record().is_none());

    // The box is still there, so it is part of the new baseline.
    let fresh = scene(30, 9_000, &[(50, 50, 100)]);
    assert!(matches!(pipeline.process_frame(fresh.clone(), &[]).unwrap(), Report::BaselineAdopted));
    assert_eq!(pipeline.state(), SystemState::Monitoring);
    let reference = pipeline.current_reference().unwrap();
    assert!(reference.is_same_capture(&fresh));
    assert!(!reference.is_same_capture(&freeze_frame));

    match pipeline.process_frame(scene(31, 9_300, &[(50, 50, 100)]), &[]).unwrap() {
        Report::Monitoring(analysis) => assert!(analysis.valid.is_empty()),
        other => panic!("unexpected report {other:?}"),
    }
    assert!(pipeline.tracked_entries().is_empty());
}

#[test]
fn quiet_scene_after_resume_refreshes_the_reference() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline_with(GuardConfig::default(), &dir);
    let mut frames = vec![scene(0, 0, &[])];
    frames.extend((1..=20).map(|i| scene(i, 300 * i, &[(50, 50, 100)])));
    run_until_frozen(&mut pipeline, frames).unwrap();

    pipeline.resume();
    pipeline.process_frame(scene(100, 10_000, &[]), &[]).unwrap();
    assert_eq!(pipeline.current_reference().unwrap().sequence(), 100);

    // Unchanged empty scene every 500ms. The timer starts at 10.5s.
    let mut reset_at = None;
    for i in 1..=12u64 {
        let report = pipeline.process_frame(scene(100 + i, 10_000 + 500 * i, &[]), &[]).unwrap();
        if let Report::Monitoring(analysis) = report {
            if analysis.reference_reset {
                reset_at = Some(100 + i);
                break;
            }
        }
    }
    assert_eq!(reset_at, Some(109));
    assert_eq!(pipeline.current_reference().unwrap().sequence(), 109);
    assert_eq!(pipeline.state(), SystemState::Monitoring);
}

#[test]
fn persons_suppress_candidates_and_block_the_freeze() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline_with(GuardConfig::default(), &dir);
    pipeline.process_frame(scene(0, 0, &[]), &[]).unwrap();

    let person = PersonBox::new(BoundingBox::new(40, 30, 170, 230), 0.92);
    for i in 1..=30 {
        match pipeline.process_frame(scene(i, 300 * i, &[(50, 50, 100)]), &[person]).unwrap() {
            report @ Report::Monitoring(_) => {
                let kinds: Vec<_> = report.labels().iter().map(|label| label.kind).collect();
                assert_eq!(kinds, vec![LabelKind::Person, LabelKind::PersonBlockage]);
                assert_eq!(kinds[1].text(), "Person_Blockage");
                if let Report::Monitoring(analysis) = report {
                    assert!(analysis.valid.is_empty());
                    assert_eq!(analysis.suppressed.len(), 1);
                    assert_eq!(analysis.persons, vec![person]);
                }
            }
            other => panic!("a person must not freeze the pipeline: {other:?}"),
        }
    }
    assert_eq!(pipeline.state(), SystemState::Monitoring);
}

#[test]
fn weak_person_detections_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline_with(GuardConfig::default(), &dir);
    pipeline.process_frame(scene(0, 0, &[]), &[]).unwrap();

    let unsure = PersonBox::new(BoundingBox::new(40, 30, 170, 230), 0.4);
    match pipeline.process_frame(scene(1, 300, &[(50, 50, 100)]), &[unsure]).unwrap() {
        Report::Monitoring(analysis) => {
            assert_eq!(analysis.valid.len(), 1);
            assert!(analysis.persons.is_empty());
        }
        other => panic!("unexpected report {other:?}"),
    }
}

#[test]
fn legacy_containment_can_be_selected() {
    let dir = tempfile::tempdir().unwrap();
    let config = GuardConfig { containment: ContainmentTest::Legacy, ..GuardConfig::default() };
    let mut pipeline = pipeline_with(config, &dir);
    pipeline.process_frame(scene(0, 0, &[]), &[]).unwrap();

    // Person in the top-left corner, nowhere near the box.
    let far_person = PersonBox::new(BoundingBox::new(0, 0, 20, 20), 0.95);
    match pipeline.process_frame(scene(1, 300, &[(150, 100, 100)]), &[far_person]).unwrap() {
        Report::Monitoring(analysis) => assert_eq!(analysis.suppressed.len(), 1),
        other => panic!("unexpected report {other:?}"),
    }
}

#[test]
fn artifact_failure_still_freezes() {
    let mut pipeline = BlockagePipeline::new(GuardConfig::default(), Box::new(FailingArtifacts));
    let mut frames = vec![scene(0, 0, &[])];
    frames.extend((1..=20).map(|i| scene(i, 300 * i, &[(50, 50, 100)])));

    let (_, report) = run_until_frozen(&mut pipeline, frames).unwrap();
    match report {
        Report::BlockageDeclared { artifact: ArtifactStatus::Failed(reason), .. } => {
            assert!(reason.contains("read-only volume"));
        }
        other => panic!("unexpected report {other:?}"),
    }
    assert_eq!(pipeline.state(), SystemState::Frozen);
    assert!(pipeline.record().is_some());
}

#[test]
fn frozen_view_carries_marker_and_thumbnail() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline_with(GuardConfig { thumbnail_size: 40, ..GuardConfig::default() }, &dir);
    let mut frames = vec![scene(0, 0, &[])];
    frames.extend((1..=20).map(|i| scene(i, 300 * i, &[(50, 50, 100)])));
    run_until_frozen(&mut pipeline, frames).unwrap();

    let live = scene(50, 20_000, &[]);
    let report = pipeline.process_frame(live.clone(), &[]).unwrap();
    let view = pipeline.render(&live, &report);
    // Banner across the top, outside the thumbnail.
    assert_eq!(*view.get_pixel(WIDTH - 1, 0), Rgb([255, 0, 0]));
    // Below the banner and thumbnail the live frame is untouched.
    assert_eq!(*view.get_pixel(WIDTH - 1, HEIGHT - 1), Rgb([40, 40, 40]));
}

#[test]
fn quiet_scene_refresh_forgets_tracked_objects() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline_with(GuardConfig::default(), &dir);
    pipeline.process_frame(scene(0, 0, &[]), &[]).unwrap();
    for i in 1..=6 {
        pipeline.process_frame(scene(i, 300 * i, &[(50, 50, 100)]), &[]).unwrap();
    }
    assert_eq!(pipeline.tracked_entries().len(), 1);
    assert_eq!(pipeline.occupancy_window().occupied_count(), 6);

    // The box leaves at 2.3s; the scene stays empty until the refresh at 6.3s.
    let mut refreshed = false;
    for i in 0..12u64 {
        let report = pipeline.process_frame(scene(7 + i, 2_300 + 500 * i, &[]), &[]).unwrap();
        if let Report::Monitoring(analysis) = report {
            if analysis.reference_reset {
                assert_eq!(i, 8);
                refreshed = true;
                break;
            }
        }
    }
    assert!(refreshed);
    assert!(pipeline.tracked_entries().is_empty());
    // Only the refresh frame itself has been recorded since.
    assert_eq!(pipeline.occupancy_window().len(), 1);
    assert_eq!(pipeline.occupancy_window().occupied_count(), 0);
}

#[test]
fn second_blockage_replaces_record_and_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("blockage.jpg");
    let mut pipeline = pipeline_with(GuardConfig::default(), &dir);
    let mut frames = vec![scene(0, 0, &[])];
    frames.extend((1..=20).map(|i| scene(i, 300 * i, &[(50, 50, 100)])));
    run_until_frozen(&mut pipeline, frames).unwrap();
    assert_eq!(image::open(&artifact).unwrap().width(), WIDTH);

    // The camera comes back at a different resolution after the resume.
    pipeline.resume();
    pipeline.process_frame(sized_scene(400, 300, 100, 10_000, &[]), &[]).unwrap();
    let frames = (1..=20)
        .map(|i| sized_scene(400, 300, 100 + i, 10_000 + 300 * i, &[(200, 150, 100)]))
        .collect();
    let (index, _) = run_until_frozen(&mut pipeline, frames).expect("no second blockage");
    assert_eq!(index, 17);

    let record = pipeline.record().unwrap();
    assert_eq!(record.snapshot.sequence(), 118);
    assert_eq!(record.candidates[0].bounds, BoundingBox::new(200, 150, 300, 250));
    assert_eq!(pipeline.declarations(), 2);
    let saved = image::open(&artifact).unwrap();
    assert_eq!((saved.width(), saved.height()), (400, 300));
}

#[test]
fn frames_inside_the_settle_delay_are_not_adopted() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline_with(GuardConfig::default(), &dir);
    let mut frames = vec![scene(0, 0, &[])];
    frames.extend((1..=20).map(|i| scene(i, 300 * i, &[(50, 50, 100)])));
    run_until_frozen(&mut pipeline, frames).unwrap();

    // Frozen at 5.4s; the default settle delay runs until 7.4s.
    pipeline.resume();
    let early = scene(40, 6_000, &[(50, 50, 100)]);
    assert!(matches!(pipeline.process_frame(early.clone(), &[]).unwrap(), Report::Settling));
    assert_eq!(pipeline.state(), SystemState::Resetting);
    assert!(!pipeline.current_reference().unwrap().is_same_capture(&early));

    let settled = scene(41, 7_400, &[]);
    assert!(matches!(pipeline.process_frame(settled.clone(), &[]).unwrap(), Report::BaselineAdopted));
    assert!(pipeline.current_reference().unwrap().is_same_capture(&settled));
    assert_eq!(pipeline.state(), SystemState::Monitoring);
}

#[test]
fn resolution_change_replaces_the_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline_with(GuardConfig::default(), &dir);
    pipeline.process_frame(scene(0, 0, &[]), &[]).unwrap();
    pipeline.process_frame(scene(1, 300, &[(50, 50, 100)]), &[]).unwrap();
    assert_eq!(pipeline.tracked_entries().len(), 1);

    let smaller = sized_scene(160, 120, 2, 600, &[]);
    assert!(matches!(pipeline.process_frame(smaller.clone(), &[]).unwrap(), Report::BaselineAdopted));
    assert!(pipeline.current_reference().unwrap().is_same_capture(&smaller));
    assert!(pipeline.tracked_entries().is_empty());
    assert!(matches!(pipeline.process_frame(sized_scene(160, 120, 3, 900, &[]), &[]).unwrap(), Report::Monitoring(_)));
}
