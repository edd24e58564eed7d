mod common;

use std::path::Path;

use common::ScriptedTool;
use reel_core::config::{CompositionSettings, ReconcileSettings};
use reel_core::models::{NormalizedClip, TargetFormat, Track};
use reel_core::orchestrator::CancelHandle;
use reel_core::timeline::{concatenate, ConcatError, ReconcilePlan, Reconciler};
use tempfile::tempdir;

fn reconcile(dir: &Path, video: f64, audio: f64) -> (reel_core::timeline::ReconcileOutcome, Vec<String>) {
    let v = dir.join("timeline.mp4");
    let a = dir.join("voice.wav");
    let tool = ScriptedTool::new().video(&v, video).audio(&a, audio);
    let settings = ReconcileSettings::default();
    let encoder = CompositionSettings::default();
    let cancel = CancelHandle::new();

    let outcome = Reconciler::new(&tool, &settings, &encoder, dir, &cancel)
        .run(&Track::video(&v, video), &Track::audio(&a, audio));
    (outcome, tool.labels())
}

#[test]
fn short_narration_is_looped_to_video_length() {
    let dir = tempdir().unwrap();
    let (outcome, _) = reconcile(dir.path(), 10.0, 3.0);

    match outcome.plan {
        Some(ReconcilePlan::LoopAudio { repeats, .. }) => assert!(repeats >= 2),
        other => panic!("unexpected plan {:?}", other),
    }
    assert!((outcome.track.duration - 10.0).abs() < 1e-6);
    assert!(!outcome.is_degraded());
}

#[test]
fn slightly_longer_narration_slows_video() {
    let dir = tempdir().unwrap();
    let (outcome, labels) = reconcile(dir.path(), 10.0, 13.0);

    match outcome.plan {
        Some(ReconcilePlan::StretchVideo { ratio }) => assert!((ratio - 1.3).abs() < 1e-9),
        other => panic!("unexpected plan {:?}", other),
    }
    assert!((outcome.track.duration - 13.0).abs() < 1e-6);
    assert!(labels.iter().any(|l| l == "stretch_video"));
}

#[test]
fn close_lengths_mux_to_the_shorter() {
    let dir = tempdir().unwrap();
    let (outcome, labels) = reconcile(dir.path(), 10.0, 9.0);

    assert_eq!(outcome.plan, Some(ReconcilePlan::DirectMux));
    assert!((outcome.track.duration - 9.0).abs() < 1e-6);
    assert_eq!(labels, vec!["mux"]);
}

#[test]
fn much_longer_narration_loops_video() {
    let dir = tempdir().unwrap();
    let (outcome, _) = reconcile(dir.path(), 10.0, 25.0);

    assert_eq!(outcome.plan, Some(ReconcilePlan::LoopVideo { loops: 3 }));
    assert!((outcome.track.duration - 25.0).abs() < 1e-6);
}

fn normalized(dir: &Path, name: &str, duration: f64) -> NormalizedClip {
    NormalizedClip {
        source: dir.join(name),
        path: common::touch(&dir.join(name)),
        duration,
        target: TargetFormat::default(),
    }
}

#[test]
fn single_clip_concatenation_is_identity() {
    let dir = tempdir().unwrap();
    let clip = normalized(dir.path(), "only.mp4", 5.0);
    let tool = ScriptedTool::new().video(&clip.path, 5.0);

    let outcome = concatenate(&tool, &[clip.clone()], dir.path(), &CancelHandle::new()).unwrap();

    assert_eq!(outcome.track.path, clip.path);
    assert_eq!(outcome.track.duration, 5.0);
    assert!(outcome.is_complete());
    assert!(tool.labels().is_empty());
}

#[test]
fn concatenation_sums_clip_lengths() {
    let dir = tempdir().unwrap();
    let clips = vec![
        normalized(dir.path(), "a.mp4", 4.0),
        normalized(dir.path(), "b.mp4", 6.5),
        normalized(dir.path(), "c.mp4", 2.5),
    ];
    let tool = clips
        .iter()
        .fold(ScriptedTool::new(), |tool, c| tool.video(&c.path, c.duration));

    let outcome = concatenate(&tool, &clips, dir.path(), &CancelHandle::new()).unwrap();

    assert_eq!(outcome.clips_used, 3);
    assert!((outcome.track.duration - 13.0).abs() < 1e-6);
    assert!((outcome.expected_duration - 13.0).abs() < 1e-6);
}

#[test]
fn no_clips_cannot_be_concatenated() {
    let dir = tempdir().unwrap();
    let err = concatenate(&ScriptedTool::new(), &[], dir.path(), &CancelHandle::new()).unwrap_err();
    assert!(matches!(err, ConcatError::Empty));
}
