mod common;

use common::{ScriptedDetector, TextFrameSource, text_video};
use roadscan::classify::MediaClassifier;
use roadscan::config::Config;
use roadscan::error::ErrorKind;
use roadscan::sampler::{FramePlan, FrameSampler};
use std::sync::Arc;

#[test]
fn ninety_five_frames_stride_nine() {
    let plan = FramePlan::new(95, 10);
    assert_eq!(plan.stride, 9);
    let candidates: Vec<u64> = plan.candidates().collect();
    assert_eq!(candidates.first(), Some(&0));
    assert_eq!(candidates.last(), Some(&90));
    assert_eq!(candidates.len(), 11);
    assert_eq!(plan.sampled(), (0..10).map(|i| i * 9).collect::<Vec<_>>());
}

#[test]
fn short_video_samples_every_frame() {
    let plan = FramePlan::new(5, 10);
    assert_eq!(plan.stride, 1);
    assert_eq!(plan.sampled(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn exact_multiple_gives_full_sample() {
    let plan = FramePlan::new(100, 10);
    assert_eq!(plan.stride, 10);
    assert_eq!(plan.sampled().len(), 10);
    assert_eq!(plan.sampled().last(), Some(&90));
}

#[test]
fn empty_video_has_no_candidates() {
    let plan = FramePlan::new(0, 10);
    assert_eq!(plan.stride, 1);
    assert!(plan.sampled().is_empty());
}

fn classifier() -> MediaClassifier {
    MediaClassifier::new(
        Arc::new(ScriptedDetector::new()),
        Config::default().detector.class_names,
    )
}

#[test]
fn sampling_yields_tagged_results_and_removes_video() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("clip.mp4");
    let lines: Vec<String> = (0..95).map(|i| format!("0:0.{:02}", i % 100)).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    std::fs::write(&video, text_video(&refs)).unwrap();

    let source = TextFrameSource::new();
    let classifier = classifier();
    let sampler = FrameSampler::new(&source, &classifier, 10);
    let results: Vec<_> = sampler.sample("vid", &video).unwrap().collect();

    assert_eq!(results.len(), 10);
    let indices: Vec<u64> = results.iter().filter_map(|r| r.frame_index).collect();
    assert_eq!(indices, (0..10).map(|i| i * 9).collect::<Vec<_>>());
    assert!(results.iter().all(|r| r.source_media_id == "vid"));

    let mut paths: Vec<_> = results.iter().map(|r| r.scratch_path.clone()).collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 10);

    assert!(!video.exists());
}

#[test]
fn dropping_early_still_removes_video() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("clip.mp4");
    std::fs::write(&video, text_video(&["0:0.5"; 20])).unwrap();

    let source = TextFrameSource::new();
    let classifier = classifier();
    let sampler = FrameSampler::new(&source, &classifier, 10);
    let mut samples = sampler.sample("vid", &video).unwrap();
    assert_eq!(samples.info().total_frames, 20);
    assert!(samples.next().is_some());
    drop(samples);

    assert!(!video.exists());
    assert_eq!(source.extracted(), 1);
}

#[test]
fn unreadable_video_does_no_work() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("clip.mp4");
    std::fs::write(&video, b"corrupt header").unwrap();

    let source = TextFrameSource::new();
    let classifier = classifier();
    let sampler = FrameSampler::new(&source, &classifier, 10);
    let err = sampler.sample("vid", &video).err().expect("probe fails");

    assert_eq!(err.kind(), ErrorKind::MediaUnreadable);
    assert_eq!(source.extracted(), 0);
    assert!(video.exists());
}

#[test]
fn stream_ending_early_stops_sampling() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("clip.mp4");
    std::fs::write(&video, text_video(&["0:0.1", "1:0.2", "EOF", "2:0.3"])).unwrap();

    let source = TextFrameSource::new();
    let classifier = classifier();
    let sampler = FrameSampler::new(&source, &classifier, 10);
    let results: Vec<_> = sampler.sample("vid", &video).unwrap().collect();

    assert_eq!(results.len(), 2);
    assert!(!video.exists());
}

#[test]
fn extraction_error_ends_the_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("clip.mp4");
    std::fs::write(&video, text_video(&["0:0.1", "ERR", "2:0.3"])).unwrap();

    let source = TextFrameSource::new();
    let classifier = classifier();
    let sampler = FrameSampler::new(&source, &classifier, 10);
    let results: Vec<_> = sampler.sample("vid", &video).unwrap().collect();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].label.as_deref(), Some("D00_Longitudinal_Crack"));
    assert!(!video.exists());
}
