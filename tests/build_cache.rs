mod common;

use std::fs;
use std::time::{Duration, SystemTime};

use stig::dataset::{build_dataset, load, CacheStatus, LoadOptions, RebuildReason};
use stig::normalize::normalize_from_path;
use stig::{LabelCodec, StigError};

use common::{config, list_files, mtime, set_mtime, write_flat_frame, write_gradient_frame};

#[test]
fn builds_labeled_frames_in_path_order() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let config = config(temp.path(), 120, 160);
    let root = &config.recordings_root;
    let sources = [
        write_gradient_frame(root, "frame_100_accelerate_left.jpg", 640, 480, 0),
        write_gradient_frame(root, "frame_200_brake_.jpg", 640, 480, 40),
        write_gradient_frame(root, "frame_300__right.jpg", 640, 480, 80),
    ];

    let outcome = build_dataset(&config, &LabelCodec::standard()).expect("build");
    assert_eq!(outcome.status, CacheStatus::Rebuilt(RebuildReason::Missing));
    assert_eq!(outcome.artifact.len, 3);

    let dataset = load(&outcome.artifact, &LoadOptions::default()).expect("load");
    let labels: Vec<(u8, u8)> = dataset.iter().map(|i| (i.throttle, i.steering)).collect();
    assert_eq!(labels, vec![(1, 1), (2, 0), (0, 2)]);

    for (index, source) in sources.iter().enumerate() {
        let item = dataset.get(index).expect("item");
        assert_eq!(item.image.len(), 120 * 160);
        let expected = normalize_from_path(source, config.frame_size).expect("normalize");
        assert_eq!(item.image, expected.pixels(), "frame {index} differs");
    }
    assert_eq!(dataset.source(2), Some("frame_300__right.jpg"));
}

#[test]
fn unchanged_recordings_reuse_the_cache_without_decoding() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let config = config(temp.path(), 6, 8);
    let root = &config.recordings_root;
    write_flat_frame(root, "frame_1_accelerate_.png", 16, 12, 30);
    let second = write_flat_frame(root, "frame_2__left.png", 16, 12, 60);

    let first = build_dataset(&config, &LabelCodec::standard()).expect("first build");
    let images_before = fs::read(&first.artifact.images_path).expect("read images");
    let manifest_before = fs::read(&first.artifact.manifest_path).expect("read manifest");

    // Garbage content with the old mtime: decoding it would fail.
    let old_mtime = mtime(&second);
    fs::write(&second, b"not an image").expect("overwrite frame");
    set_mtime(&second, old_mtime);

    let again = build_dataset(&config, &LabelCodec::standard()).expect("second build");
    assert_eq!(again.status, CacheStatus::Fresh);
    assert_eq!(again.artifact, first.artifact);
    assert_eq!(
        fs::read(&again.artifact.images_path).expect("read images"),
        images_before
    );
    assert_eq!(
        fs::read(&again.artifact.manifest_path).expect("read manifest"),
        manifest_before
    );
}

#[test]
fn forced_rebuild_of_unchanged_input_is_bit_identical() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let mut config = config(temp.path(), 6, 8);
    write_gradient_frame(&config.recordings_root, "frame_1_brake_right.png", 33, 17, 9);
    write_gradient_frame(&config.recordings_root, "frame_2__.png", 33, 17, 99);

    let first = build_dataset(&config, &LabelCodec::standard()).expect("first build");
    let before = fs::read(&first.artifact.images_path).expect("read images");

    config.force = true;
    let second = build_dataset(&config, &LabelCodec::standard()).expect("forced build");
    assert_eq!(second.status, CacheStatus::Rebuilt(RebuildReason::Forced));
    assert_eq!(second.artifact.images_path, first.artifact.images_path);
    assert_eq!(
        fs::read(&second.artifact.images_path).expect("read images"),
        before
    );
}

#[test]
fn touching_a_frame_triggers_a_rebuild() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let config = config(temp.path(), 4, 4);
    write_flat_frame(&config.recordings_root, "frame_1__.png", 8, 8, 10);
    let touched = write_flat_frame(&config.recordings_root, "frame_2__.png", 8, 8, 20);

    build_dataset(&config, &LabelCodec::standard()).expect("first build");
    set_mtime(&touched, SystemTime::now() + Duration::from_secs(3600));

    let outcome = build_dataset(&config, &LabelCodec::standard()).expect("second build");
    assert_eq!(
        outcome.status,
        CacheStatus::Rebuilt(RebuildReason::SourceNewer)
    );
}

#[test]
fn deleted_frame_triggers_a_rebuild() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let config = config(temp.path(), 4, 4);
    write_flat_frame(&config.recordings_root, "frame_1__.png", 8, 8, 10);
    write_flat_frame(&config.recordings_root, "frame_2__.png", 8, 8, 20);
    let doomed = write_flat_frame(&config.recordings_root, "frame_3__.png", 8, 8, 30);

    build_dataset(&config, &LabelCodec::standard()).expect("first build");
    fs::remove_file(&doomed).expect("delete frame");

    let outcome = build_dataset(&config, &LabelCodec::standard()).expect("second build");
    assert_eq!(
        outcome.status,
        CacheStatus::Rebuilt(RebuildReason::FrameCountChanged { cached: 3, found: 2 })
    );
    assert_eq!(outcome.artifact.len, 2);
}

#[test]
fn renamed_frame_is_relabeled() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let config = config(temp.path(), 4, 4);
    let root = &config.recordings_root;
    write_flat_frame(root, "frame_1__.png", 8, 8, 10);
    let renamed = write_flat_frame(root, "frame_2_accelerate_left.png", 8, 8, 20);
    set_mtime(&renamed, SystemTime::now() - Duration::from_secs(3600));

    build_dataset(&config, &LabelCodec::standard()).expect("first build");
    // A rename keeps the mtime and the frame count.
    fs::rename(&renamed, root.join("frame_2_brake_right.png")).expect("rename frame");

    let outcome = build_dataset(&config, &LabelCodec::standard()).expect("second build");
    assert_eq!(
        outcome.status,
        CacheStatus::Rebuilt(RebuildReason::SourcesChanged)
    );

    let dataset = load(&outcome.artifact, &LoadOptions::default()).expect("load");
    let item = dataset.get(1).expect("item");
    assert_eq!((item.throttle, item.steering), (2, 2));
    assert_eq!(dataset.source(1), Some("frame_2_brake_right.png"));
}

#[test]
fn malformed_frame_name_aborts_without_writing() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let config = config(temp.path(), 4, 4);
    write_flat_frame(&config.recordings_root, "frame_1_accelerate_left.jpg", 8, 8, 10);
    let bad = write_flat_frame(&config.recordings_root, "frame_1_fastaccelerate_left.jpg", 8, 8, 10);

    let err = build_dataset(&config, &LabelCodec::standard()).unwrap_err();
    match &err {
        StigError::Naming { path, .. } => assert_eq!(path, &bad),
        other => panic!("expected Naming error, got {other:?}"),
    }
    assert!(err.to_string().contains("frame_1_fastaccelerate_left.jpg"));
    assert!(list_files(&config.datasets_root).is_empty());
}

#[test]
fn empty_recordings_root_reports_no_frames() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let config = config(temp.path(), 4, 4);
    fs::create_dir_all(&config.recordings_root).expect("create recordings");
    fs::write(config.recordings_root.join("notes.txt"), b"not a frame").expect("write");

    let err = build_dataset(&config, &LabelCodec::standard()).unwrap_err();
    assert!(matches!(err, StigError::NoFramesFound { .. }), "got {err:?}");
}

#[test]
fn missing_recordings_root_reports_path_not_found() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let config = config(temp.path(), 4, 4);

    let err = build_dataset(&config, &LabelCodec::standard()).unwrap_err();
    match err {
        StigError::PathNotFound { path } => assert_eq!(path, config.recordings_root),
        other => panic!("expected PathNotFound, got {other:?}"),
    }
}

#[test]
fn parallel_and_sequential_builds_are_identical() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let mut parallel = config(temp.path(), 12, 16);
    for i in 0..24u8 {
        let name = format!("session_{}/frame_{i}_accelerate_left.png", i % 3);
        write_gradient_frame(&parallel.recordings_root, &name, 45, 31, i.wrapping_mul(11));
    }

    let mut sequential = parallel.clone();
    sequential.datasets_root = temp.path().join("datasets-sequential");
    sequential.parallel = false;
    parallel.parallel = true;

    let a = build_dataset(&parallel, &LabelCodec::standard()).expect("parallel build");
    let b = build_dataset(&sequential, &LabelCodec::standard()).expect("sequential build");

    assert_eq!(
        fs::read(&a.artifact.images_path).expect("read parallel"),
        fs::read(&b.artifact.images_path).expect("read sequential")
    );
    assert_eq!(a.artifact.len, 24);
}

#[test]
fn nested_frames_are_ordered_by_relative_path() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let config = config(temp.path(), 2, 2);
    let root = &config.recordings_root;
    write_flat_frame(root, "b/frame_1__left.png", 4, 4, 10);
    write_flat_frame(root, "a/frame_9__right.png", 4, 4, 20);
    write_flat_frame(root, "frame_5_brake_.png", 4, 4, 30);

    let outcome = build_dataset(&config, &LabelCodec::standard()).expect("build");
    let dataset = load(&outcome.artifact, &LoadOptions::default()).expect("load");

    let sources: Vec<&str> = (0..dataset.len())
        .filter_map(|i| dataset.source(i))
        .collect();
    assert_eq!(
        sources,
        vec!["a/frame_9__right.png", "b/frame_1__left.png", "frame_5_brake_.png"]
    );
    assert_eq!(dataset.steerings(), &[2, 1, 0]);
    assert_eq!(dataset.throttles(), &[0, 0, 2]);
}
