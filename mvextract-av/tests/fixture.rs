//! Tests against a real H.264 recording.
//!
//! The video is looked up in `MVEXTRACT_FIXTURE`, falling back to `vid_h264.mp4` at the workspace
//! root. Every test is skipped when it is missing.

use mvextract::prelude::v1::*;
use mvextract_av::AvVideoCap;
use std::path::PathBuf;

fn fixture() -> Option<String> {
    let path = std::env::var_os("MVEXTRACT_FIXTURE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../vid_h264.mp4"));

    if path.is_file() {
        Some(path.to_string_lossy().into_owned())
    } else {
        eprintln!("Fixture {} not found, skipping", path.display());
        None
    }
}

fn open_fixture() -> Option<AvVideoCap> {
    let path = fixture()?;
    let mut cap = AvVideoCap::new();
    assert!(cap.open(&path));
    Some(cap)
}

#[test]
fn open_and_release() {
    let mut cap = match open_fixture() {
        Some(cap) => cap,
        None => return,
    };

    assert!(cap.is_opened());

    let info = cap.stream_info().unwrap();
    assert_eq!((info.width, info.height), (1280, 720));
    assert_eq!(info.codec, "h264");

    cap.release();
    assert!(!cap.is_opened());
    cap.release();
}

#[test]
fn open_invalid() {
    let mut cap = AvVideoCap::new();
    assert!(!cap.open("vid_not_existent.mp4"));
    assert!(!cap.is_opened());
    assert!(!cap.read().success);
}

#[test]
fn read_not_opened() {
    let mut cap = AvVideoCap::new();
    let (ret, frame, motion_vectors, frame_type) = cap.read().into_parts();
    assert!(!ret);
    assert!(frame.is_none());
    assert_eq!(motion_vectors.shape(), (0, 10));
    assert_eq!(frame_type, FrameType::Unknown);
}

#[test]
fn first_frame_is_intra() {
    let mut cap = match open_fixture() {
        Some(cap) => cap,
        None => return,
    };

    let (ret, frame, motion_vectors, frame_type) = cap.read().into_parts();
    assert!(ret);
    assert_eq!(frame.unwrap().shape(), (720, 1280, 3));
    assert_eq!(motion_vectors.shape(), (0, 10));
    assert_eq!(frame_type, FrameType::Intra);
    assert_eq!(cap.frame_type(), FrameType::Intra);
}

#[test]
fn second_frame_has_motion() {
    let mut cap = match open_fixture() {
        Some(cap) => cap,
        None => return,
    };

    assert!(cap.read().success);

    let unit = cap.read();
    assert!(unit.success);
    assert_eq!(unit.frame_type, FrameType::Predicted);
    assert_eq!(unit.motion_vectors.shape(), (3665, 10));

    // First row of macroblocks is static.
    for i in 0..10 {
        let x = 8 + 16 * i;
        assert_eq!(
            unit.motion_vectors.row(i as usize),
            Some([-1, 16, 16, x, 8, x, 8, 0, 0, 4])
        );
    }

    assert!(unit.timestamp.unwrap() > 0.0);
}

#[test]
fn first_ten_frames() {
    let mut cap = match open_fixture() {
        Some(cap) => cap,
        None => return,
    };

    let rows = [0, 3665, 3696, 3722, 3807, 3953, 4155, 3617, 4115, 4192];

    for (i, rows) in rows.into_iter().enumerate() {
        let unit = cap.read();
        assert!(unit.success);
        assert_eq!(unit.frame.unwrap().shape(), (720, 1280, 3));
        assert_eq!(unit.motion_vectors.shape(), (rows, 10));

        let expected = if i == 0 {
            FrameType::Intra
        } else {
            FrameType::Predicted
        };
        assert_eq!(unit.frame_type, expected);
    }
}

#[test]
fn reads_every_frame() {
    let mut cap = match open_fixture() {
        Some(cap) => cap,
        None => return,
    };

    let mut count = 0u64;
    while cap.grab() {
        count += 1;
    }

    assert_eq!(count, 337);

    // Stream stays ended.
    assert!(!cap.read().success);
}

#[test]
fn skipping_frames_keeps_motion() {
    let path = match fixture() {
        Some(path) => path,
        None => return,
    };

    let mut full = AvVideoCap::new();
    let mut fast = AvVideoCap::new();

    assert!(full.open(&path));
    assert!(fast.open(&path));
    fast.set_decode_frames(false);
    assert!(!fast.decode_frames());

    for _ in 0..30 {
        let a = full.read();
        let b = fast.read();

        assert!(a.success && b.success);
        assert!(a.frame.is_some());
        assert!(b.frame.is_none());
        assert_eq!(a.frame_type, b.frame_type);
        assert_eq!(a.motion_vectors, b.motion_vectors);
    }
}

#[test]
fn toggle_keeps_pixels_exact() {
    let path = match fixture() {
        Some(path) => path,
        None => return,
    };

    let mut full = AvVideoCap::new();
    let mut toggled = AvVideoCap::new();

    assert!(full.open(&path));
    assert!(toggled.open(&path));

    for i in 0..60 {
        toggled.set_decode_frames(!(2..=5).contains(&i));

        let a = full.read();
        let b = toggled.read();

        assert!(a.success && b.success);
        assert_eq!(a.frame_type, b.frame_type);
        assert_eq!(a.motion_vectors, b.motion_vectors);

        if i >= 6 {
            if a.frame_type == FrameType::Intra {
                break;
            }

            let (a, b) = (a.frame.unwrap(), b.frame.unwrap());
            assert!(a.as_slice() == b.as_slice(), "frame {i} differs");
        }
    }
}

#[test]
#[ignore]
fn skipping_frames_is_faster() {
    let path = match fixture() {
        Some(path) => path,
        None => return,
    };

    let time = |decode_frames| {
        let mut cap = AvVideoCap::new();
        assert!(cap.open(&path));
        cap.set_decode_frames(decode_frames);
        let start = std::time::Instant::now();
        while cap.grab() {
            let _ = cap.retrieve();
        }
        start.elapsed()
    };

    let full = time(true);
    let fast = time(false);

    eprintln!("full: {full:?}, motion only: {fast:?}");
    assert!(fast < full);
}
