//! Extract motion vectors and frame types of a video into a directory.
//!
//! Every frame gets a `mvs_NNNNNN.csv` file with one motion vector per row. Frame types are
//! listed in `frame_types.txt`, and decoded frames can optionally be dumped as PPM images.

use clap::*;
use log::*;
use mvextract::prelude::v1::{Result, *};
use mvextract_av::AvVideoCap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const HEADER: [&str; 10] = [
    "source",
    "w",
    "h",
    "src_x",
    "src_y",
    "dst_x",
    "dst_y",
    "motion_x",
    "motion_y",
    "motion_scale",
];

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("motion-extract")
        .version(crate_version!())
        .about("Extracts motion vectors from the compressed video stream")
        .arg(Arg::new("input").takes_value(true).required(true))
        .arg(Arg::new("output").takes_value(true).required(false))
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .takes_value(true)
                .help("JSON file with capture configuration"),
        )
        .arg(
            Arg::new("no-decode-frames")
                .long("no-decode-frames")
                .short('n')
                .help("Skip pixel reconstruction"),
        )
        .arg(
            Arg::new("dump-frames")
                .long("dump-frames")
                .short('d')
                .help("Write decoded frames as PPM images"),
        )
        .arg(
            Arg::new("limit")
                .long("limit")
                .short('l')
                .takes_value(true)
                .help("Stop after this many frames"),
        )
        .get_matches();

    let input = matches
        .value_of("input")
        .ok_or_else(|| anyhow!("Please supply a video file!"))?;

    let output = matches
        .value_of("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("{input}_mvs")));

    let config = match matches.value_of("config") {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Unable to open {path}"))?;
            serde_json::from_reader(file).context("Invalid capture configuration")?
        }
        None => CaptureConfig::default(),
    };

    let decode_frames = matches.occurrences_of("no-decode-frames") == 0;
    let dump_frames = matches.occurrences_of("dump-frames") > 0;

    if dump_frames && !decode_frames {
        return Err(anyhow!("Can not dump frames without decoding them"));
    }

    let limit = matches
        .value_of("limit")
        .map(str::parse::<usize>)
        .transpose()?;

    let mut cap = AvVideoCap::with_config(config);

    if !cap.open(input) {
        return Err(anyhow!("Unable to open {input}"));
    }

    cap.set_decode_frames(decode_frames);

    if let Some(info) = cap.stream_info() {
        info!(
            "{input}: {}x{} {} ({:?} fps, {:?} frames)",
            info.width, info.height, info.codec, info.framerate, info.frame_count
        );
    }

    std::fs::create_dir_all(&output)?;

    let mut frame_types = BufWriter::new(File::create(output.join("frame_types.txt"))?);

    let mut cnt = 0usize;

    while limit.map(|l| cnt < l).unwrap_or(true) {
        let unit = cap.read();

        if !unit.success {
            break;
        }

        write_vectors(&output.join(format!("mvs_{cnt:06}.csv")), &unit.motion_vectors)?;

        match unit.timestamp {
            Some(ts) => writeln!(frame_types, "{cnt} {} {ts:.6}", unit.frame_type)?,
            None => writeln!(frame_types, "{cnt} {}", unit.frame_type)?,
        }

        if let (true, Some(frame)) = (dump_frames, &unit.frame) {
            write_ppm(&output.join(format!("frame_{cnt:06}.ppm")), frame)?;
        }

        debug!(
            "Frame {cnt}: {} with {} vectors",
            unit.frame_type,
            unit.motion_vectors.len()
        );

        cnt += 1;
    }

    frame_types.flush()?;
    cap.release();

    info!("Extracted {cnt} frames into {}", output.display());

    Ok(())
}

fn write_vectors(path: &Path, motion_vectors: &MotionVectorTable) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;

    writer.write_record(HEADER)?;

    for mv in motion_vectors {
        writer.serialize(mv)?;
    }

    writer.flush()?;

    Ok(())
}

/// Write a binary PPM, swapping the frame's BGR order to RGB.
fn write_ppm(path: &Path, frame: &PixelFrame) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);

    write!(out, "P6\n{} {}\n255\n", frame.width(), frame.height())?;

    for px in frame.as_slice().chunks_exact(3) {
        out.write_all(&[px[2], px[1], px[0]])?;
    }

    out.flush()?;

    Ok(())
}
