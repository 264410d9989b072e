use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::data::annotations::read_annotations;
use crate::data::config::{Fingerprint, PipelineConfig};
use crate::data::splitter::{split_rows, Bucket, SplitData, TestPartition};
use crate::error::{Error, Result};

pub const FINGERPRINT_FILE: &str = "trainingDataConfig.json";

/// Converts a tree of raw recordings (`input/location/video/annotations.txt`)
/// into serialized trajectory buckets under `output/location/video/...`.
///
/// A fingerprint document in the output root guards the run: when it matches
/// the requested configuration and is marked complete, nothing is written.
/// Otherwise the output tree is rebuilt from scratch and the completion flag
/// is the last thing persisted, so an interrupted run is regenerated in full
/// on the next invocation.
pub fn create_training_data(
    input_root: &Path,
    output_root: &Path,
    cfg: &PipelineConfig,
) -> Result<()> {
    let fingerprint = Fingerprint::new(cfg, input_root, output_root);
    let marker = output_root.join(FINGERPRINT_FILE);

    if marker.exists() {
        let content = fs::read_to_string(&marker).map_err(|e| Error::io(&marker, e))?;
        let prior: Fingerprint = serde_json::from_str(&content)?;
        if prior == fingerprint.completed() {
            info!("configuration unchanged and prior run complete, skipping data creation");
            return Ok(());
        }
    }

    if output_root.exists() {
        fs::remove_dir_all(output_root).map_err(|e| Error::io(output_root, e))?;
    }
    fs::create_dir_all(output_root).map_err(|e| Error::io(output_root, e))?;
    write_fingerprint(&marker, &fingerprint)?;

    let locations = subdirs(input_root)?;
    let total = locations.len();
    for (done, (location, location_path)) in locations.iter().enumerate() {
        info!(location = %location, progress = %format!("{}/{}", done + 1, total), "converting annotations");
        for (video, video_path) in subdirs(location_path)? {
            let rows = read_annotations(&video_path.join("annotations.txt"))?;
            let split = split_rows(&rows, cfg);
            write_split(output_root, location, &video, &split, cfg)?;
        }
    }

    write_fingerprint(&marker, &fingerprint.completed())
}

fn write_split(
    output_root: &Path,
    location: &str,
    video: &str,
    split: &SplitData,
    cfg: &PipelineConfig,
) -> Result<()> {
    let base = output_root.join(location).join(video);
    write_partition(&base.join("train"), location, video, &split.train, cfg)?;
    write_partition(&base.join("val"), location, video, &split.valid, cfg)?;
    match &split.test {
        TestPartition::Pooled(buckets) => {
            write_partition(&base.join("test"), location, video, buckets, cfg)?;
        }
        TestPartition::PerLabel(by_label) => {
            for (label, buckets) in by_label {
                write_partition(&base.join("test").join(label), location, video, buckets, cfg)?;
            }
        }
    }
    Ok(())
}

fn write_partition(
    dir: &Path,
    location: &str,
    video: &str,
    buckets: &[Bucket],
    cfg: &PipelineConfig,
) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    for (offset, bucket) in buckets.iter().enumerate() {
        let undefined = bucket
            .iter()
            .any(|r| r.frame.is_nan() || r.ped_id.is_nan() || r.x.is_nan() || r.y.is_nan());
        if undefined {
            warn!(dir = %dir.display(), offset, "bucket contains undefined values, skipping write");
            continue;
        }

        let name = format!("{}_{}_{}_{}.txt", cfg.file_prefix, location, video, offset);
        let path = dir.join(name);
        let mut table = String::new();
        for row in bucket {
            table.push_str(&format!(
                "{}\t{}\t{}\t{}\n",
                format_sci(row.frame),
                format_sci(row.ped_id),
                format_sci(row.x),
                format_sci(row.y)
            ));
        }
        fs::write(&path, table).map_err(|e| Error::io(&path, e))?;
    }
    Ok(())
}

/// `%.5e` with a signed, zero-padded two-digit exponent.
fn format_sci(value: f64) -> String {
    let formatted = format!("{:.5e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(rest) => ("-", rest),
                None => ("+", exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => formatted,
    }
}

fn write_fingerprint(path: &Path, fingerprint: &Fingerprint) -> Result<()> {
    let json = serde_json::to_string(fingerprint)?;
    // Temp-file plus rename keeps the completion mark atomic.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| Error::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| Error::io(path, e))?;
    Ok(())
}

fn subdirs(path: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path).map_err(|e| Error::io(path, e))? {
        let entry = entry.map_err(|e| Error::io(path, e))?;
        let child = entry.path();
        if child.is_dir() {
            entries.push((entry.file_name().to_string_lossy().into_owned(), child));
        }
    }
    entries.sort();
    Ok(entries)
}
