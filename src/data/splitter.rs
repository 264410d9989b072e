use std::collections::BTreeMap;

use crate::data::annotations::NormalizedRow;
use crate::data::config::PipelineConfig;

/// A row as it is stored on disk: windowed frame index, pedestrian id and
/// (possibly scaled) center coordinates. The category label is never stored;
/// for the held-out partition it only keys the surrounding bucket map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryRow {
    pub frame: f64,
    pub ped_id: f64,
    pub x: f64,
    pub y: f64,
}

/// Rows sharing the same `frame_counter % sampling_rate` offset. An empty
/// bucket is a valid state, not an error.
pub type Bucket = Vec<TrajectoryRow>;

/// The held-out partition is keyed by category label when a label filter is
/// active, otherwise pooled like the other partitions.
#[derive(Debug, Clone, PartialEq)]
pub enum TestPartition {
    Pooled(Vec<Bucket>),
    PerLabel(BTreeMap<String, Vec<Bucket>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitData {
    pub train: Vec<Bucket>,
    pub valid: Vec<Bucket>,
    pub test: TestPartition,
}

fn empty_buckets(rate: usize) -> Vec<Bucket> {
    (0..rate).map(|_| Vec::new()).collect()
}

/// Splits one recording's chronologically ordered rows into partitioned,
/// bucketed collections ready for serialization.
///
/// Partition boundaries are a contiguous prefix/infix/suffix of the file in
/// original order: rows with running counter in `[0, test_cutoff)` are held
/// out, `[test_cutoff, valid_cutoff)` validate, the rest train. The counter
/// advances for every row, including rows discarded by the label filter.
///
/// Training and validation coordinates are divided by the configured axis
/// scales before the border filter; held-out coordinates are not. The border
/// bounds are derived from the unscaled maxima in both cases, so the two
/// partitions filter in different coordinate systems. This asymmetry is
/// inherited from the source pipeline and preserved on purpose.
pub fn split_rows(rows: &[NormalizedRow], cfg: &PipelineConfig) -> SplitData {
    let rate = cfg.sampling_rate;
    let n = rows.len();
    let test_cutoff = (n as f64 * cfg.test_split).floor() as usize;
    let valid_cutoff = test_cutoff + (n as f64 * cfg.valid_split).floor() as usize;

    let mut train = empty_buckets(rate);
    let mut valid = empty_buckets(rate);
    let mut test = match &cfg.labels {
        Some(labels) => TestPartition::PerLabel(
            labels
                .iter()
                .map(|label| (label.clone(), empty_buckets(rate)))
                .collect(),
        ),
        None => TestPartition::Pooled(empty_buckets(rate)),
    };

    let mut max_x: f64 = 0.0;
    let mut max_y: f64 = 0.0;

    for (counter, row) in rows.iter().enumerate() {
        // Maxima are tracked over every row, discarded or not.
        if row.x > max_x {
            max_x = row.x;
        }
        if row.y > max_y {
            max_y = row.y;
        }

        if let Some(labels) = &cfg.labels {
            if !labels.iter().any(|l| l == &row.label) {
                continue;
            }
        }

        let stored = TrajectoryRow {
            frame: (row.frame / rate as f64).floor(),
            ped_id: row.ped_id,
            x: row.x,
            y: row.y,
        };
        let offset = counter % rate;

        if counter < test_cutoff {
            match &mut test {
                TestPartition::Pooled(buckets) => buckets[offset].push(stored),
                TestPartition::PerLabel(by_label) => {
                    if let Some(buckets) = by_label.get_mut(&row.label) {
                        buckets[offset].push(stored);
                    }
                }
            }
        } else if counter < valid_cutoff {
            valid[offset].push(scale(stored, cfg));
        } else {
            train[offset].push(scale(stored, cfg));
        }
    }

    let margin = cfg.fraction_to_remove;
    let scaled_keep = |row: &TrajectoryRow| {
        inside(row.x, max_x, cfg.annotation_x_scale * margin)
            && inside(row.y, max_y, cfg.annotation_y_scale * margin)
    };
    let unscaled_keep =
        |row: &TrajectoryRow| inside(row.x, max_x, margin) && inside(row.y, max_y, margin);

    for bucket in train.iter_mut().chain(valid.iter_mut()) {
        bucket.retain(scaled_keep);
    }
    match &mut test {
        TestPartition::Pooled(buckets) => {
            for bucket in buckets.iter_mut() {
                bucket.retain(unscaled_keep);
            }
        }
        TestPartition::PerLabel(by_label) => {
            for buckets in by_label.values_mut() {
                for bucket in buckets.iter_mut() {
                    bucket.retain(unscaled_keep);
                }
            }
        }
    }

    SplitData { train, valid, test }
}

fn scale(row: TrajectoryRow, cfg: &PipelineConfig) -> TrajectoryRow {
    TrajectoryRow {
        x: row.x / cfg.annotation_x_scale,
        y: row.y / cfg.annotation_y_scale,
        ..row
    }
}

fn inside(value: f64, max: f64, divisor: f64) -> bool {
    value >= max / divisor && value <= max - max / divisor
}
