use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use burn::tensor::{backend::Backend, Data, Shape, Tensor};

use crate::data::splitter::TrajectoryRow;
use crate::error::{Error, Result};

/// A fixed-length slice of a recording: the pedestrians present in every one
/// of its consecutive windowed frames, with their positions per step.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub ped_ids: Vec<i64>,
    /// `positions[time][node] = [x, y]`, nodes ordered as `ped_ids`.
    pub positions: Vec<Vec<[f64; 2]>>,
}

/// Reads one serialized bucket table back into rows.
pub fn read_bucket(path: &Path) -> Result<Vec<TrajectoryRow>> {
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let fields: Vec<f64> = line
                .split_whitespace()
                .map(|f| f.parse::<f64>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| Error::MalformedRow(line.to_string()))?;
            if fields.len() != 4 {
                return Err(Error::MalformedRow(line.to_string()));
            }
            Ok(TrajectoryRow {
                frame: fields[0],
                ped_id: fields[1],
                x: fields[2],
                y: fields[3],
            })
        })
        .collect()
}

/// Slices a bucket into model windows.
///
/// A window covers `window_len` consecutive windowed-frame indices and keeps
/// only the pedestrians observed in every frame of the span; spans with a
/// frame gap or an empty pedestrian intersection produce no window.
pub fn build_windows(rows: &[TrajectoryRow], window_len: usize) -> Vec<Window> {
    assert!(window_len > 0, "window length must be positive");

    let mut by_frame: BTreeMap<i64, BTreeMap<i64, [f64; 2]>> = BTreeMap::new();
    for row in rows {
        by_frame
            .entry(row.frame as i64)
            .or_default()
            .insert(row.ped_id as i64, [row.x, row.y]);
    }

    let frames: Vec<i64> = by_frame.keys().copied().collect();
    let mut windows = Vec::new();
    if frames.len() < window_len {
        return windows;
    }

    for start in 0..=frames.len() - window_len {
        let span = &frames[start..start + window_len];
        if span[window_len - 1] - span[0] != window_len as i64 - 1 {
            continue;
        }

        let mut peds: BTreeSet<i64> = by_frame[&span[0]].keys().copied().collect();
        for frame in &span[1..] {
            let present: BTreeSet<i64> = by_frame[frame].keys().copied().collect();
            peds = peds.intersection(&present).copied().collect();
        }
        if peds.is_empty() {
            continue;
        }

        let ped_ids: Vec<i64> = peds.into_iter().collect();
        let positions = span
            .iter()
            .map(|frame| ped_ids.iter().map(|ped| by_frame[frame][ped]).collect())
            .collect();
        windows.push(Window { ped_ids, positions });
    }

    windows
}

impl Window {
    pub fn seq_len(&self) -> usize {
        self.positions.len()
    }

    pub fn node_count(&self) -> usize {
        self.ped_ids.len()
    }

    /// Feature tensor in `[1, 2, time, node]` layout.
    pub fn feature_tensor<B: Backend>(&self) -> Tensor<B, 4> {
        let t = self.seq_len();
        let v = self.node_count();
        let mut values = Vec::with_capacity(2 * t * v);
        for channel in 0..2 {
            for step in &self.positions {
                for position in step {
                    values.push(position[channel] as f32);
                }
            }
        }
        let data = Data::new(values, Shape::new([1, 2, t, v]));
        Tensor::from_data(data.convert())
    }

    /// Per-time-step adjacency in `[time, node, node]` layout: self-loops,
    /// inverse-distance edges and symmetric degree normalization.
    pub fn adjacency_tensor<B: Backend>(&self) -> Tensor<B, 3> {
        let t = self.seq_len();
        let v = self.node_count();
        let mut values = vec![0.0f32; t * v * v];

        for (step, positions) in self.positions.iter().enumerate() {
            let mut adj = vec![vec![0.0f64; v]; v];
            for i in 0..v {
                adj[i][i] = 1.0;
                for j in i + 1..v {
                    let dx = positions[i][0] - positions[j][0];
                    let dy = positions[i][1] - positions[j][1];
                    let dist = (dx * dx + dy * dy).sqrt();
                    let weight = if dist > 0.0 { 1.0 / dist } else { 0.0 };
                    adj[i][j] = weight;
                    adj[j][i] = weight;
                }
            }

            let degree: Vec<f64> = adj.iter().map(|row| row.iter().sum()).collect();
            for i in 0..v {
                for j in 0..v {
                    let norm = (degree[i] * degree[j]).sqrt();
                    if norm > 0.0 {
                        values[step * v * v + i * v + j] = (adj[i][j] / norm) as f32;
                    }
                }
            }
        }

        let data = Data::new(values, Shape::new([t, v, v]));
        Tensor::from_data(data.convert())
    }
}

/// One-hot category encoding, `[node, class_count]`.
pub fn one_hot<B: Backend>(classes: &[usize], class_count: usize) -> Tensor<B, 2> {
    let v = classes.len();
    let mut values = vec![0.0f32; v * class_count];
    for (node, &class) in classes.iter().enumerate() {
        assert!(class < class_count, "class index out of range");
        values[node * class_count + class] = 1.0;
    }
    let data = Data::new(values, Shape::new([v, class_count]));
    Tensor::from_data(data.convert())
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray<f32>;

    fn row(frame: f64, ped_id: f64, x: f64, y: f64) -> TrajectoryRow {
        TrajectoryRow { frame, ped_id, x, y }
    }

    #[test]
    fn reads_serialized_buckets_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bucket.txt");
        std::fs::write(
            &path,
            "2.00000e+00\t1.00000e+00\t3.50000e+00\t5.00000e+01\n",
        )
        .unwrap();
        let rows = read_bucket(&path).unwrap();
        assert_eq!(rows, vec![row(2.0, 1.0, 3.5, 50.0)]);
    }

    #[test]
    fn rejects_short_bucket_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bucket.txt");
        std::fs::write(&path, "1.0\t2.0\n").unwrap();
        assert!(read_bucket(&path).is_err());
    }

    #[test]
    fn windows_require_consecutive_frames_and_shared_peds() {
        let rows = vec![
            row(0.0, 1.0, 0.0, 0.0),
            row(0.0, 2.0, 1.0, 0.0),
            row(1.0, 1.0, 0.5, 0.0),
            row(1.0, 2.0, 1.5, 0.0),
            row(1.0, 3.0, 9.0, 9.0),
            row(2.0, 1.0, 1.0, 0.0),
            row(2.0, 2.0, 2.0, 0.0),
            // gap: frame 3 missing
            row(4.0, 1.0, 3.0, 0.0),
        ];
        let windows = build_windows(&rows, 2);
        assert_eq!(windows.len(), 2);
        // Pedestrian 3 appears only at frame 1 and is dropped everywhere.
        assert_eq!(windows[0].ped_ids, vec![1, 2]);
        assert_eq!(windows[1].ped_ids, vec![1, 2]);
        assert_eq!(windows[0].positions[1][0], [0.5, 0.0]);
    }

    #[test]
    fn tensors_have_contract_shapes() {
        let rows = vec![
            row(0.0, 1.0, 0.0, 0.0),
            row(0.0, 2.0, 1.0, 0.0),
            row(1.0, 1.0, 0.0, 1.0),
            row(1.0, 2.0, 1.0, 1.0),
        ];
        let windows = build_windows(&rows, 2);
        let features = windows[0].feature_tensor::<TestBackend>();
        let adjacency = windows[0].adjacency_tensor::<TestBackend>();
        assert_eq!(features.dims(), [1, 2, 2, 2]);
        assert_eq!(adjacency.dims(), [2, 2, 2]);
    }

    #[test]
    fn adjacency_is_normalized_and_symmetric() {
        let rows = vec![row(0.0, 1.0, 0.0, 0.0), row(0.0, 2.0, 1.0, 0.0)];
        let windows = build_windows(&rows, 1);
        let adjacency = windows[0].adjacency_tensor::<TestBackend>();
        // Two nodes at distance one: uniform weights, degree two each.
        let values = adjacency.into_data().value;
        for value in values {
            assert!((value - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn one_hot_marks_one_class_per_node() {
        let encoding = one_hot::<TestBackend>(&[1, 0], 2);
        assert_eq!(encoding.dims(), [2, 2]);
        assert_eq!(encoding.into_data().value, vec![0.0, 1.0, 1.0, 0.0]);
    }
}
