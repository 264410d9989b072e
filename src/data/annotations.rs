use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// One annotation row reduced to its trajectory content: the bounding box is
/// collapsed to its center, the label keeps its original (unquoted) text.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub frame: f64,
    pub ped_id: f64,
    pub x: f64,
    pub y: f64,
    pub label: String,
}

/// Parses one raw annotation row.
///
/// Expected field order:
/// `ped_id x_min y_min x_max y_max frame <3 ignored fields> "label"`.
/// Malformed rows are not recovered; the caller decides whether the file is
/// abandoned.
pub fn parse_row(line: &str) -> Result<NormalizedRow> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 10 {
        return Err(Error::MalformedRow(format!(
            "expected 10 fields, got {}: {:?}",
            fields.len(),
            line
        )));
    }

    let num = |idx: usize| -> Result<f64> {
        fields[idx]
            .parse::<f64>()
            .map_err(|_| Error::MalformedRow(format!("field {}: {:?}", idx, line)))
    };

    let ped_id = num(0)?;
    let x_min = num(1)?;
    let y_min = num(2)?;
    let x_max = num(3)?;
    let y_max = num(4)?;
    let frame = num(5)?;
    let label = fields[9].trim_matches('"').to_string();

    Ok(NormalizedRow {
        frame,
        ped_id,
        x: (x_min + x_max) / 2.0,
        y: (y_min + y_max) / 2.0,
        label,
    })
}

/// Reads a whole annotation file, preserving row order.
pub fn read_annotations(path: &Path) -> Result<Vec<NormalizedRow>> {
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_row)
        .collect()
}
