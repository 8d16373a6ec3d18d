//! Snapshot workbooks: a one-sheet spreadsheet holding the data a linked chart points at.
//!
//! Snapshots are best effort. The engine writes them but never reads them back.

mod xls;
mod xlsx;

use crate::error::Result;
use crate::model::CacheModel;
use crate::policy::SnapshotFormat;

pub use xls::write_legacy_binary;
pub use xlsx::write_packaged_spreadsheet;

/// Name of the single worksheet in every snapshot.
pub const SNAPSHOT_SHEET_NAME: &str = "Sheet1";

/// A snapshot workbook produced for a kept external data link.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Relationship target, relative to the chart part (`../embeddings/...`).
    pub target: String,
    /// Resolved OPC part name (`xl/embeddings/...`).
    pub part_name: String,
    pub format: SnapshotFormat,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotCell {
    Empty,
    Text(String),
    Number(f64),
}

/// Row-major cell grid of the snapshot sheet, anchored at `A1`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotGrid {
    rows: Vec<Vec<SnapshotCell>>,
}

impl SnapshotGrid {
    /// Lay out a cache model.
    ///
    /// Categorical: `A1` empty, series names across row 1 from `B1`, labels down column A from
    /// `A2`, each series' values below its name. XY: two columns per series, row 1 holding
    /// `"X"` and the series name.
    pub fn from_model(model: &CacheModel) -> Self {
        let mut grid = SnapshotGrid::default();
        match model {
            CacheModel::Categorical(data) => {
                for (s, series) in data.series.iter().enumerate() {
                    grid.set(0, s + 1, name_cell(series.name.as_deref()));
                }
                for (pos, label) in data.labels.iter().enumerate() {
                    grid.set(pos + 1, 0, SnapshotCell::Text(label.clone()));
                    for (s, series) in data.series.iter().enumerate() {
                        if let Some(value) = series.values.get(pos).copied().flatten() {
                            grid.set(pos + 1, s + 1, SnapshotCell::Number(value));
                        }
                    }
                }
            }
            CacheModel::Xy(data) => {
                for (s, series) in data.series.iter().enumerate() {
                    let x_col = s * 2;
                    grid.set(0, x_col, SnapshotCell::Text("X".to_string()));
                    grid.set(0, x_col + 1, name_cell(series.name.as_deref()));
                    for (pos, (x, y)) in series.x.iter().zip(&series.y).enumerate() {
                        if let Some(x) = x {
                            grid.set(pos + 1, x_col, SnapshotCell::Number(*x));
                        }
                        if let Some(y) = y {
                            grid.set(pos + 1, x_col + 1, SnapshotCell::Number(*y));
                        }
                    }
                }
            }
        }
        grid
    }

    pub fn rows(&self) -> &[Vec<SnapshotCell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&SnapshotCell> {
        self.rows.get(row)?.get(col)
    }

    fn set(&mut self, row: usize, col: usize, cell: SnapshotCell) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, SnapshotCell::Empty);
        }
        cells[col] = cell;
    }
}

fn name_cell(name: Option<&str>) -> SnapshotCell {
    match name {
        Some(name) => SnapshotCell::Text(name.to_string()),
        None => SnapshotCell::Empty,
    }
}

/// Formulas locating one series' data inside the snapshot sheet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeriesRefs {
    pub name: String,
    pub category: Option<String>,
    pub values: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
}

/// Snapshot references for every series of `model`, matching [`SnapshotGrid::from_model`].
pub fn series_refs(model: &CacheModel) -> Vec<SeriesRefs> {
    match model {
        CacheModel::Categorical(data) => {
            let len = data.labels.len();
            let category = column_range(0, len);
            data.series
                .iter()
                .enumerate()
                .map(|(s, _)| SeriesRefs {
                    name: cell_ref(0, s + 1),
                    category: Some(category.clone()),
                    values: Some(column_range(s + 1, len)),
                    x: None,
                    y: None,
                })
                .collect()
        }
        CacheModel::Xy(data) => data
            .series
            .iter()
            .enumerate()
            .map(|(s, series)| {
                let len = series.y.len();
                SeriesRefs {
                    name: cell_ref(0, s * 2 + 1),
                    category: None,
                    values: None,
                    x: Some(column_range(s * 2, len)),
                    y: Some(column_range(s * 2 + 1, len)),
                }
            })
            .collect(),
    }
}

/// Serialize `model` as a snapshot workbook in `format`.
pub fn write_snapshot(model: &CacheModel, format: SnapshotFormat) -> Result<Vec<u8>> {
    let grid = SnapshotGrid::from_model(model);
    let bytes = match format {
        SnapshotFormat::PackagedSpreadsheet => write_packaged_spreadsheet(&grid)?,
        SnapshotFormat::LegacyBinary => write_legacy_binary(&grid)?,
    };
    log::debug!(
        "wrote {format:?} snapshot ({} rows x {} cols, {} bytes)",
        grid.row_count(),
        grid.col_count(),
        bytes.len()
    );
    Ok(bytes)
}

/// A1-style name of a 0-based column.
pub fn col_to_name(col: usize) -> String {
    let mut n = col + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    out.iter().rev().collect()
}

/// Absolute single-cell reference on the snapshot sheet (`Sheet1!$B$1`), 0-based.
pub fn cell_ref(row: usize, col: usize) -> String {
    format!("{SNAPSHOT_SHEET_NAME}!${}${}", col_to_name(col), row + 1)
}

/// Absolute reference to `len` data rows of `col`, starting at row 2.
///
/// An empty column still references its first data cell so the formula stays well formed.
fn column_range(col: usize, len: usize) -> String {
    let name = col_to_name(col);
    let last = len.max(1) + 1;
    format!("{SNAPSHOT_SHEET_NAME}!${name}$2:${name}${last}")
}
