//! In-memory cache model, independent of the on-disk chart XML encoding.

use serde::{Deserialize, Serialize};

use crate::error::{ChartFillError, Result};

/// The cache shape a chart part uses. Determined once per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartKind {
    /// Bar/line/pie/area/doughnut/radar family: one shared category axis.
    Categorical,
    /// Scatter/bubble family: every series owns its own x/y point pairs.
    Xy,
}

/// How a cache node is stored in the chart part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EncodingMode {
    /// `c:strRef`/`c:numRef` wrapper holding a formula (`c:f`) plus an inner cache.
    ReferenceBacked,
    /// Inline `c:strLit`/`c:numLit` list without a formula.
    Literal,
}

/// Which flavor of cache a slot holds (`str*` vs `num*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheValueKind {
    Text,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEncoding {
    pub mode: EncodingMode,
    pub kind: CacheValueKind,
}

impl CacheEncoding {
    pub const fn new(mode: EncodingMode, kind: CacheValueKind) -> Self {
        Self { mode, kind }
    }

    /// Local name of the wrapper element (`strRef`, `numLit`, ...).
    pub fn wrapper_name(&self) -> &'static str {
        match (self.mode, self.kind) {
            (EncodingMode::ReferenceBacked, CacheValueKind::Text) => "strRef",
            (EncodingMode::ReferenceBacked, CacheValueKind::Number) => "numRef",
            (EncodingMode::Literal, CacheValueKind::Text) => "strLit",
            (EncodingMode::Literal, CacheValueKind::Number) => "numLit",
        }
    }

    /// Local name of the element holding `ptCount`/`pt` children.
    ///
    /// Literal lists hold their points directly, so this equals [`Self::wrapper_name`].
    pub fn cache_name(&self) -> &'static str {
        match (self.mode, self.kind) {
            (EncodingMode::ReferenceBacked, CacheValueKind::Text) => "strCache",
            (EncodingMode::ReferenceBacked, CacheValueKind::Number) => "numCache",
            (EncodingMode::Literal, _) => self.wrapper_name(),
        }
    }

    pub fn from_wrapper_name(local: &str) -> Option<Self> {
        let encoding = match local {
            "strRef" => Self::new(EncodingMode::ReferenceBacked, CacheValueKind::Text),
            "numRef" => Self::new(EncodingMode::ReferenceBacked, CacheValueKind::Number),
            "strLit" => Self::new(EncodingMode::Literal, CacheValueKind::Text),
            "numLit" => Self::new(EncodingMode::Literal, CacheValueKind::Number),
            _ => return None,
        };
        Some(encoding)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoricalSeries {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Values aligned positionally with [`CategoricalData::labels`]; `None` is an empty point.
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoricalData {
    pub labels: Vec<String>,
    pub series: Vec<CategoricalSeries>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XySeries {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub x: Vec<Option<f64>>,
    pub y: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XyData {
    pub series: Vec<XySeries>,
}

/// Cached plot data for one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum CacheModel {
    Categorical(CategoricalData),
    Xy(XyData),
}

impl CacheModel {
    pub fn empty(kind: ChartKind) -> Self {
        match kind {
            ChartKind::Categorical => CacheModel::Categorical(CategoricalData::default()),
            ChartKind::Xy => CacheModel::Xy(XyData::default()),
        }
    }

    pub fn kind(&self) -> ChartKind {
        match self {
            CacheModel::Categorical(_) => ChartKind::Categorical,
            CacheModel::Xy(_) => ChartKind::Xy,
        }
    }

    pub fn series_count(&self) -> usize {
        match self {
            CacheModel::Categorical(data) => data.series.len(),
            CacheModel::Xy(data) => data.series.len(),
        }
    }

    pub fn series_names(&self) -> Vec<Option<&str>> {
        match self {
            CacheModel::Categorical(data) => {
                data.series.iter().map(|s| s.name.as_deref()).collect()
            }
            CacheModel::Xy(data) => data.series.iter().map(|s| s.name.as_deref()).collect(),
        }
    }

    /// Verifies every series matches its axis length.
    ///
    /// Category labels are stored under each series' `c:cat`, so a categorical model with
    /// labels but no series cannot be written.
    pub fn check_lengths(&self) -> Result<()> {
        match self {
            CacheModel::Categorical(data) => {
                if data.series.is_empty() && !data.labels.is_empty() {
                    return Err(ChartFillError::LabelsWithoutSeries {
                        labels: data.labels.len(),
                    });
                }
                for (idx, series) in data.series.iter().enumerate() {
                    if series.values.len() != data.labels.len() {
                        return Err(ChartFillError::LengthMismatch {
                            series: idx,
                            expected: data.labels.len(),
                            actual: series.values.len(),
                        });
                    }
                }
            }
            CacheModel::Xy(data) => {
                for (idx, series) in data.series.iter().enumerate() {
                    if series.x.len() != series.y.len() {
                        return Err(ChartFillError::LengthMismatch {
                            series: idx,
                            expected: series.x.len(),
                            actual: series.y.len(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Encodings of one series' cache slots, resolved once at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesLayout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CacheEncoding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<CacheEncoding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<CacheEncoding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<CacheEncoding>,
}

/// Per-series encoding map of a chart document, in series order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheLayout {
    pub kind: ChartKind,
    pub series: Vec<SeriesLayout>,
}

impl CacheLayout {
    /// Layout for series `idx`; series beyond the document's count inherit the last one,
    /// matching how the writer clones new series from the last existing series.
    pub fn series_or_last(&self, idx: usize) -> SeriesLayout {
        self.series
            .get(idx)
            .or_else(|| self.series.last())
            .copied()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheDiagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    /// Location hint such as `ser[2]/val`.
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticLevel {
    Warning,
}

impl CacheDiagnostic {
    pub fn warning(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
            location: location.into(),
        }
    }

    /// The diagnostic as the error variant it degrades from.
    pub fn to_error(&self) -> ChartFillError {
        ChartFillError::MalformedCacheNode {
            location: self.location.clone(),
            message: self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_lengths_reports_first_offending_series() {
        let model = CacheModel::Categorical(CategoricalData {
            labels: vec!["A".into(), "B".into()],
            series: vec![
                CategoricalSeries {
                    name: None,
                    values: vec![Some(1.0), Some(2.0)],
                },
                CategoricalSeries {
                    name: None,
                    values: vec![Some(1.0)],
                },
            ],
        });
        let err = model.check_lengths().unwrap_err();
        assert!(matches!(
            err,
            ChartFillError::LengthMismatch {
                series: 1,
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn encoding_names_round_trip() {
        for name in ["strRef", "numRef", "strLit", "numLit"] {
            let encoding = CacheEncoding::from_wrapper_name(name).expect("known wrapper");
            assert_eq!(encoding.wrapper_name(), name);
        }
        assert_eq!(CacheEncoding::from_wrapper_name("multiLvlStrRef"), None);
    }
}
