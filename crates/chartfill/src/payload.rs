//! The "new data" payload handed to the engine, and its normalization into a [`CacheModel`].

use serde::{Deserialize, Serialize};

use crate::model::{CacheModel, CategoricalData, CategoricalSeries, ChartKind, XyData, XySeries};
use crate::policy::FillPolicy;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CategoricalSeriesPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct XySeriesPayload {
    #[serde(default)]
    pub name: Option<String>,
    pub y: Vec<Option<f64>>,
    /// Explicit x-values; positions without one are synthesized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<Vec<Option<f64>>>,
}

/// New plot data, as produced by whatever computes the business numbers.
///
/// The JSON shape decides the variant: a top-level `labels` array means categorical data,
/// series carrying `y` arrays mean XY data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NewData {
    Categorical {
        labels: Vec<String>,
        series: Vec<CategoricalSeriesPayload>,
    },
    Xy {
        series: Vec<XySeriesPayload>,
    },
}

impl NewData {
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn kind(&self) -> ChartKind {
        match self {
            NewData::Categorical { .. } => ChartKind::Categorical,
            NewData::Xy { .. } => ChartKind::Xy,
        }
    }

    /// Normalize into a [`CacheModel`] whose series all match their axes.
    ///
    /// Categorical series longer than `labels` extend the axis with 1-based position labels;
    /// shorter ones are padded with empty points. XY positions without an explicit x get
    /// `axis_synthesis_base + 1 + i`.
    pub fn to_model(&self, policy: &FillPolicy) -> CacheModel {
        match self {
            NewData::Categorical { labels, series } => {
                let len = series
                    .iter()
                    .map(|s| s.values.len())
                    .chain(std::iter::once(labels.len()))
                    .max()
                    .unwrap_or(0);
                let mut labels = labels.clone();
                for pos in labels.len()..len {
                    labels.push((pos + 1).to_string());
                }
                let series = series
                    .iter()
                    .map(|s| {
                        let mut values: Vec<Option<f64>> =
                            s.values.iter().map(|v| v.filter(|v| v.is_finite())).collect();
                        values.resize(len, None);
                        CategoricalSeries {
                            name: s.name.clone(),
                            values,
                        }
                    })
                    .collect();
                CacheModel::Categorical(CategoricalData { labels, series })
            }
            NewData::Xy { series } => {
                let base = policy.axis_synthesis_base;
                let series = series
                    .iter()
                    .map(|s| {
                        let y: Vec<Option<f64>> =
                            s.y.iter().map(|v| v.filter(|v| v.is_finite())).collect();
                        let x = (0..y.len())
                            .map(|i| {
                                let explicit = s
                                    .x
                                    .as_ref()
                                    .and_then(|x| x.get(i).copied().flatten())
                                    .filter(|v| v.is_finite());
                                explicit.or_else(|| Some(synthesized_x(base, i)))
                            })
                            .collect();
                        XySeries {
                            name: s.name.clone(),
                            x,
                            y,
                        }
                    })
                    .collect();
                CacheModel::Xy(XyData { series })
            }
        }
    }
}

fn synthesized_x(base: i64, pos: usize) -> f64 {
    base as f64 + 1.0 + pos as f64
}
