//! Merge engine: combines the original cache with incoming data under a [`FillPolicy`].

use std::collections::HashMap;

use crate::error::{ChartFillError, Result};
use crate::model::{CacheModel, CategoricalData, CategoricalSeries, XyData, XySeries};
use crate::policy::FillPolicy;

/// Produce the final cache model.
///
/// With `keep_original_for_missing` off, the incoming model wins verbatim. With it on, nothing
/// present in `original` is silently dropped: categorical data merges by label (original
/// order first, new labels appended) and XY data overlays by position.
///
/// The result always satisfies [`CacheModel::check_lengths`]. Labels left without any series
/// are [`ChartFillError::LabelsWithoutSeries`]; any other violation is an engine bug and is
/// reported as [`ChartFillError::LengthMismatch`].
pub fn merge(original: &CacheModel, incoming: &CacheModel, policy: &FillPolicy) -> Result<CacheModel> {
    let merged = match (original, incoming) {
        (_, incoming) if !policy.keep_original_for_missing => {
            if original.kind() != incoming.kind() {
                return Err(ChartFillError::KindMismatch {
                    original: original.kind(),
                    incoming: incoming.kind(),
                });
            }
            incoming.clone()
        }
        (CacheModel::Categorical(original), CacheModel::Categorical(incoming)) => {
            CacheModel::Categorical(merge_categorical(original, incoming))
        }
        (CacheModel::Xy(original), CacheModel::Xy(incoming)) => {
            CacheModel::Xy(merge_xy(original, incoming))
        }
        (original, incoming) => {
            return Err(ChartFillError::KindMismatch {
                original: original.kind(),
                incoming: incoming.kind(),
            })
        }
    };

    merged.check_lengths()?;
    Ok(merged)
}

fn merge_categorical(original: &CategoricalData, incoming: &CategoricalData) -> CategoricalData {
    // First occurrence wins for duplicate incoming labels.
    let mut incoming_pos: HashMap<&str, usize> = HashMap::with_capacity(incoming.labels.len());
    for (pos, label) in incoming.labels.iter().enumerate() {
        incoming_pos.entry(label.as_str()).or_insert(pos);
    }

    let mut labels = original.labels.clone();
    let mut known: HashMap<&str, ()> = original.labels.iter().map(|l| (l.as_str(), ())).collect();
    for label in &incoming.labels {
        if known.insert(label.as_str(), ()).is_none() {
            labels.push(label.clone());
        }
    }

    let series_count = original.series.len().max(incoming.series.len());
    let series = (0..series_count)
        .map(|s| {
            let orig = original.series.get(s);
            let inc = incoming.series.get(s);
            let values = labels
                .iter()
                .enumerate()
                .map(|(pos, label)| {
                    let from_incoming = inc.and_then(|inc| {
                        let at = *incoming_pos.get(label.as_str())?;
                        inc.values.get(at).copied().flatten()
                    });
                    // Positions past the original axis only exist in incoming.
                    let from_original = orig
                        .filter(|_| pos < original.labels.len())
                        .and_then(|orig| orig.values.get(pos).copied().flatten());
                    from_incoming.or(from_original)
                })
                .collect();
            let name = inc
                .and_then(|inc| inc.name.clone())
                .or_else(|| orig.and_then(|orig| orig.name.clone()));
            CategoricalSeries { name, values }
        })
        .collect();

    CategoricalData { labels, series }
}

fn merge_xy(original: &XyData, incoming: &XyData) -> XyData {
    let series_count = original.series.len().max(incoming.series.len());
    let series = (0..series_count)
        .map(|s| {
            let empty = XySeries::default();
            let orig = original.series.get(s).unwrap_or(&empty);
            let inc = incoming.series.get(s).unwrap_or(&empty);

            let len = orig.y.len().max(inc.y.len());
            let mut x = Vec::with_capacity(len);
            let mut y = Vec::with_capacity(len);
            for i in 0..len {
                let point = match inc.y.get(i).copied().flatten() {
                    Some(value) => Some((inc.x.get(i).copied().flatten(), value)),
                    None => orig
                        .y
                        .get(i)
                        .copied()
                        .flatten()
                        .map(|value| (orig.x.get(i).copied().flatten(), value)),
                };
                // A wholly missing point truncates the series.
                let Some((px, py)) = point else {
                    break;
                };
                x.push(px);
                y.push(Some(py));
            }

            let name = inc.name.clone().or_else(|| orig.name.clone());
            XySeries { name, x, y }
        })
        .collect();

    XyData { series }
}
