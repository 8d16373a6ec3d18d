//! Cache reader: extracts a [`CacheModel`] from a chart part's cache nodes.
//!
//! Reading never fails on a malformed series. Anomalies (missing wrappers, points without an
//! `idx`, unparseable numbers) degrade the affected series to empty/placeholder values and are
//! reported as diagnostics, since "no cached data yet" is a legitimate original state.

use crate::classify::series_paths;
use crate::document::ChartDocument;
use crate::model::{
    CacheDiagnostic, CacheEncoding, CacheLayout, CacheModel, CategoricalData, CategoricalSeries,
    ChartKind, SeriesLayout, XyData, XySeries,
};
use crate::xml::XmlElement;

/// Upper bound on a trusted `ptCount`; larger counts are ignored in favor of the points present.
const MAX_POINT_COUNT: usize = 1_048_576;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead {
    pub model: CacheModel,
    pub layout: CacheLayout,
    pub diagnostics: Vec<CacheDiagnostic>,
}

pub fn read_cache(doc: &ChartDocument, kind: ChartKind) -> CacheRead {
    let root = doc.root();
    let series_nodes: Vec<&XmlElement> = series_paths(root, kind)
        .iter()
        .filter_map(|path| root.at_path(path))
        .collect();

    let mut diagnostics = Vec::new();
    let mut layouts = Vec::with_capacity(series_nodes.len());

    let model = match kind {
        ChartKind::Categorical => {
            let mut labels = Vec::new();
            let mut series = Vec::with_capacity(series_nodes.len());
            for (pos, ser) in series_nodes.iter().enumerate() {
                let (category, cat_points) =
                    read_slot(ser, "cat", &format!("ser[{pos}]/cat"), &mut diagnostics);
                // The first series' category axis is authoritative for the whole chart.
                if pos == 0 {
                    labels = cat_points;
                }

                let location = format!("ser[{pos}]/val");
                let (values_encoding, raw) = read_slot(ser, "val", &location, &mut diagnostics);
                let values = parse_numbers(&raw, &location, &mut diagnostics);

                layouts.push(SeriesLayout {
                    category,
                    values: values_encoding,
                    x: None,
                    y: None,
                });
                series.push(CategoricalSeries {
                    name: read_series_name(ser),
                    values,
                });
            }
            // A value cache longer than the axis extends it with placeholder labels.
            let len = series
                .iter()
                .map(|s: &CategoricalSeries| s.values.len())
                .fold(labels.len(), usize::max);
            labels.resize(len, String::new());
            for s in &mut series {
                s.values.resize(len, None);
            }
            CacheModel::Categorical(CategoricalData { labels, series })
        }
        ChartKind::Xy => {
            let mut series = Vec::with_capacity(series_nodes.len());
            for (pos, ser) in series_nodes.iter().enumerate() {
                let x_location = format!("ser[{pos}]/xVal");
                let (x_encoding, raw_x) = read_slot(ser, "xVal", &x_location, &mut diagnostics);
                let mut x = parse_numbers(&raw_x, &x_location, &mut diagnostics);

                let y_location = format!("ser[{pos}]/yVal");
                let (y_encoding, raw_y) = read_slot(ser, "yVal", &y_location, &mut diagnostics);
                let mut y = parse_numbers(&raw_y, &y_location, &mut diagnostics);

                // Missing tail positions are absent, never zero.
                let len = x.len().max(y.len());
                x.resize(len, None);
                y.resize(len, None);

                layouts.push(SeriesLayout {
                    category: None,
                    values: None,
                    x: x_encoding,
                    y: y_encoding,
                });
                series.push(XySeries {
                    name: read_series_name(ser),
                    x,
                    y,
                });
            }
            CacheModel::Xy(XyData { series })
        }
    };

    for diagnostic in &diagnostics {
        log::warn!(
            "{}: {}: {}",
            doc.part_name(),
            diagnostic.location,
            diagnostic.message
        );
    }
    log::debug!(
        "{}: read {} {kind:?} series",
        doc.part_name(),
        model.series_count()
    );

    CacheRead {
        model,
        layout: CacheLayout {
            kind,
            series: layouts,
        },
        diagnostics,
    }
}

/// Reads a data slot (`cat`, `val`, `xVal`, `yVal`) as positional text points.
fn read_slot(
    ser: &XmlElement,
    slot: &str,
    location: &str,
    diagnostics: &mut Vec<CacheDiagnostic>,
) -> (Option<CacheEncoding>, Vec<String>) {
    let Some(slot_el) = ser.child(slot) else {
        return (None, Vec::new());
    };

    let wrapper = slot_el
        .elements()
        .find_map(|el| CacheEncoding::from_wrapper_name(el.local_name()).map(|enc| (enc, el)));
    let Some((encoding, wrapper)) = wrapper else {
        let found: Vec<&str> = slot_el.elements().map(XmlElement::local_name).collect();
        let message = if found.is_empty() {
            "data slot has neither a reference nor a literal wrapper".to_string()
        } else {
            format!("unsupported cache wrapper <{}>", found.join(", "))
        };
        diagnostics.push(CacheDiagnostic::warning(location, message));
        return (None, Vec::new());
    };

    let cache = if encoding.cache_name() == wrapper.local_name() {
        Some(wrapper)
    } else {
        wrapper.child(encoding.cache_name())
    };
    let points = match cache {
        Some(cache) => read_points(cache, location, diagnostics),
        None => Vec::new(),
    };
    (Some(encoding), points)
}

/// Flattens `(idx, value)` pairs into a positional list, sorted by index.
///
/// Gaps become empty strings so the result stays aligned with the declared point count.
pub(crate) fn read_points(
    cache: &XmlElement,
    location: &str,
    diagnostics: &mut Vec<CacheDiagnostic>,
) -> Vec<String> {
    let declared = match cache.child("ptCount").and_then(|el| el.attr("val")) {
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(count) if count <= MAX_POINT_COUNT => Some(count),
            _ => {
                diagnostics.push(CacheDiagnostic::warning(
                    location,
                    format!("invalid ptCount {raw:?}"),
                ));
                None
            }
        },
        None => None,
    };

    let mut points: Vec<(usize, String)> = Vec::new();
    for pt in cache.children_named("pt") {
        let idx = pt
            .attr("idx")
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|idx| *idx < MAX_POINT_COUNT);
        let Some(idx) = idx else {
            diagnostics.push(CacheDiagnostic::warning(
                location,
                format!("point without a valid idx ({:?})", pt.attr("idx")),
            ));
            continue;
        };
        let value = pt.child("v").map(XmlElement::text).unwrap_or_default();
        points.push((idx, value));
    }
    points.sort_by_key(|(idx, _)| *idx);

    let inferred = points.last().map(|(idx, _)| idx + 1).unwrap_or(0);
    let len = declared.unwrap_or(0).max(inferred);
    let mut values = vec![String::new(); len];
    let mut seen = vec![false; len];
    for (idx, value) in points {
        if seen[idx] {
            diagnostics.push(CacheDiagnostic::warning(
                location,
                format!("duplicate point idx {idx}; keeping the first"),
            ));
            continue;
        }
        seen[idx] = true;
        values[idx] = value;
    }
    values
}

fn parse_numbers(
    raw: &[String],
    location: &str,
    diagnostics: &mut Vec<CacheDiagnostic>,
) -> Vec<Option<f64>> {
    raw.iter()
        .enumerate()
        .map(|(idx, text)| {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            match text.parse::<f64>() {
                Ok(value) if value.is_finite() => Some(value),
                _ => {
                    diagnostics.push(CacheDiagnostic::warning(
                        location,
                        format!("point {idx}: {text:?} is not a finite number"),
                    ));
                    None
                }
            }
        })
        .collect()
}

fn read_series_name(ser: &XmlElement) -> Option<String> {
    let tx = ser.child("tx")?;
    if let Some(str_ref) = tx.child("strRef") {
        let cache = str_ref.child("strCache")?;
        let mut ignored = Vec::new();
        return read_points(cache, "tx", &mut ignored).into_iter().next();
    }
    tx.child("v").map(XmlElement::text)
}
