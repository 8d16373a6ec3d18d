//! Cache writer: commits a [`CacheModel`] into a chart part's cache nodes.
//!
//! Every rewritten cache node ends up with `ptCount/@val` equal to the number of `pt` children
//! and dense, ascending, 0-based `idx` values. Whatever the node cached before is discarded.

use crate::classify::{container_paths, series_paths};
use crate::document::ChartDocument;
use crate::error::{ChartFillError, Result};
use crate::model::{
    CacheEncoding, CacheLayout, CacheModel, CacheValueKind, ChartKind, EncodingMode,
};
use crate::read::read_points;
use crate::xml::{XmlElement, XmlNode};

/// Elements that follow `ser` inside a plot container.
const AFTER_SERIES: &[&str] = &[
    "dLbls",
    "dropLines",
    "hiLowLines",
    "upDownBars",
    "marker",
    "smooth",
    "gapWidth",
    "gapDepth",
    "overlap",
    "serLines",
    "shape",
    "firstSliceAng",
    "holeSize",
    "splitType",
    "splitPos",
    "custSplit",
    "secondPieSize",
    "bubble3D",
    "bubbleScale",
    "showNegBubbles",
    "sizeRepresents",
    "axId",
    "extLst",
];

const AFTER_TX: &[&str] = &[
    "spPr",
    "invertIfNegative",
    "pictureOptions",
    "marker",
    "explosion",
    "dPt",
    "dLbls",
    "trendline",
    "errBars",
    "cat",
    "val",
    "xVal",
    "yVal",
    "smooth",
    "shape",
    "bubbleSize",
    "bubble3D",
    "extLst",
];
const AFTER_CAT: &[&str] = &["val", "shape", "smooth", "extLst"];
const AFTER_VAL: &[&str] = &["shape", "smooth", "extLst"];
const AFTER_X_VAL: &[&str] = &["yVal", "smooth", "bubbleSize", "bubble3D", "extLst"];
const AFTER_Y_VAL: &[&str] = &["smooth", "bubbleSize", "bubble3D", "extLst"];
const AFTER_BUBBLE_SIZE: &[&str] = &["bubble3D", "extLst"];

const DEFAULT_BUBBLE_SIZE: f64 = 1.0;

/// Values destined for one cache slot.
#[derive(Debug, Clone, Copy)]
enum SlotValues<'a> {
    Labels(&'a [String]),
    Numbers(&'a [Option<f64>]),
}

impl SlotValues<'_> {
    fn len(&self) -> usize {
        match self {
            SlotValues::Labels(labels) => labels.len(),
            SlotValues::Numbers(values) => values.len(),
        }
    }

    fn text_at(&self, idx: usize) -> String {
        match self {
            SlotValues::Labels(labels) => labels[idx].clone(),
            SlotValues::Numbers(values) => values[idx].map(format_number).unwrap_or_default(),
        }
    }

    /// Cache flavor needed to hold these values, given the flavor the slot used before.
    fn value_kind(&self, previous: Option<CacheValueKind>) -> CacheValueKind {
        match self {
            SlotValues::Numbers(_) => CacheValueKind::Number,
            SlotValues::Labels(labels) => {
                let numeric = labels.iter().all(|label| {
                    let label = label.trim();
                    label.is_empty() || label.parse::<f64>().is_ok_and(f64::is_finite)
                });
                if previous == Some(CacheValueKind::Number) && numeric {
                    CacheValueKind::Number
                } else {
                    CacheValueKind::Text
                }
            }
        }
    }
}

/// Overwrites the document's caches with `model`.
///
/// `layout` must come from [`crate::read::read_cache`] on the same document; it decides whether
/// each slot is rewritten as a reference-backed cache or an inline literal.
pub fn write_cache(doc: &mut ChartDocument, layout: &CacheLayout, model: &CacheModel) -> Result<()> {
    let kind = model.kind();
    if layout.kind != kind {
        return Err(ChartFillError::KindMismatch {
            original: layout.kind,
            incoming: kind,
        });
    }
    model.check_lengths()?;

    let part_name = doc.part_name().to_string();
    let root = doc.root_mut();
    reconcile_series_count(root, kind, model.series_count(), &part_name)?;

    let paths = series_paths(root, kind);
    for (pos, path) in paths.iter().enumerate() {
        let Some(ser) = root.at_path_mut(path) else {
            continue;
        };
        set_val_child(ser, "idx", &pos.to_string(), &[]);
        set_val_child(ser, "order", &pos.to_string(), &[]);

        let series_layout = layout.series_or_last(pos);
        match model {
            CacheModel::Categorical(data) => {
                let series = &data.series[pos];
                write_name(ser, series.name.as_deref());
                write_slot(
                    ser,
                    "cat",
                    AFTER_CAT,
                    series_layout.category,
                    SlotValues::Labels(&data.labels),
                );
                write_slot(
                    ser,
                    "val",
                    AFTER_VAL,
                    series_layout.values,
                    SlotValues::Numbers(&series.values),
                );
            }
            CacheModel::Xy(data) => {
                let series = &data.series[pos];
                write_name(ser, series.name.as_deref());
                write_slot(ser, "xVal", AFTER_X_VAL, series_layout.x, SlotValues::Numbers(&series.x));
                write_slot(ser, "yVal", AFTER_Y_VAL, series_layout.y, SlotValues::Numbers(&series.y));
                resize_bubble_sizes(ser, series.y.len());
            }
        }
    }

    log::debug!("{part_name}: wrote {} {kind:?} series", paths.len());
    Ok(())
}

/// Adds or removes `ser` elements until the document holds exactly `wanted` series.
fn reconcile_series_count(
    root: &mut XmlElement,
    kind: ChartKind,
    wanted: usize,
    part_name: &str,
) -> Result<()> {
    let paths = series_paths(root, kind);

    if paths.len() > wanted {
        // Reverse order keeps earlier sibling indices valid while removing.
        for path in paths[wanted..].iter().rev() {
            remove_at_path(root, path);
        }
        return Ok(());
    }

    let missing = wanted - paths.len();
    if missing == 0 {
        return Ok(());
    }

    match paths.last() {
        Some(last) => {
            let (container_path, last_idx) = last.split_at(last.len() - 1);
            let container = root
                .at_path_mut(container_path)
                .ok_or_else(|| ChartFillError::XmlStructure(format!("{part_name}: lost plot container")))?;
            let XmlNode::Element(template) = container.children[last_idx[0]].clone() else {
                return Err(ChartFillError::XmlStructure(format!(
                    "{part_name}: series path does not point at an element"
                )));
            };
            for offset in 0..missing {
                container
                    .children
                    .insert(last_idx[0] + 1 + offset, XmlNode::Element(template.clone()));
            }
        }
        None => {
            let container_path = container_paths(root, kind).into_iter().next().ok_or_else(|| {
                ChartFillError::XmlStructure(format!("{part_name}: no plot container to hold series"))
            })?;
            let container = root
                .at_path_mut(&container_path)
                .ok_or_else(|| ChartFillError::XmlStructure(format!("{part_name}: lost plot container")))?;
            for _ in 0..missing {
                let ser = XmlElement::new(container.sibling_name("ser"));
                let after_last = container
                    .children
                    .iter()
                    .rposition(|node| matches!(node, XmlNode::Element(el) if el.is("ser")))
                    .map(|idx| idx + 1);
                match after_last {
                    Some(idx) => container.children.insert(idx, XmlNode::Element(ser)),
                    None => {
                        container.insert_before(ser, AFTER_SERIES);
                    }
                }
            }
        }
    }
    Ok(())
}

fn remove_at_path(root: &mut XmlElement, path: &[usize]) {
    let Some((last, parent_path)) = path.split_last() else {
        return;
    };
    if let Some(parent) = root.at_path_mut(parent_path) {
        if *last < parent.children.len() {
            parent.children.remove(*last);
        }
    }
}

/// Sets `<prefix:local val="..."/>` on `parent`, creating it when absent.
fn set_val_child(parent: &mut XmlElement, local: &str, value: &str, successors: &[&str]) {
    if let Some(existing) = parent.child_mut(local) {
        existing.set_attr("val", value);
        return;
    }
    let el = XmlElement::new(parent.sibling_name(local)).with_attr("val", value);
    match local {
        // `idx` leads every series; `order` directly follows it.
        "idx" => parent.children.insert(0, XmlNode::Element(el)),
        "order" => {
            let at = parent.child_position("idx").map(|idx| idx + 1).unwrap_or(0);
            parent.children.insert(at, XmlNode::Element(el));
        }
        _ => {
            parent.insert_before(el, successors);
        }
    }
}

fn write_name(ser: &mut XmlElement, name: Option<&str>) {
    let Some(name) = name else {
        ser.remove_children_named("tx");
        return;
    };

    let tx = ser.ensure_child("tx", AFTER_TX);
    if let Some(str_ref) = tx.child_mut("strRef") {
        let cache = str_ref.ensure_child("strCache", &["extLst"]);
        fill_cache(cache, SlotValues::Labels(&[name.to_string()]), false);
        return;
    }

    tx.children.clear();
    let v = XmlElement::new(tx.sibling_name("v")).with_text(name);
    tx.children.push(XmlNode::Element(v));
}

fn write_slot(
    ser: &mut XmlElement,
    slot: &str,
    successors: &[&str],
    encoding: Option<CacheEncoding>,
    values: SlotValues<'_>,
) {
    let slot_el = ser.ensure_child(slot, successors);

    // Only trust the recorded encoding if its wrapper is actually present.
    let existing = encoding.filter(|enc| slot_el.has_child(enc.wrapper_name()));
    let kind = values.value_kind(existing.map(|enc| enc.kind));

    let target = match existing {
        Some(previous) => {
            let target = CacheEncoding::new(previous.mode, kind);
            if target != previous {
                convert_wrapper(slot_el, previous, target);
            }
            target
        }
        None => {
            // A reference wrapper implies a link we cannot fabricate: create a literal.
            let target = CacheEncoding::new(EncodingMode::Literal, kind);
            slot_el.children.clear();
            let wrapper = XmlElement::new(slot_el.sibling_name(target.wrapper_name()));
            slot_el.children.push(XmlNode::Element(wrapper));
            target
        }
    };

    let Some(wrapper) = slot_el.child_mut(target.wrapper_name()) else {
        return;
    };
    let is_number = target.kind == CacheValueKind::Number;
    let cache = match target.mode {
        EncodingMode::Literal => wrapper,
        EncodingMode::ReferenceBacked => wrapper.ensure_child(target.cache_name(), &["extLst"]),
    };
    fill_cache(cache, values, is_number);
}

/// Renames a wrapper (and its inner cache) to a different value flavor in the same mode.
fn convert_wrapper(slot_el: &mut XmlElement, from: CacheEncoding, to: CacheEncoding) {
    let Some(wrapper) = slot_el.child_mut(from.wrapper_name()) else {
        return;
    };
    wrapper.name = wrapper.sibling_name(to.wrapper_name());

    let cache = if from.mode == EncodingMode::ReferenceBacked {
        match wrapper.child_mut(from.cache_name()) {
            Some(cache) => {
                cache.name = cache.sibling_name(to.cache_name());
                Some(cache)
            }
            None => None,
        }
    } else {
        Some(wrapper)
    };

    if let Some(cache) = cache {
        if to.kind == CacheValueKind::Text {
            cache.remove_children_named("formatCode");
        }
    }
}

/// Replaces every point of a cache node, keeping `ptCount` in sync.
fn fill_cache(cache: &mut XmlElement, values: SlotValues<'_>, is_number: bool) {
    cache.remove_children_named("pt");

    if is_number && !cache.has_child("formatCode") {
        let format_code = XmlElement::new(cache.sibling_name("formatCode")).with_text("General");
        cache.children.insert(0, XmlNode::Element(format_code));
    }

    let count = values.len().to_string();
    match cache.child_mut("ptCount") {
        Some(pt_count) => pt_count.set_attr("val", count),
        None => {
            let pt_count = XmlElement::new(cache.sibling_name("ptCount")).with_attr("val", count);
            let at = cache.child_position("formatCode").map(|idx| idx + 1).unwrap_or(0);
            cache.children.insert(at, XmlNode::Element(pt_count));
        }
    }

    let mut at = cache
        .child_position("extLst")
        .unwrap_or(cache.children.len());
    for idx in 0..values.len() {
        let v = XmlElement::new(cache.sibling_name("v")).with_text(values.text_at(idx));
        let pt = XmlElement::new(cache.sibling_name("pt"))
            .with_attr("idx", idx.to_string())
            .with_child(v);
        cache.children.insert(at, XmlNode::Element(pt));
        at += 1;
    }
}

/// Keeps a bubble series' size cache aligned with its point count.
fn resize_bubble_sizes(ser: &mut XmlElement, len: usize) {
    let Some(bubble) = ser.child("bubbleSize") else {
        return;
    };
    let encoding = bubble
        .elements()
        .find_map(|el| CacheEncoding::from_wrapper_name(el.local_name()));
    let existing = encoding
        .and_then(|enc| {
            let wrapper = bubble.child(enc.wrapper_name())?;
            if enc.mode == EncodingMode::Literal {
                Some(wrapper)
            } else {
                wrapper.child(enc.cache_name())
            }
        })
        .map(|cache| read_points(cache, "bubbleSize", &mut Vec::new()))
        .unwrap_or_default();

    let sizes: Vec<Option<f64>> = (0..len)
        .map(|idx| {
            existing
                .get(idx)
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .or(Some(DEFAULT_BUBBLE_SIZE))
        })
        .collect();
    write_slot(
        ser,
        "bubbleSize",
        AFTER_BUBBLE_SIZE,
        encoding.map(|enc| CacheEncoding::new(enc.mode, CacheValueKind::Number)),
        SlotValues::Numbers(&sizes),
    );
}

/// Decimal text for a cache value: shortest round-trip form, `-0` normalized to `0`.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    value.to_string()
}
