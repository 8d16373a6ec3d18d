//! External data link management.
//!
//! A chart part may carry `c:externalData r:id="..."`, joined through its relationship index to
//! the spreadsheet that originally fed it. After a fill that spreadsheet is stale, so the link is
//! either removed (the cache becomes the sole data source) or re-pointed at a fresh snapshot.

use serde::Serialize;

use crate::classify::series_paths;
use crate::document::ChartDocument;
use crate::error::{ChartFillError, Result};
use crate::model::CacheModel;
use crate::path::{part_stem, rels_for_part, resolve_target};
use crate::policy::{FillPolicy, SnapshotFormat};
use crate::relationships::{
    Relationship, RelationshipIndex, OFFICE_DOC_RELATIONSHIPS_NS, REL_TYPE_OLE_OBJECT,
    REL_TYPE_PACKAGE,
};
use crate::snapshot::{series_refs, write_snapshot, SeriesRefs, Snapshot};
use crate::xml::{local_name, XmlElement, XmlNode};

/// `chartSpace` children that follow `externalData` in schema order.
const AFTER_EXTERNAL_DATA: &[&str] = &["printSettings", "userShapes", "extLst"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDataLink {
    pub rel_id: String,
    /// `None` when the relationship index has no entry for `rel_id`.
    pub target: Option<String>,
    pub rel_type: Option<String>,
    pub target_mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum LinkState {
    Linked(ExternalDataLink),
    Unlinked,
}

impl LinkState {
    pub fn is_linked(&self) -> bool {
        matches!(self, LinkState::Linked(_))
    }
}

/// Result of [`apply_link_policy`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinkOutcome {
    pub state: LinkState,
    /// Rewritten relationship index; `None` means the part should be deleted (or never existed).
    pub rels_xml: Option<Vec<u8>>,
    /// Resolved part names of internal targets no longer referenced by the chart.
    pub removed_targets: Vec<String>,
    pub snapshot: Option<Snapshot>,
}

/// Report whether `doc` is linked to external data, joined with `rels` when available.
pub fn link_state(doc: &ChartDocument, rels: Option<&RelationshipIndex>) -> LinkState {
    let Some(rel_id) = doc
        .root()
        .child("externalData")
        .and_then(|el| el.attr_local("id"))
    else {
        return LinkState::Unlinked;
    };
    let rel = rels.and_then(|rels| rels.get(rel_id));
    LinkState::Linked(ExternalDataLink {
        rel_id: rel_id.to_string(),
        target: rel.map(|rel| rel.target.clone()),
        rel_type: rel.map(|rel| rel.type_.clone()),
        target_mode: rel.and_then(|rel| rel.target_mode.clone()),
    })
}

/// Deterministic relationship target of the snapshot for chart part `part_name`.
pub fn snapshot_target(part_name: &str, format: SnapshotFormat) -> String {
    let stem = part_stem(part_name);
    match format {
        SnapshotFormat::PackagedSpreadsheet => {
            format!("../embeddings/Microsoft_Excel_Worksheet_{stem}.xlsx")
        }
        SnapshotFormat::LegacyBinary => {
            format!("../embeddings/Microsoft_Excel_97-2003_Worksheet_{stem}.xls")
        }
    }
}

fn relationship_type(format: SnapshotFormat) -> &'static str {
    match format {
        SnapshotFormat::PackagedSpreadsheet => REL_TYPE_PACKAGE,
        SnapshotFormat::LegacyBinary => REL_TYPE_OLE_OBJECT,
    }
}

/// Bring the document's external data link in line with `policy`.
///
/// `model` is the final cache model; it feeds the snapshot when one is emitted.
pub fn apply_link_policy(
    doc: &mut ChartDocument,
    rels_xml: Option<&[u8]>,
    model: &CacheModel,
    policy: &FillPolicy,
    part_name: &str,
) -> Result<LinkOutcome> {
    let rels_part = rels_for_part(part_name);
    let rels = match rels_xml {
        Some(bytes) => Some(RelationshipIndex::parse(bytes, &rels_part)?),
        None => None,
    };

    if policy.keep_external_link {
        keep_link(doc, rels, model, policy, part_name, &rels_part)
    } else {
        unlink(doc, rels, part_name, &rels_part)
    }
}

fn unlink(
    doc: &mut ChartDocument,
    rels: Option<RelationshipIndex>,
    part_name: &str,
    rels_part: &str,
) -> Result<LinkOutcome> {
    let linked_id = doc
        .root()
        .child("externalData")
        .and_then(|el| el.attr_local("id"))
        .map(str::to_string);
    let removed_elements = doc.root_mut().remove_children_named("externalData");

    let Some(mut rels) = rels else {
        if removed_elements > 0 {
            log::debug!("{part_name}: removed external data link (no relationship index)");
        }
        return Ok(LinkOutcome {
            state: LinkState::Unlinked,
            rels_xml: None,
            removed_targets: Vec::new(),
            snapshot: None,
        });
    };

    let removed = rels.remove_where(|rel| {
        linked_id.as_deref() == Some(rel.id.as_str()) || rel.is_spreadsheet_data()
    });
    let removed_targets = internal_targets(part_name, &removed);
    if removed_elements > 0 || !removed.is_empty() {
        log::debug!(
            "{part_name}: unlinked external data ({} relationship(s) removed)",
            removed.len()
        );
    }

    let rels_xml = if rels.is_empty() {
        None
    } else {
        Some(rels.to_xml(rels_part)?)
    };
    Ok(LinkOutcome {
        state: LinkState::Unlinked,
        rels_xml,
        removed_targets,
        snapshot: None,
    })
}

fn keep_link(
    doc: &mut ChartDocument,
    rels: Option<RelationshipIndex>,
    model: &CacheModel,
    policy: &FillPolicy,
    part_name: &str,
    rels_part: &str,
) -> Result<LinkOutcome> {
    if !doc.is_chart_space() {
        return Err(ChartFillError::LinkStateConflict(format!(
            "{part_name}: root element <{}> cannot anchor c:externalData",
            doc.root().name
        )));
    }

    let mut rels = rels.unwrap_or_default();
    let existing_id = doc
        .root()
        .child("externalData")
        .and_then(|el| el.attr_local("id"))
        .map(str::to_string);

    // Reuse the linked id, else an existing spreadsheet relationship, else allocate.
    let rel_id = existing_id
        .filter(|id| !id.is_empty())
        .or_else(|| {
            rels.iter()
                .find(|rel| rel.is_spreadsheet_data())
                .map(|rel| rel.id.clone())
        })
        .unwrap_or_else(|| rels.next_r_id());

    let format = policy.external_snapshot_format;
    // Without a snapshot the target is still the deterministic one, in the flavor the existing
    // relationship already uses; the caller is responsible for supplying that part.
    let target_format = format.unwrap_or_else(|| match rels.get(&rel_id) {
        Some(existing) if existing.type_ == REL_TYPE_OLE_OBJECT => SnapshotFormat::LegacyBinary,
        Some(_) => SnapshotFormat::PackagedSpreadsheet,
        None => {
            log::warn!("{part_name}: keeping an external data link without a snapshot");
            SnapshotFormat::PackagedSpreadsheet
        }
    });
    let target = snapshot_target(part_name, target_format);
    let rel_type = relationship_type(target_format).to_string();

    // Exactly one spreadsheet relationship survives; the others are orphaned.
    let mut removed = rels.remove_where(|rel| rel.id != rel_id && rel.is_spreadsheet_data());
    match rels.get_mut(&rel_id) {
        Some(rel) => {
            let new_resolved = resolve_target(part_name, &target);
            if !rel.is_external() && resolve_target(part_name, &rel.target) != new_resolved {
                removed.push(rel.clone());
            }
            rel.target = target.clone();
            rel.type_ = rel_type.clone();
            rel.target_mode = None;
        }
        None => rels.push(Relationship {
            id: rel_id.clone(),
            type_: rel_type.clone(),
            target: target.clone(),
            target_mode: None,
        }),
    }
    let removed_targets = internal_targets(part_name, &removed);

    let r_prefix = ensure_relationships_prefix(doc.root_mut());
    ensure_external_data(doc.root_mut(), &format!("{r_prefix}:id"), &rel_id);

    let snapshot = match format {
        Some(format) => {
            let bytes = write_snapshot(model, format)?;
            rewrite_formulas(doc, model);
            Some(Snapshot {
                part_name: resolve_target(part_name, &target),
                target: target.clone(),
                format,
                bytes,
            })
        }
        None => None,
    };

    log::debug!("{part_name}: external data link kept as {rel_id} -> {target}");

    let state = link_state(doc, Some(&rels));
    Ok(LinkOutcome {
        state,
        rels_xml: Some(rels.to_xml(rels_part)?),
        removed_targets,
        snapshot,
    })
}

fn internal_targets(part_name: &str, rels: &[Relationship]) -> Vec<String> {
    let mut out: Vec<String> = rels
        .iter()
        .filter(|rel| !rel.is_external() && !rel.target.is_empty())
        .map(|rel| resolve_target(part_name, &rel.target))
        .collect();
    out.dedup();
    out
}

/// Prefix bound to the relationships namespace on `root`, declaring `xmlns:r` when absent.
fn ensure_relationships_prefix(root: &mut XmlElement) -> String {
    let bound = root.attrs.iter().find_map(|(key, value)| {
        let prefix = key.strip_prefix("xmlns:")?;
        (value == OFFICE_DOC_RELATIONSHIPS_NS).then(|| prefix.to_string())
    });
    if let Some(prefix) = bound {
        return prefix;
    }

    let mut prefix = "r".to_string();
    let mut n = 1;
    while root.attr(&format!("xmlns:{prefix}")).is_some() {
        prefix = format!("r{n}");
        n += 1;
    }
    root.set_attr(format!("xmlns:{prefix}"), OFFICE_DOC_RELATIONSHIPS_NS);
    prefix
}

/// Leave exactly one `externalData` child pointing at `rel_id`, with auto-update disabled.
fn ensure_external_data(root: &mut XmlElement, id_attr: &str, rel_id: &str) {
    dedupe_children(root, "externalData");
    let external_data = root.ensure_child("externalData", AFTER_EXTERNAL_DATA);
    external_data
        .attrs
        .retain(|(key, _)| key.starts_with("xmlns") || local_name(key) != "id");
    external_data.set_attr(id_attr, rel_id);

    dedupe_children(external_data, "autoUpdate");
    external_data
        .ensure_child("autoUpdate", &[])
        .set_attr("val", "0");
}

/// Drop every `local` child after the first.
fn dedupe_children(el: &mut XmlElement, local: &str) {
    let mut seen = false;
    el.children.retain(|node| match node {
        XmlNode::Element(child) if child.is(local) => !std::mem::replace(&mut seen, true),
        _ => true,
    });
}

/// Point every reference-backed cache formula at the snapshot sheet.
fn rewrite_formulas(doc: &mut ChartDocument, model: &CacheModel) {
    let refs = series_refs(model);
    let paths = series_paths(doc.root(), model.kind());
    let root = doc.root_mut();
    for (path, series_refs) in paths.iter().zip(&refs) {
        let Some(ser) = root.at_path_mut(path) else {
            continue;
        };
        rewrite_series(ser, series_refs);
    }
}

fn rewrite_series(ser: &mut XmlElement, refs: &SeriesRefs) {
    if let Some(str_ref) = ser.child_mut("tx").and_then(|tx| tx.child_mut("strRef")) {
        set_formula(str_ref, &refs.name);
    }
    let slots = [
        ("cat", refs.category.as_deref()),
        ("val", refs.values.as_deref()),
        ("xVal", refs.x.as_deref()),
        ("yVal", refs.y.as_deref()),
    ];
    for (slot, formula) in slots {
        let Some(formula) = formula else {
            continue;
        };
        let Some(slot_el) = ser.child_mut(slot) else {
            continue;
        };
        for wrapper in slot_el.elements_mut() {
            if wrapper.is("strRef") || wrapper.is("numRef") {
                set_formula(wrapper, formula);
            }
        }
    }
}

fn set_formula(wrapper: &mut XmlElement, formula: &str) {
    let f = wrapper.ensure_child("f", &["strCache", "numCache", "extLst"]);
    f.set_text(formula);
}
