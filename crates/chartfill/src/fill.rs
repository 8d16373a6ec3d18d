//! One-call transform of a chart part: (document, new data, policy) -> (document', snapshot).

use serde::Serialize;

use crate::classify::classify;
use crate::document::ChartDocument;
use crate::error::{ChartFillError, Result};
use crate::link::{apply_link_policy, link_state, LinkState};
use crate::merge::merge;
use crate::model::{CacheDiagnostic, CacheLayout, CacheModel, ChartKind};
use crate::path::rels_for_part;
use crate::payload::NewData;
use crate::policy::FillPolicy;
use crate::read::read_cache;
use crate::relationships::RelationshipIndex;
use crate::snapshot::Snapshot;
use crate::write::write_cache;

/// Borrowed input for one chart part.
#[derive(Debug, Clone, Copy)]
pub struct ChartPart<'a> {
    /// OPC part name, e.g. `xl/charts/chart1.xml`.
    pub part_name: &'a str,
    pub xml: &'a [u8],
    /// Bytes of the part's relationship index, when it has one.
    pub rels_xml: Option<&'a [u8]>,
}

impl<'a> ChartPart<'a> {
    pub fn new(part_name: &'a str, xml: &'a [u8]) -> Self {
        Self {
            part_name,
            xml,
            rels_xml: None,
        }
    }

    pub fn with_rels(mut self, rels_xml: &'a [u8]) -> Self {
        self.rels_xml = Some(rels_xml);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FillOutput {
    pub kind: ChartKind,
    pub chart_xml: Vec<u8>,
    /// Rewritten relationship index; `None` means delete (or do not create) the rels part.
    pub rels_xml: Option<Vec<u8>>,
    pub snapshot: Option<Snapshot>,
    /// Internal parts (resolved names) the chart no longer references.
    pub removed_targets: Vec<String>,
    pub link: LinkState,
    /// Cache model as read before the fill.
    pub original: CacheModel,
    pub final_model: CacheModel,
    pub diagnostics: Vec<CacheDiagnostic>,
}

/// Fill one chart part with `data` under `policy`.
///
/// Classification, payload-shape and link-state errors abort the call; nothing is returned for
/// the part in that case.
pub fn fill_chart(part: ChartPart<'_>, data: &NewData, policy: &FillPolicy) -> Result<FillOutput> {
    let mut doc = ChartDocument::parse(part.part_name, part.xml)?;
    let kind = classify(&doc)?;
    let original = read_cache(&doc, kind);

    if data.kind() != kind {
        return Err(ChartFillError::PayloadKindMismatch {
            part_name: part.part_name.to_string(),
            chart: kind,
            payload: data.kind(),
        });
    }
    let incoming = data.to_model(policy);
    let final_model = merge(&original.model, &incoming, policy)?;

    write_cache(&mut doc, &original.layout, &final_model)?;
    let link = apply_link_policy(&mut doc, part.rels_xml, &final_model, policy, part.part_name)?;
    let chart_xml = doc.to_bytes()?;

    log::debug!(
        "{}: filled {kind:?} chart ({} -> {} series, link {})",
        part.part_name,
        original.model.series_count(),
        final_model.series_count(),
        if link.state.is_linked() { "kept" } else { "removed" }
    );

    Ok(FillOutput {
        kind,
        chart_xml,
        rels_xml: link.rels_xml,
        snapshot: link.snapshot,
        removed_targets: link.removed_targets,
        link: link.state,
        original: original.model,
        final_model,
        diagnostics: original.diagnostics,
    })
}

/// Read-only view of a chart part's cache and link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartInspection {
    pub part_name: String,
    pub kind: ChartKind,
    pub model: CacheModel,
    pub layout: CacheLayout,
    pub link: LinkState,
    pub diagnostics: Vec<CacheDiagnostic>,
}

pub fn inspect_chart(part: ChartPart<'_>) -> Result<ChartInspection> {
    let doc = ChartDocument::parse(part.part_name, part.xml)?;
    let kind = classify(&doc)?;
    let read = read_cache(&doc, kind);
    let rels = match part.rels_xml {
        Some(bytes) => Some(RelationshipIndex::parse(bytes, &rels_for_part(part.part_name))?),
        None => None,
    };
    Ok(ChartInspection {
        part_name: part.part_name.to_string(),
        kind,
        model: read.model,
        layout: read.layout,
        link: link_state(&doc, rels.as_ref()),
        diagnostics: read.diagnostics,
    })
}
