//! Chart cache synchronization for DrawingML chart parts.
//!
//! A chart part (`c:chartSpace`) carries a cached copy of the data it plots. This crate keeps
//! that cache in step with freshly computed data:
//!
//! - [`classify`] decides whether a part uses categorical or point-pair (XY) caches.
//! - [`read_cache`] extracts a [`CacheModel`] plus the [`CacheLayout`] (reference-backed vs
//!   literal encoding of every slot), degrading malformed series instead of failing.
//! - [`merge`] combines the original cache with incoming data under a [`FillPolicy`].
//! - [`write_cache`] commits a model back into the document, keeping point counts in sync.
//! - [`apply_link_policy`] removes the chart's external workbook link, or keeps it and points it
//!   at a freshly generated snapshot workbook (`.xlsx` or legacy `.xls`).
//!
//! [`fill_chart`] runs the whole pipeline for one part. Every call is a pure transform of its
//! inputs; nothing is cached between calls and no I/O happens inside the engine.

mod classify;
mod document;
mod error;
mod fill;
mod link;
mod merge;
mod model;
mod path;
mod payload;
mod policy;
mod read;
mod relationships;
pub mod snapshot;
mod write;
pub mod xml;

pub use classify::{classify, containers_for, CATEGORICAL_CONTAINERS, XY_CONTAINERS};
pub use document::ChartDocument;
pub use error::{ChartFillError, Result, SnapshotError};
pub use fill::{fill_chart, inspect_chart, ChartInspection, ChartPart, FillOutput};
pub use link::{
    apply_link_policy, link_state, snapshot_target, ExternalDataLink, LinkOutcome, LinkState,
};
pub use merge::merge;
pub use model::{
    CacheDiagnostic, CacheEncoding, CacheLayout, CacheModel, CacheValueKind, CategoricalData,
    CategoricalSeries, ChartKind, DiagnosticLevel, EncodingMode, SeriesLayout, XyData, XySeries,
};
pub use path::{part_stem, rels_for_part, resolve_target};
pub use payload::{CategoricalSeriesPayload, NewData, XySeriesPayload};
pub use policy::{FillPolicy, SnapshotFormat};
pub use read::{read_cache, CacheRead};
pub use relationships::{
    Relationship, RelationshipIndex, REL_TYPE_OLE_OBJECT, REL_TYPE_PACKAGE,
};
pub use snapshot::Snapshot;
pub use write::{format_number, write_cache};
