use crate::model::ChartKind;

/// Errors surfaced by the chart-cache engine.
///
/// Classification and link-state failures abort the whole fill for a document; per-series
/// cache anomalies never show up here (they degrade to empty series plus a
/// [`crate::model::CacheDiagnostic`]).
#[derive(Debug, thiserror::Error)]
pub enum ChartFillError {
    #[error("part is not valid UTF-8: {part_name}: {source}")]
    XmlNonUtf8 {
        part_name: String,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("failed to parse XML: {part_name}: {source}")]
    XmlParse {
        part_name: String,
        #[source]
        source: quick_xml::Error,
    },
    #[error("failed to write XML: {part_name}: {message}")]
    XmlWrite { part_name: String, message: String },
    #[error("invalid XML structure: {0}")]
    XmlStructure(String),
    #[error("{part_name}: no supported plot container found (expected one of {expected})")]
    UnsupportedChartKind {
        part_name: String,
        expected: String,
    },
    #[error("malformed cache node at {location}: {message}")]
    MalformedCacheNode { location: String, message: String },
    #[error("cannot keep external data link: {0}")]
    LinkStateConflict(String),
    #[error(
        "series {series} has {actual} values but its axis has {expected} entries after merge"
    )]
    LengthMismatch {
        series: usize,
        expected: usize,
        actual: usize,
    },
    #[error("{labels} category labels but no series to hold them")]
    LabelsWithoutSeries { labels: usize },
    #[error("cannot merge {incoming:?} data into a {original:?} cache")]
    KindMismatch {
        original: ChartKind,
        incoming: ChartKind,
    },
    #[error("{part_name}: payload shape is {payload:?} but the chart is {chart:?}")]
    PayloadKindMismatch {
        part_name: String,
        chart: ChartKind,
        payload: ChartKind,
    },
    #[error("invalid relationships part {part_name}: {source}")]
    Relationships {
        part_name: String,
        #[source]
        source: roxmltree::Error,
    },
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot is too large for the legacy binary format: {0}")]
    TooLarge(String),
}

pub type Result<T, E = ChartFillError> = std::result::Result<T, E>;
