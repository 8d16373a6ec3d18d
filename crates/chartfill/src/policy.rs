//! Per-call fill configuration.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Container format of the snapshot workbook written next to a linked chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotFormat {
    /// `.xls`: BIFF8 workbook stream inside a compound file (`oleObject` relationship).
    LegacyBinary,
    /// `.xlsx`: ZIP/OPC workbook (`package` relationship).
    PackagedSpreadsheet,
}

impl SnapshotFormat {
    pub fn extension(self) -> &'static str {
        match self {
            SnapshotFormat::LegacyBinary => "xls",
            SnapshotFormat::PackagedSpreadsheet => "xlsx",
        }
    }
}

/// Explicit policy for one [`crate::fill_chart`] call. Nothing is discovered ambiently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FillPolicy {
    /// Merge against the original cache instead of overwriting it.
    pub keep_original_for_missing: bool,
    /// Offset for synthesized x-values: position `i` gets `axis_synthesis_base + 1 + i`.
    pub axis_synthesis_base: i64,
    /// Keep (and normalize) the external data link instead of removing it.
    pub keep_external_link: bool,
    /// Snapshot to emit while keeping the link; `None` keeps the link without a snapshot.
    #[serde(
        serialize_with = "serialize_snapshot_format",
        deserialize_with = "deserialize_snapshot_format"
    )]
    pub external_snapshot_format: Option<SnapshotFormat>,
}

impl Default for FillPolicy {
    fn default() -> Self {
        Self {
            keep_original_for_missing: false,
            axis_synthesis_base: 0,
            keep_external_link: false,
            external_snapshot_format: Some(SnapshotFormat::PackagedSpreadsheet),
        }
    }
}

impl FillPolicy {
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum SnapshotFormatSetting {
    None,
    #[serde(untagged)]
    Format(SnapshotFormat),
}

fn deserialize_snapshot_format<'de, D>(deserializer: D) -> Result<Option<SnapshotFormat>, D::Error>
where
    D: Deserializer<'de>,
{
    let setting = Option::<SnapshotFormatSetting>::deserialize(deserializer)?;
    Ok(match setting {
        Some(SnapshotFormatSetting::Format(format)) => Some(format),
        Some(SnapshotFormatSetting::None) | None => None,
    })
}

fn serialize_snapshot_format<S>(value: &Option<SnapshotFormat>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(format) => format.serialize(serializer),
        None => serializer.serialize_str("none"),
    }
}
