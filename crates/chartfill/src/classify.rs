//! Chart type classification: which cache shape a chart part uses.

use crate::document::ChartDocument;
use crate::error::{ChartFillError, Result};
use crate::model::ChartKind;
use crate::xml::XmlElement;

/// Categorical plot containers, in probe priority order.
pub const CATEGORICAL_CONTAINERS: &[&str] = &[
    "barChart",
    "bar3DChart",
    "lineChart",
    "line3DChart",
    "pieChart",
    "pie3DChart",
    "ofPieChart",
    "doughnutChart",
    "areaChart",
    "area3DChart",
    "radarChart",
];

/// Point-pair plot containers, probed after every categorical container.
pub const XY_CONTAINERS: &[&str] = &["scatterChart", "bubbleChart"];

pub fn containers_for(kind: ChartKind) -> &'static [&'static str] {
    match kind {
        ChartKind::Categorical => CATEGORICAL_CONTAINERS,
        ChartKind::Xy => XY_CONTAINERS,
    }
}

/// Determine the [`ChartKind`] of a chart part.
///
/// The first known plot container found (categorical family first) decides. A part with no
/// known container is rejected rather than guessed at.
pub fn classify(doc: &ChartDocument) -> Result<ChartKind> {
    let root = doc.root();
    let probe = [
        (ChartKind::Categorical, CATEGORICAL_CONTAINERS),
        (ChartKind::Xy, XY_CONTAINERS),
    ];
    for (kind, containers) in probe {
        for container in containers {
            if root.is(container) || root.find_descendant(container).is_some() {
                log::debug!(
                    "{}: classified as {kind:?} via <{container}>",
                    doc.part_name()
                );
                return Ok(kind);
            }
        }
    }

    Err(ChartFillError::UnsupportedChartKind {
        part_name: doc.part_name().to_string(),
        expected: CATEGORICAL_CONTAINERS
            .iter()
            .chain(XY_CONTAINERS)
            .copied()
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Child-index paths of every plot container of `kind`'s family, in document order.
pub(crate) fn container_paths(root: &XmlElement, kind: ChartKind) -> Vec<Vec<usize>> {
    let names = containers_for(kind);
    if names.contains(&root.local_name()) {
        return vec![Vec::new()];
    }
    root.descendant_paths(&|el: &XmlElement| names.contains(&el.local_name()))
}

/// Child-index paths of every `ser` element under the plot containers of `kind`.
pub(crate) fn series_paths(root: &XmlElement, kind: ChartKind) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    for container_path in container_paths(root, kind) {
        let Some(container) = root.at_path(&container_path) else {
            continue;
        };
        for (idx, node) in container.children.iter().enumerate() {
            if matches!(node, crate::xml::XmlNode::Element(el) if el.is("ser")) {
                let mut path = container_path.clone();
                path.push(idx);
                out.push(path);
            }
        }
    }
    out
}
