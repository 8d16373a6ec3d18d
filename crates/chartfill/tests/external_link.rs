mod common;

use chartfill::{
    apply_link_policy, link_state, ChartDocument, ChartFillError, FillPolicy, LinkState,
    RelationshipIndex, SnapshotFormat, REL_TYPE_OLE_OBJECT, REL_TYPE_PACKAGE,
};
use pretty_assertions::assert_eq;

const RELS_PART: &str = "xl/charts/_rels/chart1.xml.rels";

const LINKED_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/package" Target="../embeddings/Microsoft_Excel_Worksheet.xlsx"/>
  <Relationship Id="rId2" Type="http://schemas.microsoft.com/office/2011/relationships/chartStyle" Target="style1.xml"/>
</Relationships>"#;

const ONLY_LINK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/oleObject" Target="../embeddings/oleObject1.bin"/>
</Relationships>"#;

fn linked_doc() -> (ChartDocument, chartfill::CacheModel) {
    let xml = common::bar_chart_ref(&["A", "B"], &[("S", &[1.0, 2.0])]);
    let doc = common::parse(&xml);
    let model = common::read(&doc).model;
    (doc, model)
}

fn keep(format: Option<SnapshotFormat>) -> FillPolicy {
    FillPolicy {
        keep_external_link: true,
        external_snapshot_format: format,
        ..FillPolicy::default()
    }
}

#[test]
fn reports_linked_state_joined_with_relationships() {
    let (doc, _) = linked_doc();
    let rels = RelationshipIndex::parse(LINKED_RELS.as_bytes(), RELS_PART).unwrap();
    let LinkState::Linked(link) = link_state(&doc, Some(&rels)) else {
        panic!("expected linked");
    };
    assert_eq!(link.rel_id, "rId1");
    assert_eq!(link.rel_type.as_deref(), Some(REL_TYPE_PACKAGE));
    assert_eq!(
        link.target.as_deref(),
        Some("../embeddings/Microsoft_Excel_Worksheet.xlsx")
    );
}

#[test]
fn scenario_d_unlink_leaves_no_dangling_entries() {
    let (mut doc, model) = linked_doc();
    let outcome = apply_link_policy(
        &mut doc,
        Some(LINKED_RELS.as_bytes()),
        &model,
        &FillPolicy::default(),
        common::CHART_PART,
    )
    .unwrap();

    assert_eq!(outcome.state, LinkState::Unlinked);
    assert_eq!(link_state(&doc, None), LinkState::Unlinked);
    let xml = String::from_utf8(doc.to_bytes().unwrap()).unwrap();
    assert!(!xml.contains("externalData"), "{xml}");

    let rels_xml = outcome.rels_xml.expect("chart style relationship remains");
    let rels = RelationshipIndex::parse(&rels_xml, RELS_PART).unwrap();
    assert_eq!(rels.len(), 1);
    assert!(rels.iter().all(|rel| !rel.is_spreadsheet_data()));
    assert_eq!(
        outcome.removed_targets,
        vec!["xl/embeddings/Microsoft_Excel_Worksheet.xlsx".to_string()]
    );
    assert!(outcome.snapshot.is_none());
}

#[test]
fn unlinking_the_last_relationship_deletes_the_index() {
    let (mut doc, model) = linked_doc();
    let outcome = apply_link_policy(
        &mut doc,
        Some(ONLY_LINK_RELS.as_bytes()),
        &model,
        &FillPolicy::default(),
        common::CHART_PART,
    )
    .unwrap();
    assert_eq!(outcome.rels_xml, None);
    assert_eq!(outcome.removed_targets, vec!["xl/embeddings/oleObject1.bin".to_string()]);
}

#[test]
fn unlinking_without_an_index_is_allowed() {
    let (mut doc, model) = linked_doc();
    let outcome =
        apply_link_policy(&mut doc, None, &model, &FillPolicy::default(), common::CHART_PART)
            .unwrap();
    assert_eq!(outcome.rels_xml, None);
    assert!(outcome.removed_targets.is_empty());
}

#[test]
fn keeping_the_link_points_it_at_a_fresh_snapshot() {
    let (mut doc, model) = linked_doc();
    let outcome = apply_link_policy(
        &mut doc,
        Some(LINKED_RELS.as_bytes()),
        &model,
        &keep(Some(SnapshotFormat::PackagedSpreadsheet)),
        common::CHART_PART,
    )
    .unwrap();

    let LinkState::Linked(link) = &outcome.state else {
        panic!("expected linked");
    };
    assert_eq!(link.rel_id, "rId1");
    assert_eq!(
        link.target.as_deref(),
        Some("../embeddings/Microsoft_Excel_Worksheet_chart1.xlsx")
    );

    let snapshot = outcome.snapshot.as_ref().expect("snapshot");
    assert_eq!(
        snapshot.part_name,
        "xl/embeddings/Microsoft_Excel_Worksheet_chart1.xlsx"
    );
    assert!(snapshot.bytes.starts_with(b"PK"));
    // The previous embedding is orphaned now.
    assert_eq!(
        outcome.removed_targets,
        vec!["xl/embeddings/Microsoft_Excel_Worksheet.xlsx".to_string()]
    );

    let rels = RelationshipIndex::parse(outcome.rels_xml.as_deref().unwrap(), RELS_PART).unwrap();
    assert_eq!(rels.iter().filter(|rel| rel.is_spreadsheet_data()).count(), 1);
    assert_eq!(rels.len(), 2);

    let xml = String::from_utf8(doc.to_bytes().unwrap()).unwrap();
    assert_eq!(xml.matches("<c:externalData").count(), 1);
    assert!(xml.contains(r#"<c:autoUpdate val="0"/>"#), "{xml}");
    assert!(xml.contains("<c:f>Sheet1!$A$2:$A$3</c:f>"), "{xml}");
    assert!(xml.contains("<c:f>Sheet1!$B$2:$B$3</c:f>"), "{xml}");
    assert!(xml.contains("<c:f>Sheet1!$B$1</c:f>"), "{xml}");
}

#[test]
fn legacy_snapshot_uses_ole_object_relationship() {
    let (mut doc, model) = linked_doc();
    let outcome = apply_link_policy(
        &mut doc,
        None,
        &model,
        &keep(Some(SnapshotFormat::LegacyBinary)),
        common::CHART_PART,
    )
    .unwrap();

    let rels = RelationshipIndex::parse(outcome.rels_xml.as_deref().unwrap(), RELS_PART).unwrap();
    let rel = rels.get("rId1").expect("relationship for existing r:id");
    assert_eq!(rel.type_, REL_TYPE_OLE_OBJECT);
    assert_eq!(
        rel.target,
        "../embeddings/Microsoft_Excel_97-2003_Worksheet_chart1.xls"
    );
    assert_eq!(
        outcome.snapshot.map(|s| s.format),
        Some(SnapshotFormat::LegacyBinary)
    );
}

#[test]
fn keeping_a_link_on_an_unlinked_chart_creates_one() {
    let xml = r#"<c:chartSpace xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart">
      <c:chart><c:plotArea><c:pieChart>
        <c:ser><c:idx val="0"/><c:order val="0"/>
          <c:val><c:numLit><c:ptCount val="1"/><c:pt idx="0"><c:v>3</c:v></c:pt></c:numLit></c:val>
        </c:ser>
      </c:pieChart></c:plotArea></c:chart>
      <c:printSettings/>
    </c:chartSpace>"#;
    let mut doc = common::parse(xml);
    let model = common::read(&doc).model;
    let style_rels = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
      <Relationship Id="rId3" Type="http://schemas.microsoft.com/office/2011/relationships/chartColorStyle" Target="colors1.xml"/>
    </Relationships>"#;

    let outcome = apply_link_policy(
        &mut doc,
        Some(style_rels.as_bytes()),
        &model,
        &keep(None),
        common::CHART_PART,
    )
    .unwrap();

    let LinkState::Linked(link) = &outcome.state else {
        panic!("expected linked");
    };
    assert_eq!(link.rel_id, "rId4");
    assert!(outcome.snapshot.is_none());

    let out = String::from_utf8(doc.to_bytes().unwrap()).unwrap();
    assert!(
        out.contains(r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#),
        "{out}"
    );
    assert!(out.contains(r#"<c:externalData r:id="rId4">"#), "{out}");
    assert!(
        out.find("<c:externalData").unwrap() < out.find("<c:printSettings").unwrap(),
        "{out}"
    );
    // Literal caches have no formulas to rewrite.
    assert!(!out.contains("<c:f>"), "{out}");
}

#[test]
fn keeping_a_link_without_a_chart_space_root_conflicts() {
    let xml = r#"<c:plotArea xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart"><c:barChart/></c:plotArea>"#;
    let mut doc = common::parse(xml);
    let model = common::read(&doc).model;
    let err = apply_link_policy(
        &mut doc,
        None,
        &model,
        &keep(Some(SnapshotFormat::PackagedSpreadsheet)),
        common::CHART_PART,
    )
    .unwrap_err();
    assert!(matches!(err, ChartFillError::LinkStateConflict(_)));
}

#[test]
fn keeping_a_link_allocates_past_the_largest_relationship_id() {
    let xml = common::bar_chart_lit(&["A"], &[("S", &[1.0])]).replace(
        r#"<c:externalData r:id="rId1"><c:autoUpdate val="0"/></c:externalData>"#,
        "",
    );
    let mut doc = common::parse(&xml);
    let model = common::read(&doc).model;
    let rels = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
      <Relationship Id="rId4294967295" Type="http://schemas.microsoft.com/office/2011/relationships/chartStyle" Target="style1.xml"/>
    </Relationships>"#;

    let outcome = apply_link_policy(
        &mut doc,
        Some(rels.as_bytes()),
        &model,
        &keep(Some(SnapshotFormat::PackagedSpreadsheet)),
        common::CHART_PART,
    )
    .unwrap();

    let LinkState::Linked(link) = &outcome.state else {
        panic!("expected linked");
    };
    assert_eq!(link.rel_id, "rId4294967296");
    let rels = RelationshipIndex::parse(&outcome.rels_xml.unwrap(), RELS_PART).unwrap();
    assert_eq!(rels.len(), 2);
}

#[test]
fn keeping_a_link_without_snapshot_still_uses_the_embedded_target() {
    let (mut doc, model) = linked_doc();
    let rels = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
      <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/oleObject" Target="file:///C:/reports/book.xls" TargetMode="External"/>
    </Relationships>"#;

    let outcome = apply_link_policy(
        &mut doc,
        Some(rels.as_bytes()),
        &model,
        &keep(None),
        common::CHART_PART,
    )
    .unwrap();

    assert!(outcome.snapshot.is_none());
    assert!(outcome.removed_targets.is_empty());
    let rels = RelationshipIndex::parse(&outcome.rels_xml.unwrap(), RELS_PART).unwrap();
    let rel = rels.get("rId1").unwrap();
    assert_eq!(
        rel.target,
        "../embeddings/Microsoft_Excel_97-2003_Worksheet_chart1.xls"
    );
    assert_eq!(rel.type_, REL_TYPE_OLE_OBJECT);
    assert!(!rel.is_external());
}
