#![allow(dead_code)]

use chartfill::{classify, read_cache, CacheRead, ChartDocument};

pub const CHART_PART: &str = "xl/charts/chart1.xml";

/// Wraps plot-area content in a minimal linked `chartSpace`.
pub fn chart_space(plot_area: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<c:chartSpace xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <c:chart>
    <c:plotArea>
      {plot_area}
      <c:catAx><c:axId val="1"/></c:catAx>
    </c:plotArea>
  </c:chart>
  <c:externalData r:id="rId1"><c:autoUpdate val="0"/></c:externalData>
</c:chartSpace>"#
    )
}

/// Bar chart with reference-backed category and value caches.
pub fn bar_chart_ref(labels: &[&str], series: &[(&str, &[f64])]) -> String {
    let mut sers = String::new();
    for (pos, (name, values)) in series.iter().enumerate() {
        sers.push_str(&format!(
            r#"<c:ser><c:idx val="{pos}"/><c:order val="{pos}"/>
  <c:tx><c:strRef><c:f>Sheet1!$B$1</c:f><c:strCache><c:ptCount val="1"/><c:pt idx="0"><c:v>{name}</c:v></c:pt></c:strCache></c:strRef></c:tx>
  <c:cat><c:strRef><c:f>Sheet1!$A$2:$A$9</c:f>{}</c:strRef></c:cat>
  <c:val><c:numRef><c:f>Sheet1!$B$2:$B$9</c:f>{}</c:numRef></c:val>
</c:ser>"#,
            str_points("strCache", labels),
            num_points("numCache", values),
        ));
    }
    chart_space(&format!(
        r#"<c:barChart><c:barDir val="col"/><c:grouping val="clustered"/>{sers}<c:gapWidth val="150"/><c:axId val="1"/><c:axId val="2"/></c:barChart>"#
    ))
}

/// Bar chart with literal (`strLit`/`numLit`) caches and `c:tx/c:v` names.
pub fn bar_chart_lit(labels: &[&str], series: &[(&str, &[f64])]) -> String {
    let mut sers = String::new();
    for (pos, (name, values)) in series.iter().enumerate() {
        sers.push_str(&format!(
            r#"<c:ser><c:idx val="{pos}"/><c:order val="{pos}"/><c:tx><c:v>{name}</c:v></c:tx><c:cat>{}</c:cat><c:val>{}</c:val></c:ser>"#,
            str_points("strLit", labels),
            num_points("numLit", values),
        ));
    }
    chart_space(&format!(r#"<c:barChart><c:barDir val="col"/>{sers}<c:axId val="1"/></c:barChart>"#))
}

/// Scatter chart with reference-backed x/y caches.
pub fn scatter_chart_ref(series: &[(&str, &[f64], &[f64])]) -> String {
    let mut sers = String::new();
    for (pos, (name, x, y)) in series.iter().enumerate() {
        sers.push_str(&format!(
            r#"<c:ser><c:idx val="{pos}"/><c:order val="{pos}"/><c:tx><c:v>{name}</c:v></c:tx>
  <c:xVal><c:numRef><c:f>Sheet1!$A$2:$A$9</c:f>{}</c:numRef></c:xVal>
  <c:yVal><c:numRef><c:f>Sheet1!$B$2:$B$9</c:f>{}</c:numRef></c:yVal>
  <c:smooth val="0"/>
</c:ser>"#,
            num_points("numCache", x),
            num_points("numCache", y),
        ));
    }
    chart_space(&format!(
        r#"<c:scatterChart><c:scatterStyle val="lineMarker"/>{sers}<c:axId val="1"/></c:scatterChart>"#
    ))
}

fn str_points(tag: &str, labels: &[&str]) -> String {
    let mut out = format!(r#"<c:{tag}><c:ptCount val="{}"/>"#, labels.len());
    for (idx, label) in labels.iter().enumerate() {
        out.push_str(&format!(r#"<c:pt idx="{idx}"><c:v>{label}</c:v></c:pt>"#));
    }
    out.push_str(&format!("</c:{tag}>"));
    out
}

fn num_points(tag: &str, values: &[f64]) -> String {
    let mut out = format!(
        r#"<c:{tag}><c:formatCode>General</c:formatCode><c:ptCount val="{}"/>"#,
        values.len()
    );
    for (idx, value) in values.iter().enumerate() {
        out.push_str(&format!(r#"<c:pt idx="{idx}"><c:v>{value}</c:v></c:pt>"#));
    }
    out.push_str(&format!("</c:{tag}>"));
    out
}

pub fn parse(xml: &str) -> ChartDocument {
    ChartDocument::parse(CHART_PART, xml.as_bytes()).expect("parse chart part")
}

pub fn read(doc: &ChartDocument) -> CacheRead {
    let kind = classify(doc).expect("classify chart");
    read_cache(doc, kind)
}

/// Every `ptCount` in the part paired with the number of sibling `pt` elements.
pub fn count_pairs(xml: &[u8]) -> Vec<(usize, usize)> {
    let text = std::str::from_utf8(xml).expect("utf-8");
    let doc = roxmltree::Document::parse(text).expect("well-formed output");
    doc.descendants()
        .filter(|n| n.tag_name().name() == "ptCount")
        .map(|count| {
            let declared = count
                .attribute("val")
                .and_then(|v| v.parse().ok())
                .expect("ptCount/@val");
            let parent = count.parent_element().expect("cache node");
            let present = parent
                .children()
                .filter(|n| n.tag_name().name() == "pt")
                .count();
            (declared, present)
        })
        .collect()
}
