//! Relationship index (`_rels/*.rels`) parsing and serialization.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::Document;

use crate::error::{ChartFillError, Result};

pub const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
pub const OFFICE_DOC_RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Embedded `.xlsx` package.
pub const REL_TYPE_PACKAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/package";
/// Embedded OLE object, used for `.xls` workbooks.
pub const REL_TYPE_OLE_OBJECT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/oleObject";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub type_: String,
    pub target: String,
    pub target_mode: Option<String>,
}

impl Relationship {
    pub fn is_external(&self) -> bool {
        self.target_mode
            .as_deref()
            .is_some_and(|mode| mode.eq_ignore_ascii_case("External"))
    }

    /// Whether this relationship points at spreadsheet data backing a chart.
    pub fn is_spreadsheet_data(&self) -> bool {
        self.type_ == REL_TYPE_PACKAGE || self.type_ == REL_TYPE_OLE_OBJECT
    }
}

/// The relationships of one source part, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelationshipIndex {
    rels: Vec<Relationship>,
}

impl RelationshipIndex {
    pub fn parse(xml: &[u8], part_name: &str) -> Result<Self> {
        let xml = std::str::from_utf8(xml).map_err(|source| ChartFillError::XmlNonUtf8 {
            part_name: part_name.to_string(),
            source,
        })?;
        let doc = Document::parse(xml).map_err(|source| ChartFillError::Relationships {
            part_name: part_name.to_string(),
            source,
        })?;

        let mut rels = Vec::new();
        for node in doc.descendants().filter(|n| n.is_element()) {
            if node.tag_name().name() != "Relationship" {
                continue;
            }

            let id = match node.attribute("Id") {
                Some(id) => id.to_string(),
                None => continue,
            };
            let type_ = node.attribute("Type").unwrap_or_default().to_string();
            let target = node.attribute("Target").unwrap_or_default().to_string();
            let target_mode = node.attribute("TargetMode").map(str::to_string);
            rels.push(Relationship {
                id,
                type_,
                target,
                target_mode,
            });
        }

        Ok(Self { rels })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    pub fn len(&self) -> usize {
        self.rels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|rel| rel.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Relationship> {
        self.rels.iter_mut().find(|rel| rel.id == id)
    }

    pub fn push(&mut self, rel: Relationship) {
        self.rels.push(rel);
    }

    /// Remove every relationship matching `pred`, returning them in document order.
    pub fn remove_where<F>(&mut self, mut pred: F) -> Vec<Relationship>
    where
        F: FnMut(&Relationship) -> bool,
    {
        let mut removed = Vec::new();
        self.rels.retain(|rel| {
            if pred(rel) {
                removed.push(rel.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Next free `rIdN`, one past the highest numeric id in use.
    ///
    /// When the highest id is `u64::MAX`, the lowest unused number is taken instead.
    pub fn next_r_id(&self) -> String {
        let used: Vec<u64> = self
            .rels
            .iter()
            .filter_map(|rel| rel.id.strip_prefix("rId")?.parse::<u64>().ok())
            .collect();
        let max = used.iter().copied().max().unwrap_or(0);
        let next = match max.checked_add(1) {
            Some(next) => next,
            None => (1u64..).find(|n| !used.contains(n)).unwrap_or(1),
        };
        format!("rId{next}")
    }

    pub fn to_xml(&self, part_name: &str) -> Result<Vec<u8>> {
        let write_err = |err: std::io::Error| ChartFillError::XmlWrite {
            part_name: part_name.to_string(),
            message: err.to_string(),
        };

        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(write_err)?;
        writer
            .write_event(Event::Text(BytesText::from_escaped("\n")))
            .map_err(write_err)?;

        let mut root = BytesStart::new("Relationships");
        root.push_attribute(("xmlns", RELATIONSHIPS_NS));
        if self.rels.is_empty() {
            writer.write_event(Event::Empty(root)).map_err(write_err)?;
            return Ok(writer.into_inner());
        }
        writer.write_event(Event::Start(root)).map_err(write_err)?;
        for rel in &self.rels {
            let mut el = BytesStart::new("Relationship");
            el.push_attribute(("Id", rel.id.as_str()));
            el.push_attribute(("Type", rel.type_.as_str()));
            el.push_attribute(("Target", rel.target.as_str()));
            if let Some(mode) = &rel.target_mode {
                el.push_attribute(("TargetMode", mode.as_str()));
            }
            writer.write_event(Event::Empty(el)).map_err(write_err)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("Relationships")))
            .map_err(write_err)?;
        Ok(writer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/package" Target="../embeddings/Microsoft_Excel_Worksheet.xlsx"/>
  <Relationship Id="rId7" Type="http://schemas.microsoft.com/office/2011/relationships/chartStyle" Target="style1.xml"/>
  <Relationship Id="linkX" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/oleObject" Target="file:///C:/book.xls" TargetMode="External"/>
</Relationships>"#;

    #[test]
    fn parses_ids_types_and_modes() {
        let rels = RelationshipIndex::parse(RELS.as_bytes(), "chart1.xml.rels").unwrap();
        assert_eq!(rels.len(), 3);
        assert!(rels.get("rId2").unwrap().is_spreadsheet_data());
        assert!(!rels.get("rId7").unwrap().is_spreadsheet_data());
        assert!(rels.get("linkX").unwrap().is_external());
    }

    #[test]
    fn next_r_id_skips_non_numeric_ids() {
        let rels = RelationshipIndex::parse(RELS.as_bytes(), "chart1.xml.rels").unwrap();
        assert_eq!(rels.next_r_id(), "rId8");
        assert_eq!(RelationshipIndex::default().next_r_id(), "rId1");
    }

    #[test]
    fn next_r_id_handles_ids_at_the_integer_limits() {
        let rels_with = |ids: &[&str]| {
            let mut xml = String::from(
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            );
            for id in ids {
                xml.push_str(&format!(
                    r#"<Relationship Id="{id}" Type="urn:t" Target="a.xml"/>"#
                ));
            }
            xml.push_str("</Relationships>");
            RelationshipIndex::parse(xml.as_bytes(), "chart1.xml.rels").unwrap()
        };

        assert_eq!(rels_with(&["rId4294967295"]).next_r_id(), "rId4294967296");
        assert_eq!(
            rels_with(&["rId1", "rId18446744073709551615"]).next_r_id(),
            "rId2"
        );
        // Too large for any integer: treated like a non-numeric id.
        assert_eq!(rels_with(&["rId99999999999999999999999"]).next_r_id(), "rId1");
    }

    #[test]
    fn serialized_index_parses_back() {
        let mut rels = RelationshipIndex::parse(RELS.as_bytes(), "chart1.xml.rels").unwrap();
        let removed = rels.remove_where(|rel| rel.id == "rId7");
        assert_eq!(removed.len(), 1);

        let xml = rels.to_xml("chart1.xml.rels").unwrap();
        let reparsed = RelationshipIndex::parse(&xml, "chart1.xml.rels").unwrap();
        assert_eq!(reparsed, rels);
    }

    #[test]
    fn invalid_xml_is_a_relationships_error() {
        let err = RelationshipIndex::parse(b"<Relationships>", "chart1.xml.rels").unwrap_err();
        assert!(matches!(err, ChartFillError::Relationships { .. }));
    }
}
