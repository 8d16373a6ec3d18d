use crate::error::Result;
use crate::xml::{XmlDocument, XmlElement};

/// A parsed chart part, exclusively owned for the duration of one engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartDocument {
    part_name: String,
    xml: XmlDocument,
}

impl ChartDocument {
    pub fn parse(part_name: &str, bytes: &[u8]) -> Result<Self> {
        let xml = XmlDocument::parse(part_name, bytes)?;
        Ok(Self {
            part_name: part_name.to_string(),
            xml,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.xml.to_bytes(&self.part_name)
    }

    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    pub fn root(&self) -> &XmlElement {
        &self.xml.root
    }

    pub fn root_mut(&mut self) -> &mut XmlElement {
        &mut self.xml.root
    }

    /// Whether the root is a `chartSpace`, the only element an external data link can hang off.
    pub fn is_chart_space(&self) -> bool {
        self.xml.root.is("chartSpace")
    }
}
