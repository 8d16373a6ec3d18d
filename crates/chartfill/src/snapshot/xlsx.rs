use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use zip::write::FileOptions;

use super::{col_to_name, SnapshotCell, SnapshotGrid, SNAPSHOT_SHEET_NAME};
use crate::error::SnapshotError;

/// Write a one-sheet `.xlsx` package holding `grid`.
///
/// Strings are stored inline (`t="inlineStr"`) so the package needs no shared-strings part.
pub fn write_packaged_spreadsheet(grid: &SnapshotGrid) -> Result<Vec<u8>, SnapshotError> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buffer);
        let options =
            FileOptions::<()>::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(CONTENT_TYPES_XML.as_bytes())?;

        zip.start_file("_rels/.rels", options)?;
        zip.write_all(ROOT_RELS_XML.as_bytes())?;

        zip.start_file("xl/workbook.xml", options)?;
        zip.write_all(workbook_xml().as_bytes())?;

        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(WORKBOOK_RELS_XML.as_bytes())?;

        zip.start_file("xl/worksheets/sheet1.xml", options)?;
        zip.write_all(worksheet_xml(grid).as_bytes())?;

        zip.finish()?;
    }
    Ok(buffer.into_inner())
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>
"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>
"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>
"#;

fn workbook_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
          xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="{SNAPSHOT_SHEET_NAME}" sheetId="1" r:id="rId1"/>
  </sheets>
</workbook>
"#
    )
}

fn worksheet_xml(grid: &SnapshotGrid) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#);
    out.push('\n');

    let rows = grid.row_count();
    let cols = grid.col_count();
    if rows > 0 && cols > 0 {
        out.push_str(&format!(
            r#"  <dimension ref="A1:{}{}"/>"#,
            col_to_name(cols - 1),
            rows
        ));
        out.push('\n');
    }

    out.push_str("  <sheetData>\n");
    for (row_idx, cells) in grid.rows().iter().enumerate() {
        if cells.iter().all(|cell| *cell == SnapshotCell::Empty) {
            continue;
        }
        let row_num = row_idx + 1;
        out.push_str(&format!(r#"    <row r="{row_num}">"#));
        for (col_idx, cell) in cells.iter().enumerate() {
            let r = format!("{}{row_num}", col_to_name(col_idx));
            match cell {
                SnapshotCell::Empty => {}
                SnapshotCell::Number(value) => {
                    out.push_str(&format!(r#"<c r="{r}"><v>{value}</v></c>"#));
                }
                SnapshotCell::Text(text) => {
                    out.push_str(&format!(
                        r#"<c r="{r}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                        escape(text.as_str())
                    ));
                }
            }
        }
        out.push_str("</row>\n");
    }
    out.push_str("  </sheetData>\n");
    out.push_str("</worksheet>\n");
    out
}
