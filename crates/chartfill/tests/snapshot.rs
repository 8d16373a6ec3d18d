use std::io::{Cursor, Read};

use chartfill::snapshot::{write_snapshot, SnapshotGrid};
use chartfill::{CacheModel, CategoricalData, CategoricalSeries, SnapshotFormat, XyData, XySeries};

fn sales() -> CacheModel {
    CacheModel::Categorical(CategoricalData {
        labels: vec!["Q1".into(), "Q2 & Q3".into()],
        series: vec![
            CategoricalSeries {
                name: Some("Revenue".into()),
                values: vec![Some(10.5), Some(20.0)],
            },
            CategoricalSeries {
                name: Some("Cost".into()),
                values: vec![None, Some(-4.0)],
            },
        ],
    })
}

fn zip_entry(bytes: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("open snapshot zip");
    let mut file = archive.by_name(name).expect("zip entry");
    let mut out = String::new();
    file.read_to_string(&mut out).expect("read zip entry");
    out
}

#[test]
fn packaged_snapshot_is_a_readable_workbook() {
    let bytes = write_snapshot(&sales(), SnapshotFormat::PackagedSpreadsheet).unwrap();

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
    let mut names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "[Content_Types].xml",
            "_rels/.rels",
            "xl/_rels/workbook.xml.rels",
            "xl/workbook.xml",
            "xl/worksheets/sheet1.xml",
        ]
    );

    let workbook = zip_entry(&bytes, "xl/workbook.xml");
    assert!(workbook.contains(r#"<sheet name="Sheet1""#), "{workbook}");

    let sheet = zip_entry(&bytes, "xl/worksheets/sheet1.xml");
    let doc = roxmltree::Document::parse(&sheet).expect("worksheet xml");
    let cells: Vec<(String, String)> = doc
        .descendants()
        .filter(|n| n.tag_name().name() == "c")
        .map(|c| {
            let text = c
                .descendants()
                .filter(|n| n.is_text())
                .filter_map(|n| n.text())
                .collect::<String>();
            (c.attribute("r").unwrap_or_default().to_string(), text)
        })
        .collect();
    assert_eq!(
        cells,
        vec![
            ("B1".to_string(), "Revenue".to_string()),
            ("C1".to_string(), "Cost".to_string()),
            ("A2".to_string(), "Q1".to_string()),
            ("B2".to_string(), "10.5".to_string()),
            ("A3".to_string(), "Q2 & Q3".to_string()),
            ("B3".to_string(), "20".to_string()),
            ("C3".to_string(), "-4".to_string()),
        ]
    );
}

#[test]
fn legacy_snapshot_is_a_compound_file_with_a_biff8_workbook_stream() {
    let bytes = write_snapshot(&sales(), SnapshotFormat::LegacyBinary).unwrap();

    let mut ole = cfb::CompoundFile::open(Cursor::new(bytes)).expect("open compound file");
    let mut stream = ole.open_stream("Workbook").expect("Workbook stream");
    let mut workbook = Vec::new();
    stream.read_to_end(&mut workbook).unwrap();

    // BOF record, BIFF8, workbook globals.
    assert_eq!(&workbook[0..2], &0x0809u16.to_le_bytes());
    assert_eq!(&workbook[4..6], &0x0600u16.to_le_bytes());
    assert_eq!(&workbook[6..8], &0x0005u16.to_le_bytes());
    // Ends with the sheet substream's EOF.
    assert_eq!(&workbook[workbook.len() - 4..], &[0x0A, 0x00, 0x00, 0x00]);
}

#[test]
fn xy_grid_has_an_x_column_per_series() {
    let model = CacheModel::Xy(XyData {
        series: vec![
            XySeries {
                name: Some("A".into()),
                x: vec![Some(1.0), Some(2.0)],
                y: vec![Some(3.0), None],
            },
            XySeries {
                name: Some("B".into()),
                x: vec![Some(5.0)],
                y: vec![Some(6.0)],
            },
        ],
    });
    let grid = SnapshotGrid::from_model(&model);
    assert_eq!(grid.col_count(), 4);
    assert_eq!(grid.row_count(), 3);

    let bytes = write_snapshot(&model, SnapshotFormat::PackagedSpreadsheet).unwrap();
    let sheet = zip_entry(&bytes, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(r#"<dimension ref="A1:D3"/>"#), "{sheet}");
}
