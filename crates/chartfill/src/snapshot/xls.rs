//! Minimal BIFF8 workbook writer for legacy `.xls` snapshots.

use std::io::{Cursor, Write};

use super::{SnapshotCell, SnapshotGrid, SNAPSHOT_SHEET_NAME};
use crate::error::SnapshotError;

const RECORD_BOF: u16 = 0x0809;
const RECORD_EOF: u16 = 0x000A;
const RECORD_CODEPAGE: u16 = 0x0042;
const RECORD_WINDOW1: u16 = 0x003D;
const RECORD_FONT: u16 = 0x0031;
const RECORD_XF: u16 = 0x00E0;
const RECORD_BOUNDSHEET: u16 = 0x0085;
const RECORD_DIMENSIONS: u16 = 0x0200;
const RECORD_NUMBER: u16 = 0x0203;
const RECORD_LABEL: u16 = 0x0204;
const RECORD_WINDOW2: u16 = 0x023E;

const BOF_VERSION_BIFF8: u16 = 0x0600;
const BOF_DT_WORKBOOK_GLOBALS: u16 = 0x0005;
const BOF_DT_WORKSHEET: u16 = 0x0010;

const XF_FLAG_LOCKED: u16 = 0x0001;
const XF_FLAG_STYLE: u16 = 0x0004;

const COLOR_AUTOMATIC: u16 = 0x7FFF;

/// BIFF8 sheet limits.
const MAX_ROWS: usize = 65_536;
const MAX_COLS: usize = 256;
/// Longest string a LABEL cell holds, in UTF-16 code units.
const MAX_LABEL_CHARS: usize = 255;

/// Index of the single cell XF, after the 16 style XFs readers expect.
const CELL_XF: u16 = 16;

/// Write a `.xls` compound file whose `Workbook` stream holds `grid` on one sheet.
pub fn write_legacy_binary(grid: &SnapshotGrid) -> Result<Vec<u8>, SnapshotError> {
    if grid.row_count() > MAX_ROWS || grid.col_count() > MAX_COLS {
        return Err(SnapshotError::TooLarge(format!(
            "{} rows x {} columns exceeds {MAX_ROWS} x {MAX_COLS}",
            grid.row_count(),
            grid.col_count()
        )));
    }

    let workbook_stream = build_workbook_stream(grid);

    let cursor = Cursor::new(Vec::new());
    let mut ole = cfb::CompoundFile::create(cursor)?;
    {
        let mut stream = ole.create_stream("Workbook")?;
        stream.write_all(&workbook_stream)?;
    }
    Ok(ole.into_inner().into_inner())
}

pub(crate) fn build_workbook_stream(grid: &SnapshotGrid) -> Vec<u8> {
    // -- Globals -----------------------------------------------------------------
    let mut globals = Vec::<u8>::new();

    push_record(&mut globals, RECORD_BOF, &bof(BOF_DT_WORKBOOK_GLOBALS));
    push_record(&mut globals, RECORD_CODEPAGE, &1200u16.to_le_bytes()); // UTF-16
    push_record(&mut globals, RECORD_WINDOW1, &window1());
    push_record(&mut globals, RECORD_FONT, &font("Arial"));

    for _ in 0..CELL_XF {
        push_record(&mut globals, RECORD_XF, &xf_record(0, 0, true));
    }
    push_record(&mut globals, RECORD_XF, &xf_record(0, 0, false));

    let boundsheet_start = globals.len();
    let mut boundsheet = Vec::<u8>::new();
    boundsheet.extend_from_slice(&0u32.to_le_bytes()); // lbPlyPos, patched below
    boundsheet.extend_from_slice(&0u16.to_le_bytes()); // visible worksheet
    write_short_unicode_string(&mut boundsheet, SNAPSHOT_SHEET_NAME);
    push_record(&mut globals, RECORD_BOUNDSHEET, &boundsheet);
    let boundsheet_offset_pos = boundsheet_start + 4;

    push_record(&mut globals, RECORD_EOF, &[]);

    // -- Sheet -------------------------------------------------------------------
    let sheet_offset = globals.len();
    let sheet = build_sheet_stream(grid);

    globals[boundsheet_offset_pos..boundsheet_offset_pos + 4]
        .copy_from_slice(&(sheet_offset as u32).to_le_bytes());

    globals.extend_from_slice(&sheet);
    globals
}

fn build_sheet_stream(grid: &SnapshotGrid) -> Vec<u8> {
    let mut sheet = Vec::<u8>::new();
    push_record(&mut sheet, RECORD_BOF, &bof(BOF_DT_WORKSHEET));

    let mut dims = Vec::<u8>::new();
    dims.extend_from_slice(&0u32.to_le_bytes()); // first row
    dims.extend_from_slice(&(grid.row_count() as u32).to_le_bytes()); // last row + 1
    dims.extend_from_slice(&0u16.to_le_bytes()); // first col
    dims.extend_from_slice(&(grid.col_count() as u16).to_le_bytes()); // last col + 1
    dims.extend_from_slice(&0u16.to_le_bytes()); // reserved
    push_record(&mut sheet, RECORD_DIMENSIONS, &dims);

    for (row, cells) in grid.rows().iter().enumerate() {
        for (col, cell) in cells.iter().enumerate() {
            let (row, col) = (row as u16, col as u16);
            match cell {
                SnapshotCell::Empty => {}
                SnapshotCell::Number(value) => {
                    push_record(&mut sheet, RECORD_NUMBER, &number_cell(row, col, CELL_XF, *value));
                }
                SnapshotCell::Text(text) => {
                    push_record(&mut sheet, RECORD_LABEL, &label_cell(row, col, CELL_XF, text));
                }
            }
        }
    }

    push_record(&mut sheet, RECORD_WINDOW2, &window2());
    push_record(&mut sheet, RECORD_EOF, &[]);
    sheet
}

fn push_record(out: &mut Vec<u8>, id: u16, data: &[u8]) {
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&(data.len() as u16).to_le_bytes());
    out.extend_from_slice(data);
}

fn bof(dt: u16) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[0..2].copy_from_slice(&BOF_VERSION_BIFF8.to_le_bytes());
    out[2..4].copy_from_slice(&dt.to_le_bytes());
    out[4..6].copy_from_slice(&0x0DBBu16.to_le_bytes()); // build
    out[6..8].copy_from_slice(&0x07CCu16.to_le_bytes()); // year (1996)
    out
}

fn window1() -> [u8; 18] {
    let mut out = [0u8; 18];
    // cTabSel = 1
    out[14..16].copy_from_slice(&1u16.to_le_bytes());
    // wTabRatio
    out[16..18].copy_from_slice(&600u16.to_le_bytes());
    out
}

fn window2() -> [u8; 18] {
    let mut out = [0u8; 18];
    let grbit: u16 = 0x02B6;
    out[0..2].copy_from_slice(&grbit.to_le_bytes());
    out
}

fn font(name: &str) -> Vec<u8> {
    let mut out = Vec::<u8>::new();
    out.extend_from_slice(&200u16.to_le_bytes()); // height: 10pt
    out.extend_from_slice(&0u16.to_le_bytes()); // option flags
    out.extend_from_slice(&COLOR_AUTOMATIC.to_le_bytes());
    out.extend_from_slice(&400u16.to_le_bytes()); // weight
    out.extend_from_slice(&0u16.to_le_bytes()); // escapement
    out.push(0); // underline
    out.push(0); // family
    out.push(0); // charset
    out.push(0); // reserved
    write_short_unicode_string(&mut out, name);
    out
}

fn xf_record(font_idx: u16, fmt_idx: u16, is_style_xf: bool) -> [u8; 20] {
    let mut out = [0u8; 20];
    out[0..2].copy_from_slice(&font_idx.to_le_bytes());
    out[2..4].copy_from_slice(&fmt_idx.to_le_bytes());
    let flags: u16 = XF_FLAG_LOCKED | if is_style_xf { XF_FLAG_STYLE } else { 0 };
    out[4..6].copy_from_slice(&flags.to_le_bytes());
    // General + Bottom.
    out[6] = 0x20;
    out[9] = 0x3F;
    out
}

fn number_cell(row: u16, col: u16, xf: u16, v: f64) -> [u8; 14] {
    let mut out = [0u8; 14];
    out[0..2].copy_from_slice(&row.to_le_bytes());
    out[2..4].copy_from_slice(&col.to_le_bytes());
    out[4..6].copy_from_slice(&xf.to_le_bytes());
    out[6..14].copy_from_slice(&v.to_le_bytes());
    out
}

fn label_cell(row: u16, col: u16, xf: u16, text: &str) -> Vec<u8> {
    let mut out = Vec::<u8>::new();
    out.extend_from_slice(&row.to_le_bytes());
    out.extend_from_slice(&col.to_le_bytes());
    out.extend_from_slice(&xf.to_le_bytes());
    write_unicode_string(&mut out, text);
    out
}

/// ShortXLUnicodeString: `[cch: u8][flags: u8][chars]`, stored uncompressed (UTF-16LE).
fn write_short_unicode_string(out: &mut Vec<u8>, s: &str) {
    let units = utf16_units(s, u8::MAX as usize);
    out.push(units.len() as u8);
    out.push(1);
    for unit in units {
        out.extend_from_slice(&unit.to_le_bytes());
    }
}

/// XLUnicodeString: `[cch: u16][flags: u8][chars]`, stored uncompressed (UTF-16LE).
fn write_unicode_string(out: &mut Vec<u8>, s: &str) {
    let units = utf16_units(s, MAX_LABEL_CHARS);
    out.extend_from_slice(&(units.len() as u16).to_le_bytes());
    out.push(1);
    for unit in units {
        out.extend_from_slice(&unit.to_le_bytes());
    }
}

fn utf16_units(s: &str, max: usize) -> Vec<u16> {
    let mut units: Vec<u16> = s.encode_utf16().collect();
    if units.len() > max {
        log::warn!(
            "truncating {}-character snapshot string to {max} characters",
            units.len()
        );
        units.truncate(max);
        // Never leave half a surrogate pair behind.
        if units.last().is_some_and(|u| (0xD800..0xDC00).contains(u)) {
            units.pop();
        }
    }
    units
}
