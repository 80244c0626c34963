//! Worksheet part serialization
//!
//! Text goes in as inline strings, so a worksheet part never points
//! into a shared string table and can be moved between containers as-is.

use super::xml_writer::XmlWriter;
use crate::error::Result;
use crate::sheet::{Sheet, SheetCell};
use crate::types::{cell_reference, column_letter, CellValue};
use std::io::Write;

const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

fn open_worksheet<W: Write>(xml: &mut XmlWriter<W>) -> Result<()> {
    xml.declaration()?;
    xml.start_element("worksheet")?;
    xml.attribute("xmlns", SPREADSHEET_NS)?;
    xml.attribute("xmlns:r", RELATIONSHIPS_NS)?;
    xml.close_start_tag()
}

/// Worksheet with no cells; stands in for a sheet until its content is installed
pub fn write_placeholder<W: Write>(xml: &mut XmlWriter<W>) -> Result<()> {
    open_worksheet(xml)?;
    xml.empty_element("sheetData")?;
    xml.end_element("worksheet")?;
    xml.flush()
}

/// Serialize a complete worksheet part
pub fn write_worksheet<W: Write>(xml: &mut XmlWriter<W>, sheet: &Sheet) -> Result<()> {
    open_worksheet(xml)?;

    let columns = sheet.column_count() as u32;
    let rows = sheet.rows.len() as u32;
    xml.start_element("dimension")?;
    if columns == 0 || rows == 0 {
        xml.attribute("ref", "A1")?;
    } else {
        let range = format!("A1:{}", cell_reference(rows - 1, columns - 1));
        xml.attribute("ref", &range)?;
    }
    xml.close_empty()?;

    if !sheet.column_widths.is_empty() {
        xml.start_element("cols")?;
        xml.close_start_tag()?;
        for (col, width) in sheet.column_widths.iter().enumerate() {
            xml.start_element("col")?;
            xml.attribute_int("min", col + 1)?;
            xml.attribute_int("max", col + 1)?;
            xml.attribute("width", &format!("{:.2}", width))?;
            xml.attribute("customWidth", "1")?;
            xml.close_empty()?;
        }
        xml.end_element("cols")?;
    }

    xml.start_element("sheetData")?;
    xml.close_start_tag()?;

    let letters: Vec<String> = (0..columns).map(column_letter).collect();
    for (row_idx, row) in sheet.rows.iter().enumerate() {
        let row_num = row_idx + 1;
        xml.start_element("row")?;
        xml.attribute_int("r", row_num)?;
        xml.close_start_tag()?;
        for (cell, letter) in row.iter().zip(&letters) {
            write_cell(xml, cell, letter, row_num)?;
        }
        xml.end_element("row")?;
    }

    xml.end_element("sheetData")?;
    xml.end_element("worksheet")?;
    xml.flush()
}

fn start_cell<W: Write>(
    xml: &mut XmlWriter<W>,
    letter: &str,
    row_num: usize,
    style: u32,
) -> Result<()> {
    xml.start_element("c")?;
    let mut buf = itoa::Buffer::new();
    let reference = format!("{}{}", letter, buf.format(row_num));
    xml.attribute("r", &reference)?;
    if style != 0 {
        xml.attribute_int("s", style)?;
    }
    Ok(())
}

fn write_inline_string<W: Write>(xml: &mut XmlWriter<W>, text: &str) -> Result<()> {
    xml.attribute("t", "inlineStr")?;
    xml.close_start_tag()?;
    xml.write_str("<is>")?;
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        xml.write_str("<t xml:space=\"preserve\">")?;
    } else {
        xml.write_str("<t>")?;
    }
    xml.write_escaped(text)?;
    xml.write_str("</t></is></c>")
}

fn write_cell<W: Write>(
    xml: &mut XmlWriter<W>,
    cell: &SheetCell,
    letter: &str,
    row_num: usize,
) -> Result<()> {
    match &cell.value {
        CellValue::Empty => {
            // Unstyled blanks are left out entirely
            if cell.style != 0 {
                start_cell(xml, letter, row_num, cell.style)?;
                xml.close_empty()?;
            }
            Ok(())
        }
        CellValue::String(s) => {
            start_cell(xml, letter, row_num, cell.style)?;
            write_inline_string(xml, s)
        }
        CellValue::Int(i) => {
            start_cell(xml, letter, row_num, cell.style)?;
            xml.close_start_tag()?;
            xml.write_str("<v>")?;
            xml.write_int(*i)?;
            xml.write_str("</v></c>")
        }
        CellValue::Float(f) | CellValue::DateTime(f) => {
            start_cell(xml, letter, row_num, cell.style)?;
            if !f.is_finite() {
                return write_inline_string(xml, &f.to_string());
            }
            xml.close_start_tag()?;
            xml.write_str("<v>")?;
            xml.write_str(&f.to_string())?;
            xml.write_str("</v></c>")
        }
        CellValue::Bool(b) => {
            start_cell(xml, letter, row_num, cell.style)?;
            xml.attribute("t", "b")?;
            xml.close_start_tag()?;
            xml.write_str(if *b { "<v>1</v></c>" } else { "<v>0</v></c>" })
        }
    }
}
