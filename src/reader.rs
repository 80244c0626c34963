//! Reading finished packages back
//!
//! A small string-scanning reader for the parts this crate writes: the
//! workbook sheet table, worksheet cells with their style references,
//! column widths and the `cellXfs` table. It loads one part at a time.

use crate::error::{ExportError, Phase, Result};
use crate::ooxml::xml_writer::is_ooxml_escape;
use crate::ooxml::{ContainerReader, PartLocator};
use std::path::Path;

/// One cell as stored in a worksheet part
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCell {
    /// Displayed text; booleans read back as "true"/"false"
    pub text: String,
    /// `s` attribute, 0 when absent
    pub style: u32,
}

/// Read-only view of a package
pub struct PackageReader {
    zip: ContainerReader,
    sheet_names: Vec<String>,
    sheet_paths: Vec<String>,
}

impl PackageReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut zip = ContainerReader::open(path.as_ref(), Phase::Read, None)?;
        let (sheet_names, sheet_paths) = load_sheet_info(&mut zip)?;
        log::debug!("opened package with {} sheets", sheet_names.len());
        Ok(PackageReader {
            zip,
            sheet_names,
            sheet_paths,
        })
    }

    /// Sheet names in declared order
    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    /// Entry names in container order
    pub fn part_names(&self) -> Vec<String> {
        self.zip.entry_names()
    }

    fn read_text(&mut self, part: &str) -> Result<String> {
        let data = self.zip.read(part)?;
        String::from_utf8(data)
            .map_err(|e| ExportError::ReadError(format!("{} is not UTF-8: {}", part, e)))
    }

    fn sheet_xml(&mut self, name: &str) -> Result<String> {
        let index = self
            .sheet_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ExportError::ReadError(format!("no sheet named '{}'", name)))?;
        let part = self.sheet_paths[index].clone();
        self.read_text(&part)
    }

    /// All cells of a sheet, rows padded to the sheet dimension
    pub fn cells(&mut self, name: &str) -> Result<Vec<Vec<StoredCell>>> {
        let xml = self.sheet_xml(name)?;
        parse_cells(&xml)
    }

    /// Cell text per row
    pub fn rows(&mut self, name: &str) -> Result<Vec<Vec<String>>> {
        Ok(self
            .cells(name)?
            .into_iter()
            .map(|row| row.into_iter().map(|c| c.text).collect())
            .collect())
    }

    /// Every style index referenced by the sheet, in cell order
    pub fn style_refs(&mut self, name: &str) -> Result<Vec<u32>> {
        let xml = self.sheet_xml(name)?;
        let mut refs = Vec::new();
        for tag in tags(&xml, "<c ") {
            if let Some(s) = attr(tag, "s") {
                refs.push(parse_num(s, "style index")?);
            }
        }
        Ok(refs)
    }

    /// Column widths from `<cols>`, by column order
    pub fn column_widths(&mut self, name: &str) -> Result<Vec<f64>> {
        let xml = self.sheet_xml(name)?;
        tags(&xml, "<col ")
            .map(|tag| {
                let width = attr(tag, "width").unwrap_or("0");
                width
                    .parse::<f64>()
                    .map_err(|_| ExportError::ReadError(format!("bad column width '{}'", width)))
            })
            .collect()
    }

    /// Number of entries in the `cellXfs` table
    pub fn cell_xf_count(&mut self) -> Result<usize> {
        let xml = self.read_text(PartLocator::STYLES)?;
        let block = between(&xml, "<cellXfs", "</cellXfs>")
            .ok_or_else(|| ExportError::ReadError("styles.xml has no cellXfs".to_string()))?;
        Ok(tags(block, "<xf ").count())
    }
}

/// Sheet names and worksheet part names, via workbook.xml and its rels
fn load_sheet_info(zip: &mut ContainerReader) -> Result<(Vec<String>, Vec<String>)> {
    let workbook = String::from_utf8_lossy(&zip.read(PartLocator::WORKBOOK)?).into_owned();
    let rels = String::from_utf8_lossy(&zip.read(PartLocator::WORKBOOK_RELS)?).into_owned();

    let mut names = Vec::new();
    let mut paths = Vec::new();
    for tag in tags(&workbook, "<sheet ") {
        let name = attr(tag, "name")
            .ok_or_else(|| ExportError::ReadError("sheet without a name".to_string()))?;
        let rid = attr(tag, "r:id")
            .ok_or_else(|| ExportError::ReadError(format!("sheet '{}' has no r:id", name)))?;
        let target = tags(&rels, "<Relationship ")
            .find(|rel| attr(rel, "Id") == Some(rid))
            .and_then(|rel| attr(rel, "Target"))
            .ok_or_else(|| {
                ExportError::ReadError(format!("relationship {} of sheet '{}' missing", rid, name))
            })?;
        names.push(decode_text(name));
        // Targets are relative to xl/
        paths.push(match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("xl/{}", target),
        });
    }
    Ok((names, paths))
}

fn parse_cells(xml: &str) -> Result<Vec<Vec<StoredCell>>> {
    let width = between(xml, "<dimension ref=\"", "\"")
        .and_then(|r| r.split(':').nth(1))
        .map(|last| column_index(last) + 1)
        .unwrap_or(0);

    let mut rows = Vec::new();
    let mut pos = 0;
    while let Some(start) = xml[pos..].find("<row ") {
        let start = pos + start;
        let head_end = match xml[start..].find('>') {
            Some(i) => start + i,
            None => break,
        };
        // <row r="n"/> has no cells
        if xml[..head_end].ends_with('/') {
            rows.push(vec![empty_cell(); width]);
            pos = head_end + 1;
            continue;
        }
        let end = match xml[head_end..].find("</row>") {
            Some(i) => head_end + i,
            None => return Err(ExportError::ReadError("unterminated <row>".to_string())),
        };

        let mut row = vec![empty_cell(); width];
        for cell in cell_blocks(&xml[head_end + 1..end]) {
            let (col, stored) = parse_cell(cell)?;
            if col >= row.len() {
                row.resize(col + 1, empty_cell());
            }
            row[col] = stored;
        }
        rows.push(row);
        pos = end + 6;
    }
    Ok(rows)
}

fn empty_cell() -> StoredCell {
    StoredCell {
        text: String::new(),
        style: 0,
    }
}

/// `<c ...>...</c>` or `<c .../>` blocks in order
fn cell_blocks(row: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut pos = 0;
    while let Some(start) = row[pos..].find("<c ") {
        let start = pos + start;
        let head_end = match row[start..].find('>') {
            Some(i) => start + i,
            None => break,
        };
        let end = if row[..head_end].ends_with('/') {
            head_end + 1
        } else {
            match row[head_end..].find("</c>") {
                Some(i) => head_end + i + 4,
                None => break,
            }
        };
        blocks.push(&row[start..end]);
        pos = end;
    }
    blocks
}

fn parse_cell(block: &str) -> Result<(usize, StoredCell)> {
    let head = &block[..block.find('>').unwrap_or(block.len())];
    let reference =
        attr(head, "r").ok_or_else(|| ExportError::ReadError("cell without r".to_string()))?;
    let style = match attr(head, "s") {
        Some(s) => parse_num(s, "style index")?,
        None => 0,
    };

    let text = match attr(head, "t") {
        Some("inlineStr") => between(block, "<t", "</t>")
            .and_then(|t| t.split_once('>').map(|(_, text)| text))
            .map(decode_text)
            .unwrap_or_default(),
        Some("b") => match between(block, "<v>", "</v>") {
            Some("1") => "true".to_string(),
            Some(_) => "false".to_string(),
            None => String::new(),
        },
        _ => between(block, "<v>", "</v>")
            .map(decode_xml_entities)
            .unwrap_or_default(),
    };

    Ok((column_index(reference), StoredCell { text, style }))
}

/// 0-based column of a reference like "AB12"
fn column_index(reference: &str) -> usize {
    reference
        .bytes()
        .take_while(u8::is_ascii_uppercase)
        .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize)
        .saturating_sub(1)
}

/// Start tags beginning with `open` (e.g. `"<sheet "`), up to their `>`
fn tags<'a>(xml: &'a str, open: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    let mut pos = 0;
    std::iter::from_fn(move || {
        let start = pos + xml[pos..].find(open)?;
        let end = start + xml[start..].find('>')? + 1;
        pos = end;
        Some(&xml[start..end])
    })
}

/// Value of attribute `name` inside one start tag
fn attr<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!(" {}=\"", name);
    let start = tag.find(&needle)? + needle.len();
    let len = tag[start..].find('"')?;
    Some(&tag[start..start + len])
}

fn between<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let len = text[start..].find(close)?;
    Some(&text[start..start + len])
}

fn parse_num(value: &str, what: &str) -> Result<u32> {
    value
        .parse()
        .map_err(|_| ExportError::ReadError(format!("bad {} '{}'", what, value)))
}

/// Undo entity escaping, then `_xHHHH_` escaping
fn decode_text(text: &str) -> String {
    let text = decode_xml_entities(text);
    if !text.contains("_x") {
        return text;
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(pos) = rest.find('_') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let decoded = is_ooxml_escape(rest)
            .then(|| u32::from_str_radix(&rest[2..6], 16).ok())
            .flatten()
            .and_then(char::from_u32);
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[7..];
            }
            None => {
                out.push('_');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_xml_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
