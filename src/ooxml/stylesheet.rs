//! `xl/styles.xml` generation from catalog entries
//!
//! Fonts, fills, borders and number formats are deduplicated into their
//! own tables; `cellXfs` is written one `<xf>` per catalog entry in
//! catalog order, so a cell's `s` attribute is its catalog index.

use super::xml_writer::XmlWriter;
use crate::error::Result;
use crate::style::{BorderLine, BorderStyle, FillStyle, FontStyle, PatternType, StyleDescriptor};
use crate::style::{HorizontalAlignment, VerticalAlignment};
use indexmap::{IndexMap, IndexSet};
use std::io::Write;

/// First id available for custom number formats
const FIRST_CUSTOM_NUM_FMT: u32 = 164;

const BUILTIN_NUM_FMTS: &[(u32, &str)] = &[
    (0, "General"),
    (1, "0"),
    (2, "0.00"),
    (3, "#,##0"),
    (4, "#,##0.00"),
    (9, "0%"),
    (10, "0.00%"),
    (11, "0.00E+00"),
    (14, "mm-dd-yy"),
    (20, "h:mm"),
    (22, "m/d/yy h:mm"),
    (49, "@"),
];

fn builtin_num_fmt(code: &str) -> Option<u32> {
    BUILTIN_NUM_FMTS
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(id, _)| *id)
}

struct XfRef<'a> {
    num_fmt_id: u32,
    font_id: usize,
    fill_id: usize,
    border_id: usize,
    descriptor: &'a StyleDescriptor,
}

/// Deduplicated component tables for a list of descriptors
struct StyleTables<'a> {
    custom_formats: IndexMap<&'a str, u32>,
    fonts: IndexSet<&'a FontStyle>,
    fills: Vec<FillStyle>,
    borders: IndexSet<&'a BorderStyle>,
    xfs: Vec<XfRef<'a>>,
}

impl<'a> StyleTables<'a> {
    fn build(entries: &[&'a StyleDescriptor]) -> Self {
        let mut custom_formats = IndexMap::new();
        let mut fonts = IndexSet::new();
        // Slots 0 and 1 are reserved by the format
        let mut fills = vec![
            FillStyle::default(),
            FillStyle {
                pattern: PatternType::Gray125,
                color: None,
            },
        ];
        let mut borders = IndexSet::new();
        let mut xfs = Vec::with_capacity(entries.len());

        for descriptor in entries {
            let num_fmt_id = match builtin_num_fmt(&descriptor.number_format) {
                Some(id) => id,
                None => {
                    let next = FIRST_CUSTOM_NUM_FMT + custom_formats.len() as u32;
                    *custom_formats
                        .entry(descriptor.number_format.as_str())
                        .or_insert(next)
                }
            };
            let (font_id, _) = fonts.insert_full(&descriptor.font);
            let fill_id = match fills.iter().position(|f| *f == descriptor.fill) {
                Some(id) => id,
                None => {
                    fills.push(descriptor.fill.clone());
                    fills.len() - 1
                }
            };
            let (border_id, _) = borders.insert_full(&descriptor.border);
            xfs.push(XfRef {
                num_fmt_id,
                font_id,
                fill_id,
                border_id,
                descriptor,
            });
        }

        StyleTables {
            custom_formats,
            fonts,
            fills,
            borders,
            xfs,
        }
    }
}

/// Write a complete stylesheet part for `entries`
///
/// `entries[0]` must be the default descriptor; the catalog guarantees it.
pub fn write_styles<'a, W, I>(xml: &mut XmlWriter<W>, entries: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a StyleDescriptor>,
{
    let entries: Vec<&StyleDescriptor> = entries.into_iter().collect();
    let tables = StyleTables::build(&entries);

    xml.declaration()?;
    xml.start_element("styleSheet")?;
    xml.attribute(
        "xmlns",
        "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
    )?;
    xml.close_start_tag()?;

    if !tables.custom_formats.is_empty() {
        xml.start_element("numFmts")?;
        xml.attribute_int("count", tables.custom_formats.len())?;
        xml.close_start_tag()?;
        for (code, id) in &tables.custom_formats {
            xml.start_element("numFmt")?;
            xml.attribute_int("numFmtId", *id)?;
            xml.attribute("formatCode", code)?;
            xml.close_empty()?;
        }
        xml.end_element("numFmts")?;
    }

    xml.start_element("fonts")?;
    xml.attribute_int("count", tables.fonts.len())?;
    xml.close_start_tag()?;
    for font in &tables.fonts {
        write_font(xml, font)?;
    }
    xml.end_element("fonts")?;

    xml.start_element("fills")?;
    xml.attribute_int("count", tables.fills.len())?;
    xml.close_start_tag()?;
    for fill in &tables.fills {
        write_fill(xml, fill)?;
    }
    xml.end_element("fills")?;

    xml.start_element("borders")?;
    xml.attribute_int("count", tables.borders.len())?;
    xml.close_start_tag()?;
    for border in &tables.borders {
        write_border(xml, border)?;
    }
    xml.end_element("borders")?;

    xml.write_str(
        "<cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>",
    )?;

    xml.start_element("cellXfs")?;
    xml.attribute_int("count", tables.xfs.len())?;
    xml.close_start_tag()?;
    for xf in &tables.xfs {
        write_xf(xml, xf)?;
    }
    xml.end_element("cellXfs")?;

    xml.write_str(
        "<cellStyles count=\"1\"><cellStyle name=\"Normal\" xfId=\"0\" builtinId=\"0\"/></cellStyles>",
    )?;
    xml.write_str("<dxfs count=\"0\"/>")?;
    xml.end_element("styleSheet")?;
    Ok(())
}

fn write_font<W: Write>(xml: &mut XmlWriter<W>, font: &FontStyle) -> Result<()> {
    xml.start_element("font")?;
    xml.close_start_tag()?;
    if font.bold {
        xml.empty_element("b")?;
    }
    xml.start_element("sz")?;
    xml.attribute_int("val", font.size)?;
    xml.close_empty()?;
    match &font.color {
        Some(rgb) => {
            xml.start_element("color")?;
            xml.attribute("rgb", rgb)?;
            xml.close_empty()?;
        }
        None => xml.write_str("<color theme=\"1\"/>")?,
    }
    xml.start_element("name")?;
    xml.attribute("val", &font.name)?;
    xml.close_empty()?;
    xml.write_str("<family val=\"2\"/>")?;
    xml.end_element("font")
}

fn write_fill<W: Write>(xml: &mut XmlWriter<W>, fill: &FillStyle) -> Result<()> {
    xml.start_element("fill")?;
    xml.close_start_tag()?;
    xml.start_element("patternFill")?;
    xml.attribute("patternType", fill.pattern.as_str())?;
    match (&fill.pattern, &fill.color) {
        (PatternType::None, _) | (_, None) => xml.close_empty()?,
        (_, Some(rgb)) => {
            xml.close_start_tag()?;
            xml.start_element("fgColor")?;
            xml.attribute("rgb", rgb)?;
            xml.close_empty()?;
            xml.write_str("<bgColor indexed=\"64\"/>")?;
            xml.end_element("patternFill")?;
        }
    }
    xml.end_element("fill")
}

fn write_border<W: Write>(xml: &mut XmlWriter<W>, border: &BorderStyle) -> Result<()> {
    xml.start_element("border")?;
    xml.close_start_tag()?;
    write_border_side(xml, "left", border.left)?;
    write_border_side(xml, "right", border.right)?;
    write_border_side(xml, "top", border.top)?;
    write_border_side(xml, "bottom", border.bottom)?;
    xml.empty_element("diagonal")?;
    xml.end_element("border")
}

fn write_border_side<W: Write>(
    xml: &mut XmlWriter<W>,
    side: &str,
    line: Option<BorderLine>,
) -> Result<()> {
    match line {
        Some(line) => {
            xml.start_element(side)?;
            xml.attribute("style", line.as_str())?;
            xml.close_start_tag()?;
            xml.write_str("<color auto=\"1\"/>")?;
            xml.end_element(side)
        }
        None => xml.empty_element(side),
    }
}

fn write_xf<W: Write>(xml: &mut XmlWriter<W>, xf: &XfRef<'_>) -> Result<()> {
    xml.start_element("xf")?;
    xml.attribute_int("numFmtId", xf.num_fmt_id)?;
    xml.attribute_int("fontId", xf.font_id)?;
    xml.attribute_int("fillId", xf.fill_id)?;
    xml.attribute_int("borderId", xf.border_id)?;
    xml.attribute_int("xfId", 0u32)?;
    if xf.num_fmt_id != 0 {
        xml.attribute("applyNumberFormat", "1")?;
    }
    if xf.font_id != 0 {
        xml.attribute("applyFont", "1")?;
    }
    if xf.fill_id != 0 {
        xml.attribute("applyFill", "1")?;
    }
    if xf.border_id != 0 {
        xml.attribute("applyBorder", "1")?;
    }

    let alignment = &xf.descriptor.alignment;
    if alignment.is_default() {
        return xml.close_empty();
    }

    xml.attribute("applyAlignment", "1")?;
    xml.close_start_tag()?;
    xml.start_element("alignment")?;
    if let Some(h) = alignment.horizontal {
        xml.attribute(
            "horizontal",
            match h {
                HorizontalAlignment::Left => "left",
                HorizontalAlignment::Center => "center",
                HorizontalAlignment::Right => "right",
            },
        )?;
    }
    if let Some(v) = alignment.vertical {
        xml.attribute(
            "vertical",
            match v {
                VerticalAlignment::Top => "top",
                VerticalAlignment::Center => "center",
                VerticalAlignment::Bottom => "bottom",
            },
        )?;
    }
    xml.close_empty()?;
    xml.end_element("xf")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{StyleCatalog, DATETIME_FORMAT};

    fn render(catalog: &StyleCatalog) -> String {
        let mut out = Vec::new();
        {
            let mut xml = XmlWriter::new(&mut out);
            write_styles(&mut xml, catalog.iter()).unwrap();
            xml.flush().unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_default_catalog_stylesheet() {
        let xml = render(&StyleCatalog::new());
        assert!(xml.contains("<fonts count=\"1\">"));
        assert!(xml.contains("<fills count=\"2\">"));
        assert!(xml.contains("<borders count=\"1\">"));
        assert!(xml.contains("<cellXfs count=\"1\">"));
        assert!(!xml.contains("<numFmts"));
    }

    #[test]
    fn test_header_style_tables() {
        let mut catalog = StyleCatalog::new();
        catalog.record(&StyleDescriptor::header());
        let xml = render(&catalog);

        assert!(xml.contains("<fonts count=\"2\">"));
        assert!(xml.contains("<fills count=\"3\">"));
        assert!(xml.contains("<fgColor rgb=\"FF1F4E78\"/>"));
        assert!(xml.contains("<cellXfs count=\"2\">"));
        assert!(xml.contains(
            "<xf numFmtId=\"0\" fontId=\"1\" fillId=\"2\" borderId=\"0\" xfId=\"0\" applyFont=\"1\" applyFill=\"1\" applyAlignment=\"1\"><alignment horizontal=\"center\" vertical=\"center\"/></xf>"
        ));
    }

    #[test]
    fn test_number_formats_builtin_and_custom() {
        let mut catalog = StyleCatalog::new();
        catalog.record(&StyleDescriptor::with_number_format("0.00"));
        catalog.record(&StyleDescriptor::with_number_format(DATETIME_FORMAT));
        catalog.record(&StyleDescriptor::with_number_format("#,##0.000"));
        let xml = render(&catalog);

        assert!(xml.contains("<numFmts count=\"2\">"));
        assert!(xml.contains("<numFmt numFmtId=\"164\" formatCode=\"yyyy-mm-dd hh:mm:ss\"/>"));
        assert!(xml.contains("<numFmt numFmtId=\"165\" formatCode=\"#,##0.000\"/>"));
        assert!(xml.contains("<xf numFmtId=\"2\""));
        // one font and fill shared by all entries
        assert!(xml.contains("<fonts count=\"1\">"));
        assert!(xml.contains("<cellXfs count=\"4\">"));
    }
}
