//! Package layout: part names and the manifest parts around the worksheets

use super::stylesheet::write_styles;
use super::xml_writer::XmlWriter;
use super::zip_io::ContainerWriter;
use crate::error::{ExportError, Phase, Result};
use crate::style::StyleDescriptor;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const OFFICE_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Maps sheets to part names and part names to extracted file locations
///
/// Sheet ordinals are 1-based and follow the declared sheet order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartLocator {
    sheet_count: usize,
}

impl PartLocator {
    pub const CONTENT_TYPES: &'static str = "[Content_Types].xml";
    pub const ROOT_RELS: &'static str = "_rels/.rels";
    pub const CORE_PROPS: &'static str = "docProps/core.xml";
    pub const APP_PROPS: &'static str = "docProps/app.xml";
    pub const WORKBOOK: &'static str = "xl/workbook.xml";
    pub const WORKBOOK_RELS: &'static str = "xl/_rels/workbook.xml.rels";
    pub const STYLES: &'static str = "xl/styles.xml";

    /// Manifest parts in the order they are written
    pub const MANIFEST_PARTS: [&'static str; 7] = [
        Self::CONTENT_TYPES,
        Self::ROOT_RELS,
        Self::CORE_PROPS,
        Self::APP_PROPS,
        Self::WORKBOOK,
        Self::WORKBOOK_RELS,
        Self::STYLES,
    ];

    pub fn new(sheet_count: usize) -> Self {
        PartLocator { sheet_count }
    }

    /// Part name of the worksheet at `ordinal`
    pub fn worksheet(ordinal: usize) -> String {
        format!("xl/worksheets/sheet{}.xml", ordinal)
    }

    /// Every part of the package, manifest first, then worksheets in order
    pub fn parts(&self) -> Vec<String> {
        Self::MANIFEST_PARTS
            .iter()
            .map(|p| p.to_string())
            .chain((1..=self.sheet_count).map(Self::worksheet))
            .collect()
    }

    /// Where `part` lives once the package is extracted under `root`
    ///
    /// Rejects names that are absolute or climb out of `root`, reporting
    /// them as container errors of `phase`.
    pub fn fs_path(
        root: &Path,
        part: &str,
        phase: Phase,
        dataset: Option<&str>,
    ) -> Result<PathBuf> {
        let relative = Path::new(part);
        let escapes = part.is_empty()
            || part.contains('\\')
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(ExportError::container(
                phase,
                dataset,
                format!("part name '{}' is not a relative package path", part),
            ));
        }
        Ok(root.join(relative))
    }
}

/// Write every manifest part for `sheet_names` and the catalog `styles`
pub fn write_manifest(
    zip: &mut ContainerWriter,
    sheet_names: &[&str],
    styles: &[StyleDescriptor],
) -> Result<()> {
    zip.write_part(PartLocator::CONTENT_TYPES, |xml| {
        write_content_types(xml, sheet_names.len())
    })?;
    zip.write_part(PartLocator::ROOT_RELS, |xml| write_root_rels(xml))?;
    zip.write_part(PartLocator::CORE_PROPS, |xml| {
        write_core_props(xml, chrono::Utc::now())
    })?;
    zip.write_part(PartLocator::APP_PROPS, |xml| write_app_props(xml, sheet_names))?;
    zip.write_part(PartLocator::WORKBOOK, |xml| write_workbook(xml, sheet_names))?;
    zip.write_part(PartLocator::WORKBOOK_RELS, |xml| {
        write_workbook_rels(xml, sheet_names.len())
    })?;
    zip.write_part(PartLocator::STYLES, |xml| write_styles(xml, styles))
}

pub fn write_content_types<W: Write>(xml: &mut XmlWriter<W>, sheet_count: usize) -> Result<()> {
    xml.declaration()?;
    xml.write_str(
        "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>",
    )?;
    for ordinal in 1..=sheet_count {
        xml.start_element("Override")?;
        xml.attribute("PartName", &format!("/{}", PartLocator::worksheet(ordinal)))?;
        xml.attribute(
            "ContentType",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml",
        )?;
        xml.close_empty()?;
    }
    xml.write_str(
        "<Override PartName=\"/xl/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml\"/>\
<Override PartName=\"/docProps/core.xml\" ContentType=\"application/vnd.openxmlformats-package.core-properties+xml\"/>\
<Override PartName=\"/docProps/app.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.extended-properties+xml\"/>\
</Types>",
    )?;
    xml.flush()
}

pub fn write_root_rels<W: Write>(xml: &mut XmlWriter<W>) -> Result<()> {
    xml.declaration()?;
    xml.start_element("Relationships")?;
    xml.attribute("xmlns", RELATIONSHIPS_NS)?;
    xml.close_start_tag()?;
    relationship(xml, "rId1", &format!("{}/officeDocument", OFFICE_REL), PartLocator::WORKBOOK)?;
    relationship(
        xml,
        "rId2",
        "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties",
        PartLocator::CORE_PROPS,
    )?;
    relationship(
        xml,
        "rId3",
        &format!("{}/extended-properties", OFFICE_REL),
        PartLocator::APP_PROPS,
    )?;
    xml.end_element("Relationships")?;
    xml.flush()
}

pub fn write_core_props<W: Write>(
    xml: &mut XmlWriter<W>,
    created: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    let stamp = created.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    xml.declaration()?;
    xml.write_str(
        "<cp:coreProperties xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" \
xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:dcterms=\"http://purl.org/dc/terms/\" \
xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">",
    )?;
    xml.text_element("dc:creator", "sheetpack")?;
    xml.text_element("cp:lastModifiedBy", "sheetpack")?;
    xml.write_str("<dcterms:created xsi:type=\"dcterms:W3CDTF\">")?;
    xml.write_str(&stamp)?;
    xml.write_str("</dcterms:created><dcterms:modified xsi:type=\"dcterms:W3CDTF\">")?;
    xml.write_str(&stamp)?;
    xml.write_str("</dcterms:modified></cp:coreProperties>")?;
    xml.flush()
}

pub fn write_app_props<W: Write>(xml: &mut XmlWriter<W>, sheet_names: &[&str]) -> Result<()> {
    xml.declaration()?;
    xml.write_str(
        "<Properties xmlns=\"http://schemas.openxmlformats.org/officeDocument/2006/extended-properties\" \
xmlns:vt=\"http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes\">\
<Application>sheetpack</Application><DocSecurity>0</DocSecurity><ScaleCrop>false</ScaleCrop>\
<HeadingPairs><vt:vector size=\"2\" baseType=\"variant\"><vt:variant><vt:lpstr>Worksheets</vt:lpstr></vt:variant><vt:variant><vt:i4>",
    )?;
    xml.write_int(sheet_names.len())?;
    xml.write_str("</vt:i4></vt:variant></vt:vector></HeadingPairs><TitlesOfParts>")?;
    xml.start_element("vt:vector")?;
    xml.attribute_int("size", sheet_names.len())?;
    xml.attribute("baseType", "lpstr")?;
    xml.close_start_tag()?;
    for name in sheet_names {
        xml.text_element("vt:lpstr", name)?;
    }
    xml.write_str(
        "</vt:vector></TitlesOfParts><LinksUpToDate>false</LinksUpToDate><SharedDoc>false</SharedDoc>\
<HyperlinksChanged>false</HyperlinksChanged><AppVersion>1.0</AppVersion></Properties>",
    )?;
    xml.flush()
}

/// Workbook part declaring the sheets in order; `rIdN` is sheet N
pub fn write_workbook<W: Write>(xml: &mut XmlWriter<W>, sheet_names: &[&str]) -> Result<()> {
    xml.declaration()?;
    xml.start_element("workbook")?;
    xml.attribute(
        "xmlns",
        "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
    )?;
    xml.attribute("xmlns:r", OFFICE_REL)?;
    xml.close_start_tag()?;

    xml.start_element("sheets")?;
    xml.close_start_tag()?;
    for (i, name) in sheet_names.iter().enumerate() {
        let sheet_id = i + 1;
        xml.start_element("sheet")?;
        xml.attribute("name", name)?;
        xml.attribute_int("sheetId", sheet_id)?;
        xml.attribute("r:id", &format!("rId{}", sheet_id))?;
        xml.close_empty()?;
    }
    xml.end_element("sheets")?;
    xml.end_element("workbook")?;
    xml.flush()
}

pub fn write_workbook_rels<W: Write>(xml: &mut XmlWriter<W>, sheet_count: usize) -> Result<()> {
    xml.declaration()?;
    xml.start_element("Relationships")?;
    xml.attribute("xmlns", RELATIONSHIPS_NS)?;
    xml.close_start_tag()?;

    let worksheet_type = format!("{}/worksheet", OFFICE_REL);
    for ordinal in 1..=sheet_count {
        // Targets are relative to xl/
        let target = PartLocator::worksheet(ordinal);
        let target = target.trim_start_matches("xl/");
        relationship(xml, &format!("rId{}", ordinal), &worksheet_type, target)?;
    }
    relationship(
        xml,
        &format!("rId{}", sheet_count + 1),
        &format!("{}/styles", OFFICE_REL),
        "styles.xml",
    )?;

    xml.end_element("Relationships")?;
    xml.flush()
}

fn relationship<W: Write>(xml: &mut XmlWriter<W>, id: &str, kind: &str, target: &str) -> Result<()> {
    xml.start_element("Relationship")?;
    xml.attribute("Id", id)?;
    xml.attribute("Type", kind)?;
    xml.attribute("Target", target)?;
    xml.close_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut XmlWriter<&mut Vec<u8>>) -> Result<()>,
    {
        let mut out = Vec::new();
        {
            let mut xml = XmlWriter::new(&mut out);
            f(&mut xml).unwrap();
            xml.flush().unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_worksheet_part_names() {
        assert_eq!(PartLocator::worksheet(1), "xl/worksheets/sheet1.xml");
        let parts = PartLocator::new(2).parts();
        assert_eq!(parts.len(), 9);
        assert_eq!(parts[0], "[Content_Types].xml");
        assert_eq!(parts[8], "xl/worksheets/sheet2.xml");
    }

    #[test]
    fn test_fs_path_stays_under_root() {
        let root = Path::new("/tmp/work");
        assert_eq!(
            PartLocator::fs_path(root, "xl/worksheets/sheet3.xml", Phase::Extract, None).unwrap(),
            root.join("xl").join("worksheets").join("sheet3.xml")
        );
        assert!(PartLocator::fs_path(root, "../evil.xml", Phase::Extract, None).is_err());
        assert!(PartLocator::fs_path(root, "/etc/passwd", Phase::Extract, None).is_err());
        assert!(PartLocator::fs_path(root, "xl/../../x", Phase::Extract, None).is_err());
        assert!(PartLocator::fs_path(root, "", Phase::Extract, None).is_err());
    }

    #[test]
    fn test_workbook_declares_sheets_in_order() {
        let xml = render(|w| write_workbook(w, &["b", "a & c"]));
        let b = xml.find("name=\"b\" sheetId=\"1\" r:id=\"rId1\"").unwrap();
        let a = xml
            .find("name=\"a &amp; c\" sheetId=\"2\" r:id=\"rId2\"")
            .unwrap();
        assert!(b < a);
    }

    #[test]
    fn test_rels_and_content_types_cover_every_sheet() {
        let rels = render(|w| write_workbook_rels(w, 2));
        assert!(rels.contains("Id=\"rId2\""));
        assert!(rels.contains("Target=\"worksheets/sheet2.xml\""));
        assert!(rels.contains("Id=\"rId3\"") && rels.contains("Target=\"styles.xml\""));

        let types = render(|w| write_content_types(w, 2));
        assert!(types.contains("PartName=\"/xl/worksheets/sheet1.xml\""));
        assert!(types.contains("PartName=\"/xl/worksheets/sheet2.xml\""));
        assert!(!types.contains("sheet3"));
    }

    #[test]
    fn test_core_props_timestamp() {
        use chrono::TimeZone;
        let at = chrono::Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap();
        let xml = render(|w| write_core_props(w, at));
        assert!(xml.contains(">2025-02-03T04:05:06Z</dcterms:created>"));
    }
}
