//! Style descriptors and the run-scoped style catalog
//!
//! A [`StyleDescriptor`] is a plain value: two descriptors with the same
//! font, fill, border, number format and alignment are the same style.
//! The [`StyleCatalog`] assigns each distinct descriptor a stable index,
//! which is the `s` attribute cells carry in worksheet parts and the
//! position of the matching `<xf>` in `styles.xml`.

use indexmap::IndexSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Fill color of the header row
pub const HEADER_FILL_COLOR: &str = "FF1F4E78";

/// Number format applied to date/time cells
pub const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontStyle {
    pub name: String,
    /// Size in points
    pub size: u16,
    /// ARGB hex, e.g. "FFFFFFFF"
    pub color: Option<String>,
    pub bold: bool,
}

impl Default for FontStyle {
    fn default() -> Self {
        FontStyle {
            name: "Calibri".to_string(),
            size: 11,
            color: None,
            bold: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PatternType {
    #[default]
    None,
    Solid,
    Gray125,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::None => "none",
            PatternType::Solid => "solid",
            PatternType::Gray125 => "gray125",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FillStyle {
    pub pattern: PatternType,
    /// ARGB foreground color
    pub color: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorderLine {
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
}

impl BorderLine {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorderLine::Thin => "thin",
            BorderLine::Medium => "medium",
            BorderLine::Thick => "thick",
            BorderLine::Dashed => "dashed",
            BorderLine::Dotted => "dotted",
            BorderLine::Double => "double",
        }
    }
}

/// Four sides, each a line style or none
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BorderStyle {
    pub left: Option<BorderLine>,
    pub right: Option<BorderLine>,
    pub top: Option<BorderLine>,
    pub bottom: Option<BorderLine>,
}

impl BorderStyle {
    /// Same line on all four sides
    pub fn all(line: BorderLine) -> Self {
        BorderStyle {
            left: Some(line),
            right: Some(line),
            top: Some(line),
            bottom: Some(line),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HorizontalAlignment {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerticalAlignment {
    Top,
    Center,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AlignmentStyle {
    pub horizontal: Option<HorizontalAlignment>,
    pub vertical: Option<VerticalAlignment>,
}

impl AlignmentStyle {
    pub fn is_default(&self) -> bool {
        self.horizontal.is_none() && self.vertical.is_none()
    }
}

/// Immutable bundle of formatting attributes for one cell
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StyleDescriptor {
    pub font: FontStyle,
    pub fill: FillStyle,
    pub border: BorderStyle,
    /// Number format code, "General" for none
    pub number_format: String,
    pub alignment: AlignmentStyle,
}

impl Default for StyleDescriptor {
    fn default() -> Self {
        StyleDescriptor {
            font: FontStyle::default(),
            fill: FillStyle::default(),
            border: BorderStyle::default(),
            number_format: "General".to_string(),
            alignment: AlignmentStyle::default(),
        }
    }
}

impl StyleDescriptor {
    /// Bold light text on a solid brand fill, centered, no borders
    pub fn header() -> Self {
        StyleDescriptor {
            font: FontStyle {
                bold: true,
                color: Some("FFFFFFFF".to_string()),
                ..FontStyle::default()
            },
            fill: FillStyle {
                pattern: PatternType::Solid,
                color: Some(HEADER_FILL_COLOR.to_string()),
            },
            border: BorderStyle::default(),
            number_format: "General".to_string(),
            alignment: AlignmentStyle {
                horizontal: Some(HorizontalAlignment::Center),
                vertical: Some(VerticalAlignment::Center),
            },
        }
    }

    /// Default style with only the number format changed
    pub fn with_number_format(code: impl Into<String>) -> Self {
        StyleDescriptor {
            number_format: code.into(),
            ..StyleDescriptor::default()
        }
    }
}

/// Anything that can hand out catalog indices for descriptors
pub trait StyleRecorder {
    fn record(&mut self, descriptor: &StyleDescriptor) -> u32;
}

/// Run-scoped registry of distinct style descriptors
///
/// Index 0 is always the default descriptor, so unstyled cells need no
/// `s` attribute. Entries are never removed or reordered.
#[derive(Debug, Clone)]
pub struct StyleCatalog {
    entries: IndexSet<StyleDescriptor>,
}

impl Default for StyleCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleCatalog {
    pub fn new() -> Self {
        let mut entries = IndexSet::new();
        entries.insert(StyleDescriptor::default());
        StyleCatalog { entries }
    }

    /// Index of `descriptor`, appending it on first sight
    pub fn record(&mut self, descriptor: &StyleDescriptor) -> u32 {
        if let Some(index) = self.entries.get_index_of(descriptor) {
            return index as u32;
        }
        let (index, _) = self.entries.insert_full(descriptor.clone());
        log::debug!("style catalog: new entry {}", index);
        index as u32
    }

    pub fn get(&self, index: u32) -> Option<&StyleDescriptor> {
        self.entries.get_index(index as usize)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true: the default entry is always present
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_index(&self, index: u32) -> bool {
        (index as usize) < self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StyleDescriptor> {
        self.entries.iter()
    }

    /// Frozen copy of the entries recorded so far, in catalog order
    pub fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            entries: self.entries.iter().cloned().collect(),
        }
    }
}

impl StyleRecorder for StyleCatalog {
    fn record(&mut self, descriptor: &StyleDescriptor) -> u32 {
        StyleCatalog::record(self, descriptor)
    }
}

/// Catalog contents at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSnapshot {
    entries: Vec<StyleDescriptor>,
}

impl CatalogSnapshot {
    pub fn entries(&self) -> &[StyleDescriptor] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_index(&self, index: u32) -> bool {
        (index as usize) < self.entries.len()
    }
}

impl From<&StyleCatalog> for CatalogSnapshot {
    fn from(catalog: &StyleCatalog) -> Self {
        catalog.snapshot()
    }
}

/// Catalog shared between worker threads; every record goes through one lock
#[derive(Debug, Clone, Default)]
pub struct SharedCatalog {
    inner: Arc<Mutex<StyleCatalog>>,
}

impl SharedCatalog {
    pub fn new(catalog: StyleCatalog) -> Self {
        SharedCatalog {
            inner: Arc::new(Mutex::new(catalog)),
        }
    }

    // insert_full is the only mutation; a poisoned set is still consistent
    fn lock(&self) -> MutexGuard<'_, StyleCatalog> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record(&self, descriptor: &StyleDescriptor) -> u32 {
        self.lock().record(descriptor)
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        self.lock().snapshot()
    }

    /// Copy of the catalog as it stands now
    pub fn to_catalog(&self) -> StyleCatalog {
        self.lock().clone()
    }
}

impl StyleRecorder for &SharedCatalog {
    fn record(&mut self, descriptor: &StyleDescriptor) -> u32 {
        SharedCatalog::record(self, descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_entry_is_index_zero() {
        let mut catalog = StyleCatalog::new();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.record(&StyleDescriptor::default()), 0);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_structurally_equal_descriptors_share_index() {
        let mut catalog = StyleCatalog::new();
        let a = catalog.record(&StyleDescriptor::header());
        let b = catalog.record(&StyleDescriptor::header());
        assert_eq!(a, b);
        assert_eq!(a, 1);

        let date = catalog.record(&StyleDescriptor::with_number_format(DATETIME_FORMAT));
        assert_eq!(date, 2);
        assert_eq!(catalog.record(&StyleDescriptor::header()), 1);
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_single_field_difference_is_a_new_entry() {
        let mut catalog = StyleCatalog::new();
        let mut bordered = StyleDescriptor::header();
        bordered.border = BorderStyle::all(BorderLine::Thin);
        let a = catalog.record(&StyleDescriptor::header());
        let b = catalog.record(&bordered);
        assert_ne!(a, b);
        assert_eq!(catalog.get(b), Some(&bordered));
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let mut catalog = StyleCatalog::new();
        catalog.record(&StyleDescriptor::header());
        let snapshot = catalog.snapshot();
        catalog.record(&StyleDescriptor::with_number_format("0.00"));

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains_index(1));
        assert!(!snapshot.contains_index(2));
        assert_eq!(&snapshot.entries()[1], catalog.get(1).unwrap());
    }

    #[test]
    fn test_shared_catalog_across_threads() {
        let shared = SharedCatalog::default();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || shared.record(&StyleDescriptor::header()))
            })
            .collect();
        let indices: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(indices.iter().all(|&i| i == 1));
        assert_eq!(shared.to_catalog().len(), 2);
    }
}
