//! Sheet construction: header styling, per-column formats and widths

use crate::error::{ExportError, Result};
use crate::style::{StyleDescriptor, StyleRecorder, DATETIME_FORMAT};
use crate::types::{CellValue, Dataset};
use indexmap::IndexMap;

/// Longest cell text that still widens a column
pub const MAX_WIDTH_CHARS: usize = 45;

/// Empirical character-to-width factor
pub const WIDTH_SCALE: f64 = 1.20;

/// Rows a worksheet can hold, header included
pub const MAX_ROWS: usize = 1_048_576;

/// Columns a worksheet can hold (A..XFD)
pub const MAX_COLUMNS: usize = 16_384;

/// A value plus its style catalog index (0 = default style)
#[derive(Debug, Clone, PartialEq)]
pub struct SheetCell {
    pub value: CellValue,
    pub style: u32,
}

impl SheetCell {
    pub fn new(value: CellValue, style: u32) -> Self {
        SheetCell { value, style }
    }
}

/// One sheet held in memory between building and archiving
#[derive(Debug, Clone)]
pub struct Sheet {
    /// Dataset the sheet was built from
    pub dataset: String,
    /// Final sheet name
    pub name: String,
    /// Header row first; every row has exactly `column_count()` cells
    pub rows: Vec<Vec<SheetCell>>,
    /// One width per column; empty when the sheet is unsized
    pub column_widths: Vec<f64>,
    /// Source rows that were longer than the header and got cut
    pub truncated_rows: usize,
}

impl Sheet {
    pub fn column_count(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn data_row_count(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    /// Highest style index any cell references
    pub fn max_style_index(&self) -> u32 {
        self.rows
            .iter()
            .flat_map(|row| row.iter().map(|c| c.style))
            .max()
            .unwrap_or(0)
    }
}

/// Width of one column from its cell text lengths
///
/// `max_len` is capped at [`MAX_WIDTH_CHARS`]; `total_len` sums every cell
/// including the header. A column dominated by a few long outliers gets
/// the midpoint of max and average instead of the max.
pub fn column_width(max_len: usize, total_len: usize, data_rows: usize, header_len: usize) -> f64 {
    let max_len = max_len.min(MAX_WIDTH_CHARS);
    let avg_len = total_len.div_ceil(data_rows + 1);
    let basis = if max_len > 2 * avg_len {
        (max_len + avg_len) / 2
    } else {
        max_len
    };
    basis.max(header_len) as f64 * WIDTH_SCALE
}

/// Turns datasets into sheets, recording the styles they use
#[derive(Debug, Clone)]
pub struct SheetBuilder {
    styled: bool,
    header_style: StyleDescriptor,
    column_formats: IndexMap<String, String>,
}

impl Default for SheetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetBuilder {
    /// Styled builder with the stock header style
    pub fn new() -> Self {
        SheetBuilder {
            styled: true,
            header_style: StyleDescriptor::header(),
            column_formats: IndexMap::new(),
        }
    }

    /// Builder that records no styles and computes no widths
    pub fn plain() -> Self {
        SheetBuilder {
            styled: false,
            ..Self::new()
        }
    }

    pub fn header_style(mut self, style: StyleDescriptor) -> Self {
        self.header_style = style;
        self
    }

    /// Number format for the data cells under the header `column`
    pub fn column_format(mut self, column: impl Into<String>, code: impl Into<String>) -> Self {
        self.column_formats.insert(column.into(), code.into());
        self
    }

    pub fn column_formats(mut self, formats: IndexMap<String, String>) -> Self {
        self.column_formats = formats;
        self
    }

    pub fn is_styled(&self) -> bool {
        self.styled
    }

    /// Build the sheet `name` from `dataset`
    ///
    /// Every style the sheet references is recorded in `catalog` before
    /// this returns, so a snapshot taken afterwards covers the sheet.
    /// A dataset without columns yields [`ExportError::EmptySheet`].
    pub fn build<R: StyleRecorder>(
        &self,
        name: &str,
        dataset: Dataset,
        catalog: &mut R,
    ) -> Result<Sheet> {
        let Dataset { id, rows } = dataset;
        let row_count = rows.len();
        let mut rows = rows.into_iter();
        let header = match rows.next() {
            Some(header) if !header.is_empty() => header,
            _ => return Err(ExportError::EmptySheet { dataset: id }),
        };
        let columns = header.len();
        if row_count > MAX_ROWS || columns > MAX_COLUMNS {
            return Err(ExportError::SheetTooLarge {
                dataset: id,
                rows: row_count,
                columns,
            });
        }

        let header_index = if self.styled {
            catalog.record(&self.header_style)
        } else {
            0
        };

        // Styles of data cells, one per column, recorded up front
        let column_styles: Vec<Option<u32>> = header
            .iter()
            .map(|h| match self.column_formats.get(&h.as_string()) {
                Some(code) if self.styled => {
                    Some(catalog.record(&StyleDescriptor::with_number_format(code.as_str())))
                }
                _ => None,
            })
            .collect();
        let mut datetime_index: Option<u32> = None;

        let mut max_lens: Vec<usize> = header.iter().map(CellValue::char_len).collect();
        let mut total_lens = max_lens.clone();
        let header_lens = max_lens.clone();

        let mut out_rows = Vec::with_capacity(rows.size_hint().0 + 1);
        out_rows.push(
            header
                .into_iter()
                .map(|v| SheetCell::new(v, header_index))
                .collect(),
        );

        let mut truncated_rows = 0;
        for mut row in rows {
            if row.len() > columns {
                row.truncate(columns);
                truncated_rows += 1;
            }
            row.resize(columns, CellValue::Empty);

            let mut cells = Vec::with_capacity(columns);
            for (col, value) in row.into_iter().enumerate() {
                let len = value.char_len();
                max_lens[col] = max_lens[col].max(len);
                total_lens[col] += len;

                let style = match column_styles[col] {
                    Some(index) => index,
                    None if self.styled && matches!(value, CellValue::DateTime(_)) => {
                        *datetime_index.get_or_insert_with(|| {
                            catalog.record(&StyleDescriptor::with_number_format(DATETIME_FORMAT))
                        })
                    }
                    None => 0,
                };
                cells.push(SheetCell::new(value, style));
            }
            out_rows.push(cells);
        }

        let data_rows = out_rows.len() - 1;
        let column_widths = if self.styled {
            (0..columns)
                .map(|c| column_width(max_lens[c], total_lens[c], data_rows, header_lens[c]))
                .collect()
        } else {
            Vec::new()
        };

        if truncated_rows > 0 {
            log::warn!(
                "dataset '{}': {} rows longer than the header were truncated",
                id,
                truncated_rows
            );
        }

        Ok(Sheet {
            dataset: id,
            name: name.to_string(),
            rows: out_rows,
            column_widths,
            truncated_rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::StyleCatalog;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_column_width_rules() {
        // uniform column: basis is max_len
        assert!(approx(column_width(10, 30, 2, 2), 12.0));
        // one long outlier: midpoint of max and average
        // avg = ceil(45 / 5) = 9, max 40 > 18 -> (40 + 9) / 2 = 24
        assert!(approx(column_width(40, 45, 4, 2), 24.0 * 1.2));
        // max capped at 45
        assert!(approx(column_width(200, 200, 0, 3), 45.0 * 1.2));
        // header wins when longer
        assert!(approx(column_width(3, 6, 1, 20), 24.0));
    }

    #[test]
    fn test_header_styled_with_single_entry() {
        let mut catalog = StyleCatalog::new();
        let builder = SheetBuilder::new();
        let a = builder
            .build("a", Dataset::new("a", vec![vec!["id"], vec!["1"]]), &mut catalog)
            .unwrap();
        let b = builder
            .build("b", Dataset::new("b", vec![vec!["x", "y"]]), &mut catalog)
            .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(a.rows[0][0].style, 1);
        assert!(b.rows[0].iter().all(|c| c.style == 1));
        assert_eq!(a.rows[1][0].style, 0);
    }

    #[test]
    fn test_header_only_sheet_still_sized() {
        let mut catalog = StyleCatalog::new();
        let sheet = SheetBuilder::new()
            .build("h", Dataset::new("h", vec![vec!["name"]]), &mut catalog)
            .unwrap();

        assert_eq!(sheet.data_row_count(), 0);
        assert_eq!(sheet.column_count(), 1);
        assert!(approx(sheet.column_widths[0], 4.0 * 1.2));
    }

    #[test]
    fn test_zero_columns_is_empty_sheet() {
        let mut catalog = StyleCatalog::new();
        let builder = SheetBuilder::new();

        let err = builder
            .build("e", Dataset::new("e", vec![Vec::<CellValue>::new()]), &mut catalog)
            .unwrap_err();
        assert!(matches!(err, ExportError::EmptySheet { ref dataset } if dataset == "e"));

        let err = builder
            .build("n", Dataset::new("n", Vec::<Vec<CellValue>>::new()), &mut catalog)
            .unwrap_err();
        assert!(err.is_recoverable());
        // nothing recorded for skipped datasets
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_too_many_columns() {
        let mut catalog = StyleCatalog::new();
        let header: Vec<CellValue> = (0..=MAX_COLUMNS).map(|_| CellValue::from("c")).collect();
        let ds = Dataset {
            id: "wide".to_string(),
            rows: vec![header],
        };

        let err = SheetBuilder::new().build("wide", ds, &mut catalog).unwrap_err();
        assert!(matches!(
            err,
            ExportError::SheetTooLarge { ref dataset, columns, .. }
                if dataset == "wide" && columns == MAX_COLUMNS + 1
        ));
        assert!(!err.is_recoverable());
        assert_eq!(catalog.len(), 1);

        let ds = Dataset {
            id: "edge".to_string(),
            rows: vec![(0..MAX_COLUMNS).map(|_| CellValue::Empty).collect()],
        };
        let sheet = SheetBuilder::plain().build("edge", ds, &mut catalog).unwrap();
        assert_eq!(sheet.column_count(), MAX_COLUMNS);
    }

    #[test]
    fn test_too_many_rows() {
        let mut catalog = StyleCatalog::new();
        let mut rows = vec![Vec::<CellValue>::new(); MAX_ROWS + 1];
        rows[0] = vec!["h".into()];
        let ds = Dataset {
            id: "tall".to_string(),
            rows,
        };

        let err = SheetBuilder::new().build("tall", ds, &mut catalog).unwrap_err();
        assert!(matches!(
            err,
            ExportError::SheetTooLarge { ref dataset, rows, columns: 1 }
                if dataset == "tall" && rows == MAX_ROWS + 1
        ));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_rows_padded_and_truncated() {
        let mut catalog = StyleCatalog::new();
        let ds = Dataset {
            id: "r".to_string(),
            rows: vec![
                vec!["a".into(), "b".into()],
                vec![1i64.into()],
                vec![1i64.into(), 2i64.into(), 3i64.into()],
            ],
        };
        let sheet = SheetBuilder::new().build("r", ds, &mut catalog).unwrap();

        assert_eq!(sheet.truncated_rows, 1);
        assert!(sheet.rows.iter().all(|r| r.len() == 2));
        assert_eq!(sheet.rows[1][1].value, CellValue::Empty);
    }

    #[test]
    fn test_column_formats_and_datetimes() {
        let mut catalog = StyleCatalog::new();
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let ds = Dataset {
            id: "f".to_string(),
            rows: vec![
                vec!["amount".into(), "when".into()],
                vec![1.5.into(), date.into()],
                vec![2.25.into(), date.into()],
            ],
        };
        let sheet = SheetBuilder::new()
            .column_format("amount", "#,##0.00")
            .build("f", ds, &mut catalog)
            .unwrap();

        let amount = catalog
            .iter()
            .position(|d| d.number_format == "#,##0.00")
            .unwrap() as u32;
        let when = catalog
            .iter()
            .position(|d| d.number_format == DATETIME_FORMAT)
            .unwrap() as u32;
        assert_eq!(sheet.rows[1][0].style, amount);
        assert_eq!(sheet.rows[2][1].style, when);
        assert_eq!(sheet.max_style_index(), 3);
    }

    #[test]
    fn test_plain_builder_records_nothing() {
        let mut catalog = StyleCatalog::new();
        let sheet = SheetBuilder::plain()
            .column_format("id", "0.00")
            .build("p", Dataset::new("p", vec![vec!["id"], vec!["7"]]), &mut catalog)
            .unwrap();

        assert_eq!(catalog.len(), 1);
        assert!(sheet.column_widths.is_empty());
        assert_eq!(sheet.max_style_index(), 0);
    }
}
