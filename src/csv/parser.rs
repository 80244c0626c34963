//! CSV parsing with RFC 4180-like behavior

use crate::types::CellValue;
use std::io::BufRead;

/// CSV parser for reading CSV data
pub struct CsvParser {
    delimiter: u8,
    quote_char: u8,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new(b',', b'"')
    }
}

impl CsvParser {
    /// Create a new CSV parser with custom delimiter and quote character
    pub fn new(delimiter: u8, quote_char: u8) -> Self {
        Self {
            delimiter,
            quote_char,
        }
    }

    /// Parse one record into fields; the flag is true for quoted fields
    fn split_record(&self, record: &str) -> Vec<(String, bool)> {
        let quote = self.quote_char as char;
        let delimiter = self.delimiter as char;
        let mut fields = Vec::new();
        let mut current = String::new();
        let mut quoted = false;
        let mut in_quotes = false;
        let mut chars = record.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch == quote {
                if in_quotes {
                    // Check for escaped quote ("")
                    if chars.peek() == Some(&quote) {
                        current.push(quote);
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                    quoted = true;
                }
            } else if ch == delimiter && !in_quotes {
                fields.push((std::mem::take(&mut current), quoted));
                quoted = false;
            } else {
                current.push(ch);
            }
        }

        fields.push((current, quoted));
        fields
    }

    /// Parse CSV line into fields
    pub fn parse_line(&self, line: &str) -> Vec<String> {
        self.split_record(line).into_iter().map(|(f, _)| f).collect()
    }

    /// Parse a record into typed values
    ///
    /// Quoted fields are always text; unquoted fields are inferred.
    pub fn parse_values(&self, record: &str) -> Vec<CellValue> {
        self.split_record(record)
            .into_iter()
            .map(|(field, quoted)| {
                if quoted {
                    CellValue::String(field)
                } else {
                    infer_value(&field)
                }
            })
            .collect()
    }

    /// True when `record` leaves a quoted field open
    pub fn has_open_quote(&self, record: &str) -> bool {
        record.bytes().filter(|&b| b == self.quote_char).count() % 2 == 1
    }

    /// Read whole records, joining physical lines inside quoted fields
    ///
    /// A line break inside quotes is kept as it was written (LF or CRLF);
    /// the CR of a CRLF record terminator is dropped.
    pub fn read_records<R: BufRead>(&self, mut reader: R) -> std::io::Result<Vec<String>> {
        let mut records = Vec::new();
        let mut pending = String::new();
        let mut open = false;

        loop {
            let read = reader.read_line(&mut pending)?;
            if read == 0 {
                break;
            }
            open = self.has_open_quote(&pending);
            if !open {
                records.push(finish_record(&mut pending));
            }
        }
        if open {
            records.push(finish_record(&mut pending));
        }
        Ok(records)
    }
}

/// Take a complete record, dropping its LF or CRLF terminator
fn finish_record(pending: &mut String) -> String {
    if pending.ends_with('\n') {
        pending.pop();
        if pending.ends_with('\r') {
            pending.pop();
        }
    }
    std::mem::take(pending)
}

/// Type of an unquoted field: empty, integer, float, boolean, else text
pub fn infer_value(field: &str) -> CellValue {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return CellValue::Empty;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        // Leading zeros stay text
        if !(trimmed.len() > 1 && trimmed.starts_with('0')) {
            return CellValue::Int(i);
        }
        return CellValue::String(field.to_string());
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return CellValue::Float(f);
        }
    }
    match trimmed {
        "true" | "TRUE" | "True" => CellValue::Bool(true),
        "false" | "FALSE" | "False" => CellValue::Bool(false),
        _ => CellValue::String(field.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple() {
        let parser = CsvParser::new(b',', b'"');
        assert_eq!(parser.parse_line("a,b,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_quoted() {
        let parser = CsvParser::new(b',', b'"');
        assert_eq!(parser.parse_line(r#""a,b",c"#), vec!["a,b", "c"]);
    }

    #[test]
    fn test_escaped_quotes() {
        let parser = CsvParser::new(b',', b'"');
        assert_eq!(
            parser.parse_line(r#""Say ""Hello""",world"#),
            vec![r#"Say "Hello""#, "world"]
        );
    }

    #[test]
    fn test_empty_fields() {
        let parser = CsvParser::new(b',', b'"');
        assert_eq!(parser.parse_line("a,,c"), vec!["a", "", "c"]);
    }

    #[test]
    fn test_custom_delimiter() {
        let parser = CsvParser::new(b';', b'"');
        assert_eq!(parser.parse_line(r#"a;"b;c";d"#), vec!["a", "b;c", "d"]);
    }

    #[test]
    fn test_typed_values() {
        let parser = CsvParser::default();
        assert_eq!(
            parser.parse_values(r#"42,-1.5,true,,"7",007,x"#),
            vec![
                CellValue::Int(42),
                CellValue::Float(-1.5),
                CellValue::Bool(true),
                CellValue::Empty,
                CellValue::String("7".to_string()),
                CellValue::String("007".to_string()),
                CellValue::String("x".to_string()),
            ]
        );
        assert_eq!(infer_value("0"), CellValue::Int(0));
        assert_eq!(infer_value("inf"), CellValue::String("inf".to_string()));
    }

    #[test]
    fn test_records_spanning_lines() {
        let parser = CsvParser::default();
        let input = "id,note\r\n1,\"line 1\nline 2\"\n2,plain\n";
        let records = parser.read_records(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(
            parser.parse_line(&records[1]),
            vec!["1", "line 1\nline 2"]
        );
    }

    #[test]
    fn test_crlf_inside_quotes_is_kept() {
        let parser = CsvParser::default();
        let input = "id,note\r\n1,\"first\r\nsecond\"\r\n2,\"open";
        let records = parser.read_records(input.as_bytes()).unwrap();

        assert_eq!(records[0], "id,note");
        assert_eq!(
            parser.parse_line(&records[1]),
            vec!["1", "first\r\nsecond"]
        );
        // unterminated quote at end of input still yields a record
        assert_eq!(records.len(), 3);
        assert_eq!(records[2], "2,\"open");
    }
}
