//! CSV parsing for file-backed dataset providers

mod parser;

pub use parser::{infer_value, CsvParser};
