//! Sheet name resolution
//!
//! Identifiers of up to [`MAX_SHEET_NAME_LEN`] UTF-16 code units are used
//! as-is. Longer ones are cut to 29 units and given a two-digit suffix from
//! a counter shared by the whole run, so several long identifiers with the
//! same prefix still come out distinct.

use crate::error::{ExportError, Result};
use indexmap::{IndexMap, IndexSet};

/// Longest sheet name the format allows, in UTF-16 code units
pub const MAX_SHEET_NAME_LEN: usize = 31;

const PREFIX_LEN: usize = MAX_SHEET_NAME_LEN - 2;
const MAX_COUNTER: u32 = 99;

/// Dataset identifier -> sheet name, in input order
pub type SheetNameMap = IndexMap<String, String>;

/// Length of `name` as spreadsheet applications count it
pub fn sheet_name_len(name: &str) -> usize {
    name.encode_utf16().count()
}

/// Longest prefix of `name` that fits in `units` UTF-16 code units
fn utf16_prefix(name: &str, units: usize) -> &str {
    let mut used = 0;
    for (index, ch) in name.char_indices() {
        used += ch.len_utf16();
        if used > units {
            return &name[..index];
        }
    }
    name
}

/// Map every identifier to a unique sheet name of at most 31 UTF-16 units
///
/// Generated names are checked against all original identifiers and all
/// names assigned so far; the counter skips any collision. Running out of
/// two-digit suffixes is [`ExportError::NameCollisionUnresolvable`].
pub fn resolve_sheet_names<S: AsRef<str>>(ids: &[S]) -> Result<SheetNameMap> {
    let originals: IndexSet<&str> = ids.iter().map(|id| id.as_ref()).collect();
    if originals.len() != ids.len() {
        let mut seen = IndexSet::new();
        for id in ids {
            if !seen.insert(id.as_ref()) {
                return Err(ExportError::DuplicateDataset(id.as_ref().to_string()));
            }
        }
    }

    // Short names are claimed first so a generated name never takes one
    let mut assigned: IndexSet<String> = originals
        .iter()
        .filter(|id| sheet_name_len(id) <= MAX_SHEET_NAME_LEN)
        .map(|id| id.to_string())
        .collect();

    let mut map = SheetNameMap::with_capacity(ids.len());
    let mut counter: u32 = 0;

    for id in &originals {
        if sheet_name_len(id) <= MAX_SHEET_NAME_LEN {
            map.insert(id.to_string(), id.to_string());
            continue;
        }

        let prefix = utf16_prefix(id, PREFIX_LEN);
        let name = loop {
            if counter > MAX_COUNTER {
                return Err(ExportError::NameCollisionUnresolvable {
                    dataset: id.to_string(),
                });
            }
            let candidate = format!("{}{:02}", prefix, counter);
            counter += 1;
            if !originals.contains(candidate.as_str()) && !assigned.contains(&candidate) {
                break candidate;
            }
            log::debug!("sheet name '{}' already taken, advancing counter", candidate);
        };

        log::info!("dataset '{}' renamed to sheet '{}'", id, name);
        assigned.insert(name.clone());
        map.insert(id.to_string(), name);
    }

    Ok(map)
}
