use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::Result;
use crate::table::TableSet;

/// Writes a table set as a JSON snapshot, reloadable without re-running the
/// simulation oracle.
pub fn save_tables(tables: &TableSet, path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(path.as_ref())?;
    serde_json::to_writer(BufWriter::new(file), tables)?;
    log::info!(
        "saved {} table(s) to {:?}",
        tables.len(),
        path.as_ref()
    );
    Ok(())
}

pub fn load_tables(path: impl AsRef<Path>) -> Result<TableSet> {
    let file = File::open(path.as_ref())?;
    let tables = serde_json::from_reader(BufReader::new(file))?;
    Ok(tables)
}
