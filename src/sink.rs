use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{EtlError, Result};
use crate::table::Table;

/// Bulk-load sink for produced tables.
///
/// Loading a table replaces the destination's prior contents entirely
/// (delete-then-insert, not upsert). The pipeline calls this once per table
/// and is agnostic to the storage behind it.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn bulk_load(&self, destination: &str, table: &Table) -> Result<()>;
}

/// Sink that materializes each table as `<destination>.csv` under a base
/// directory, overwriting any prior file.
pub struct CsvDirSink {
    base_dir: PathBuf,
}

impl CsvDirSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl Sink for CsvDirSink {
    async fn bulk_load(&self, destination: &str, table: &Table) -> Result<()> {
        let path = self.base_dir.join(format!("{}.csv", destination));
        table
            .write_csv_path(&path)
            .map_err(|e| EtlError::Sink {
                destination: destination.to_string(),
                message: e.to_string(),
            })?;
        debug!(
            destination,
            rows = table.len(),
            path = %path.display(),
            "bulk loaded table"
        );
        Ok(())
    }
}

/// In-memory sink implementation for development/testing.
pub struct MemorySink {
    tables: Arc<Mutex<HashMap<String, Table>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn get(&self, destination: &str) -> Option<Table> {
        self.tables.lock().unwrap().get(destination).cloned()
    }

    pub fn destinations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn bulk_load(&self, destination: &str, table: &Table) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        tables.insert(destination.to_string(), table.clone());
        debug!(destination, rows = table.len(), "bulk loaded table");
        Ok(())
    }
}
