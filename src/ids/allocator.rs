//! Counter table persistence and lock-serialized allocation.

use super::format::{canonical_key, ensure_distinct_infix, format_id};
use crate::config::{Config, IdFormatConfig};
use crate::context::DocketContext;
use crate::error::{DocketError, Result};
use crate::locks::{RepoLock, RetryPolicy};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Persisted counters: namespace -> category -> last allocated value.
pub type CounterTable = BTreeMap<String, BTreeMap<String, u64>>;

/// Hands out unique, increasing IDs per (namespace, category).
#[derive(Debug, Clone)]
pub struct IdAllocator {
    lock: RepoLock,
    counters_path: PathBuf,
    formats: BTreeMap<String, IdFormatConfig>,
    retry: RetryPolicy,
    holder_id: String,
}

impl IdAllocator {
    /// Allocator over `counters_path`, serialized by `lock`.
    ///
    /// Fails fast on contention; use [`IdAllocator::with_retry`] to wait.
    pub fn new<P: AsRef<Path>>(
        lock: RepoLock,
        counters_path: P,
        formats: BTreeMap<String, IdFormatConfig>,
    ) -> Self {
        Self {
            lock,
            counters_path: counters_path.as_ref().to_path_buf(),
            formats,
            retry: RetryPolicy::no_retry(),
            holder_id: "id-allocator".to_string(),
        }
    }

    /// Allocator for a coordination domain, waiting per the configured policy.
    pub fn for_context(ctx: &DocketContext, config: &Config) -> Self {
        Self::new(
            RepoLock::for_context(ctx, config),
            ctx.counters_path(),
            config.id_formats.clone(),
        )
        .with_retry(config.retry_policy())
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Holder id written into the lock record while allocating.
    pub fn with_holder(mut self, holder_id: impl Into<String>) -> Self {
        self.holder_id = holder_id.into();
        self
    }

    pub fn counters_path(&self) -> &Path {
        &self.counters_path
    }

    /// Allocate the next ID for `(namespace, category)`.
    ///
    /// Keys are case-insensitive: `brik/Card` and `BRIK/card` share one
    /// counter. Fails with `LockHeld` or `LockError` rather than ever
    /// returning an ID that was not reserved under the lock.
    pub fn allocate(&self, namespace: &str, category: &str) -> Result<String> {
        let (namespace, category) = canonical_key(namespace, category)?;
        let (namespace, category) = (namespace.as_str(), category.as_str());

        let purpose = format!("allocate {}/{}", namespace, category);
        let value = self
            .retry
            .with_lock(&self.lock, &self.holder_id, &purpose, || {
                let mut table = load_table(&self.counters_path)?;
                let cell = self.counter_cell(&mut table, namespace, category)?;
                *cell = cell.checked_add(1).ok_or_else(|| {
                    DocketError::UserError(format!(
                        "counter {}/{} is exhausted",
                        namespace, category
                    ))
                })?;
                let value = *cell;
                save_table(&self.counters_path, &table)?;
                Ok(value)
            })?;

        let id = self.format_id(namespace, category, value);
        info!(id = %id, namespace, category, "allocated id");
        Ok(id)
    }

    /// Last allocated value for `(namespace, category)`, 0 if none.
    ///
    /// Reads without the lock; the table is only ever replaced whole.
    pub fn peek(&self, namespace: &str, category: &str) -> Result<u64> {
        let (namespace, category) = canonical_key(namespace, category)?;

        let table = load_table(&self.counters_path)?;
        Ok(table
            .get(&namespace)
            .and_then(|categories| categories.get(&category))
            .copied()
            .unwrap_or(0))
    }

    /// Set the counter so the next allocation yields `value + 1`.
    ///
    /// Counters may only move forward: lowering one would re-issue IDs.
    pub fn reset(&self, namespace: &str, category: &str, value: u64) -> Result<()> {
        let (namespace, category) = canonical_key(namespace, category)?;
        let (namespace, category) = (namespace.as_str(), category.as_str());

        let purpose = format!("reset {}/{}", namespace, category);
        self.retry
            .with_lock(&self.lock, &self.holder_id, &purpose, || {
                let mut table = load_table(&self.counters_path)?;
                let cell = self.counter_cell(&mut table, namespace, category)?;

                if value < *cell {
                    return Err(DocketError::UserError(format!(
                        "refusing to lower counter {}/{} from {} to {}",
                        namespace, category, *cell, value
                    )));
                }

                let previous = *cell;
                *cell = value;
                save_table(&self.counters_path, &table)?;
                warn!(namespace, category, previous, value, "counter reset");
                Ok(())
            })
    }

    /// The counter for a canonical key, created at 0. Refuses a category whose
    /// IDs would be indistinguishable from another category's.
    fn counter_cell<'t>(
        &self,
        table: &'t mut CounterTable,
        namespace: &str,
        category: &str,
    ) -> Result<&'t mut u64> {
        let categories = table.entry(namespace.to_string()).or_default();
        if !categories.contains_key(category) {
            ensure_distinct_infix(category, categories.keys(), &self.formats)?;
        }
        Ok(categories.entry(category.to_string()).or_insert(0))
    }

    /// Render an ID for `value` without allocating.
    pub fn format_id(&self, namespace: &str, category: &str, value: u64) -> String {
        format_id(namespace, category, value, &self.formats)
    }
}

/// Read the counter table. Missing or unparseable tables count as empty.
pub(crate) fn load_table(path: &Path) -> Result<CounterTable> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CounterTable::new()),
        Err(e) => {
            return Err(DocketError::UserError(format!(
                "failed to read counter table '{}': {}",
                path.display(),
                e
            )));
        }
    };

    match serde_json::from_str(&content) {
        Ok(table) => Ok(table),
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "counter table is corrupt, starting from empty"
            );
            Ok(CounterTable::new())
        }
    }
}

fn save_table(path: &Path, table: &CounterTable) -> Result<()> {
    let json = serde_json::to_string_pretty(table).map_err(|e| {
        DocketError::UserError(format!("failed to serialize counter table: {}", e))
    })?;
    crate::fs::atomic_write_file(path, &json)
}
