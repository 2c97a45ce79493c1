//! Offline reconciliation of the catalog against the blob store.
//!
//! Walks every file row by key. Rows without a hash get one computed from the
//! blob; with `verify`, rows that already have a hash are re-hashed and
//! compared. Rows whose blob is missing are reported, never deleted.

use dss_core::ContentHash;
use dss_metadata::{FileRow, MetadataResult, MetadataStore};
use dss_storage::{ObjectStore, StorageError, digest_stream};
use serde::Serialize;
use time::OffsetDateTime;

/// Rows fetched per catalog page.
pub const DEFAULT_BATCH_SIZE: u32 = 500;

/// Reconciliation options.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    /// Re-hash rows that already have a hash.
    pub verify: bool,
    /// Report only; never write hashes.
    pub dry_run: bool,
    pub batch_size: u32,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            verify: false,
            dry_run: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Outcome of a reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Rows examined.
    pub scanned: u64,
    /// Rows that received a hash (or would have, in a dry run).
    pub hashed: u64,
    /// Rows whose stored hash was re-checked.
    pub verified: u64,
    /// Re-checked rows whose blob no longer matches.
    pub mismatched: u64,
    /// Rows whose blob is missing.
    pub orphaned: u64,
    /// Rows that could not be processed.
    pub errors: u64,
}

/// Run one reconciliation pass. Per-row failures are counted and logged;
/// only a failure to page through the catalog aborts the run.
pub async fn run_reconcile(
    metadata: &dyn MetadataStore,
    storage: &dyn ObjectStore,
    options: ReconcileOptions,
) -> MetadataResult<ReconcileReport> {
    let mut report = ReconcileReport::default();
    let batch_size = options.batch_size.max(1);
    let mut after = None;

    loop {
        let page = metadata.scan_files(after, batch_size).await?;
        let Some(last) = page.last() else {
            break;
        };
        after = Some(last.key);

        for row in &page {
            report.scanned += 1;
            reconcile_row(metadata, storage, options, row, &mut report).await;
        }
    }

    tracing::info!(
        scanned = report.scanned,
        hashed = report.hashed,
        verified = report.verified,
        mismatched = report.mismatched,
        orphaned = report.orphaned,
        errors = report.errors,
        dry_run = options.dry_run,
        "Reconciliation finished"
    );
    Ok(report)
}

async fn reconcile_row(
    metadata: &dyn MetadataStore,
    storage: &dyn ObjectStore,
    options: ReconcileOptions,
    row: &FileRow,
    report: &mut ReconcileReport,
) {
    if row.hash.is_some() && !options.verify {
        match storage.exists(&row.storage_path).await {
            Ok(true) => {}
            Ok(false) => record_orphan(row, report),
            Err(e) => record_error(row, &e.to_string(), report),
        }
        return;
    }

    let digest = match storage.get_stream(&row.storage_path).await {
        Ok(stream) => digest_stream(stream).await,
        Err(e) => Err(e),
    };
    let (hash, size) = match digest {
        Ok(digest) => digest,
        Err(StorageError::NotFound(_)) => {
            record_orphan(row, report);
            return;
        }
        Err(e) => {
            record_error(row, &e.to_string(), report);
            return;
        }
    };
    match &row.hash {
        Some(stored) => {
            report.verified += 1;
            // An unparseable stored hash counts as a mismatch.
            if ContentHash::from_hex(stored).ok() != Some(hash) {
                report.mismatched += 1;
                tracing::warn!(
                    key = %row.key,
                    storage_path = %row.storage_path,
                    stored = %stored,
                    actual = %hash,
                    size,
                    "Blob content does not match stored hash"
                );
            }
        }
        None if options.dry_run => {
            report.hashed += 1;
            let hash = hash.to_hex();
            tracing::info!(key = %row.key, hash = %hash, "Would record missing hash");
        }
        None => {
            let hash = hash.to_hex();
            match metadata
                .set_file_hash(row.key, &hash, OffsetDateTime::now_utc())
                .await
            {
                Ok(()) => {
                    report.hashed += 1;
                    tracing::debug!(key = %row.key, hash = %hash, "Recorded missing hash");
                }
                Err(e) => record_error(row, &e.to_string(), report),
            }
        }
    }
}

fn record_orphan(row: &FileRow, report: &mut ReconcileReport) {
    report.orphaned += 1;
    tracing::warn!(
        key = %row.key,
        storage_path = %row.storage_path,
        "Orphaned catalog row: blob is missing"
    );
}

fn record_error(row: &FileRow, error: &str, report: &mut ReconcileReport) {
    report.errors += 1;
    tracing::warn!(key = %row.key, storage_path = %row.storage_path, error, "Failed to reconcile row");
}
