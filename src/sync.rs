//! Sync orchestration primitives shared by the platform adapters: paginated
//! full-sync loops, per-id incremental fetch with delete detection, and the
//! creation-time cutoff filter.
//!
//! Paging is strictly sequential; a page's emit callback completes before
//! the next fetch starts, bounding memory to one page and guaranteeing the
//! host sees pages in remote order.

use std::future::Future;

use tracing::warn;

use crate::error::Result;
use crate::model::KnownRecord;

/// One fetched page. `total_pages` is the tracker's own page count when it
/// reports one; some trackers re-serve the last page instead of returning an
/// empty one when the record count is an exact multiple of the page size,
/// and the count is the only way to stop in that case.
#[derive(Debug, Default)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_pages: Option<u64>,
}

/// Offset-based full-sync loop. Fetches `page_size` records at increasing
/// offsets until a short page; a record count that is an exact multiple of
/// the page size terminates on the next fetch returning zero records.
/// Returns the number of records emitted.
pub async fn page_offsets<T, F, Fut>(
    page_size: u64,
    mut fetch: F,
    mut emit: impl FnMut(Vec<T>) -> Result<()>,
) -> Result<u64>
where
    F: FnMut(u64, u64) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut offset = 0u64;
    loop {
        let items = fetch(offset, page_size).await?;
        let count = items.len() as u64;
        if count > 0 {
            emit(items)?;
        }
        if count < page_size {
            return Ok(offset + count);
        }
        offset += count;
    }
}

/// Page-numbered full-sync loop (pages start at 1). Terminates on a short
/// page, or once the tracker's reported page total is reached for trackers
/// that re-serve the last page at exact multiples.
pub async fn page_numbers<T, F, Fut>(
    page_size: u64,
    mut fetch: F,
    mut emit: impl FnMut(Vec<T>) -> Result<()>,
) -> Result<u64>
where
    F: FnMut(u64, u64) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut page = 1u64;
    let mut total = 0u64;
    loop {
        let fetched = fetch(page, page_size).await?;
        let count = fetched.items.len() as u64;
        total += count;
        if count > 0 {
            emit(fetched.items)?;
        }
        if count < page_size {
            return Ok(total);
        }
        if let Some(page_total) = fetched.total_pages {
            if page >= page_total {
                return Ok(total);
            }
        }
        page += 1;
    }
}

/// Incremental sync: fetches the remote record for each known host record
/// individually. A remote 404 marks the host record deleted; any other
/// failure is logged and that single record skipped, never fatal to the
/// batch.
pub async fn fetch_known<T, F, Fut>(
    known: Vec<KnownRecord>,
    mut fetch: F,
) -> (Vec<(KnownRecord, T)>, Vec<String>)
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut updated = Vec::new();
    let mut deleted_ids = Vec::new();
    for record in known {
        match fetch(record.remote_id.clone()).await {
            Ok(remote) => updated.push((record, remote)),
            Err(err) if err.is_not_found() => deleted_ids.push(record.host_id),
            Err(err) => {
                warn!(remote_id = %record.remote_id, %err, "skipping record during sync");
            }
        }
    }
    (updated, deleted_ids)
}

/// Creation-time filter for full sync: keep only records created strictly
/// before or after the cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatedCutoff {
    Before(i64),
    After(i64),
}

impl CreatedCutoff {
    pub fn admits(&self, created_at: i64) -> bool {
        match self {
            CreatedCutoff::Before(cutoff) => created_at < *cutoff,
            CreatedCutoff::After(cutoff) => created_at > *cutoff,
        }
    }
}
