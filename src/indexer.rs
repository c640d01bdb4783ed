//! Log-driven reconciliation of the listings cache.
//!
//! Covers state changes the service layer never originated: externally
//! signed listings, sales and cancellations, and anything lost to a
//! reorganization. The scan position is derived defensively each run from
//! `max(last_checked_block)` over cached listings rather than kept in
//! separate state, so a wiped cache simply rescans from genesis.

use std::sync::Arc;

use sqlx::postgres::PgPool;
use tracing::{debug, info, instrument};

use crate::chain::ChainGateway;
use crate::domain::{db_address, ActiveListingUpsert, SyncReport};
use crate::infra::{PgListingStore, PgUserStore, Result};

/// Default scan chunk, kept below the 10k-block range cap most providers
/// enforce on log queries.
pub const DEFAULT_CHUNK_SIZE: i64 = 9_900;

/// Marketplace log indexer
pub struct EventIndexer {
    gateway: Arc<dyn ChainGateway>,
    users: PgUserStore,
    listings: PgListingStore,
    chunk_size: i64,
    genesis_block: i64,
}

impl EventIndexer {
    pub fn new(
        pool: PgPool,
        gateway: Arc<dyn ChainGateway>,
        chunk_size: i64,
        genesis_block: i64,
    ) -> Self {
        let users = PgUserStore::new(pool.clone());
        let listings = PgListingStore::new(pool);
        Self {
            gateway,
            users,
            listings,
            chunk_size: chunk_size.max(1),
            genesis_block: genesis_block.max(0),
        }
    }

    /// Scan `[start, head]` and fold the observed logs into the cache.
    ///
    /// Applying a chunk is idempotent: upserts converge and the
    /// sold/cancelled updates only touch active rows, so re-running over
    /// an already-scanned range changes nothing.
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<SyncReport> {
        let start = match self.listings.last_checked_block().await? {
            Some(last) => last + 1,
            None => self.genesis_block,
        };

        let head = self.gateway.head_block().await?;
        if start > head {
            debug!(start, head, "no new blocks to scan");
            return Ok(SyncReport {
                scanned_to_block: head,
                events_processed: 0,
            });
        }

        info!(start, head, "scanning marketplace logs");
        let mut events_processed = 0usize;

        for (from, to) in plan_chunks(start, head, self.chunk_size) {
            let page = self.gateway.marketplace_logs(from, to).await?;
            events_processed += page.len();

            // Apply in the order fetched: listed, then sold, then cancelled.
            for log in &page.listed {
                let listed_at = self.gateway.block_time(log.block_number).await?;
                let seller_address = db_address(log.seller);
                let seller = self.users.find_by_address(&seller_address).await?;
                // Best-effort enrichment; a failed read leaves the columns NULL.
                let data = self.gateway.ticket_data(log.token_id).await.ok();

                self.listings
                    .upsert_active(&ActiveListingUpsert {
                        token_id: log.token_id,
                        nft_contract_address: db_address(self.gateway.ticket_contract()),
                        seller_address,
                        seller_user_id: seller.map(|u| u.user_id),
                        price: log.price,
                        event_id: data.map(|d| d.event_id),
                        original_price: data.map(|d| d.original_price),
                        listed_at,
                        block_number: log.block_number,
                    })
                    .await?;
                debug!(token_id = log.token_id, block = log.block_number, "listing upserted");
            }

            for log in &page.sold {
                let sold_at = self.gateway.block_time(log.block_number).await?;
                let changed = self
                    .listings
                    .mark_sold(
                        &db_address(self.gateway.ticket_contract()),
                        log.token_id,
                        sold_at,
                        log.block_number,
                    )
                    .await?;
                if changed {
                    debug!(token_id = log.token_id, block = log.block_number, "listing closed (sold)");
                }
            }

            for log in &page.cancelled {
                let cancelled_at = self.gateway.block_time(log.block_number).await?;
                let changed = self
                    .listings
                    .mark_cancelled(
                        &db_address(self.gateway.ticket_contract()),
                        log.token_id,
                        cancelled_at,
                        log.block_number,
                    )
                    .await?;
                if changed {
                    debug!(token_id = log.token_id, block = log.block_number, "listing closed (cancelled)");
                }
            }
        }

        info!(
            scanned_to_block = head,
            events_processed, "marketplace log sync complete"
        );
        Ok(SyncReport {
            scanned_to_block: head,
            events_processed,
        })
    }
}

/// Split an inclusive block range into inclusive chunks of at most
/// `chunk_size` blocks.
fn plan_chunks(start: i64, head: i64, chunk_size: i64) -> Vec<(i64, i64)> {
    let mut chunks = Vec::new();
    let mut from = start;
    while from <= head {
        let to = (from + chunk_size - 1).min(head);
        chunks.push((from, to));
        from = to + 1;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_when_range_fits() {
        assert_eq!(plan_chunks(100, 150, 9_900), vec![(100, 150)]);
    }

    #[test]
    fn chunks_cover_range_without_gaps_or_overlap() {
        let chunks = plan_chunks(0, 25_000, 9_900);
        assert_eq!(chunks, vec![(0, 9_899), (9_900, 19_799), (19_800, 25_000)]);

        for window in chunks.windows(2) {
            assert_eq!(window[0].1 + 1, window[1].0);
        }
    }

    #[test]
    fn chunk_width_never_exceeds_limit() {
        for (from, to) in plan_chunks(7, 123_456, 9_900) {
            assert!(to - from + 1 <= 9_900);
        }
    }

    #[test]
    fn empty_when_start_past_head() {
        assert!(plan_chunks(10, 9, 9_900).is_empty());
    }

    #[test]
    fn exact_boundary_chunk() {
        assert_eq!(plan_chunks(0, 9_899, 9_900), vec![(0, 9_899)]);
    }
}
