//! Infrastructure layer.
//!
//! Contains the service-layer error taxonomy and the PostgreSQL
//! repositories that back the read cache:
//! - Users (identity, custody records)
//! - Events (capacity counters, row locks)
//! - Tickets (ownership mirror)
//! - Listings (secondary-market mirror, upsert keyed on contract+token)

mod error;
pub mod postgres;

pub use error::*;
pub use postgres::{PgEventStore, PgListingStore, PgTicketStore, PgUserStore};
