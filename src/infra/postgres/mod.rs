//! PostgreSQL repositories.
//!
//! Mutating helpers that must participate in a service-owned transaction
//! take a `&mut Transaction<'_, Postgres>` and are suffixed `_tx`; pure
//! read-cache accessors run on the pool.

mod events;
mod listings;
mod tickets;
mod users;

pub use events::PgEventStore;
pub use listings::PgListingStore;
pub use tickets::PgTicketStore;
pub use users::PgUserStore;
