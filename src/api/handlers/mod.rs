//! Request handlers, grouped by resource.

pub mod events;
pub mod internal;
pub mod marketplace;
pub mod tickets;
pub mod users;
