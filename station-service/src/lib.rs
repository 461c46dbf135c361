//! Single-station voting ledger: identity hashing, dual-store persistence with
//! startup reconciliation, the vote session state machine and results.

pub mod candidates;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod identity;
pub mod integrity;
pub mod ledger;
pub mod machine;
pub mod metrics;
pub mod reconcile;
pub mod replication;
pub mod results;
pub mod routes;
pub mod station;
pub mod store;

pub use error::{StationError, StationResult};
pub use station::Station;
