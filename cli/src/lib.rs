//! Offline operator tooling for the voting station stores.

pub mod utils;
