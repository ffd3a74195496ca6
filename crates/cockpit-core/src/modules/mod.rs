//! File-backed stores and the upstream Cloud Code client.

pub mod account;
pub mod catalog_cache;
pub mod cloudcode;
pub mod paths;
pub mod state_store;
pub mod token;
