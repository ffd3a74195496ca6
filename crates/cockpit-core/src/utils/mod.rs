//! Utility functions for HTTP.

pub mod http;
