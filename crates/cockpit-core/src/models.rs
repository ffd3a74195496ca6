//! Domain models, re-exported from `cockpit-types`.

pub use cockpit_types::models::*;
