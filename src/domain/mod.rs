//! Domain layer: models, ports, and the error taxonomy. Nothing in this
//! module depends on SQLite, reqwest, or any other infrastructure crate.

pub mod error;
pub mod models;
pub mod ports;
