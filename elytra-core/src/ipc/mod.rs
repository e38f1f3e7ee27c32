//! Types handed across the core/host boundary.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a host can
//! forward them as JSON without extra glue.

pub mod events;
