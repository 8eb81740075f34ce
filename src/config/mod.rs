// src/config/mod.rs

//! Configuration loading and validation for incbuild.
//!
//! Responsibilities:
//! - Define the serde-backed data model (`model.rs`).
//! - Load a config file from disk and resolve the base root (`loader.rs`).
//! - Validate basic invariants like well-formed trigger rules (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{Configuration, RawConfigFile, TriggerRule, WatchDefinition};
pub use validate::validate_config;
