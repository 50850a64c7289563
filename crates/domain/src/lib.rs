//! # lumahub-domain
//!
//! Pure domain model for the lumahub home automation host.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define the **unique id** an integration assigns to each entity it owns
//! - Define **entity state** (what an entity renders into the host)
//! - Define **config entries** (per-server connection data plus options)
//! - Define **events** (entity added / state changed / removed records)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod config_entry;
pub mod entity;
pub mod event;
pub mod unique_id;
