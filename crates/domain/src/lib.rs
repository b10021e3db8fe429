//! # minihub-domain
//!
//! Pure domain model for the minihub smart-home daemon.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Entities** (typed capabilities owned by a device: lights, sensors, switches, …)
//! - Define **Devices** (physical endpoints that expose one or more entities)
//! - Define **Areas** (logical groupings such as rooms)
//! - Define **Commands** (queued instructions to change an entity's state)
//! - Define **Credentials** (opaque per-device authentication material)
//! - Define **Events** (topic-addressed records published on the bus)
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod area;
pub mod command;
pub mod credential;
pub mod device;
pub mod entity;
pub mod entity_state_history;
pub mod event;
pub mod hub;
