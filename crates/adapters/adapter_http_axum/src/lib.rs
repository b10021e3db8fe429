//! # minihub-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve hub introspection (`/`, `/health`, `/info`, `/api/hub/status`)
//! - Serve the live discovery snapshot (`/api/devices/discovered`)
//! - Serve a JSON management API for devices, entities, and areas
//! - Stream bus events over WebSocket, subscribe-by-topic-pattern (`/events`)
//! - Map HTTP requests into application service calls (driving adapter)
//! - Map application results into HTTP responses (JSON)
//!
//! ## Dependency rule
//! Depends on `minihub-app` (for port traits and services) and `minihub-domain`
//! (for domain types used in request/response mapping). Never leaks axum types
//! into the domain.

pub mod api;
mod error;
pub mod router;
pub mod state;
pub mod ws;
