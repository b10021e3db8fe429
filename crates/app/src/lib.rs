//! # minihub-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `EntityRepository`, `DeviceRepository`, `AreaRepository`, `CredentialRepository` — CRUD
//!   - `LatestStateSink` / `HistorySink` — the two-sink entity state store
//!   - `CommandRepository` — queue and CAS-update access to commands
//!   - `EventStore` — append & query published events
//!   - `ProtocolAdapter` / `AdapterContext` — the protocol adapter framework
//!   - `MdnsBrowser` / `RemoteCommandQueue` — discovery and pull-mode command transports
//! - Define **driving/inbound ports** as use-case structs:
//!   - `RegistryService` — device/entity upsert and state application
//!   - `AreaService` — area CRUD
//!   - `AdapterRegistry` — adapter lifecycle and command routing
//!   - `DiscoveryManager` — discovery stream aggregation and dedup
//!   - `CommandConsumer` — push/pull command dispatch
//! - Provide **in-process infrastructure** (the bounded-mailbox event bus,
//!   the per-entity `CommandGate`, the `persistence` retry-with-backoff
//!   policy) that doesn't need IO
//! - Orchestrate domain objects without knowing *how* persistence or IO works
//!
//! ## Dependency rule
//! Depends on `minihub-domain` only (plus `tokio` for channels and
//! synchronization). Never imports adapter crates. Adapters depend on *this*
//! crate, not the reverse.

pub mod command_consumer;
pub mod command_gate;
pub mod discovery;
pub mod event_bus;
pub mod persistence;
pub mod ports;
pub mod registry;
pub mod services;
