//! # minihub-adapter-remote-store
//!
//! Two transport adapters that aren't tied to a specific wire protocol:
//!
//! - [`command_queue::RemoteStoreCommandQueue`] — the poll side of the
//!   command consumer's dual push/pull mode, against a PostgREST-style
//!   remote store.
//! - [`mdns_browser::GenericMdnsBrowser`] — the discovery manager's
//!   protocol-agnostic mDNS browser, used alongside (not instead of) each
//!   protocol adapter's own discovery.
//!
//! ## Dependency rule
//!
//! Depends on `minihub-app` (port traits) and `minihub-domain` only, plus
//! `reqwest` for the remote store HTTP client and `mdns-sd` for browsing.

pub mod command_queue;
mod error;
pub mod mdns_browser;

pub use command_queue::RemoteStoreCommandQueue;
pub use error::RemoteStoreError;
pub use mdns_browser::GenericMdnsBrowser;
