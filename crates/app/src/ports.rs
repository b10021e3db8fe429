//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod adapter;
pub mod command_queue;
pub mod discovery;
pub mod event_bus;
pub mod event_store;
pub mod storage;

pub use adapter::{AdapterContext, DiscoveredDevice, ProtocolAdapter};
pub use command_queue::RemoteCommandQueue;
pub use discovery::MdnsBrowser;
pub use event_bus::EventPublisher;
pub use event_store::EventStore;
pub use storage::{
    AreaRepository, CommandRepository, CredentialRepository, DeviceRepository, EntityRepository,
    HistorySink, HubRepository, LatestStateSink,
};
