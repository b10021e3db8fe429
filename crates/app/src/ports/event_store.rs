//! Event store port — persistence for published bus events.

use std::future::Future;

use minihub_domain::error::MiniHubError;
use minihub_domain::event::Event;
use minihub_domain::id::EventId;

/// Repository for persisting and querying [`Event`]s.
pub trait EventStore {
    /// Persist a new event.
    fn store(&self, event: Event) -> impl Future<Output = Result<Event, MiniHubError>> + Send;

    /// Get an event by its unique identifier.
    fn get_by_id(
        &self,
        id: EventId,
    ) -> impl Future<Output = Result<Option<Event>, MiniHubError>> + Send;

    /// Get the most recent events, ordered newest-first.
    fn get_recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Event>, MiniHubError>> + Send;

    /// Find events whose topic matches `pattern` (see
    /// [`Event::matches_topic_pattern`]), ordered newest-first.
    fn find_by_topic_pattern(
        &self,
        pattern: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Event>, MiniHubError>> + Send;
}
