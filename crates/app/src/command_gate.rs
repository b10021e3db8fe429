//! Per-entity command gate — FIFO dispatch order, scrubbable-capability
//! coalescing, and a token-bucket rate ceiling, per specification §4.2's
//! "ordering and rate policy" paragraph.
//!
//! Non-scrubbable commands (on/off, button press, lock, ...) are always
//! dispatched one at a time, in the order they reach the gate. Scrubbable
//! commands (brightness, color temperature, cover position, ...) may pile
//! up behind an in-flight dispatch for the same entity and capability; when
//! a newer one arrives before an older one has been sent, the older is
//! dropped in favor of the newest rather than dispatched on its own. A
//! per-entity minimum interval between actual device writes enforces the
//! rate ceiling regardless of which path a command took.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

use minihub_domain::command::{CapabilityTag, Command};
use minihub_domain::id::EntityId;

/// Default per-entity ceiling on commands actually dispatched to the
/// device, in commands per second — the specification's "adapter-chosen
/// ceiling (default 10/s)".
pub const DEFAULT_RATE_LIMIT_PER_S: u32 = 10;

/// What happened to a command run through the gate.
#[derive(Debug)]
pub enum GateOutcome<T> {
    /// The command reached the front of its entity's queue and was
    /// dispatched; carries whatever the dispatch closure returned.
    Dispatched(T),
    /// A later scrubbable command for the same entity and capability
    /// arrived before this one was sent, so this one was dropped without
    /// ever reaching the adapter.
    Coalesced,
}

#[derive(Default)]
struct EntityLane {
    /// Held for the duration of one dispatch attempt; serializes all
    /// commands (scrubbable or not) for this entity.
    serialize: AsyncMutex<()>,
    /// The sequence number of the most recently announced command per
    /// scrubbable capability. A command whose own sequence number no
    /// longer matches by the time it reaches the front of the queue has
    /// been superseded.
    latest_seq: AsyncMutex<HashMap<CapabilityTag, u64>>,
    /// When this entity last actually had a command dispatched, for the
    /// rate ceiling.
    last_sent: AsyncMutex<Option<Instant>>,
}

/// Ticket handed back by [`CommandGate::announce`], carried alongside the
/// command until it is run through [`CommandGate::run`].
pub type Ticket = Option<u64>;

/// Per-entity FIFO + coalescing + rate-limit gate shared by every protocol
/// adapter dispatch path.
pub struct CommandGate {
    lanes: AsyncMutex<HashMap<EntityId, Arc<EntityLane>>>,
    rate_limit_per_s: u32,
}

impl Default for CommandGate {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandGate {
    /// Build a gate with the default 10/s per-entity rate ceiling.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lanes: AsyncMutex::new(HashMap::new()),
            rate_limit_per_s: DEFAULT_RATE_LIMIT_PER_S,
        }
    }

    /// Override the default per-entity rate ceiling.
    #[must_use]
    pub fn with_rate_limit_per_s(mut self, per_s: u32) -> Self {
        self.rate_limit_per_s = per_s.max(1);
        self
    }

    async fn lane_for(&self, entity_id: EntityId) -> Arc<EntityLane> {
        let mut lanes = self.lanes.lock().await;
        Arc::clone(
            lanes
                .entry(entity_id)
                .or_insert_with(|| Arc::new(EntityLane::default())),
        )
    }

    /// Register a command's arrival for `entity_id`. Must be called, in
    /// arrival order, before the command is handed off to a concurrent
    /// task — this is what lets [`run`](Self::run) later tell whether a
    /// command is still the latest one queued for its capability.
    ///
    /// Non-scrubbable commands are not tracked; every one is dispatched, so
    /// there is nothing to compare against. Returns the ticket to pass to
    /// `run` alongside the same command.
    pub async fn announce(&self, entity_id: EntityId, command: &Command) -> Ticket {
        if !command.capability.is_scrubbable() {
            return None;
        }
        let lane = self.lane_for(entity_id).await;
        let mut latest = lane.latest_seq.lock().await;
        let seq = latest.entry(command.capability).or_insert(0);
        *seq += 1;
        Some(*seq)
    }

    /// Run `dispatch` for `command` against `entity_id`, honoring FIFO
    /// per-entity ordering, coalescing against the `ticket` returned by a
    /// prior [`announce`](Self::announce) call, and the per-entity rate
    /// ceiling.
    ///
    /// A command with no ticket (non-scrubbable, or no entity reference at
    /// all) always dispatches.
    pub async fn run<F, Fut, T>(
        &self,
        entity_id: EntityId,
        command: &Command,
        ticket: Ticket,
        dispatch: F,
    ) -> GateOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lane = self.lane_for(entity_id).await;
        let _serialize = lane.serialize.lock().await;

        if let Some(seq) = ticket {
            let current = *lane
                .latest_seq
                .lock()
                .await
                .get(&command.capability)
                .unwrap_or(&0);
            if current != seq {
                return GateOutcome::Coalesced;
            }
        }

        self.wait_for_rate_limit(&lane).await;
        let result = dispatch().await;
        *lane.last_sent.lock().await = Some(Instant::now());
        GateOutcome::Dispatched(result)
    }

    async fn wait_for_rate_limit(&self, lane: &EntityLane) {
        let min_interval = Duration::from_secs_f64(1.0 / f64::from(self.rate_limit_per_s));
        let last = *lane.last_sent.lock().await;
        if let Some(last) = last {
            let elapsed = last.elapsed();
            if elapsed < min_interval {
                tokio::time::sleep(min_interval - elapsed).await;
            }
        }
    }
}
