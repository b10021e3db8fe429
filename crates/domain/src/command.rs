//! Command — a queued instruction to change an entity's state.

use serde::{Deserialize, Serialize};

use crate::error::{MiniHubError, ValidationError};
use crate::id::{CommandId, DeviceId, EntityId};
use crate::time::Timestamp;

/// The capability a command targets.
///
/// Closed set matching the capabilities the shipped adapters can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityTag {
    OnOff,
    Brightness,
    ColorTemperature,
    ColorRgb,
    NumberSet,
    ButtonPress,
    Lock,
    CoverPosition,
    ClimateTarget,
    Volume,
}

impl CapabilityTag {
    /// Whether rapid repeated commands for this capability (e.g. a UI slider
    /// being dragged) may be coalesced into the latest value only.
    #[must_use]
    pub const fn is_scrubbable(self) -> bool {
        matches!(
            self,
            Self::Brightness
                | Self::ColorTemperature
                | Self::ColorRgb
                | Self::NumberSet
                | Self::CoverPosition
                | Self::ClimateTarget
                | Self::Volume
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnOff => "on_off",
            Self::Brightness => "brightness",
            Self::ColorTemperature => "color_temperature",
            Self::ColorRgb => "color_rgb",
            Self::NumberSet => "number_set",
            Self::ButtonPress => "button_press",
            Self::Lock => "lock",
            Self::CoverPosition => "cover_position",
            Self::ClimateTarget => "climate_target",
            Self::Volume => "volume",
        }
    }
}

impl std::fmt::Display for CapabilityTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a queued command.
///
/// Transitions are monotonic: `Pending -> Processing -> {Completed, Failed}`.
/// There is no path back to `Pending` and no path from a terminal state to
/// another state; [`Command::mark_processing`], [`Command::mark_completed`],
/// and [`Command::mark_failed`] are the only ways to advance it and each
/// rejects an out-of-order call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    Processing,
    Completed {
        /// Set when this command was merged with one or more later
        /// scrubbable commands for the same entity and capability instead
        /// of being dispatched on its own.
        coalesced: bool,
    },
    Failed {
        error: String,
    },
}

impl CommandStatus {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// A queued instruction to change one entity's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: CommandId,
    pub device_id: DeviceId,
    pub entity_id: Option<EntityId>,
    pub capability: CapabilityTag,
    pub value: serde_json::Value,
    pub status: CommandStatus,
    pub created_at: Timestamp,
    pub processed_at: Option<Timestamp>,
}

impl Command {
    /// Create a builder for constructing a [`Command`].
    #[must_use]
    pub fn builder() -> CommandBuilder {
        CommandBuilder::default()
    }

    /// Advance `Pending -> Processing`.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] if the command is not currently pending.
    pub fn mark_processing(&mut self) -> Result<(), MiniHubError> {
        if self.status != CommandStatus::Pending {
            return Err(ValidationError::InvalidCommandTransition {
                from: self.status.label().to_string(),
                to: CommandStatus::Processing.label().to_string(),
            }
            .into());
        }
        self.status = CommandStatus::Processing;
        Ok(())
    }

    /// Advance `Processing -> Completed { coalesced }`.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] if the command is not currently processing.
    pub fn mark_completed(&mut self, coalesced: bool, at: Timestamp) -> Result<(), MiniHubError> {
        if self.status != CommandStatus::Processing {
            return Err(ValidationError::InvalidCommandTransition {
                from: self.status.label().to_string(),
                to: "completed".to_string(),
            }
            .into());
        }
        self.status = CommandStatus::Completed { coalesced };
        self.processed_at = Some(at);
        Ok(())
    }

    /// Advance `Processing -> Failed { error }`.
    ///
    /// A command must have passed through `Processing` before it can fail:
    /// there is no direct `Pending -> Failed` path, so a dispatch attempt
    /// always leaves a processing record behind even when it fails instantly.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] if the command is not currently processing.
    pub fn mark_failed(
        &mut self,
        error: impl Into<String>,
        at: Timestamp,
    ) -> Result<(), MiniHubError> {
        if self.status != CommandStatus::Processing {
            return Err(ValidationError::InvalidCommandTransition {
                from: self.status.label().to_string(),
                to: "failed".to_string(),
            }
            .into());
        }
        self.status = CommandStatus::Failed {
            error: error.into(),
        };
        self.processed_at = Some(at);
        Ok(())
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] when a scrubbable range capability
    /// carries a non-numeric value.
    pub fn validate(&self) -> Result<(), MiniHubError> {
        if self.capability.is_scrubbable() && !self.value.is_number() && !self.value.is_object() {
            return Err(ValidationError::CapabilityValueOutOfRange {
                capability: self.capability.to_string(),
                value: self.value.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Command`].
#[derive(Debug, Default)]
pub struct CommandBuilder {
    id: Option<CommandId>,
    device_id: Option<DeviceId>,
    entity_id: Option<EntityId>,
    capability: Option<CapabilityTag>,
    value: Option<serde_json::Value>,
    created_at: Option<Timestamp>,
}

impl CommandBuilder {
    #[must_use]
    pub fn id(mut self, id: CommandId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn device_id(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    #[must_use]
    pub fn entity_id(mut self, entity_id: EntityId) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    #[must_use]
    pub fn capability(mut self, capability: CapabilityTag) -> Self {
        self.capability = Some(capability);
        self
    }

    #[must_use]
    pub fn value(mut self, value: serde_json::Value) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Consume the builder, validate, and return a [`Command`] in `Pending` status.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] if the value doesn't fit the capability.
    pub fn build(self) -> Result<Command, MiniHubError> {
        let command = Command {
            id: self.id.unwrap_or_default(),
            device_id: self.device_id.unwrap_or_default(),
            entity_id: self.entity_id,
            capability: self.capability.unwrap_or(CapabilityTag::OnOff),
            value: self.value.unwrap_or(serde_json::Value::Null),
            status: CommandStatus::Pending,
            created_at: self.created_at.unwrap_or_else(crate::time::now),
            processed_at: None,
        };
        command.validate()?;
        Ok(command)
    }
}
