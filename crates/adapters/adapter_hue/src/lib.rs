//! # minihub-adapter-hue
//!
//! Philips Hue adapter — bridges discovered over mDNS `_hue._tcp` (with a
//! cloud-endpoint fallback) speak HTTPS against a self-signed certificate.
//! Unlike ESPHome, the v1 REST API has no push channel: state is kept fresh
//! by polling, and pairing is a repeated POST against the bridge until the
//! user presses the physical link button.
//!
//! ## Dependency rule
//!
//! Depends on `minihub-app` (port traits) and `minihub-domain` only, plus
//! `reqwest` for HTTPS and `mdns-sd` for bridge discovery.

pub mod client;
pub mod config;
mod convert;
mod discovery;
mod error;

pub use config::HueConfig;
pub use error::HueError;

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use minihub_app::ports::adapter::{AdapterContext, DiscoveredDevice, ProtocolAdapter};
use minihub_app::ports::storage::CredentialRepository;
use minihub_domain::command::{CapabilityTag, Command};
use minihub_domain::credential::Credential;
use minihub_domain::device::{Device, Protocol};
use minihub_domain::entity::{
    AttributeValue, CapabilityDescriptor, DriverKey, Entity, EntityKind, EntityState,
};
use minihub_domain::error::{MiniHubError, NotFoundError, ValidationError};
use minihub_domain::event::Event;
use minihub_domain::id::DeviceId;
use minihub_domain::time::now;

use client::{HueClient, LightInfo, PairingAttempt};

/// Resource-id-keyed entity map, shared with the background poll task.
type ResourceMap = Arc<StdMutex<HashMap<String, Entity>>>;

struct Session {
    client: HueClient,
    username: Option<String>,
    resources: ResourceMap,
    poll_task: Option<tokio::task::JoinHandle<()>>,
}

/// Philips Hue protocol adapter.
///
/// Generic over the credential repository so the paired application key can
/// be persisted without this crate depending on the storage adapter.
pub struct HueAdapter<CR> {
    config: HueConfig,
    http: reqwest::Client,
    credentials: Arc<CR>,
    sessions: HashMap<DeviceId, Session>,
    last_command_at: HashMap<DeviceId, tokio::time::Instant>,
}

impl<CR> HueAdapter<CR>
where
    CR: CredentialRepository + Send + Sync,
{
    /// # Errors
    ///
    /// Returns [`HueError::Http`] if the shared HTTPS client fails to build.
    pub fn new(config: HueConfig, credentials: Arc<CR>) -> Result<Self, HueError> {
        Ok(Self {
            config,
            http: HueClient::build_http()?,
            credentials,
            sessions: HashMap::new(),
            last_command_at: HashMap::new(),
        })
    }

    fn session(&self, device_id: DeviceId) -> Result<&Session, MiniHubError> {
        self.sessions.get(&device_id).ok_or_else(|| {
            NotFoundError {
                entity: "Device",
                id: device_id.to_string(),
            }
            .into()
        })
    }

    fn session_mut(&mut self, device_id: DeviceId) -> Result<&mut Session, MiniHubError> {
        self.sessions.get_mut(&device_id).ok_or_else(|| {
            NotFoundError {
                entity: "Device",
                id: device_id.to_string(),
            }
            .into()
        })
    }

    fn build_entity(resource_id: &str, info: &LightInfo) -> Result<Entity, MiniHubError> {
        let mut capability = CapabilityDescriptor::default().with_feature("on_off");
        if info.state.bri.is_some() {
            capability = capability
                .with_feature("brightness")
                .with_range("brightness", 0.0, 1.0);
        }
        if info.state.ct.is_some() {
            capability = capability.with_feature("color_temperature").with_range(
                "color_temperature",
                convert::mireds_to_kelvin(500),
                convert::mireds_to_kelvin(153),
            );
        }
        Entity::builder()
            .driver_key(DriverKey::Text(resource_id.to_string()))
            .kind(EntityKind::Light)
            .capability(capability)
            .friendly_name(info.name.clone())
            .build()
    }

    fn state_from_light(entity_id: minihub_domain::id::EntityId, info: &LightInfo) -> EntityState {
        let mut attributes = HashMap::new();
        if let Some(bri) = info.state.bri {
            attributes.insert(
                "brightness".to_string(),
                AttributeValue::Float(convert::brightness_from_bridge(bri)),
            );
        }
        if let Some(ct) = info.state.ct {
            attributes.insert(
                "color_temperature".to_string(),
                AttributeValue::Float(convert::mireds_to_kelvin(ct)),
            );
        }
        EntityState::new(entity_id, serde_json::json!(info.state.on.unwrap_or(false)), now())
            .with_attributes(attributes)
    }

    /// Background polling loop: Hue v1 has no push channel, so state is kept
    /// fresh by fetching the full light list at `poll_interval_secs`, backing
    /// off exponentially (doubling, capped at `max_backoff_secs`) after
    /// `backoff_after_failures` consecutive errors, and publishing
    /// `device/unreachable` the moment backoff kicks in.
    async fn poll_loop(
        client: HueClient,
        username: String,
        resources: ResourceMap,
        device_id: DeviceId,
        config: HueConfig,
        ctx: impl AdapterContext + Clone + 'static,
    ) {
        let base_interval = Duration::from_secs(u64::from(config.poll_interval_secs.max(1)));
        let max_backoff = Duration::from_secs(u64::from(config.max_backoff_secs.max(1)));
        let mut interval = base_interval;
        let mut consecutive_failures: u32 = 0;
        let mut announced_unreachable = false;

        loop {
            tokio::time::sleep(interval).await;
            match client.get_lights(&username).await {
                Ok(lights) => {
                    if announced_unreachable {
                        let _ = ctx
                            .publish_event(Event::device_lifecycle(
                                device_id,
                                serde_json::json!({"event": "reachable"}),
                            ))
                            .await;
                    }
                    consecutive_failures = 0;
                    interval = base_interval;
                    announced_unreachable = false;

                    for (resource_id, info) in lights {
                        let entity = resources
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .get(&resource_id)
                            .cloned();
                        let Some(entity) = entity else { continue };
                        let state = Self::state_from_light(entity.id, &info);
                        if let Err(err) = ctx.apply_state(state).await {
                            tracing::warn!(%err, "failed to apply Hue state update");
                        }
                    }
                }
                Err(err) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    tracing::warn!(%err, device = %device_id, "Hue poll failed");
                    if consecutive_failures >= u32::from(config.backoff_after_failures) {
                        let doublings = consecutive_failures - u32::from(config.backoff_after_failures);
                        let backed_off = base_interval
                            .saturating_mul(1u32.checked_shl(doublings.min(16)).unwrap_or(u32::MAX))
                            .min(max_backoff);
                        interval = backed_off;
                        if !announced_unreachable {
                            let _ = ctx
                                .publish_event(Event::device_lifecycle(
                                    device_id,
                                    serde_json::json!({"event": "unreachable"}),
                                ))
                                .await;
                            announced_unreachable = true;
                        }
                    }
                }
            }
        }
    }

    async fn throttle(&mut self, device_id: DeviceId) {
        let min_interval = Duration::from_secs_f64(1.0 / f64::from(self.config.rate_limit_per_s.max(1)));
        let now = tokio::time::Instant::now();
        if let Some(&last) = self.last_command_at.get(&device_id) {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < min_interval {
                tokio::time::sleep(min_interval - elapsed).await;
            }
        }
        self.last_command_at.insert(device_id, tokio::time::Instant::now());
    }
}

impl<CR> ProtocolAdapter for HueAdapter<CR>
where
    CR: CredentialRepository + Send + Sync,
{
    fn name(&self) -> &'static str {
        "hue"
    }

    async fn initialize(&mut self, _ctx: &impl AdapterContext) -> Result<(), MiniHubError> {
        Ok(())
    }

    async fn discover(
        &mut self,
        _ctx: &impl AdapterContext,
    ) -> Result<Vec<DiscoveredDevice>, MiniHubError> {
        let window = Duration::from_secs(5);
        let mut candidates = discovery::discover_mdns(window)
            .await
            .map_err(HueError::into_domain)?;
        if candidates.is_empty() {
            candidates = discovery::discover_cloud(&self.http)
                .await
                .map_err(HueError::into_domain)?;
        }

        let mut discovered = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let device = Device::builder()
                .protocol(Protocol::Hue)
                .fingerprint(candidate.fingerprint)
                .name("Hue Bridge")
                .address(candidate.address)
                .port(candidate.port)
                .manufacturer("Signify")
                .build()?;
            discovered.push(DiscoveredDevice {
                device,
                entities: Vec::new(),
            });
        }
        Ok(discovered)
    }

    async fn connect(&mut self, device: &Device) -> Result<(), MiniHubError> {
        let address = device.address.as_deref().ok_or_else(|| {
            HueError::Discovery("device has no network address".to_string())
        }).map_err(HueError::into_domain)?;
        let base_url = format!("https://{address}");
        let client = HueClient::new(self.http.clone(), base_url);

        client.get_config().await.map_err(HueError::into_domain)?;

        let username = self
            .credentials
            .get_by_device_id(device.id)
            .await?
            .map(|credential| String::from_utf8_lossy(&credential.payload).into_owned());

        self.sessions.insert(
            device.id,
            Session {
                client,
                username,
                resources: Arc::new(StdMutex::new(HashMap::new())),
                poll_task: None,
            },
        );
        Ok(())
    }

    async fn pair(&mut self, device: &Device, ctx: &impl AdapterContext) -> Result<(), MiniHubError> {
        if self.session(device.id)?.username.is_some() {
            return Ok(());
        }

        ctx.publish_event(Event::device_lifecycle(
            device.id,
            serde_json::json!({"event": "waiting_for_button"}),
        ))
        .await?;

        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(u64::from(self.config.pairing_timeout_secs));
        let poll_interval = Duration::from_secs(u64::from(self.config.pairing_poll_interval_secs.max(1)));

        loop {
            let client = self.session(device.id)?.client.clone();
            match client.attempt_pairing("minihub#hub").await {
                PairingAttempt::Success { username } => {
                    let credential = Credential::builder()
                        .device_id(device.id)
                        .payload(username.clone().into_bytes())
                        .build()?;
                    self.credentials.upsert(credential).await?;
                    self.session_mut(device.id)?.username = Some(username);
                    ctx.publish_event(Event::device_lifecycle(
                        device.id,
                        serde_json::json!({"event": "paired"}),
                    ))
                    .await?;
                    return Ok(());
                }
                PairingAttempt::WaitingForButton => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(HueError::LinkButtonTimeout.into());
                    }
                    tokio::time::sleep(poll_interval).await;
                }
                PairingAttempt::Other(err) => return Err(err.into()),
            }
        }
    }

    async fn enumerate_entities(&mut self, device: &Device) -> Result<Vec<Entity>, MiniHubError> {
        let session = self.session(device.id)?;
        let username = session.username.clone().ok_or(HueError::NotPaired).map_err(HueError::into_domain)?;
        let lights = session.client.get_lights(&username).await.map_err(HueError::into_domain)?;

        let mut entities = Vec::with_capacity(lights.len());
        let session = self.session_mut(device.id)?;
        let mut resources = session.resources.lock().unwrap_or_else(PoisonError::into_inner);
        for (resource_id, info) in &lights {
            let mut entity = Self::build_entity(resource_id, info)?;
            entity.device_id = device.id;
            resources.insert(resource_id.clone(), entity.clone());
            entities.push(entity);
        }
        Ok(entities)
    }

    async fn subscribe_state(
        &mut self,
        device: &Device,
        ctx: impl AdapterContext + Clone + 'static,
    ) -> Result<(), MiniHubError> {
        let config = self.config.clone();
        let device_id = device.id;
        let session = self.session_mut(device.id)?;
        let username = session.username.clone().ok_or(HueError::NotPaired).map_err(HueError::into_domain)?;
        let client = session.client.clone();
        let resources = Arc::clone(&session.resources);

        session.poll_task = Some(tokio::spawn(Self::poll_loop(
            client, username, resources, device_id, config, ctx,
        )));
        Ok(())
    }

    async fn poll_state(&mut self, device: &Device, ctx: &impl AdapterContext) -> Result<(), MiniHubError> {
        let session = self.session(device.id)?;
        let username = session.username.clone().ok_or(HueError::NotPaired).map_err(HueError::into_domain)?;
        let lights = session.client.get_lights(&username).await.map_err(HueError::into_domain)?;
        let resources = Arc::clone(&session.resources);

        for (resource_id, info) in lights {
            let entity = resources.lock().unwrap_or_else(PoisonError::into_inner).get(&resource_id).cloned();
            let Some(entity) = entity else { continue };
            ctx.apply_state(Self::state_from_light(entity.id, &info)).await?;
        }
        Ok(())
    }

    async fn send_command(&mut self, device: &Device, command: &Command) -> Result<(), MiniHubError> {
        let entity_id = command.entity_id.ok_or_else(|| {
            MiniHubError::from(NotFoundError {
                entity: "Entity",
                id: "<missing>".to_string(),
            })
        })?;

        let session = self.session(device.id)?;
        let username = session.username.clone().ok_or(HueError::NotPaired).map_err(HueError::into_domain)?;
        let resource_id = {
            let resources = session.resources.lock().unwrap_or_else(PoisonError::into_inner);
            resources
                .values()
                .find(|entity| entity.id == entity_id)
                .and_then(|entity| match &entity.driver_key {
                    DriverKey::Text(id) => Some(id.clone()),
                    DriverKey::Index(_) => None,
                })
                .ok_or_else(|| NotFoundError {
                    entity: "Entity",
                    id: entity_id.to_string(),
                })?
        };

        let body = match command.capability {
            CapabilityTag::OnOff => {
                serde_json::json!({ "on": command.value.as_bool().unwrap_or(false) })
            }
            CapabilityTag::Brightness => {
                let brightness = convert::brightness_to_bridge(command.value.as_f64().unwrap_or(0.0));
                serde_json::json!({ "bri": brightness })
            }
            CapabilityTag::ColorTemperature => {
                let mireds = convert::kelvin_to_mireds(command.value.as_f64().unwrap_or(2700.0));
                serde_json::json!({ "ct": mireds })
            }
            other => return Err(ValidationError::UnknownCapability(other.to_string()).into()),
        };

        self.throttle(device.id).await;
        let client = self.session(device.id)?.client.clone();
        client
            .set_light_state(&username, &resource_id, &body)
            .await
            .map_err(HueError::into_domain)
    }

    async fn shutdown(&mut self, device: &Device) -> Result<(), MiniHubError> {
        if let Some(session) = self.sessions.remove(&device.id) {
            if let Some(task) = session.poll_task {
                task.abort();
            }
            tracing::info!(device = %device.name, "Hue session closed");
        }
        self.last_command_at.remove(&device.id);
        Ok(())
    }
}
