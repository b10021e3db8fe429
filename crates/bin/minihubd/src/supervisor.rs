//! Composition root — builds every component the daemon needs and drives
//! the ordered startup/shutdown sequence around them.
//!
//! Startup order: storage, then the event bus and registry service, then
//! hub registration and its heartbeat loop, then every enabled protocol
//! adapter, then (if configured) discovery and the remote command queue,
//! then the HTTP server. Shutdown runs in reverse, one phase at a time,
//! each bounded by its own timeout: the server stops accepting connections
//! first, then discovery is told to stop, then the command consumer, then
//! the heartbeat loop, then adapters are shut down device by device in
//! reverse registration order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use minihub_adapter_ble::BleAdapter;
use minihub_adapter_esphome::EsphomeAdapter;
use minihub_adapter_hue::HueAdapter;
use minihub_adapter_mqtt::MqttAdapter;
use minihub_adapter_remote_store::{GenericMdnsBrowser, RemoteStoreCommandQueue};
use minihub_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, SqliteAreaRepository, SqliteCommandRepository,
    SqliteCredentialRepository, SqliteDeviceRepository, SqliteEntityHistoryRepository,
    SqliteEntityRepository, SqliteEntityStateRepository, SqliteEventStore, SqliteHubRepository,
};
use minihub_adapter_virtual::VirtualAdapter;
use minihub_app::command_consumer::CommandConsumer;
use minihub_app::discovery::DiscoveryManager;
use minihub_app::event_bus::InProcessEventBus;
use minihub_app::ports::{DeviceRepository, HubRepository};
use minihub_app::registry::AdapterRegistry;
use minihub_app::services::adapter_context_service::AdapterContextService;
use minihub_app::services::area_service::AreaService;
use minihub_app::services::registry_service::RegistryService;
use minihub_domain::device::Protocol;
use minihub_domain::hub::Hub;

use crate::adapter::Adapter;
use crate::config::Config;

/// Resolve this hub's id: the configured value if set, otherwise the id
/// persisted from a previous run, otherwise a freshly generated one
/// persisted for next time.
///
/// The `hubs` table is keyed by id, so an unknown id can't be looked up
/// there; the id itself is kept in a small sidecar file next to the
/// database so restarts without `hub.hub_id` set in the config file still
/// come back up as the same hub.
fn resolve_hub_id(config: &Config) -> anyhow::Result<String> {
    if let Some(id) = &config.hub.hub_id {
        return Ok(id.clone());
    }

    let marker = hub_id_marker_path(config);
    if let Ok(existing) = std::fs::read_to_string(&marker) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }

    let generated = uuid::Uuid::new_v4().to_string();
    if let Some(parent) = marker.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    std::fs::write(&marker, &generated)?;
    Ok(generated)
}

fn hub_id_marker_path(config: &Config) -> std::path::PathBuf {
    // Keep the marker next to the database file rather than inventing a
    // second configurable path; `sqlite:./minihub.db?mode=rwc` and
    // `sqlite::memory:` both resolve to a sane location.
    let url = config.database_url();
    let file_part = url
        .strip_prefix("sqlite:")
        .unwrap_or(url)
        .split('?')
        .next()
        .unwrap_or(url);
    if file_part.is_empty() || file_part == ":memory:" {
        std::path::PathBuf::from(".minihub_hub_id")
    } else {
        let mut path = std::path::PathBuf::from(file_part);
        path.set_extension("hub_id");
        path
    }
}

fn build_esphome_adapter(config: &Config) -> EsphomeAdapter {
    let cfg = &config.integrations.esphome;
    EsphomeAdapter::new(minihub_adapter_esphome::EsphomeConfig {
        password: cfg.password.clone(),
        connect_timeout_secs: cfg.connect_timeout_secs,
        ping_interval_secs: cfg.ping_interval_secs,
        session_timeout_secs: cfg.session_timeout_secs,
    })
}

fn build_hue_adapter(
    config: &Config,
    credentials: Arc<SqliteCredentialRepository>,
) -> anyhow::Result<HueAdapter<SqliteCredentialRepository>> {
    let cfg = &config.integrations.hue;
    let adapter = HueAdapter::new(
        minihub_adapter_hue::HueConfig {
            pairing_timeout_secs: cfg.pairing_timeout_secs,
            pairing_poll_interval_secs: cfg.pairing_poll_interval_secs,
            poll_interval_secs: cfg.poll_interval_secs,
            max_backoff_secs: cfg.max_backoff_secs,
            backoff_after_failures: cfg.backoff_after_failures,
            rate_limit_per_s: cfg.rate_limit_per_s,
        },
        credentials,
    )?;
    Ok(adapter)
}

fn build_mqtt_adapter(config: &Config) -> MqttAdapter {
    let cfg = &config.integrations.mqtt;
    MqttAdapter::new(minihub_adapter_mqtt::MqttConfig {
        broker_host: cfg.broker_host.clone(),
        broker_port: cfg.broker_port,
        client_id: cfg.client_id.clone(),
        base_topic: cfg.base_topic.clone(),
        keep_alive_secs: cfg.keep_alive_secs,
        ..Default::default()
    })
}

fn build_ble_adapter(config: &Config) -> BleAdapter {
    let cfg = &config.integrations.ble;
    BleAdapter::new(minihub_adapter_ble::BleConfig {
        scan_duration_secs: cfg.scan_duration_secs,
        update_interval_secs: cfg.update_interval_secs,
        device_filter: cfg.device_filter.clone(),
        miflora_enabled: cfg.miflora_enabled,
        miflora_filter: cfg.miflora_filter.clone(),
        miflora_connect_timeout_secs: cfg.miflora_connect_timeout_secs,
    })
}

/// Run the daemon until a shutdown signal (Ctrl-C or SIGTERM) arrives.
///
/// # Errors
///
/// Returns an error if the database can't be opened/migrated, the Hue
/// adapter fails to construct, the local mDNS daemon can't be started, or
/// the HTTP listener can't be bound.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let hub_id = resolve_hub_id(&config)?;
    tracing::info!(hub_id = %hub_id, "starting minihub");

    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Every Sqlite repository is a thin `Clone` handle around the shared
    // pool, so each port that needs its own owned copy (the registry
    // service, the command consumer, `AppState`'s `Arc<...>` fields) just
    // clones one rather than sharing a single `Arc<Repo>` — that would
    // force every port generic to accept `Arc<Repo>` instead of `Repo`.
    let device_repo = SqliteDeviceRepository::new(pool.clone());
    let entity_repo = SqliteEntityRepository::new(pool.clone());
    let area_repo = SqliteAreaRepository::new(pool.clone());
    let command_repo = SqliteCommandRepository::new(pool.clone());
    let credential_repo = SqliteCredentialRepository::new(pool.clone(), config.credential_encryption_key());
    let event_store = SqliteEventStore::new(pool.clone());
    let hub_repo = SqliteHubRepository::new(pool.clone());

    let event_bus = Arc::new(InProcessEventBus::new(
        minihub_app::event_bus::DEFAULT_MAILBOX_CAPACITY,
    ));

    // Shared between both sinks: a write failure in either marks the same
    // `/health` `persistence-ok` component degraded.
    let persistence_health = minihub_app::persistence::PersistenceHealth::new();
    let latest_state =
        SqliteEntityStateRepository::new(pool.clone(), Arc::clone(&event_bus), persistence_health.clone());
    let history = SqliteEntityHistoryRepository::new(
        pool.clone(),
        Arc::clone(&event_bus),
        persistence_health.clone(),
    );
    history.spawn_flush_loop();

    let registry_service = Arc::new(RegistryService::new(
        device_repo.clone(),
        entity_repo.clone(),
        latest_state.clone(),
        history.clone(),
        Arc::clone(&event_bus),
    ));
    let adapter_ctx = AdapterContextService::new(
        Arc::clone(&registry_service),
        Arc::new(command_repo.clone()),
        Arc::clone(&event_bus),
    );

    let now = minihub_domain::time::now();
    let hub = Hub::new(hub_id.clone(), now)?;
    hub_repo.upsert(hub).await?;

    // Registration and heartbeat start are a single startup step: the hub
    // should never sit registered-but-heartbeatless while adapters spin up
    // or discovery runs its first pass.
    let mut heartbeat_shutdown_tx = None;
    let heartbeat_task = if config.remote_store.remote_store_url.is_some() {
        let (tx, mut rx) = oneshot::channel();
        heartbeat_shutdown_tx = Some(tx);
        let interval = Duration::from_secs(u64::from(config.telemetry.heartbeat_interval_s.max(1)));
        let hub_repo = hub_repo.clone();
        let hub_id = hub_id.clone();
        Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tokio::time::sleep(interval) => {}
                    _ = &mut rx => break,
                }
                let mut hub = match hub_repo.get(&hub_id).await {
                    Ok(Some(hub)) => hub,
                    Ok(None) => continue,
                    Err(error) => {
                        tracing::warn!(%error, "failed to load hub for heartbeat");
                        continue;
                    }
                };
                hub.heartbeat(minihub_domain::time::now());
                if let Err(error) = hub_repo.upsert(hub).await {
                    tracing::warn!(%error, "failed to persist hub heartbeat");
                }
            }
        }))
    } else {
        None
    };

    let mut adapters = vec![(Protocol::Virtual, Adapter::Virtual(VirtualAdapter::default()))];
    if config.integrations.esphome.enabled {
        adapters.push((Protocol::Esphome, Adapter::Esphome(build_esphome_adapter(&config))));
    }
    if config.integrations.hue.enabled {
        let hue = build_hue_adapter(&config, Arc::new(credential_repo.clone()))?;
        adapters.push((Protocol::Hue, Adapter::Hue(Box::new(hue))));
    }
    if config.integrations.mqtt.enabled {
        adapters.push((Protocol::Mqtt, Adapter::Mqtt(build_mqtt_adapter(&config))));
    }
    if config.integrations.ble.enabled {
        adapters.push((Protocol::Ble, Adapter::Ble(build_ble_adapter(&config))));
    }

    let registry = Arc::new(AdapterRegistry::new(adapters));
    registry.initialize_all(&adapter_ctx).await;

    let area_service = Arc::new(AreaService::new(area_repo));

    let state = minihub_adapter_http_axum::state::AppState::new(
        Arc::clone(&registry_service),
        Arc::new(latest_state.clone()),
        Arc::new(history.clone()),
        Arc::clone(&area_service),
        Arc::new(command_repo.clone()),
        Arc::new(hub_repo.clone()),
        Arc::new(event_store.clone()),
        Arc::clone(&event_bus),
        minihub_adapter_http_axum::state::AppStateConfig {
            hub_id: hub_id.clone(),
            hub_name: config.hub.hub_name.clone(),
            hub_version: config.hub.hub_version.clone(),
            started_at: now,
            discovery_enabled: config.discovery.enabled,
        },
    );

    let mut discovery_shutdown_tx = None;
    let discovery_task = if config.discovery.enabled {
        let mdns = GenericMdnsBrowser::new()?;
        let manager = Arc::new(DiscoveryManager::new(
            Arc::clone(&registry),
            mdns,
            Arc::clone(&event_bus),
        ));
        let (tx, mut rx) = oneshot::channel();
        discovery_shutdown_tx = Some(tx);
        let interval = Duration::from_secs(u64::from(config.discovery.interval_s.max(1)));
        let ctx = adapter_ctx.clone();
        let registry = Arc::clone(&registry);
        let discovered_slot = Arc::clone(&state.discovered);
        Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tokio::time::sleep(interval) => {}
                    _ = &mut rx => break,
                }
                match manager.poll_once(&ctx).await {
                    Ok(newly_found) => {
                        for found in &newly_found {
                            if let Err(error) = registry.connect(&found.device).await {
                                tracing::warn!(device_id = %found.device.id, %error, "failed to connect to discovered device");
                                continue;
                            }
                            match registry.enumerate_entities(&found.device).await {
                                Ok(entities) => {
                                    for entity in entities {
                                        if let Err(error) = ctx.upsert_entity(entity).await {
                                            tracing::warn!(device_id = %found.device.id, %error, "failed to persist enumerated entity");
                                        }
                                    }
                                }
                                Err(error) => {
                                    tracing::warn!(device_id = %found.device.id, %error, "failed to enumerate entities");
                                }
                            }
                            if let Err(error) = registry.subscribe_state(&found.device, ctx.clone()).await {
                                tracing::warn!(device_id = %found.device.id, %error, "failed to subscribe to device state");
                            }
                        }
                        if !newly_found.is_empty() {
                            let mut slot = discovered_slot.write().await;
                            slot.extend(newly_found);
                        }
                    }
                    Err(error) => tracing::warn!(%error, "discovery pass failed"),
                }
            }
        }))
    } else {
        None
    };

    let mut command_consumer_shutdown_tx = None;
    let command_consumer_task = if let Some(base_url) = config.remote_store.remote_store_url.clone() {
        let queue = RemoteStoreCommandQueue::new(
            reqwest::Client::new(),
            base_url,
            config.remote_store.remote_store_key.clone(),
        );
        let consumer = Arc::new(
            CommandConsumer::new(
                device_repo.clone(),
                command_repo.clone(),
                Arc::clone(&registry),
                queue,
                Arc::clone(&event_bus),
            )
            .with_poll_interval(Duration::from_secs(u64::from(
                config.command_consumer.poll_interval_s.max(1),
            ))),
        );
        if let Err(error) = consumer.startup_sweep().await {
            tracing::warn!(%error, "command consumer startup sweep failed");
        }
        let (tx, rx) = oneshot::channel();
        command_consumer_shutdown_tx = Some(tx);
        Some(tokio::spawn(consumer.run(rx)))
    } else {
        tracing::info!("no remote store configured, running in local-only mode");
        None
    };

    let router = minihub_adapter_http_axum::router::build(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %config.bind_addr(), "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down");

    // Reverse of startup order: discovery and the command consumer stop
    // before the heartbeat, each given its own bounded window rather than
    // being torn down together.
    const SHUTDOWN_PHASE_TIMEOUT: Duration = Duration::from_secs(5);

    if let Some(tx) = discovery_shutdown_tx {
        let _ = tx.send(());
    }
    if let Some(task) = discovery_task {
        let _ = tokio::time::timeout(SHUTDOWN_PHASE_TIMEOUT, task).await;
    }

    if let Some(tx) = command_consumer_shutdown_tx {
        let _ = tx.send(());
    }
    if let Some(task) = command_consumer_task {
        let _ = tokio::time::timeout(SHUTDOWN_PHASE_TIMEOUT, task).await;
    }

    if let Some(tx) = heartbeat_shutdown_tx {
        let _ = tx.send(());
    }
    if let Some(task) = heartbeat_task {
        let _ = tokio::time::timeout(SHUTDOWN_PHASE_TIMEOUT, task).await;
    }

    if let Ok(Some(mut hub)) = hub_repo.get(&hub_id).await {
        hub.mark_offline();
        let _ = hub_repo.upsert(hub).await;
    }

    let devices = device_repo.get_all().await.unwrap_or_default();
    registry.shutdown_all(&devices).await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
