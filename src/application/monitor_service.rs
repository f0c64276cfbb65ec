// Monitor service - Single-task ingestion loop with persistence mirroring and live updates
use crate::application::error::MonitorError;
use crate::application::metadata_resolver::MetadataResolver;
use crate::application::monitor_session::{DeviceUpdate, MonitorSession, SessionSettings, SessionStatus};
use crate::application::normalizer::{InboundMessage, parse_inbound};
use crate::application::persistence_gateway::{PersistenceGateway, SESSION_CONTEXT_KEY, StoreKind};
use crate::application::telemetry_stores::{StoreChanges, TelemetryStores};
use crate::domain::alerts::AlertSet;
use crate::domain::chart::ChartSeries;
use crate::domain::dashboard::{DeviceDashboard, DeviceSummary};
use crate::domain::device::DeviceMetadata;
use crate::domain::telemetry::{DeviceId, FaultRecord, GEvent};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

const COMMAND_BUFFER: usize = 256;
const UPDATE_BUFFER: usize = 512;

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub session: SessionSettings,
    /// Close the stream when no snapshot arrives within this bound
    pub idle_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearReason {
    UserRequest,
    ContextChanged,
}

/// Notifications pushed to stream subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorUpdate {
    DeviceUpdated(DeviceUpdate),
    StoresCleared {
        reason: ClearReason,
    },
    #[serde(rename_all = "camelCase")]
    StreamClosed {
        session_id: String,
        timeout_seconds: u64,
    },
    StreamReopened,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub accepted: usize,
    pub duplicates: usize,
    pub dropped: usize,
    pub rejected: usize,
    pub stream_closed: bool,
}

enum Command {
    Inbound {
        payload: Value,
        reply: oneshot::Sender<Result<IngestSummary, MonitorError>>,
    },
    Track {
        context: String,
        reply: oneshot::Sender<bool>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
    Reconnect {
        reply: oneshot::Sender<bool>,
    },
    /// Read-only projection evaluated against the live session
    Query(Box<dyn FnOnce(&MonitorSession) + Send>),
    MetadataResolved {
        device_id: DeviceId,
        metadata: Option<DeviceMetadata>,
        /// Context generation the lookup was spawned under
        generation: u64,
    },
}

/// Cloneable handle to the running monitor task
#[derive(Clone)]
pub struct MonitorHandle {
    commands: mpsc::Sender<Command>,
    updates: broadcast::Sender<MonitorUpdate>,
}

impl MonitorHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, MonitorError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| MonitorError::Unavailable)?;
        response.await.map_err(|_| MonitorError::Unavailable)
    }

    /// Feed one frame or an array of frames
    pub async fn ingest(&self, payload: Value) -> Result<IngestSummary, MonitorError> {
        self.request(|reply| Command::Inbound { payload, reply }).await?
    }

    /// Returns true when the stores were reset for the new context
    pub async fn track(&self, context: impl Into<String>) -> Result<bool, MonitorError> {
        let context = context.into();
        self.request(|reply| Command::Track { context, reply }).await
    }

    pub async fn clear(&self) -> Result<(), MonitorError> {
        self.request(|reply| Command::Clear { reply }).await
    }

    pub async fn reconnect(&self) -> Result<bool, MonitorError> {
        self.request(|reply| Command::Reconnect { reply }).await
    }

    async fn query<T: Send + 'static>(
        &self,
        project: impl FnOnce(&MonitorSession) -> T + Send + 'static,
    ) -> Result<T, MonitorError> {
        self.request(|reply| {
            Command::Query(Box::new(move |session| {
                let _ = reply.send(project(session));
            }))
        })
        .await
    }

    pub async fn status(&self) -> Result<SessionStatus, MonitorError> {
        self.query(MonitorSession::status).await
    }

    pub async fn devices(&self) -> Result<Vec<DeviceSummary>, MonitorError> {
        self.query(MonitorSession::summaries).await
    }

    pub async fn dashboard(&self, device_id: &str) -> Result<Option<DeviceDashboard>, MonitorError> {
        let device_id = device_id.to_string();
        self.query(move |session| session.dashboard(&device_id)).await
    }

    pub async fn chart(&self, device_id: &str) -> Result<Option<ChartSeries>, MonitorError> {
        let device_id = device_id.to_string();
        self.query(move |session| session.chart(&device_id)).await
    }

    pub async fn faults(&self, device_id: &str) -> Result<Option<Vec<FaultRecord>>, MonitorError> {
        let device_id = device_id.to_string();
        self.query(move |session| session.faults(&device_id)).await
    }

    pub async fn events(&self, device_id: &str) -> Result<Option<Vec<GEvent>>, MonitorError> {
        let device_id = device_id.to_string();
        self.query(move |session| session.events(&device_id)).await
    }

    pub async fn alerts(&self, device_id: &str) -> Result<Option<AlertSet>, MonitorError> {
        let device_id = device_id.to_string();
        self.query(move |session| session.alerts(&device_id)).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorUpdate> {
        self.updates.subscribe()
    }
}

pub struct MonitorService {
    session: MonitorSession,
    gateway: Arc<dyn PersistenceGateway>,
    resolver: Arc<dyn MetadataResolver>,
    updates: broadcast::Sender<MonitorUpdate>,
    commands: mpsc::WeakSender<Command>,
    pending_lookups: HashSet<DeviceId>,
    /// Bumped on every context change; stale lookup replies are discarded
    generation: u64,
    idle_timeout: Option<Duration>,
    last_frame_at: Instant,
}

impl MonitorService {
    /// Restore persisted state and spawn the monitor task
    pub async fn start(
        settings: MonitorSettings,
        gateway: Arc<dyn PersistenceGateway>,
        resolver: Arc<dyn MetadataResolver>,
    ) -> MonitorHandle {
        let session = Self::restore(settings.session, gateway.as_ref()).await;

        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let (updates, _) = broadcast::channel(UPDATE_BUFFER);

        let service = MonitorService {
            session,
            gateway,
            resolver,
            updates: updates.clone(),
            commands: commands.downgrade(),
            pending_lookups: HashSet::new(),
            generation: 0,
            idle_timeout: settings.idle_timeout.filter(|t| !t.is_zero()),
            last_frame_at: Instant::now(),
        };
        tokio::spawn(service.run(receiver));

        MonitorHandle { commands, updates }
    }

    async fn restore(settings: SessionSettings, gateway: &dyn PersistenceGateway) -> MonitorSession {
        let context = load_or_log(gateway, SESSION_CONTEXT_KEY).await;
        let window = load_or_log(gateway, StoreKind::Window.key()).await;
        let faults = load_or_log(gateway, StoreKind::Fault.key()).await;
        let events = load_or_log(gateway, StoreKind::Event.key()).await;

        let stores = TelemetryStores::restore(
            settings.capacities,
            window.as_deref(),
            faults.as_deref(),
            events.as_deref(),
        );
        tracing::info!(
            context = ?context,
            devices = stores.device_count(),
            "Restored monitor state"
        );

        MonitorSession::restored(settings, stores, context)
    }

    async fn run(mut self, mut receiver: mpsc::Receiver<Command>) {
        loop {
            let idle_deadline = self
                .idle_timeout
                .filter(|_| self.session.is_open())
                .map(|timeout| self.last_frame_at + timeout);

            tokio::select! {
                command = receiver.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = wait_until(idle_deadline) => self.on_idle_timeout(),
            }
        }
        tracing::info!("Monitor service stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Inbound { payload, reply } => {
                let result = self.ingest(payload).await;
                let _ = reply.send(result);
            }
            Command::Track { context, reply } => {
                let reset = self.track(context).await;
                let _ = reply.send(reset);
            }
            Command::Clear { reply } => {
                self.session.clear();
                tracing::info!("Stores cleared on request");
                self.clear_persisted().await;
                self.publish(MonitorUpdate::StoresCleared {
                    reason: ClearReason::UserRequest,
                });
                let _ = reply.send(());
            }
            Command::Reconnect { reply } => {
                let reopened = self.session.reopen();
                if reopened {
                    tracing::info!("Telemetry stream reopened");
                    self.last_frame_at = Instant::now();
                    self.publish(MonitorUpdate::StreamReopened);
                }
                let _ = reply.send(reopened);
            }
            Command::Query(project) => project(&self.session),
            Command::MetadataResolved {
                device_id,
                metadata,
                generation,
            } => {
                if generation != self.generation {
                    tracing::debug!(device_id = %device_id, "Discarding metadata resolved for a previous context");
                    return;
                }
                self.pending_lookups.remove(&device_id);
                if self.session.stores().contains(&device_id) {
                    self.session.apply_metadata(&device_id, metadata.as_ref());
                    if let Some(update) = self.session.device_update(&device_id) {
                        self.publish(MonitorUpdate::DeviceUpdated(update));
                    }
                }
            }
        }
    }

    async fn ingest(&mut self, payload: Value) -> Result<IngestSummary, MonitorError> {
        let received_at = Utc::now();
        let frames = match payload {
            Value::Array(frames) => frames,
            frame => vec![frame],
        };

        let mut summary = IngestSummary::default();
        let mut changes = StoreChanges::default();
        let mut touched: Vec<DeviceId> = Vec::new();
        let mut rejection = None;

        for frame in &frames {
            match parse_inbound(frame, received_at) {
                None => {
                    tracing::warn!("Dropping frame without a usable device id");
                    summary.dropped += 1;
                }
                Some(InboundMessage::SessionTimeout {
                    session_id,
                    timeout_seconds,
                }) => self.close_stream(&session_id, timeout_seconds),
                Some(InboundMessage::Snapshot {
                    snapshot,
                    thresholds,
                }) => {
                    self.last_frame_at = Instant::now();
                    let device_id = snapshot.device_id.clone();
                    match self.session.ingest(snapshot, thresholds) {
                        Ok(report) => {
                            changes.merge(report.changes);
                            if report.duplicate {
                                summary.duplicates += 1;
                            } else {
                                summary.accepted += 1;
                            }
                            if !touched.contains(&device_id) {
                                touched.push(device_id);
                            }
                        }
                        Err(e) => {
                            summary.rejected += 1;
                            rejection = Some(e);
                        }
                    }
                }
            }
        }

        self.persist(changes).await;

        for device_id in &touched {
            self.request_identity(device_id);
            if let Some(update) = self.session.device_update(device_id) {
                self.publish(MonitorUpdate::DeviceUpdated(update));
            }
        }

        summary.stream_closed = !self.session.is_open();
        match rejection {
            Some(e) if summary.accepted == 0 && summary.duplicates == 0 => Err(e),
            _ => Ok(summary),
        }
    }

    async fn track(&mut self, context: String) -> bool {
        if !self.session.track(&context) {
            return false;
        }

        self.pending_lookups.clear();
        self.generation += 1;
        self.last_frame_at = Instant::now();
        self.clear_persisted().await;
        if let Err(e) = self.gateway.save(SESSION_CONTEXT_KEY, &context).await {
            tracing::warn!(key = SESSION_CONTEXT_KEY, error = %e, "Failed to persist tracked context");
        }
        self.publish(MonitorUpdate::StoresCleared {
            reason: ClearReason::ContextChanged,
        });
        true
    }

    fn close_stream(&mut self, session_id: &str, timeout_seconds: u64) {
        if self.session.close(session_id, timeout_seconds) {
            tracing::info!(session_id, timeout_seconds, "Telemetry stream closed by session timeout");
            self.publish(MonitorUpdate::StreamClosed {
                session_id: session_id.to_string(),
                timeout_seconds,
            });
        } else {
            tracing::debug!(session_id, "Ignoring timeout for inactive session");
        }
    }

    fn on_idle_timeout(&mut self) {
        let Some(timeout) = self.idle_timeout else {
            return;
        };
        let session_id = self.session.context().unwrap_or("default").to_string();
        tracing::warn!(session_id = %session_id, "No telemetry received within {:?}", timeout);
        self.close_stream(&session_id, timeout.as_secs());
    }

    // Lookups run off the ingestion path and report back as a command
    fn request_identity(&mut self, device_id: &str) {
        if !self.session.needs_identity(device_id) || self.pending_lookups.contains(device_id) {
            return;
        }
        let Some(commands) = self.commands.upgrade() else {
            return;
        };
        self.pending_lookups.insert(device_id.to_string());

        let resolver = self.resolver.clone();
        let device_id = device_id.to_string();
        let generation = self.generation;
        tokio::spawn(async move {
            let metadata = match resolver.resolve(&device_id).await {
                Ok(Some(metadata)) => Some(metadata),
                Ok(None) => {
                    tracing::debug!(device_id = %device_id, "No metadata for device");
                    None
                }
                Err(e) => {
                    tracing::warn!(device_id = %device_id, error = %e, "Metadata lookup failed");
                    None
                }
            };
            let _ = commands
                .send(Command::MetadataResolved {
                    device_id,
                    metadata,
                    generation,
                })
                .await;
        });
    }

    async fn persist(&self, changes: StoreChanges) {
        if !changes.any() {
            return;
        }
        for kind in changes.kinds() {
            let blob = match self.session.stores().serialize(kind) {
                Ok(blob) => blob,
                Err(e) => {
                    tracing::warn!(key = kind.key(), error = %e, "Failed to serialize store");
                    continue;
                }
            };
            if let Err(e) = self.gateway.save(kind.key(), &blob).await {
                tracing::warn!(key = kind.key(), error = %e, "Failed to persist store, keeping in-memory state");
            }
        }
    }

    async fn clear_persisted(&self) {
        for kind in StoreKind::ALL {
            if let Err(e) = self.gateway.clear(kind.key()).await {
                tracing::warn!(key = kind.key(), error = %e, "Failed to clear persisted store");
            }
        }
    }

    fn publish(&self, update: MonitorUpdate) {
        // no subscribers is fine
        let _ = self.updates.send(update);
    }
}

async fn load_or_log(gateway: &dyn PersistenceGateway, key: &str) -> Option<String> {
    match gateway.load(key).await {
        Ok(blob) => blob,
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to load persisted state");
            None
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
