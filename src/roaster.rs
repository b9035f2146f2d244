// src/roaster.rs - Roaster task: owns the engine, ticks it and serves commands
//
// Everything that touches the engine runs on this one task. Web handlers
// talk to it through `RoasterHandle`, which sends `RoasterRequest`s over an
// mpsc channel and waits on a oneshot for the reply.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::engine::{EngineError, EngineStatus, FinishedRoast, RoastEngine, RoastSnapshot, RoastStart, StopOutcome};
use crate::profile::Profile;
use crate::storage::{RoastLogSink, StorageError};

const REQUEST_QUEUE: usize = 32;
const EVENT_QUEUE: usize = 256;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Roaster task is not running")]
    Unavailable,
}

/// Streamed to WebSocket clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoastEvent {
    Snapshot(RoastSnapshot),
    /// Sent once, right after an automatically completed roast is saved.
    Finished { roast_finished: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StopReport {
    /// The roast was stopped, or an earlier unsaved roast was retried, and
    /// saved under this log name.
    Stopped { log: String },
    NoRoastInProgress,
}

/// Engine status plus the roasts still waiting for a successful save.
#[derive(Debug, Clone, Serialize)]
pub struct RoasterStatus {
    #[serde(flatten)]
    pub engine: EngineStatus,
    pub unsaved_roasts: usize,
}

#[derive(Debug)]
pub enum RoasterRequest {
    StartPreheat {
        respond_to: oneshot::Sender<Result<f64, EngineError>>,
    },
    StartRoast {
        profile: Profile,
        respond_to: oneshot::Sender<Result<RoastStart, EngineError>>,
    },
    StopRoast {
        respond_to: oneshot::Sender<Result<StopReport, ServiceError>>,
    },
    Reset {
        /// Log name if a roast in progress had to be saved.
        respond_to: oneshot::Sender<Result<Option<String>, ServiceError>>,
    },
    LoadProfile {
        profile: Profile,
        respond_to: oneshot::Sender<Result<(), EngineError>>,
    },
    GetStatus {
        respond_to: oneshot::Sender<RoasterStatus>,
    },
}

/// Cloneable front door to the roaster task.
#[derive(Clone)]
pub struct RoasterHandle {
    tx: mpsc::Sender<RoasterRequest>,
    events: broadcast::Sender<RoastEvent>,
}

impl RoasterHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> RoasterRequest) -> Result<T, ServiceError> {
        let (respond_to, response) = oneshot::channel();
        self.tx
            .send(build(respond_to))
            .await
            .map_err(|_| ServiceError::Unavailable)?;
        response.await.map_err(|_| ServiceError::Unavailable)
    }

    pub async fn start_preheat(&self) -> Result<f64, ServiceError> {
        Ok(self.request(|respond_to| RoasterRequest::StartPreheat { respond_to }).await??)
    }

    pub async fn start_roast(&self, profile: Profile) -> Result<RoastStart, ServiceError> {
        Ok(self
            .request(|respond_to| RoasterRequest::StartRoast { profile, respond_to })
            .await??)
    }

    pub async fn stop_roast(&self) -> Result<StopReport, ServiceError> {
        self.request(|respond_to| RoasterRequest::StopRoast { respond_to }).await?
    }

    pub async fn reset(&self) -> Result<Option<String>, ServiceError> {
        self.request(|respond_to| RoasterRequest::Reset { respond_to }).await?
    }

    pub async fn load_profile(&self, profile: Profile) -> Result<(), ServiceError> {
        Ok(self
            .request(|respond_to| RoasterRequest::LoadProfile { profile, respond_to })
            .await??)
    }

    pub async fn status(&self) -> Result<RoasterStatus, ServiceError> {
        self.request(|respond_to| RoasterRequest::GetStatus { respond_to }).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoastEvent> {
        self.events.subscribe()
    }
}

pub struct RoasterService {
    engine: RoastEngine,
    sink: Arc<dyn RoastLogSink>,
    rx: mpsc::Receiver<RoasterRequest>,
    events: broadcast::Sender<RoastEvent>,
    tick_period: Duration,
    /// Finished roasts whose save failed, oldest first.
    unsaved: VecDeque<FinishedRoast>,
}

impl RoasterService {
    pub fn new(engine: RoastEngine, sink: Arc<dyn RoastLogSink>, tick_period: Duration) -> (Self, RoasterHandle) {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
        let (events, _) = broadcast::channel(EVENT_QUEUE);
        let handle = RoasterHandle {
            tx,
            events: events.clone(),
        };
        let service = Self {
            engine,
            sink,
            rx,
            events,
            tick_period,
            unsaved: VecDeque::new(),
        };
        (service, handle)
    }

    /// Spawn the service on the current runtime.
    pub fn spawn(
        engine: RoastEngine,
        sink: Arc<dyn RoastLogSink>,
        tick_period: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> (RoasterHandle, JoinHandle<Result<(), ServiceError>>) {
        let (service, handle) = Self::new(engine, sink, tick_period);
        (handle, tokio::spawn(service.run(shutdown)))
    }

    /// Tick and serve commands until shutdown, until every handle is dropped,
    /// or until the plant fails. A roast still in progress at that point is
    /// saved with the history it has so far.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServiceError> {
        tracing::info!("Roaster task started, tick every {:?}", self.tick_period);
        let mut interval = tokio::time::interval(self.tick_period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let result = loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Roaster task shutting down");
                    break Ok(());
                }
                request = self.rx.recv() => match request {
                    Some(request) => self.handle(request).await,
                    None => {
                        tracing::info!("All roaster handles dropped");
                        break Ok(());
                    }
                },
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!("Roast session failed: {}", e);
                        break Err(e);
                    }
                }
            }
        };
        let roast = self.engine.abort();
        if let Err(e) = self.store(roast).await {
            tracing::error!(
                "Failed to save roast history on exit, {} roast(s) lost: {}",
                self.unsaved.len(),
                e
            );
        }
        result
    }

    async fn tick(&mut self) -> Result<(), ServiceError> {
        let Some(outcome) = self.engine.tick()? else {
            return Ok(());
        };
        // No subscribers is fine.
        let _ = self.events.send(RoastEvent::Snapshot(outcome.snapshot));
        if let Some(roast) = outcome.finished {
            if let Err(e) = self.store(Some(roast)).await {
                tracing::error!("Failed to save completed roast, kept for retry: {}", e);
            }
            let _ = self.events.send(RoastEvent::Finished { roast_finished: true });
        }
        Ok(())
    }

    async fn handle(&mut self, request: RoasterRequest) {
        match request {
            RoasterRequest::StartPreheat { respond_to } => {
                let result = self.engine.start_preheat();
                log_rejection("start_preheat", &result);
                let _ = respond_to.send(result);
            }
            RoasterRequest::StartRoast { profile, respond_to } => {
                let result = self.engine.start_roast(profile);
                log_rejection("start_roast", &result);
                let _ = respond_to.send(result);
            }
            RoasterRequest::StopRoast { respond_to } => {
                let roast = match self.engine.stop_roast() {
                    StopOutcome::Stopped(roast) => Some(roast),
                    StopOutcome::NoRoastInProgress => None,
                };
                let result = self
                    .store(roast)
                    .await
                    .map(|log| match log {
                        Some(log) => StopReport::Stopped { log },
                        None => StopReport::NoRoastInProgress,
                    })
                    .map_err(ServiceError::from);
                let _ = respond_to.send(result);
            }
            RoasterRequest::Reset { respond_to } => {
                let roast = self.engine.reset();
                let result = self.store(roast).await.map_err(ServiceError::from);
                let _ = respond_to.send(result);
            }
            RoasterRequest::LoadProfile { profile, respond_to } => {
                let result = self.engine.load_profile(profile);
                log_rejection("load_profile", &result);
                let _ = respond_to.send(result);
            }
            RoasterRequest::GetStatus { respond_to } => {
                let _ = respond_to.send(RoasterStatus {
                    engine: self.engine.status(),
                    unsaved_roasts: self.unsaved.len(),
                });
            }
        }
    }

    /// Queue `roast` behind any earlier unsaved roasts and save them in
    /// order. Returns the name of the last one saved. On failure the rest stay
    /// queued for the next stop, reset, completion or shutdown.
    async fn store(&mut self, roast: Option<FinishedRoast>) -> Result<Option<String>, StorageError> {
        self.unsaved.extend(roast);
        let sink = Arc::clone(&self.sink);
        let mut last = None;
        while let Some(roast) = self.unsaved.front() {
            let name = sink.save(roast).await?;
            tracing::info!("Roast history saved as {}", name);
            self.unsaved.pop_front();
            last = Some(name);
        }
        Ok(last)
    }
}

fn log_rejection<T>(command: &str, result: &Result<T, EngineError>) {
    if let Err(e) = result {
        tracing::warn!("{} rejected: {}", command, e);
    }
}
