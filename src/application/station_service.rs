// Station service - single task owning the core; callers talk to it over channels
use crate::application::station_core::{DispatchReport, StationCore};
use crate::domain::dashboard::{DashboardView, RenderEvent};
use crate::domain::telemetry::DecodeError;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 1024;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("station service has stopped")]
    Stopped,
}

enum Command {
    Ingest {
        topic: String,
        body: Bytes,
        received_ms: i64,
        reply: oneshot::Sender<Result<DispatchReport, DecodeError>>,
    },
    View {
        reply: oneshot::Sender<DashboardView>,
    },
    Replace {
        core: Box<StationCore>,
        last_good_stamp: i64,
        reply: oneshot::Sender<()>,
    },
}

/// Cheap-to-clone handle to the task that owns all aggregation state.
/// Messages are applied strictly one after another in arrival order.
#[derive(Clone)]
pub struct StationService {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<RenderEvent>,
}

impl StationService {
    pub fn spawn(core: StationCore) -> Self {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        tokio::spawn(run(core, rx, events.clone()));
        Self { commands, events }
    }

    pub async fn ingest(
        &self,
        topic: impl Into<String>,
        body: Bytes,
        received_ms: i64,
    ) -> Result<DispatchReport, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Ingest {
            topic: topic.into(),
            body,
            received_ms,
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| ServiceError::Stopped)??)
    }

    pub async fn view(&self) -> Result<DashboardView, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::View { reply }).await?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }

    /// Swaps in a freshly built core. Messages queued before the swap are
    /// applied to the old core, everything after to the new one.
    pub async fn replace(&self, core: StationCore, last_good_stamp: i64) -> Result<(), ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Replace {
            core: Box::new(core),
            last_good_stamp,
            reply,
        })
        .await?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RenderEvent> {
        self.events.subscribe()
    }

    async fn send(&self, command: Command) -> Result<(), ServiceError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ServiceError::Stopped)
    }
}

async fn run(
    mut core: StationCore,
    mut commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<RenderEvent>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Ingest {
                topic,
                body,
                received_ms,
                reply,
            } => {
                let result = match core.dispatch(&topic, &body, received_ms) {
                    Ok(dispatch) => {
                        for event in dispatch.events {
                            // No subscribers is fine
                            let _ = events.send(event);
                        }
                        Ok(dispatch.report)
                    }
                    Err(e) => {
                        tracing::warn!(topic = %topic, error = %e, "dropping undecodable message");
                        Err(e)
                    }
                };
                let _ = reply.send(result);
            }
            Command::View { reply } => {
                let _ = reply.send(core.view());
            }
            Command::Replace {
                core: fresh,
                last_good_stamp,
                reply,
            } => {
                core = *fresh;
                tracing::info!(last_good_stamp, "station core replaced");
                let _ = events.send(RenderEvent::Reloaded { last_good_stamp });
                let _ = reply.send(());
            }
        }
    }
    tracing::debug!("station service command channel closed");
}
