//! The process-wide message router.
//!
//! One dispatcher task drains the inbound queue and the session-closed
//! queue. Each inbound message is handed to a bounded worker pool for
//! decode-and-dispatch; when the pool is saturated, intake blocks until a
//! slot frees (backpressure, not an error). Stopping the hub exits the
//! dispatcher and waits for every in-flight worker to finish.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::HubConfig;
use crate::core_channel::base::{BaseChannel, Channel};
use crate::core_channel::errors::ChannelError;
use crate::core_channel::lao::LaoChannel;
use crate::core_crypto::PublicKey;
use crate::core_hub::registry::HubContext;
use crate::core_protocol::messagedata::{CreateLao, ObjectAction};
use crate::core_protocol::{
    AnswerResult, ClientSession, ProtocolMessage, Query, Request, SchemaKind, SchemaValidator,
    SessionId,
};

/// Path of the implicit root channel.
pub const ROOT_CHANNEL: &str = "/root";
const ROOT_PREFIX: &str = "/root/";

/// A raw inbound message together with the session it arrived on.
pub struct IncomingMessage {
    pub session: Arc<dyn ClientSession>,
    pub payload: Vec<u8>,
}

/// Returned by [`Hub::dispatch`] once the hub has shut down.
#[derive(Debug, Error)]
#[error("hub is stopped")]
pub struct HubStopped;

struct Receivers {
    incoming_rx: mpsc::Receiver<IncomingMessage>,
    closed_rx: mpsc::Receiver<SessionId>,
    stop_rx: watch::Receiver<bool>,
}

/// The hub owns the channel registry and the worker pool; everything else
/// reaches it through [`Hub::dispatch`] and [`Hub::on_session_closed`].
pub struct Hub {
    ctx: Arc<HubContext>,
    incoming_tx: mpsc::Sender<IncomingMessage>,
    closed_tx: mpsc::Sender<SessionId>,
    receivers: Mutex<Option<Receivers>>,
    workers: Arc<Semaphore>,
    num_workers: usize,
    stop_tx: watch::Sender<bool>,
}

impl Hub {
    pub fn new(
        config: &HubConfig,
        organizer: PublicKey,
        validator: Arc<dyn SchemaValidator>,
    ) -> Arc<Self> {
        let (incoming_tx, incoming_rx) = mpsc::channel(config.queue_capacity);
        let (closed_tx, closed_rx) = mpsc::channel(config.queue_capacity);
        let (stop_tx, stop_rx) = watch::channel(false);

        Arc::new(Self {
            ctx: Arc::new(HubContext::new(organizer, validator)),
            incoming_tx,
            closed_tx,
            receivers: Mutex::new(Some(Receivers {
                incoming_rx,
                closed_rx,
                stop_rx,
            })),
            workers: Arc::new(Semaphore::new(config.num_workers)),
            num_workers: config.num_workers,
            stop_tx,
        })
    }

    pub fn ctx(&self) -> &Arc<HubContext> {
        &self.ctx
    }

    /// Enqueue a raw inbound message.
    ///
    /// Blocks only while the inbound queue is full, which is how saturation
    /// of the worker pool propagates back to the transport.
    pub async fn dispatch(
        &self,
        session: Arc<dyn ClientSession>,
        payload: Vec<u8>,
    ) -> Result<(), HubStopped> {
        self.incoming_tx
            .send(IncomingMessage { session, payload })
            .await
            .map_err(|_| HubStopped)
    }

    /// Notify the hub that a session's transport is gone; it gets
    /// unsubscribed from every channel.
    pub async fn on_session_closed(&self, session: SessionId) -> Result<(), HubStopped> {
        self.closed_tx.send(session).await.map_err(|_| HubStopped)
    }

    /// Spawn the dispatcher loop. Call once.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            let receivers = hub.receivers.lock().await.take();
            let Some(mut receivers) = receivers else {
                warn!("hub dispatcher started twice; ignoring");
                return;
            };

            loop {
                tokio::select! {
                    maybe = receivers.incoming_rx.recv() => {
                        let Some(incoming) = maybe else { break };
                        let permit = match hub.workers.clone().try_acquire_owned() {
                            Ok(permit) => permit,
                            Err(_) => {
                                debug!("worker pool saturated, waiting for a slot");
                                let Ok(permit) = hub.workers.clone().acquire_owned().await else {
                                    break;
                                };
                                permit
                            }
                        };
                        let worker_hub = Arc::clone(&hub);
                        tokio::spawn(async move {
                            worker_hub.handle_incoming(incoming).await;
                            drop(permit);
                        });
                    }
                    maybe = receivers.closed_rx.recv() => {
                        if let Some(session) = maybe {
                            hub.sweep_session(&session).await;
                        }
                    }
                    _ = receivers.stop_rx.changed() => {
                        info!("stopping the hub dispatcher");
                        break;
                    }
                }
            }
        })
    }

    /// Signal the dispatcher to exit and wait for in-flight workers.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(true);
        info!("waiting for in-flight workers to finish");
        if let Ok(permits) = self.workers.acquire_many(self.num_workers as u32).await {
            drop(permits);
        }
        info!("hub stopped");
    }

    /// Unsubscribe a closed session from every registered channel.
    async fn sweep_session(&self, session: &SessionId) {
        debug!(session = %session, "sweeping closed session");
        for channel in self.ctx.registry().all().await {
            // Most channels never saw this session; that is not an error.
            let _ = channel.unsubscribe(session).await;
        }
    }

    async fn handle_incoming(&self, incoming: IncomingMessage) {
        let IncomingMessage { session, payload } = incoming;

        // The envelope must at least carry a usable `id` so errors can be
        // correlated; without one the error answer goes out id-less.
        let query_id = serde_json::from_slice::<serde_json::Value>(&payload)
            .ok()
            .and_then(|v| v.get("id").and_then(serde_json::Value::as_i64));
        let Some(query_id) = query_id else {
            session
                .send_error(
                    None,
                    &ChannelError::InvalidData("message has no valid `id` field".to_string()),
                )
                .await;
            return;
        };

        if let Err(e) = self
            .ctx
            .validator
            .validate(&payload, SchemaKind::GenericMessage)
        {
            session.send_error(Some(query_id), &e.into()).await;
            return;
        }

        let request: Request = match serde_json::from_slice(&payload) {
            Ok(request) => request,
            Err(e) => {
                session
                    .send_error(
                        Some(query_id),
                        &ChannelError::InvalidData(format!("failed to decode request: {e}")),
                    )
                    .await;
                return;
            }
        };

        debug!(
            session = %session.id(),
            channel = %request.query.channel(),
            "dispatching query"
        );

        if request.query.channel() == ROOT_CHANNEL {
            self.handle_root_channel(session, query_id, request.query)
                .await;
            return;
        }

        match self.handle_channel_query(&session, request.query).await {
            Ok(result) => session.send_result(query_id, result).await,
            Err(e) => session.send_error(Some(query_id), &e).await,
        }
    }

    /// Route a query to its channel and produce the answer payload.
    async fn handle_channel_query(
        &self,
        session: &Arc<dyn ClientSession>,
        query: Query,
    ) -> Result<AnswerResult, ChannelError> {
        let channel_id = query.channel();
        if !channel_id.starts_with(ROOT_PREFIX) {
            return Err(ChannelError::UnknownChannel(channel_id.to_string()));
        }
        let channel = self
            .ctx
            .registry()
            .get(channel_id)
            .await
            .ok_or_else(|| ChannelError::UnknownChannel(channel_id.to_string()))?;

        match query {
            Query::Subscribe { .. } => {
                channel.subscribe(Arc::clone(session)).await;
                Ok(AnswerResult::General(0))
            }
            Query::Unsubscribe { .. } => {
                channel.unsubscribe(&session.id()).await?;
                Ok(AnswerResult::General(0))
            }
            Query::Publish { params, .. } => {
                channel.publish(params.message).await?;
                Ok(AnswerResult::General(0))
            }
            Query::Catchup { .. } => Ok(AnswerResult::Messages(channel.catchup().await)),
            Query::Broadcast { params } => {
                warn!(channel = %params.channel, "peer broadcasts are not handled");
                Ok(AnswerResult::General(0))
            }
        }
    }

    /// The root channel accepts exactly one operation: `lao#create`.
    async fn handle_root_channel(
        &self,
        session: Arc<dyn ClientSession>,
        query_id: i64,
        query: Query,
    ) {
        let message = match query {
            Query::Publish { params, .. } => params.message,
            _ => {
                session
                    .send_error(
                        Some(query_id),
                        &ChannelError::InvalidMethod(
                            "only publish is allowed on /root".to_string(),
                        ),
                    )
                    .await;
                return;
            }
        };

        if let Err(e) = self.create_lao_from_message(message).await {
            session.send_error(Some(query_id), &e).await;
            return;
        }
        session
            .send_result(query_id, AnswerResult::General(0))
            .await;
    }

    /// Validate a root-channel publish and create the LAO it describes.
    async fn create_lao_from_message(
        &self,
        message: ProtocolMessage,
    ) -> Result<(), ChannelError> {
        let raw = message.decoded_data()?;
        self.ctx.validator.validate(&raw, SchemaKind::Data)?;
        message.verify()?;

        let object_action: ObjectAction = serde_json::from_slice(&raw)
            .map_err(|e| ChannelError::InvalidData(format!("failed to decode action: {e}")))?;
        if (object_action.object.as_str(), object_action.action.as_str()) != ("lao", "create") {
            return Err(ChannelError::InvalidMethod(
                "you may only invoke lao#create on /root".to_string(),
            ));
        }

        let data: CreateLao = serde_json::from_slice(&raw)
            .map_err(|e| ChannelError::InvalidData(format!("lao create: {e}")))?;

        let path = format!("{ROOT_PREFIX}{}", data.id);
        let lao = LaoChannel::new(BaseChannel::new(Arc::clone(&self.ctx), path.clone()));
        lao.base().set_witnesses(data.witnesses.clone()).await;
        lao.base().inbox().store(message).await;

        self.ctx.registry().register(&path, Arc::new(lao)).await?;
        info!(lao = %path, name = %data.name, "lao created");
        Ok(())
    }
}
