//! Gateway HTTP server: health probe and LINE webhook on a single port.

use crate::channels::{verify_signature, InboundEvent, LineChannel, ReplySender, WebhookBody};
use crate::config::Settings;
use crate::router::{Dispatch, EventRouter};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use futures_util::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

const SIGNATURE_HEADER: &str = "x-line-signature";

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub settings: Arc<Settings>,
    /// Sender for verified webhook batches. Processor task receives.
    pub inbound_tx: mpsc::Sender<Vec<InboundEvent>>,
}

/// Handle one event end to end. Failures are logged; nothing crosses the event boundary.
async fn process_inbound_event(router: &EventRouter, sender: &dyn ReplySender, event: InboundEvent) {
    let source_id = event.source_id.clone();
    match router.handle(event, sender).await {
        Ok(Dispatch::Replied) => log::debug!("inbound: replied to {}", source_id),
        Ok(Dispatch::Suppressed) => {}
        Err(e) => log::warn!("inbound: reply to {} failed: {}", source_id, e),
    }
}

/// Events in one batch run concurrently and independently; one slow chain does not hold back the others' replies.
async fn process_batch(
    router: Arc<EventRouter>,
    sender: Arc<dyn ReplySender>,
    events: Vec<InboundEvent>,
) {
    let count = events.len();
    join_all(
        events
            .into_iter()
            .map(|event| process_inbound_event(&router, sender.as_ref(), event)),
    )
    .await;
    log::debug!("inbound: batch of {} event(s) done", count);
}

/// Start a task per received batch. Returns once the channel is closed and every batch in flight has finished.
async fn run_processor(
    router: Arc<EventRouter>,
    sender: Arc<dyn ReplySender>,
    mut inbound_rx: mpsc::Receiver<Vec<InboundEvent>>,
) {
    let mut batches = JoinSet::new();
    loop {
        tokio::select! {
            received = inbound_rx.recv() => match received {
                Some(events) => {
                    batches.spawn(process_batch(router.clone(), sender.clone(), events));
                }
                None => break,
            },
            Some(done) = batches.join_next(), if !batches.is_empty() => {
                if let Err(e) = done {
                    log::warn!("inbound: batch task failed: {}", e);
                }
            }
        }
    }
    if !batches.is_empty() {
        log::info!("inbound: waiting for {} batch(es) in flight", batches.len());
    }
    while let Some(done) = batches.join_next().await {
        if let Err(e) = done {
            log::warn!("inbound: batch task failed: {}", e);
        }
    }
}

/// Build the axum app for the given state.
pub fn app(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/webhook", post(line_webhook))
        .with_state(state)
}

/// Run the gateway server; binds to settings.bind:settings.port.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(settings: Settings) -> Result<()> {
    let settings = Arc::new(settings);
    let router = Arc::new(EventRouter::from_settings(&settings));
    let sender: Arc<dyn ReplySender> = Arc::new(LineChannel::new(
        settings.line_access_token.clone(),
        Some(settings.line_api_base.clone()),
    ));
    let (inbound_tx, inbound_rx) = mpsc::channel::<Vec<InboundEvent>>(64);
    let processor = tokio::spawn(run_processor(router, sender, inbound_rx));

    let state = GatewayState {
        settings: settings.clone(),
        inbound_tx,
    };

    let bind_addr = format!("{}:{}", settings.bind, settings.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    // The app owns the last inbound sender, so the processor drains once serving stops.
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    processor.await.context("inbound processor")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// POST /webhook: verifies x-line-signature, queues the batch, answers at once.
async fn line_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !verify_signature(&state.settings.line_channel_secret, &body, signature) {
        log::warn!("webhook: signature mismatch, rejecting {} byte body", body.len());
        return StatusCode::UNAUTHORIZED;
    }
    let payload: WebhookBody = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            log::warn!("webhook: malformed body: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };
    let events = payload.into_inbound_events();
    if events.is_empty() {
        return StatusCode::OK;
    }
    log::info!("webhook: received {} event(s)", events.len());
    if state.inbound_tx.send(events).await.is_err() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.settings.port,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{LineError, ReplyToken, SourceKind};
    use crate::llm::{GenerationError, TextGenerator};
    use crate::photos::{FetchError, PhotoCatalog, PhotoRecord};
    use crate::quotes::QuoteBank;
    use crate::reply::{OutboundReply, ReplyComposer};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Search for "慢" blocks until released; every search returns one photo named after its term.
    struct GatedCatalog {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl PhotoCatalog for GatedCatalog {
        async fn search(&self, term: Option<&str>) -> Result<Vec<PhotoRecord>, FetchError> {
            if term == Some("慢") {
                self.release.notified().await;
            }
            Ok(vec![PhotoRecord::new(format!("/Photos/{}.jpg", term.unwrap_or("all")))])
        }
    }

    struct NoGenerator;

    #[async_trait]
    impl TextGenerator for NoGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::Api("unused".to_string()))
        }
    }

    /// Rejects the token "broken"; records every other token in send order.
    #[derive(Default)]
    struct FlakySender {
        attempts: Mutex<usize>,
        sent: Mutex<Vec<String>>,
    }

    impl FlakySender {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReplySender for FlakySender {
        async fn send_reply(
            &self,
            token: ReplyToken,
            _reply: &OutboundReply,
        ) -> Result<(), LineError> {
            *self.attempts.lock().unwrap() += 1;
            if token.as_str() == "broken" {
                return Err(LineError::Api("400 Invalid reply token".to_string()));
            }
            self.sent.lock().unwrap().push(token.as_str().to_string());
            Ok(())
        }
    }

    fn router(release: Arc<Notify>) -> Arc<EventRouter> {
        Arc::new(EventRouter::new(
            Arc::new(GatedCatalog { release }),
            Arc::new(NoGenerator),
            ReplyComposer::new("https://cdn.example"),
            Arc::new(QuoteBank::fallback()),
        ))
    }

    fn event(text: &str, token: &str) -> InboundEvent {
        let mut event = InboundEvent::text(SourceKind::Individual, "U1", text);
        event.reply_token = ReplyToken::new(token);
        event
    }

    fn batch() -> Vec<InboundEvent> {
        vec![
            event("院長，慢", "slow"),
            event("院長好", "broken"),
            event("院長好", "fast"),
        ]
    }

    async fn wait_for_sent(sender: &FlakySender, count: usize) {
        for _ in 0..200 {
            if sender.sent().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn batch_events_run_independently() {
        let release = Arc::new(Notify::new());
        let sender = Arc::new(FlakySender::default());
        let task = tokio::spawn(process_batch(router(release.clone()), sender.clone(), batch()));

        wait_for_sent(&sender, 1).await;
        assert_eq!(sender.sent(), vec!["fast"]);
        assert!(!task.is_finished());

        release.notify_one();
        task.await.unwrap();
        assert_eq!(sender.sent(), vec!["fast", "slow"]);
        assert_eq!(*sender.attempts.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn processor_finishes_batches_in_flight_after_channel_closes() {
        let release = Arc::new(Notify::new());
        let sender = Arc::new(FlakySender::default());
        let (tx, rx) = mpsc::channel(4);
        let processor = tokio::spawn(run_processor(router(release.clone()), sender.clone(), rx));

        tx.send(batch()).await.unwrap();
        drop(tx);
        wait_for_sent(&sender, 1).await;
        assert!(!processor.is_finished());

        release.notify_one();
        processor.await.unwrap();
        assert_eq!(sender.sent(), vec!["fast", "slow"]);
    }
}
