//! Event-driven generation engine.
//!
//! Consumes host events and produces option sets:
//! 1. A rendered character message triggers a generation after a short
//!    settle delay.
//! 2. A user message or a swipe tells the host to discard displayed
//!    option sets; pending network calls are left to finish and their
//!    results still target the original message id.
//!
//! At most one generation is in flight per message id: a later trigger for
//! the same id cancels the pending one before it emits anything.

pub mod generate;

use crate::config::CyoaConfig;
use crate::error::CyoaError;
use crate::types::{ChatSnapshot, EngineOutput, HostEvent};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delay between a rendered character message and the start of generation,
/// giving the host time to settle.
const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Sink for engine outputs, implemented by the transport layer.
#[async_trait]
pub trait OptionsSink: Send + Sync {
    async fn emit(&self, output: EngineOutput) -> Result<()>;
}

struct Pending {
    seq: u64,
    token: CancellationToken,
}

/// The generation engine. One instance serves one host session.
pub struct Engine {
    config: Arc<CyoaConfig>,
    sink: Arc<dyn OptionsSink>,
    in_flight: Arc<Mutex<HashMap<u64, Pending>>>,
    next_seq: u64,
}

impl Engine {
    pub fn new(config: CyoaConfig, sink: Arc<dyn OptionsSink>) -> Self {
        Self {
            config: Arc::new(config),
            sink,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_seq: 0,
        }
    }

    /// Run until the event channel closes or `cancel` fires.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<HostEvent>,
        cancel: CancellationToken,
    ) -> Result<()> {
        info!("Engine started");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await?,
                    None => break,
                },
                _ = cancel.cancelled() => break,
            }
        }

        info!("Engine stopped");
        Ok(())
    }

    async fn handle_event(&mut self, event: HostEvent) -> Result<()> {
        match event {
            HostEvent::CharacterMessageRendered {
                message_id,
                snapshot,
            } => {
                self.trigger_generation(message_id, snapshot).await;
                Ok(())
            }
            HostEvent::UserMessageRendered | HostEvent::MessageSwiped => {
                self.sink.emit(EngineOutput::ClearOptions).await
            }
        }
    }

    async fn trigger_generation(&mut self, message_id: u64, snapshot: ChatSnapshot) {
        if !self.config.enabled {
            return;
        }

        if !self.config.api_configured() {
            let err = CyoaError::Config("API endpoint or key not configured".into());
            warn!("Skipping generation for message {}: {}", message_id, err);
            return;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let token = CancellationToken::new();

        {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(previous) = in_flight.insert(
                message_id,
                Pending {
                    seq,
                    token: token.clone(),
                },
            ) {
                previous.token.cancel();
            }
        }

        let config = self.config.clone();
        let sink = self.sink.clone();
        let in_flight = self.in_flight.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Generation for message {} superseded", message_id);
                }
                _ = run_generation(config, sink, message_id, snapshot) => {}
            }

            // Drop our own bookkeeping entry unless a newer trigger
            // already replaced it.
            let mut in_flight = in_flight.lock().await;
            if in_flight.get(&message_id).map(|p| p.seq) == Some(seq) {
                in_flight.remove(&message_id);
            }
        });
    }
}

async fn run_generation(
    config: Arc<CyoaConfig>,
    sink: Arc<dyn OptionsSink>,
    message_id: u64,
    snapshot: ChatSnapshot,
) {
    tokio::time::sleep(SETTLE_DELAY).await;

    let output = match generate::generate_options(&config, message_id, &snapshot).await {
        Ok(set) => EngineOutput::Options {
            message_id: set.message_id,
            options: set.options,
            generated_at: set.generated_at,
        },
        Err(e) => {
            error!("Option generation for message {} failed: {}", message_id, e);
            EngineOutput::GenerationFailed {
                message_id,
                error: e.to_string(),
            }
        }
    };

    if let Err(e) = sink.emit(output).await {
        error!("Failed to emit engine output: {e}");
    }
}
