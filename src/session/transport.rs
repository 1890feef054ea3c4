use super::transcript::{MessageHandler, SignalHandler, TranscriptTransport, TransportMessage};
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum TransportEvent {
    TranscriptionStarted,
    TranscriptionStopped,
    TranscriptionMessage {
        #[serde(default)]
        detail: TransportMessage,
    },
    #[serde(other)]
    Other,
}

#[derive(Default)]
struct Handlers {
    message: Vec<MessageHandler>,
    start: Vec<SignalHandler>,
    stop: Vec<SignalHandler>,
}

// Handlers must not call back into the transport.
#[derive(Default)]
pub struct LocalTransport {
    handlers: Mutex<Handlers>,
}

impl LocalTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn handlers(&self) -> MutexGuard<'_, Handlers> {
        self.handlers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn emit(&self, event: &TransportEvent) {
        let handlers = self.handlers();
        match event {
            TransportEvent::TranscriptionStarted => handlers.start.iter().for_each(|h| h()),
            TransportEvent::TranscriptionStopped => handlers.stop.iter().for_each(|h| h()),
            TransportEvent::TranscriptionMessage { detail } => {
                handlers.message.iter().for_each(|h| h(detail))
            }
            TransportEvent::Other => debug!("Ignoring unrelated transport event"),
        }
    }

    pub fn emit_json(&self, raw: &str) -> Result<(), serde_json::Error> {
        let event: TransportEvent = serde_json::from_str(raw)?;
        self.emit(&event);
        Ok(())
    }

    pub fn emit_message(&self, speaker: Option<&str>, text: &str) {
        self.emit(&TransportEvent::TranscriptionMessage {
            detail: TransportMessage {
                speaker: speaker.map(str::to_string),
                text: Some(text.to_string()),
            },
        });
    }

    pub fn emit_listen_started(&self) {
        self.emit(&TransportEvent::TranscriptionStarted);
    }

    pub fn emit_listen_stopped(&self) {
        self.emit(&TransportEvent::TranscriptionStopped);
    }

    pub fn handler_count(&self) -> usize {
        let handlers = self.handlers();
        handlers.message.len() + handlers.start.len() + handlers.stop.len()
    }
}

impl TranscriptTransport for LocalTransport {
    fn on_message(&self, handler: MessageHandler) {
        self.handlers().message.push(handler);
    }

    fn on_listen_start(&self, handler: SignalHandler) {
        self.handlers().start.push(handler);
    }

    fn on_listen_stop(&self, handler: SignalHandler) {
        self.handlers().stop.push(handler);
    }

    fn unsubscribe_all(&self) {
        *self.handlers() = Handlers::default();
    }
}
