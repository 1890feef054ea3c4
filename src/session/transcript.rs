use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    pub fn classify(tag: Option<&str>) -> Self {
        match tag {
            Some("user") => Speaker::User,
            _ => Speaker::Assistant,
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::User => write!(f, "user"),
            Speaker::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptMessage {
    pub id: u64,
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransportMessage {
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

pub type MessageHandler = Box<dyn Fn(&TransportMessage) + Send + Sync>;
pub type SignalHandler = Box<dyn Fn() + Send + Sync>;

pub trait TranscriptTransport: Send + Sync {
    fn on_message(&self, handler: MessageHandler);
    fn on_listen_start(&self, handler: SignalHandler);
    fn on_listen_stop(&self, handler: SignalHandler);
    fn unsubscribe_all(&self);
}

#[derive(Default)]
struct TranscriptLog {
    messages: Vec<TranscriptMessage>,
    next_id: u64,
    listening: bool,
}

fn lock(log: &Mutex<TranscriptLog>) -> MutexGuard<'_, TranscriptLog> {
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone)]
pub struct TranscriptReader {
    log: Arc<Mutex<TranscriptLog>>,
}

impl TranscriptReader {
    pub fn messages(&self) -> Vec<TranscriptMessage> {
        lock(&self.log).messages.clone()
    }

    pub fn tail(&self, count: usize) -> Vec<TranscriptMessage> {
        let log = lock(&self.log);
        let start = log.messages.len().saturating_sub(count);
        log.messages[start..].to_vec()
    }

    pub fn is_listening(&self) -> bool {
        lock(&self.log).listening
    }
}

pub struct TranscriptCollector {
    transport: Arc<dyn TranscriptTransport>,
    reader: TranscriptReader,
    growth: Arc<watch::Sender<u64>>,
}

impl TranscriptCollector {
    pub fn attach(transport: Arc<dyn TranscriptTransport>) -> Self {
        let log = Arc::new(Mutex::new(TranscriptLog::default()));
        let (growth, _) = watch::channel(0u64);
        let growth = Arc::new(growth);

        {
            let log = log.clone();
            let growth = growth.clone();
            transport.on_message(Box::new(move |message: &TransportMessage| {
                let Some(text) = message.text.as_deref().filter(|t| !t.trim().is_empty()) else {
                    return;
                };
                let speaker = Speaker::classify(message.speaker.as_deref());
                {
                    let mut log = lock(&log);
                    let id = log.next_id;
                    log.next_id += 1;
                    log.messages.push(TranscriptMessage {
                        id,
                        speaker,
                        text: text.to_string(),
                        timestamp: Utc::now(),
                    });
                }
                growth.send_modify(|count| *count += 1);
            }));
        }
        {
            let log = log.clone();
            transport.on_listen_start(Box::new(move || lock(&log).listening = true));
        }
        {
            let log = log.clone();
            transport.on_listen_stop(Box::new(move || lock(&log).listening = false));
        }

        Self {
            transport,
            reader: TranscriptReader { log },
            growth,
        }
    }

    pub fn reader(&self) -> TranscriptReader {
        self.reader.clone()
    }

    pub fn messages(&self) -> Vec<TranscriptMessage> {
        self.reader.messages()
    }

    pub fn is_listening(&self) -> bool {
        self.reader.is_listening()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.growth.subscribe()
    }

    pub fn clear(&self) {
        lock(&self.reader.log).messages.clear();
    }

    pub fn detach(&self) {
        debug!("Detaching transcript collector");
        self.transport.unsubscribe_all();
    }
}

impl Drop for TranscriptCollector {
    fn drop(&mut self) {
        self.transport.unsubscribe_all();
    }
}
