//! Tracing setup, including forwarding of log events to the controller.

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use skinbridge_bridge::BridgeHandle;
use skinbridge_protocol::{LogLevel, OutboundMessage};

use crate::config::LoggingSection;

/// Targets never forwarded: the bridge logging about itself would feed back
/// into the bridge.
const LOCAL_ONLY_TARGETS: &[&str] = &["skinbridge_bridge", "tokio_tungstenite", "tungstenite"];

/// Where forwarded log messages go.
pub trait LogSink: Send + Sync + 'static {
    fn forward(&self, message: OutboundMessage);
}

impl LogSink for BridgeHandle {
    fn forward(&self, message: OutboundMessage) {
        let _ = self.submit(message);
    }
}

impl LogSink for mpsc::UnboundedSender<OutboundMessage> {
    fn forward(&self, message: OutboundMessage) {
        let _ = self.send(message);
    }
}

/// Sends each event at or above `min_level` to the controller as a `log`
/// message. Structured fields travel in `data`.
pub struct ControllerLogLayer<T: LogSink> {
    sink: T,
    min_level: LogLevel,
}

impl<T: LogSink> ControllerLogLayer<T> {
    pub fn new(sink: T, min_level: LogLevel) -> Self {
        Self { sink, min_level }
    }
}

impl<S, T> Layer<S> for ControllerLogLayer<T>
where
    S: Subscriber,
    T: LogSink,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let Some(level) = to_log_level(*metadata.level()) else {
            return;
        };
        if level < self.min_level {
            return;
        }
        let target = metadata.target();
        if LOCAL_ONLY_TARGETS
            .iter()
            .any(|local| target.starts_with(local))
        {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);
        let data = if fields.data.is_empty() {
            None
        } else {
            Some(Value::Object(fields.data))
        };
        self.sink
            .forward(OutboundMessage::log(level, fields.message, data));
    }
}

fn to_log_level(level: Level) -> Option<LogLevel> {
    match level {
        Level::ERROR => Some(LogLevel::Error),
        Level::WARN => Some(LogLevel::Warn),
        Level::INFO => Some(LogLevel::Info),
        Level::DEBUG => Some(LogLevel::Debug),
        _ => None,
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    data: Map<String, Value>,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: Value) {
        self.data.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.insert(field, Value::from(value));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.insert(field, Value::from(format!("{value:?}")));
        }
    }
}

/// Install the global subscriber: `RUST_LOG` (or `logging.level`) filter,
/// fmt output, and controller forwarding when a sink is given.
pub fn init_tracing<T: LogSink>(logging: &LoggingSection, sink: Option<T>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let forward = sink
        .filter(|_| logging.forward)
        .map(|sink| ControllerLogLayer::new(sink, logging.forward_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(forward)
        .init();
}
