use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::*;
use crate::error::ProtocolError;
use crate::types::{ActivationState, ControlMode, LogLevel, ResourceKey};

// ── Inbound (controller → overlay) ──

/// A message received from the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    StateUpdate(StateUpdate),
    AssetDelivered(AssetDelivered),
    PhaseSignal(PhaseSignal),
}

/// Authoritative activation state pushed by the controller.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "RawStateUpdate")]
pub struct StateUpdate {
    pub active: Option<bool>,
    pub control_mode: Option<ControlMode>,
    /// Opaque controller context, logged only.
    pub context_id: Option<Value>,
}

/// Wire shape of a state update. Current and legacy field names may both be
/// present; the current name wins.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStateUpdate {
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    control_mode: Option<ControlMode>,
    #[serde(default)]
    dice_state: Option<ControlMode>,
    #[serde(default)]
    context_id: Option<Value>,
    #[serde(default)]
    random_skin_id: Option<Value>,
}

impl From<RawStateUpdate> for StateUpdate {
    fn from(raw: RawStateUpdate) -> Self {
        Self {
            active: raw.active,
            control_mode: raw.control_mode.or(raw.dice_state),
            context_id: raw.context_id.or(raw.random_skin_id),
        }
    }
}

impl StateUpdate {
    /// Activation carried by this update. Missing fields fall back to
    /// inactive / disabled.
    pub fn activation(&self) -> ActivationState {
        ActivationState {
            active: self.active.unwrap_or(false),
            control_mode: self.control_mode.unwrap_or_default(),
        }
    }
}

/// A resource delivered in answer to an `asset-request`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawAssetDelivered")]
pub struct AssetDelivered {
    pub key: String,
    pub handle_ref: Option<String>,
}

/// Wire shape of a delivery. Controllers may echo both `key` and `assetPath`
/// from the request; `key` wins, as does `handleRef` over `url`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAssetDelivered {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    asset_path: Option<String>,
    #[serde(default)]
    handle_ref: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl TryFrom<RawAssetDelivered> for AssetDelivered {
    type Error = String;

    fn try_from(raw: RawAssetDelivered) -> Result<Self, Self::Error> {
        let key = raw
            .key
            .or(raw.asset_path)
            .ok_or_else(|| "missing field `key`".to_string())?;
        Ok(Self {
            key,
            handle_ref: raw.handle_ref.or(raw.url),
        })
    }
}

impl AssetDelivered {
    /// The logical key, if it names a resource the overlay knows.
    pub fn resource_key(&self) -> Option<ResourceKey> {
        ResourceKey::from_wire(&self.key)
    }
}

/// Host phase reported by the controller.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PhaseSignal {
    #[serde(default)]
    pub phase: Option<String>,
}

impl PhaseSignal {
    pub fn phase(&self) -> &str {
        self.phase.as_deref().unwrap_or("")
    }
}

/// Parse one inbound text frame.
///
/// Returns `Ok(None)` for well-formed messages of a kind the overlay does not
/// handle; those are ignored rather than treated as errors.
pub fn parse_inbound(text: &str) -> Result<Option<InboundMessage>, ProtocolError> {
    let value: Value = serde_json::from_str(text)?;
    decode_inbound(value)
}

/// Decode an already-parsed JSON value into an inbound message.
pub fn decode_inbound(value: Value) -> Result<Option<InboundMessage>, ProtocolError> {
    let kind = value
        .as_object()
        .ok_or(ProtocolError::NotAnObject)?
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingKind)?
        .to_string();

    let message = match kind.as_str() {
        KIND_STATE_UPDATE | KIND_STATE_UPDATE_LEGACY => {
            InboundMessage::StateUpdate(payload(&kind, value)?)
        }
        KIND_ASSET_DELIVERED | KIND_ASSET_DELIVERED_LEGACY => {
            InboundMessage::AssetDelivered(payload(&kind, value)?)
        }
        KIND_PHASE_SIGNAL | KIND_PHASE_SIGNAL_LEGACY => {
            InboundMessage::PhaseSignal(payload(&kind, value)?)
        }
        _ => return Ok(None),
    };

    Ok(Some(message))
}

fn payload<T: DeserializeOwned>(kind: &str, value: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidPayload {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

// ── Outbound (overlay → controller) ──

/// A message sent to the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    /// Ask the controller to deliver a resource.
    #[serde(rename = "asset-request")]
    AssetRequest {
        key: ResourceKey,
        #[serde(rename = "assetPath")]
        asset_path: String,
    },

    /// The user clicked the injected control.
    #[serde(rename = "control-click")]
    ControlClick {
        #[serde(rename = "controlMode")]
        control_mode: ControlMode,
    },

    /// Diagnostic record mirrored to the controller's log.
    #[serde(rename = "log")]
    Log {
        level: LogLevel,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
}

impl OutboundMessage {
    pub fn asset_request(key: ResourceKey) -> Self {
        Self::AssetRequest {
            key,
            asset_path: key.asset_path().to_string(),
        }
    }

    pub fn control_click(control_mode: ControlMode) -> Self {
        Self::ControlClick { control_mode }
    }

    pub fn log(level: LogLevel, message: impl Into<String>, data: Option<Value>) -> Self {
        Self::Log {
            level,
            message: message.into(),
            data,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::AssetRequest { .. } => "asset-request",
            Self::ControlClick { .. } => "control-click",
            Self::Log { .. } => "log",
        }
    }
}

/// Serialize an outbound message to its JSON text frame, stamping `source`
/// and a millisecond `timestamp`.
pub fn encode_outbound(message: &OutboundMessage) -> Result<String, ProtocolError> {
    let mut value = serde_json::to_value(message)?;
    if let Value::Object(map) = &mut value {
        map.insert("source".to_string(), Value::from(MESSAGE_SOURCE));
        map.insert(
            "timestamp".to_string(),
            Value::from(chrono::Utc::now().timestamp_millis()),
        );
    }
    Ok(serde_json::to_string(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_state_update() {
        let msg = parse_inbound(
            r#"{"type":"state-update","active":true,"controlMode":"enabled","contextId":42}"#,
        )
        .expect("parse state update");

        match msg {
            Some(InboundMessage::StateUpdate(update)) => {
                let activation = update.activation();
                assert!(activation.active);
                assert_eq!(activation.control_mode, ControlMode::Enabled);
                assert_eq!(update.context_id, Some(Value::from(42)));
            }
            other => panic!("expected state update, got {other:?}"),
        }
    }

    #[test]
    fn state_update_defaults_to_inactive_and_disabled() {
        let msg = parse_inbound(r#"{"type":"state-update","active":null}"#).unwrap();
        let Some(InboundMessage::StateUpdate(update)) = msg else {
            panic!("expected state update");
        };
        assert_eq!(update.activation(), ActivationState::default());
    }

    #[test]
    fn decodes_legacy_plugin_names() {
        let msg = parse_inbound(
            r#"{"type":"random-mode-state","active":true,"diceState":"enabled","randomSkinId":7}"#,
        )
        .unwrap();
        let Some(InboundMessage::StateUpdate(update)) = msg else {
            panic!("expected state update");
        };
        assert_eq!(update.activation().control_mode, ControlMode::Enabled);

        let msg = parse_inbound(
            r#"{"type":"local-asset-url","assetPath":"random_flag.png","url":"http://h/f.png"}"#,
        )
        .unwrap();
        let Some(InboundMessage::AssetDelivered(delivered)) = msg else {
            panic!("expected delivery");
        };
        assert_eq!(delivered.resource_key(), Some(ResourceKey::Flag));
        assert_eq!(delivered.handle_ref.as_deref(), Some("http://h/f.png"));

        let msg = parse_inbound(r#"{"type":"phase-change","phase":"ChampSelect"}"#).unwrap();
        let Some(InboundMessage::PhaseSignal(signal)) = msg else {
            panic!("expected phase signal");
        };
        assert_eq!(signal.phase(), "ChampSelect");
    }

    #[test]
    fn unknown_kind_is_ignored() {
        let msg = parse_inbound(r#"{"type":"historic-mode-state","active":true}"#).unwrap();
        assert!(msg.is_none());
    }

    #[test]
    fn malformed_payloads_are_errors() {
        assert!(matches!(parse_inbound("{not json"), Err(ProtocolError::Json(_))));
        assert!(matches!(parse_inbound("[1,2]"), Err(ProtocolError::NotAnObject)));
        assert!(matches!(parse_inbound(r#"{"active":true}"#), Err(ProtocolError::MissingKind)));
        assert!(matches!(
            parse_inbound(r#"{"type":"state-update","controlMode":"sideways"}"#),
            Err(ProtocolError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn encodes_asset_request_with_stamp() {
        let text = encode_outbound(&OutboundMessage::asset_request(ResourceKey::Flag)).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "asset-request");
        assert_eq!(value["key"], "flag");
        assert_eq!(value["assetPath"], "random_flag.png");
        assert_eq!(value["source"], MESSAGE_SOURCE);
        assert!(value["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn encodes_click_and_log() {
        let click = encode_outbound(&OutboundMessage::control_click(ControlMode::Enabled)).unwrap();
        let value: Value = serde_json::from_str(&click).unwrap();
        assert_eq!(value["type"], "control-click");
        assert_eq!(value["controlMode"], "enabled");

        let log = encode_outbound(&OutboundMessage::log(LogLevel::Warn, "gave up", None)).unwrap();
        let value: Value = serde_json::from_str(&log).unwrap();
        assert_eq!(value["level"], "warn");
        assert!(value.get("data").is_none());
    }
}
