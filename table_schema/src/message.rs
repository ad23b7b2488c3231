use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::{ProtoError, StateValue};

pub const UPDATE_GAMESTATE: &str = "UPDATE_GAMESTATE";
pub const UPDATE_TOURNAMENT_STATE: &str = "UPDATE_TOURNAMENT_STATE";
pub const UPDATE_CHAT: &str = "UPDATE_CHAT";
pub const NOTIFICATION: &str = "NOTIFICATION";
pub const TICK: &str = "TICK";

/// Field that, when it is the only payload field, carries the whole state.
const GAMESTATE_FIELD: &str = "gamestate";
const PARTIAL_FIELD: &str = "partial";

/// A message delivered by the transport, or a frame-driver TICK.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    UpdateGamestate(StateUpdate),
    UpdateTournamentState(StateUpdate),
    UpdateChat(StateValue),
    Notification(StateValue),
    Tick(TickEvent),
    Unrecognized { kind: String },
}

/// Versioned state payload carried by the update messages.
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub version: Option<i64>,
    pub payload: StateValue,
    /// Merge into the current state instead of replacing it.
    pub partial: bool,
}

impl StateUpdate {
    pub fn full(version: Option<i64>, payload: StateValue) -> Self {
        Self {
            version,
            payload,
            partial: false,
        }
    }

    pub fn partial(version: Option<i64>, payload: StateValue) -> Self {
        Self {
            version,
            payload,
            partial: true,
        }
    }
}

/// Clock input from the frame scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickEvent {
    pub warped_time: f64,
    pub former_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl TickEvent {
    pub fn new(warped_time: f64, former_time: f64) -> Self {
        Self {
            warped_time,
            former_time,
            speed: None,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }
}

impl InboundMessage {
    pub fn gamestate(version: i64, payload: StateValue) -> Self {
        InboundMessage::UpdateGamestate(StateUpdate::full(Some(version), payload))
    }

    pub fn tick(warped_time: f64, former_time: f64) -> Self {
        InboundMessage::Tick(TickEvent::new(warped_time, former_time))
    }

    pub fn kind(&self) -> &str {
        match self {
            InboundMessage::UpdateGamestate(_) => UPDATE_GAMESTATE,
            InboundMessage::UpdateTournamentState(_) => UPDATE_TOURNAMENT_STATE,
            InboundMessage::UpdateChat(_) => UPDATE_CHAT,
            InboundMessage::Notification(_) => NOTIFICATION,
            InboundMessage::Tick(_) => TICK,
            InboundMessage::Unrecognized { kind } => kind.as_str(),
        }
    }

    pub fn version(&self) -> Option<i64> {
        match self {
            InboundMessage::UpdateGamestate(update)
            | InboundMessage::UpdateTournamentState(update) => update.version,
            _ => None,
        }
    }

    /// Decodes the wire form `{type, version?, ...payload}`.
    pub fn from_wire(value: &JsonValue) -> Result<Self, ProtoError> {
        let object = value.as_object().ok_or(ProtoError::NotAnObject)?;
        let kind = object
            .get("type")
            .and_then(JsonValue::as_str)
            .ok_or(ProtoError::MissingType)?;

        let message = match kind {
            UPDATE_GAMESTATE => InboundMessage::UpdateGamestate(decode_update(object, true)?),
            UPDATE_TOURNAMENT_STATE => {
                InboundMessage::UpdateTournamentState(decode_update(object, false)?)
            }
            UPDATE_CHAT => InboundMessage::UpdateChat(payload_fields(object, false)),
            NOTIFICATION => InboundMessage::Notification(payload_fields(object, false)),
            TICK => InboundMessage::Tick(TickEvent {
                warped_time: required_f64(object, "warped_time")?,
                former_time: required_f64(object, "former_time")?,
                speed: optional_f64(object, "speed")?,
            }),
            other => InboundMessage::Unrecognized {
                kind: other.to_string(),
            },
        };
        Ok(message)
    }

    pub fn to_wire(&self) -> JsonValue {
        let mut object = JsonMap::new();
        object.insert("type".into(), JsonValue::String(self.kind().to_string()));
        match self {
            InboundMessage::UpdateGamestate(update)
            | InboundMessage::UpdateTournamentState(update) => {
                if let Some(version) = update.version {
                    object.insert("version".into(), JsonValue::from(version));
                }
                if update.partial {
                    object.insert(PARTIAL_FIELD.into(), JsonValue::Bool(true));
                }
                extend_payload(&mut object, &update.payload);
            }
            InboundMessage::UpdateChat(payload) | InboundMessage::Notification(payload) => {
                extend_payload(&mut object, payload);
            }
            InboundMessage::Tick(tick) => {
                object.insert("warped_time".into(), JsonValue::from(tick.warped_time));
                object.insert("former_time".into(), JsonValue::from(tick.former_time));
                if let Some(speed) = tick.speed {
                    object.insert("speed".into(), JsonValue::from(speed));
                }
            }
            InboundMessage::Unrecognized { .. } => {}
        }
        JsonValue::Object(object)
    }
}

fn decode_update(
    object: &JsonMap<String, JsonValue>,
    unwrap_gamestate: bool,
) -> Result<StateUpdate, ProtoError> {
    let version = match object.get("version") {
        None | Some(JsonValue::Null) => None,
        Some(value) => Some(value.as_i64().ok_or_else(|| ProtoError::InvalidField {
            field: "version",
            reason: format!("expected an integer, found {value}"),
        })?),
    };
    let partial = match object.get(PARTIAL_FIELD) {
        None | Some(JsonValue::Null) => false,
        Some(JsonValue::Bool(flag)) => *flag,
        Some(value) => {
            return Err(ProtoError::InvalidField {
                field: PARTIAL_FIELD,
                reason: format!("expected a boolean, found {value}"),
            })
        }
    };
    Ok(StateUpdate {
        version,
        payload: payload_fields(object, unwrap_gamestate),
        partial,
    })
}

/// Every field except the envelope ones, as a state map.
fn payload_fields(object: &JsonMap<String, JsonValue>, unwrap_gamestate: bool) -> StateValue {
    let fields: BTreeMap<String, StateValue> = object
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "type" | "version" | PARTIAL_FIELD))
        .map(|(key, value)| (key.clone(), StateValue::from_json(value)))
        .collect();
    if unwrap_gamestate && fields.len() == 1 {
        if let Some(state) = fields.get(GAMESTATE_FIELD) {
            return state.clone();
        }
    }
    StateValue::Map(fields)
}

fn extend_payload(object: &mut JsonMap<String, JsonValue>, payload: &StateValue) {
    match payload.to_json() {
        JsonValue::Object(fields) => object.extend(fields),
        other => {
            object.insert(GAMESTATE_FIELD.into(), other);
        }
    }
}

fn required_f64(object: &JsonMap<String, JsonValue>, field: &'static str) -> Result<f64, ProtoError> {
    optional_f64(object, field)?.ok_or(ProtoError::MissingField(field))
}

fn optional_f64(
    object: &JsonMap<String, JsonValue>,
    field: &'static str,
) -> Result<Option<f64>, ProtoError> {
    match object.get(field) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| ProtoError::InvalidField {
                field,
                reason: format!("expected a number, found {value}"),
            }),
    }
}

impl Serialize for InboundMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for InboundMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        InboundMessage::from_wire(&value).map_err(serde::de::Error::custom)
    }
}

pub fn decode_message_json(data: &str) -> Result<InboundMessage, ProtoError> {
    let value: JsonValue = serde_json::from_str(data)?;
    InboundMessage::from_wire(&value)
}

pub fn encode_message_json(message: &InboundMessage) -> serde_json::Result<String> {
    serde_json::to_string(&message.to_wire())
}
