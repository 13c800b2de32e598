use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::identity::PlayerId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Game started
    Start,
    /// An upgrade was bought
    Upgrade,
    /// Periodic poll while playing
    Update,
    /// Game ended
    End,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Start => "start",
            EventType::Upgrade => "upgrade",
            EventType::Update => "update",
            EventType::End => "end",
        }
    }
}

/// Game defined save state. Only its shape (a JSON object) is checked.
pub type SaveData = Map<String, Value>;

/// One item of a batch, as sent by the game client.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct EventRecord {
    pub event: EventType,
    pub playtime: i64,
    pub timestamp: i64,
    pub game_version: i64,
    pub scene: String,
    #[schema(value_type = Object)]
    pub save: SaveData,
}

/// An [`EventRecord`] tagged with the player it was submitted for. This is what sinks store.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct StampedEventRecord {
    #[serde(flatten)]
    pub record: EventRecord,
    pub player_id: String,
}

impl StampedEventRecord {
    pub fn stamp(record: EventRecord, player: &PlayerId) -> Self {
        Self {
            record,
            player_id: player.to_string(),
        }
    }
}
