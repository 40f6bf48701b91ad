use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::CompanionError;

pub const CHAMP_SELECT_SESSION: &str = "OnJsonApiEvent_lol-champ-select_v1_session";
pub const CHAMP_SELECT_LEGACY_SESSION: &str = "OnJsonApiEvent_lol-champ-select-legacy_v1_session";
pub const CURRENT_SUMMONER: &str = "OnJsonApiEvent_lol-summoner_v1_current-summoner";
pub const CURRENT_SUMMONER_URI: &str = "/lol-summoner/v1/current-summoner";

/// Event names the session monitor subscribes to.
pub const SUBSCRIPTIONS: [&str; 2] = [CHAMP_SELECT_SESSION, CURRENT_SUMMONER];

const SUBSCRIBE_OPCODE: u8 = 5;
const DELETE_EVENT: &str = "Delete";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    #[serde(default)]
    pub summoner_id: u64,
    #[serde(default)]
    pub assigned_position: String,
    #[serde(default)]
    pub champion_id: u32,
    #[serde(default)]
    pub champion_pick_intent: u32,
}

impl TeamMember {
    /// The locked champion, or the hovered one while nothing is locked.
    pub fn resolved_champion(&self) -> u32 {
        if self.champion_id != 0 {
            self.champion_id
        } else {
            self.champion_pick_intent
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChampSelectSession {
    #[serde(default)]
    pub my_team: Vec<TeamMember>,
}

impl ChampSelectSession {
    pub fn member(&self, summoner_id: u64) -> Option<&TeamMember> {
        self.my_team
            .iter()
            .find(|member| member.summoner_id == summoner_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummonerProfile {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub profile_icon_id: u64,
    #[serde(default)]
    pub summoner_id: u64,
}

/// Client push events the companion acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    ChampSelectUpdate(ChampSelectSession),
    ChampSelectDeleted,
    SummonerUpdated(SummonerProfile),
    SummonerDeleted,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventEnvelope {
    #[serde(default)]
    event_type: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    data: Value,
}

/// Builds the `[5, eventName]` subscription request.
pub fn subscribe_frame(event_name: &str) -> String {
    json!([SUBSCRIBE_OPCODE, event_name]).to_string()
}

/// Decodes one `[opcode, eventName, payload]` frame. Blank keep-alive frames
/// and events the companion does not track decode to `None`.
pub fn decode_client_frame(text: &str) -> Result<Option<ClientEvent>, CompanionError> {
    if text.trim().is_empty() {
        return Ok(None);
    }

    let (_opcode, name, payload) = serde_json::from_str::<(u8, String, Value)>(text)?;
    match name.as_str() {
        CHAMP_SELECT_SESSION | CHAMP_SELECT_LEGACY_SESSION => {
            let envelope = serde_json::from_value::<EventEnvelope>(payload)?;
            if envelope.event_type == DELETE_EVENT {
                return Ok(Some(ClientEvent::ChampSelectDeleted));
            }
            let session = serde_json::from_value::<ChampSelectSession>(envelope.data)?;
            Ok(Some(ClientEvent::ChampSelectUpdate(session)))
        }
        CURRENT_SUMMONER => {
            let envelope = serde_json::from_value::<EventEnvelope>(payload)?;
            if envelope.uri != CURRENT_SUMMONER_URI {
                return Ok(None);
            }
            if envelope.event_type == DELETE_EVENT {
                return Ok(Some(ClientEvent::SummonerDeleted));
            }
            let profile = serde_json::from_value::<SummonerProfile>(envelope.data)?;
            Ok(Some(ClientEvent::SummonerUpdated(profile)))
        }
        _ => Ok(None),
    }
}
