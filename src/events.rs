use std::sync::Arc;

use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::selection::ChampionBuildRecommendation;

pub const USER_INFO: u8 = 0;
pub const CHAMPION_CHANGE: u8 = 1;
pub const QUIT_CHAMP_SELECT: u8 = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub username: String,
    pub icon_id: String,
}

impl UserInfo {
    pub fn new(username: impl Into<String>, icon_id: Option<u64>) -> Self {
        Self {
            username: username.into(),
            icon_id: icon_id.map(|id| id.to_string()).unwrap_or_default(),
        }
    }
}

/// Domain events pushed to every connected UI client.
#[derive(Debug, Clone)]
pub enum UiEvent {
    UserInfo(UserInfo),
    ChampionChange(Arc<ChampionBuildRecommendation>),
    QuitChampSelect,
}

impl UiEvent {
    pub fn kind(&self) -> u8 {
        match self {
            Self::UserInfo(_) => USER_INFO,
            Self::ChampionChange(_) => CHAMPION_CHANGE,
            Self::QuitChampSelect => QUIT_CHAMP_SELECT,
        }
    }

    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// The UI discriminates on a numeric `type` field, so the variants are written
// out flat instead of through serde's tagged enum support.
impl Serialize for UiEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::UserInfo(info) => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("type", &USER_INFO)?;
                map.serialize_entry("username", &info.username)?;
                map.serialize_entry("iconId", &info.icon_id)?;
                map.end()
            }
            Self::ChampionChange(rec) => {
                let role = rec.role.map(|role| role.as_str()).unwrap_or_default();
                let mut map = serializer.serialize_map(Some(10))?;
                map.serialize_entry("type", &CHAMPION_CHANGE)?;
                map.serialize_entry("id", &rec.champion_id.to_string())?;
                map.serialize_entry("name", &rec.champion_name)?;
                map.serialize_entry("role", role)?;
                map.serialize_entry("runesByPopularity", &rec.variant_by_popularity.runes)?;
                map.serialize_entry("runesByWinRate", &rec.variant_by_win_rate.runes)?;
                map.serialize_entry("itemsByPopularity", &rec.variant_by_popularity.items)?;
                map.serialize_entry("itemsByWinRate", &rec.variant_by_win_rate.items)?;
                map.serialize_entry(
                    "startingItemsByPopularity",
                    &rec.variant_by_popularity.starting_items,
                )?;
                map.serialize_entry(
                    "startingItemsByWinRate",
                    &rec.variant_by_win_rate.starting_items,
                )?;
                map.end()
            }
            Self::QuitChampSelect => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("type", &QUIT_CHAMP_SELECT)?;
                map.end()
            }
        }
    }
}
