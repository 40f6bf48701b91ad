use std::{fmt, str::FromStr};

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{CompanionError, SelectionError};

const CHAMPION_BUILDS_QUERY: &str = "query ChampionBuilds($championId:Int!, $queue:Queue!, $role:Role, $opponentChampionId:Int, $key:ChampionBuildKey) {\
championBuildStats(championId:$championId, queue:$queue, role:$role, opponentChampionId:$opponentChampionId, key:$key) {\
championId opponentChampionId queue role builds { \
completedItems {games index averageIndex itemId wins} \
games mythicId mythicAverageIndex primaryRune \
runes {games index runeId wins treeId} \
skillOrders {games skillOrder wins} \
startingItems {games startingItemIds wins} \
summonerSpells {games summonerSpellIds wins} \
wins}}}";

const PRIMARY_ROLE_QUERY: &str =
    "query ChampionMainRole($championId:ID){primaryRole(championId:$championId)}";

const TIER_LIST_QUERY: &str = "query TierList($region:Region,$queue:Queue,$tier:Tier){\
allChampionStats(region:$region,queue:$queue,tier:$tier,mostPopular:true)\
{championId role patch wins games tierListTier{tierRank previousTierRank status}}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Top,
    Jungle,
    Mid,
    Adc,
    Support,
}

impl Role {
    /// Maps a champ-select `assignedPosition` onto a role. Empty or unknown
    /// positions mean no role was assigned.
    pub fn from_position(position: &str) -> Option<Self> {
        match position.trim().to_ascii_lowercase().as_str() {
            "top" => Some(Self::Top),
            "jungle" => Some(Self::Jungle),
            "middle" | "mid" => Some(Self::Mid),
            "bottom" | "adc" => Some(Self::Adc),
            "utility" | "support" => Some(Self::Support),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Top => "TOP",
            Self::Jungle => "JUNGLE",
            Self::Mid => "MID",
            Self::Adc => "ADC",
            Self::Support => "SUPPORT",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Top => "Top",
            Self::Jungle => "Jungle",
            Self::Mid => "Mid",
            Self::Adc => "Adc",
            Self::Support => "Support",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CompanionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TOP" => Ok(Self::Top),
            "JUNGLE" => Ok(Self::Jungle),
            "MID" | "MIDDLE" => Ok(Self::Mid),
            "ADC" | "BOTTOM" => Ok(Self::Adc),
            "SUPPORT" | "SUP" | "UTILITY" => Ok(Self::Support),
            other => Err(CompanionError::Payload(format!("unknown role {other:?}"))),
        }
    }
}

/// Statistics pool a build is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Queue {
    #[serde(rename = "RANKED_SOLO_5X5")]
    RankedSolo,
    #[serde(rename = "HOWLING_ABYSS_ARAM")]
    HowlingAbyssAram,
}

impl Queue {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RankedSolo => "RANKED_SOLO_5X5",
            Self::HowlingAbyssAram => "HOWLING_ABYSS_ARAM",
        }
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStats {
    #[serde(default)]
    pub builds: Vec<BuildCandidate>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildCandidate {
    #[serde(default)]
    pub games: f64,
    #[serde(default)]
    pub wins: f64,
    #[serde(default)]
    pub mythic_id: Option<u32>,
    #[serde(default)]
    pub mythic_average_index: Option<f64>,
    #[serde(default)]
    pub primary_rune: Option<u32>,
    #[serde(default)]
    pub runes: Vec<RuneStat>,
    #[serde(default)]
    pub starting_items: Vec<StartingItemStat>,
    #[serde(default)]
    pub completed_items: Vec<CompletedItemStat>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuneStat {
    #[serde(default)]
    pub games: f64,
    #[serde(default)]
    pub wins: f64,
    pub index: usize,
    pub rune_id: u32,
    #[serde(default)]
    pub tree_id: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartingItemStat {
    #[serde(default)]
    pub games: f64,
    #[serde(default)]
    pub wins: f64,
    #[serde(default)]
    pub starting_item_ids: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedItemStat {
    #[serde(default)]
    pub games: f64,
    #[serde(default)]
    pub wins: f64,
    pub index: usize,
    pub item_id: u32,
    #[serde(default)]
    pub average_index: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChampionTierStat {
    pub champion_id: u32,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub wins: f64,
    #[serde(default)]
    pub games: f64,
    #[serde(default)]
    pub tier_list_tier: Option<TierListTier>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierListTier {
    pub tier_rank: u32,
}

/// Aggregate statistics source consumed by the build selection engine and
/// by role inference.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    async fn build_stats(
        &self,
        champion_id: u32,
        role: Option<Role>,
        queue: Queue,
    ) -> Result<BuildStats, CompanionError>;

    async fn primary_role(&self, champion_id: u32) -> Result<Role, CompanionError>;

    async fn tier_list_stats(&self) -> Result<Vec<ChampionTierStat>, CompanionError>;
}

#[derive(Debug, Clone)]
pub struct StatsClient {
    http: reqwest::Client,
    endpoint: String,
}

impl StatsClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    fn query_url(&self, query: &str, variables: &Value) -> Result<Url, CompanionError> {
        Url::parse_with_params(
            &self.endpoint,
            &[("query", query.to_owned()), ("variables", variables.to_string())],
        )
        .map_err(|err| CompanionError::Payload(format!("invalid stats endpoint: {err}")))
    }

    async fn fetch(&self, url: Url) -> Result<Value, CompanionError> {
        debug!(url = %url, "querying aggregate statistics");
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl StatsProvider for StatsClient {
    async fn build_stats(
        &self,
        champion_id: u32,
        role: Option<Role>,
        queue: Queue,
    ) -> Result<BuildStats, CompanionError> {
        let variables = build_variables(champion_id, role, queue);
        let root = self
            .fetch(self.query_url(CHAMPION_BUILDS_QUERY, &variables)?)
            .await?;
        parse_build_stats_payload(&root)
    }

    async fn primary_role(&self, champion_id: u32) -> Result<Role, CompanionError> {
        let variables = json!({ "championId": champion_id });
        let root = self
            .fetch(self.query_url(PRIMARY_ROLE_QUERY, &variables)?)
            .await?;
        parse_primary_role_payload(&root)
    }

    async fn tier_list_stats(&self) -> Result<Vec<ChampionTierStat>, CompanionError> {
        let variables = json!({"queue": "SUMMONERS_RIFT_DRAFT_PICK", "region": "WORLD"});
        let root = self
            .fetch(self.query_url(TIER_LIST_QUERY, &variables)?)
            .await?;
        parse_tier_list_payload(&root)
    }
}

fn build_variables(champion_id: u32, role: Option<Role>, queue: Queue) -> Value {
    // The ARAM pool is role-less; sending a role there yields no builds.
    match (queue, role) {
        (Queue::RankedSolo, Some(role)) => json!({
            "championId": champion_id,
            "role": role.as_str(),
            "queue": queue.as_str(),
            "opponentChampionId": null,
            "key": "PUBLIC",
        }),
        _ => json!({
            "championId": champion_id,
            "queue": queue.as_str(),
            "opponentChampionId": null,
            "key": "PUBLIC",
        }),
    }
}

fn graphql_data(root: &Value) -> Result<&Value, CompanionError> {
    match root.get("data") {
        Some(data) if !data.is_null() => Ok(data),
        _ => {
            let message = root
                .pointer("/errors/0/message")
                .and_then(Value::as_str)
                .unwrap_or("response carried no data");
            Err(CompanionError::Payload(message.to_owned()))
        }
    }
}

pub fn parse_build_stats_payload(root: &Value) -> Result<BuildStats, CompanionError> {
    let stats = match graphql_data(root)?.get("championBuildStats") {
        Some(stats) if !stats.is_null() => stats,
        _ => return Err(SelectionError::NoBuilds.into()),
    };
    let parsed = serde_json::from_value::<BuildStats>(stats.clone())?;
    if parsed.builds.is_empty() {
        return Err(SelectionError::NoBuilds.into());
    }
    Ok(parsed)
}

pub fn parse_primary_role_payload(root: &Value) -> Result<Role, CompanionError> {
    let role = graphql_data(root)?
        .get("primaryRole")
        .and_then(Value::as_str)
        .ok_or_else(|| CompanionError::Payload("primaryRole missing".to_owned()))?;
    role.parse()
}

pub fn parse_tier_list_payload(root: &Value) -> Result<Vec<ChampionTierStat>, CompanionError> {
    let stats = graphql_data(root)?
        .get("allChampionStats")
        .cloned()
        .unwrap_or(Value::Array(Vec::new()));
    Ok(serde_json::from_value(stats)?)
}
