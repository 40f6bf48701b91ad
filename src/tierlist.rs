use serde::Serialize;

use crate::{catalog::Catalog, stats::ChampionTierStat};

const TIERS: [&str; 5] = ["S", "A", "B", "C", "D"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierListEntry {
    pub name: String,
    pub id: u32,
    pub winrate: f64,
    pub tier: &'static str,
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TierList {
    #[serde(rename = "ALL")]
    pub all: Vec<TierListEntry>,
    #[serde(rename = "TOP")]
    pub top: Vec<TierListEntry>,
    #[serde(rename = "JUNGLE")]
    pub jungle: Vec<TierListEntry>,
    #[serde(rename = "MID")]
    pub mid: Vec<TierListEntry>,
    #[serde(rename = "ADC")]
    pub adc: Vec<TierListEntry>,
    #[serde(rename = "SUP")]
    pub sup: Vec<TierListEntry>,
}

fn win_ratio(stat: &ChampionTierStat) -> f64 {
    if stat.games > 0.0 {
        stat.wins / stat.games
    } else {
        0.0
    }
}

/// Win rate as a percentage with two decimals.
pub fn percent_win_rate(stat: &ChampionTierStat) -> f64 {
    (win_ratio(stat) * 10_000.0).round() / 100.0
}

fn tier_letter(rank: u32) -> Option<&'static str> {
    rank.checked_sub(1)
        .and_then(|index| TIERS.get(index as usize))
        .copied()
}

fn rank_group(stats: &[ChampionTierStat], role: Option<&str>, catalog: &Catalog) -> Vec<TierListEntry> {
    let mut group: Vec<&ChampionTierStat> = stats
        .iter()
        .filter(|stat| role.map_or(true, |role| stat.role == role))
        .collect();
    group.sort_by(|a, b| win_ratio(b).total_cmp(&win_ratio(a)));

    group
        .into_iter()
        .filter_map(|stat| {
            let tier = stat
                .tier_list_tier
                .as_ref()
                .and_then(|tier| tier_letter(tier.tier_rank))?;
            Some(TierListEntry {
                name: catalog.champion_name(stat.champion_id).to_owned(),
                id: stat.champion_id,
                winrate: percent_win_rate(stat),
                tier,
                role: stat.role.clone(),
            })
        })
        .collect()
}

pub fn build_tier_list(stats: &[ChampionTierStat], catalog: &Catalog) -> TierList {
    let group = |role| rank_group(stats, role, catalog);
    TierList {
        all: group(None),
        top: group(Some("TOP")),
        jungle: group(Some("JUNGLE")),
        mid: group(Some("MID")),
        adc: group(Some("ADC")),
        sup: group(Some("SUPPORT")),
    }
}
