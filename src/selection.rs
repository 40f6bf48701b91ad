use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    catalog::{Catalog, ItemView, RuneView},
    error::{CompanionError, SelectionError},
    stats::{
        BuildCandidate, BuildStats, CompletedItemStat, Queue, Role, RuneStat, StartingItemStat,
        StatsProvider,
    },
};

/// Number of perk slots reported per build.
pub const PERK_SLOTS: usize = 8;
/// `[primaryStyle, secondaryStyle, primaryRune] + perks`.
pub const RUNE_SEQUENCE_LEN: usize = PERK_SLOTS + 3;

const PRIMARY_STYLE_SLOT: usize = 0;
const SECONDARY_STYLE_SLOT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingMode {
    Popularity,
    WinRate,
}

/// Anything carrying aggregate game/win counts.
pub trait Ranked {
    fn games(&self) -> f64;
    fn wins(&self) -> f64;

    fn win_rate(&self) -> f64 {
        if self.games() > 0.0 {
            self.wins() / self.games()
        } else {
            0.0
        }
    }
}

macro_rules! impl_ranked {
    ($($ty:ty),*) => {
        $(impl Ranked for $ty {
            fn games(&self) -> f64 {
                self.games
            }

            fn wins(&self) -> f64 {
                self.wins
            }
        })*
    };
}

impl_ranked!(BuildCandidate, RuneStat, StartingItemStat, CompletedItemStat);

impl RankingMode {
    /// Descending order by the active key.
    fn compare<T: Ranked>(self, a: &T, b: &T) -> Ordering {
        match self {
            Self::Popularity => b.games().total_cmp(&a.games()),
            Self::WinRate => b.win_rate().total_cmp(&a.win_rate()),
        }
    }

    /// Stable-sorts the candidates and returns the first one, so ties keep
    /// provider order.
    pub fn top<'a, T: Ranked + 'a>(self, candidates: impl IntoIterator<Item = &'a T>) -> Option<&'a T> {
        let mut ranked: Vec<&T> = candidates.into_iter().collect();
        ranked.sort_by(|a, b| self.compare(*a, *b));
        ranked.first().copied()
    }
}

/// Id-level result of one ranking mode, before catalog lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantIds {
    pub runes: Vec<u32>,
    pub items: Vec<u32>,
    pub starting_items: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildVariant {
    pub runes: Vec<RuneView>,
    pub items: Vec<ItemView>,
    pub starting_items: Vec<ItemView>,
}

impl BuildVariant {
    fn from_ids(ids: &VariantIds, catalog: &Catalog) -> Self {
        Self {
            runes: ids.runes.iter().map(|id| catalog.rune(*id)).collect(),
            items: ids.items.iter().map(|id| catalog.item(*id)).collect(),
            starting_items: ids
                .starting_items
                .iter()
                .map(|id| catalog.item(*id))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChampionBuildRecommendation {
    pub champion_id: u32,
    pub champion_name: String,
    pub role: Option<Role>,
    pub queue: Queue,
    pub variant_by_popularity: BuildVariant,
    pub variant_by_win_rate: BuildVariant,
    pub computed_at: DateTime<Utc>,
}

/// Fetches the statistics snapshot once and derives both ranking variants.
pub async fn select_build(
    provider: &dyn StatsProvider,
    catalog: &Catalog,
    champion_id: u32,
    role: Option<Role>,
    queue: Queue,
) -> Result<ChampionBuildRecommendation, CompanionError> {
    let stats = provider.build_stats(champion_id, role, queue).await?;
    Ok(build_recommendation(
        &stats,
        catalog,
        champion_id,
        role,
        queue,
    )?)
}

pub fn build_recommendation(
    stats: &BuildStats,
    catalog: &Catalog,
    champion_id: u32,
    role: Option<Role>,
    queue: Queue,
) -> Result<ChampionBuildRecommendation, SelectionError> {
    let by_popularity = select_variant(stats, RankingMode::Popularity)?;
    let by_win_rate = select_variant(stats, RankingMode::WinRate)?;
    Ok(ChampionBuildRecommendation {
        champion_id,
        champion_name: catalog.champion_name(champion_id).to_owned(),
        role,
        queue,
        variant_by_popularity: BuildVariant::from_ids(&by_popularity, catalog),
        variant_by_win_rate: BuildVariant::from_ids(&by_win_rate, catalog),
        computed_at: Utc::now(),
    })
}

pub fn select_variant(stats: &BuildStats, mode: RankingMode) -> Result<VariantIds, SelectionError> {
    let build = mode.top(&stats.builds).ok_or(SelectionError::NoBuilds)?;
    Ok(VariantIds {
        runes: select_runes(build, mode)?,
        items: select_completed_items(build, mode)?,
        starting_items: select_starting_items(build, mode)?,
    })
}

fn select_runes(build: &BuildCandidate, mode: RankingMode) -> Result<Vec<u32>, SelectionError> {
    let mut perks = Vec::with_capacity(PERK_SLOTS);
    let mut primary_style = 0;
    let mut secondary_style = 0;
    for slot in 0..PERK_SLOTS {
        let top = mode
            .top(build.runes.iter().filter(|rune| rune.index == slot))
            .ok_or(SelectionError::EmptyRuneSlot(slot))?;
        match slot {
            PRIMARY_STYLE_SLOT => primary_style = top.tree_id,
            SECONDARY_STYLE_SLOT => secondary_style = top.tree_id,
            _ => {}
        }
        perks.push(top.rune_id);
    }

    let mut runes = Vec::with_capacity(RUNE_SEQUENCE_LEN);
    runes.extend([
        primary_style,
        secondary_style,
        build.primary_rune.unwrap_or_default(),
    ]);
    runes.extend(perks);
    Ok(runes)
}

fn select_starting_items(
    build: &BuildCandidate,
    mode: RankingMode,
) -> Result<Vec<u32>, SelectionError> {
    mode.top(&build.starting_items)
        .map(|group| group.starting_item_ids.clone())
        .ok_or(SelectionError::NoStartingItems)
}

fn select_completed_items(
    build: &BuildCandidate,
    mode: RankingMode,
) -> Result<Vec<u32>, SelectionError> {
    let max_index = build
        .completed_items
        .iter()
        .map(|item| item.index)
        .max()
        .ok_or(SelectionError::NoCompletedItems)?;
    let slots = max_index + 1;

    let Some(mythic_id) = build.mythic_id.filter(|id| *id != 0) else {
        return (0..slots)
            .map(|index| {
                mode.top(build.completed_items.iter().filter(|item| item.index == index))
                    .map(|item| item.item_id)
                    .ok_or(SelectionError::EmptyItemSlot(index))
            })
            .collect();
    };

    // The mythic is placed separately, so each slot takes its best other
    // item. At most one slot may hold nothing but the mythic.
    let mut picks = Vec::with_capacity(slots);
    let mut mythic_only_slot = None;
    for index in 0..slots {
        let mut candidates = build
            .completed_items
            .iter()
            .filter(|item| item.index == index)
            .peekable();
        if candidates.peek().is_none() {
            return Err(SelectionError::EmptyItemSlot(index));
        }
        match mode.top(candidates.filter(|item| item.item_id != mythic_id)) {
            Some(item) => picks.push(item.item_id),
            None if mythic_only_slot.is_none() => mythic_only_slot = Some(index),
            None => return Err(SelectionError::EmptyItemSlot(index)),
        }
    }

    Ok(splice_mythic(&picks, mythic_id, build.mythic_average_index, slots))
}

/// Builds a fresh sequence of `len` items with the mythic at its announced
/// average index, rounded and clamped into range. The mythic appears exactly
/// once. The other picks keep their order around it and the overflow is
/// dropped, so the result has `len` entries whenever `picks` holds at least
/// `len - 1` non-mythic items.
pub fn splice_mythic(
    picks: &[u32],
    mythic_id: u32,
    average_index: Option<f64>,
    len: usize,
) -> Vec<u32> {
    if len == 0 {
        return Vec::new();
    }
    let position = average_index
        .filter(|index| index.is_finite())
        .map(|index| index.round().max(0.0) as usize)
        .unwrap_or(0)
        .min(len - 1);

    let mut others = picks.iter().copied().filter(|id| *id != mythic_id);
    let mut spliced = Vec::with_capacity(len);
    for slot in 0..len {
        if slot == position {
            spliced.push(mythic_id);
        } else if let Some(id) = others.next() {
            spliced.push(id);
        }
    }
    spliced
}
