use std::collections::HashMap;

use anyhow::{Context, Result};
use scraper::Html;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::info;

const GAME_DATA_PLUGIN: &str = "/plugins/rcp-be-lol-game-data/global/default/v1";
const ITEM_ICON_PREFIX: &str = "/lol-game-data/assets/ASSETS/";
const ITEM_ICON_REPLACEMENT: &str = "/plugins/rcp-be-lol-game-data/global/default/assets/";
const RUNE_ICON_PREFIX: &str = "/lol-game-data/assets/v1/";
const RUNE_ICON_REPLACEMENT: &str = "/plugins/rcp-be-lol-game-data/global/default/v1/";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuneInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuneView {
    pub id: u32,
    pub asset: String,
    pub info: RuneInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemView {
    pub id: u32,
    pub asset: String,
    pub name: String,
}

/// Read-only champion, rune and item reference data, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    champions: HashMap<u32, String>,
    runes: HashMap<u32, RuneView>,
    items: HashMap<u32, ItemView>,
}

impl Catalog {
    pub fn from_parts(
        champions: HashMap<u32, String>,
        runes: HashMap<u32, RuneView>,
        items: HashMap<u32, ItemView>,
    ) -> Self {
        Self {
            champions,
            runes,
            items,
        }
    }

    pub async fn load(http: &reqwest::Client, cdragon_base: &str) -> Result<Self> {
        let base = cdragon_base.trim_end_matches('/');
        let champions = parse_champion_summary(
            fetch_document(http, &format!("{base}{GAME_DATA_PLUGIN}/champion-summary.json"))
                .await?,
        );
        let items = parse_items(
            fetch_document(http, &format!("{base}{GAME_DATA_PLUGIN}/items.json")).await?,
            base,
        );
        let mut runes = parse_perk_styles(
            fetch_document(http, &format!("{base}{GAME_DATA_PLUGIN}/perkstyles.json")).await?,
            base,
        );
        runes.extend(parse_perks(
            fetch_document(http, &format!("{base}{GAME_DATA_PLUGIN}/perks.json")).await?,
            base,
        ));

        info!(
            champions = champions.len(),
            runes = runes.len(),
            items = items.len(),
            "loaded static catalogs"
        );
        Ok(Self::from_parts(champions, runes, items))
    }

    pub fn champion_name(&self, champion_id: u32) -> &str {
        self.champions
            .get(&champion_id)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Unknown ids keep their id with empty display fields.
    pub fn rune(&self, rune_id: u32) -> RuneView {
        self.runes.get(&rune_id).cloned().unwrap_or(RuneView {
            id: rune_id,
            ..Default::default()
        })
    }

    pub fn item(&self, item_id: u32) -> ItemView {
        self.items.get(&item_id).cloned().unwrap_or(ItemView {
            id: item_id,
            ..Default::default()
        })
    }
}

async fn fetch_document<T: DeserializeOwned>(http: &reqwest::Client, url: &str) -> Result<T> {
    let response = http
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed requesting {url}"))?
        .error_for_status()
        .with_context(|| format!("bad status from {url}"))?;
    response
        .json::<T>()
        .await
        .with_context(|| format!("invalid json from {url}"))
}

#[derive(Debug, Deserialize)]
pub struct ChampionSummaryEntry {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemEntry {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerkStyleEntry {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon_path: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PerkStyles {
    #[serde(default)]
    pub styles: Vec<PerkStyleEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerkEntry {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon_path: String,
    #[serde(default)]
    pub short_desc: String,
}

// Catalog ids are non-negative; anything else is a placeholder row.
fn catalog_id(raw: i64) -> Option<u32> {
    u32::try_from(raw).ok()
}

pub fn parse_champion_summary(entries: Vec<ChampionSummaryEntry>) -> HashMap<u32, String> {
    entries
        .into_iter()
        .filter_map(|champion| {
            // The summary leads with a placeholder entry of id -1.
            let id = catalog_id(champion.id).filter(|id| *id > 0)?;
            Some((id, champion.name))
        })
        .collect()
}

pub fn parse_items(entries: Vec<ItemEntry>, cdragon_base: &str) -> HashMap<u32, ItemView> {
    entries
        .into_iter()
        .filter_map(|item| {
            let id = catalog_id(item.id)?;
            let asset = rewrite_icon_path(
                cdragon_base,
                &item.icon_path,
                ITEM_ICON_PREFIX,
                ITEM_ICON_REPLACEMENT,
            );
            Some((
                id,
                ItemView {
                    id,
                    asset,
                    name: item.name,
                },
            ))
        })
        .collect()
}

pub fn parse_perk_styles(root: PerkStyles, cdragon_base: &str) -> HashMap<u32, RuneView> {
    root.styles
        .into_iter()
        .filter_map(|style| {
            let id = catalog_id(style.id)?;
            Some((
                id,
                RuneView {
                    id,
                    asset: rune_asset(cdragon_base, &style.icon_path),
                    info: RuneInfo {
                        name: style.name,
                        description: String::new(),
                    },
                },
            ))
        })
        .collect()
}

pub fn parse_perks(entries: Vec<PerkEntry>, cdragon_base: &str) -> HashMap<u32, RuneView> {
    entries
        .into_iter()
        .filter_map(|perk| {
            let id = catalog_id(perk.id)?;
            Some((
                id,
                RuneView {
                    id,
                    asset: rune_asset(cdragon_base, &perk.icon_path),
                    info: RuneInfo {
                        name: perk.name,
                        description: sanitize_description(&perk.short_desc),
                    },
                },
            ))
        })
        .collect()
}

fn rune_asset(cdragon_base: &str, icon_path: &str) -> String {
    rewrite_icon_path(
        cdragon_base,
        icon_path,
        RUNE_ICON_PREFIX,
        RUNE_ICON_REPLACEMENT,
    )
}

/// Rewrites a client-relative icon path into an absolute CDN url. Only the
/// first occurrence of `from` is replaced and the path is lower-cased, the
/// way the CDN stores it.
pub fn rewrite_icon_path(cdragon_base: &str, icon_path: &str, from: &str, to: &str) -> String {
    let rewritten = icon_path.replacen(from, to, 1).to_lowercase();
    format!("{}{}", cdragon_base.trim_end_matches('/'), rewritten)
}

/// Reduces a rune description to its plain text. Markup is dropped and
/// character references are decoded by the HTML parser.
pub fn sanitize_description(raw: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    let text: String = fragment.root_element().text().collect();
    text.trim().to_owned()
}

#[cfg(test)]
mod tests {
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};

    use super::{
        parse_champion_summary, parse_items, parse_perk_styles, parse_perks, rewrite_icon_path,
        sanitize_description, Catalog,
    };

    const BASE: &str = "https://raw.communitydragon.org/latest";

    fn decode<T: DeserializeOwned>(value: Value) -> T {
        serde_json::from_value(value).expect("catalog document should decode")
    }

    #[test]
    fn champion_summary_skips_placeholder() {
        let root = json!([
            {"id": -1, "name": "None"},
            {"id": 126, "name": "Jayce"},
            {"id": 157, "name": "Yasuo"}
        ]);
        let champions = parse_champion_summary(decode(root));
        assert_eq!(champions.len(), 2);
        assert_eq!(champions.get(&157).map(String::as_str), Some("Yasuo"));
    }

    #[test]
    fn rewrites_item_icon_paths() {
        let root = json!([{
            "id": 3071,
            "name": "Black Cleaver",
            "iconPath": "/lol-game-data/assets/ASSETS/Items/Icons2D/3071_Fighter_T3_BlackCleaver.png"
        }]);
        let items = parse_items(decode(root), BASE);
        assert_eq!(
            items[&3071].asset,
            "https://raw.communitydragon.org/latest/plugins/rcp-be-lol-game-data/global/default/assets/items/icons2d/3071_fighter_t3_blackcleaver.png"
        );
        assert_eq!(items[&3071].name, "Black Cleaver");
    }

    #[test]
    fn rune_styles_and_perks_share_one_map() {
        let styles = json!({"styles": [
            {"id": 8000, "name": "Precision", "iconPath": "/lol-game-data/assets/v1/perk-images/Styles/7201_Precision.png"}
        ]});
        let perks = json!([
            {"id": 8010, "name": "Conqueror", "shortDesc": "Gain <lol-uikit-tooltipped-keyword key='x'>Adaptive Force</lol-uikit-tooltipped-keyword> &amp; heal.",
             "iconPath": "/lol-game-data/assets/v1/perk-images/Styles/Precision/Conqueror/Conqueror.png"}
        ]);
        let mut runes = parse_perk_styles(decode(styles), BASE);
        runes.extend(parse_perks(decode(perks), BASE));

        assert_eq!(runes[&8000].info.name, "Precision");
        assert!(runes[&8000].info.description.is_empty());
        assert!(runes[&8000]
            .asset
            .ends_with("/plugins/rcp-be-lol-game-data/global/default/v1/perk-images/styles/7201_precision.png"));
        assert_eq!(runes[&8010].info.description, "Gain Adaptive Force & heal.");
    }

    #[test]
    fn sanitizes_markup_and_entities() {
        assert_eq!(
            sanitize_description("<b>Bold</b> &lt;3 &#39;quoted&#39; &#x41;<br>"),
            "Bold <3 'quoted' A"
        );
        assert_eq!(sanitize_description("&unknown; stays"), "&unknown; stays");
    }

    #[test]
    fn decodes_named_typography_entities() {
        assert_eq!(
            sanitize_description("Deal 10% bonus damage &ndash; stacks&hellip; <b>Jayce&rsquo;s</b>"),
            "Deal 10% bonus damage \u{2013} stacks\u{2026} Jayce\u{2019}s"
        );
    }

    #[test]
    fn skips_negative_ids_and_tolerates_missing_fields() {
        let items = parse_items(decode(json!([{"id": -5, "name": "x"}, {"id": 1001}])), BASE);
        assert_eq!(items.len(), 1);
        assert!(items[&1001].name.is_empty());
        let styles = parse_perk_styles(decode(json!({})), BASE);
        assert!(styles.is_empty());
    }

    #[test]
    fn rewrite_replaces_only_first_prefix() {
        let path = rewrite_icon_path(BASE, "/a/x/a/", "/a/", "/b/");
        assert_eq!(path, format!("{BASE}/b/x/a/"));
    }

    #[test]
    fn unknown_ids_keep_their_id() {
        let catalog = Catalog::default();
        assert_eq!(catalog.rune(8005).id, 8005);
        assert!(catalog.rune(8005).asset.is_empty());
        assert_eq!(catalog.item(1055).id, 1055);
        assert_eq!(catalog.champion_name(1), "");
    }
}
