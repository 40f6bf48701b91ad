use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    catalog::Catalog,
    client_api::{LocalClient, RunePage},
    error::CompanionError,
    selection::RUNE_SEQUENCE_LEN,
    stats::Role,
};

const SUMMONERS_RIFT_MAP: u32 = 11;
const HOWLING_ABYSS_MAP: u32 = 12;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid import request: {0}")]
    Invalid(String),

    #[error("local client is not connected")]
    NotConnected,

    #[error(transparent)]
    Client(#[from] CompanionError),
}

/// Write side of the local client API used by build import.
#[async_trait]
pub trait BuildWriter: Send + Sync {
    async fn rune_pages(&self) -> Result<Vec<RunePage>, CompanionError>;
    async fn delete_rune_page(&self, page_id: u64) -> Result<(), CompanionError>;
    async fn create_rune_page(&self, page: &Value) -> Result<(), CompanionError>;
    async fn create_item_set(&self, summoner_id: u64, item_set: &Value) -> Result<(), CompanionError>;
}

#[async_trait]
impl BuildWriter for LocalClient {
    async fn rune_pages(&self) -> Result<Vec<RunePage>, CompanionError> {
        LocalClient::rune_pages(self).await
    }

    async fn delete_rune_page(&self, page_id: u64) -> Result<(), CompanionError> {
        LocalClient::delete_rune_page(self, page_id).await
    }

    async fn create_rune_page(&self, page: &Value) -> Result<(), CompanionError> {
        LocalClient::create_rune_page(self, page).await
    }

    async fn create_item_set(&self, summoner_id: u64, item_set: &Value) -> Result<(), CompanionError> {
        LocalClient::create_item_set(self, summoner_id, item_set).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuneImportRequest {
    #[serde(deserialize_with = "champion_id_from_text_or_number")]
    pub champion_id: u32,
    #[serde(default)]
    pub role: String,
    pub runes: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemImportRequest {
    #[serde(deserialize_with = "champion_id_from_text_or_number")]
    pub champion_id: u32,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub items: Vec<u32>,
    #[serde(default)]
    pub starting_items: Vec<u32>,
}

// The UI posts champion ids as strings, the same form it receives them in.
fn champion_id_from_text_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u32),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Empty means the role-less ARAM pool.
pub fn parse_role(raw: &str) -> Result<Option<Role>, ImportError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    raw.parse::<Role>()
        .map(Some)
        .map_err(|err| ImportError::Invalid(err.to_string()))
}

pub fn import_title(prefix: &str, champion_name: &str, role: Option<Role>) -> String {
    let role = role.map(Role::title).unwrap_or("Aram");
    [prefix, champion_name, role]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Body accepted by `POST /lol-perks/v1/pages`.
pub fn rune_page_payload(title: &str, runes: &[u32]) -> Result<Value, ImportError> {
    if runes.len() != RUNE_SEQUENCE_LEN {
        return Err(ImportError::Invalid(format!(
            "expected {RUNE_SEQUENCE_LEN} rune ids, got {}",
            runes.len()
        )));
    }
    Ok(json!({
        "name": title,
        "primaryStyleId": runes[0],
        "subStyleId": runes[1],
        "selectedPerkIds": &runes[2..],
        "current": true,
    }))
}

fn item_block(kind: &str, items: &[u32]) -> Value {
    let items: Vec<Value> = items
        .iter()
        .map(|id| json!({"id": id.to_string(), "count": 1}))
        .collect();
    json!({"type": kind, "items": items})
}

/// Body accepted by `POST /lol-item-sets/v1/item-sets/{summonerId}/sets`.
pub fn item_set_payload(
    title: &str,
    champion_id: u32,
    role: Option<Role>,
    starting_items: &[u32],
    items: &[u32],
) -> Value {
    let maps = match role {
        Some(_) => vec![SUMMONERS_RIFT_MAP],
        None => vec![SUMMONERS_RIFT_MAP, HOWLING_ABYSS_MAP],
    };
    json!({
        "title": title,
        "associatedChampions": [champion_id],
        "associatedMaps": maps,
        "blocks": [
            item_block("Starting Items", starting_items),
            item_block("Full Items", items),
        ],
    })
}

/// Replaces the first deletable rune page with the requested one.
pub async fn import_runes(
    writer: &dyn BuildWriter,
    catalog: &Catalog,
    title_prefix: &str,
    request: &RuneImportRequest,
) -> Result<(), ImportError> {
    let role = parse_role(&request.role)?;
    let title = import_title(title_prefix, catalog.champion_name(request.champion_id), role);
    let page = rune_page_payload(&title, &request.runes)?;

    let pages = writer.rune_pages().await?;
    if let Some(replaced) = pages.iter().find(|page| page.is_deletable) {
        debug!(page_id = replaced.id, name = %replaced.name, "replacing rune page");
        writer.delete_rune_page(replaced.id).await?;
    }
    writer.create_rune_page(&page).await?;
    info!(champion_id = request.champion_id, %title, "imported rune page");
    Ok(())
}

pub async fn import_items(
    writer: &dyn BuildWriter,
    summoner_id: Option<u64>,
    catalog: &Catalog,
    title_prefix: &str,
    request: &ItemImportRequest,
) -> Result<(), ImportError> {
    let summoner_id = summoner_id.ok_or(ImportError::NotConnected)?;
    let role = parse_role(&request.role)?;
    let title = import_title(title_prefix, catalog.champion_name(request.champion_id), role);
    let item_set = item_set_payload(
        &title,
        request.champion_id,
        role,
        &request.starting_items,
        &request.items,
    );
    writer.create_item_set(summoner_id, &item_set).await?;
    info!(champion_id = request.champion_id, %title, "imported item set");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    use super::{
        import_items, import_runes, import_title, item_set_payload, rune_page_payload,
        BuildWriter, ImportError, ItemImportRequest, RuneImportRequest,
    };
    use crate::{
        catalog::Catalog, client_api::RunePage, error::CompanionError, stats::Role,
    };

    #[derive(Default)]
    struct RecordingWriter {
        pages: Vec<RunePage>,
        calls: Mutex<Vec<String>>,
        bodies: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl BuildWriter for RecordingWriter {
        async fn rune_pages(&self) -> Result<Vec<RunePage>, CompanionError> {
            self.calls.lock().push("list".to_owned());
            Ok(self.pages.clone())
        }

        async fn delete_rune_page(&self, page_id: u64) -> Result<(), CompanionError> {
            self.calls.lock().push(format!("delete {page_id}"));
            Ok(())
        }

        async fn create_rune_page(&self, page: &Value) -> Result<(), CompanionError> {
            self.calls.lock().push("create page".to_owned());
            self.bodies.lock().push(page.clone());
            Ok(())
        }

        async fn create_item_set(&self, summoner_id: u64, item_set: &Value) -> Result<(), CompanionError> {
            self.calls.lock().push(format!("create set {summoner_id}"));
            self.bodies.lock().push(item_set.clone());
            Ok(())
        }
    }

    fn catalog() -> Catalog {
        Catalog::from_parts(
            HashMap::from([(126, "Jayce".to_owned())]),
            HashMap::new(),
            HashMap::new(),
        )
    }

    const RUNES: [u32; 11] = [8000, 8200, 8010, 8010, 9111, 9104, 8299, 8444, 8453, 5008, 5008];

    #[test]
    fn titles_capitalise_role_or_fall_back_to_aram() {
        assert_eq!(import_title("[GTools]", "Jayce", Some(Role::Mid)), "[GTools] Jayce Mid");
        assert_eq!(import_title("[GTools]", "Jayce", Some(Role::Adc)), "[GTools] Jayce Adc");
        assert_eq!(import_title("[GTools]", "Jayce", None), "[GTools] Jayce Aram");
        assert_eq!(import_title("", "Jayce", None), "Jayce Aram");
    }

    #[test]
    fn rune_page_drops_style_ids_from_perks() {
        let page = rune_page_payload("t", &RUNES).expect("payload");
        assert_eq!(page["primaryStyleId"], 8000);
        assert_eq!(page["subStyleId"], 8200);
        assert_eq!(page["selectedPerkIds"].as_array().map(Vec::len), Some(9));
        assert_eq!(page["selectedPerkIds"][0], 8010);
        assert_eq!(page["current"], true);

        assert!(matches!(
            rune_page_payload("t", &RUNES[..5]),
            Err(ImportError::Invalid(_))
        ));
    }

    #[test]
    fn item_set_has_two_blocks_and_map_scope() {
        let set = item_set_payload("t", 126, Some(Role::Mid), &[1055, 2003], &[3071]);
        assert_eq!(set["associatedChampions"], json!([126]));
        assert_eq!(set["associatedMaps"], json!([11]));
        assert_eq!(set["blocks"][0]["type"], "Starting Items");
        assert_eq!(set["blocks"][0]["items"][1], json!({"id": "2003", "count": 1}));
        assert_eq!(set["blocks"][1]["type"], "Full Items");
        assert_eq!(set["blocks"][1]["items"][0]["id"], "3071");

        let aram = item_set_payload("t", 126, None, &[], &[]);
        assert_eq!(aram["associatedMaps"], json!([11, 12]));
    }

    #[test]
    fn requests_accept_string_or_numeric_champion_ids() {
        let request: RuneImportRequest =
            serde_json::from_value(json!({"champion_id": "126", "role": "MID", "runes": RUNES}))
                .expect("string id");
        assert_eq!(request.champion_id, 126);

        let request: ItemImportRequest =
            serde_json::from_value(json!({"champion_id": 126, "items": [3071]})).expect("numeric id");
        assert_eq!(request.champion_id, 126);
        assert!(request.role.is_empty());
        assert!(request.starting_items.is_empty());

        assert!(serde_json::from_value::<RuneImportRequest>(
            json!({"champion_id": "abc", "runes": []})
        )
        .is_err());
    }

    #[tokio::test]
    async fn rune_import_replaces_first_deletable_page() {
        let writer = RecordingWriter {
            pages: vec![
                RunePage { id: 1, name: "Default".to_owned(), is_deletable: false },
                RunePage { id: 7, name: "Mine".to_owned(), is_deletable: true },
                RunePage { id: 9, name: "Other".to_owned(), is_deletable: true },
            ],
            ..Default::default()
        };
        let request = RuneImportRequest {
            champion_id: 126,
            role: "MID".to_owned(),
            runes: RUNES.to_vec(),
        };
        import_runes(&writer, &catalog(), "[GTools]", &request)
            .await
            .expect("import should succeed");

        assert_eq!(*writer.calls.lock(), vec!["list", "delete 7", "create page"]);
        assert_eq!(writer.bodies.lock()[0]["name"], "[GTools] Jayce Mid");
    }

    #[tokio::test]
    async fn rune_import_validates_before_touching_client() {
        let writer = RecordingWriter::default();
        let request = RuneImportRequest {
            champion_id: 126,
            role: "NOPE".to_owned(),
            runes: RUNES.to_vec(),
        };
        let err = import_runes(&writer, &catalog(), "[GTools]", &request)
            .await
            .expect_err("bad role");
        assert!(matches!(err, ImportError::Invalid(_)));
        assert!(writer.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn item_import_needs_a_logged_in_summoner() {
        let writer = RecordingWriter::default();
        let request = ItemImportRequest {
            champion_id: 126,
            role: String::new(),
            items: vec![3071],
            starting_items: vec![1055],
        };
        let err = import_items(&writer, None, &catalog(), "[GTools]", &request)
            .await
            .expect_err("no summoner");
        assert!(matches!(err, ImportError::NotConnected));

        import_items(&writer, Some(42), &catalog(), "[GTools]", &request)
            .await
            .expect("import should succeed");
        assert_eq!(*writer.calls.lock(), vec!["create set 42"]);
        assert_eq!(writer.bodies.lock()[0]["title"], "[GTools] Jayce Aram");
    }
}
