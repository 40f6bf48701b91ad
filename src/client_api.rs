use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_tls_with_config,
    tungstenite::{
        client::IntoClientRequest,
        error::TlsError,
        http::{header::AUTHORIZATION, HeaderValue},
    },
    Connector, MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

use crate::{discovery::ClientCredentials, error::CompanionError, protocol::SummonerProfile};

const CLIENT_USER: &str = "riot";

pub type EventStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Source of the lobby's queue id, consulted when champ select carries no
/// assigned position.
#[async_trait]
pub trait QueueSource: Send + Sync {
    async fn current_queue_id(&self) -> Result<i64, CompanionError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunePage {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_deletable: bool,
}

/// Authenticated access to the running game client's local API.
#[derive(Debug, Clone)]
pub struct LocalClient {
    http: reqwest::Client,
    credentials: ClientCredentials,
}

impl LocalClient {
    pub fn new(credentials: ClientCredentials, timeout: Duration) -> Result<Self, CompanionError> {
        // The client serves a self-signed certificate on localhost.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()?;
        Ok(Self { http, credentials })
    }

    pub fn credentials(&self) -> &ClientCredentials {
        &self.credentials
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.credentials.base_url())
    }

    async fn send(&self, request: reqwest::RequestBuilder, path: &str) -> Result<Response, CompanionError> {
        let response = request
            .basic_auth(CLIENT_USER, Some(&self.credentials.password))
            .send()
            .await?;
        check_status(response.status(), path)?;
        Ok(response)
    }

    async fn get_json(&self, path: &str) -> Result<Option<Value>, CompanionError> {
        let response = self
            .http
            .get(self.url(path))
            .basic_auth(CLIENT_USER, Some(&self.credentials.password))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        check_status(response.status(), path)?;
        Ok(Some(response.json::<Value>().await?))
    }

    /// `None` while nobody is logged in.
    pub async fn current_summoner(&self) -> Result<Option<SummonerProfile>, CompanionError> {
        match self.get_json("/lol-summoner/v1/current-summoner").await? {
            Some(body) => Ok(Some(serde_json::from_value(body)?)),
            None => Ok(None),
        }
    }

    pub async fn rune_pages(&self) -> Result<Vec<RunePage>, CompanionError> {
        match self.get_json("/lol-perks/v1/pages").await? {
            Some(body) => Ok(serde_json::from_value(body)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn delete_rune_page(&self, page_id: u64) -> Result<(), CompanionError> {
        let path = format!("/lol-perks/v1/pages/{page_id}");
        self.send(self.http.delete(self.url(&path)), &path).await?;
        Ok(())
    }

    pub async fn create_rune_page(&self, page: &Value) -> Result<(), CompanionError> {
        let path = "/lol-perks/v1/pages";
        self.send(self.http.post(self.url(path)).json(page), path)
            .await?;
        Ok(())
    }

    pub async fn create_item_set(&self, summoner_id: u64, item_set: &Value) -> Result<(), CompanionError> {
        let path = format!("/lol-item-sets/v1/item-sets/{summoner_id}/sets");
        self.send(self.http.post(self.url(&path)).json(item_set), &path)
            .await?;
        Ok(())
    }

    /// Opens the push-event stream at the API root.
    pub async fn connect_events(&self) -> Result<EventStream, CompanionError> {
        let mut request = self.credentials.ws_url().into_client_request()?;
        let token = STANDARD.encode(format!("{CLIENT_USER}:{}", self.credentials.password));
        let header = HeaderValue::from_str(&format!("Basic {token}"))
            .map_err(|err| CompanionError::Payload(format!("invalid auth header: {err}")))?;
        request.headers_mut().insert(AUTHORIZATION, header);

        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| CompanionError::WebSocket(TlsError::Native(err).into()))?;
        let (stream, response) =
            connect_async_tls_with_config(request, None, false, Some(Connector::NativeTls(tls)))
                .await?;
        debug!(status = %response.status(), "event stream handshake complete");
        Ok(stream)
    }
}

#[async_trait]
impl QueueSource for LocalClient {
    async fn current_queue_id(&self) -> Result<i64, CompanionError> {
        let body = self
            .get_json("/lol-lobby/v1/parties/gamemode")
            .await?
            .unwrap_or(Value::Null);
        Ok(body.get("queueId").and_then(Value::as_i64).unwrap_or_default())
    }
}

fn check_status(status: StatusCode, path: &str) -> Result<(), CompanionError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(CompanionError::Auth(status.as_u16()));
    }
    if !status.is_success() {
        return Err(CompanionError::Status {
            status: status.as_u16(),
            path: path.to_owned(),
        });
    }
    Ok(())
}
