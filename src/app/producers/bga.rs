use crate::domain::model::{Batch, Record, RecordKind, ID_FIELD};
use crate::domain::ports::{BatchProducer, Storage};
use crate::utils::error::{Result, StatsError};
use chrono::DateTime;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE, LOCATION, USER_AGENT};
use reqwest::{redirect, Client, StatusCode};
use serde_json::{json, Map, Value};
use std::io::ErrorKind;
use std::time::Duration;

pub const BGA_BASE: &str = "https://boardgamearena.com";
pub const BGA_EN_BASE: &str = "https://en.boardgamearena.com";
pub const ARK_NOVA_GAME_ID: &str = "arknova";

const GAMESTATS_PATH: &str = "/gamestats";
const GAMES_PATH: &str = "/gamestats/gamestats/getGames.html";
const TABLE_INFO_PATH: &str = "/table/table/tableinfos.html";
const LOGGED_IN_MARKER: &str = "'user_status': 'logged'";

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";
const XHR_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeOptions {
    pub base_url: String,
    pub limit: usize,
    pub player_id: Option<String>,
    /// Also fetch `tableinfos` for every game, one request per table.
    pub fetch_details: bool,
    pub request_delay: Duration,
    pub timeout: Duration,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            base_url: BGA_EN_BASE.to_string(),
            limit: 100,
            player_id: None,
            fetch_details: false,
            request_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

/// Reads a Cookie-Editor style export: an array of `{name, value, domain, path}`.
/// Entries without a name or value are skipped.
pub fn parse_cookie_export(bytes: &[u8], source_name: &str) -> Result<Vec<SessionCookie>> {
    let entries: Vec<Value> = serde_json::from_slice(bytes)
        .map_err(|e| StatsError::malformed(source_name, format!("invalid cookie export: {}", e)))?;

    Ok(entries
        .iter()
        .filter_map(|entry| {
            let name = entry.get("name")?.as_str()?;
            let value = entry.get("value")?.as_str()?;
            if name.is_empty() || value.is_empty() {
                return None;
            }
            Some(SessionCookie {
                name: name.to_string(),
                value: value.to_string(),
            })
        })
        .collect())
}

pub fn cookie_header(cookies: &[SessionCookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// REST client for the BGA game-stats endpoints, authenticated with exported browser cookies.
pub struct BgaClient {
    client: Client,
    options: ScrapeOptions,
}

impl BgaClient {
    pub fn new(cookies: &[SessionCookie], options: ScrapeOptions) -> Result<Self> {
        if cookies.is_empty() {
            return Err(StatsError::AuthenticationError {
                message: "cookie export contains no usable cookies".to_string(),
            });
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(XHR_ACCEPT));
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        let cookie = HeaderValue::from_str(&cookie_header(cookies)).map_err(|_| {
            StatsError::AuthenticationError {
                message: "cookie values contain characters not allowed in a header".to_string(),
            }
        })?;
        headers.insert(COOKIE, cookie);

        // Redirects are inspected by hand: a bounce to the login page means the session is dead.
        let client = Client::builder()
            .default_headers(headers)
            .redirect(redirect::Policy::none())
            .timeout(options.timeout)
            .build()?;

        Ok(Self { client, options })
    }

    pub async fn from_cookie_file<S: Storage>(
        storage: &S,
        path: &str,
        options: ScrapeOptions,
    ) -> Result<Self> {
        let bytes = match storage.read_file(path).await {
            Ok(bytes) => bytes,
            Err(StatsError::IoError(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(StatsError::AuthenticationError {
                    message: format!("cookies file not found: {}", path),
                })
            }
            Err(e) => return Err(e),
        };

        let cookies = parse_cookie_export(&bytes, path)?;
        tracing::info!("Loaded {} cookies from {}", cookies.len(), path);
        Self::new(&cookies, options)
    }

    pub fn options(&self) -> &ScrapeOptions {
        &self.options
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.options.base_url.trim_end_matches('/'), path)
    }

    pub async fn verify_session(&self) -> Result<()> {
        tracing::info!("Verifying session authentication...");

        let response = self.client.get(self.url(GAMESTATS_PATH)).send().await?;
        if response.status().is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if location.contains("account") || location.contains("login") {
                return Err(StatsError::AuthenticationError {
                    message: "session not authenticated (redirected to login)".to_string(),
                });
            }
        }

        let home = self.client.get(self.url("/")).send().await?;
        if home.status() == StatusCode::OK && home.text().await?.contains(LOGGED_IN_MARKER) {
            tracing::info!("Session verified - authenticated");
            return Ok(());
        }

        let probe = self
            .client
            .get(self.url(GAMES_PATH))
            .query(&[("game", ARK_NOVA_GAME_ID), ("finished", "1"), ("limit", "1")])
            .send()
            .await?;
        if probe.status() == StatusCode::OK {
            if let Ok(body) = probe.json::<Value>().await {
                if status_ok(&body) {
                    tracing::info!("Session verified via API - authenticated");
                    return Ok(());
                }
            }
        }

        Err(StatsError::AuthenticationError {
            message: "session verification failed, cookies may be expired".to_string(),
        })
    }

    /// Finished Ark Nova tables, newest first as BGA returns them.
    /// An unexpected reply is logged and yields no tables.
    pub async fn fetch_game_history(&self) -> Result<Vec<Value>> {
        tracing::info!(
            "Fetching Ark Nova game history (limit: {})...",
            self.options.limit
        );

        let limit = self.options.limit.to_string();
        let mut params = vec![
            ("game", ARK_NOVA_GAME_ID),
            ("finished", "1"),
            ("limit", limit.as_str()),
        ];
        if let Some(player) = &self.options.player_id {
            params.push(("player", player.as_str()));
        }

        let response = self
            .client
            .get(self.url(GAMES_PATH))
            .query(&params)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            tracing::error!("Failed to fetch games: {}", response.status());
            return Ok(Vec::new());
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to parse game history: {}", e);
                return Ok(Vec::new());
            }
        };

        match body.get("data").filter(|_| status_ok(&body)) {
            Some(data) => {
                let tables = data
                    .get("tables")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                tracing::info!("Found {} games", tables.len());
                Ok(tables)
            }
            None => {
                tracing::error!("Unexpected response format: {}", body);
                Ok(Vec::new())
            }
        }
    }

    pub async fn fetch_table_details(&self, table_id: &str) -> Result<Option<Value>> {
        let response = self
            .client
            .get(self.url(TABLE_INFO_PATH))
            .query(&[("id", table_id)])
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Ok(None);
        }

        Ok(match response.json::<Value>().await {
            Ok(body) if status_ok(&body) => Some(body.get("data").cloned().unwrap_or(json!({}))),
            _ => None,
        })
    }

    /// History fetch plus parsing; games without an id or players are dropped.
    pub async fn scrape_games(&self) -> Result<Vec<Record>> {
        let tables = self.fetch_game_history().await?;
        let total = tables.len();
        let mut games = Vec::with_capacity(total);

        for (i, table) in tables.iter().enumerate() {
            tracing::debug!("Processing game {}/{}...", i + 1, total);
            let mut game = parse_game(table);

            let Some(table_id) = game.table_id() else {
                tracing::warn!("Skipping table without an id: {}", table);
                continue;
            };
            if game.data.get("players").and_then(Value::as_array).map_or(true, Vec::is_empty) {
                continue;
            }

            if self.options.fetch_details {
                if i > 0 {
                    tokio::time::sleep(self.options.request_delay).await;
                }
                match self.fetch_table_details(&table_id).await {
                    Ok(Some(details)) => {
                        game.data.insert("details".to_string(), details);
                    }
                    Ok(None) => tracing::warn!("No details for table {}", table_id),
                    Err(e) => tracing::warn!("Failed to fetch details for table {}: {}", table_id, e),
                }
            }

            games.push(game);
        }

        tracing::info!("Processed {} games successfully", games.len());
        Ok(games)
    }
}

#[async_trait::async_trait]
impl BatchProducer for BgaClient {
    async fn produce(&self) -> Result<Batch> {
        self.verify_session().await?;
        Ok(Batch::new(RecordKind::Games, self.scrape_games().await?))
    }
}

/// BGA reports success as `"status": "1"` or `"status": 1`.
fn status_ok(body: &Value) -> bool {
    match body.get("status") {
        Some(Value::String(s)) => s == "1",
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

fn lenient_int(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_of<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k).filter(|v| !v.is_null()))
}

fn parse_date(table: &Value) -> String {
    match first_of(table, &["end", "end_date"]) {
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => {
            if s.chars().all(|c| c.is_ascii_digit()) {
                if let Some(dt) = s.parse().ok().and_then(|secs| DateTime::from_timestamp(secs, 0)) {
                    return dt.format("%Y-%m-%d").to_string();
                }
            }
            s.chars().take(10).collect()
        }
        _ => "Unknown".to_string(),
    }
}

fn parse_player(info: &Value, fallback_name: String) -> Value {
    let name = first_of(info, &["name", "fullname"])
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(fallback_name);
    json!({
        "name": name,
        "score": lenient_int(info.get("score")),
        "rank": lenient_int(first_of(info, &["rank", "gamerank"])),
    })
}

/// Turns one raw `getGames` table into a game record keyed by `tableId`.
pub fn parse_game(table: &Value) -> Record {
    let table_id = id_string(first_of(table, &["table_id", "id"])).unwrap_or_default();

    let mut players: Vec<Value> = match first_of(table, &["players", "player"]) {
        Some(Value::Object(by_id)) => by_id
            .iter()
            .map(|(pid, info)| parse_player(info, format!("Player_{}", pid)))
            .collect(),
        Some(Value::Array(list)) => list
            .iter()
            .map(|info| parse_player(info, "Unknown".to_string()))
            .collect(),
        _ => Vec::new(),
    };
    players.sort_by_key(|p| p["rank"].as_i64().unwrap_or(0));

    let map_name = table
        .get("options")
        .and_then(Value::as_object)
        .and_then(|options| {
            options
                .iter()
                .find(|(key, _)| key.to_lowercase().contains("map"))
                .map(|(_, value)| match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
        })
        .unwrap_or_else(|| "Unknown".to_string());

    let turns = table
        .get("gameresult")
        .filter(|r| r.is_object())
        .map(|r| lenient_int(first_of(r, &["turns", "round"])))
        .unwrap_or(0);

    let mut data = Map::new();
    data.insert(ID_FIELD.to_string(), Value::String(table_id.clone()));
    data.insert("date".to_string(), Value::String(parse_date(table)));
    data.insert("map".to_string(), Value::String(map_name));
    data.insert("turns".to_string(), Value::from(turns));
    data.insert("players".to_string(), Value::Array(players));
    data.insert(
        "url".to_string(),
        Value::String(format!("{}/table?table={}", BGA_BASE, table_id)),
    );
    Record::new(data)
}
