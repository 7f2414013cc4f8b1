//! PostgREST-style backend client

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::debug;
use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{
    ChatMessage, Fixture, GameweekPoints, League, LeagueMember, LeagueSource, OverallStanding,
    Pick, ResultRow, Submission,
};
use crate::error::{FetchError, FetchResult};

/// Requests per second when no limit is configured
pub const DEFAULT_RATE_LIMIT: u32 = 10;

/// Single-object responses come back as 406 with this code when no row matched
const PGRST_NO_ROWS: &str = "PGRST116";

/// Query pairs appended to a table URL
type Query = Vec<(&'static str, String)>;

/// Backend client over the `/rest/v1` table API
pub struct RestSource {
    http: HttpClient,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RestSource {
    /// Create a client for `base_url` (e.g. `https://xyz.example.co`).
    ///
    /// Requests authenticate with `api_key`, plus `access_token` as the
    /// bearer when present (otherwise the api key doubles as bearer).
    pub fn new(
        base_url: &str,
        api_key: String,
        access_token: Option<String>,
        requests_per_second: u32,
    ) -> FetchResult<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(rate)));

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            access_token,
            rate_limiter,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// GET a table and decode the row array.
    async fn get_rows<T: DeserializeOwned>(&self, table: &str, query: Query) -> FetchResult<Vec<T>> {
        self.get(table, query, false).await
    }

    /// GET exactly one row; zero rows maps to `NotFound`.
    async fn get_one<T: DeserializeOwned>(&self, table: &str, query: Query) -> FetchResult<T> {
        self.get(table, query, true).await
    }

    async fn get<T: DeserializeOwned>(&self, table: &str, query: Query, single: bool) -> FetchResult<T> {
        // Apply rate limiting
        self.rate_limiter.until_ready().await;

        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        let mut request = self
            .http
            .get(self.table_url(table))
            .query(&query)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", bearer));
        if single {
            request = request.header("Accept", "application/vnd.pgrst.object+json");
        }

        debug!("GET {} {:?}", table, query);
        let response = request.send().await?;

        let status = response.status();
        match status {
            StatusCode::OK => response.json::<T>().await.map_err(|e| {
                FetchError::InvalidResponse(format!("Failed to parse {} rows: {}", table, e))
            }),
            StatusCode::NOT_FOUND => Err(FetchError::NotFound(table.to_string())),
            StatusCode::NOT_ACCEPTABLE => {
                let body = response.text().await.unwrap_or_default();
                if body.contains(PGRST_NO_ROWS) {
                    Err(FetchError::NotFound(format!("{}: no matching row", table)))
                } else {
                    Err(FetchError::BadRequest(body))
                }
            }
            StatusCode::UNAUTHORIZED => Err(FetchError::Unauthorized),
            StatusCode::FORBIDDEN => Err(FetchError::Forbidden),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                Err(FetchError::RateLimited(Duration::from_secs(retry_after)))
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                let error_msg = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Bad request".to_string());
                Err(FetchError::BadRequest(error_msg))
            }
            status if status.is_server_error() => {
                let error_msg = response
                    .text()
                    .await
                    .unwrap_or_else(|_| format!("Server error: {}", status));
                Err(FetchError::Server(error_msg))
            }
            _ => Err(FetchError::InvalidResponse(format!(
                "Unexpected status code: {}",
                status
            ))),
        }
    }
}

/// PostgREST `in.(a,b)` filter value
fn in_list(values: &[String]) -> String {
    format!("in.({})", values.join(","))
}

#[async_trait]
impl LeagueSource for RestSource {
    async fn current_gameweek(&self) -> FetchResult<u32> {
        #[derive(Deserialize)]
        struct Meta {
            current_gw: u32,
        }

        let meta: Meta = self
            .get_one(
                "app_meta",
                vec![("select", "current_gw".into()), ("id", "eq.1".into())],
            )
            .await?;
        Ok(meta.current_gw)
    }

    async fn memberships(&self, user_id: &str) -> FetchResult<Vec<League>> {
        #[derive(Deserialize)]
        struct Membership {
            leagues: League,
        }

        let rows: Vec<Membership> = self
            .get_rows(
                "league_members",
                vec![
                    ("select", "leagues(id,name,code)".into()),
                    ("user_id", format!("eq.{}", user_id)),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(|m| m.leagues).collect())
    }

    async fn league_members(&self, league_id: &str) -> FetchResult<Vec<LeagueMember>> {
        self.get_rows(
            "league_members",
            vec![
                ("select", "league_id,user_id,name".into()),
                ("league_id", format!("eq.{}", league_id)),
            ],
        )
        .await
    }

    async fn fixtures(&self, gw: u32) -> FetchResult<Vec<Fixture>> {
        self.get_rows(
            "app_fixtures",
            vec![
                ("select", "gw,fixture_index,home,away,kickoff".into()),
                ("gw", format!("eq.{}", gw)),
                ("order", "fixture_index.asc".into()),
            ],
        )
        .await
    }

    async fn results(&self) -> FetchResult<Vec<ResultRow>> {
        self.get_rows(
            "app_gw_results",
            vec![("select", "gw,fixture_index,result".into())],
        )
        .await
    }

    async fn picks(&self, user_ids: &[String], gw: Option<u32>) -> FetchResult<Vec<Pick>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: Query = vec![
            ("select", "user_id,gw,fixture_index,pick".into()),
            ("user_id", in_list(user_ids)),
        ];
        if let Some(gw) = gw {
            query.push(("gw", format!("eq.{}", gw)));
        }
        self.get_rows("app_picks", query).await
    }

    async fn submissions(&self, user_ids: &[String]) -> FetchResult<Vec<Submission>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.get_rows(
            "app_gw_submissions",
            vec![
                ("select", "user_id,gw,submitted_at".into()),
                ("user_id", in_list(user_ids)),
            ],
        )
        .await
    }

    async fn gameweek_points(&self) -> FetchResult<Vec<GameweekPoints>> {
        self.get_rows(
            "app_v_gw_points",
            vec![("select", "user_id,name,gw,points".into())],
        )
        .await
    }

    async fn overall_standings(&self) -> FetchResult<Vec<OverallStanding>> {
        self.get_rows(
            "app_v_ocp_overall",
            vec![("select", "user_id,name,ocp".into())],
        )
        .await
    }

    async fn chat_backlog(&self, league_id: &str, limit: usize) -> FetchResult<Vec<ChatMessage>> {
        self.get_rows(
            "league_messages",
            vec![
                ("select", "id,league_id,user_id,content,created_at".into()),
                ("league_id", format!("eq.{}", league_id)),
                ("order", "created_at.desc".into()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }
}
