// API client module: contains a small blocking HTTP client that talks to
// a GZCTF instance. It is intentionally small and synchronous; every call
// the dumper makes goes through here.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

/// Ordered category -> challenges mapping, in API response order.
pub type Catalog = IndexMap<String, Vec<ChallengeSummary>>;

/// Simple API client that holds a reqwest blocking client and the base URL
/// of the GZCTF instance. The platform uses a session cookie rather than a
/// bearer token, so the client is built with a cookie store and `login`
/// only has to succeed once; every later call rides on the stored cookie.
///
/// There is no server-side logout call. Dropping the client releases the
/// session, which covers both the success and the failure exit paths.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

/// Login payload. Field names mirror the GZCTF account endpoint; the
/// `challenge` field is a captcha slot and is always null for this tool.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    challenge: Option<&'a str>,
    user_name: &'a str,
    password: &'a str,
}

/// One game as returned by the game-list endpoint. Only used for selection.
#[derive(Deserialize, Debug, Clone)]
pub struct Game {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Deserialize, Debug)]
struct GameList {
    data: Vec<Game>,
}

/// Top-level game metadata, used for the root README.
#[derive(Deserialize, Debug, Clone)]
pub struct GameInfo {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
}

/// One entry of the challenge index, grouped under a category key.
#[derive(Deserialize, Debug, Clone)]
pub struct ChallengeSummary {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub solved: bool,
}

#[derive(Deserialize, Debug)]
struct GameDetails {
    #[serde(default)]
    challenges: Catalog,
}

/// Attachment pointer inside a challenge detail. Both fields can be null
/// for challenges without a downloadable file.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: Option<String>,
    pub file_size: Option<u64>,
}

/// Full challenge detail, fetched once per challenge during a dump.
#[derive(Deserialize, Debug, Clone)]
pub struct ChallengeDetail {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub context: Option<Attachment>,
}

impl ChallengeDetail {
    /// The attachment URL and declared size, if this challenge has one.
    /// The declared size is advisory only; it is never checked against
    /// the actual byte count.
    pub fn attachment(&self) -> Option<(&str, u64)> {
        let context = self.context.as_ref()?;
        let url = context.url.as_deref()?;
        Some((url, context.file_size.unwrap_or(0)))
    }
}

impl ApiClient {
    /// Create an ApiClient for the given instance base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid base URL: {}", base_url))?;
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid endpoint path: {}", path))
    }

    /// Bail with the response status unless it is 2xx.
    fn check(res: Response, action: &str) -> Result<Response> {
        if !res.status().is_success() {
            anyhow::bail!("{} failed: http {}", action, res.status().as_u16());
        }
        Ok(res)
    }

    /// Log in with username and password. On success the session cookie is
    /// kept in the client's cookie store; on 401 the credentials were wrong
    /// and the caller must not issue further calls.
    pub fn login(&self, username: &str, password: &str) -> Result<()> {
        let url = self.endpoint("/api/account/login")?;
        let body = LoginRequest {
            challenge: None,
            user_name: username,
            password,
        };
        let res = self
            .client
            .post(url)
            .json(&body)
            .send()
            .context("Failed to send login request")?;
        if res.status() == StatusCode::UNAUTHORIZED {
            anyhow::bail!("Login failed: invalid credentials");
        }
        Self::check(res, "Login")?;
        Ok(())
    }

    /// List the games visible to this account. The platform paginates, but
    /// a single page of 50 covers any real instance.
    pub fn list_games(&self) -> Result<Vec<Game>> {
        let url = self.endpoint("/api/game")?;
        let res = self
            .client
            .get(url)
            .query(&[("count", 50), ("skip", 0)])
            .send()
            .context("Failed to send game list request")?;
        let res = Self::check(res, "Listing games")?;
        let list: GameList = res.json().context("Parsing game list json")?;
        Ok(list.data)
    }

    /// Fetch a game's title/summary/content for the top-level README.
    pub fn game_info(&self, game_id: u64) -> Result<GameInfo> {
        let url = self.endpoint(&format!("/api/game/{}", game_id))?;
        let res = self
            .client
            .get(url)
            .send()
            .context("Failed to send game info request")?;
        let res = Self::check(res, "Fetching game info")?;
        res.json().context("Parsing game info json")
    }

    /// Fetch the challenge index for a game, grouped by category.
    pub fn game_details(&self, game_id: u64) -> Result<Catalog> {
        let url = self.endpoint(&format!("/api/game/{}/details", game_id))?;
        let res = self
            .client
            .get(url)
            .send()
            .context("Failed to send game details request")?;
        let res = Self::check(res, "Fetching game details")?;
        let details: GameDetails = res.json().context("Parsing game details json")?;
        Ok(details.challenges)
    }

    /// Fetch the full detail for one challenge. Called once per challenge
    /// encountered in the catalog; the platform has no batch endpoint.
    pub fn challenge_detail(&self, game_id: u64, challenge_id: u64) -> Result<ChallengeDetail> {
        let url = self.endpoint(&format!(
            "/api/game/{}/challenges/{}",
            game_id, challenge_id
        ))?;
        let res = self
            .client
            .get(url)
            .send()
            .context("Failed to send challenge detail request")?;
        let res = Self::check(res, "Fetching challenge detail")?;
        res.json().context("Parsing challenge detail json")
    }

    /// Open an attachment for streaming. Attachment URLs from the API are
    /// usually relative (`/assets/...`), so they are joined against the
    /// base URL; absolute URLs pass through unchanged. The returned
    /// response body implements `Read` and is consumed incrementally by
    /// the caller.
    pub fn open_attachment(&self, url: &str) -> Result<Response> {
        let url = self
            .base_url
            .join(url)
            .with_context(|| format!("Invalid attachment URL: {}", url))?;
        let res = self
            .client
            .get(url)
            .send()
            .context("Failed to send attachment request")?;
        Self::check(res, "Downloading attachment")
    }
}
