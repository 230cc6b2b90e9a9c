//! URL-template tile providers for remote and local tile services.

use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::{AbortableFetch, FetchError, FetchResult, TileBounds, TileCoord, TileProvider};

/// A tile URL with `{z}`, `{x}`, `{y}` and optional `{token}` placeholders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Hosted raster tile service (`map_id` e.g. `mapbox.terrain-rgb`, `format` e.g. `pngraw`).
    pub fn mapbox(map_id: &str, format: &str) -> Self {
        Self(format!(
            "https://api.mapbox.com/v4/{map_id}/{{z}}/{{x}}/{{y}}.{format}?access_token={{token}}"
        ))
    }

    /// Local tile server; `kind` selects imagery (0) or elevation (1).
    pub fn local(kind: u32) -> Self {
        Self(format!("http://localhost:3001/{{z}}/{{x}}/{{y}}/{kind}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitute the tile address and token.
    pub fn expand(&self, coord: TileCoord, token: Option<&str>) -> String {
        self.0
            .replace("{z}", &coord.level.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
            .replace("{token}", token.unwrap_or_default())
    }
}

/// Bounded retry with exponential backoff. Zero retries means a single attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const NONE: Self = Self {
        retries: 0,
        backoff: Duration::ZERO,
    };

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::NONE
    }
}

/// Settings for a [`UrlTemplateProvider`].
#[derive(Clone, Debug)]
pub struct UrlProviderOptions {
    pub name: String,
    pub min_level: u8,
    pub max_level: u8,
    pub tile_size: u32,
    pub bounds: TileBounds,
    pub access_token: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for UrlProviderOptions {
    fn default() -> Self {
        Self {
            name: "tiles".to_string(),
            min_level: 0,
            max_level: 20,
            tile_size: 256,
            bounds: TileBounds::WORLD,
            access_token: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::NONE,
        }
    }
}

/// Fetches tiles over HTTP from a templated URL on a tokio runtime.
pub struct UrlTemplateProvider {
    template: UrlTemplate,
    options: UrlProviderOptions,
    client: reqwest::Client,
    runtime: Handle,
}

impl UrlTemplateProvider {
    pub fn new(
        template: UrlTemplate,
        options: UrlProviderOptions,
        runtime: Handle,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(FetchError::Client)?;
        debug!(
            name = %options.name,
            template = template.as_str(),
            "created url tile provider"
        );
        Ok(Self {
            template,
            options,
            client,
            runtime,
        })
    }

    /// The URL requested for `coord`.
    pub fn url(&self, coord: TileCoord) -> String {
        self.template
            .expand(coord, self.options.access_token.as_deref())
    }
}

impl TileProvider for UrlTemplateProvider {
    fn name(&self) -> &str {
        &self.options.name
    }

    fn min_level(&self) -> u8 {
        self.options.min_level
    }

    fn max_level(&self) -> u8 {
        self.options.max_level
    }

    fn tile_size(&self) -> u32 {
        self.options.tile_size
    }

    fn bounds(&self) -> TileBounds {
        self.options.bounds
    }

    fn fetch_tile(&self, coord: TileCoord) -> AbortableFetch {
        let (min, max) = (self.options.min_level, self.options.max_level);
        if coord.level < min || coord.level > max {
            return AbortableFetch::ready(Err(FetchError::OutOfRange {
                level: coord.level,
                min,
                max,
            }));
        }
        let request = Request {
            client: self.client.clone(),
            url: self.url(coord),
            retry: self.options.retry,
        };
        AbortableFetch::spawn(&self.runtime, async move { request.fetch().await })
    }
}

struct Request {
    client: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl Request {
    async fn fetch(&self) -> FetchResult {
        let mut attempt = 0;
        loop {
            match self.fetch_once().await {
                Ok(bytes) => return Ok(bytes),
                Err(err) if attempt < self.retry.retries && err.is_retryable() => {
                    let delay = self.retry.delay(attempt);
                    warn!(url = %self.url, attempt, ?delay, "tile fetch failed, retrying: {err}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch_once(&self) -> FetchResult {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}
