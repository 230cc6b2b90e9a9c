//! Tile providers built from [`TileSourceConfig`].

use std::sync::Arc;
use std::time::Duration;

use terrane_config::{Config, SourceKind, TileSourceConfig};
use terrane_tiles::{
    DebugLayer, DebugProvider, FetchError, RetryPolicy, TileBounds, TileProvider,
    UrlProviderOptions, UrlTemplate, UrlTemplateProvider,
};
use tokio::runtime::Handle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layer {
    Imagery,
    Elevation,
}

impl Layer {
    fn name(self) -> &'static str {
        match self {
            Layer::Imagery => "imagery",
            Layer::Elevation => "elevation",
        }
    }

    /// Stock template when the config does not give one.
    fn preset(self, kind: SourceKind) -> UrlTemplate {
        match (kind, self) {
            (SourceKind::Local, Layer::Imagery) => UrlTemplate::local(0),
            (SourceKind::Local, Layer::Elevation) => UrlTemplate::local(1),
            (_, Layer::Imagery) => UrlTemplate::mapbox("mapbox.satellite", "jpg"),
            (_, Layer::Elevation) => UrlTemplate::mapbox("mapbox.terrain-rgb", "pngraw"),
        }
    }
}

pub fn build_provider(
    layer: Layer,
    source: &TileSourceConfig,
    config: &Config,
    runtime: &Handle,
) -> Result<Arc<dyn TileProvider>, FetchError> {
    if source.kind == SourceKind::Debug {
        let debug_layer = match layer {
            Layer::Imagery => DebugLayer::Imagery,
            Layer::Elevation => DebugLayer::Elevation,
        };
        return Ok(Arc::new(DebugProvider::new(
            debug_layer,
            source.max_level,
            source.tile_size,
            config.debug.terrain_seed,
        )));
    }

    let template = source
        .url_template
        .as_deref()
        .map(UrlTemplate::new)
        .unwrap_or_else(|| layer.preset(source.kind));
    let [west, south, east, north] = source.bounds;
    let options = UrlProviderOptions {
        name: format!("{}-{}", layer.name(), kind_name(source.kind)),
        min_level: source.min_level,
        max_level: source.max_level,
        tile_size: source.tile_size,
        bounds: TileBounds {
            west,
            south,
            east,
            north,
        },
        access_token: source.access_token.clone(),
        timeout: Duration::from_secs(config.fetch.timeout_secs),
        retry: RetryPolicy {
            retries: config.fetch.retries,
            backoff: Duration::from_millis(config.fetch.backoff_ms),
        },
    };
    let provider = UrlTemplateProvider::new(template, options, runtime.clone())?;
    Ok(Arc::new(provider))
}

fn kind_name(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Remote => "remote",
        SourceKind::Local => "local",
        SourceKind::Debug => "debug",
    }
}
