//! Headless terrane host.
//!
//! Loads the config, builds the tile providers and a [`TileView`], then plays
//! the role of a render loop: one `update` per tick with a camera descending
//! towards the surface, logging traversal statistics as the tree refines.
//!
//! Run with: `cargo run -p terrane-demo -- --ticks 600`

mod sources;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use glam::DVec3;
use terrane_config::{CliArgs, Config, ErrorPolicyConfig};
use terrane_lod::{
    Camera, ContentKind, ErrorPolicy, LodPolicy, QuadtreeSettings, TerrainContext, TileView,
    ViewSettings,
};
use terrane_rtin::MeshOptions;
use terrane_tiles::TileProvider;
use tracing::{info, warn};

const TICK: Duration = Duration::from_millis(16);
const STATS_EVERY: u64 = 60;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(Config::default_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let (mut config, load_error) = match Config::load_or_create(&config_dir) {
        Ok(config) => (config, None),
        Err(err) => (Config::default(), Some(err)),
    };
    config.apply_cli_overrides(&args);

    let log_file = terrane_log::init_logging(
        Some(&config_dir.join("logs")),
        cfg!(debug_assertions),
        Some(&config),
    );
    if let Some(err) = load_error {
        warn!("Using default config, {} unusable: {err}", config_dir.display());
    }
    if let Some(path) = log_file {
        info!("Writing JSON log to {}", path.display());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("terrane-fetch")
        .enable_all()
        .build()?;

    let imagery = sources::build_provider(
        sources::Layer::Imagery,
        &config.imagery,
        &config,
        runtime.handle(),
    )?;
    let elevation = sources::build_provider(
        sources::Layer::Elevation,
        &config.elevation,
        &config,
        runtime.handle(),
    )?;
    info!(
        "Imagery: {} (levels {}..={}) | Elevation: {} (levels {}..={})",
        imagery.name(),
        imagery.min_level(),
        imagery.max_level(),
        elevation.name(),
        elevation.min_level(),
        elevation.max_level(),
    );

    let mesh_options = MeshOptions {
        exaggeration: config.rtin.exaggeration,
        ..MeshOptions::default()
    };
    let context = TerrainContext::build(config.rtin.grid_size, config.workers.count, mesh_options)?;
    info!(
        "RTIN grid {} | {} simplification workers",
        context.rtin.grid_size(),
        context.pool.worker_count()
    );

    let mut view = TileView::new(imagery, elevation, context, view_settings(&config));
    let world_size = view.settings().tree.world_size;

    for tick in 0..args.ticks {
        let camera = descending_camera(tick, args.ticks, world_size);
        view.update(&camera);

        if tick % STATS_EVERY == 0 {
            let stats = view.stats();
            info!(
                tick,
                altitude = camera.position.y.round(),
                nodes = stats.nodes,
                loading = stats.loading,
                rendered = stats.rendered,
                depth = stats.depth,
                jobs = stats.pending_jobs,
                "traversal"
            );
        }
        std::thread::sleep(TICK);
    }

    let stats = view.stats();
    let tiles = view.rendered_tiles();
    let triangles: usize = tiles.iter().map(|tile| tile.mesh.triangle_count()).sum();
    let flat = tiles.iter().filter(|tile| tile.fallback).count();
    info!(
        "Finished {} ticks: {} nodes, {} drawn tiles ({} flat fallback), {} triangles, depth {}",
        stats.ticks, stats.nodes, tiles.len(), flat, triangles, stats.depth
    );
    Ok(())
}

fn view_settings(config: &Config) -> ViewSettings {
    let error_policy = match config.rtin.error_policy {
        ErrorPolicyConfig::Constant(error) => ErrorPolicy::Constant(error),
        ErrorPolicyConfig::DepthScaled {
            coarse_error,
            coarse_levels,
            fine_scale,
        } => ErrorPolicy::DepthScaled {
            coarse_error,
            coarse_levels,
            fine_scale,
        },
    };
    ViewSettings {
        tree: QuadtreeSettings {
            max_level: config.lod.max_level,
            world_size: config.lod.world_size,
            policy: LodPolicy {
                subdivide_below: config.lod.subdivide_distance,
                simplify_above: config.lod.simplify_distance,
            },
        },
        update_interval: config.lod.update_interval,
        error_policy,
        content: if config.lod.flat_terrain {
            ContentKind::Flat
        } else {
            ContentKind::Heightmap
        },
    }
}

/// Camera falling from a quarter of the world width to 2 km, looking ahead and down.
fn descending_camera(tick: u64, ticks: u64, world_size: f64) -> Camera {
    let t = tick as f64 / ticks.max(1) as f64;
    let start = world_size * 0.25;
    let end = 2_000.0;
    let altitude = start * (end / start).powf(t);
    let position = DVec3::new(world_size * 0.05, altitude, world_size * 0.05);
    let target = position + DVec3::new(0.0, -altitude, -altitude * 0.5);
    Camera::looking_at(
        position,
        target,
        std::f64::consts::FRAC_PI_3,
        16.0 / 9.0,
        1.0,
        world_size * 4.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_settings_follow_config() {
        let mut config = Config::default();
        config.lod.update_interval = 4;
        config.lod.flat_terrain = true;
        config.rtin.error_policy = ErrorPolicyConfig::Constant(2.0);
        let settings = view_settings(&config);
        assert_eq!(settings.update_interval, 4);
        assert_eq!(settings.content, ContentKind::Flat);
        assert_eq!(settings.error_policy, ErrorPolicy::Constant(2.0));
        assert_eq!(settings.tree.policy, LodPolicy::default());
        assert_eq!(settings.tree.max_level, 18);
    }

    #[test]
    fn test_camera_descends() {
        let first = descending_camera(0, 100, 1e6);
        let last = descending_camera(99, 100, 1e6);
        assert!((first.position.y - 250_000.0).abs() < 1e-6);
        assert!(last.position.y < first.position.y);
        assert!(last.position.y >= 2_000.0);
    }
}
