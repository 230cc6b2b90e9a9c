//! Configuration structs with defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub lod: LodConfig,
    pub rtin: RtinConfig,
    pub workers: WorkerConfig,
    pub imagery: TileSourceConfig,
    pub elevation: TileSourceConfig,
    pub fetch: FetchConfig,
    pub debug: DebugConfig,
}

/// Quadtree traversal settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Split nodes closer than this normalized distance.
    pub subdivide_distance: f64,
    /// Merge nodes farther than this normalized distance.
    pub simplify_distance: f64,
    /// Run the camera traversal every n host ticks.
    pub update_interval: u32,
    /// Deepest quadtree level.
    pub max_level: u8,
    /// Root tile width in meters.
    pub world_size: f64,
    /// Drape imagery on a flat plane instead of elevation meshes.
    pub flat_terrain: bool,
}

/// Mesh simplification settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RtinConfig {
    /// Elevation grid size, `2^n + 1`.
    pub grid_size: usize,
    pub error_policy: ErrorPolicyConfig,
    /// Height multiplier.
    pub exaggeration: f32,
}

/// Maximum simplification error per level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ErrorPolicyConfig {
    Constant(f32),
    DepthScaled {
        coarse_error: f32,
        coarse_levels: u8,
        fine_scale: f32,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker threads; 0 picks a count from the available cores.
    pub count: usize,
}

/// Where tiles come from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    /// Hosted tile service.
    Remote,
    /// Tile server on localhost.
    Local,
    /// Synthesized in process.
    Debug,
}

/// One tile source (imagery or elevation).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TileSourceConfig {
    pub kind: SourceKind,
    /// `{z}`/`{x}`/`{y}`/`{token}` template; `None` uses the preset for `kind`.
    pub url_template: Option<String>,
    pub access_token: Option<String>,
    pub min_level: u8,
    pub max_level: u8,
    pub tile_size: u32,
    /// `[west, south, east, north]` in degrees.
    pub bounds: [f64; 4],
}

/// HTTP fetch hardening.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Extra attempts after a retryable failure.
    pub retries: u32,
    /// Delay before the first retry; doubles per attempt.
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log filter override (e.g., "debug", "info,terrane_lod=trace").
    pub log_level: String,
    /// Seed for synthesized elevation.
    pub terrain_seed: u32,
}

// --- Default implementations ---

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            subdivide_distance: 110.0,
            simplify_distance: 130.0,
            update_interval: 10,
            max_level: 18,
            world_size: 40_075_016.686,
            flat_terrain: false,
        }
    }
}

impl Default for RtinConfig {
    fn default() -> Self {
        Self {
            grid_size: 257,
            error_policy: ErrorPolicyConfig::default(),
            exaggeration: 1.0,
        }
    }
}

impl Default for ErrorPolicyConfig {
    fn default() -> Self {
        ErrorPolicyConfig::DepthScaled {
            coarse_error: 100.0,
            coarse_levels: 10,
            fine_scale: 80.0,
        }
    }
}

impl Default for TileSourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Debug,
            url_template: None,
            access_token: None,
            min_level: 0,
            max_level: 18,
            tile_size: 256,
            bounds: [-180.0, -85.051_128_78, 180.0, 85.051_128_78],
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retries: 0,
            backoff_ms: 250,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info,reqwest=warn,hyper=warn".to_string(),
            terrain_seed: 0,
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Per-user config directory (`<config_dir>/terrane`), if the platform has one.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("terrane"))
    }

    /// Read `config.ron` from `config_dir`, writing the defaults there first if
    /// the file does not exist yet.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE);
        if !path.exists() {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Wrote default terrane config to {}", path.display());
            return Ok(config);
        }
        let config = read_config(&path)?;
        log::info!("Loaded terrane config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        })?;
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let text = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        let path = config_dir.join(CONFIG_FILE);
        std::fs::write(&path, text).map_err(|source| ConfigError::Write { path, source })
    }

    /// Re-read the file; `Some` only when it no longer matches `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let fresh = read_config(&config_dir.join(CONFIG_FILE))?;
        if fresh == *self {
            return Ok(None);
        }
        log::info!("terrane config changed on disk");
        Ok(Some(fresh))
    }
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The written file spells out the LOD thresholds and grid size.
    #[test]
    fn test_saved_file_lists_lod_defaults() {
        let dir = tempfile::tempdir().unwrap();
        Config::default().save(dir.path()).unwrap();
        let text = std::fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        assert!(text.contains("grid_size: 257"));
        assert!(text.contains("subdivide_distance: 110.0"));
        assert!(text.contains("simplify_distance: 130.0"));
    }

    #[test]
    fn test_error_policy_and_source_survive_ron() {
        let mut config = Config::default();
        config.rtin.error_policy = ErrorPolicyConfig::Constant(4.5);
        config.imagery.kind = SourceKind::Remote;
        config.imagery.access_token = Some("secret".to_string());
        let text = ron::to_string(&config).unwrap();
        assert_eq!(ron::from_str::<Config>(&text).unwrap(), config);
    }

    /// Missing sections and fields fall back to their defaults.
    #[test]
    fn test_missing_fields_use_defaults() {
        let config: Config = ron::from_str("(lod: (max_level: 12), workers: ())").unwrap();
        assert_eq!(config.lod.max_level, 12);
        assert_eq!(config.lod.update_interval, 10);
        assert_eq!(config.rtin, RtinConfig::default());
        assert_eq!(config.elevation.kind, SourceKind::Debug);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        assert!(ron::from_str::<Config>("(lod: (max_level: 9), terrain_shader: true)").is_ok());
    }

    #[test]
    fn test_reload_without_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        match Config::default().reload(dir.path()) {
            Err(ConfigError::Read { path, .. }) => assert!(path.ends_with(CONFIG_FILE)),
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[test]
    fn test_saved_overrides_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.lod.max_level = 14;
        config.workers.count = 2;
        config.fetch.retries = 3;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();
        assert!(config.reload(dir.path()).unwrap().is_none());

        let mut modified = config.clone();
        modified.lod.update_interval = 5;
        modified.save(dir.path()).unwrap();

        let reloaded = config.reload(dir.path()).unwrap();
        assert_eq!(reloaded.map(|c| c.lod.update_interval), Some(5));
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{{not valid}}").unwrap();
        assert!(matches!(
            Config::load_or_create(dir.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
