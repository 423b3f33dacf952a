use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Violations tolerated before the attempt is force-submitted.
    pub max_violations: u32,
    /// Autosave cadence, in timer ticks (ticks arrive at 1 Hz).
    pub autosave_interval_ticks: u32,
    /// Per-request timeout for the assessment / results collaborators.
    pub fetch_timeout_seconds: u64,
    /// Where the file-backed snapshot gateway keeps its documents.
    pub snapshot_spool_dir: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_violations: 3,
            autosave_interval_ticks: 30,
            fetch_timeout_seconds: 5,
            snapshot_spool_dir: "data/attempts".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            // Override with environment variables (prefix: APP_)
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;

        let defaults = EngineConfig::default();

        let max_violations = settings
            .get_int("engine.max_violations")
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.max_violations);

        let autosave_interval_ticks = settings
            .get_int("engine.autosave_interval_ticks")
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.autosave_interval_ticks);

        let fetch_timeout_seconds = settings
            .get_int("engine.fetch_timeout_seconds")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.fetch_timeout_seconds);

        let snapshot_spool_dir = settings
            .get_string("engine.snapshot_spool_dir")
            .unwrap_or(defaults.snapshot_spool_dir);

        Ok(EngineConfig {
            max_violations,
            autosave_interval_ticks,
            fetch_timeout_seconds,
            snapshot_spool_dir,
        })
    }
}
