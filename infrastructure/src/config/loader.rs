//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::PathBuf;

const PROJECT_FILES: [&str; 2] = ["padre-harness.toml", ".padre-harness.toml"];

/// Prefix of environment overrides; `__` separates nested keys
/// (`PADRE_HARNESS_SERVER__PORT=9999`).
pub const ENV_PREFIX: &str = "PADRE_HARNESS_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `PADRE_HARNESS_*` environment variables
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./padre-harness.toml` or `./.padre-harness.toml`
    /// 4. XDG config: `$XDG_CONFIG_HOME/padre-harness/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        Self::figment(config_path).extract().map_err(Box::new)
    }

    fn figment(config_path: Option<&PathBuf>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(&global_path));
        }

        if let Some(path) = Self::project_config_path() {
            figment = figment.merge(Toml::file(&path));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    ///
    /// Returns XDG_CONFIG_HOME/padre-harness/config.toml if set,
    /// otherwise falls back to ~/.config/padre-harness/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("padre-harness").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Print the config file locations being used (for debugging)
    pub fn print_config_sources(config_path: Option<&PathBuf>) {
        println!("Configuration sources (in priority order):");

        println!("  [     ] Env:     {}*", ENV_PREFIX);

        if let Some(path) = config_path {
            let mark = if path.exists() { "FOUND" } else { "MISSING" };
            println!("  [{:<5}] Explicit: {}", mark, path.display());
        }

        if let Some(path) = Self::project_config_path() {
            println!("  [FOUND] Project: {}", path.display());
        } else {
            println!("  [     ] Project: ./padre-harness.toml or ./.padre-harness.toml");
        }

        if let Some(path) = Self::global_config_path() {
            if path.exists() {
                println!("  [FOUND] Global:  {}", path.display());
            } else {
                println!("  [     ] Global:  {}", path.display());
            }
        }

        println!("  [     ] Default: built-in defaults");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.timeouts.io_secs, 5);
    }

    #[test]
    fn test_global_config_path_returns_some() {
        // Should return a path (even if file doesn't exist)
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("padre-harness"));
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 4711\n\n[timeouts]\nio_secs = 9").unwrap();
        let path = file.path().to_path_buf();

        let config = ConfigLoader::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, Some(4711));
        assert_eq!(config.timeouts.io_secs, 9);
        // Untouched keys keep their defaults
        assert_eq!(config.timeouts.startup_secs, 5);
    }

    #[test]
    fn test_env_overrides_files() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("padre-harness.toml", "[server]\nport = 1000")?;
            jail.set_env("PADRE_HARNESS_SERVER__PORT", "2000");
            jail.set_env("PADRE_HARNESS_SHUTDOWN__POLL_RETRIES", "7");

            let config = ConfigLoader::load(None).map_err(|e| *e)?;
            assert_eq!(config.server.port, Some(2000));
            assert_eq!(config.shutdown.poll_retries, 7);
            Ok(())
        });
    }
}
