use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};

use crate::config::themes::{Theme, ThemeRegistry, DEFAULT_THEME};

pub mod themes;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "TermNote";
const APP_NAME: &str = "termnote";
const VAULT_DIR_NAME: &str = ".termnote";
const LOG_FILE_NAME: &str = "termnote.log";

/// Paths supplied on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub config: Option<PathBuf>,
    pub vault: Option<PathBuf>,
}

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover(overrides: &PathOverrides) -> Result<Self> {
        let paths = ConfigPaths::discover(overrides)?;
        Ok(Self { paths })
    }

    pub fn from_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            self.write_default_config(&default_cfg)?;
            default_cfg.post_load(&self.paths)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        tracing::info!(path = %self.paths.config_file.display(), "wrote default config");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub home_dir: PathBuf,
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    /// `<home>/.termnote`, used when neither the CLI nor the config names a vault.
    pub default_vault_dir: PathBuf,
    pub vault_override: Option<PathBuf>,
    pub state_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover(overrides: &PathOverrides) -> Result<Self> {
        let base_dirs = BaseDirs::new().context("resolving home directory")?;
        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;
        let home_dir = base_dirs.home_dir().to_path_buf();

        let config_dir = overrides
            .config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = overrides
            .config
            .clone()
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| project_dirs.data_local_dir().join("state"));
        let log_dir = state_dir.join("logs");

        Ok(Self {
            default_vault_dir: home_dir.join(VAULT_DIR_NAME),
            vault_override: overrides.vault.clone(),
            home_dir,
            config_dir,
            config_file,
            state_dir,
            log_dir,
        })
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }

    /// The vault is created separately by `storage::init` so it gets its own
    /// permissions.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.state_dir, &self.log_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }

    fn expand_home(&self, path: &Path) -> PathBuf {
        match path.strip_prefix("~") {
            Ok(rest) => self.home_dir.join(rest),
            Err(_) => path.to_path_buf(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub theme: String,
    pub vault: VaultOptions,
    pub editor: EditorOptions,
    pub ui: UiOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            theme: DEFAULT_THEME.to_string(),
            vault: VaultOptions::default(),
            editor: EditorOptions::default(),
            ui: UiOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.vault.resolve(paths).context("resolving vault path")?;
        let registry = ThemeRegistry::default();
        if !registry.contains(&self.theme) {
            let mut available: Vec<_> = registry.names().collect();
            available.sort_unstable();
            tracing::warn!(
                theme = %self.theme,
                ?available,
                "unknown theme in config, falling back to {DEFAULT_THEME}"
            );
            self.theme = DEFAULT_THEME.to_string();
        }
        Ok(())
    }

    pub fn theme(&self) -> Theme {
        let registry = ThemeRegistry::default();
        registry
            .get(&self.theme)
            .or_else(|| registry.get(DEFAULT_THEME))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultOptions {
    /// Vault directory; `~` expands to the home directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(skip)]
    pub path: PathBuf,
}

impl VaultOptions {
    fn resolve(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.path = match (&paths.vault_override, &self.dir) {
            (Some(cli), _) => paths.expand_home(cli),
            (None, Some(dir)) => paths.expand_home(dir),
            (None, None) => paths.default_vault_dir.clone(),
        };
        if self.path.as_os_str().is_empty() {
            anyhow::bail!("vault directory cannot be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorOptions {
    pub name_char_limit: usize,
    pub history_limit: usize,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            name_char_limit: 156,
            history_limit: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiOptions {
    pub status_ttl_ms: u64,
    pub tick_rate_ms: u64,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            status_ttl_ms: 4_000,
            tick_rate_ms: 250,
        }
    }
}

impl UiOptions {
    pub fn status_ttl(&self) -> Duration {
        Duration::from_millis(self.status_ttl_ms)
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.max(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_paths(root: &TempDir) -> ConfigPaths {
        let base = root.path();
        let config_dir = base.join("config");
        let state_dir = base.join("state");
        ConfigPaths {
            home_dir: base.join("home"),
            config_file: config_dir.join("config.toml"),
            config_dir,
            default_vault_dir: base.join("home").join(VAULT_DIR_NAME),
            vault_override: None,
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    #[test]
    fn load_or_init_writes_default_config() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        let loader = ConfigLoader::from_paths(paths.clone());

        let cfg = loader.load_or_init()?;
        assert!(paths.config_file.exists());
        assert_eq!(cfg.theme, DEFAULT_THEME);
        assert_eq!(cfg.vault.path, paths.default_vault_dir);
        assert_eq!(cfg.editor.name_char_limit, 156);

        let written = fs::read_to_string(&paths.config_file)?;
        assert!(!written.contains("path"), "resolved path leaked: {written}");

        let reloaded = loader.load()?;
        assert_eq!(reloaded.vault.path, paths.default_vault_dir);
        Ok(())
    }

    #[test]
    fn config_vault_dir_expands_home() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        fs::create_dir_all(&paths.config_dir)?;
        fs::write(
            &paths.config_file,
            "theme = \"dark\"\n[vault]\ndir = \"~/notes\"\n",
        )?;

        let cfg = ConfigLoader::from_paths(paths.clone()).load()?;
        assert_eq!(cfg.theme, "dark");
        assert_eq!(cfg.vault.path, paths.home_dir.join("notes"));
        Ok(())
    }

    #[test]
    fn cli_vault_override_wins() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut paths = temp_paths(&temp);
        paths.vault_override = Some(temp.path().join("elsewhere"));
        fs::create_dir_all(&paths.config_dir)?;
        fs::write(&paths.config_file, "[vault]\ndir = \"/from/config\"\n")?;

        let cfg = ConfigLoader::from_paths(paths).load()?;
        assert_eq!(cfg.vault.path, temp.path().join("elsewhere"));
        Ok(())
    }

    #[test]
    fn unknown_theme_falls_back_to_default() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        fs::create_dir_all(&paths.config_dir)?;
        fs::write(&paths.config_file, "theme = \"neon-disco\"\n")?;

        let cfg = ConfigLoader::from_paths(paths).load()?;
        assert_eq!(cfg.theme, DEFAULT_THEME);
        assert_eq!(cfg.theme(), ThemeRegistry::default().get(DEFAULT_THEME).unwrap());
        Ok(())
    }
}
