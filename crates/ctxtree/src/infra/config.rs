//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".ctxtree/config.toml";

/// Separator for pattern lists passed through the environment. Commas belong to brace groups.
const ENV_LIST_SEPARATOR: char = ';';

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub patterns: Patterns,
    #[serde(default)]
    pub scan: Scan,
    #[serde(default)]
    pub export: Export,
}

/// Include/exclude globs deciding the default selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Patterns {
    #[serde(default)]
    include: Option<Vec<String>>,
    #[serde(default)]
    exclude: Option<Vec<String>>,
    #[serde(default)]
    case_sensitive: Option<bool>,
}

impl Patterns {
    fn default_include() -> Vec<String> {
        vec!["**/*".into()]
    }

    fn default_exclude() -> Vec<String> {
        vec!["**/node_modules/**".into(), "**/.git/**".into()]
    }

    pub fn include(&self) -> Vec<String> {
        self.include.clone().unwrap_or_else(Self::default_include)
    }

    pub fn exclude(&self) -> Vec<String> {
        self.exclude.clone().unwrap_or_else(Self::default_exclude)
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive.unwrap_or(true)
    }

    pub fn set_include(&mut self, include: Vec<String>) {
        self.include = Some(include);
    }

    pub fn set_exclude(&mut self, exclude: Vec<String>) {
        self.exclude = Some(exclude);
    }

    pub fn set_case_sensitive(&mut self, case_sensitive: bool) {
        self.case_sensitive = Some(case_sensitive);
    }
}

/// Discovery settings. Unset fields fall back to the built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Scan {
    #[serde(default)]
    pub show_hidden: Option<bool>,
    #[serde(default)]
    pub respect_gitignore: Option<bool>,
    #[serde(default)]
    pub max_file_size: Option<u64>,
    /// Classification workers; `0` lets rayon decide.
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Scan {
    pub fn show_hidden(&self) -> bool {
        self.show_hidden.unwrap_or(false)
    }

    pub fn respect_gitignore(&self) -> bool {
        self.respect_gitignore.unwrap_or(true)
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size.unwrap_or(1024 * 1024)
    }

    pub fn threads(&self) -> usize {
        self.threads.unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Export {
    #[serde(default)]
    fence_code: Option<bool>,
}

impl Export {
    fn default_fence_code() -> bool {
        true
    }

    pub fn fence_code(&self) -> bool {
        self.fence_code.unwrap_or_else(Self::default_fence_code)
    }
}

/// Environment overrides for the pattern sets.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    include: Option<String>,
    exclude: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            include: env::var("CTXTREE_INCLUDE").ok(),
            exclude: env::var("CTXTREE_EXCLUDE").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(include: &str, exclude: &str) -> Self {
        Self {
            include: Some(include.to_owned()),
            exclude: Some(exclude.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration for a project rooted at `root`: defaults, user config, the workspace
    /// config found at the repository root above `root`, then env overrides.
    pub fn load(root: &Path) -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path(root);
        Self::load_with_layers(global, Some(workspace), env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            tracing::debug!(path = %global_path.display(), "loading user config");
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            tracing::debug!(path = %workspace_path.display(), "loading workspace config");
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data).with_context(|| format!("invalid config file: {}", path.display()))
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            patterns: merge_patterns(self.patterns, other.patterns),
            scan: merge_scan(self.scan, other.scan),
            export: merge_export(self.export, other.export),
        }
    }
}

fn merge_patterns(mut base: Patterns, overlay: Patterns) -> Patterns {
    if let Some(include) = overlay.include {
        base.include = Some(include);
    }
    if let Some(exclude) = overlay.exclude {
        base.exclude = Some(exclude);
    }
    if let Some(case_sensitive) = overlay.case_sensitive {
        base.case_sensitive = Some(case_sensitive);
    }
    base
}

fn merge_scan(mut base: Scan, overlay: Scan) -> Scan {
    if let Some(value) = overlay.show_hidden {
        base.show_hidden = Some(value);
    }
    if let Some(value) = overlay.respect_gitignore {
        base.respect_gitignore = Some(value);
    }
    if let Some(value) = overlay.max_file_size {
        base.max_file_size = Some(value);
    }
    if let Some(value) = overlay.threads {
        base.threads = Some(value);
    }
    base
}

fn merge_export(mut base: Export, overlay: Export) -> Export {
    if let Some(value) = overlay.fence_code {
        base.fence_code = Some(value);
    }
    base
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("ctxtree/config.toml"))
}

fn workspace_config_path(start: &Path) -> PathBuf {
    let root = find_repo_root(start).unwrap_or_else(|| start.to_path_buf());
    root.join(DEFAULT_WORKSPACE_CONFIG_PATH)
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

fn split_env_list(value: &str) -> Vec<String> {
    value
        .split(ENV_LIST_SEPARATOR)
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty())
        .map(str::to_owned)
        .collect()
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(include) = env.include {
        config.patterns.include = Some(split_env_list(&include));
    }
    if let Some(exclude) = env.exclude {
        config.patterns.exclude = Some(split_env_list(&exclude));
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_no_files() {
        let config = Config::load_with_layers(None, None, EnvOverrides::default())
            .expect("load default config");
        assert_eq!(config.patterns.include(), ["**/*"]);
        assert_eq!(
            config.patterns.exclude(),
            ["**/node_modules/**", "**/.git/**"]
        );
        assert!(config.patterns.case_sensitive());
        assert!(config.scan.respect_gitignore());
        assert!(!config.scan.show_hidden());
        assert!(config.export.fence_code());
    }

    #[test]
    fn empty_config_falls_back_to_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.patterns.include(), ["**/*"]);
        assert_eq!(config.scan.max_file_size(), 1024 * 1024);
        assert_eq!(config.scan.threads(), 0);
    }

    #[test]
    fn merge_global_and_workspace() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r#"
[patterns]
include = ["src/**/*.{rs,toml}"]
[scan]
threads = 4
"#,
        )?;

        let workspace_dir = temp.path().join("repo");
        fs::create_dir_all(workspace_dir.join(".ctxtree"))?;
        fs::create_dir_all(workspace_dir.join(".git"))?;
        fs::write(
            workspace_dir.join(".ctxtree/config.toml"),
            r#"
[patterns]
exclude = ["**/target/**"]
case_sensitive = false
[export]
fence_code = false
"#,
        )?;

        let workspace_path = workspace_config_path(&workspace_dir.join("nested"));
        assert_eq!(workspace_path, workspace_dir.join(".ctxtree/config.toml"));

        let config =
            Config::load_with_layers(Some(global), Some(workspace_path), EnvOverrides::default())?;

        assert_eq!(config.patterns.include(), ["src/**/*.{rs,toml}"]);
        assert_eq!(config.patterns.exclude(), ["**/target/**"]);
        assert!(!config.patterns.case_sensitive());
        assert_eq!(config.scan.threads(), 4);
        assert!(!config.export.fence_code());

        Ok(())
    }

    #[test]
    fn workspace_scan_settings_replace_user_settings() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r#"
[scan]
show_hidden = true
respect_gitignore = false
max_file_size = 10
threads = 8
"#,
        )?;
        let workspace = temp.path().join("workspace.toml");
        fs::write(
            &workspace,
            r#"
[scan]
show_hidden = false
respect_gitignore = true
max_file_size = 1048576
threads = 0
"#,
        )?;

        let config =
            Config::load_with_layers(Some(global), Some(workspace), EnvOverrides::default())?;

        assert!(!config.scan.show_hidden());
        assert!(config.scan.respect_gitignore());
        assert_eq!(config.scan.max_file_size(), 1024 * 1024);
        assert_eq!(config.scan.threads(), 0);
        Ok(())
    }

    #[test]
    fn unset_scan_settings_keep_lower_layers() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(&global, "[scan]\nshow_hidden = true\nthreads = 3\n")?;
        let workspace = temp.path().join("workspace.toml");
        fs::write(&workspace, "[scan]\nrespect_gitignore = false\n")?;

        let config =
            Config::load_with_layers(Some(global), Some(workspace), EnvOverrides::default())?;

        assert!(config.scan.show_hidden());
        assert!(!config.scan.respect_gitignore());
        assert_eq!(config.scan.threads(), 3);
        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let overrides = EnvOverrides::for_tests("src/**/*.{ts,js}; docs/**", "");
        let config = Config::load_with_layers(None, None, overrides)?;
        assert_eq!(config.patterns.include(), ["src/**/*.{ts,js}", "docs/**"]);
        assert!(config.patterns.exclude().is_empty());
        Ok(())
    }

    #[test]
    fn invalid_config_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        let result = Config::from_file(&file);
        assert!(result.is_err());
        Ok(())
    }
}
