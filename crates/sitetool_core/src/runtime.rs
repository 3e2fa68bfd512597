use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::config::{load_config, render_default_config};
use crate::markers::DEFAULT_TEMPLATE_PATH;

pub const SITE_ROOT_ENV: &str = "SITETOOL_SITE_ROOT";
pub const CONFIG_ENV: &str = "SITETOOL_CONFIG";
pub const STATE_DIR_NAME: &str = ".sitetool";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Config,
    Heuristic,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Config => "config",
            Self::Heuristic => "heuristic",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub site_root: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub cwd: PathBuf,
}

impl ResolutionContext {
    pub fn from_process() -> Result<Self> {
        let cwd = env::current_dir().context("failed to read current directory")?;
        Ok(Self { cwd })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub site_root: PathBuf,
    pub template_path: PathBuf,
    pub config_path: PathBuf,
    pub root_source: ValueSource,
    pub config_source: ValueSource,
}

impl ResolvedPaths {
    pub fn diagnostics(&self) -> String {
        format!(
            "site_root={} ({})\ntemplate_path={}\nconfig_path={} ({})",
            normalize_for_display(&self.site_root),
            self.root_source.as_str(),
            normalize_for_display(&self.template_path),
            normalize_for_display(&self.config_path),
            self.config_source.as_str(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeStatus {
    pub site_root_exists: bool,
    pub template_exists: bool,
    pub config_exists: bool,
    pub warnings: Vec<String>,
}

pub fn inspect_runtime(paths: &ResolvedPaths) -> RuntimeStatus {
    let site_root_exists = paths.site_root.is_dir();
    let template_exists = paths.template_path.is_file();
    let config_exists = paths.config_path.exists();

    let mut warnings = Vec::new();
    if !site_root_exists {
        warnings.push(format!(
            "site root is missing: {}",
            normalize_for_display(&paths.site_root)
        ));
    }
    if !template_exists {
        warnings.push(format!(
            "archive template is missing; `sitetool archives` will fail: {}",
            normalize_for_display(&paths.template_path)
        ));
    }

    RuntimeStatus {
        site_root_exists,
        template_exists,
        config_exists,
        warnings,
    }
}

pub fn ensure_site_root(paths: &ResolvedPaths) -> Result<()> {
    if !paths.site_root.is_dir() {
        bail!(
            "site root does not exist or is not a directory: {}\nPass --site-root <PATH> or set {SITE_ROOT_ENV}",
            normalize_for_display(&paths.site_root)
        );
    }
    Ok(())
}

pub fn resolve_paths(
    context: &ResolutionContext,
    overrides: &PathOverrides,
) -> Result<ResolvedPaths> {
    resolve_paths_with_lookup(context, overrides, |key| env::var(key).ok())
}

fn resolve_paths_with_lookup<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: F,
) -> Result<ResolvedPaths>
where
    F: Fn(&str) -> Option<String>,
{
    let explicit_root = if let Some(path) = overrides.site_root.as_deref() {
        Some((absolutize(path, &context.cwd), ValueSource::Flag))
    } else {
        non_empty(lookup_env(SITE_ROOT_ENV))
            .map(|value| (absolutize(Path::new(&value), &context.cwd), ValueSource::Env))
    };
    let heuristic_root = detect_site_root_heuristic(&context.cwd);

    let (config_path, config_source) = if let Some(path) = overrides.config.as_deref() {
        (absolutize(path, &context.cwd), ValueSource::Flag)
    } else if let Some(value) = non_empty(lookup_env(CONFIG_ENV)) {
        (absolutize(Path::new(&value), &context.cwd), ValueSource::Env)
    } else {
        let base = explicit_root
            .as_ref()
            .map(|(root, _)| root.as_path())
            .unwrap_or(heuristic_root.0.as_path());
        (
            base.join(STATE_DIR_NAME).join("config.toml"),
            ValueSource::Default,
        )
    };

    let config = load_config(&config_path)?;
    let (site_root, root_source) = match explicit_root {
        Some(found) => found,
        None => match config.site.root.as_deref() {
            Some(root) => {
                let base = config_path.parent().unwrap_or(context.cwd.as_path());
                (absolutize(root, base), ValueSource::Config)
            }
            None => heuristic_root,
        },
    };

    Ok(ResolvedPaths {
        template_path: config.template_path(&site_root),
        site_root,
        config_path,
        root_source,
        config_source,
    })
}

#[derive(Debug, Clone)]
pub struct InitReport {
    pub config_path: PathBuf,
    pub wrote_config: bool,
}

pub fn init_config(paths: &ResolvedPaths, force: bool) -> Result<InitReport> {
    let wrote_config = write_text_file(&paths.config_path, &render_default_config()?, force)?;
    Ok(InitReport {
        config_path: paths.config_path.clone(),
        wrote_config,
    })
}

fn detect_site_root_heuristic(cwd: &Path) -> (PathBuf, ValueSource) {
    let mut seen = HashSet::new();
    for candidate in ancestors(cwd) {
        let key = normalize_for_display(&candidate);
        if !seen.insert(key) {
            continue;
        }
        if candidate.join(DEFAULT_TEMPLATE_PATH).is_file() {
            return (candidate, ValueSource::Heuristic);
        }
    }
    (cwd.to_path_buf(), ValueSource::Default)
}

fn ancestors(path: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut cursor = Some(path);
    while let Some(current) = cursor {
        out.push(current.to_path_buf());
        cursor = current.parent();
    }
    out
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn write_text_file(path: &Path, content: &str, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }

    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create parent directory {}", parent.display()))?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

fn normalize_for_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
