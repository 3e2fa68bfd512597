use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::markers::{
    ArchiveMarkers, DEFAULT_BLOGROLL_ITEM, DEFAULT_BLOGROLL_MARKER, DEFAULT_MAIN_CLOSE,
    DEFAULT_MAIN_OPEN, DEFAULT_META_ID, DEFAULT_POST_FILENAME, DEFAULT_SOCIAL_ID,
    DEFAULT_SOCIAL_REPLACEMENT, DEFAULT_SUBSCRIPTION_ID, DEFAULT_TEMPLATE_PATH,
    DEFAULT_TITLE_PLACEHOLDER, SidebarMarkers,
};

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SiteConfig {
    #[serde(default)]
    pub site: SiteSection,
    #[serde(default)]
    pub sidebar: SidebarSection,
    #[serde(default)]
    pub archive: ArchiveSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SiteSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SidebarSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_replacement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blogroll_marker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blogroll_item: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ArchiveSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_open: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_close: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_filename: Option<String>,
}

impl SiteConfig {
    /// Sidebar markers with every unset key falling back to its default.
    pub fn sidebar_markers(&self) -> SidebarMarkers {
        let section = &self.sidebar;
        let defaults = SidebarMarkers::default();
        SidebarMarkers {
            subscription_id: section
                .subscription_id
                .clone()
                .unwrap_or(defaults.subscription_id),
            social_id: section.social_id.clone().unwrap_or(defaults.social_id),
            social_replacement: section
                .social_replacement
                .clone()
                .unwrap_or(defaults.social_replacement),
            blogroll_marker: section
                .blogroll_marker
                .clone()
                .unwrap_or(defaults.blogroll_marker),
            blogroll_item: section
                .blogroll_item
                .clone()
                .unwrap_or(defaults.blogroll_item),
            meta_id: section.meta_id.clone().unwrap_or(defaults.meta_id),
        }
    }

    pub fn archive_markers(&self) -> ArchiveMarkers {
        let section = &self.archive;
        let defaults = ArchiveMarkers::default();
        ArchiveMarkers {
            main_open: section.main_open.clone().unwrap_or(defaults.main_open),
            main_close: section.main_close.clone().unwrap_or(defaults.main_close),
            title_placeholder: section
                .title_placeholder
                .clone()
                .unwrap_or(defaults.title_placeholder),
            post_filename: section
                .post_filename
                .clone()
                .unwrap_or(defaults.post_filename),
        }
    }

    /// Template location relative to the site root unless configured as absolute.
    pub fn template_path(&self, site_root: &Path) -> PathBuf {
        match self.site.template.as_deref() {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => site_root.join(path),
            None => site_root.join(DEFAULT_TEMPLATE_PATH),
        }
    }
}

/// Load and parse a SiteConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<SiteConfig> {
    if !config_path.exists() {
        return Ok(SiteConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: SiteConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

/// Config with every marker spelled out, as written by `sitetool init`.
pub fn render_default_config() -> Result<String> {
    let config = SiteConfig {
        site: SiteSection {
            root: None,
            template: Some(PathBuf::from(DEFAULT_TEMPLATE_PATH)),
        },
        sidebar: SidebarSection {
            subscription_id: Some(DEFAULT_SUBSCRIPTION_ID.to_string()),
            social_id: Some(DEFAULT_SOCIAL_ID.to_string()),
            social_replacement: Some(DEFAULT_SOCIAL_REPLACEMENT.to_string()),
            blogroll_marker: Some(DEFAULT_BLOGROLL_MARKER.to_string()),
            blogroll_item: Some(DEFAULT_BLOGROLL_ITEM.to_string()),
            meta_id: Some(DEFAULT_META_ID.to_string()),
        },
        archive: ArchiveSection {
            main_open: Some(DEFAULT_MAIN_OPEN.to_string()),
            main_close: Some(DEFAULT_MAIN_CLOSE.to_string()),
            title_placeholder: Some(DEFAULT_TITLE_PLACEHOLDER.to_string()),
            post_filename: Some(DEFAULT_POST_FILENAME.to_string()),
        },
    };
    let rendered = toml::to_string_pretty(&config).context("failed to serialize config TOML")?;
    Ok(format!(
        "# sitetool configuration (materialized by `sitetool init`)\n# markers must match the exported markup byte-for-byte\n\n{rendered}"
    ))
}
