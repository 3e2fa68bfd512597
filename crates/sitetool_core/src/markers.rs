use anyhow::{Result, bail};
use serde::Serialize;

pub const DEFAULT_TEMPLATE_PATH: &str = "archives/index.html";

pub const DEFAULT_SUBSCRIPTION_ID: &str = "blog_subscription-2";
pub const DEFAULT_SOCIAL_ID: &str = "custom_html-2";
pub const DEFAULT_META_ID: &str = "meta-2";

pub const DEFAULT_SOCIAL_REPLACEMENT: &str = concat!(
    r#"<aside id="custom_html-2" class="widget_text widget widget_custom_html">"#,
    r#"<div class="textwidget custom-html-widget">"#,
    r#"<a href="https://www.threads.com/@postlibertarian">Follow @postlibertarian on Threads</a>"#,
    "</div></aside>",
);

pub const DEFAULT_BLOGROLL_MARKER: &str = "<ul class=\"xoxo blogroll\">\n";
pub const DEFAULT_BLOGROLL_ITEM: &str = "<li><a href=\"https://www.calibrations.blog/\" title=\"Calibrations blog\">Calibrations</a></li>\n";

pub const DEFAULT_MAIN_OPEN: &str = r#"<main id="main" class="site-main">"#;
pub const DEFAULT_MAIN_CLOSE: &str = "</main><!-- .site-main -->";
pub const DEFAULT_TITLE_PLACEHOLDER: &str = "<title>Archives</title>";
pub const DEFAULT_POST_FILENAME: &str = "index.html";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidebarMarkers {
    pub subscription_id: String,
    pub social_id: String,
    pub social_replacement: String,
    pub blogroll_marker: String,
    pub blogroll_item: String,
    pub meta_id: String,
}

impl Default for SidebarMarkers {
    fn default() -> Self {
        Self {
            subscription_id: DEFAULT_SUBSCRIPTION_ID.to_string(),
            social_id: DEFAULT_SOCIAL_ID.to_string(),
            social_replacement: DEFAULT_SOCIAL_REPLACEMENT.to_string(),
            blogroll_marker: DEFAULT_BLOGROLL_MARKER.to_string(),
            blogroll_item: DEFAULT_BLOGROLL_ITEM.to_string(),
            meta_id: DEFAULT_META_ID.to_string(),
        }
    }
}

impl SidebarMarkers {
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("subscription_id", &self.subscription_id),
            ("social_id", &self.social_id),
            ("blogroll_marker", &self.blogroll_marker),
            ("meta_id", &self.meta_id),
        ] {
            if value.trim().is_empty() {
                bail!("sidebar marker `{key}` cannot be empty");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveMarkers {
    pub main_open: String,
    pub main_close: String,
    pub title_placeholder: String,
    pub post_filename: String,
}

impl Default for ArchiveMarkers {
    fn default() -> Self {
        Self {
            main_open: DEFAULT_MAIN_OPEN.to_string(),
            main_close: DEFAULT_MAIN_CLOSE.to_string(),
            title_placeholder: DEFAULT_TITLE_PLACEHOLDER.to_string(),
            post_filename: DEFAULT_POST_FILENAME.to_string(),
        }
    }
}

impl ArchiveMarkers {
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("main_open", &self.main_open),
            ("main_close", &self.main_close),
            ("title_placeholder", &self.title_placeholder),
            ("post_filename", &self.post_filename),
        ] {
            if value.trim().is_empty() {
                bail!("archive marker `{key}` cannot be empty");
            }
        }
        if self.post_filename.contains('/') || self.post_filename.contains('\\') {
            bail!(
                "archive marker `post_filename` must be a bare file name: {}",
                self.post_filename
            );
        }
        Ok(())
    }
}
