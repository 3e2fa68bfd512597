use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Serialize;
use similar::TextDiff;

use crate::filesystem::{Document, display_path, html_files, relative_from_root};
use crate::markers::SidebarMarkers;
use crate::runtime::ResolvedPaths;

/// One step of the sidebar rewrite. Every step touches at most the first match.
#[derive(Debug, Clone)]
pub enum SectionEdit {
    Remove {
        name: &'static str,
        section: Regex,
    },
    Replace {
        name: &'static str,
        section: Regex,
        replacement: String,
    },
    InsertAfter {
        name: &'static str,
        marker: String,
        item: String,
    },
}

impl SectionEdit {
    pub fn name(&self) -> &'static str {
        match *self {
            Self::Remove { name, .. }
            | Self::Replace { name, .. }
            | Self::InsertAfter { name, .. } => name,
        }
    }

    /// Returns the edited content, or `None` when the step leaves it as is.
    pub fn apply(&self, content: &str) -> Option<String> {
        match self {
            Self::Remove { section, .. } => {
                let found = section.find(content)?;
                Some(splice(content, found.start(), found.end(), ""))
            }
            Self::Replace {
                section,
                replacement,
                ..
            } => {
                let found = section.find(content)?;
                if found.as_str() == replacement.as_str() {
                    return None;
                }
                Some(splice(content, found.start(), found.end(), replacement))
            }
            Self::InsertAfter { marker, item, .. } => {
                if item.is_empty() {
                    return None;
                }
                let at = content.find(marker.as_str())? + marker.len();
                if content[at..].starts_with(item.as_str()) {
                    return None;
                }
                Some(splice(content, at, at, item))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rewrite {
    pub content: String,
    pub applied: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct SidebarPlan {
    edits: Vec<SectionEdit>,
}

impl SidebarPlan {
    pub fn from_markers(markers: &SidebarMarkers) -> Result<Self> {
        markers.validate()?;
        let social = aside_section(&markers.social_id)?;
        ensure_replacement_is_one_section(&social, markers)?;
        Ok(Self {
            edits: vec![
                SectionEdit::Remove {
                    name: "remove-subscription",
                    section: aside_section(&markers.subscription_id)?,
                },
                SectionEdit::Replace {
                    name: "replace-social",
                    section: social,
                    replacement: markers.social_replacement.clone(),
                },
                SectionEdit::InsertAfter {
                    name: "insert-blogroll",
                    marker: markers.blogroll_marker.clone(),
                    item: markers.blogroll_item.clone(),
                },
                SectionEdit::Remove {
                    name: "remove-meta",
                    section: aside_section(&markers.meta_id)?,
                },
            ],
        })
    }

    pub fn edits(&self) -> &[SectionEdit] {
        &self.edits
    }

    pub fn edit_names(&self) -> Vec<&'static str> {
        self.edits.iter().map(SectionEdit::name).collect()
    }

    pub fn apply(&self, content: &str) -> Rewrite {
        let mut current = content.to_string();
        let mut applied = Vec::new();
        for edit in &self.edits {
            if let Some(next) = edit.apply(&current) {
                current = next;
                applied.push(edit.name());
            }
        }
        Rewrite {
            content: current,
            applied,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SidebarOptions {
    pub dry_run: bool,
    pub capture_diff: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentChange {
    pub relative_path: String,
    pub applied: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentFailure {
    pub relative_path: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SidebarReport {
    pub dry_run: bool,
    pub discovered: usize,
    pub unchanged: usize,
    pub modified: Vec<DocumentChange>,
    pub failures: Vec<DocumentFailure>,
}

pub fn rewrite_sidebars(
    paths: &ResolvedPaths,
    markers: &SidebarMarkers,
    options: &SidebarOptions,
) -> Result<SidebarReport> {
    let plan = SidebarPlan::from_markers(markers)?;
    let files = html_files(&paths.site_root)?;
    log::debug!(
        "found {} html documents under {}",
        files.len(),
        paths.site_root.display()
    );
    Ok(rewrite_documents(&paths.site_root, &files, &plan, options))
}

/// Applies the plan to each file. A failing document is recorded and skipped.
pub fn rewrite_documents(
    site_root: &Path,
    files: &[PathBuf],
    plan: &SidebarPlan,
    options: &SidebarOptions,
) -> SidebarReport {
    let mut report = SidebarReport {
        dry_run: options.dry_run,
        discovered: files.len(),
        unchanged: 0,
        modified: Vec::new(),
        failures: Vec::new(),
    };

    for path in files {
        let document = match Document::read(site_root, path) {
            Ok(document) => document,
            Err(error) => {
                log::warn!("{error:#}");
                report.failures.push(DocumentFailure {
                    relative_path: relative_from_root(site_root, path)
                        .unwrap_or_else(|_| display_path(path)),
                    error: format!("{error:#}"),
                });
                continue;
            }
        };

        let rewrite = plan.apply(&document.content);
        if rewrite.content == document.content {
            report.unchanged += 1;
            continue;
        }

        if !options.dry_run
            && let Err(error) = document.write(&rewrite.content)
        {
            log::warn!("{error:#}");
            report.failures.push(DocumentFailure {
                relative_path: document.relative_path,
                error: format!("{error:#}"),
            });
            continue;
        }

        log::debug!(
            "rewrote {} ({})",
            document.relative_path,
            rewrite.applied.join(", ")
        );
        let diff = options.capture_diff.then(|| {
            TextDiff::from_lines(document.content.as_str(), rewrite.content.as_str())
                .unified_diff()
                .context_radius(2)
                .header(&document.relative_path, &document.relative_path)
                .to_string()
        });
        report.modified.push(DocumentChange {
            relative_path: document.relative_path,
            applied: rewrite.applied,
            diff,
        });
    }

    report
}

fn aside_section(id: &str) -> Result<Regex> {
    let pattern = format!(r#"(?s)<aside id="{}".*?</aside>"#, regex::escape(id));
    Regex::new(&pattern).with_context(|| format!("failed to compile section pattern for `{id}`"))
}

/// The replacement must match the social section pattern exactly once, end to end.
fn ensure_replacement_is_one_section(social: &Regex, markers: &SidebarMarkers) -> Result<()> {
    let replacement = markers.social_replacement.as_str();
    let whole = social
        .find(replacement)
        .is_some_and(|found| found.start() == 0 && found.end() == replacement.len());
    if !whole {
        bail!(
            "sidebar marker `social_replacement` must be a single `<aside id=\"{}\">...</aside>` section with no nested `</aside>`",
            markers.social_id
        );
    }
    Ok(())
}

fn splice(content: &str, start: usize, end: usize, insert: &str) -> String {
    let mut out = String::with_capacity(content.len() - (end - start) + insert.len());
    out.push_str(&content[..start]);
    out.push_str(insert);
    out.push_str(&content[end..]);
    out
}
