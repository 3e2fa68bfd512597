use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;

use crate::filesystem::{Document, relative_segments};
use crate::markers::ArchiveMarkers;
use crate::runtime::ResolvedPaths;

pub const ARCHIVE_FILENAME: &str = "index.html";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Constant head and foot of the listing page, reused around every generated body.
#[derive(Debug, Clone)]
pub struct ArchiveTemplate {
    pub before: String,
    pub after: String,
}

impl ArchiveTemplate {
    pub fn load(path: &Path, markers: &ArchiveMarkers) -> Result<Self> {
        if !path.is_file() {
            bail!("archive template not found: {}", path.display());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read archive template {}", path.display()))?;
        Self::split(&content, markers)
            .with_context(|| format!("failed to split archive template {}", path.display()))
    }

    /// `before` runs through the end of `main_open`; `after` starts at `main_close`.
    pub fn split(content: &str, markers: &ArchiveMarkers) -> Result<Self> {
        let Some(open_at) = content.find(markers.main_open.as_str()) else {
            bail!("template is missing the opening marker `{}`", markers.main_open);
        };
        let Some(close_at) = content.find(markers.main_close.as_str()) else {
            bail!("template is missing the closing marker `{}`", markers.main_close);
        };
        Ok(Self {
            before: content[..open_at + markers.main_open.len()].to_string(),
            after: content[close_at..].to_string(),
        })
    }

    pub fn render_page(&self, heading: &str, article: &str, markers: &ArchiveMarkers) -> String {
        let head = self
            .before
            .replace(&markers.title_placeholder, &format!("<title>{heading}</title>"));
        format!("{head}{article}{}", self.after)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthKey {
    pub year: String,
    pub month: String,
}

impl MonthKey {
    pub fn relative_dir(&self) -> String {
        format!("{}/{}", self.year, self.month)
    }

    pub fn heading(&self) -> Result<String> {
        let name = self
            .month
            .parse::<u32>()
            .ok()
            .and_then(month_name)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "month `{}` is outside 01-12 for archive group {}",
                    self.month,
                    self.relative_dir()
                )
            })?;
        Ok(format!("{name} {}", self.year))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub title: String,
    pub date: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostLocation {
    pub year: String,
    pub month: String,
    pub day: String,
    pub slug: String,
}

impl PostLocation {
    pub fn url(&self) -> String {
        format!("/{}/{}/{}/{}/", self.year, self.month, self.day, self.slug)
    }

    pub fn month_key(&self) -> MonthKey {
        MonthKey {
            year: self.year.clone(),
            month: self.month.clone(),
        }
    }
}

/// Accepts exactly `YYYY/MM/DD/{slug}/{post_filename}`.
pub fn parse_post_path(segments: &[String], post_filename: &str) -> Option<PostLocation> {
    let [year, month, day, slug, filename] = segments else {
        return None;
    };
    if !is_digits(year, 4) || !is_digits(month, 2) || !is_digits(day, 2) {
        return None;
    }
    if slug.is_empty() || slug.starts_with('.') || filename != post_filename {
        return None;
    }
    Some(PostLocation {
        year: year.clone(),
        month: month.clone(),
        day: day.clone(),
        slug: slug.clone(),
    })
}

fn is_digits(value: &str, width: usize) -> bool {
    value.len() == width && value.bytes().all(|byte| byte.is_ascii_digit())
}

#[derive(Debug, Clone)]
pub struct PostExtractor {
    title: Regex,
    date: Regex,
}

impl PostExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            title: Regex::new(r"(?s)<h\d[^>]*entry-title[^>]*>(.*?)</h\d>")
                .context("failed to compile title pattern")?,
            date: Regex::new(r#"<time[^>]*entry-date[^>]*datetime="([^"]+)""#)
                .context("failed to compile date pattern")?,
        })
    }

    pub fn title(&self, content: &str) -> Option<String> {
        let captures = self.title.captures(content)?;
        Some(captures.get(1)?.as_str().trim().to_string())
    }

    /// Calendar date only: the first ten characters of the `datetime` attribute.
    pub fn date(&self, content: &str) -> Option<String> {
        let captures = self.date.captures(content)?;
        Some(captures.get(1)?.as_str().chars().take(10).collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PostScan {
    pub discovered: usize,
    pub groups: BTreeMap<MonthKey, Vec<PostRecord>>,
    pub skipped: Vec<String>,
}

impl PostScan {
    pub fn recorded(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

pub fn scan_posts(site_root: &Path, markers: &ArchiveMarkers) -> Result<PostScan> {
    let extractor = PostExtractor::new()?;
    let mut scan = PostScan::default();

    for post_path in post_files(site_root, &markers.post_filename)? {
        let segments = relative_segments(site_root, &post_path)?;
        let Some(location) = parse_post_path(&segments, &markers.post_filename) else {
            continue;
        };
        scan.discovered += 1;

        let document = Document::read(site_root, &post_path)?;
        let (Some(title), Some(date)) = (
            extractor.title(&document.content),
            extractor.date(&document.content),
        ) else {
            log::warn!("skipping post without title/date: {}", document.relative_path);
            scan.skipped.push(document.relative_path);
            continue;
        };

        log::debug!("scanned post {} ({date})", document.relative_path);
        scan.groups
            .entry(location.month_key())
            .or_default()
            .push(PostRecord {
                title,
                date,
                url: location.url(),
            });
    }

    Ok(scan)
}

/// Files five levels below the root whose name is the post filename.
pub fn post_files(site_root: &Path, post_filename: &str) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(site_root)
        .min_depth(5)
        .max_depth(5)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("failed to walk {}", site_root.display()))?;
        if !entry.file_type().is_file() || entry.file_name() != post_filename {
            continue;
        }
        out.push(entry.into_path());
    }
    Ok(out)
}

pub fn month_name(month: u32) -> Option<&'static str> {
    let index = usize::try_from(month).ok()?.checked_sub(1)?;
    MONTH_NAMES.get(index).copied()
}

/// Newest first. Posts sharing a date keep their scan order.
pub fn sort_newest_first(posts: &mut [PostRecord]) {
    posts.sort_by(|left, right| right.date.cmp(&left.date));
}

pub fn render_article(heading: &str, posts: &[PostRecord]) -> String {
    let items = posts
        .iter()
        .map(|post| {
            format!(
                "      <li><a href=\"{}\">{}</a> — {}</li>",
                post.url, post.title, post.date
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\n\n\n<article class=\"page type-page status-publish hentry\">\n\t<header class=\"entry-header\">\n\t\t<h1 class=\"entry-title\">{heading}</h1>\n\t</header><!-- .entry-header -->\n\n\t<div class=\"entry-content\">\n\t\t<ul>\n{items}\n\t\t</ul>\n\t</div><!-- .entry-content -->\n\n</article>\n\n"
    )
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchivePage {
    pub relative_path: String,
    pub heading: String,
    pub posts: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveReport {
    pub dry_run: bool,
    pub discovered_posts: usize,
    pub skipped_posts: Vec<String>,
    pub generated: Vec<ArchivePage>,
    pub already_present: Vec<String>,
}

pub fn generate_archives(
    paths: &ResolvedPaths,
    markers: &ArchiveMarkers,
    options: &ArchiveOptions,
) -> Result<ArchiveReport> {
    markers.validate()?;
    let template = ArchiveTemplate::load(&paths.template_path, markers)?;
    let scan = scan_posts(&paths.site_root, markers)?;
    log::debug!(
        "recorded {} posts in {} month groups",
        scan.recorded(),
        scan.groups.len()
    );

    let mut report = ArchiveReport {
        dry_run: options.dry_run,
        discovered_posts: scan.discovered,
        skipped_posts: scan.skipped,
        generated: Vec::new(),
        already_present: Vec::new(),
    };

    for (key, mut posts) in scan.groups {
        let out_dir = paths.site_root.join(&key.year).join(&key.month);
        let out_file = out_dir.join(ARCHIVE_FILENAME);
        let relative_path = format!("{}/{ARCHIVE_FILENAME}", key.relative_dir());

        if out_file.exists() {
            log::debug!("archive page already present: {relative_path}");
            report.already_present.push(relative_path);
            continue;
        }

        let heading = key.heading()?;
        sort_newest_first(&mut posts);
        let page = template.render_page(&heading, &render_article(&heading, &posts), markers);

        if !options.dry_run {
            fs::create_dir_all(&out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;
            fs::write(&out_file, page)
                .with_context(|| format!("failed to write {}", out_file.display()))?;
        }
        report.generated.push(ArchivePage {
            relative_path,
            heading,
            posts: posts.len(),
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::tempdir;

    use super::{
        ArchiveOptions, ArchiveTemplate, MonthKey, PostExtractor, PostRecord, generate_archives,
        month_name, parse_post_path, render_article, sort_newest_first,
    };
    use crate::markers::ArchiveMarkers;
    use crate::runtime::{ResolvedPaths, ValueSource};

    const TEMPLATE: &str = "<html><head><title>Archives</title></head><body>\n<main id=\"main\" class=\"site-main\">\n<p>all the archives</p>\n</main><!-- .site-main -->\n<footer>f</footer></body></html>\n";

    fn paths(root: &Path) -> ResolvedPaths {
        ResolvedPaths {
            site_root: root.to_path_buf(),
            template_path: root.join("archives").join("index.html"),
            config_path: root.join(".sitetool").join("config.toml"),
            root_source: ValueSource::Flag,
            config_source: ValueSource::Default,
        }
    }

    fn post(title: &str, datetime: &str) -> String {
        format!(
            "<article><header><h1 class=\"entry-title\">\n  {title}\n</h1></header>\n<time class=\"entry-date published\" datetime=\"{datetime}\">x</time></article>"
        )
    }

    fn write_file(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("dirs");
        fs::write(path, content).expect("write");
    }

    fn site() -> tempfile::TempDir {
        let temp = tempdir().expect("tempdir");
        write_file(temp.path(), "archives/index.html", TEMPLATE);
        temp
    }

    fn segments(path: &str) -> Vec<String> {
        path.split('/').map(str::to_string).collect()
    }

    fn record(title: &str, date: &str) -> PostRecord {
        PostRecord {
            title: title.to_string(),
            date: date.to_string(),
            url: format!("/{title}/"),
        }
    }

    #[test]
    fn split_keeps_open_tag_in_before_and_close_marker_in_after() {
        let template = ArchiveTemplate::split(TEMPLATE, &ArchiveMarkers::default()).expect("split");
        assert!(template.before.ends_with("<main id=\"main\" class=\"site-main\">"));
        assert!(!template.before.contains("all the archives"));
        assert!(template.after.starts_with("</main><!-- .site-main -->"));
        assert!(template.after.ends_with("</html>\n"));
    }

    #[test]
    fn split_fails_without_markers() {
        let markers = ArchiveMarkers::default();
        let error = ArchiveTemplate::split("<main>\n</main>", &markers).expect_err("must fail");
        assert!(error.to_string().contains("opening marker"));

        let error = ArchiveTemplate::split("<main id=\"main\" class=\"site-main\"></main>", &markers)
            .expect_err("must fail");
        assert!(error.to_string().contains("closing marker"));
    }

    #[test]
    fn month_names_cover_calendar_range() {
        assert_eq!(month_name(3), Some("March"));
        assert_eq!(month_name(1), Some("January"));
        assert_eq!(month_name(12), Some("December"));
        assert_eq!(month_name(0), None);
        assert_eq!(month_name(13), None);

        let key = MonthKey {
            year: "2019".to_string(),
            month: "03".to_string(),
        };
        assert_eq!(key.heading().expect("heading"), "March 2019");

        let bad = MonthKey {
            year: "2019".to_string(),
            month: "13".to_string(),
        };
        assert!(bad.heading().is_err());
    }

    #[test]
    fn post_path_requires_exact_shape() {
        let location =
            parse_post_path(&segments("2024/01/05/foo/index.html"), "index.html").expect("post");
        assert_eq!(location.url(), "/2024/01/05/foo/");
        assert_eq!(location.month_key().relative_dir(), "2024/01");

        for rejected in [
            "2024/01/index.html",
            "2024/01/05/index.html",
            "2024/01/05/foo/bar/index.html",
            "24/01/05/foo/index.html",
            "2024/1/05/foo/index.html",
            "2024/01/5x/foo/index.html",
            "2024/01/05/.hidden/index.html",
            "2024/01/05/foo/feed.html",
            "page/01/05/foo/index.html",
        ] {
            assert!(
                parse_post_path(&segments(rejected), "index.html").is_none(),
                "{rejected} should be rejected"
            );
        }
    }

    #[test]
    fn extractor_trims_title_and_truncates_datetime() {
        let extractor = PostExtractor::new().expect("extractor");
        let content = "<h2 class=\"entry-title\"><a href=\"/x/\">On\nThings</a> </h2>\
<time class=\"updated\" datetime=\"2020-01-01T00:00:00\"></time>\
<time class=\"entry-date published\" datetime=\"2019-03-07T12:30:00+00:00\"></time>";
        assert_eq!(
            extractor.title(content).as_deref(),
            Some("<a href=\"/x/\">On\nThings</a>")
        );
        assert_eq!(extractor.date(content).as_deref(), Some("2019-03-07"));

        assert!(extractor.title("<h1 class=\"site-title\">Blog</h1>").is_none());
        assert!(extractor.date("<time datetime=\"2019-03-07\"></time>").is_none());
    }

    #[test]
    fn sort_is_descending_and_stable_for_same_day() {
        let mut posts = vec![
            record("a", "2024-01-05"),
            record("b", "2024-01-20"),
            record("c", "2024-01-05"),
            record("d", "2024-01-20"),
        ];
        sort_newest_first(&mut posts);
        let titles: Vec<&str> = posts.iter().map(|post| post.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn render_article_lists_posts_in_given_order() {
        let article = render_article(
            "January 2024",
            &[record("Bar", "2024-01-20"), record("Foo", "2024-01-05")],
        );
        assert!(article.starts_with("\n\n\n<article class=\"page type-page status-publish hentry\">"));
        assert!(article.contains("\t\t<h1 class=\"entry-title\">January 2024</h1>\n"));
        assert!(article.contains(
            "\t\t<ul>\n      <li><a href=\"/Bar/\">Bar</a> — 2024-01-20</li>\n      <li><a href=\"/Foo/\">Foo</a> — 2024-01-05</li>\n\t\t</ul>\n"
        ));
        assert!(article.ends_with("</article>\n\n"));
    }

    #[test]
    fn generates_month_page_newest_first() {
        let site = site();
        let root = site.path();
        write_file(root, "2024/01/05/foo/index.html", &post("Foo", "2024-01-05T09:00:00"));
        write_file(root, "2024/01/20/bar/index.html", &post("Bar", "2024-01-20T18:45:00"));

        let report = generate_archives(
            &paths(root),
            &ArchiveMarkers::default(),
            &ArchiveOptions::default(),
        )
        .expect("generate");
        assert_eq!(report.discovered_posts, 2);
        assert!(report.skipped_posts.is_empty());
        assert_eq!(report.generated.len(), 1);
        assert_eq!(report.generated[0].relative_path, "2024/01/index.html");
        assert_eq!(report.generated[0].heading, "January 2024");
        assert_eq!(report.generated[0].posts, 2);

        let page = fs::read_to_string(root.join("2024/01/index.html")).expect("page");
        let bar = page
            .find("<li><a href=\"/2024/01/20/bar/\">Bar</a> — 2024-01-20</li>")
            .expect("bar listed");
        let foo = page
            .find("<li><a href=\"/2024/01/05/foo/\">Foo</a> — 2024-01-05</li>")
            .expect("foo listed");
        assert!(bar < foo);
        assert!(page.starts_with("<html><head><title>January 2024</title></head>"));
        assert!(!page.contains("<title>Archives</title>"));
        assert!(!page.contains("all the archives"));
        assert!(page.ends_with("</main><!-- .site-main -->\n<footer>f</footer></body></html>\n"));
    }

    #[test]
    fn groups_are_rendered_per_month() {
        let site = site();
        let root = site.path();
        write_file(root, "2023/12/31/eve/index.html", &post("Eve", "2023-12-31"));
        write_file(root, "2024/02/01/feb/index.html", &post("Feb", "2024-02-01"));
        write_file(root, "2024/01/05/foo/index.html", &post("Foo", "2024-01-05"));

        let report = generate_archives(
            &paths(root),
            &ArchiveMarkers::default(),
            &ArchiveOptions::default(),
        )
        .expect("generate");
        let generated: Vec<&str> = report
            .generated
            .iter()
            .map(|page| page.relative_path.as_str())
            .collect();
        assert_eq!(
            generated,
            vec!["2023/12/index.html", "2024/01/index.html", "2024/02/index.html"]
        );
        let january = fs::read_to_string(root.join("2024/01/index.html")).expect("page");
        assert!(january.contains("Foo"));
        assert!(!january.contains("Feb"));
    }

    #[test]
    fn existing_archive_page_is_never_overwritten() {
        let site = site();
        let root = site.path();
        write_file(root, "2024/01/index.html", "hand written");
        write_file(root, "2024/01/05/foo/index.html", &post("Foo", "2024-01-05"));

        let report = generate_archives(
            &paths(root),
            &ArchiveMarkers::default(),
            &ArchiveOptions::default(),
        )
        .expect("generate");
        assert!(report.generated.is_empty());
        assert_eq!(report.already_present, vec!["2024/01/index.html"]);
        assert_eq!(
            fs::read_to_string(root.join("2024/01/index.html")).expect("read"),
            "hand written"
        );
    }

    #[test]
    fn post_without_date_is_skipped_and_scan_continues() {
        let site = site();
        let root = site.path();
        write_file(
            root,
            "2024/01/03/draft/index.html",
            "<h1 class=\"entry-title\">Draft</h1>",
        );
        write_file(root, "2024/01/05/foo/index.html", &post("Foo", "2024-01-05"));

        let report = generate_archives(
            &paths(root),
            &ArchiveMarkers::default(),
            &ArchiveOptions::default(),
        )
        .expect("generate");
        assert_eq!(report.discovered_posts, 2);
        assert_eq!(report.skipped_posts, vec!["2024/01/03/draft/index.html"]);
        assert_eq!(report.generated.len(), 1);
        assert_eq!(report.generated[0].posts, 1);
        let page = fs::read_to_string(root.join("2024/01/index.html")).expect("page");
        assert!(!page.contains("Draft"));
    }

    #[test]
    fn dry_run_writes_nothing() {
        let site = site();
        let root = site.path();
        write_file(root, "2024/01/05/foo/index.html", &post("Foo", "2024-01-05"));

        let report = generate_archives(
            &paths(root),
            &ArchiveMarkers::default(),
            &ArchiveOptions { dry_run: true },
        )
        .expect("generate");
        assert!(report.dry_run);
        assert_eq!(report.generated.len(), 1);
        assert!(!root.join("2024/01/index.html").exists());
    }

    #[test]
    fn missing_template_is_fatal() {
        let temp = tempdir().expect("tempdir");
        write_file(temp.path(), "2024/01/05/foo/index.html", &post("Foo", "2024-01-05"));
        let error = generate_archives(
            &paths(temp.path()),
            &ArchiveMarkers::default(),
            &ArchiveOptions::default(),
        )
        .expect_err("must fail");
        assert!(error.to_string().contains("archive template not found"));
        assert!(!temp.path().join("2024/01/index.html").exists());
    }

    #[test]
    fn template_without_main_marker_is_fatal() {
        let temp = tempdir().expect("tempdir");
        write_file(temp.path(), "archives/index.html", "<html><main></main></html>");
        let error = generate_archives(
            &paths(temp.path()),
            &ArchiveMarkers::default(),
            &ArchiveOptions::default(),
        )
        .expect_err("must fail");
        assert!(format!("{error:#}").contains("opening marker"));
    }
}
