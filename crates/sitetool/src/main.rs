use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use sitetool_core::archive::{
    ArchiveOptions, ArchiveReport, generate_archives, parse_post_path, post_files,
};
use sitetool_core::config::load_config;
use sitetool_core::filesystem::{html_files, relative_segments};
use sitetool_core::runtime::{
    PathOverrides, ResolutionContext, ResolvedPaths, ensure_site_root, init_config,
    inspect_runtime, resolve_paths,
};
use sitetool_core::sidebar::{SidebarOptions, SidebarPlan, SidebarReport, rewrite_documents};

#[derive(Debug, Parser)]
#[command(
    name = "sitetool",
    version,
    about = "Batch edits for a static-site export: sidebar widgets and monthly archive pages"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    site_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    site_root: Option<PathBuf>,
    config: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            site_root: cli.site_root.clone(),
            config: cli.config.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Write a config file holding the default marker vocabulary")]
    Init(InitArgs),
    #[command(about = "Show resolved paths and document counts")]
    Status,
    #[command(about = "Rewrite sidebar widgets in every HTML document")]
    Sidebar(SidebarArgs),
    #[command(about = "Generate missing monthly archive pages")]
    Archives(ArchivesArgs),
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long, help = "Overwrite an existing config file")]
    force: bool,
}

#[derive(Debug, Args)]
struct SidebarArgs {
    #[arg(long, help = "Report changes without writing documents")]
    dry_run: bool,
    #[arg(long, help = "Print a unified diff for every changed document")]
    diff: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug, Args)]
struct ArchivesArgs {
    #[arg(long, help = "Report pages that would be generated without writing them")]
    dry_run: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Init(args)) => run_init(&runtime, args),
        Some(Commands::Status) => run_status(&runtime),
        Some(Commands::Sidebar(args)) => run_sidebar(&runtime, args),
        Some(Commands::Archives(args)) => run_archives(&runtime, args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn run_init(runtime: &RuntimeOptions, args: InitArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let report = init_config(&paths, args.force)?;

    if report.wrote_config {
        println!("Wrote config: {}", normalize_path(&report.config_path));
    } else {
        println!(
            "Config already exists: {} (use --force to overwrite)",
            normalize_path(&report.config_path)
        );
    }
    print_diagnostics(runtime, &paths, OutputFormat::Text);
    Ok(())
}

fn run_status(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let status = inspect_runtime(&paths);

    println!("runtime status");
    println!("site_root: {}", normalize_path(&paths.site_root));
    println!("site_root_exists: {}", format_flag(status.site_root_exists));
    println!("template_path: {}", normalize_path(&paths.template_path));
    println!("template_exists: {}", format_flag(status.template_exists));
    println!("config_path: {}", normalize_path(&paths.config_path));
    println!("config_exists: {}", format_flag(status.config_exists));

    if status.site_root_exists {
        let config = load_config(&paths.config_path)?;
        let markers = config.archive_markers();
        let html = html_files(&paths.site_root)?;
        let mut posts = 0usize;
        for path in post_files(&paths.site_root, &markers.post_filename)? {
            let segments = relative_segments(&paths.site_root, &path)?;
            if parse_post_path(&segments, &markers.post_filename).is_some() {
                posts += 1;
            }
        }
        println!("scan.html_documents: {}", html.len());
        println!("scan.post_documents: {posts}");
    }

    if !status.warnings.is_empty() {
        println!("warnings:");
        for warning in &status.warnings {
            println!("  - {warning}");
        }
    }
    print_diagnostics(runtime, &paths, OutputFormat::Text);
    Ok(())
}

fn run_sidebar(runtime: &RuntimeOptions, args: SidebarArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    ensure_site_root(&paths)?;
    let markers = load_config(&paths.config_path)?.sidebar_markers();
    let plan = SidebarPlan::from_markers(&markers)?;
    let files = html_files(&paths.site_root)?;

    if args.format == OutputFormat::Text {
        println!("sidebar rewrite");
        println!("site_root: {}", normalize_path(&paths.site_root));
        println!("mode: {}", format_mode(args.dry_run));
        println!("plan: {}", plan.edit_names().join(", "));
        println!("sidebar.discovered: {}", files.len());
    }

    let report = rewrite_documents(
        &paths.site_root,
        &files,
        &plan,
        &SidebarOptions {
            dry_run: args.dry_run,
            capture_diff: args.diff,
        },
    );

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_sidebar_report(&report),
    }
    print_diagnostics(runtime, &paths, args.format);

    if !report.failures.is_empty() {
        bail!(
            "{} of {} documents could not be rewritten",
            report.failures.len(),
            report.discovered
        );
    }
    Ok(())
}

fn print_sidebar_report(report: &SidebarReport) {
    for change in &report.modified {
        println!(
            "sidebar.changed: {} ({})",
            change.relative_path,
            change.applied.join(", ")
        );
        if let Some(diff) = &change.diff {
            print!("{diff}");
        }
    }
    println!("sidebar.modified: {}", report.modified.len());
    println!("sidebar.unchanged: {}", report.unchanged);
    println!("sidebar.failed: {}", report.failures.len());
    for failure in &report.failures {
        println!("sidebar.failure: {}: {}", failure.relative_path, failure.error);
    }
}

fn run_archives(runtime: &RuntimeOptions, args: ArchivesArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    ensure_site_root(&paths)?;
    let markers = load_config(&paths.config_path)?.archive_markers();

    let report = generate_archives(
        &paths,
        &markers,
        &ArchiveOptions {
            dry_run: args.dry_run,
        },
    )?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("archive generation");
            println!("site_root: {}", normalize_path(&paths.site_root));
            println!("template_path: {}", normalize_path(&paths.template_path));
            println!("mode: {}", format_mode(report.dry_run));
            print_archive_report(&report);
        }
    }
    print_diagnostics(runtime, &paths, args.format);
    Ok(())
}

fn print_archive_report(report: &ArchiveReport) {
    println!("archives.discovered_posts: {}", report.discovered_posts);
    for skipped in &report.skipped_posts {
        println!("archives.skip: {skipped} (no title/date)");
    }
    println!("archives.skipped_posts: {}", report.skipped_posts.len());
    for page in &report.generated {
        println!(
            "archives.page: {} ({}, {} posts)",
            page.relative_path, page.heading, page.posts
        );
    }
    println!("archives.generated: {}", report.generated.len());
    println!("archives.already_present: {}", report.already_present.len());
}

fn resolve_runtime_paths(runtime: &RuntimeOptions) -> Result<ResolvedPaths> {
    dotenvy::dotenv().ok();

    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        site_root: runtime.site_root.clone(),
        config: runtime.config.clone(),
    };

    let initial = resolve_paths(&context, &overrides)?;
    let site_env = initial.site_root.join(".env");
    if site_env.exists() {
        let _ = dotenvy::from_path_override(&site_env);
    }

    resolve_paths(&context, &overrides)
}

/// JSON output keeps stdout parseable, so diagnostics go to stderr there.
fn print_diagnostics(runtime: &RuntimeOptions, paths: &ResolvedPaths, format: OutputFormat) {
    if !runtime.diagnostics {
        return;
    }
    match format {
        OutputFormat::Text => println!("\n[diagnostics]\n{}", paths.diagnostics()),
        OutputFormat::Json => eprintln!("[diagnostics]\n{}", paths.diagnostics()),
    }
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_mode(dry_run: bool) -> &'static str {
    if dry_run { "dry-run" } else { "write" }
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
