use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use retroreader_core::archive::Archive;
use retroreader_core::config::{config_path, load_config, security_limits_from_config, ReaderConfig};
use retroreader_core::layout::{EstimatedLayout, FrameMetrics};
use retroreader_core::navigation::{parse_toc, TableOfContents};
use retroreader_core::package::Package;
use retroreader_core::pagination::Paginator;
use retroreader_core::position::PositionToken;
use retroreader_core::progress::{emit_progress, LoadStage, ProgressEvent, ProgressHandler};
use retroreader_core::render::{render_all, BlobStore, DataUriStore, ImageBindings, RenderedSurface};
use retroreader_core::settings::{FontFamily, ReaderSettings};

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "retroreader")]
#[command(about = "Inspect, render and paginate EPUBs the way the web reader does")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show package metadata and structure
    Info {
        /// Input file
        #[arg(required = true)]
        input: String,
    },

    /// Print the table of contents
    Toc {
        /// Input file
        #[arg(required = true)]
        input: String,
    },

    /// Render every chapter into one sanitized HTML page
    Render {
        /// Input file
        #[arg(required = true)]
        input: String,

        /// Output HTML file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Estimate column pagination for a viewport
    Paginate {
        /// Input file
        #[arg(required = true)]
        input: String,

        /// Viewport width in px
        #[arg(long)]
        width: Option<f64>,

        /// Viewport height in px
        #[arg(long)]
        height: Option<f64>,

        /// Font size in px (clamped to 12-32)
        #[arg(long)]
        font_size: Option<u32>,

        /// Font family (serif, sans, mono)
        #[arg(long)]
        font: Option<String>,

        /// Page to open, or a saved position token (page:N:T)
        #[arg(long)]
        page: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Initialize default config file
    Init,
    /// Show current configuration
    Show,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = load_config();
    let result = match &cli.command {
        Commands::Info { input } => run_info(input, &config, cli.json),
        Commands::Toc { input } => run_toc(input, &config, cli.json),
        Commands::Render { input, output } => {
            run_render(input, output.as_deref(), &config, cli.json)
        }
        Commands::Paginate {
            input,
            width,
            height,
            font_size,
            font,
            page,
        } => {
            let opts = PaginateOptions {
                width: width.unwrap_or(config.display.width),
                height: height.unwrap_or(config.display.height),
                font_size: *font_size,
                font: font.as_deref(),
                page: page.as_deref(),
            };
            run_paginate(input, &opts, &config, cli.json)
        }
        Commands::Config { action } => run_config(action, cli.json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Progress bar fed by render progress events.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{bar:30}] {pos}/{len}") {
            bar.set_style(style.progress_chars("=> "));
        }
        Self { bar }
    }
}

impl ProgressHandler for BarProgress {
    fn on_progress(&self, event: ProgressEvent) {
        if let Some(total) = event.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(event.current);
        self.bar.set_message(event.stage.to_string());
    }
}

struct OpenedBook {
    archive: Archive,
    package: Package,
}

fn open_book(
    input: &str,
    config: &ReaderConfig,
) -> Result<OpenedBook, Box<dyn std::error::Error + Send + Sync>> {
    let path = Path::new(input);
    if !path.exists() {
        return Err(format!("Input file not found: {}", path.display()).into());
    }
    let bytes = std::fs::read(path)?;
    tracing::debug!("Read {} ({} bytes)", path.display(), bytes.len());
    let limits = security_limits_from_config(&config.security);
    let archive = Archive::from_bytes(&bytes, &limits)?;
    let package = Package::open(&archive)?;
    Ok(OpenedBook { archive, package })
}

fn render_book(
    book: &OpenedBook,
    progress: &BarProgress,
) -> (RenderedSurface, ImageBindings, DataUriStore) {
    let mut bindings = ImageBindings::default();
    let mut store = DataUriStore::default();
    let surface = render_all(
        &book.archive,
        &book.package,
        &mut bindings,
        &mut store,
        Some(progress),
    );
    (surface, bindings, store)
}

fn run_info(input: &str, config: &ReaderConfig, json: bool) -> CliResult {
    let book = open_book(input, config)?;
    let toc = parse_toc(&book.archive, &book.package);
    let package = &book.package;

    if json {
        let info = serde_json::json!({
            "metadata": package.metadata,
            "descriptor": package.descriptor_path,
            "manifest_items": package.manifest.len(),
            "spine_items": package.spine.len(),
            "toc_source": toc.source,
            "toc_entries": toc.entries.len(),
            "archive_entries": book.archive.len(),
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        if let Some(t) = &package.metadata.title {
            println!("Title: {}", t);
        }
        if let Some(a) = &package.metadata.author {
            println!("Author: {}", a);
        }
        if let Some(l) = &package.metadata.language {
            println!("Language: {}", l);
        }
        println!("Descriptor: {}", package.descriptor_path);
        println!("Manifest items: {}", package.manifest.len());
        println!("Spine items: {}", package.spine.len());
        println!("TOC: {} entries ({:?})", toc.entries.len(), toc.source);
    }
    Ok(())
}

fn print_toc(toc: &TableOfContents) {
    for entry in &toc.entries {
        let indent = if entry.is_sub_level { "    " } else { "" };
        match entry.spine_index {
            Some(i) => println!("{}{} -> #{}", indent, entry.label, i),
            None => println!("{}{} -> ? ({})", indent, entry.label, entry.href),
        }
    }
}

fn run_toc(input: &str, config: &ReaderConfig, json: bool) -> CliResult {
    let book = open_book(input, config)?;
    let toc = parse_toc(&book.archive, &book.package);
    if json {
        println!("{}", serde_json::to_string_pretty(&toc)?);
    } else {
        print_toc(&toc);
    }
    Ok(())
}

fn run_render(input: &str, output: Option<&str>, config: &ReaderConfig, json: bool) -> CliResult {
    let book = open_book(input, config)?;
    let progress = BarProgress::new(json || output.is_none());
    let (surface, bindings, mut store) = render_book(&book, &progress);
    progress.bar.finish_and_clear();

    let settings = config.display.settings();
    let title = book.package.metadata.title.as_deref().unwrap_or("Untitled");
    let page = standalone_page(title, &surface, &settings);

    match output {
        Some(out) => {
            std::fs::write(out, &page)?;
            if json {
                let summary = serde_json::json!({
                    "output": out,
                    "chapters": surface.len(),
                    "spine_items": book.package.spine.len(),
                    "images": bindings.len(),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "Rendered {} of {} chapters ({} images) -> {}",
                    surface.len(),
                    book.package.spine.len(),
                    bindings.len(),
                    out
                );
            }
        }
        None => print!("{}", page),
    }
    store.release_all();
    Ok(())
}

/// Theme colours of the reader, applied as a body class.
const THEME_CSS: &str = "body.theme-light{background:#f4f1ea;color:#222}\
body.theme-dark{background:#111;color:#ddd}\
body.theme-sepia{background:#f4ecd8;color:#5b4636}\
body.theme-amber{background:#1a1000;color:#ffb000}\
body.theme-green{background:#001a00;color:#33ff33}\
.chapter-separator{height:0;break-after:column}\
img{max-width:100%;height:auto}";

fn standalone_page(title: &str, surface: &RenderedSurface, settings: &ReaderSettings) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title>\
         <style>{}body{{font-family:{};font-size:{}px;line-height:1.6}}</style></head>\
         <body class=\"theme-{}\">{}</body></html>\n",
        escape_text(title),
        THEME_CSS,
        settings.font_family.css_stack(),
        settings.font_size,
        settings.theme.as_str(),
        surface.to_html()
    )
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

struct PaginateOptions<'a> {
    width: f64,
    height: f64,
    font_size: Option<u32>,
    font: Option<&'a str>,
    page: Option<&'a str>,
}

fn run_paginate(
    input: &str,
    opts: &PaginateOptions<'_>,
    config: &ReaderConfig,
    json: bool,
) -> CliResult {
    let book = open_book(input, config)?;
    let progress = BarProgress::new(json);
    let (surface, _, _) = render_book(&book, &progress);
    let toc = parse_toc(&book.archive, &book.package);

    let mut settings = config.display.settings();
    if let Some(size) = opts.font_size {
        settings.font_size = retroreader_core::settings::clamp_font_size(size as i64);
    }
    if let Some(font) = opts.font {
        settings.font_family = font.parse::<FontFamily>()?;
    }

    let mut frame = FrameMetrics::new(opts.width, opts.height);
    frame.padding_left = config.display.padding;
    frame.padding_right = config.display.padding;
    let mut engine = EstimatedLayout::new(frame);
    let mut paginator = Paginator::new(config.reader.column_gap);
    emit_progress(Some(&progress), LoadStage::Paginate, 0, None, None);
    paginator.recalculate(&mut engine, &surface, &settings);
    progress.bar.finish_and_clear();

    let view = match opts.page {
        Some(p) => match PositionToken::parse(p) {
            Some(token) => paginator.go_to_page(token.rescale(paginator.total_pages()) as i64),
            None => paginator.go_to_page(p.parse::<i64>()?),
        },
        None => paginator.view(),
    };

    let chapters: Vec<_> = surface
        .chapters
        .iter()
        .filter_map(|c| {
            let page = paginator.page_of_spine_item(c.spine_index)?;
            let label = toc
                .entry_for_spine(c.spine_index)
                .map(|e| e.label.clone())
                .unwrap_or_else(|| c.source_href.clone());
            Some((c.spine_index, page, label))
        })
        .collect();
    let token = PositionToken::new(view.page, view.total_pages);

    if json {
        let out = serde_json::json!({
            "settings": settings,
            "state": paginator.state(),
            "view": view,
            "position": token.to_string(),
            "chapters": chapters
                .iter()
                .map(|(spine, page, label)| serde_json::json!({
                    "spine_index": spine,
                    "page": page,
                    "label": label,
                }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "{} pages at {}x{} ({} {}px)",
            view.total_pages,
            opts.width,
            opts.height,
            settings.font_family.as_str(),
            settings.font_size
        );
        for (spine, page, label) in &chapters {
            println!("  p.{:<5} #{:<3} {}", page, spine, label);
        }
        println!(
            "Page {} of {} ({}%), {}, position {}",
            view.page,
            view.total_pages,
            view.percentage,
            view.transform(),
            token
        );
    }
    Ok(())
}

fn run_config(action: &ConfigAction, json: bool) -> CliResult {
    match action {
        ConfigAction::Init => {
            let path = config_path().ok_or("Could not determine config directory")?;
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let toml = toml::to_string_pretty(&ReaderConfig::default())?;
            std::fs::write(&path, toml)?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Show => {
            let cfg = load_config();
            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else {
                println!("{}", toml::to_string_pretty(&cfg)?);
            }
        }
    }
    Ok(())
}
