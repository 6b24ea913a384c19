use clap::{Args, Parser, Subcommand};
use plainpress::config::{self, ConfigError, Settings, ShareButton, SortOrder};
use plainpress::generate::DefaultPresenter;
use plainpress::theme::{self, Theme};
use plainpress::{output, pipeline, watch};
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "plainpress")]
#[command(about = "Static blog generator for Markdown and HTML content")]
#[command(long_about = "\
Static blog generator for Markdown and HTML content

Every .md and .html file under the input directory becomes a page. Markdown
is rendered into the site theme; HTML files are published as written.

Content structure:

  content/
  ├── 2023-04-05-hello.md          # → hello/index.html (date taken from the name)
  ├── blog/
  │   ├── deep-dive.md             # → blog/deep-dive/index.html, tagged 'blog'
  │   └── img/diagram.png          # copied because deep-dive.md links to it
  └── tools/
      ├── index.html               # <meta name=\"keywords\" content=\"PAGE\">
      └── app.js                   # whole directory copied for PAGE html

Metadata resolution (first available wins):
  Title:   frontmatter / <title> → file name
  Created: frontmatter / <meta> → date in the path → file modification time
  Updated: frontmatter / <meta> → file modification time

Run 'plainpress gen-config' to generate a documented plainpress.toml.")]
#[command(version)]
struct Cli {
    /// Config file (a missing file means stock defaults)
    #[arg(short, long, default_value = config::CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the site once
    Build(SiteArgs),
    /// Build, serve the output and rebuild on changes
    Watch {
        #[command(flatten)]
        site: SiteArgs,
        /// Open the site in a browser
        #[arg(long)]
        open: bool,
    },
    /// Print a stock plainpress.toml with all options documented
    GenConfig,
    /// List the built-in themes
    Themes,
}

/// Flags that override the config file.
#[derive(Args, Clone, Default)]
struct SiteArgs {
    /// Content directory
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long)]
    title: Option<String>,
    /// Site description (Markdown)
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    base_url: Option<String>,
    /// Article order on the index page
    #[arg(long)]
    sort: Option<SortOrder>,
    /// Built-in theme name
    #[arg(long)]
    theme: Option<String>,
    /// Stylesheet that replaces the theme
    #[arg(long)]
    css_path: Option<PathBuf>,
    /// Script that replaces the default script.js
    #[arg(long)]
    js_path: Option<PathBuf>,
    #[arg(long)]
    favicon_path: Option<PathBuf>,
    /// HTML snippet injected into every <head>
    #[arg(long)]
    elements_top: Option<PathBuf>,
    /// HTML snippet injected at the end of every <body>
    #[arg(long)]
    elements_bottom: Option<PathBuf>,
    /// chrono strftime format for displayed dates
    #[arg(long)]
    date_format: Option<String>,
    #[arg(long)]
    index_name: Option<String>,
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    publisher: Option<String>,
    #[arg(long)]
    publisher_logo: Option<PathBuf>,
    /// Share button as 'Name|URL' or 'Name|Display|URL' (repeatable)
    #[arg(long = "share")]
    share: Vec<ShareButton>,
    /// Keep dates in output paths
    #[arg(long)]
    keep_path_dates: bool,
    /// Keep dates in titles
    #[arg(long)]
    keep_title_dates: bool,
    /// Do not turn directory names into tags
    #[arg(long)]
    no_path_tags: bool,
    #[arg(long)]
    open_in_new_tab: bool,
    /// Skip failing files and missing resources
    #[arg(long)]
    ignore_errors: bool,
    /// Clear a non-empty output directory without asking
    #[arg(short, long)]
    force: bool,
    /// Preview server port
    #[arg(long)]
    port: Option<u16>,
    /// Upper bound on worker threads
    #[arg(long)]
    max_workers: Option<usize>,
}

fn path_value(path: &Path) -> toml::Value {
    toml::Value::String(path.to_string_lossy().into_owned())
}

impl SiteArgs {
    /// The flags that were given, as a TOML table layered over the config
    /// file.
    fn overlay(&self) -> Result<toml::Value, ConfigError> {
        let mut table = toml::map::Map::new();
        let strings = [
            ("title", &self.title),
            ("description", &self.description),
            ("base_url", &self.base_url),
            ("theme", &self.theme),
            ("date_format", &self.date_format),
            ("index_name", &self.index_name),
            ("author_name", &self.author),
            ("publisher_name", &self.publisher),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                table.insert(key.into(), toml::Value::String(value.clone()));
            }
        }
        let paths = [
            ("input_path", &self.input),
            ("output_path", &self.output),
            ("custom_css", &self.css_path),
            ("custom_js", &self.js_path),
            ("custom_favicon", &self.favicon_path),
            ("elements_top", &self.elements_top),
            ("elements_bottom", &self.elements_bottom),
            ("publisher_logo", &self.publisher_logo),
        ];
        for (key, value) in paths {
            if let Some(path) = value {
                table.insert(key.into(), path_value(path));
            }
        }

        if let Some(sort) = self.sort {
            table.insert("sort".into(), toml::Value::String(sort.as_str().into()));
        }
        if !self.share.is_empty() {
            table.insert("share_buttons".into(), toml::Value::try_from(&self.share)?);
        }
        if let Some(port) = self.port {
            table.insert("port".into(), toml::Value::Integer(port.into()));
        }
        if let Some(max) = self.max_workers {
            let max = i64::try_from(max)
                .map_err(|_| ConfigError::Validation(format!("max_workers {max} is too large")))?;
            table.insert("max_workers".into(), toml::Value::Integer(max));
        }

        let switches = [
            ("remove_date_from_paths", self.keep_path_dates, false),
            ("remove_date_from_titles", self.keep_title_dates, false),
            ("extract_tags_from_paths", self.no_path_tags, false),
            ("open_in_new_tab", self.open_in_new_tab, true),
            ("ignore_errors", self.ignore_errors, true),
            ("force_overwrite", self.force, true),
        ];
        for (key, given, value) in switches {
            if given {
                table.insert(key.into(), toml::Value::Boolean(value));
            }
        }
        Ok(toml::Value::Table(table))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::Build(site) => {
            let (settings, theme) = prepare(&cli.config, &site)?;
            println!("==> Building {}", settings.input_path.display());
            let report = pipeline::build(&settings, &theme, &DefaultPresenter)?;
            output::print_build_output(&report, &settings);
            println!("==> Build complete: {}", report.output_dir.display());
        }
        Command::Watch { site, open } => {
            let (settings, theme) = prepare(&cli.config, &site)?;
            watch::run(&settings, &theme, &DefaultPresenter, open)?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Themes => {
            for name in theme::builtin_names() {
                println!("{name}");
            }
        }
    }
    Ok(())
}

/// Layer defaults, config file and flags; resolve the theme; finalize; and
/// get permission to clear a non-empty output directory.
fn prepare(config_path: &Path, site: &SiteArgs) -> Result<(Settings, Theme), Box<dyn Error>> {
    let base = config::stock_defaults_value()?;
    let flags = site.overlay()?;
    let overlay = match config::load_raw_config(config_path)? {
        Some(file) => config::merge_toml(file, flags),
        None => flags,
    };
    let mut settings = config::resolve_settings(base, Some(overlay))?;

    let theme = Theme::resolve(&settings)?;
    settings.finalize(&theme)?;

    if pipeline::needs_confirmation(&settings) {
        if !confirm_overwrite(&settings.output_path)? {
            return Err(format!(
                "output directory {} was not overwritten",
                settings.output_path.display()
            )
            .into());
        }
        settings.force_overwrite = true;
    }
    Ok((settings, theme))
}

fn confirm_overwrite(output: &Path) -> io::Result<bool> {
    print!(
        "Output directory {} is not empty. Overwrite? (y/n) ",
        output.display()
    );
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Log to stderr. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("plainpress={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}
