use clap::{Parser, Subcommand};
use simple_harvest::collect::{Collector, Limits};
use simple_harvest::download::HttpDownloader;
use simple_harvest::identity::IdentityPool;
use simple_harvest::pipeline::{Category, Pipeline};
use simple_harvest::render::ChromeRenderer;
use simple_harvest::{config, output};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "simple-harvest")]
#[command(about = "Collect per-category image datasets from an image search")]
#[command(long_about = "\
Collect per-category image datasets from an image search

Each category name is searched as-is. Result pages are walked one at a time
in a fresh headless Chrome, each with a proxy and user agent picked from the
identity lists, until the quota of unique full-size image URLs is reached or a
page limit is hit. The images are then downloaded in collection order.

Project structure:

  project/
  ├── config.toml          # Optional; categories, quota, selectors, limits
  ├── proxy_list.txt       # Optional; one proxy per line
  ├── user_agent.txt       # Optional; one user agent per line
  └── dataset/
      ├── polar bear/
      │   ├── 0000.jpg
      │   └── 0001.jpg
      └── brown bear/

Diagnostics go to stderr; set RUST_LOG=debug for per-thumbnail detail.

Run 'simple-harvest gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Project directory holding config.toml and the identity lists
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Collect and download every configured category (the default)
    Run,
    /// Validate config and show the identity pool without harvesting
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&cli.root)?,
        Command::Check => {
            println!("==> Checking {}", cli.root.display());
            let config = config::load_config(&cli.root)?;
            let identities = IdentityPool::load(&cli.root, &config.identity)?;
            let config_file = cli.root.join("config.toml");
            let loaded = config_file.exists().then_some(config_file.as_path());
            output::print_check_output(&config, &identities, &cli.root, loaded);
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn run(root: &Path) -> Result<(), Box<dyn Error>> {
    let config = config::load_config(root)?;
    let identities = IdentityPool::load(root, &config.identity)?;
    init_thread_pool(&config.download);

    let renderer = ChromeRenderer::new(config.browser.clone());
    let downloader = HttpDownloader::new(&config.download)?;
    let collector = Collector::new(
        &renderer,
        &identities,
        &config.search,
        Limits::from_config(&config.limits),
    );
    let pipeline = Pipeline::new(collector, &downloader);
    let categories = Category::from_config(&config, root);

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_event(&event);
        }
    });
    let result = pipeline.run(&categories, Some(tx));
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;

    output::print_summary(&result?);
    Ok(())
}

/// Route `tracing` diagnostics to stderr, `warn` and above unless `RUST_LOG`
/// says otherwise.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool used for downloads.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(download: &config::DownloadConfig) {
    let threads = config::effective_workers(download);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
