use clap::{Parser, Subcommand};
use reddit_mosaic::compose::CommandCompositor;
use reddit_mosaic::config::{self, ListingConfig, MosaicConfig, Preset};
use reddit_mosaic::download::HttpFetcher;
use reddit_mosaic::feed::RedditClient;
use reddit_mosaic::pipeline::{PipelineController, Track};
use reddit_mosaic::types::{Category, TimeWindow};
use reddit_mosaic::workspace::Workspace;
use reddit_mosaic::{output, source, tiles};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Listing flags shared by commands that read the community's posts.
#[derive(clap::Args, Clone)]
struct ListingArgs {
    /// Listing preset (overrides [listing] preset)
    #[arg(long, value_enum)]
    preset: Option<Preset>,
    /// Ranked listing to scan; switches to a custom listing
    #[arg(long, value_enum)]
    category: Option<Category>,
    /// Time window for top and controversial listings
    #[arg(long = "time", value_enum)]
    time_window: Option<TimeWindow>,
    /// Maximum number of posts to scan
    #[arg(long)]
    limit: Option<usize>,
    /// Minimum post score for a tile
    #[arg(long)]
    min_score: Option<i64>,
}

impl ListingArgs {
    /// Apply the flags on top of the loaded listing config.
    ///
    /// Any explicit listing field turns the listing into a custom one seeded
    /// from whatever the preset would have used.
    fn apply(&self, listing: &mut ListingConfig) {
        if let Some(preset) = self.preset {
            listing.preset = preset;
        }
        let customized = self.category.is_some()
            || self.time_window.is_some()
            || self.limit.is_some()
            || self.min_score.is_some();
        if customized {
            let base = listing.spec();
            listing.preset = Preset::Custom;
            listing.category = self.category.unwrap_or(base.category);
            listing.time_window = self.time_window.unwrap_or(base.time_window);
            listing.limit = self.limit.unwrap_or(base.limit);
            listing.min_score = self.min_score.unwrap_or(base.min_score);
        }
    }
}

#[derive(Parser)]
#[command(name = "reddit-mosaic")]
#[command(about = "Builds a photo mosaic of a subreddit from its own posts")]
#[command(long_about = "\
Builds a photo mosaic of a subreddit from its own posts

The community's header image (or banner, or icon) is the picture to
approximate. Its best-scored image posts become the tiles. Everything is
staged under the workspace root:

  <workspace>/
  ├── img_def.png      # Default source image, used when no remote one works
  ├── img_src/         # Source image
  ├── img_in/          # Tiles: 0.jpg, 1.png, ...
  └── img_out/         # request.json for the compositor, img_out.png

The mosaic itself is built by an external compositor program that receives
img_out/request.json as its last argument.

Run 'reddit-mosaic gen-config' to generate a documented mosaic.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Workspace root (overrides [workspace] root)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: source + tiles → config → compositor
    Make {
        /// Community name, with or without the r/ prefix
        community: String,
        #[command(flatten)]
        listing: ListingArgs,
    },
    /// Resolve and print the community's source image
    Source {
        community: String,
    },
    /// Print the tile candidates of the community's listing
    Collect {
        community: String,
        #[command(flatten)]
        listing: ListingArgs,
    },
    /// Validate the config and print the resolved settings
    Check,
    /// Print a stock mosaic.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let mut config = config::load_config(&cli.config)?;
    if let Some(root) = &cli.workspace {
        config.workspace.root = root.clone();
    }
    if let Command::Make { listing, .. } | Command::Collect { listing, .. } = &cli.command {
        listing.apply(&mut config.listing);
    }
    config.validate()?;
    let workspace = Workspace::from_config(&config.workspace);

    match &cli.command {
        Command::Make { community, .. } => make(community, &config, workspace)?,
        Command::Source { community } => {
            let feed = RedditClient::new(&config.credentials, config.download.timeout())?;
            let resolution = source::resolve_source(&feed, community, workspace.default_asset());
            output::print_resolution(&resolution);
        }
        Command::Collect { community, .. } => {
            let feed = RedditClient::new(&config.credentials, config.download.timeout())?;
            let collection = tiles::collect_candidates(&feed, community, &config.listing.spec())?;
            output::print_collection(&collection);
        }
        Command::Check => {
            println!("==> Checking {}", cli.config.display());
            output::print_check_output(&config, &workspace);
            println!("==> Config is valid");
        }
        Command::GenConfig => {}
    }

    Ok(())
}

fn make(
    community: &str,
    config: &MosaicConfig,
    workspace: Workspace,
) -> Result<(), Box<dyn std::error::Error>> {
    let feed = RedditClient::new(&config.credentials, config.download.timeout())?;
    let fetcher = HttpFetcher::new(&config.credentials.user_agent, config.download.timeout())?;
    let compositor =
        CommandCompositor::new(config.compositor.program.clone(), config.compositor.args.clone());

    println!("==> Building mosaic of r/{community}");
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_pipeline_event(&event) {
                println!("{}", line);
            }
        }
    });

    let mut controller = PipelineController::new(
        community,
        config.listing.spec(),
        workspace,
        feed,
        fetcher,
        compositor,
    )
    .with_composition(config.composition.clone())
    .with_events(tx);
    let result = controller.make();
    let statuses = [Track::Source, Track::Tiles, Track::Config].map(|t| (t, controller.status(t)));
    // Dropping the controller closes the event channel so the printer can finish.
    drop(controller);
    printer
        .join()
        .map_err(|_| "output printer thread panicked")?;

    match result {
        Ok(target) => {
            println!("==> Mosaic complete: {}", target.display());
            Ok(())
        }
        Err(err) => {
            output::print_track_summary(&statuses);
            Err(err.into())
        }
    }
}

/// Diagnostics go to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
