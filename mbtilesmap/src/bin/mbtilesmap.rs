use std::io::Write as _;
use std::path::{Path, PathBuf};

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Parser, Subcommand};
use futures::StreamExt as _;
use log::error;
use mbtilesmap::{Config, MissingTilePolicy, StoreInfo, TilePayload, TileService};
use size_format::SizeFormatterBinary;
use url::Url;

/// Defines the styles used for the CLI help output.
const HELP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Blue.on_default().bold())
    .usage(AnsiColor::Blue.on_default().bold())
    .literal(AnsiColor::White.on_default())
    .placeholder(AnsiColor::Green.on_default());

const DEFAULT_BASE_URL: &str = "http://localhost:8000/";

#[derive(Parser, PartialEq, Debug)]
#[command(
    version,
    name = "mbtilesmap",
    about = "Browse catalogs of MBTiles files and read their tiles, grids and TileJSON",
    after_help = "Use RUST_LOG environment variable to control logging level, e.g. RUST_LOG=debug or RUST_LOG=mbtilesmap=debug. See https://docs.rs/env_logger/latest/env_logger/index.html#enabling-logging for more information.",
    styles = HELP_STYLES
)]
pub struct Args {
    #[command(flatten)]
    config: ConfigArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, PartialEq, Debug, Default)]
struct ConfigArgs {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Catalog directories separated by ':'. The first one is the default catalog.
    #[arg(short, long)]
    root: Option<String>,
    /// Extension of `MBTiles` files
    #[arg(long)]
    extension: Option<String>,
    /// What to output when a store has no tile at the requested coordinate
    #[arg(long, value_enum)]
    missing_tile: Option<MissingTilePolicy>,
}

#[derive(Subcommand, PartialEq, Debug)]
enum Commands {
    /// List the configured catalogs
    #[command(name = "catalogs")]
    Catalogs,
    /// List valid `MBTiles` files with their zoom range and size
    #[command(name = "list", alias = "ls")]
    List {
        /// Only list this catalog
        #[arg(long)]
        catalog: Option<String>,
    },
    /// Print the TileJSON document of a tileset
    #[command(name = "meta", alias = "tilejson")]
    Meta {
        /// Tileset id, e.g. `world` for `world.mbtiles`
        id: String,
        #[arg(long)]
        catalog: Option<String>,
        /// URL that tile and grid URL templates are relative to
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: Url,
        /// Wrap the document into this JSONP callback
        #[arg(long)]
        callback: Option<String>,
    },
    /// Write a single tile, using XYZ tile numbering
    #[command(name = "tile")]
    Tile {
        id: String,
        z: u8,
        x: u32,
        y: u32,
        #[arg(long)]
        catalog: Option<String>,
        /// Output file, stdout if not set
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a UTF-Grid, using XYZ tile numbering
    #[command(name = "grid")]
    Grid {
        id: String,
        z: u8,
        x: u32,
        y: u32,
        #[arg(long)]
        catalog: Option<String>,
        /// Wrap the grid into this JSONP callback
        #[arg(long)]
        callback: Option<String>,
    },
    /// Write the tile at the center of a tileset
    #[command(name = "preview")]
    Preview {
        id: String,
        #[arg(long)]
        catalog: Option<String>,
        /// Output file, stdout if not set
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the center, zoom levels and center tile of a tileset
    #[command(name = "center")]
    Center {
        id: String,
        #[arg(long)]
        catalog: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let env = env_logger::Env::default().default_filter_or("mbtilesmap=info");
    env_logger::Builder::from_env(env)
        .format_indent(None)
        .format_module_path(false)
        .format_target(false)
        .format_timestamp(None)
        .init();

    if let Err(err) = main_int().await {
        error!("{err}");
        std::process::exit(1);
    }
}

async fn main_int() -> anyhow::Result<()> {
    let args = Args::parse();
    let service = TileService::new(load_config(args.config)?)?;

    match args.command {
        Commands::Catalogs => {
            let default = service.default_catalog();
            for root in service.catalogs() {
                let marker = if root.name == default { '*' } else { ' ' };
                println!("{marker} {}\t{}", root.name, root.path.display());
            }
            if let Some(guess) = service.default_catalog_guess().await? {
                println!("Suggested catalog: {guess}");
            }
        }
        Commands::List { catalog } => {
            let mut stores = service.list(catalog.as_deref())?;
            while let Some(mut store) = stores.next().await {
                match store.info().await {
                    Ok(info) => println!("{}", format_info(&info)),
                    Err(err) => error!("Unable to read {store}: {err}"),
                }
                store.close().await?;
            }
        }
        Commands::Meta {
            id,
            catalog,
            base_url,
            callback,
        } => {
            if callback.is_some() {
                let payload = service
                    .tilejson_payload(&id, catalog.as_deref(), &base_url, callback.as_deref())
                    .await?;
                write_payload(&payload, None)?;
                println!();
            } else {
                let tj = service.tilejson(&id, catalog.as_deref(), &base_url).await?;
                println!("{}", serde_json::to_string_pretty(&tj)?);
            }
        }
        Commands::Tile {
            id,
            z,
            x,
            y,
            catalog,
            output,
        } => {
            let payload = service.tile(&id, catalog.as_deref(), z, x, y).await?;
            write_payload(&payload, output.as_deref())?;
        }
        Commands::Grid {
            id,
            z,
            x,
            y,
            catalog,
            callback,
        } => {
            let payload = service
                .grid(&id, catalog.as_deref(), z, x, y, callback.as_deref())
                .await?;
            write_payload(&payload, None)?;
            println!();
        }
        Commands::Preview {
            id,
            catalog,
            output,
        } => {
            let payload = service.preview(&id, catalog.as_deref()).await?;
            write_payload(&payload, output.as_deref())?;
        }
        Commands::Center { id, catalog } => {
            let mut store = service.open(&id, catalog.as_deref())?;
            let center = store.center().await?;
            let levels = store.zoom_levels().await?.to_vec();
            let tile = store.center_tile().await?;
            store.close().await?;
            println!(
                "Center: {},{} at zoom {}",
                center.longitude, center.latitude, center.zoom
            );
            println!("Zoom levels: {levels:?}");
            println!("Center tile: {tile}");
        }
    }

    Ok(())
}

fn load_config(args: ConfigArgs) -> anyhow::Result<Config> {
    let mut cfg = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(root) = args.root {
        cfg.root = root;
    }
    if let Some(extension) = args.extension {
        cfg.extension = extension;
    }
    if let Some(missing_tile) = args.missing_tile {
        cfg.missing_tile = missing_tile;
    }
    cfg.finalize()?;
    Ok(cfg)
}

fn format_info(info: &StoreInfo) -> String {
    let zooms = match (info.minzoom, info.maxzoom) {
        (Some(min), Some(max)) => format!("z{min}-{max}"),
        _ => "no tiles".to_string(),
    };
    let size = SizeFormatterBinary::new(info.filesize);
    let catalog = info.catalog.as_deref().unwrap_or_default();
    format!(
        "{catalog}/{}\t{}\t{zooms}\t{size:.2}B",
        info.id, info.name
    )
}

fn write_payload(payload: &TilePayload, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => std::fs::write(path, &payload.data)?,
        None => std::io::stdout().write_all(&payload.data)?,
    }
    Ok(())
}
