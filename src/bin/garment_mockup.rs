//! Command-line front end: exports saved designs and inspects background rules.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use garment_mockup::{
    DefaultFetcher, DesignState, DesignerConfig, ExportCompositor, FontBook, GarmentColor, GarmentRenderer, View,
};

#[derive(Parser)]
#[command(name = "garment-mockup", version, about = "Render garment design mockups")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Render every view of a saved design and write the ZIP archive.
    Export {
        /// Design document (JSON).
        #[arg(value_name = "DESIGN")]
        design: PathBuf,

        /// Directory garment images, fonts and relative assets are read from.
        #[arg(long, value_name = "DIR", default_value = ".")]
        assets: PathBuf,

        /// Session configuration (JSON). Defaults apply when omitted.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Output path (default: the configured archive name in the current directory).
        #[arg(long, value_name = "ZIP")]
        out: Option<PathBuf>,
    },

    /// Print the background chosen for a view and garment color.
    Resolve {
        view: View,
        color: GarmentColor,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,garment_mockup={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Export {
            design,
            assets,
            config,
            out,
        } => {
            let config = match config {
                Some(path) => DesignerConfig::load(path)?,
                None => DesignerConfig::default(),
            };
            let state = DesignState::load(&design)?;

            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
            runtime.block_on(async {
                let fetcher = Arc::new(DefaultFetcher::new().with_asset_root(assets));
                let mut fonts = FontBook::new(config.fonts.clone());
                for family in text_families(&state) {
                    fonts.ensure(&family, &*fetcher).await;
                }

                let compositor = ExportCompositor::new(&config, fetcher, fonts.database());
                let archive = compositor.export(&state).await?;
                let path = match out {
                    Some(path) => {
                        archive.save_to(&path)?;
                        path
                    }
                    None => archive.save_in(".")?,
                };

                for view in &archive.failed_views {
                    error!(%view, "View could not be rendered");
                }
                info!(path = %path.display(), entries = archive.entries.len(), "Wrote archive");
                Ok::<(), Box<dyn std::error::Error>>(())
            })
        }
        Command::Resolve { view, color } => {
            let config = DesignerConfig::default();
            let background = GarmentRenderer::new(config.garment).resolve(view, color);
            println!("view:   {}", background.view);
            println!("asset:  {}", background.asset);
            println!("width:  {}", background.scaled_width);
            println!("anchor: {}, {}", background.anchor.0, background.anchor.1);
            match background.tint {
                Some(tint) => println!("tint:   {} (multiply)", tint.to_hex()),
                None => println!("tint:   none"),
            }
            Ok(())
        }
    }
}

/// Font families named by text records anywhere in the design.
fn text_families(state: &DesignState) -> Vec<String> {
    let mut families: Vec<String> = state
        .views
        .values()
        .flat_map(|view| view.records.iter())
        .filter_map(|record| record.font_family.clone())
        .collect();
    families.sort();
    families.dedup();
    families
}
