pub mod config;
pub mod data;
pub mod render;
pub mod types;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the choropleth map to a PNG
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Render { config } => {
            println!("Rendering map with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            // 1. Load Boundaries
            let areas = data::load_boundaries(&app_config.input.boundaries)?;

            // 2. Load Table
            let table = data::load_table(&app_config.input.data_csv, &app_config.input.key_column)?;

            // 3. Render Figure
            let figure = render::render(
                &table,
                &app_config.map.variable,
                app_config.map.join,
                &app_config.map.title,
                &app_config.map.caption,
                &areas,
            )?;

            // 4. Save (the renderer itself writes nothing)
            if let Some(parent) = app_config.output.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).context("Failed to create output directory")?;
                }
            }
            figure
                .save(&app_config.output.path)
                .with_context(|| format!("Failed to save figure: {:?}", app_config.output.path))?;

            println!("Saved map to {:?}", app_config.output.path);
        }
    }

    Ok(())
}
