use clap::{Parser, Subcommand};
use poimap::{bundle, config, data, processing, server};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the feature table and emit the generated data module
    Generate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Stitch the site into one self-contained HTML file
    Bundle {
        /// Entry script, relative to the template; auto-detected when omitted
        entry: Option<String>,
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the bundled site and the feature API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;

            let records = data::load_features(&app_config.input.features)?;
            let collection = processing::decompress(&records);
            data::write_features_module(
                &app_config.input.generated_module,
                &collection,
                &app_config,
            )?;

            println!("Generation complete!");
        }
        Commands::Bundle { entry, config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            bundle::bundle_site(&app_config.bundle, entry.as_deref())?;
        }
        Commands::Serve { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;

            let records = data::load_features(&app_config.input.features)?;
            let collection = processing::decompress(&records);

            server::start_server(app_config, collection).await?;
        }
    }

    Ok(())
}
