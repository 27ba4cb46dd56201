//! Point d'entrée CLI pour landuse-pg

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::{Commands, DatabaseArgs};

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Charger un shapefile d'occupation du sol dans PostGIS et le cartographier
#[derive(Parser)]
#[command(name = "landuse-pg")]
#[command(author, version)]
#[command(about = "Load a land-use shapefile into PostGIS and serve a filtered map")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Preset (andalucia) ou fichier JSON de configuration
    #[arg(long, default_value = "andalucia", global = true)]
    config: String,

    #[command(flatten)]
    db: DatabaseArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Load {
            path,
            skip_invalid,
            report,
        } => {
            let config = cli::resolve_config(&cli.config, path, skip_invalid)?;
            info!(path = %config.source.path.display(), table = %config.qualified_table(), "Load");
            let ctx = cli::build_context(config, cli.db)?;
            cli::cmd_load(ctx, report.as_deref()).await?;
        }
        Commands::Query { class, limit } => {
            let config = cli::resolve_config(&cli.config, None, false)?;
            let ctx = cli::build_context(config, cli.db)?;
            cli::cmd_query(&ctx, class.as_deref(), limit).await?;
        }
        Commands::Render { class, output } => {
            let config = cli::resolve_config(&cli.config, None, false)?;
            let ctx = cli::build_context(config, cli.db)?;
            cli::cmd_render(&ctx, class.as_deref(), &output).await?;
        }
        Commands::Export {
            class,
            output,
            no_geometry,
        } => {
            let config = cli::resolve_config(&cli.config, None, false)?;
            let ctx = cli::build_context(config, cli.db)?;
            cli::cmd_export(&ctx, class.as_deref(), &output, !no_geometry).await?;
        }
        Commands::Serve { listen } => {
            let config = cli::resolve_config(&cli.config, None, false)?;
            let ctx = cli::build_context(config, cli.db)?;
            cli::cmd_serve(ctx, listen).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
