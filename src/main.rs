use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};

use speed_alerts::config::{Config, DEFAULT_CONFIG_PATH};
use speed_alerts::constants::{self, DEFAULT_TOP_N};
use speed_alerts::contracts::ContractDirectory;
use speed_alerts::error::AlertError;
use speed_alerts::export::write_export;
use speed_alerts::filter::AlertFilter;
use speed_alerts::infra::contract_service::HttpContractDirectory;
use speed_alerts::infra::session_store::FileSessionStore;
use speed_alerts::logging;
use speed_alerts::parser::validate_extension;
use speed_alerts::pipeline::{Pipeline, PipelineResult};
use speed_alerts::session::Session;
use speed_alerts::stats::{partition_by_band, top_stats, DashboardSummary, SpeedBand};
use speed_alerts::types::{Alert, AlertField, Provider, StatItem};

#[derive(Parser)]
#[command(name = "speed_alerts")]
#[command(about = "Vehicle speed-alert ingestion and reporting")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct FilterArgs {
    /// Substring of the plate (case-insensitive)
    #[arg(long, default_value = "")]
    plate: String,
    /// Substring of the operator name
    #[arg(long, default_value = "")]
    operator: String,
    /// Substring of the contract name
    #[arg(long, default_value = "")]
    contract: String,
}

impl From<FilterArgs> for AlertFilter {
    fn from(args: FilterArgs) -> Self {
        AlertFilter::new(args.plate, args.operator, args.contract)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Parse provider exports and replace the stored batches
    Ingest {
        /// Fagor workbook export (.xlsx / .xls)
        #[arg(long)]
        workbook: Option<PathBuf>,
        /// Coltrack pipe-delimited export (.csv)
        #[arg(long)]
        delimited: Option<PathBuf>,
    },
    /// Print filtered alerts split into high and medium speed bands
    Report {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Print the dashboard summary, or the top groups for one field
    Stats {
        /// plate, speed, timestamp, operator, location or contract
        #[arg(long)]
        field: Option<String>,
        #[arg(long, default_value_t = DEFAULT_TOP_N)]
        top: usize,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Write the filtered alerts as a delimited document
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Drop every loaded batch
    Clear,
}

async fn ingest_one(
    provider: Provider,
    path: Option<&Path>,
    directory: &ContractDirectory,
) -> Option<(Provider, speed_alerts::error::Result<PipelineResult>)> {
    let path = path?;
    Some((provider, Pipeline::ingest_file(provider, path, directory).await))
}

async fn run_ingest(
    config: &Config,
    store: &FileSessionStore,
    workbook: Option<PathBuf>,
    delimited: Option<PathBuf>,
) -> Result<()> {
    if workbook.is_none() && delimited.is_none() {
        bail!(
            "nothing to ingest: pass --workbook and/or --delimited (providers: {})",
            constants::get_supported_providers().join(", ")
        );
    }

    // Extension checks happen before anything else touches the files
    let mut inputs = Vec::new();
    for (provider, path) in [(Provider::Fagor, workbook), (Provider::Coltrack, delimited)] {
        match path {
            Some(path) => match validate_extension(provider, &path) {
                Ok(()) => inputs.push(Some(path)),
                Err(e) => {
                    println!("❌ {}", e);
                    inputs.push(None);
                }
            },
            None => inputs.push(None),
        }
    }
    if inputs.iter().all(Option::is_none) {
        bail!("no input file passed the extension check");
    }

    let port = HttpContractDirectory::new(config.directory.url.clone(), config.directory.timeout())?;
    let (directory, fetch_error) = Pipeline::load_directory(&port).await;
    if let Some(e) = fetch_error {
        println!("⚠️  No se pudo conectar con el servicio de contratos: {}", e);
    }

    let mut session = Session::restore(store).await;
    let (fagor, coltrack) = tokio::join!(
        ingest_one(Provider::Fagor, inputs[0].as_deref(), &directory),
        ingest_one(Provider::Coltrack, inputs[1].as_deref(), &directory),
    );

    let mut ingested = 0usize;
    for (provider, outcome) in [fagor, coltrack].into_iter().flatten() {
        match outcome {
            Ok(result) => {
                ingested += 1;
                println!("\n📊 Results for {}:", provider);
                println!("   Rows read: {}", result.total_rows);
                println!("   Alerts kept: {}", result.retained);
                println!("   Rows dropped: {}", result.dropped);
                session.replace_batch(provider, result.alerts);
                session
                    .persist_batch(store, provider)
                    .await
                    .with_context(|| format!("failed to persist {provider} alerts"))?;
            }
            Err(e) => {
                // The previous batch for this provider stays in place
                error!(provider = %provider, "Ingestion failed: {}", e);
                println!("❌ {}: {}", provider, e);
            }
        }
    }
    if ingested == 0 {
        bail!("every provider batch failed; stored alerts were left unchanged");
    }
    Ok(())
}

fn print_table(title: &str, alerts: &[Alert]) {
    println!("\n{} ({})", title, alerts.len());
    if alerts.is_empty() {
        println!("   (sin alertas)");
        return;
    }
    println!(
        "   {:<10} {:>5}  {:<20} {:<28} {:<26} {}",
        "Placa", "km/h", "Fecha y Hora", "Operador", "Localidad", "Contrato"
    );
    for a in alerts {
        println!(
            "   {:<10} {:>5}  {:<20} {:<28} {:<26} {}",
            a.plate, a.speed_kph, a.timestamp, a.operator, a.location, a.contract
        );
    }
}

fn print_stats(title: &str, items: &[StatItem]) {
    println!("\n{}", title);
    for item in items {
        println!("   {:<30} {}", item.name, item.count);
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let store = FileSessionStore::new(config.session.path.clone());

    match cli.command {
        Commands::Ingest { workbook, delimited } => {
            println!("🔄 Running ingestion...");
            run_ingest(&config, &store, workbook, delimited).await?;
        }
        Commands::Report { filter } => {
            let mut session = Session::restore(&store).await;
            session.filter = filter.into();
            let (high, medium) = partition_by_band(&session.filtered());
            print_table(SpeedBand::High.title(), &high);
            print_table(SpeedBand::Medium.title(), &medium);
        }
        Commands::Stats { field, top, json } => {
            let session = Session::restore(&store).await;
            let alerts = session.combined();
            match field {
                Some(name) => {
                    let field = AlertField::from_name(&name)
                        .with_context(|| format!("unknown field '{name}'"))?;
                    let items = top_stats(&alerts, field, top);
                    if json {
                        println!("{}", serde_json::to_string_pretty(&items)?);
                    } else {
                        print_stats(&format!("Top {top} por {name}"), &items);
                    }
                }
                None => {
                    let summary = DashboardSummary::from_alerts(&alerts);
                    if json {
                        println!("{}", serde_json::to_string_pretty(&summary)?);
                    } else {
                        println!("Alertas Totales: {}", summary.total_alerts);
                        println!("Alertas Altas (>= 80 km/h): {}", summary.high_speed_alerts);
                        println!("Alertas Medias (50-79 km/h): {}", summary.medium_speed_alerts);
                        println!("Vehículos Únicos: {}", summary.unique_vehicles);
                        print_stats("Top 5 Placas", &summary.top_plates);
                        print_stats("Top 5 Contratos", &summary.top_contracts);
                        print_stats("Top 5 Operadores", &summary.top_operators);
                    }
                }
            }
        }
        Commands::Export { filter, output_dir } => {
            let mut session = Session::restore(&store).await;
            session.filter = filter.into();
            let output_dir = output_dir.unwrap_or_else(|| config.export.output_dir.clone());
            match write_export(&session.filtered(), &output_dir, Utc::now().date_naive()).await {
                Ok(path) => println!("💾 Saved export to {}", path.display()),
                Err(AlertError::ExportPrecondition(msg)) => {
                    warn!("Export skipped: {}", msg);
                    println!("⚠️  {}", msg);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Clear => {
            let mut session = Session::restore(&store).await;
            session.clear_all();
            session.persist(&store).await?;
            println!("🧹 Cleared all loaded alerts");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::load_from(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    let _guard = logging::init_logging(&config.logging.dir);
    info!(session = %config.session.path.display(), "speed_alerts starting");

    run(cli, config).await
}
