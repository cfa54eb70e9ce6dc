use actix_web::{web, App, HttpServer};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use telehealth_schema::handlers::{self, AppState};
use telehealth_schema::inspect::SchemaProbe;
use telehealth_schema::{Bootstrapper, Config};

#[derive(Parser)]
#[command(name = "telehealth-schema")]
#[command(about = "Provision and check the telehealth service databases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create databases, schemas, the admin identity and grants, then exit
    Bootstrap,
    /// Report which databases and schema objects are missing
    Status,
    /// Bootstrap, then serve health probes until stopped
    Serve,
}

/// Entry point.
///
/// # Environment Variables
/// - `DATABASE_URL`: server URL pointing at a maintenance database (required)
/// - `APP_DB_ROLE`: role granted privileges on every service database (default: the URL user)
/// - `DB_CONNECT_TIMEOUT_SECS`: connection timeout (default: 10)
/// - `SERVICE_NAME`, `SERVICE_HOST`, `SERVICE_PORT`: probe server identity and bind address
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("telehealth_schema=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Bootstrap => {
            let report = Bootstrapper::new(config).run()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Status => {
            let status = SchemaProbe::new(&config).status()?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            if !status.is_ready() {
                anyhow::bail!("schema is not ready");
            }
        }
        Commands::Serve => serve(config).await?,
    }

    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let bootstrapper = Bootstrapper::new(config.clone());
    // No traffic before the schema is in place.
    web::block(move || bootstrapper.run()).await??;

    let addr = (config.service_host.clone(), config.service_port);
    let state = web::Data::new(AppState {
        service_name: config.service_name.clone(),
        probe: SchemaProbe::new(&config),
    });

    tracing::info!("++ Starting {} on {}:{}", config.service_name, addr.0, addr.1);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}
