use std::sync::Arc;

use clap::Parser;
use engine::{
    Currency, RateProvider, RateTable, SqlWalletStore, StaticRateProvider, WalletFacade,
};
use migration::{Migrator, MigratorTrait};
use rate_client::HttpRateProvider;
use settings::{Database, Settings};

mod settings;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Multi-currency wallet server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the settings file.
    #[arg(short, long, env = "WALLET_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();
    let settings = Settings::new(args.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "currency_wallet={level},server={level},engine={level},rate_client={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.server.database).await?;
    let rates = rate_provider(&settings.rates)?;

    let store = Arc::new(SqlWalletStore::new(db.clone()));
    let facade = WalletFacade::builder(store, rates)
        .retry(settings.ledger.retry())
        .rate_timeout(settings.rates.timeout())
        .exchange_mode(settings.ledger.exchange_mode())
        .build();

    let bind = settings
        .server
        .bind
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", bind, settings.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    server::run_with_listener(facade, db, listener).await?;
    Ok(())
}

fn rate_provider(config: &settings::Rates) -> Result<Arc<dyn RateProvider>, BoxError> {
    if let Some(fixed) = &config.fixed {
        let mut rates = Vec::with_capacity(fixed.len());
        for (code, rate) in fixed {
            rates.push((Currency::try_from(code.as_str())?, *rate));
        }
        tracing::info!("Using fixed exchange rates...");
        return Ok(Arc::new(StaticRateProvider::new(RateTable::new(
            Currency::Usd,
            rates,
        )?)));
    }

    match &config.url {
        Some(url) => {
            tracing::info!("Using rate service at {url}");
            Ok(Arc::new(HttpRateProvider::new(url, config.timeout())?))
        }
        None => Err("either rates.url or rates.fixed must be configured".into()),
    }
}

async fn parse_database(
    config: &Database,
) -> Result<sea_orm::DatabaseConnection, BoxError> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
        Database::Postgres(url) => url.clone(),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
