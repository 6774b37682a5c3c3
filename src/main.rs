use clap::Parser;
use jobdash::{secrets, settings, storage, web};
use miette::Result;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "jobdash",
    version,
    about = "Job execution statistics dashboard"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    // init storage (database + migrations)
    let db = storage::init(&settings.database).await?;

    let removed = storage::cleanup_expired_sessions(&db).await?;
    if removed > 0 {
        tracing::info!(removed, "Removed expired sessions");
    }

    // init secret cipher (generate key if missing)
    let cipher = secrets::SecretCipher::load_or_generate(&settings.keys)?;

    web::serve(settings, db, cipher).await?;
    Ok(())
}
