/*
dailybrief - main.rs
Runs the daily pipeline once: collect feeds, score articles, email the digest.
*/

use anyhow::Result;
use clap::Parser;
use common::{optional_env, require_env, Config};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use dailybrief::llm::{self, LlmProvider};
use dailybrief::mailer::SmtpMailer;
use dailybrief::pipeline::{Delivery, Pipeline};

#[derive(Parser, Debug)]
#[command(name = "dailybrief", about = "Score today's feed articles with an AI classifier and email the best")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Collect and score, print the digest HTML to stdout, send nothing
    #[arg(long)]
    dry_run: bool,

    /// List the models visible to the configured API key and exit
    #[arg(long)]
    list_models: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Secrets live in a local .env file; a missing file is fine
    dotenv::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();

    // lettre's rustls backend needs a process-wide crypto provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = load_config(args.config).await?;

    let provider: Arc<dyn LlmProvider> = Arc::from(llm::create_provider(&config.llm())?);
    info!(adapter = config.llm().adapter(), model = provider.model(), "LLM provider initialized");

    if args.list_models {
        let models = provider.list_models().await?;
        println!("Models available to this key ({}):", models.len());
        for model in models {
            println!("  {}", model);
        }
        return Ok(());
    }

    let delivery = if args.dry_run {
        Delivery::DryRun
    } else {
        let email = config.email();
        let address = require_env(email.address_env())?;
        let password = require_env(email.password_env())?;
        let to = email.recipient.clone().unwrap_or_else(|| address.clone());
        Delivery::Email {
            mailer: Arc::new(SmtpMailer::new(email.smtp_host(), email.smtp_port(), address.clone(), password)),
            from: address,
            to,
        }
    };

    let sam_api_key = optional_env(config.contracts().api_key_env());
    let pipeline = Pipeline::new(config, provider, delivery, sam_api_key)?;

    let report = match pipeline.run().await {
        Ok(report) => report,
        Err(e) => {
            error!("daily brief failed: {:#}", e);
            return Err(e);
        }
    };

    if args.dry_run {
        println!("{}", report.html);
    }
    Ok(())
}

/// `config.default.toml` merged with `config.toml` or the file given on the command line
async fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = explicit {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            anyhow::bail!("Config file not found: {}", p.display());
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = Config::load_with_defaults(
        if default_path.exists() { Some(default_path.as_path()) } else { None },
        override_path.as_deref(),
    )
    .await?;

    info!(default_path = ?default_path, override_path = ?override_path, feeds = config.feeds.len(), "configuration loaded");
    Ok(config)
}
