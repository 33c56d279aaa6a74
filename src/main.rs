// src/main.rs
use anyhow::Context;
use clap::Parser;
use ct_harvest::cert_parser::X509CertificateParser;
use ct_harvest::cli::Cli;
use ct_harvest::config::Config;
use ct_harvest::crtsh::CrtShClient;
use ct_harvest::database::{DatabaseBackend, MemoryBackend, PostgresBackend};
use ct_harvest::dns::GoogleDnsResolver;
use ct_harvest::job::JobRun;
use ct_harvest::pipeline::{Pipeline, PipelineOptions, RunOutcome};
use ct_harvest::stats::StatsCollector;
use ct_harvest::zones::TrackedZones;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Validate arguments
    cli.validate()?;

    // Load config file
    let config = Config::from_file(Path::new(&cli.config))?;

    // Initialize logging
    let log_level = cli.log_level().unwrap_or(config.logging.level.as_str());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .init();

    tracing::info!("Starting ct-harvest...");

    let store: Arc<dyn DatabaseBackend> = if config.database.enabled {
        tracing::info!("Database enabled, connecting to PostgreSQL...");
        let postgres = PostgresBackend::new(
            &config.database.url,
            config.database.max_connections,
        )
        .await?;
        postgres.migrate().await?;
        tracing::info!("Database initialized and migrated successfully");
        Arc::new(postgres)
    } else {
        tracing::warn!("Database disabled, results are kept in memory for this run only");
        Arc::new(MemoryBackend::new())
    };
    store.ping().await?;

    let mut zones = TrackedZones::from_list(&config.zones.tracked);
    if let Some(ref file) = config.zones.file {
        zones.extend_from_file(file)?;
    }
    if zones.is_empty() {
        anyhow::bail!("No zones to query. Set [zones] tracked or [zones] file in {}", cli.config);
    }
    tracing::info!("Tracking {} zones", zones.count());

    let client = CrtShClient::new(
        &config.aggregator.base_url,
        config.aggregator.timeout(),
        config.aggregator.retry_delay(),
    )?;
    let parser = X509CertificateParser::new();
    let resolver = GoogleDnsResolver::new(
        &config.resolver.url,
        config.resolver.record_types.clone(),
        config.resolver.timeout(),
    )?;

    let save_dir = cli.save_dir();
    if let Some(ref dir) = save_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {:?}", dir))?;
        tracing::info!("Saving raw certificates to {:?}", dir);
    }

    let options = PipelineOptions {
        fetch_dns_records: cli.fetch_dns_records,
        save_dir,
        zone_pacing: config.aggregator.zone_pacing(),
        show_progress: cli.should_show_progress() && is_terminal::is_terminal(std::io::stderr()),
    };

    let job = JobRun::new(config.job_name.clone(), store.clone());
    job.start().await?;

    let stats = StatsCollector::new();
    let pipeline = Pipeline::new(&client, &parser, &resolver, &zones, store.as_ref(), options);

    let outcome = match pipeline.run(&stats).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            job.fail().await;
            std::process::exit(1);
        }
    };

    match outcome {
        RunOutcome::Completed | RunOutcome::AggregatorUnreachable => job.complete().await?,
        RunOutcome::FetchExhausted => job.fail().await,
    }

    tracing::info!("Job {} finished: {:?}", config.job_name, outcome);

    if outcome.is_failure() {
        std::process::exit(outcome.exit_code());
    }

    Ok(())
}
