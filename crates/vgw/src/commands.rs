//! Subcommand implementations

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use vgw_network::{DnsResolver, HttpClient};
use vgw_servers::{
    render_listing, CatalogStore, CycleReport, LooperConfig, Provider, SystemClock, UpdateLooper,
    Updater, UpdaterConfig,
};

/// One cycle over the configured providers
pub async fn update(config: &UpdaterConfig) -> Result<()> {
    config.validate()?;
    let looper = build_looper(config)?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let report = looper.run_cycle(&cancel).await;
    handle_report(config, looper.store(), &report)?;

    let failed = report.failed_providers();
    if !failed.is_empty() {
        let names: Vec<&str> = failed.iter().map(|p| p.name()).collect();
        bail!(
            "{} of {} providers failed to update: {}",
            failed.len(),
            report.outcomes.len(),
            names.join(", ")
        );
    }
    Ok(())
}

/// Cycles until Ctrl-C
pub async fn run(config: &UpdaterConfig) -> Result<()> {
    config.validate()?;
    let looper = build_looper(config)?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let (tx, mut rx) = mpsc::channel::<CycleReport>(4);
    let store = looper.store().clone();

    // Without a period, update once at startup
    if config.period().is_none() {
        looper.handle().trigger();
    }

    let runner = tokio::spawn(looper.run(cancel.clone(), tx));

    while let Some(report) = rx.recv().await {
        if let Err(e) = handle_report(config, &store, &report) {
            error!("{:#}", e);
        }
    }

    runner.await.context("update looper panicked")?;
    Ok(())
}

/// Print stored catalogs
pub fn show(catalog: &Path, providers: &[Provider]) -> Result<()> {
    let store = CatalogStore::load_file(catalog)
        .with_context(|| format!("cannot load catalogs from {}", catalog.display()))?;

    for stored in store.snapshot() {
        if providers.is_empty() || providers.contains(&stored.provider) {
            print!("{}", render_listing(&stored));
        }
    }
    for provider in providers {
        if store.get(*provider).is_none() {
            warn!("No {} catalog in {}", provider, catalog.display());
        }
    }
    Ok(())
}

fn build_looper(config: &UpdaterConfig) -> Result<UpdateLooper> {
    let store = match &config.catalog_path {
        Some(path) if path.exists() => CatalogStore::load_file(path)
            .with_context(|| format!("cannot load catalogs from {}", path.display()))?,
        _ => CatalogStore::new(),
    };

    let fetcher = HttpClient::new(config.http_client_config());
    let lookup = DnsResolver::new(config.dns_config()).context("cannot create DNS resolver")?;
    let updater = Updater::new(
        Arc::new(fetcher),
        Arc::new(lookup),
        Arc::new(SystemClock),
        Arc::new(store),
    )
    .refuse_empty(config.refuse_empty_catalog);

    Ok(UpdateLooper::new(
        Arc::new(updater),
        config.descriptors(),
        LooperConfig {
            period: config.period(),
            cycle_timeout: config.cycle_timeout(),
        },
    ))
}

/// Log and print a cycle's outcomes, then save the store if configured
fn handle_report(config: &UpdaterConfig, store: &CatalogStore, report: &CycleReport) -> Result<()> {
    for outcome in &report.outcomes {
        if config.print_warnings {
            outcome.log_warnings();
        }
        match &outcome.result {
            Ok(catalog) => {
                if config.print_listing {
                    print!("{}", render_listing(catalog));
                }
            }
            Err(e) => error!("{}", e),
        }
    }

    if let Some(path) = &config.catalog_path {
        store
            .save_file(path)
            .with_context(|| format!("cannot save catalogs to {}", path.display()))?;
        info!("Catalogs saved to {}", path.display());
    }
    Ok(())
}

fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling updates");
            cancel.cancel();
        }
    });
}
