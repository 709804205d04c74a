pub mod cli;
pub mod core;
pub mod providers;

use crate::core::baseline::TieredBaselineSource;
use crate::core::config::AppConfig;
use crate::core::margin::MarginTable;
use crate::core::monitor::MarginMonitor;
use crate::core::quotes::{AliasTable, ComparisonQuoteSource};
use crate::core::resolver::RateResolver;
use crate::core::service::RateService;
use crate::core::upstream::{ComparisonApi, ForexApi, SharedComparison};
use crate::providers::util::call_budget;
use crate::providers::{FrankfurterProvider, WiseComparisonProvider};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub enum AppCommand {
    Rates {
        from: String,
        to: Option<String>,
        refresh: bool,
        json: bool,
    },
    Forex {
        from: String,
        to: Option<String>,
        refresh: bool,
    },
    Margins,
}

/// Wires the HTTP adapters, the baseline chain and the margin table into a
/// ready-to-serve rate service.
pub fn build_service(config: &AppConfig) -> RateService {
    let wise = &config.providers.wise;
    let wise_timeout = Duration::from_secs(wise.timeout_secs);
    let wise_budget = call_budget(wise_timeout, wise.retries);
    // Baseline and quotes for one resolution share a single comparison request
    let comparison: Arc<dyn ComparisonApi> =
        Arc::new(SharedComparison::new(Arc::new(WiseComparisonProvider::new(
            &wise.base_url,
            wise.send_amount,
            wise_timeout,
            wise.retries,
        ))));

    let frankfurter = &config.providers.frankfurter;
    let forex_timeout = Duration::from_secs(frankfurter.timeout_secs);
    let forex: Arc<dyn ForexApi> = Arc::new(FrankfurterProvider::new(
        &frankfurter.base_url,
        forex_timeout,
        frankfurter.retries,
    ));
    let forex_budget = call_budget(forex_timeout, frankfurter.retries);

    let margins = Arc::new(MarginTable::from_config(&config.margins));
    let aliases = if config.margins.aliases.is_empty() {
        AliasTable::default()
    } else {
        AliasTable::new(&config.margins.aliases)
    };

    let baseline = Arc::new(TieredBaselineSource::standard(
        Arc::clone(&comparison),
        wise_budget,
        forex,
        forex_budget,
        Arc::clone(&margins),
    ));
    let quotes = Arc::new(ComparisonQuoteSource::new(comparison, aliases, wise_budget));

    let resolver = RateResolver::new(baseline, quotes, margins);
    RateService::new(resolver, config.currencies.clone(), config.cache.into())
}

/// Margin monitor sharing the service's sources.
pub fn build_monitor(config: &AppConfig, service: &RateService) -> MarginMonitor {
    let resolver = service.resolver();
    MarginMonitor::new(
        Arc::clone(resolver.baseline_source()),
        Arc::clone(resolver.quote_source()),
        Arc::clone(resolver.margins()),
        config.monitor.alert_threshold,
    )
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("remitrates starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let default_target = config
        .currencies
        .default_target()
        .context("No target currency configured")?;
    let service = build_service(&config);

    match command {
        AppCommand::Rates {
            from,
            to,
            refresh,
            json,
        } => {
            let to = to.unwrap_or_else(|| default_target.to_string());
            cli::rates::run(&service, &from, &to, refresh, json).await
        }
        AppCommand::Forex { from, to, refresh } => {
            let to = to.unwrap_or_else(|| default_target.to_string());
            cli::forex::run(&service, &from, &to, refresh).await
        }
        AppCommand::Margins => {
            let monitor = build_monitor(&config, &service);
            cli::margins::run(&monitor, &config.monitor.currencies, default_target).await
        }
    }
}
