use super::ui;
use crate::core::rate::{
    DegradationLevel, ForexBaseline, ProviderQuote, ResolutionResult, SourceCounts,
};
use crate::core::service::{RateService, Served};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Table};
use serde::Serialize;

#[derive(Serialize)]
struct RatesReport<'a> {
    pair: String,
    baseline: &'a ForexBaseline,
    degradation_level: DegradationLevel,
    source_counts: SourceCounts,
    quotes: Vec<&'a ProviderQuote>,
    resolved_at: DateTime<Utc>,
    cached: bool,
    cache_age_secs: Option<u64>,
    warning: Option<&'a str>,
}

impl<'a> From<&'a Served<ResolutionResult>> for RatesReport<'a> {
    fn from(served: &'a Served<ResolutionResult>) -> Self {
        let result = &served.value;
        RatesReport {
            pair: result.pair.to_string(),
            baseline: &result.baseline,
            degradation_level: result.degradation_level,
            source_counts: result.source_counts(),
            quotes: result.ranked_quotes(),
            resolved_at: result.resolved_at,
            cached: served.cached,
            cache_age_secs: served.cache_age.map(|age| age.as_secs()),
            warning: served.warning.as_deref(),
        }
    }
}

pub async fn run(
    service: &RateService,
    from: &str,
    to: &str,
    refresh: bool,
    json: bool,
) -> Result<()> {
    let pb = (!json).then(|| ui::new_spinner(&format!("Fetching {from}-{to} rates")));
    let served = service.rates(from, to, refresh).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let served = served?;

    if json {
        let report = RatesReport::from(&served);
        let out = serde_json::to_string_pretty(&report).context("Failed to encode rates")?;
        println!("{out}");
        return Ok(());
    }

    display(&served);
    Ok(())
}

fn display(served: &Served<ResolutionResult>) {
    let result = &served.value;
    println!(
        "\n{}",
        ui::style_text(
            &format!("{} → {}", result.pair.source, result.pair.target),
            ui::StyleType::Title
        )
    );
    println!(
        "Forex rate: {} ({})",
        ui::style_text(&format!("{:.2}", result.baseline.rate), ui::StyleType::TotalValue),
        ui::baseline_label(result.baseline.source)
    );

    if result.quotes.is_empty() {
        println!("No provider rates available.");
    } else {
        println!("{}", quotes_table(result));
    }

    let counts = result.source_counts();
    let mut footer = format!(
        "{} live, {} derived, {} emergency | degradation: {}",
        counts.live,
        counts.derived,
        counts.emergency,
        ui::degradation_label(result.degradation_level)
    );
    if let Some(age) = served.cache_age {
        footer.push_str(&format!(" | cached {} ago", ui::format_age(age)));
    }
    println!("{}", ui::style_text(&footer, ui::StyleType::Subtle));

    if let Some(warning) = &served.warning {
        println!("{}", ui::style_text(warning, ui::StyleType::Warning));
    }
}

fn quotes_table(result: &ResolutionResult) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Provider"),
        ui::header_cell("Rate"),
        ui::header_cell("Fee"),
        ui::header_cell("Markup"),
        ui::header_cell("Delivery"),
        ui::header_cell("Source"),
    ]);

    for (i, quote) in result.ranked_quotes().into_iter().enumerate() {
        let rate_cell = if i == 0 {
            ui::best_rate_cell(quote.rate)
        } else {
            ui::amount_cell(quote.rate)
        };
        table.add_row(vec![
            Cell::new(&quote.display_name),
            rate_cell,
            ui::amount_cell(quote.fee),
            ui::format_optional_cell(Some(quote.markup_percent), |m| format!("{m:.2}%")),
            ui::format_optional_cell(quote.delivery_speed_label.as_deref(), str::to_string),
            ui::origin_cell(quote.origin),
        ]);
    }
    table
}
