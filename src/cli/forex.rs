use super::ui;
use crate::core::rate::ForexBaseline;
use crate::core::service::{RateService, Served};
use anyhow::Result;

pub async fn run(service: &RateService, from: &str, to: &str, refresh: bool) -> Result<()> {
    let served = service.forex(from, to, refresh).await?;
    println!("{}", summary_line(from, to, &served));
    if let Some(warning) = &served.warning {
        println!("{}", ui::style_text(warning, ui::StyleType::Warning));
    }
    Ok(())
}

fn summary_line(from: &str, to: &str, served: &Served<ForexBaseline>) -> String {
    let baseline = &served.value;
    let mut line = format!(
        "1 {} = {} {} ({}, observed {})",
        from.to_uppercase(),
        ui::style_text(&format!("{:.2}", baseline.rate), ui::StyleType::TotalValue),
        to.to_uppercase(),
        ui::baseline_label(baseline.source),
        baseline.observed_at.format("%Y-%m-%d %H:%M UTC")
    );
    if let Some(age) = served.cache_age {
        line.push_str(&ui::style_text(
            &format!(" [cached {} ago]", ui::format_age(age)),
            ui::StyleType::Subtle,
        ));
    }
    line
}
