use super::ui;
use crate::core::currency::Currency;
use crate::core::monitor::{MarginMonitor, MonitorReport, MonitorStatus, PairAnalysis};
use anyhow::Result;
use comfy_table::{Cell, Color, Table};

pub async fn run(monitor: &MarginMonitor, currencies: &[Currency], target: Currency) -> Result<()> {
    let pb = ui::new_spinner(&format!("Checking margins against {target}"));
    let report = monitor.run(currencies, target).await;
    pb.finish_and_clear();

    display(&report);
    Ok(())
}

fn display(report: &MonitorReport) {
    println!(
        "\n{} {}",
        ui::style_text("Margin check", ui::StyleType::Title),
        ui::style_text(
            &format!(
                "({}, threshold {})",
                report.checked_at.format("%Y-%m-%d %H:%M UTC"),
                report.alert_threshold
            ),
            ui::StyleType::Subtle
        )
    );

    let num_results = report.results.len();
    for (i, (pair, result)) in report.results.iter().enumerate() {
        println!("\n{}", ui::style_text(&pair.to_string(), ui::StyleType::TotalLabel));
        match result {
            Ok(analysis) => {
                println!("Forex rate: {:.2}", analysis.forex_rate);
                println!("{}", drift_table(analysis));
            }
            Err(e) => println!("{}", ui::style_text(&e.to_string(), ui::StyleType::Error)),
        }
        if i < num_results - 1 {
            ui::print_separator();
        }
    }

    println!("\n{}", status_line(report));
}

fn drift_table(analysis: &PairAnalysis) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Provider"),
        ui::header_cell("Configured"),
        ui::header_cell("Actual"),
        ui::header_cell("Difference"),
        ui::header_cell("Status"),
    ]);

    for drift in &analysis.drifts {
        let status = if drift.needs_update {
            Cell::new("update").fg(Color::Red)
        } else {
            Cell::new("ok").fg(Color::Green)
        };
        table.add_row(vec![
            Cell::new(&drift.provider_id),
            ui::amount_cell(drift.configured_margin),
            ui::amount_cell(drift.actual_margin),
            ui::amount_cell(drift.difference),
            status,
        ]);
    }
    table
}

fn status_line(report: &MonitorReport) -> String {
    match report.status() {
        MonitorStatus::Ok => ui::style_text("Status: OK", ui::StyleType::TotalValue),
        MonitorStatus::Warning => {
            let pairs: Vec<String> = report
                .alerted_pairs()
                .map(|analysis| {
                    format!("{} ({})", analysis.pair, analysis.alerts().count())
                })
                .collect();
            ui::style_text(
                &format!("Status: WARNING, margins need review for {}", pairs.join(", ")),
                ui::StyleType::Warning,
            )
        }
    }
}
