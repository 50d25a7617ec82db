//! HTML Report Generation with Chart.js
//!
//! The page is a single minijinja template; chart series are serialized to
//! JSON in Rust and dropped into the page with `|safe`.

use anyhow::{Context, Result};
use minijinja::{context, Environment};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::analytics::logger::SavedResults;
use crate::analytics::metrics::MetricsCalculator;
use crate::simulation::orchestrator::{BatchResults, SimulationResults, SweepResults};
use crate::simulation::replay::{ReplayStatus, SimulationResult};
use crate::utils::units::{format_signed_units, format_units};

const REPORT_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{ title }}</title>
    <script src="https://cdn.jsdelivr.net/npm/chart.js"></script>
    <style>
        :root {
            --bg-primary: #0a0a0a;
            --bg-card: #1c1c1c;
            --text-primary: #ffffff;
            --text-secondary: #888888;
            --accent-purple: #8b5cf6;
            --accent-cyan: #22d3ee;
            --accent-green: #10b981;
            --accent-red: #ef4444;
        }
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            line-height: 1.6;
        }
        .container { max-width: 1200px; margin: 0 auto; padding: 2rem; }
        header { text-align: center; padding: 3rem 2rem; border-bottom: 1px solid rgba(255,255,255,0.08); margin-bottom: 2rem; }
        header h1 { font-size: 2.5rem; font-weight: 800; color: var(--accent-purple); }
        header .subtitle { color: var(--text-secondary); }
        header .timestamp { font-size: 0.875rem; color: rgba(255,255,255,0.4); }
        .stats-grid { display: grid; grid-template-columns: repeat(3, 1fr); gap: 1.25rem; margin-bottom: 2rem; }
        @media (max-width: 900px) { .stats-grid { grid-template-columns: 1fr; } }
        .stat-card { background: var(--bg-card); border-radius: 1rem; padding: 1.5rem; border: 1px solid rgba(255,255,255,0.06); }
        .stat-card .label { color: var(--text-secondary); font-size: 0.875rem; text-transform: uppercase; }
        .stat-card .value { font-size: 1.75rem; font-weight: 700; }
        .positive { color: var(--accent-green); }
        .negative { color: var(--accent-red); }
        .chart-card { background: var(--bg-card); border-radius: 1rem; padding: 1.5rem; margin-bottom: 2rem; }
        .chart-card h2 { font-size: 1.25rem; margin-bottom: 1rem; }
        .chart-container { position: relative; height: 360px; }
        table { width: 100%; border-collapse: collapse; font-size: 0.9rem; }
        th, td { padding: 0.5rem 0.75rem; text-align: left; border-bottom: 1px solid rgba(255,255,255,0.06); }
        th { color: var(--text-secondary); font-weight: 600; }
        .failed { color: var(--accent-red); }
        footer { text-align: center; color: var(--text-secondary); padding: 2rem; font-size: 0.875rem; }
    </style>
</head>
<body>
    <header>
        <h1>{{ title }}</h1>
        <p class="subtitle">{{ subtitle }}</p>
        <p class="timestamp">Generated {{ timestamp }}</p>
    </header>
    <div class="container">
        <div class="stats-grid">
        {% for stat in stats %}
            <div class="stat-card">
                <div class="label">{{ stat.label }}</div>
                <div class="value {{ stat.class }}">{{ stat.value }}</div>
            </div>
        {% endfor %}
        </div>

        {% for chart in charts %}
        <div class="chart-card">
            <h2>{{ chart.title }}</h2>
            <div class="chart-container"><canvas id="{{ chart.id }}"></canvas></div>
        </div>
        {% endfor %}

        {% for table in tables %}
        <div class="chart-card">
            <h2>{{ table.title }}</h2>
            <table>
                <tr>{% for h in table.headers %}<th>{{ h }}</th>{% endfor %}</tr>
                {% for row in table.rows %}
                <tr class="{{ row.class }}">{% for cell in row.cells %}<td>{{ cell }}</td>{% endfor %}</tr>
                {% endfor %}
            </table>
        </div>
        {% endfor %}
    </div>
    <footer>sandwich-sim: constant-product AMM ordering simulator</footer>
    <script>
        Chart.defaults.color = '#888888';
        Chart.defaults.borderColor = 'rgba(255, 255, 255, 0.05)';
        const charts = {{ charts_json|safe }};
        for (const chart of charts) {
            new Chart(document.getElementById(chart.id).getContext('2d'), {
                type: chart.kind,
                data: { labels: chart.labels, datasets: chart.datasets },
                options: {
                    responsive: true,
                    maintainAspectRatio: false,
                    interaction: { intersect: false, mode: 'index' },
                    scales: {
                        y: { title: { display: true, text: chart.y_label } },
                        x: { title: { display: true, text: chart.x_label }, ticks: { maxTicksLimit: 20 } }
                    }
                }
            });
        }
    </script>
</body>
</html>
"##;

const PALETTE: [&str; 4] = ["#8b5cf6", "#22d3ee", "#10b981", "#ef4444"];

#[derive(Debug, Serialize)]
struct Stat {
    label: &'static str,
    value: String,
    class: &'static str,
}

impl Stat {
    fn new(label: &'static str, value: String) -> Self {
        Self { label, value, class: "" }
    }

    fn signed(label: &'static str, amount: i128, decimals: u8, unit: &str) -> Self {
        let class = if amount > 0 {
            "positive"
        } else if amount < 0 {
            "negative"
        } else {
            ""
        };
        Self {
            label,
            value: format!("{} {}", format_signed_units(amount, decimals), unit),
            class,
        }
    }
}

#[derive(Debug, Serialize)]
struct Dataset {
    label: String,
    data: Vec<f64>,
    #[serde(rename = "borderColor")]
    border_color: &'static str,
    #[serde(rename = "backgroundColor")]
    background_color: &'static str,
    fill: bool,
    tension: f64,
}

impl Dataset {
    fn new(label: impl Into<String>, data: Vec<f64>, color_idx: usize) -> Self {
        let color = PALETTE[color_idx % PALETTE.len()];
        Self {
            label: label.into(),
            data,
            border_color: color,
            background_color: color,
            fill: false,
            tension: 0.2,
        }
    }
}

#[derive(Debug, Serialize)]
struct Chart {
    id: String,
    title: String,
    kind: &'static str,
    labels: Vec<String>,
    datasets: Vec<Dataset>,
    x_label: &'static str,
    y_label: &'static str,
}

#[derive(Debug, Serialize)]
struct Row {
    cells: Vec<String>,
    class: &'static str,
}

#[derive(Debug, Serialize)]
struct Table {
    title: String,
    headers: Vec<&'static str>,
    rows: Vec<Row>,
}

struct Page {
    title: String,
    subtitle: String,
    timestamp: String,
    stats: Vec<Stat>,
    charts: Vec<Chart>,
    tables: Vec<Table>,
}

/// Generate an HTML report with interactive charts
pub fn generate_report(results: &SavedResults, output_path: impl AsRef<Path>) -> Result<PathBuf> {
    let output_path = output_path.as_ref();
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).context("Failed to create report directory")?;
    }

    let page = match results {
        SavedResults::Single(r) => single_page(r),
        SavedResults::Sweep(r) => sweep_page(r),
        SavedResults::Batch(r) => batch_page(r),
    };
    let html = render(&page)?;

    fs::write(output_path, html).context("Failed to write report file")?;

    info!("Report generated: {}", output_path.display());
    Ok(output_path.to_path_buf())
}

fn render(page: &Page) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("report.html", REPORT_TEMPLATE)
        .context("Failed to parse report template")?;
    let template = env.get_template("report.html")?;

    let charts_json = serde_json::to_string(&page.charts).context("Failed to serialize chart data")?;
    let html = template
        .render(context! {
            title => &page.title,
            subtitle => &page.subtitle,
            timestamp => &page.timestamp,
            stats => &page.stats,
            charts => &page.charts,
            tables => &page.tables,
            charts_json => charts_json,
        })
        .context("Failed to render report")?;
    Ok(html)
}

fn steps_table(result: &SimulationResult, decimals: u8) -> Table {
    let mut rows: Vec<Row> = result
        .steps
        .iter()
        .map(|step| Row {
            cells: vec![
                step.index.to_string(),
                step.operation.label(),
                step.fill
                    .amount_out()
                    .map_or_else(|| "-".to_string(), |v| format_units(v, decimals)),
                format_units(step.pool_after.reserve_a, decimals),
                format_units(step.pool_after.reserve_b, decimals),
            ],
            class: "",
        })
        .collect();

    if let Some(failure) = &result.failure {
        rows.push(Row {
            cells: vec![
                failure.index.to_string(),
                failure.operation.label(),
                failure.error.to_string(),
                format_units(failure.pool.reserve_a, decimals),
                format_units(failure.pool.reserve_b, decimals),
            ],
            class: "failed",
        });
    }

    let status = match result.status {
        ReplayStatus::Complete => "",
        ReplayStatus::Partial => " (partial)",
    };
    Table {
        title: format!("{} ordering{}", result.ordering, status),
        headers: vec!["Step", "Operation", "Output", "Reserve A", "Reserve B"],
        rows,
    }
}

fn single_page(results: &SimulationResults) -> Page {
    let d = results.decimals;
    let c = &results.comparison;

    let natural_path = MetricsCalculator::price_path(&results.natural);
    let sandwich_path = MetricsCalculator::price_path(&results.sandwich);
    let steps = natural_path.len().max(sandwich_path.len());

    let price_chart = Chart {
        id: "priceChart".to_string(),
        title: "Spot price of TKA in TKB per step".to_string(),
        kind: "line",
        labels: (0..steps).map(|i| i.to_string()).collect(),
        datasets: vec![
            Dataset::new("natural", natural_path.iter().map(|p| p.price).collect(), 1),
            Dataset::new("sandwich", sandwich_path.iter().map(|p| p.price).collect(), 0),
        ],
        x_label: "Step",
        y_label: "TKB per TKA",
    };

    let actors = Table {
        title: "Actor deltas".to_string(),
        headers: vec![
            "Actor",
            "Role",
            "Natural TKA",
            "Natural TKB",
            "Sandwich TKA",
            "Sandwich TKB",
            "Difference (TKA value)",
        ],
        rows: c
            .actors
            .iter()
            .map(|a| Row {
                cells: vec![
                    a.actor.to_string(),
                    format!("{:?}", a.role),
                    format_signed_units(a.natural.delta_a, d),
                    format_signed_units(a.natural.delta_b, d),
                    format_signed_units(a.sandwich.delta_a, d),
                    format_signed_units(a.sandwich.delta_b, d),
                    format_signed_units(a.difference_value, d),
                ],
                class: "",
            })
            .collect(),
    };

    let victim_out = c
        .victim_fills
        .first()
        .and_then(|f| f.sandwich_out)
        .map_or_else(|| "reverted".to_string(), |v| format!("{} TKB", format_units(v, d)));

    Page {
        title: "Sandwich Simulation Report".to_string(),
        subtitle: results.scenario.name.clone(),
        timestamp: results.generated_at.clone(),
        stats: vec![
            Stat::signed("Attacker profit", c.attacker_profit, d, "TKA"),
            Stat::signed("Victim loss", c.victim_loss, d, "TKA"),
            Stat::new("Victim output (sandwich)", victim_out),
        ],
        charts: vec![price_chart],
        tables: vec![
            steps_table(&results.natural, d),
            steps_table(&results.sandwich, d),
            actors,
        ],
    }
}

fn sweep_page(results: &SweepResults) -> Page {
    let d = results.decimals;
    let curve = MetricsCalculator::sweep_curve(results);

    let chart = Chart {
        id: "sweepChart".to_string(),
        title: "Profit and victim loss by frontrun size".to_string(),
        kind: "line",
        labels: curve.iter().map(|p| format!("{:.2}", p.frontrun)).collect(),
        datasets: vec![
            Dataset::new("attacker profit", curve.iter().map(|p| p.profit).collect(), 2),
            Dataset::new("victim loss", curve.iter().map(|p| p.victim_loss).collect(), 3),
        ],
        x_label: "Frontrun (TKA)",
        y_label: "TKA",
    };

    let (best_size, best_profit) = match &results.sweep.best {
        Some(b) => (format_units(b.frontrun_amount, d), b.attacker_profit),
        None => ("none".to_string(), 0),
    };

    Page {
        title: "Frontrun Sweep Report".to_string(),
        subtitle: format!("Victim {}", results.sweep.victim),
        timestamp: results.generated_at.clone(),
        stats: vec![
            Stat::new("Attacker capital", format_units(results.sweep.capital, d)),
            Stat::new("Best frontrun", best_size),
            Stat::signed("Best profit", best_profit, d, "TKA"),
        ],
        charts: vec![chart],
        tables: vec![],
    }
}

fn batch_page(results: &BatchResults) -> Page {
    let d = results.decimals;
    let s = &results.summary;

    let mev = MetricsCalculator::cumulative_mev(results);
    let losses = MetricsCalculator::cumulative_losses(results);
    let histogram = MetricsCalculator::loss_distribution(results);
    let prices = MetricsCalculator::price_over_time(results);

    let cumulative = Chart {
        id: "mevChart".to_string(),
        title: "Cumulative MEV vs victim losses".to_string(),
        kind: "line",
        labels: mev.iter().map(|p| p.round.to_string()).collect(),
        datasets: vec![
            Dataset::new("MEV extracted", mev.iter().map(|p| p.value).collect(), 0),
            Dataset::new("Victim losses", losses.iter().map(|p| p.value).collect(), 3),
        ],
        x_label: "Round",
        y_label: "TKA",
    };
    let distribution = Chart {
        id: "histChart".to_string(),
        title: "Loss distribution per attack".to_string(),
        kind: "bar",
        labels: histogram.iter().map(|b| b.label.clone()).collect(),
        datasets: vec![Dataset::new(
            "Number of attacks",
            histogram.iter().map(|b| b.count as f64).collect(),
            0,
        )],
        x_label: "Loss amount range (TKA)",
        y_label: "Attacks",
    };
    let price = Chart {
        id: "priceChart".to_string(),
        title: "Pool price over time".to_string(),
        kind: "line",
        labels: prices.iter().map(|p| p.step.to_string()).collect(),
        datasets: vec![Dataset::new("TKB per TKA", prices.iter().map(|p| p.price).collect(), 1)],
        x_label: "Round",
        y_label: "TKB per TKA",
    };

    Page {
        title: "Sandwich Batch Report".to_string(),
        subtitle: format!("{} rounds, seed {}", s.total_rounds, results.config.batch.seed),
        timestamp: results.generated_at.clone(),
        stats: vec![
            Stat::signed("Total MEV extracted", s.total_mev_extracted, d, "TKA"),
            Stat::signed("Total victim losses", s.total_victim_losses, d, "TKA"),
            Stat::new(
                "Successful attacks",
                format!("{} ({:.1}%)", s.successful_attacks, s.attack_success_rate),
            ),
        ],
        charts: vec![cumulative, distribution, price],
        tables: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::simulation::orchestrator::Orchestrator;
    use crate::simulation::scenario::Scenario;

    #[test]
    fn test_single_report_renders() {
        let results = Orchestrator::new(SimulationConfig::reference())
            .run_reference()
            .unwrap();

        let html = render(&single_page(&results)).unwrap();

        assert!(html.contains("Sandwich Simulation Report"));
        assert!(html.contains("priceChart"));
        assert!(html.contains("natural ordering"));
        // Chart JSON is embedded unescaped
        assert!(html.contains(r#""id":"priceChart""#));
    }

    #[test]
    fn test_failed_step_is_highlighted() {
        let config = SimulationConfig {
            victim_min_out: 170 * crate::utils::units::WAD,
            ..SimulationConfig::reference()
        };
        let results = Orchestrator::new(config.clone())
            .run(&Scenario::reference(&config))
            .unwrap();

        let html = render(&single_page(&results)).unwrap();

        assert!(html.contains("sandwich ordering (partial)"));
        assert!(html.contains(r#"class="failed""#));
    }

    #[test]
    fn test_report_written_to_disk() {
        let results = Orchestrator::new(SimulationConfig::quick_test())
            .run_batch()
            .unwrap();
        let path = std::env::temp_dir()
            .join(format!("sandwich-sim-report-{}", std::process::id()))
            .join("report.html");

        let written = generate_report(&SavedResults::Batch(results), &path).unwrap();

        assert_eq!(written, path);
        assert!(fs::read_to_string(&path).unwrap().contains("mevChart"));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
