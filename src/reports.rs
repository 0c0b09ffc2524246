use anyhow::{Context, Result};
use chrono::{NaiveDateTime, TimeDelta};
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::matcher::{JoinOutcome, UnmatchedDraw};
use crate::types::JoinedResult;
use crate::utils::{delta_minutes, format_timestamp};

pub fn summary_line(outcome: &JoinOutcome) -> String {
    format!(
        "{} processed matches, {} unmatched (total draws: {})",
        outcome.matched_count(),
        outcome.unmatched_count(),
        outcome.total_processed()
    )
}

fn format_balls(numbers: &[i32]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn unmatched_reason(entry: &UnmatchedDraw) -> String {
    match &entry.nearest {
        Some(nearest) => format!(
            "nearest sample {} is {} min away",
            format_timestamp(&nearest.observation_time),
            delta_minutes(nearest.delta)
        ),
        None => "no weather data".to_string(),
    }
}

/// Console summary of one matcher run.
pub fn render_summary(outcome: &JoinOutcome, tolerance: TimeDelta) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "📊 Match run (tolerance {} min)",
        tolerance.num_minutes()
    );
    let _ = writeln!(out, "{}", summary_line(outcome));

    for joined in &outcome.matched {
        let _ = writeln!(
            out,
            "   ✓ draw {} at {} -> weather at {} ({} min)",
            joined.draw.draw_number,
            format_timestamp(&joined.draw.draw_time),
            format_timestamp(&joined.weather.observation_time),
            joined.time_delta_minutes
        );
    }
    for entry in &outcome.unmatched {
        let _ = writeln!(
            out,
            "   ✗ draw {} at {}: {}",
            entry.draw.draw_number,
            format_timestamp(&entry.draw.draw_time),
            unmatched_reason(entry)
        );
    }

    out
}

/// Plain-text listing of the stored join, one line per row.
pub fn render_results_table(results: &[JoinedResult]) -> String {
    if results.is_empty() {
        return "joined_results is empty\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>7}  {:<19}  {:<23}  {:<19}  {:>6}  {:>4}  {:>4}  {:>5}  {:<10}  {:<19}  {:>3}",
        "draw",
        "draw time",
        "numbers",
        "observed",
        "temp",
        "hum",
        "mmHg",
        "wind",
        "direction",
        "precipitation",
        "min"
    );
    for r in results {
        let _ = writeln!(
            out,
            "{:>7}  {:<19}  {:<23}  {:<19}  {:>6.1}  {:>4}  {:>4}  {:>5.2}  {:<10}  {:<19}  {:>3}",
            r.draw.draw_number,
            format_timestamp(&r.draw.draw_time),
            format_balls(&r.draw.numbers),
            format_timestamp(&r.weather.observation_time),
            r.weather.temperature,
            r.weather.humidity,
            r.weather.pressure,
            r.weather.wind_speed,
            r.weather.wind_direction.as_str(),
            r.weather.precipitation.as_str(),
            r.time_delta_minutes
        );
    }
    let _ = writeln!(out, "{} rows", results.len());
    out
}

pub fn report_file_name(generated_at: &NaiveDateTime) -> String {
    format!("match_report_{}.html", generated_at.format("%Y%m%d_%H%M%S"))
}

pub fn generate_html_report(
    outcome: &JoinOutcome,
    tolerance: TimeDelta,
    generated_at: &NaiveDateTime,
) -> String {
    let mut html = String::new();

    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>4x20 draws and weather - {}</title>
    <style>
        body {{
            font-family: 'Segoe UI', Tahoma, Geneva, sans-serif;
            margin: 0;
            padding: 20px;
            background: #edf2f7;
        }}
        .container {{
            max-width: 1200px;
            margin: 0 auto;
            background: white;
            border-radius: 15px;
            box-shadow: 0 20px 40px rgba(0,0,0,0.1);
            overflow: hidden;
        }}
        .header {{
            background: linear-gradient(135deg, #4834d4, #686de0);
            color: white;
            padding: 30px;
            text-align: center;
        }}
        .content {{
            padding: 30px;
        }}
        .stats-grid {{
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(200px, 1fr));
            gap: 15px;
            margin-bottom: 30px;
        }}
        .stat-item {{
            background: #f8f9ff;
            padding: 15px;
            border-radius: 8px;
            text-align: center;
        }}
        .stat-number {{
            font-size: 2em;
            font-weight: 700;
            color: #4834d4;
        }}
        .stat-label {{
            color: #718096;
            font-size: 0.9em;
        }}
        table {{
            width: 100%;
            border-collapse: collapse;
            margin-bottom: 30px;
        }}
        th, td {{
            padding: 8px;
            border-bottom: 1px solid #e2e8f0;
            text-align: left;
        }}
        .balls {{
            font-family: 'Courier New', monospace;
        }}
        .unmatched td {{
            color: #c53030;
        }}
        .footer {{
            background: #2d3748;
            color: white;
            padding: 20px;
            text-align: center;
            font-size: 0.9em;
        }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>🎰 4x20 draws and weather</h1>
            <div>{}</div>
        </div>
        <div class="content">
            <div class="stats-grid">
                <div class="stat-item">
                    <div class="stat-number">{}</div>
                    <div class="stat-label">matched draws</div>
                </div>
                <div class="stat-item">
                    <div class="stat-number">{}</div>
                    <div class="stat-label">unmatched draws</div>
                </div>
                <div class="stat-item">
                    <div class="stat-number">{}</div>
                    <div class="stat-label">tolerance, minutes</div>
                </div>
            </div>
"#,
        format_timestamp(generated_at),
        summary_line(outcome),
        outcome.matched_count(),
        outcome.unmatched_count(),
        tolerance.num_minutes()
    ));

    if !outcome.matched.is_empty() {
        html.push_str(
            r#"            <h2>Matched draws</h2>
            <table>
                <tr><th>Draw</th><th>Draw time</th><th>Numbers</th><th>Observed</th><th>°C</th><th>%</th><th>mmHg</th><th>m/s</th><th>Wind</th><th>Precipitation</th><th>Δ min</th></tr>
"#,
        );
        for r in &outcome.matched {
            html.push_str(&format!(
                r#"                <tr><td>{}</td><td>{}</td><td class="balls">{}</td><td>{}</td><td>{:.1}</td><td>{}</td><td>{}</td><td>{:.2}</td><td>{}</td><td>{}</td><td>{}</td></tr>
"#,
                r.draw.draw_number,
                format_timestamp(&r.draw.draw_time),
                format_balls(&r.draw.numbers),
                format_timestamp(&r.weather.observation_time),
                r.weather.temperature,
                r.weather.humidity,
                r.weather.pressure,
                r.weather.wind_speed,
                r.weather.wind_direction,
                r.weather.precipitation,
                r.time_delta_minutes
            ));
        }
        html.push_str("            </table>\n");
    }

    if !outcome.unmatched.is_empty() {
        html.push_str(
            r#"            <h2>Unmatched draws</h2>
            <table>
                <tr><th>Draw</th><th>Draw time</th><th>Reason</th></tr>
"#,
        );
        for entry in &outcome.unmatched {
            html.push_str(&format!(
                r#"                <tr class="unmatched"><td>{}</td><td>{}</td><td>{}</td></tr>
"#,
                entry.draw.draw_number,
                format_timestamp(&entry.draw.draw_time),
                unmatched_reason(entry)
            ));
        }
        html.push_str("            </table>\n");
    }

    html.push_str(&format!(
        r#"        </div>
        <div class="footer">
            <p>📅 Generated {}</p>
        </div>
    </div>
</body>
</html>
"#,
        format_timestamp(generated_at)
    ));

    html
}

/// Writes `html_content` to `report_path/filename`, creating the directory.
pub fn save_html_report_to_path(
    html_content: &str,
    filename: &str,
    report_path: &Path,
) -> Result<PathBuf> {
    let filepath = report_path.join(filename);

    if let Some(parent) = filepath.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut file = File::create(&filepath)
        .with_context(|| format!("Failed to create {}", filepath.display()))?;
    file.write_all(html_content.as_bytes())?;
    Ok(filepath)
}
