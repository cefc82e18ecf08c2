use anyhow::{Context, Result};
use fourth_down::{
    aggregate::AggregateOutput,
    analysis::{Artifact, ChartKind},
    report::Report,
};
use itertools::Itertools;
use polars::prelude::*;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

/// Writes one CSV per artifact plus `summary.json` and `index.html`.
/// Returns the number of CSV files written.
pub fn write_report(out: &Path, report: &Report) -> Result<usize> {
    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;

    for artifact in &report.artifacts {
        write_csv(out, artifact)?;
    }

    let summary_path = out.join("summary.json");
    let file = File::create(&summary_path)
        .with_context(|| format!("creating {}", summary_path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &report.summary)?;
    log::debug!("Wrote {}", summary_path.display());

    let index_path = out.join("index.html");
    fs::write(&index_path, index_html(report))
        .with_context(|| format!("writing {}", index_path.display()))?;
    log::debug!("Wrote {}", index_path.display());

    Ok(report.artifacts.len())
}

fn write_csv(out: &Path, artifact: &Artifact) -> Result<()> {
    let path = out.join(format!("{}.csv", artifact.slug));

    // Heatmaps draw unobserved cells as zero
    let mut df = match (&artifact.chart, &artifact.output) {
        (ChartKind::Heatmap, AggregateOutput::Matrix(pivot)) => {
            AggregateOutput::Matrix(pivot.zero_filled()).to_dataframe()?
        }
        (_, output) => output.to_dataframe()?,
    };

    let mut file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .with_context(|| format!("writing {}", path.display()))?;
    file.flush()?;
    log::debug!("Wrote {} ({} rows)", path.display(), df.height());
    Ok(())
}

fn index_html(report: &Report) -> String {
    let summary = &report.summary;
    let items = report
        .artifacts
        .iter()
        .map(|artifact| {
            format!(
                "    <li><a href=\"{slug}.csv\">{title}</a> <small>{chart}</small></li>",
                slug = artifact.slug,
                title = escape(&artifact.title),
                chart = artifact.chart,
            )
        })
        .join("\n");

    let rate = |value: Option<f64>| value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}%"));

    format!(
        "<!DOCTYPE html>
<html>
<head><meta charset=\"utf-8\"><title>4th Down Analysis</title></head>
<body>
  <h1>4th Down Analysis</h1>
  <p>{total} 4th downs, {go} go-for-it attempts ({go_rate}), success rate {success}.</p>
  <p><a href=\"summary.json\">summary.json</a></p>
  <ul>
{items}
  </ul>
</body>
</html>
",
        total = summary.total_fourth_downs,
        go = summary.go_attempts.map_or_else(|| "n/a".to_string(), |go| go.to_string()),
        go_rate = rate(summary.go_for_it_rate),
        success = rate(summary.success_rate),
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use fourth_down::{
        analysis,
        pbp::{self, PlayFilter, SourceLayout},
        report,
    };
    use tempfile::TempDir;

    // A converted midfield run and a punt from the opponent's 25.
    fn sample_report(data: &Path) -> Result<Report> {
        let mut df = df!(
            "season" => &[2020i32, 2020],
            "week" => &[1i32, 2],
            "posteam" => &["PHI", "DAL"],
            "defteam" => &["DAL", "PHI"],
            "down" => &[4.0, 4.0],
            "play_type" => &["run", "punt"],
            "ydstogo" => &[1.0, 10.0],
            "yardline_100" => &[45.0, 75.0],
            "wp" => &[0.5, 0.5],
            "fourth_down_converted" => &[1.0, 0.0],
            "fourth_down_failed" => &[0.0, 0.0],
            "qtr" => &[2i32, 3],
            "game_seconds_remaining" => &[2000.0, 1500.0]
        )?;
        let mut file = File::create(data.join("play_by_play_2020.parquet"))?;
        ParquetWriter::new(&mut file).finish(&mut df)?;

        let (table, load) = pbp::load_seasons(&SourceLayout::new(data), &[2020], PlayFilter::new())?;
        Ok(report::build_report(&table, &load, &analysis::standard_catalog())?)
    }

    #[test]
    fn writes_one_csv_per_artifact() -> Result<()> {
        let data = TempDir::new()?;
        let out = TempDir::new()?;
        let report = sample_report(data.path())?;

        let written = write_report(out.path(), &report)?;
        assert_eq!(written, report.artifacts.len());
        assert!(written > 0);
        for artifact in &report.artifacts {
            assert!(out.path().join(format!("{}.csv", artifact.slug)).exists(), "{}", artifact.slug);
        }

        let index = fs::read_to_string(out.path().join("index.html"))?;
        assert!(index.contains("<a href=\"field_distance_heatmap.csv\">"));
        Ok(())
    }

    #[test]
    fn heatmap_csv_is_zero_filled() -> Result<()> {
        let data = TempDir::new()?;
        let out = TempDir::new()?;
        write_report(out.path(), &sample_report(data.path())?)?;

        let heatmap = fs::read_to_string(out.path().join("field_distance_heatmap.csv"))?;
        let mut lines = heatmap.lines();
        assert_eq!(lines.next(), Some("field_position,1,10"));
        let rows: Vec<&str> = lines.collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("Own 41-50,100"));
        assert!(rows[1].starts_with("Opp 20-29,0"));
        assert!(rows.iter().all(|row| row.split(',').all(|cell| !cell.is_empty())));

        // Line charts keep unobserved cells empty.
        let trends = fs::read_to_string(out.path().join("yearly_field_position_trends.csv"))?;
        assert_eq!(trends.lines().next(), Some("season,Own 41-50,Opp 40-49"));
        assert!(trends.lines().nth(1).is_some_and(|row| row.starts_with("2020,100") && row.ends_with(',')));
        Ok(())
    }

    #[test]
    fn summary_json_carries_headline_values() -> Result<()> {
        let data = TempDir::new()?;
        let out = TempDir::new()?;
        write_report(out.path(), &sample_report(data.path())?)?;

        let summary: serde_json::Value =
            serde_json::from_reader(File::open(out.path().join("summary.json"))?)?;
        assert_eq!(summary["total_fourth_downs"], 2);
        assert_eq!(summary["go_attempts"], 1);
        assert_eq!(summary["kicks"], 1);
        assert_eq!(summary["go_for_it_rate"], 50.0);
        assert_eq!(summary["success_rate"], 100.0);
        assert_eq!(summary["seasons_loaded"], serde_json::json!([2020]));
        assert_eq!(summary["qb_sneaks"]["method"], "unavailable");
        assert!(summary["skipped_analyses"].is_array());
        Ok(())
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("Run <vs> Pass & more"), "Run &lt;vs&gt; Pass &amp; more");
    }
}
