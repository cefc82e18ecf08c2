use crate::{
    aggregate,
    analysis::{self, Analysis, AnalysisOutcome, Artifact},
    features::Feature,
    pbp::LoadReport,
    sneak::{self, FallbackReport, SneakDetection, SneakDiagnostics},
    table::FourthDowns,
    Result,
};
use serde::Serialize;

/// Which sneak signal produced the headline numbers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SneakSummary {
    Heuristic {
        sneaks: usize,
        share: Option<f64>,
        success_rate: Option<f64>,
        non_sneak_success_rate: Option<f64>,
        diagnostics: SneakDiagnostics,
    },
    DescriptionFallback(FallbackReport),
    Unavailable,
}

impl From<&SneakDetection> for SneakSummary {
    fn from(detection: &SneakDetection) -> Self {
        match detection {
            SneakDetection::Heuristic(report) => SneakSummary::Heuristic {
                sneaks: report.sneaks,
                share: report.sneak_share,
                success_rate: report.sneak_success_rate,
                non_sneak_success_rate: report.non_sneak_success_rate,
                diagnostics: report.diagnostics.clone(),
            },
            SneakDetection::DescriptionFallback(report) => SneakSummary::DescriptionFallback(report.clone()),
            SneakDetection::Unavailable => SneakSummary::Unavailable,
        }
    }
}

/// Headline values handed to the page assembler.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunSummary {
    pub total_fourth_downs: usize,
    pub seasons_loaded: Vec<i32>,
    pub seasons_skipped: Vec<i32>,
    /// `None` when some loaded season lacks `play_type`.
    pub go_attempts: Option<usize>,
    pub kicks: Option<usize>,
    /// `None` when conversion flags are unavailable.
    pub conversions: Option<usize>,
    pub success_rate: Option<f64>,
    pub go_for_it_rate: Option<f64>,
    pub artifacts: usize,
    pub skipped_analyses: Vec<String>,
    pub qb_sneaks: SneakSummary,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub summary: RunSummary,
    pub artifacts: Vec<Artifact>,
    pub sneaks: SneakDetection,
}

/// Runs `catalog` and the sneak sub-analysis over a loaded table.
pub fn build_report(table: &FourthDowns, load: &LoadReport, catalog: &[Analysis]) -> Result<Report> {
    log::trace!("report::build_report");
    let go_attempts = if table.has(Feature::WentForIt) {
        let went = Feature::WentForIt.col();
        let [go_attempts] = table.tally(went.clone(), [went])?;
        log::info!("Total 'go for it' attempts: {}", go_attempts);
        Some(go_attempts)
    } else {
        log::warn!("No play types; go-for-it totals left out");
        None
    };
    let conversions = match go_attempts {
        Some(_) if table.has(Feature::Converted) => {
            let [conversions] = table.tally(Feature::WentForIt.col(), [Feature::Converted.col()])?;
            Some(conversions)
        }
        _ => None,
    };

    let mut artifacts = Vec::new();
    let mut skipped_analyses = Vec::new();
    for outcome in analysis::run_catalog(table, catalog) {
        match outcome {
            AnalysisOutcome::Produced(artifact) => artifacts.push(artifact),
            AnalysisOutcome::Skipped { slug, .. } => skipped_analyses.push(slug),
        }
    }

    let sneaks = sneak::analyze_sneaks(table)?;
    artifacts.extend(analysis::sneak_artifacts(&sneaks));

    let summary = RunSummary {
        total_fourth_downs: table.len(),
        seasons_loaded: load.loaded.iter().map(|(season, _)| *season).collect(),
        seasons_skipped: load.skipped.clone(),
        go_attempts,
        kicks: go_attempts.map(|go| table.len() - go),
        conversions,
        success_rate: conversions.zip(go_attempts).and_then(|(c, go)| aggregate::rate(c, go)),
        go_for_it_rate: go_attempts.and_then(|go| aggregate::rate(go, table.len())),
        artifacts: artifacts.len(),
        skipped_analyses,
        qb_sneaks: SneakSummary::from(&sneaks),
    };
    log::info!(
        "Success rate {:?}% over {:?} attempts; {} artifacts, {} analyses skipped",
        summary.success_rate,
        summary.go_attempts,
        summary.artifacts,
        summary.skipped_analyses.len()
    );

    Ok(Report {
        summary,
        artifacts,
        sneaks,
    })
}
