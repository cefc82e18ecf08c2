use crate::{
    aggregate::{self, aggregate, AggregateOutput, AggregateRequest, Flag, GroupKey, Grouping, Metric, Population},
    error::Error,
    features::{Feature, SHORT_YARDAGE},
    play::Column,
    table::FourthDowns,
    Result,
};
use polars::prelude::*;
use serde::Serialize;

const SNEAK_DISTANCE_MIN_SAMPLE: usize = 5;

/// Counts behind the sneak heuristics. Reported for comparison only; the
/// strict rusher-is-passer count never feeds a published rate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SneakDiagnostics {
    pub go_attempts: usize,
    pub rusher_present: usize,
    pub passer_present: usize,
    pub short_yardage: usize,
    /// `None` when no season carries passer names.
    pub strict_matches: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SneakReport {
    pub go_attempts: usize,
    pub sneaks: usize,
    pub sneak_share: Option<f64>,
    pub sneak_success_rate: Option<f64>,
    pub non_sneak_success_rate: Option<f64>,
    /// Sneak conversion rate by yards to go, groups of 5+ only.
    pub by_distance: Option<AggregateOutput>,
    /// Sneak share of go attempts by season.
    pub usage_by_season: Option<AggregateOutput>,
    pub success_by_season: Option<AggregateOutput>,
    pub diagnostics: SneakDiagnostics,
}

/// Sneaks found by matching play descriptions, with no distance or rusher
/// corroboration.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FallbackReport {
    pub matches: usize,
    /// `None` when conversion flags are unavailable.
    pub conversions: Option<usize>,
    pub success_rate: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SneakDetection {
    /// The short-yardage run heuristic found at least one sneak.
    Heuristic(SneakReport),
    /// The heuristic found nothing; descriptions were searched instead.
    DescriptionFallback(FallbackReport),
    /// Neither the heuristic's columns nor descriptions are available.
    Unavailable,
}

pub fn analyze_sneaks(table: &FourthDowns) -> Result<SneakDetection> {
    log::trace!("sneak::analyze_sneaks");

    if table.has(Feature::QbSneak) {
        let [sneaks] = table.tally(Feature::QbSneak.col(), [Feature::QbSneak.col()])?;
        log::info!("QB sneaks (run plays, ydstogo <= {}): {}", SHORT_YARDAGE, sneaks);
        if sneaks > 0 {
            return Ok(SneakDetection::Heuristic(heuristic_report(table, sneaks)?));
        }
    }

    if table.has(Feature::SneakMention) {
        log::warn!("No QB sneaks from the run heuristic; falling back to play descriptions");
        return Ok(SneakDetection::DescriptionFallback(fallback_report(table)?));
    }

    log::warn!("No QB sneak data available");
    Ok(SneakDetection::Unavailable)
}

fn heuristic_report(table: &FourthDowns, sneaks: usize) -> Result<SneakReport> {
    let went = Feature::WentForIt.col();
    let sneak = Feature::QbSneak.col();
    let [go_attempts] = table.tally(went.clone(), [went.clone()])?;

    let (sneak_success_rate, non_sneak_success_rate) = if table.has(Feature::Converted) {
        let converted = Feature::Converted.col();
        let [sneak_conversions, other_conversions] = table.tally(
            went,
            [
                sneak.clone().and(converted.clone()),
                sneak.not().and(converted),
            ],
        )?;
        (
            aggregate::rate(sneak_conversions, sneaks),
            aggregate::rate(other_conversions, go_attempts - sneaks),
        )
    } else {
        log::warn!("No conversion flags; sneak success rates left out");
        (None, None)
    };

    let by_distance = optional(aggregate(
        table,
        &AggregateRequest::new(
            Population::QbSneaks,
            Grouping::Single(GroupKey::YardsToGo),
            Metric::Rate(Flag::Converted),
        )
        .min_sample(SNEAK_DISTANCE_MIN_SAMPLE),
    ))?;
    let usage_by_season = optional(aggregate(
        table,
        &AggregateRequest::new(
            Population::GoAttempts,
            Grouping::Single(GroupKey::Season),
            Metric::Rate(Flag::QbSneak),
        ),
    ))?;
    let success_by_season = optional(aggregate(
        table,
        &AggregateRequest::new(
            Population::QbSneaks,
            Grouping::Single(GroupKey::Season),
            Metric::Rate(Flag::Converted),
        ),
    ))?;

    let report = SneakReport {
        go_attempts,
        sneaks,
        sneak_share: aggregate::rate(sneaks, go_attempts),
        sneak_success_rate,
        non_sneak_success_rate,
        by_distance,
        usage_by_season,
        success_by_season,
        diagnostics: diagnostics(table)?,
    };
    log::info!(
        "QB sneak share {:?}%, success {:?}% vs {:?}% for other attempts",
        report.sneak_share,
        report.sneak_success_rate,
        report.non_sneak_success_rate
    );
    Ok(report)
}

pub fn diagnostics(table: &FourthDowns) -> Result<SneakDiagnostics> {
    table.columns().require(Feature::QbSneak.required_columns())?;
    let went = Feature::WentForIt.col();
    let [go_attempts, rusher_present, passer_present, short_yardage] = table.tally(
        went.clone(),
        [
            went.clone(),
            Column::RusherPlayerName.col().is_not_null(),
            Column::PasserPlayerName.col().is_not_null(),
            Column::Ydstogo.col().lt_eq(lit(SHORT_YARDAGE)),
        ],
    )?;
    let strict_matches = if table.has(Feature::QbSneakStrict) {
        let [strict] = table.tally(went, [Feature::QbSneakStrict.col()])?;
        Some(strict)
    } else {
        None
    };

    let diagnostics = SneakDiagnostics {
        go_attempts,
        rusher_present,
        passer_present,
        short_yardage,
        strict_matches,
    };
    log::debug!("Sneak diagnostics: {:?}", diagnostics);
    Ok(diagnostics)
}

fn fallback_report(table: &FourthDowns) -> Result<FallbackReport> {
    let mention = Feature::SneakMention.col();
    let [matches] = table.tally(mention.clone(), [mention.clone()])?;
    let conversions = if table.has(Feature::Converted) {
        let [conversions] = table.tally(mention, [Feature::Converted.col()])?;
        Some(conversions)
    } else {
        None
    };

    log::info!("Found {} potential QB sneaks from play descriptions", matches);
    Ok(FallbackReport {
        matches,
        conversions,
        success_rate: conversions.and_then(|conversions| aggregate::rate(conversions, matches)),
    })
}

// A sub-table that ends up empty after its sample threshold, or that lacks
// its columns, is left out.
fn optional(result: Result<AggregateOutput>) -> Result<Option<AggregateOutput>> {
    match result {
        Ok(output) => Ok(Some(output)),
        Err(Error::EmptyAggregate { min_sample }) => {
            log::warn!("Sneak sub-table had no groups with {}+ attempts", min_sample);
            Ok(None)
        }
        Err(Error::MissingColumns(columns)) => {
            log::warn!("Sneak sub-table skipped; missing {:?}", columns);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::GroupValue;
    use crate::play::{ColumnSet, PlayType};
    use crate::table::fixture::{table, table_with, Play};

    fn run(season: i32, ydstogo: i32, rusher: Option<&'static str>, converted: bool) -> Play {
        Play {
            ydstogo: Some(ydstogo),
            rusher,
            converted,
            ..Play::new(season, PlayType::Run)
        }
    }

    #[test]
    fn heuristic_path_reports_rates() -> Result<()> {
        let mut plays: Vec<Play> = (0..6).map(|i| run(2022, 1, Some("J.Hurts"), i < 5)).collect();
        plays.push(run(2022, 4, Some("M.Sanders"), false));
        plays.push(Play::new(2022, PlayType::Pass).to_go(6).converted());
        plays.push(Play::new(2022, PlayType::Punt));
        let fourths = table(&plays)?;

        let SneakDetection::Heuristic(report) = analyze_sneaks(&fourths)? else {
            panic!("expected the heuristic path");
        };
        assert_eq!(report.go_attempts, 8);
        assert_eq!(report.sneaks, 6);
        assert_eq!(report.sneak_share, Some(75.0));
        assert_eq!(report.sneak_success_rate, Some(83.3));
        assert_eq!(report.non_sneak_success_rate, Some(50.0));

        let by_distance = report.by_distance.expect("six sneaks at one yard");
        assert_eq!(by_distance.len(), 1);
        let usage = report.usage_by_season.expect("usage by season");
        assert_eq!(usage.rows().and_then(|r| r.value(&[GroupValue::Number(2022)])), Some(75.0));
        Ok(())
    }

    #[test]
    fn strict_heuristic_stays_diagnostic() -> Result<()> {
        let plays = vec![
            run(2010, 1, Some("T.Brady"), true).passer("T.Brady"),
            run(2010, 1, Some("B.Green-Ellis"), true),
        ];
        let SneakDetection::Heuristic(report) = analyze_sneaks(&table(&plays)?)? else {
            panic!("expected the heuristic path");
        };
        assert_eq!(report.sneaks, 2);
        assert_eq!(report.diagnostics.strict_matches, Some(1));
        assert_eq!(report.diagnostics.passer_present, 1);
        assert_eq!(report.diagnostics.short_yardage, 2);
        assert!(report.by_distance.is_none());
        Ok(())
    }

    #[test]
    fn strict_count_needs_passer_names() -> Result<()> {
        let mut columns = ColumnSet::all();
        columns.remove(Column::PasserPlayerName);
        let fourths = table_with(&[run(2010, 1, Some("T.Brady"), true)], columns)?;
        assert_eq!(diagnostics(&fourths)?.strict_matches, None);
        Ok(())
    }

    #[test]
    fn falls_back_to_descriptions_without_rusher_names() -> Result<()> {
        let mut columns = ColumnSet::all();
        columns.remove(Column::RusherPlayerName);
        let plays = vec![
            run(2005, 1, None, true).desc("(0:42) 12-T.Brady up the middle, QB Sneak for 1 yard"),
            run(2005, 1, None, false).desc("Quarterback sneak, no gain"),
            Play::new(2005, PlayType::Punt).desc("punts 44 yards"),
        ];

        let detection = analyze_sneaks(&table_with(&plays, columns)?)?;
        assert_eq!(
            detection,
            SneakDetection::DescriptionFallback(FallbackReport {
                matches: 2,
                conversions: Some(1),
                success_rate: Some(50.0),
            })
        );
        Ok(())
    }

    #[test]
    fn zero_heuristic_sneaks_also_fall_back() -> Result<()> {
        let fourths = table(&[run(2015, 5, Some("L.Bell"), true)])?;
        assert!(matches!(
            analyze_sneaks(&fourths)?,
            SneakDetection::DescriptionFallback(FallbackReport { matches: 0, .. })
        ));
        Ok(())
    }

    #[test]
    fn fallback_without_conversion_flags_has_no_rate() -> Result<()> {
        let mut columns = ColumnSet::all();
        columns.remove(Column::RusherPlayerName);
        columns.remove(Column::FourthDownConverted);
        let plays = vec![run(2003, 1, None, true).desc("QB sneak for 1 yard")];
        let detection = analyze_sneaks(&table_with(&plays, columns)?)?;
        assert_eq!(
            detection,
            SneakDetection::DescriptionFallback(FallbackReport {
                matches: 1,
                conversions: None,
                success_rate: None,
            })
        );
        Ok(())
    }

    #[test]
    fn unavailable_without_names_or_descriptions() -> Result<()> {
        let mut columns = ColumnSet::all();
        columns.remove(Column::RusherPlayerName);
        columns.remove(Column::Desc);
        let fourths = table_with(&[run(2001, 1, None, true)], columns)?;
        assert_eq!(analyze_sneaks(&fourths)?, SneakDetection::Unavailable);
        Ok(())
    }
}
