use crate::{
    aggregate::{
        aggregate, AggregateOutput, AggregateRequest, GroupKey, GroupValue, Grouping, Population, RowOrder,
    },
    error::Error,
    features::{FieldPosition, PlayStrategy, TimeCategory},
    sneak::SneakDetection,
    table::FourthDowns,
    Result,
};
use parse_display::Display;
use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, Serialize)]
#[display(style = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    GroupedBar,
    Line,
    Heatmap,
}

/// Post-processing applied to a pivot table after aggregation.
#[derive(Clone, Debug, PartialEq)]
pub enum Reshape {
    None,
    SelectColumns(Vec<GroupValue>),
    /// Row percentages of counts, then keep the listed columns.
    RowShares(Vec<GroupValue>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Analysis {
    pub slug: &'static str,
    pub title: &'static str,
    pub chart: ChartKind,
    pub request: AggregateRequest,
    pub reshape: Reshape,
}

impl Analysis {
    fn new(slug: &'static str, title: &'static str, chart: ChartKind, request: AggregateRequest) -> Self {
        Self {
            slug,
            title,
            chart,
            request,
            reshape: Reshape::None,
        }
    }

    fn reshape(mut self, reshape: Reshape) -> Self {
        self.reshape = reshape;
        self
    }

    pub fn run(&self, table: &FourthDowns) -> Result<AggregateOutput> {
        let output = aggregate(table, &self.request)?;
        let output = match (&self.reshape, output) {
            (Reshape::None, output) => output,
            (Reshape::SelectColumns(columns), AggregateOutput::Matrix(pivot)) => {
                AggregateOutput::Matrix(pivot.select_columns(columns))
            }
            (Reshape::RowShares(columns), AggregateOutput::Matrix(pivot)) => {
                AggregateOutput::Matrix(pivot.row_shares()?.select_columns(columns))
            }
            (_, AggregateOutput::Rows(_)) => {
                return Err(Error::InvalidRequest(format!(
                    "{} reshapes a long-form table",
                    self.slug
                )));
            }
        };
        if output.is_empty() {
            return Err(Error::EmptyAggregate {
                min_sample: self.request.min_sample,
            });
        }
        Ok(output)
    }
}

/// A finished table ready for the report renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct Artifact {
    pub slug: String,
    pub title: String,
    pub chart: ChartKind,
    pub output: AggregateOutput,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnalysisOutcome {
    Produced(Artifact),
    Skipped { slug: String, reason: String },
}

/// Runs each analysis on its own; one failing analysis never stops the rest.
pub fn run_catalog(table: &FourthDowns, catalog: &[Analysis]) -> Vec<AnalysisOutcome> {
    catalog
        .iter()
        .map(|analysis| match analysis.run(table) {
            Ok(output) => {
                log::info!("{}: {} rows", analysis.slug, output.len());
                AnalysisOutcome::Produced(Artifact {
                    slug: analysis.slug.to_string(),
                    title: analysis.title.to_string(),
                    chart: analysis.chart,
                    output,
                })
            }
            Err(err) => {
                log::warn!("Skipping {}: {}", analysis.slug, err);
                AnalysisOutcome::Skipped {
                    slug: analysis.slug.to_string(),
                    reason: err.to_string(),
                }
            }
        })
        .collect()
}

/// Chart tables for the sneak sub-analysis. Only the heuristic path has any.
pub fn sneak_artifacts(detection: &SneakDetection) -> Vec<Artifact> {
    let SneakDetection::Heuristic(report) = detection else {
        return Vec::new();
    };
    let tables = [
        (
            "qb_sneak_success_by_distance",
            "QB Sneak Success Rate by Distance",
            ChartKind::Bar,
            &report.by_distance,
        ),
        (
            "qb_sneak_usage_trends",
            "QB Sneak Usage Trends by Year",
            ChartKind::Line,
            &report.usage_by_season,
        ),
        (
            "qb_sneak_success_trends",
            "QB Sneak Success Rate Trends by Year",
            ChartKind::Line,
            &report.success_by_season,
        ),
    ];
    tables
        .into_iter()
        .filter_map(|(slug, title, chart, output)| {
            output.as_ref().map(|output| Artifact {
                slug: slug.to_string(),
                title: title.to_string(),
                chart,
                output: output.clone(),
            })
        })
        .collect()
}

fn field(band: FieldPosition) -> GroupValue {
    GroupValue::Field(band)
}

/// The fixed set of fourth-down analyses.
pub fn standard_catalog() -> Vec<Analysis> {
    use ChartKind::*;

    vec![
        Analysis::new(
            "decision_counts",
            "Go vs Kick",
            Bar,
            AggregateRequest::count(Population::All, Grouping::Single(GroupKey::Decision)),
        ),
        Analysis::new(
            "yearly_trends",
            "4th Down Decision Trends by Year",
            Line,
            AggregateRequest::count(Population::All, Grouping::Pair(GroupKey::Season, GroupKey::Decision)),
        ),
        Analysis::new(
            "success_rate_by_distance",
            "4th Down Success Rate by Distance to Go",
            Bar,
            AggregateRequest::success_rate(Grouping::Single(GroupKey::YardsToGo)).min_sample(10),
        ),
        Analysis::new(
            "time_aggression",
            "4th Down Go-for-it Rate by Time in Game",
            Bar,
            AggregateRequest::go_for_it_rate(Grouping::Single(GroupKey::TimeCategory))
                .order(RowOrder::ValueDescending),
        ),
        Analysis::new(
            "quarter_aggression",
            "4th Down Go-for-it Rate by Quarter",
            Bar,
            AggregateRequest::go_for_it_rate(Grouping::Single(GroupKey::Quarter)),
        ),
        Analysis::new(
            "strategy_counts",
            "Play Type Breakdown on Go-for-it Attempts",
            Bar,
            AggregateRequest::count(Population::GoAttempts, Grouping::Single(GroupKey::PlayStrategy))
                .order(RowOrder::ValueDescending),
        ),
        Analysis::new(
            "run_vs_pass_success",
            "4th Down Success Rate: Run vs Pass",
            Bar,
            AggregateRequest::success_rate(Grouping::Single(GroupKey::PlayStrategy)).min_sample(100),
        ),
        Analysis::new(
            "run_vs_pass_by_distance",
            "4th Down Success Rate by Distance: Run vs Pass",
            GroupedBar,
            AggregateRequest::success_rate(Grouping::Pivot {
                rows: GroupKey::YardsToGo,
                columns: GroupKey::PlayStrategy,
            })
            .min_sample(20),
        ),
        Analysis::new(
            "field_position_aggression",
            "4th Down Go-for-it Rate by Field Position",
            Bar,
            AggregateRequest::go_for_it_rate(Grouping::Single(GroupKey::FieldPosition))
                .order(RowOrder::Reindexed),
        ),
        Analysis::new(
            "field_position_success",
            "4th Down Success Rate by Field Position",
            Bar,
            AggregateRequest::success_rate(Grouping::Single(GroupKey::FieldPosition))
                .min_sample(50)
                .order(RowOrder::Reindexed),
        ),
        Analysis::new(
            "red_zone_aggression",
            "Go-for-it Rate: Red Zone vs Non-Red Zone",
            Bar,
            AggregateRequest::go_for_it_rate(Grouping::Single(GroupKey::RedZone)),
        ),
        Analysis::new(
            "yearly_success_trends",
            "4th Down Success Rate Trends by Year",
            Line,
            AggregateRequest::success_rate(Grouping::Single(GroupKey::Season)),
        ),
        Analysis::new(
            "yearly_strategy_trends",
            "Run vs Pass Strategy Trends by Year",
            Line,
            AggregateRequest::count(
                Population::GoAttempts,
                Grouping::Pivot {
                    rows: GroupKey::Season,
                    columns: GroupKey::PlayStrategy,
                },
            ),
        )
        .reshape(Reshape::RowShares(vec![
            GroupValue::Strategy(PlayStrategy::Run),
            GroupValue::Strategy(PlayStrategy::Pass),
        ])),
        Analysis::new(
            "yearly_field_position_trends",
            "Midfield 4th Down Aggression Trends by Year",
            Line,
            AggregateRequest::go_for_it_rate(Grouping::Pivot {
                rows: GroupKey::Season,
                columns: GroupKey::FieldPosition,
            }),
        )
        .reshape(Reshape::SelectColumns(vec![
            field(FieldPosition::Own41To50),
            field(FieldPosition::Opp40To49),
        ])),
        Analysis::new(
            "yearly_red_zone_trends",
            "Red Zone 4th Down Aggression Trends by Year",
            Line,
            AggregateRequest::go_for_it_rate(Grouping::Pivot {
                rows: GroupKey::Season,
                columns: GroupKey::FieldPosition,
            }),
        )
        .reshape(Reshape::SelectColumns(vec![
            field(FieldPosition::Opp10To19),
            field(FieldPosition::Opp1To9),
        ])),
        Analysis::new(
            "yearly_time_trends",
            "Time-Based 4th Down Aggression Trends by Year",
            Line,
            AggregateRequest::go_for_it_rate(Grouping::Pivot {
                rows: GroupKey::Season,
                columns: GroupKey::TimeCategory,
            }),
        )
        .reshape(Reshape::SelectColumns(vec![
            GroupValue::Time(TimeCategory::FirstHalf),
            GroupValue::Time(TimeCategory::FinalFiveMinutes),
        ])),
        Analysis::new(
            "field_distance_heatmap",
            "4th Down Go-for-it Rate Heatmap: Field Position vs Distance",
            Heatmap,
            AggregateRequest::go_for_it_rate(Grouping::Pivot {
                rows: GroupKey::FieldPosition,
                columns: GroupKey::YardsToGo,
            }),
        ),
        Analysis::new(
            "field_distance_success_heatmap",
            "4th Down Success Rate Heatmap: Field Position vs Distance",
            Heatmap,
            AggregateRequest::success_rate(Grouping::Pivot {
                rows: GroupKey::FieldPosition,
                columns: GroupKey::YardsToGo,
            })
            .min_sample(20),
        ),
        Analysis::new(
            "time_field_heatmap",
            "4th Down Go-for-it Rate Heatmap: Time vs Field Position",
            Heatmap,
            AggregateRequest::go_for_it_rate(Grouping::Pivot {
                rows: GroupKey::TimeCategory,
                columns: GroupKey::FieldPosition,
            }),
        ),
        Analysis::new(
            "yearly_field_heatmap",
            "4th Down Go-for-it Rate Heatmap: Year vs Field Position",
            Heatmap,
            AggregateRequest::go_for_it_rate(Grouping::Pivot {
                rows: GroupKey::Season,
                columns: GroupKey::FieldPosition,
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::play::{Column, ColumnSet, PlayType};
    use crate::table::fixture::{table, table_with, Play};
    use itertools::Itertools;

    fn fourth(season: i32, play_type: PlayType, yardline: f64, seconds: f64) -> Play {
        Play {
            qtr: Some(4),
            converted: play_type == PlayType::Run,
            ..Play::new(season, play_type).at(yardline).clock(seconds).to_go(1)
        }
    }

    #[test]
    fn catalog_slugs_are_unique() {
        let catalog = standard_catalog();
        assert_eq!(catalog.len(), 20);
        assert!(catalog.iter().map(|analysis| analysis.slug).all_unique());
    }

    #[test]
    fn catalog_requests_are_valid() {
        for analysis in standard_catalog() {
            assert!(
                analysis.request.validate(&ColumnSet::all()).is_ok(),
                "{} should validate",
                analysis.slug
            );
        }
    }

    #[test]
    fn failures_are_isolated_per_analysis() -> Result<()> {
        let mut columns = ColumnSet::all();
        columns.remove(Column::Ydstogo);
        let plays = vec![
            fourth(2020, PlayType::Run, 45.0, 3000.0),
            fourth(2020, PlayType::Punt, 75.0, 100.0),
        ];
        let outcomes = run_catalog(&table_with(&plays, columns)?, &standard_catalog());
        assert_eq!(outcomes.len(), 20);

        let skipped: Vec<&str> = outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                AnalysisOutcome::Skipped { slug, .. } => Some(slug.as_str()),
                AnalysisOutcome::Produced(_) => None,
            })
            .collect();
        assert!(skipped.contains(&"success_rate_by_distance"));
        assert!(skipped.contains(&"field_distance_heatmap"));
        assert!(skipped.contains(&"run_vs_pass_success"));
        assert!(!skipped.contains(&"decision_counts"));
        assert!(!skipped.contains(&"time_field_heatmap"));
        Ok(())
    }

    #[test]
    fn midfield_trends_keep_selected_bands() -> Result<()> {
        let plays = vec![
            fourth(2018, PlayType::Run, 45.0, 2000.0),
            fourth(2018, PlayType::Punt, 55.0, 2000.0),
            fourth(2018, PlayType::Punt, 10.0, 2000.0),
            fourth(2019, PlayType::Punt, 5.0, 2000.0),
        ];
        let fourths = table(&plays)?;
        let analysis = standard_catalog()
            .into_iter()
            .find(|analysis| analysis.slug == "yearly_field_position_trends")
            .expect("midfield analysis");

        let output = analysis.run(&fourths)?;
        let pivot = output.matrix().expect("matrix");
        assert_eq!(pivot.rows().len(), 1);
        assert_eq!(pivot.get(GroupValue::Number(2018), field(FieldPosition::Own41To50)), Some(100.0));
        assert_eq!(pivot.get(GroupValue::Number(2018), field(FieldPosition::Opp40To49)), Some(0.0));
        Ok(())
    }

    #[test]
    fn sneak_artifacts_only_on_heuristic_path() {
        assert!(sneak_artifacts(&SneakDetection::Unavailable).is_empty());
    }
}
