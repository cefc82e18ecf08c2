use crate::{
    error::Error,
    play::{Column, ColumnSet},
    table::FourthDowns,
    Result,
};
use derive_deref::Deref;
use polars::prelude::*;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_DIR: &str = "pbp_data";
pub const DEFAULT_TEMPLATE: &str = "play_by_play_{season}.parquet";

/// Where season files live. `{season}` in the template is replaced by the year.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLayout {
    dir: PathBuf,
    template: String,
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

impl SourceLayout {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }

    pub fn with_template<S: Into<String>>(mut self, template: S) -> Self {
        self.template = template.into();
        self
    }

    pub fn path_for(&self, season: i32) -> PathBuf {
        self.dir
            .join(self.template.replace("{season}", &season.to_string()))
    }
}

#[derive(Clone, Deref)]
pub struct SeasonDf(DataFrame);

impl SeasonDf {
    pub fn new(df: DataFrame) -> Self {
        SeasonDf(df)
    }

    /// Reads a season file. Any read failure is reported as an unreadable
    /// source so the caller can abort the run with the offending path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let df = crate::load_parquet(path).map_err(|err| match err {
            Error::Polars(source) => Error::UnreadableSource {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(SeasonDf(df))
    }

    pub fn columns(&self) -> ColumnSet {
        ColumnSet::from_names(self.get_column_names())
    }

    /// Keeps fourth downs matching `filter` and projects them onto the full
    /// schema. Columns this file lacks come back null; a missing season is
    /// filled from the period identifier.
    pub fn fourth_downs(self, season: i32, filter: Expr) -> Result<Self> {
        let available = self.columns();
        let projection: Vec<Expr> = Column::PROJECTION
            .into_iter()
            .map(|column| {
                let expr = if available.contains(column) {
                    column.col().cast(column.dtype())
                } else {
                    lit(NULL).cast(column.dtype())
                };
                let expr = match column {
                    Column::Season => expr.fill_null(lit(season)),
                    _ => expr,
                };
                expr.alias(&column.to_string())
            })
            .collect();

        let df = self
            .0
            .lazy()
            .filter(Column::Down.col().eq(lit(4)).and(filter))
            .select(projection)
            .collect()?;
        Ok(SeasonDf(df))
    }
}

/// Per-season outcome of a load.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<(i32, usize)>,
    pub skipped: Vec<i32>,
}

/// Loads each season in order, skipping missing files, and unions the
/// fourth downs into one working table.
pub fn load_seasons(
    layout: &SourceLayout,
    seasons: &[i32],
    filter: PlayFilter,
) -> Result<(FourthDowns, LoadReport)> {
    log::trace!("pbp::load_seasons");
    let mut frame: Option<DataFrame> = None;
    let mut columns: Option<ColumnSet> = None;
    let mut report = LoadReport::default();

    for &season in seasons {
        let path = layout.path_for(season);
        if !path.exists() {
            log::warn!("No play-by-play file for {} at {}", season, path.display());
            report.skipped.push(season);
            continue;
        }

        let season_df = SeasonDf::load(&path)?;
        let mut available = season_df.columns();
        if !available.contains(Column::Down) {
            return Err(Error::MissingRequiredColumn {
                path,
                column: Column::Down,
            });
        }
        available.require(filter.required_columns())?;
        available.insert(Column::Season);

        let (optional, core): (Vec<Column>, Vec<Column>) = available
            .missing(&Column::PROJECTION)
            .into_iter()
            .partition(|column| column.is_optional());
        if !core.is_empty() {
            log::warn!(
                "{} lacks columns {:?}; analyses that need them are skipped for every season",
                season,
                core
            );
        }
        if !optional.is_empty() {
            log::debug!("{} lacks optional columns {:?}", season, optional);
        }

        let fourths = season_df.fourth_downs(season, filter.clone().build())?;
        log::info!("Loaded {} 4th downs from {}", fourths.height(), season);
        report.loaded.push((season, fourths.height()));

        columns = Some(match columns {
            Some(merged) => merged.merge(&available),
            None => available,
        });
        match frame.as_mut() {
            Some(frame) => {
                frame.vstack_mut(&fourths)?;
            }
            None => frame = Some(fourths.0),
        }
    }

    let (Some(mut frame), Some(columns)) = (frame, columns) else {
        return Err(Error::NoSources);
    };

    frame.align_chunks();
    log::info!("Total 4th downs across all seasons: {}", frame.height());
    Ok((FourthDowns::new(frame, columns)?, report))
}

/// Extra row filters AND-ed onto the fourth-down filter.
#[derive(Clone, Default)]
pub struct PlayFilter {
    filter_expr: Option<Expr>,
    required: Vec<Column>,
}

impl PlayFilter {
    pub fn new() -> Self {
        Self::default()
    }

    // Adds a filter for the offense
    pub fn team(self, team_name: &str) -> Self {
        let expr = Column::Posteam.col().eq(lit(team_name));
        self.extend_filter(expr, Column::Posteam)
    }

    // Adds a filter for the week
    pub fn week(self, week: u16) -> Self {
        let expr = Column::Week.col().eq(lit(week as u32));
        self.extend_filter(expr, Column::Week)
    }

    pub fn week_range(self, start: u16, end: u16) -> Self {
        let expr = Column::Week.col().is_between(lit(start as u32), lit(end as u32), ClosedInterval::Both);
        self.extend_filter(expr, Column::Week)
    }

    pub fn required_columns(&self) -> &[Column] {
        &self.required
    }

    // Combines the current filter with a new one using AND logic
    fn extend_filter(mut self, new_expr: Expr, column: Column) -> Self {
        self.filter_expr = match self.filter_expr.take() {
            Some(existing_expr) => Some(existing_expr.and(new_expr)),
            None => Some(new_expr),
        };
        if !self.required.contains(&column) {
            self.required.push(column);
        }
        self
    }

    // Builds the final filter expression
    pub fn build(self) -> Expr {
        self.filter_expr.unwrap_or_else(|| lit(true))
    }
}
