use crate::error::Error;
use crate::Result;
use parse_display::{Display, FromStr};
use polars::prelude::*;
use std::collections::BTreeSet;

/// Source columns projected out of a season file.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, FromStr)]
#[display(style = "snake_case")]
pub enum Column {
    Season,
    Week,
    Posteam,
    Defteam,
    #[display("yardline_100")]
    Yardline100,
    Ydstogo,
    Down,
    PlayType,
    Wp,
    FourthDownConverted,
    FourthDownFailed,
    Qtr,
    GameSecondsRemaining,
    PasserPlayerName,
    RusherPlayerName,
    Desc,
}

impl Column {
    pub const PROJECTION: [Column; 16] = [
        Column::Season,
        Column::Week,
        Column::Posteam,
        Column::Defteam,
        Column::Yardline100,
        Column::Ydstogo,
        Column::Down,
        Column::PlayType,
        Column::Wp,
        Column::FourthDownConverted,
        Column::FourthDownFailed,
        Column::Qtr,
        Column::GameSecondsRemaining,
        Column::PasserPlayerName,
        Column::RusherPlayerName,
        Column::Desc,
    ];

    /// Columns that older archives may not carry.
    pub const OPTIONAL: [Column; 3] = [
        Column::PasserPlayerName,
        Column::RusherPlayerName,
        Column::Desc,
    ];

    pub fn is_optional(self) -> bool {
        Column::OPTIONAL.contains(&self)
    }

    /// Type every season is cast to before the union.
    pub fn dtype(self) -> DataType {
        match self {
            Column::Season | Column::Week | Column::Ydstogo | Column::Down | Column::Qtr => {
                DataType::Int32
            }
            Column::Yardline100
            | Column::Wp
            | Column::FourthDownConverted
            | Column::FourthDownFailed
            | Column::GameSecondsRemaining => DataType::Float64,
            Column::Posteam
            | Column::Defteam
            | Column::PlayType
            | Column::PasserPlayerName
            | Column::RusherPlayerName
            | Column::Desc => DataType::String,
        }
    }

    pub fn col(self) -> Expr {
        col(&self.to_string())
    }
}

/// The set of source columns available to a working table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnSet(BTreeSet<Column>);

impl ColumnSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self(Column::PROJECTION.into_iter().collect())
    }

    /// Keeps the names that match a projected column and ignores the rest.
    pub fn from_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self(names.into_iter().filter_map(|name| name.parse().ok()).collect())
    }

    pub fn contains(&self, column: Column) -> bool {
        self.0.contains(&column)
    }

    pub fn insert(&mut self, column: Column) {
        self.0.insert(column);
    }

    pub fn remove(&mut self, column: Column) {
        self.0.remove(&column);
    }

    pub fn iter(&self) -> impl Iterator<Item = Column> + '_ {
        self.0.iter().copied()
    }

    /// Folds one more season into a multi-season set. Optional columns are
    /// kept if any season has them; the rest only if every season does.
    pub fn merge(&self, season: &ColumnSet) -> ColumnSet {
        let kept = self.iter().filter(|column| column.is_optional() || season.contains(*column));
        let optional = season.iter().filter(|column| column.is_optional());
        Self(kept.chain(optional).collect())
    }

    pub fn missing(&self, required: &[Column]) -> Vec<Column> {
        required
            .iter()
            .copied()
            .filter(|column| !self.contains(*column))
            .collect()
    }

    pub fn require(&self, required: &[Column]) -> Result<()> {
        let missing = self.missing(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingColumns(missing))
        }
    }
}

/// Play-type vocabulary of the source data.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, FromStr)]
#[display(style = "snake_case")]
pub enum PlayType {
    Run,
    Pass,
    Punt,
    FieldGoal,
    NoPlay,
    QbKneel,
    QbSpike,
}

impl PlayType {
    pub fn predicate(self) -> Expr {
        Column::PlayType.col().eq(lit(self.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_match_source_schema() {
        assert_eq!(Column::Yardline100.to_string(), "yardline_100");
        assert_eq!(Column::FourthDownConverted.to_string(), "fourth_down_converted");
        assert_eq!(Column::Desc.to_string(), "desc");
        assert_eq!("game_seconds_remaining".parse::<Column>().unwrap(), Column::GameSecondsRemaining);
    }

    #[test]
    fn column_set_ignores_unknown_names() {
        let set = ColumnSet::from_names(["season", "down", "epa", "desc"]);
        assert!(set.contains(Column::Season));
        assert!(set.contains(Column::Desc));
        assert_eq!(set.iter().count(), 3);
        assert_eq!(
            set.missing(&[Column::Down, Column::RusherPlayerName]),
            vec![Column::RusherPlayerName]
        );
        assert!(matches!(
            set.require(&[Column::Ydstogo]),
            Err(Error::MissingColumns(cols)) if cols == vec![Column::Ydstogo]
        ));
    }

    #[test]
    fn merge_intersects_core_and_unions_optional_columns() {
        let older = ColumnSet::from_names(["season", "down", "ydstogo"]);
        let newer = ColumnSet::from_names(["season", "down", "play_type", "ydstogo", "desc"]);

        let merged = older.merge(&newer);
        assert!(merged.contains(Column::Ydstogo));
        assert!(merged.contains(Column::Desc));
        assert!(!merged.contains(Column::PlayType));

        assert_eq!(merged, newer.merge(&older));
    }

    #[test]
    fn play_type_vocabulary() {
        assert_eq!(PlayType::FieldGoal.to_string(), "field_goal");
        assert_eq!("qb_spike".parse::<PlayType>().unwrap(), PlayType::QbSpike);
        assert!("kickoff".parse::<PlayType>().is_err());
    }
}
