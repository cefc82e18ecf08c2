use crate::{
    features::{self, Feature},
    play::ColumnSet,
    Result,
};
use polars::prelude::*;

/// The unioned fourth-down working table, with derived feature columns
/// attached. Read-only once built.
#[derive(Clone, Debug)]
pub struct FourthDowns {
    frame: DataFrame,
    columns: ColumnSet,
}

impl FourthDowns {
    /// `frame` carries every projected column; `columns` says which of them
    /// hold real data across all loaded seasons.
    pub fn new(frame: DataFrame, columns: ColumnSet) -> Result<Self> {
        log::trace!("table::new");
        let frame = frame
            .lazy()
            .with_columns(features::derive(&columns))
            .collect()?;
        Ok(Self { frame, columns })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn lazy(&self) -> LazyFrame {
        self.frame.clone().lazy()
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn has(&self, feature: Feature) -> bool {
        feature.is_available(&self.columns)
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Counts rows of `population` where each of `flags` holds, in one pass.
    pub fn tally<const N: usize>(&self, population: Expr, flags: [Expr; N]) -> Result<[usize; N]> {
        let names: Vec<String> = (0..N).map(|i| format!("tally_{i}")).collect();
        let sums: Vec<Expr> = flags
            .into_iter()
            .zip(&names)
            .map(|(flag, name)| flag.cast(DataType::UInt32).sum().alias(name))
            .collect();
        let summed = self.lazy().filter(population).select(sums).collect()?;

        let mut counts = [0; N];
        for (count, name) in counts.iter_mut().zip(&names) {
            let column = summed.column(name)?.cast(&DataType::UInt64)?;
            *count = column.u64()?.get(0).unwrap_or(0) as usize;
        }
        Ok(counts)
    }

    /// Seasons present in the table, in load order.
    pub fn seasons(&self) -> Result<Vec<i32>> {
        let seasons = self.frame.column("season")?.unique_stable()?;
        Ok(seasons.i32()?.into_iter().flatten().collect())
    }
}

#[cfg(test)]
pub(crate) mod fixture {
    use super::FourthDowns;
    use crate::{
        play::{Column, ColumnSet, PlayType},
        Result,
    };
    use polars::prelude::*;

    /// One synthetic fourth down. Unset fields are null.
    #[derive(Clone, Debug, Default)]
    pub struct Play {
        pub season: i32,
        pub week: Option<i32>,
        pub posteam: Option<&'static str>,
        pub yardline_100: Option<f64>,
        pub ydstogo: Option<i32>,
        pub play_type: Option<PlayType>,
        pub converted: bool,
        pub failed: bool,
        pub qtr: Option<i32>,
        pub game_seconds_remaining: Option<f64>,
        pub passer: Option<&'static str>,
        pub rusher: Option<&'static str>,
        pub desc: Option<&'static str>,
    }

    impl Play {
        pub fn new(season: i32, play_type: PlayType) -> Self {
            Play {
                season,
                play_type: Some(play_type),
                ..Default::default()
            }
        }

        pub fn at(mut self, yardline_100: f64) -> Self {
            self.yardline_100 = Some(yardline_100);
            self
        }

        pub fn to_go(mut self, ydstogo: i32) -> Self {
            self.ydstogo = Some(ydstogo);
            self
        }

        pub fn clock(mut self, seconds: f64) -> Self {
            self.game_seconds_remaining = Some(seconds);
            self
        }

        pub fn converted(mut self) -> Self {
            self.converted = true;
            self
        }

        pub fn failed(mut self) -> Self {
            self.failed = true;
            self
        }

        pub fn rusher(mut self, name: &'static str) -> Self {
            self.rusher = Some(name);
            self
        }

        pub fn passer(mut self, name: &'static str) -> Self {
            self.passer = Some(name);
            self
        }

        pub fn desc(mut self, desc: &'static str) -> Self {
            self.desc = Some(desc);
            self
        }
    }

    fn flag(set: bool) -> f64 {
        if set {
            1.0
        } else {
            0.0
        }
    }

    pub fn table(plays: &[Play]) -> Result<FourthDowns> {
        table_with(plays, ColumnSet::all())
    }

    /// Builds a table where columns outside `columns` are null, as the loader
    /// leaves them.
    pub fn table_with(plays: &[Play], columns: ColumnSet) -> Result<FourthDowns> {
        let n = plays.len();
        let df = df!(
            "season" => plays.iter().map(|p| p.season).collect::<Vec<_>>(),
            "week" => plays.iter().map(|p| p.week).collect::<Vec<_>>(),
            "posteam" => plays.iter().map(|p| p.posteam).collect::<Vec<_>>(),
            "defteam" => vec![None::<&str>; n],
            "yardline_100" => plays.iter().map(|p| p.yardline_100).collect::<Vec<_>>(),
            "ydstogo" => plays.iter().map(|p| p.ydstogo).collect::<Vec<_>>(),
            "down" => vec![4i32; n],
            "play_type" => plays.iter().map(|p| p.play_type.map(|t| t.to_string())).collect::<Vec<_>>(),
            "wp" => vec![None::<f64>; n],
            "fourth_down_converted" => plays.iter().map(|p| flag(p.converted)).collect::<Vec<_>>(),
            "fourth_down_failed" => plays.iter().map(|p| flag(p.failed)).collect::<Vec<_>>(),
            "qtr" => plays.iter().map(|p| p.qtr).collect::<Vec<_>>(),
            "game_seconds_remaining" => plays.iter().map(|p| p.game_seconds_remaining).collect::<Vec<_>>(),
            "passer_player_name" => plays.iter().map(|p| p.passer).collect::<Vec<_>>(),
            "rusher_player_name" => plays.iter().map(|p| p.rusher).collect::<Vec<_>>(),
            "desc" => plays.iter().map(|p| p.desc).collect::<Vec<_>>()
        )?;

        let nulled: Vec<Expr> = Column::PROJECTION
            .into_iter()
            .filter(|column| !columns.contains(*column))
            .map(|column| lit(NULL).cast(column.dtype()).alias(&column.to_string()))
            .collect();
        let df = df.lazy().with_columns(nulled).collect()?;
        FourthDowns::new(df, columns)
    }
}

#[cfg(test)]
mod tests {
    use super::fixture::{table, table_with, Play};
    use super::*;
    use crate::play::{Column, PlayType};

    #[test]
    fn derives_available_features() -> Result<()> {
        let plays = vec![
            Play::new(2001, PlayType::Run).at(45.0).to_go(1).rusher("A"),
            Play::new(2002, PlayType::Punt).at(70.0).to_go(8),
            Play::new(2001, PlayType::Pass).at(15.0).to_go(3).converted(),
        ];
        let fourths = table(&plays)?;
        assert_eq!(fourths.len(), 3);
        assert_eq!(fourths.seasons()?, vec![2001, 2002]);
        assert!(fourths.frame().column("qb_sneak").is_ok());
        let [go, red_zone, sneaks] = fourths.tally(
            lit(true),
            [Feature::WentForIt.col(), Feature::RedZone.col(), Feature::QbSneak.col()],
        )?;
        assert_eq!((go, red_zone, sneaks), (2, 1, 1));

        let [converted] = fourths.tally(Feature::WentForIt.col(), [Feature::Converted.col()])?;
        assert_eq!(converted, 1);
        let [none] = fourths.tally(lit(false), [Feature::WentForIt.col()])?;
        assert_eq!(none, 0);
        Ok(())
    }

    #[test]
    fn missing_sources_leave_features_underived() -> Result<()> {
        let mut columns = ColumnSet::all();
        columns.remove(Column::PlayType);
        let fourths = table_with(&[Play::new(2001, PlayType::Run).at(45.0)], columns)?;
        assert!(!fourths.has(Feature::Decision));
        assert!(fourths.frame().column("decision").is_err());
        assert!(fourths.has(Feature::FieldPosition));
        assert_eq!(fourths.frame().column("play_type")?.null_count(), 1);
        Ok(())
    }
}
