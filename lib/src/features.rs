use crate::play::{Column, ColumnSet, PlayType};
use parse_display::{Display, FromStr};
use polars::prelude::*;

pub(crate) const SHORT_YARDAGE: i32 = 2;
const RED_ZONE_YARDLINE: f64 = 20.0;
const SNEAK_PATTERNS: [&str; 3] = ["sneak", "qb sneak", "quarterback sneak"];

// Conversion flags arrive as 0/1 floats.
const FLAG_SET: f64 = 0.5;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, FromStr)]
#[display(style = "lowercase")]
pub enum Decision {
    Go,
    Kick,
}

impl Decision {
    pub const ALL: [Decision; 2] = [Decision::Go, Decision::Kick];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code).ok().and_then(|i| Self::ALL.get(i)).copied()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, FromStr)]
pub enum TimeCategory {
    #[display("1st Half")]
    FirstHalf,
    #[display("3rd Quarter")]
    ThirdQuarter,
    #[display("Early 4th Quarter")]
    EarlyFourthQuarter,
    #[display("Late 4th Quarter")]
    LateFourthQuarter,
    #[display("Final 5 Minutes")]
    FinalFiveMinutes,
}

impl TimeCategory {
    pub const ALL: [TimeCategory; 5] = [
        TimeCategory::FirstHalf,
        TimeCategory::ThirdQuarter,
        TimeCategory::EarlyFourthQuarter,
        TimeCategory::LateFourthQuarter,
        TimeCategory::FinalFiveMinutes,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code).ok().and_then(|i| Self::ALL.get(i)).copied()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, FromStr)]
pub enum FieldPosition {
    #[display("Own 1-10")]
    Own1To10,
    #[display("Own 11-20")]
    Own11To20,
    #[display("Own 21-30")]
    Own21To30,
    #[display("Own 31-40")]
    Own31To40,
    #[display("Own 41-50")]
    Own41To50,
    #[display("Opp 40-49")]
    Opp40To49,
    #[display("Opp 30-39")]
    Opp30To39,
    #[display("Opp 20-29")]
    Opp20To29,
    #[display("Opp 10-19")]
    Opp10To19,
    #[display("Opp 1-9")]
    Opp1To9,
}

impl FieldPosition {
    /// Canonical presentation order, from deep in own territory to the goal line.
    pub const ALL: [FieldPosition; 10] = [
        FieldPosition::Own1To10,
        FieldPosition::Own11To20,
        FieldPosition::Own21To30,
        FieldPosition::Own31To40,
        FieldPosition::Own41To50,
        FieldPosition::Opp40To49,
        FieldPosition::Opp30To39,
        FieldPosition::Opp20To29,
        FieldPosition::Opp10To19,
        FieldPosition::Opp1To9,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code).ok().and_then(|i| Self::ALL.get(i)).copied()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, FromStr)]
#[display(style = "lowercase")]
pub enum PlayStrategy {
    Run,
    Pass,
    Other,
}

impl PlayStrategy {
    pub const ALL: [PlayStrategy; 3] = [PlayStrategy::Run, PlayStrategy::Pass, PlayStrategy::Other];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code).ok().and_then(|i| Self::ALL.get(i)).copied()
    }
}

/// Columns the deriver attaches to the working table. Each one is only
/// derived when every source column it reads is available.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display(style = "snake_case")]
pub enum Feature {
    Decision,
    WentForIt,
    PlayStrategy,
    TimeCategory,
    FieldPosition,
    RedZone,
    Converted,
    Failed,
    QbSneak,
    QbSneakStrict,
    SneakMention,
}

impl Feature {
    pub const ALL: [Feature; 11] = [
        Feature::Decision,
        Feature::WentForIt,
        Feature::PlayStrategy,
        Feature::TimeCategory,
        Feature::FieldPosition,
        Feature::RedZone,
        Feature::Converted,
        Feature::Failed,
        Feature::QbSneak,
        Feature::QbSneakStrict,
        Feature::SneakMention,
    ];

    pub fn required_columns(self) -> &'static [Column] {
        match self {
            Feature::Decision | Feature::WentForIt | Feature::PlayStrategy => &[Column::PlayType],
            Feature::TimeCategory => &[Column::GameSecondsRemaining],
            Feature::FieldPosition | Feature::RedZone => &[Column::Yardline100],
            Feature::Converted => &[Column::FourthDownConverted],
            Feature::Failed => &[Column::FourthDownFailed],
            Feature::QbSneak => &[Column::PlayType, Column::Ydstogo, Column::RusherPlayerName],
            Feature::QbSneakStrict => &[
                Column::RusherPlayerName,
                Column::PasserPlayerName,
                Column::Ydstogo,
            ],
            Feature::SneakMention => &[Column::Desc],
        }
    }

    pub fn is_available(self, columns: &ColumnSet) -> bool {
        columns.missing(self.required_columns()).is_empty()
    }

    /// Row-wise definition over source columns.
    pub fn expr(self) -> Expr {
        match self {
            Feature::Decision => decision(),
            Feature::WentForIt => went_for_it(),
            Feature::PlayStrategy => play_strategy(),
            Feature::TimeCategory => time_category(),
            Feature::FieldPosition => field_position(),
            Feature::RedZone => red_zone(),
            Feature::Converted => flag_set(Column::FourthDownConverted),
            Feature::Failed => flag_set(Column::FourthDownFailed),
            Feature::QbSneak => qb_sneak(),
            Feature::QbSneakStrict => qb_sneak_strict(),
            Feature::SneakMention => sneak_mention(),
        }
    }

    /// The derived column on a working table.
    pub fn col(self) -> Expr {
        col(&self.to_string())
    }
}

/// Expressions for every feature `columns` can support.
pub fn derive(columns: &ColumnSet) -> Vec<Expr> {
    Feature::ALL
        .into_iter()
        .filter(|feature| feature.is_available(columns))
        .map(|feature| feature.expr().alias(&feature.to_string()))
        .collect()
}

fn went_for_it() -> Expr {
    PlayType::Run
        .predicate()
        .or(PlayType::Pass.predicate())
        .fill_null(lit(false))
}

fn decision() -> Expr {
    when(went_for_it())
        .then(lit(Decision::Go.code()))
        .otherwise(lit(Decision::Kick.code()))
}

// Kicks carry no strategy.
fn play_strategy() -> Expr {
    when(PlayType::Run.predicate())
        .then(lit(PlayStrategy::Run.code()))
        .when(PlayType::Pass.predicate())
        .then(lit(PlayStrategy::Pass.code()))
        .otherwise(lit(NULL).cast(DataType::Int32))
}

// First match wins; a missing clock falls through to the last bucket.
fn time_category() -> Expr {
    let seconds = || Column::GameSecondsRemaining.col();
    let bucket = |category: TimeCategory| lit(category.code());
    when(seconds().gt(lit(2700.0)))
        .then(bucket(TimeCategory::FirstHalf))
        .when(seconds().gt(lit(1800.0)))
        .then(bucket(TimeCategory::ThirdQuarter))
        .when(seconds().gt(lit(900.0)))
        .then(bucket(TimeCategory::EarlyFourthQuarter))
        .when(seconds().gt(lit(300.0)))
        .then(bucket(TimeCategory::LateFourthQuarter))
        .otherwise(bucket(TimeCategory::FinalFiveMinutes))
}

// Upper bounds are inclusive. Anything past 90, or missing, lands in the last band.
fn field_position() -> Expr {
    let yardline = || Column::Yardline100.col();
    let band = |band: FieldPosition| lit(band.code());
    when(yardline().lt_eq(lit(10.0)))
        .then(band(FieldPosition::Own1To10))
        .when(yardline().lt_eq(lit(20.0)))
        .then(band(FieldPosition::Own11To20))
        .when(yardline().lt_eq(lit(30.0)))
        .then(band(FieldPosition::Own21To30))
        .when(yardline().lt_eq(lit(40.0)))
        .then(band(FieldPosition::Own31To40))
        .when(yardline().lt_eq(lit(50.0)))
        .then(band(FieldPosition::Own41To50))
        .when(yardline().lt_eq(lit(60.0)))
        .then(band(FieldPosition::Opp40To49))
        .when(yardline().lt_eq(lit(70.0)))
        .then(band(FieldPosition::Opp30To39))
        .when(yardline().lt_eq(lit(80.0)))
        .then(band(FieldPosition::Opp20To29))
        .when(yardline().lt_eq(lit(90.0)))
        .then(band(FieldPosition::Opp10To19))
        .otherwise(band(FieldPosition::Opp1To9))
}

fn red_zone() -> Expr {
    Column::Yardline100
        .col()
        .lt_eq(lit(RED_ZONE_YARDLINE))
        .fill_null(lit(false))
}

fn flag_set(column: Column) -> Expr {
    column.col().gt(lit(FLAG_SET)).fill_null(lit(false))
}

/// Best-effort QB sneak proxy: a short-yardage run with a named rusher.
///
/// The data carries no sneak marker, so this also catches designed short
/// runs by non-quarterbacks. It is the only sneak signal used for reported
/// rates.
fn qb_sneak() -> Expr {
    PlayType::Run
        .predicate()
        .and(Column::Ydstogo.col().lt_eq(lit(SHORT_YARDAGE)))
        .and(Column::RusherPlayerName.col().is_not_null())
        .fill_null(lit(false))
}

/// Stricter proxy where the rusher is also the named passer. Diagnostic only.
fn qb_sneak_strict() -> Expr {
    let rusher = Column::RusherPlayerName.col();
    let passer = Column::PasserPlayerName.col();
    rusher
        .clone()
        .is_not_null()
        .and(passer.clone().is_not_null())
        .and(rusher.eq(passer))
        .and(Column::Ydstogo.col().lt_eq(lit(SHORT_YARDAGE)))
        .fill_null(lit(false))
}

fn sneak_mention() -> Expr {
    let desc = Column::Desc.col().str().to_lowercase();
    SNEAK_PATTERNS
        .iter()
        .fold(lit(false), |any, pattern| {
            any.or(desc.clone().str().contains_literal(lit(*pattern)))
        })
        .fill_null(lit(false))
}
