use crate::{
    error::Error,
    features::{Decision, Feature, FieldPosition, PlayStrategy, TimeCategory},
    play::{Column, ColumnSet},
    table::FourthDowns,
    Result,
};
use parse_display::Display;
use polars::lazy::frame::pivot::pivot_stable;
use polars::prelude::*;
use std::fmt;

const FLAG: &str = "flag";
const ATTEMPTS: &str = "attempts";
const SUCCESSES: &str = "successes";
const VALUE: &str = "value";

/// Rounds a percentage to one decimal place, halves away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `100 * successes / attempts`, or `None` when nothing was attempted.
pub fn rate(successes: usize, attempts: usize) -> Option<f64> {
    (attempts > 0).then(|| round1(successes as f64 / attempts as f64 * 100.0))
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
#[display(style = "snake_case")]
pub enum GroupKey {
    Season,
    Week,
    #[display("qtr")]
    Quarter,
    #[display("ydstogo")]
    YardsToGo,
    Decision,
    TimeCategory,
    FieldPosition,
    PlayStrategy,
    RedZone,
}

impl GroupKey {
    /// Integer-coded key column. Categorical keys are coded by presentation
    /// order so sorting on the code sorts by label order.
    pub fn expr(self) -> Expr {
        let source = match self {
            GroupKey::Season => Column::Season.col(),
            GroupKey::Week => Column::Week.col(),
            GroupKey::Quarter => Column::Qtr.col(),
            GroupKey::YardsToGo => Column::Ydstogo.col(),
            GroupKey::Decision => Feature::Decision.col(),
            GroupKey::TimeCategory => Feature::TimeCategory.col(),
            GroupKey::FieldPosition => Feature::FieldPosition.col(),
            GroupKey::PlayStrategy => Feature::PlayStrategy.col(),
            GroupKey::RedZone => Feature::RedZone.col(),
        };
        source.cast(DataType::Int32).alias(&self.to_string())
    }

    pub fn decode(self, code: i32) -> Option<GroupValue> {
        match self {
            GroupKey::Season | GroupKey::Week | GroupKey::Quarter | GroupKey::YardsToGo => {
                Some(GroupValue::Number(code))
            }
            GroupKey::Decision => Decision::from_code(code).map(GroupValue::Decision),
            GroupKey::TimeCategory => TimeCategory::from_code(code).map(GroupValue::Time),
            GroupKey::FieldPosition => FieldPosition::from_code(code).map(GroupValue::Field),
            GroupKey::PlayStrategy => PlayStrategy::from_code(code).map(GroupValue::Strategy),
            GroupKey::RedZone => match code {
                0 => Some(GroupValue::RedZone(false)),
                1 => Some(GroupValue::RedZone(true)),
                _ => None,
            },
        }
    }

    pub fn required_columns(self) -> &'static [Column] {
        match self {
            GroupKey::Season => &[Column::Season],
            GroupKey::Week => &[Column::Week],
            GroupKey::Quarter => &[Column::Qtr],
            GroupKey::YardsToGo => &[Column::Ydstogo],
            GroupKey::Decision => Feature::Decision.required_columns(),
            GroupKey::TimeCategory => Feature::TimeCategory.required_columns(),
            GroupKey::FieldPosition => Feature::FieldPosition.required_columns(),
            GroupKey::PlayStrategy => Feature::PlayStrategy.required_columns(),
            GroupKey::RedZone => Feature::RedZone.required_columns(),
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            GroupKey::Season | GroupKey::Week | GroupKey::Quarter | GroupKey::YardsToGo
        )
    }

    /// Every value a categorical key can take, in presentation order.
    pub fn domain(self) -> Option<Vec<GroupValue>> {
        let values = match self {
            GroupKey::Decision => Decision::ALL.map(GroupValue::Decision).to_vec(),
            GroupKey::TimeCategory => TimeCategory::ALL.map(GroupValue::Time).to_vec(),
            GroupKey::FieldPosition => FieldPosition::ALL.map(GroupValue::Field).to_vec(),
            GroupKey::PlayStrategy => PlayStrategy::ALL.map(GroupValue::Strategy).to_vec(),
            GroupKey::RedZone => vec![GroupValue::RedZone(false), GroupValue::RedZone(true)],
            _ => return None,
        };
        Some(values)
    }
}

/// A single grouping key value. Values of one key share a variant, so the
/// derived ordering is the key's natural order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupValue {
    Number(i32),
    Decision(Decision),
    Time(TimeCategory),
    Field(FieldPosition),
    Strategy(PlayStrategy),
    RedZone(bool),
}

impl GroupValue {
    pub fn as_number(self) -> Option<i32> {
        match self {
            GroupValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            GroupValue::Number(n) => n,
            GroupValue::Decision(d) => d.code(),
            GroupValue::Time(t) => t.code(),
            GroupValue::Field(p) => p.code(),
            GroupValue::Strategy(s) => s.code(),
            GroupValue::RedZone(red_zone) => i32::from(red_zone),
        }
    }
}

impl fmt::Display for GroupValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupValue::Number(n) => write!(f, "{}", n),
            GroupValue::Decision(d) => write!(f, "{}", d),
            GroupValue::Time(t) => write!(f, "{}", t),
            GroupValue::Field(p) => write!(f, "{}", p),
            GroupValue::Strategy(s) => write!(f, "{}", s),
            GroupValue::RedZone(true) => f.write_str("Red Zone"),
            GroupValue::RedZone(false) => f.write_str("Non-Red Zone"),
        }
    }
}

/// A per-play boolean that metrics count.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum Flag {
    #[display("success")]
    Converted,
    #[display("failure")]
    Failed,
    #[display("go_for_it")]
    WentForIt,
    #[display("qb_sneak")]
    QbSneak,
}

impl Flag {
    pub fn feature(self) -> Feature {
        match self {
            Flag::Converted => Feature::Converted,
            Flag::Failed => Feature::Failed,
            Flag::WentForIt => Feature::WentForIt,
            Flag::QbSneak => Feature::QbSneak,
        }
    }

    pub fn required_columns(self) -> &'static [Column] {
        self.feature().required_columns()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum Metric {
    #[display("count")]
    Count,
    #[display("{0}_count")]
    Sum(Flag),
    #[display("{0}_rate")]
    Rate(Flag),
}

impl Metric {
    pub fn flag(self) -> Option<Flag> {
        match self {
            Metric::Count => None,
            Metric::Sum(flag) | Metric::Rate(flag) => Some(flag),
        }
    }

    // Over the grouped attempts and successes columns.
    fn expr(self) -> Expr {
        let attempts = col(ATTEMPTS).cast(DataType::Float64);
        let successes = col(SUCCESSES).cast(DataType::Float64);
        match self {
            Metric::Count => attempts,
            Metric::Sum(_) => successes,
            Metric::Rate(_) => (successes / attempts * lit(100.0)).round(1),
        }
    }
}

/// Which plays a request aggregates over.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
#[display(style = "snake_case")]
pub enum Population {
    /// Every fourth down.
    All,
    /// Runs and passes only.
    GoAttempts,
    /// Go attempts flagged by the primary sneak heuristic.
    QbSneaks,
}

impl Population {
    pub fn expr(self) -> Expr {
        match self {
            Population::All => lit(true),
            Population::GoAttempts => Feature::WentForIt.col(),
            Population::QbSneaks => Feature::QbSneak.col(),
        }
    }

    pub fn required_columns(self) -> &'static [Column] {
        match self {
            Population::All => &[],
            Population::GoAttempts => Feature::WentForIt.required_columns(),
            Population::QbSneaks => Feature::QbSneak.required_columns(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Grouping {
    Single(GroupKey),
    /// Two keys in long form, one row per observed combination.
    Pair(GroupKey, GroupKey),
    /// Two keys with the second unstacked into columns.
    Pivot { rows: GroupKey, columns: GroupKey },
}

impl Grouping {
    pub fn keys(&self) -> Vec<GroupKey> {
        match *self {
            Grouping::Single(key) => vec![key],
            Grouping::Pair(first, second) => vec![first, second],
            Grouping::Pivot { rows, columns } => vec![rows, columns],
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum RowOrder {
    #[default]
    KeyAscending,
    ValueDescending,
    /// Emit the key's full domain, including values with no observations.
    Reindexed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AggregateRequest {
    pub population: Population,
    pub grouping: Grouping,
    pub metric: Metric,
    pub min_sample: usize,
    pub order: RowOrder,
}

impl AggregateRequest {
    pub fn new(population: Population, grouping: Grouping, metric: Metric) -> Self {
        Self {
            population,
            grouping,
            metric,
            min_sample: 0,
            order: RowOrder::default(),
        }
    }

    /// Plays counted per group.
    pub fn count(population: Population, grouping: Grouping) -> Self {
        Self::new(population, grouping, Metric::Count)
    }

    /// Conversion rate of go-for-it attempts.
    pub fn success_rate(grouping: Grouping) -> Self {
        Self::new(Population::GoAttempts, grouping, Metric::Rate(Flag::Converted))
    }

    /// Share of all fourth downs where the offense went for it.
    pub fn go_for_it_rate(grouping: Grouping) -> Self {
        Self::new(Population::All, grouping, Metric::Rate(Flag::WentForIt))
    }

    pub fn min_sample(mut self, min_sample: usize) -> Self {
        self.min_sample = min_sample;
        self
    }

    pub fn order(mut self, order: RowOrder) -> Self {
        self.order = order;
        self
    }

    pub fn required_columns(&self) -> Vec<Column> {
        let mut required: Vec<Column> = self.population.required_columns().to_vec();
        for key in self.grouping.keys() {
            required.extend_from_slice(key.required_columns());
        }
        if let Some(flag) = self.metric.flag() {
            required.extend_from_slice(flag.required_columns());
        }
        required.sort();
        required.dedup();
        required
    }

    pub fn validate(&self, columns: &ColumnSet) -> Result<()> {
        if self.metric.flag() == Some(Flag::WentForIt) && self.population != Population::All {
            return Err(Error::InvalidRequest(format!(
                "{} over {} is always 100; go-for-it needs every fourth down",
                self.metric, self.population
            )));
        }

        match (self.grouping, self.order) {
            (Grouping::Pair(a, b), _) | (Grouping::Pivot { rows: a, columns: b }, _) if a == b => {
                return Err(Error::InvalidRequest(format!("{} grouped with itself", a)));
            }
            (Grouping::Single(key), RowOrder::Reindexed) if key.domain().is_none() => {
                return Err(Error::InvalidRequest(format!("{} has no fixed domain to reindex", key)));
            }
            (Grouping::Pair(..) | Grouping::Pivot { .. }, RowOrder::Reindexed) => {
                return Err(Error::InvalidRequest("only single-key groupings can be reindexed".into()));
            }
            (Grouping::Pivot { .. }, RowOrder::ValueDescending) => {
                return Err(Error::InvalidRequest("pivot tables are ordered by key".into()));
            }
            _ => {}
        }

        columns.require(&self.required_columns())
    }
}

/// One group of a long-form aggregate.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateRow {
    pub keys: Vec<GroupValue>,
    /// `None` on reindexed rows whose group was unobserved or fell below the
    /// minimum sample. The same holds for `successes` and `value`.
    pub attempts: Option<usize>,
    pub successes: Option<usize>,
    pub value: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowTable {
    pub keys: Vec<GroupKey>,
    pub metric: Metric,
    pub rows: Vec<AggregateRow>,
}

impl RowTable {
    pub fn row(&self, keys: &[GroupValue]) -> Option<&AggregateRow> {
        self.rows.iter().find(|row| row.keys == keys)
    }

    pub fn value(&self, keys: &[GroupValue]) -> Option<f64> {
        self.row(keys).and_then(|row| row.value)
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.keys.len() + 3);
        for (i, key) in self.keys.iter().enumerate() {
            let values = self.rows.iter().map(|row| row.keys[i]);
            columns.push(key_series(*key, values));
        }
        let attempts: Vec<Option<u32>> = self
            .rows
            .iter()
            .map(|row| row.attempts.map(|n| n as u32))
            .collect();
        columns.push(Series::new(ATTEMPTS, attempts));
        if self.metric.flag().is_some() {
            let successes: Vec<Option<u32>> = self
                .rows
                .iter()
                .map(|row| row.successes.map(|n| n as u32))
                .collect();
            columns.push(Series::new(SUCCESSES, successes));
        }
        if self.metric != Metric::Count {
            let values: Vec<Option<f64>> = self.rows.iter().map(|row| row.value).collect();
            columns.push(Series::new(&self.metric.to_string(), values));
        }
        Ok(DataFrame::new(columns)?)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PivotRow {
    pub key: GroupValue,
    /// One cell per column; `None` means no observations, not zero.
    pub cells: Vec<Option<f64>>,
}

/// Wide form of a two-key aggregate.
#[derive(Clone, Debug, PartialEq)]
pub struct PivotTable {
    pub row_key: GroupKey,
    pub column_key: GroupKey,
    pub value_name: String,
    columns: Vec<GroupValue>,
    rows: Vec<PivotRow>,
}

impl PivotTable {
    pub fn columns(&self) -> &[GroupValue] {
        &self.columns
    }

    pub fn rows(&self) -> &[PivotRow] {
        &self.rows
    }

    pub fn get(&self, row: GroupValue, column: GroupValue) -> Option<f64> {
        let c = self.columns.iter().position(|value| *value == column)?;
        self.rows
            .iter()
            .find(|r| r.key == row)
            .and_then(|r| r.cells[c])
    }

    /// How the report layer reads a cell: unobserved reads as zero.
    pub fn value_or_zero(&self, row: GroupValue, column: GroupValue) -> f64 {
        self.get(row, column).unwrap_or(0.0)
    }

    /// Copy with unobserved cells written as zero, as heatmaps draw them.
    pub fn zero_filled(&self) -> PivotTable {
        let rows = self
            .rows
            .iter()
            .map(|row| PivotRow {
                key: row.key,
                cells: row.cells.iter().map(|cell| Some(cell.unwrap_or(0.0))).collect(),
            })
            .collect();
        PivotTable {
            row_key: self.row_key,
            column_key: self.column_key,
            value_name: self.value_name.clone(),
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Narrows to `columns` in the given order. Rows without any observation
    /// in the kept columns are dropped.
    pub fn select_columns(&self, columns: &[GroupValue]) -> PivotTable {
        let indices: Vec<Option<usize>> = columns
            .iter()
            .map(|wanted| self.columns.iter().position(|value| value == wanted))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| PivotRow {
                key: row.key,
                cells: indices.iter().map(|i| i.and_then(|i| row.cells[i])).collect(),
            })
            .filter(|row| row.cells.iter().any(Option::is_some))
            .collect();
        PivotTable {
            row_key: self.row_key,
            column_key: self.column_key,
            value_name: self.value_name.clone(),
            columns: columns.to_vec(),
            rows,
        }
    }

    /// Converts counts into each column's percentage of its row total.
    /// Unobserved cells count as zero plays.
    pub fn row_shares(&self) -> Result<PivotTable> {
        if self.value_name != Metric::Count.to_string() {
            return Err(Error::InvalidRequest(format!(
                "row shares need counts, not {}",
                self.value_name
            )));
        }
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let total: f64 = row.cells.iter().flatten().sum();
                let cells = row
                    .cells
                    .iter()
                    .map(|cell| (total > 0.0).then(|| round1(cell.unwrap_or(0.0) / total * 100.0)))
                    .collect();
                PivotRow { key: row.key, cells }
            })
            .collect();
        Ok(PivotTable {
            row_key: self.row_key,
            column_key: self.column_key,
            value_name: "share_pct".to_string(),
            columns: self.columns.clone(),
            rows,
        })
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.columns.len() + 1);
        columns.push(key_series(self.row_key, self.rows.iter().map(|row| row.key)));
        for (c, column) in self.columns.iter().enumerate() {
            let cells: Vec<Option<f64>> = self.rows.iter().map(|row| row.cells[c]).collect();
            columns.push(Series::new(&column.to_string(), cells));
        }
        Ok(DataFrame::new(columns)?)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AggregateOutput {
    Rows(RowTable),
    Matrix(PivotTable),
}

impl AggregateOutput {
    pub fn len(&self) -> usize {
        match self {
            AggregateOutput::Rows(table) => table.rows.len(),
            AggregateOutput::Matrix(pivot) => pivot.rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rows(&self) -> Option<&RowTable> {
        match self {
            AggregateOutput::Rows(table) => Some(table),
            AggregateOutput::Matrix(_) => None,
        }
    }

    pub fn matrix(&self) -> Option<&PivotTable> {
        match self {
            AggregateOutput::Rows(_) => None,
            AggregateOutput::Matrix(pivot) => Some(pivot),
        }
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        match self {
            AggregateOutput::Rows(table) => table.to_dataframe(),
            AggregateOutput::Matrix(pivot) => pivot.to_dataframe(),
        }
    }
}

fn key_series<I>(key: GroupKey, values: I) -> Series
where
    I: Iterator<Item = GroupValue>,
{
    let name = key.to_string();
    if key.is_numeric() {
        let numbers: Vec<Option<i32>> = values.map(GroupValue::as_number).collect();
        Series::new(&name, numbers)
    } else {
        let labels: Vec<String> = values.map(|value| value.to_string()).collect();
        Series::new(&name, labels)
    }
}

/// Groups `table` as described by `request`.
///
/// Plays with a null grouping key are left out of that grouping. Groups with
/// fewer than `min_sample` attempts are dropped before any metric is
/// computed; if none survive the result is [`Error::EmptyAggregate`].
pub fn aggregate(table: &FourthDowns, request: &AggregateRequest) -> Result<AggregateOutput> {
    log::trace!("aggregate::aggregate");
    request.validate(table.columns())?;

    let keys = request.grouping.keys();
    let names: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
    let key_cols: Vec<Expr> = names.iter().map(|name| col(name)).collect();

    let flag = match request.metric.flag() {
        Some(flag) => flag.feature().col().cast(DataType::UInt32),
        None => lit(0u32),
    };
    let mut selection: Vec<Expr> = keys.iter().map(|key| key.expr()).collect();
    selection.push(flag.alias(FLAG));
    let keyed = key_cols
        .iter()
        .fold(lit(true), |all, key| all.and(key.clone().is_not_null()));

    let grouped = table
        .lazy()
        .filter(request.population.expr())
        .select(selection)
        .filter(keyed)
        .group_by(&key_cols)
        .agg([len().alias(ATTEMPTS), col(FLAG).sum().alias(SUCCESSES)])
        .filter(col(ATTEMPTS).gt_eq(lit(request.min_sample as u64)))
        .with_columns([request.metric.expr().alias(VALUE)])
        .sort(names.clone(), SortMultipleOptions::default())
        .collect()?;

    log::debug!(
        "{} groups reached min sample {}",
        grouped.height(),
        request.min_sample
    );
    if grouped.height() == 0 {
        return Err(Error::EmptyAggregate {
            min_sample: request.min_sample,
        });
    }

    let output = match request.grouping {
        Grouping::Single(_) | Grouping::Pair(..) => {
            let ordered = order_rows(grouped, &keys, &names, request.order)?;
            AggregateOutput::Rows(row_table(keys, request.metric, &ordered)?)
        }
        Grouping::Pivot { rows, columns } => {
            AggregateOutput::Matrix(pivot_table(rows, columns, request.metric, &grouped)?)
        }
    };
    Ok(output)
}

fn order_rows(
    grouped: DataFrame,
    keys: &[GroupKey],
    names: &[String],
    order: RowOrder,
) -> Result<DataFrame> {
    let ordered = match order {
        RowOrder::KeyAscending => grouped,
        RowOrder::ValueDescending => {
            let mut by = vec![VALUE.to_string()];
            by.extend(names.iter().cloned());
            let descending: Vec<bool> = by.iter().map(|name| name == VALUE).collect();
            grouped
                .lazy()
                .sort(
                    by,
                    SortMultipleOptions::default()
                        .with_order_descending_multi(descending)
                        .with_maintain_order(true),
                )
                .collect()?
        }
        RowOrder::Reindexed => {
            // Validation guarantees a single categorical key here.
            let key = keys[0];
            let name = &names[0];
            let codes: Vec<i32> = key
                .domain()
                .unwrap_or_default()
                .into_iter()
                .map(GroupValue::code)
                .collect();
            let domain = DataFrame::new(vec![Series::new(name, codes)])?;
            domain
                .lazy()
                .left_join(grouped.lazy(), col(name), col(name))
                .sort([name.as_str()], SortMultipleOptions::default())
                .collect()?
        }
    };
    Ok(ordered)
}

fn int_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i32>>> {
    let series = df.column(name)?.cast(&DataType::Int32)?;
    let values = series.i32()?.into_iter().collect();
    Ok(values)
}

fn count_column(df: &DataFrame, name: &str) -> Result<Vec<Option<usize>>> {
    let series = df.column(name)?.cast(&DataType::UInt64)?;
    let values = series
        .u64()?
        .into_iter()
        .map(|n| n.map(|n| n as usize))
        .collect();
    Ok(values)
}

fn value_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let values = df.column(name)?.f64()?.into_iter().collect();
    Ok(values)
}

fn row_table(keys: Vec<GroupKey>, metric: Metric, df: &DataFrame) -> Result<RowTable> {
    let codes = keys
        .iter()
        .map(|key| int_column(df, &key.to_string()))
        .collect::<Result<Vec<_>>>()?;
    let attempts = count_column(df, ATTEMPTS)?;
    let successes = count_column(df, SUCCESSES)?;
    let values = value_column(df, VALUE)?;

    let rows = (0..df.height())
        .filter_map(|i| {
            let values_at: Option<Vec<GroupValue>> = keys
                .iter()
                .zip(&codes)
                .map(|(key, codes)| codes[i].and_then(|code| key.decode(code)))
                .collect();
            values_at.map(|group| AggregateRow {
                keys: group,
                attempts: attempts[i],
                successes: successes[i],
                value: values[i],
            })
        })
        .collect();

    Ok(RowTable { keys, metric, rows })
}

fn pivot_table(
    row_key: GroupKey,
    column_key: GroupKey,
    metric: Metric,
    long: &DataFrame,
) -> Result<PivotTable> {
    let row_name = row_key.to_string();
    let column_name = column_key.to_string();
    let wide = pivot_stable(
        long,
        [column_name.as_str()],
        Some([row_name.as_str()]),
        Some([VALUE]),
        false,
        None,
        None,
    )?;
    log::debug!("Pivoted {} by {}: {:?}", row_name, column_name, wide.shape());

    // Headers are the stringified column-key codes.
    let mut headers: Vec<(GroupValue, String)> = wide
        .get_column_names()
        .into_iter()
        .filter(|name| *name != row_name)
        .filter_map(|name| {
            let code: i32 = name.parse().ok()?;
            Some((column_key.decode(code)?, name.to_string()))
        })
        .collect();
    headers.sort();

    let cells = headers
        .iter()
        .map(|(_, header)| value_column(&wide, header))
        .collect::<Result<Vec<_>>>()?;
    let rows = int_column(&wide, &row_name)?
        .into_iter()
        .enumerate()
        .filter_map(|(i, code)| {
            let key = code.and_then(|code| row_key.decode(code))?;
            Some(PivotRow {
                key,
                cells: cells.iter().map(|column| column[i]).collect(),
            })
        })
        .collect();

    Ok(PivotTable {
        row_key,
        column_key,
        value_name: metric.to_string(),
        columns: headers.into_iter().map(|(value, _)| value).collect(),
        rows,
    })
}
