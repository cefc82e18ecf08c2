use anyhow::{bail, Context, Result};
use clap::Parser;
use fourth_down::{
    analysis,
    pbp::{self, PlayFilter, SourceLayout, DEFAULT_DATA_DIR, DEFAULT_TEMPLATE},
    report,
};
use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::path::PathBuf;

mod render;

#[derive(Clone, Copy, Debug)]
struct WeekRange {
    start: u16,
    end: u16,
}

fn parse_weeks(raw: &str) -> std::result::Result<WeekRange, String> {
    let (start, end) = raw
        .split_once('-')
        .ok_or_else(|| format!("expected START-END, got {raw}"))?;
    let start: u16 = start.trim().parse().map_err(|e| format!("bad start week: {e}"))?;
    let end: u16 = end.trim().parse().map_err(|e| format!("bad end week: {e}"))?;
    if start > end {
        return Err(format!("start week {start} is after end week {end}"));
    }
    Ok(WeekRange { start, end })
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(short = 'd', long = "data-dir", value_name = "DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_TEMPLATE)]
    template: String,

    #[arg(long, default_value_t = 1999)]
    start: i32,

    #[arg(long, default_value_t = 2024)]
    end: i32,

    #[arg(short = 'o', long = "out", value_name = "DIR", default_value = "reports")]
    out: PathBuf,

    #[arg(short = 't', long = "team")]
    team: Option<String>,

    #[arg(short = 'w', long = "weeks", value_parser = parse_weeks)]
    weeks: Option<WeekRange>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set the default level based on verbosity
    let default_level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let config = ConfigBuilder::new().add_filter_allow_str("fourth_down").build();

    TermLogger::init(
        default_level,
        config,
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    log::trace!("Args {:#?}", args);

    if args.start > args.end {
        bail!("--start {} is after --end {}", args.start, args.end);
    }

    let layout = SourceLayout::new(args.data_dir.clone()).with_template(args.template.clone());
    let seasons: Vec<i32> = (args.start..=args.end).collect();

    let mut filter = PlayFilter::new();
    if let Some(team) = &args.team {
        filter = filter.team(team);
    }
    filter = match args.weeks {
        Some(WeekRange { start, end }) if start == end => filter.week(start),
        Some(WeekRange { start, end }) => filter.week_range(start, end),
        None => filter,
    };

    let (table, load) = pbp::load_seasons(&layout, &seasons, filter)
        .with_context(|| format!("loading seasons from {}", args.data_dir.display()))?;
    let report = report::build_report(&table, &load, &analysis::standard_catalog())?;
    render::write_report(&args.out, &report)?;

    let summary = &report.summary;
    println!(
        "{} 4th downs from {} seasons ({} missing)",
        summary.total_fourth_downs,
        summary.seasons_loaded.len(),
        summary.seasons_skipped.len()
    );
    let count = |n: Option<usize>| n.map_or_else(|| "n/a".to_string(), |n| n.to_string());
    let pct = |rate: Option<f64>| rate.map_or_else(|| "n/a".to_string(), |rate| format!("{rate:.1}%"));
    println!(
        "Go for it: {} ({}), converted {} ({})",
        count(summary.go_attempts),
        pct(summary.go_for_it_rate),
        count(summary.conversions),
        pct(summary.success_rate)
    );
    println!(
        "{} artifacts written to {}",
        summary.artifacts,
        args.out.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weeks_parse_as_inclusive_range() {
        let weeks = parse_weeks("3-9").unwrap();
        assert_eq!((weeks.start, weeks.end), (3, 9));
        let weeks = parse_weeks(" 5 - 5 ").unwrap();
        assert_eq!((weeks.start, weeks.end), (5, 5));
    }

    #[test]
    fn malformed_weeks_are_rejected() {
        assert!(parse_weeks("7").is_err());
        assert!(parse_weeks("a-3").is_err());
        assert!(parse_weeks("3-").is_err());
        assert!(parse_weeks("-1-4").is_err());
        let err = parse_weeks("9-3").unwrap_err();
        assert!(err.contains("after"), "{err}");
    }

    #[test]
    fn args_accept_weeks_and_team() {
        let args = Args::parse_from(["fourth-down", "-t", "PHI", "-w", "1-4", "--start", "2020", "--end", "2021"]);
        assert_eq!(args.team.as_deref(), Some("PHI"));
        assert_eq!(args.weeks.map(|w| (w.start, w.end)), Some((1, 4)));
        assert_eq!((args.start, args.end), (2020, 2021));
        assert!(Args::try_parse_from(["fourth-down", "-w", "4-1"]).is_err());
    }
}
