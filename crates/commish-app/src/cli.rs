// Command-line parsing.

use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::pipeline::{Action, PreviewMode};

pub const HELP: &str = include_str!("cli_help.txt");

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("missing command (expected `preview` or `recap`)")]
    MissingCommand,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("missing value for {0}")]
    MissingValue(&'static str),

    #[error("invalid value for {flag}: {value}")]
    InvalidValue { flag: &'static str, value: String },

    #[error("missing required --week")]
    MissingWeek,

    #[error("{flag} only applies to `{command}`")]
    WrongCommand {
        flag: &'static str,
        command: &'static str,
    },

    #[error("unknown arg: {0}")]
    UnknownArg(String),
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Help,
    Run(CliArgs),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub action: Action,
    pub league_id: Option<u64>,
    pub year: u16,
    pub week: u16,
    pub out: Option<PathBuf>,
    pub espn_s2: Option<String>,
    pub swid: Option<String>,
    pub stream: bool,
    pub verbose: bool,
}

/// Season a date belongs to. January and February games finish the
/// previous year's season.
pub fn current_season(today: NaiveDate) -> u16 {
    let year = if today.month() < 3 {
        today.year() - 1
    } else {
        today.year()
    };
    u16::try_from(year).unwrap_or(u16::MAX)
}

/// Parse arguments (program name already skipped).
pub fn parse_args<I>(args: I, today: NaiveDate) -> Result<Invocation, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();

    let command = match args.next() {
        None => return Err(CliError::MissingCommand),
        Some(a) if a == "-h" || a == "--help" => return Ok(Invocation::Help),
        Some(a) => a,
    };
    let is_preview = match command.as_str() {
        "preview" => true,
        "recap" => false,
        other => return Err(CliError::UnknownCommand(other.to_string())),
    };

    let mut league_id = None;
    let mut year = None;
    let mut week = None;
    let mut out = None;
    let mut freeform = false;
    let mut team = None;
    let mut espn_s2 = None;
    let mut swid = None;
    let mut stream = false;
    let mut verbose = false;

    while let Some(a) = args.next() {
        match a.as_str() {
            "-l" | "--league" => {
                league_id = Some(number(&mut args, "--league")?);
            }
            "-y" | "--year" => year = Some(number(&mut args, "--year")?),
            // Out-of-season weeks are not rejected here; they render as empty.
            "-w" | "--week" => week = Some(number(&mut args, "--week")?),
            "-o" | "--out" => {
                out = Some(PathBuf::from(args.next().ok_or(CliError::MissingValue("--out"))?))
            }
            "--freeform" => {
                if !is_preview {
                    return Err(CliError::WrongCommand {
                        flag: "--freeform",
                        command: "preview",
                    });
                }
                freeform = true;
            }
            "-t" | "--team" => {
                if is_preview {
                    return Err(CliError::WrongCommand {
                        flag: "--team",
                        command: "recap",
                    });
                }
                team = Some(number(&mut args, "--team")?);
            }
            "--espn-s2" => espn_s2 = Some(args.next().ok_or(CliError::MissingValue("--espn-s2"))?),
            "--swid" => swid = Some(args.next().ok_or(CliError::MissingValue("--swid"))?),
            "--stream" => stream = true,
            "-v" | "--verbose" => verbose = true,
            "-h" | "--help" => return Ok(Invocation::Help),
            _ => return Err(CliError::UnknownArg(a)),
        }
    }

    let action = if is_preview {
        Action::Preview(if freeform {
            PreviewMode::Freeform
        } else {
            PreviewMode::Structured
        })
    } else {
        Action::Recap { team }
    };

    Ok(Invocation::Run(CliArgs {
        action,
        league_id,
        year: year.unwrap_or_else(|| current_season(today)),
        week: week.ok_or(CliError::MissingWeek)?,
        out,
        espn_s2,
        swid,
        stream,
        verbose,
    }))
}

fn number<T, I>(args: &mut I, flag: &'static str) -> Result<T, CliError>
where
    T: std::str::FromStr,
    I: Iterator<Item = String>,
{
    let v = args.next().ok_or(CliError::MissingValue(flag))?;
    v.trim()
        .parse()
        .map_err(|_| CliError::InvalidValue { flag, value: v })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()
    }

    fn parse(line: &str) -> Result<Invocation, CliError> {
        parse_args(line.split_whitespace().map(String::from), today())
    }

    fn run(line: &str) -> CliArgs {
        match parse(line).unwrap() {
            Invocation::Run(args) => args,
            Invocation::Help => panic!("expected run"),
        }
    }

    #[test]
    fn preview_with_defaults() {
        let args = run("preview --league 97124817 --week 3");
        assert_eq!(args.action, Action::Preview(PreviewMode::Structured));
        assert_eq!(args.league_id, Some(97124817));
        assert_eq!(args.year, 2024);
        assert_eq!(args.week, 3);
        assert!(args.out.is_none());
        assert!(!args.stream);
    }

    #[test]
    fn recap_with_everything() {
        let args = run(
            "recap -l 5 -y 2023 -w 14 -o out/ -t 4 --espn-s2 abc --swid {X} --stream -v",
        );
        assert_eq!(args.action, Action::Recap { team: Some(4) });
        assert_eq!(args.year, 2023);
        assert_eq!(args.week, 14);
        assert_eq!(args.out, Some(PathBuf::from("out/")));
        assert_eq!(args.espn_s2.as_deref(), Some("abc"));
        assert_eq!(args.swid.as_deref(), Some("{X}"));
        assert!(args.stream && args.verbose);
    }

    #[test]
    fn freeform_preview() {
        let args = run("preview --week 1 --freeform");
        assert_eq!(args.action, Action::Preview(PreviewMode::Freeform));
        assert_eq!(args.league_id, None);
    }

    #[test]
    fn weeks_outside_the_season_reach_the_pipeline() {
        assert_eq!(run("preview --week 19").week, 19);
        assert_eq!(run("recap --week 0").week, 0);
    }

    #[test]
    fn help_anywhere() {
        assert_eq!(parse("--help").unwrap(), Invocation::Help);
        assert_eq!(parse("recap -h").unwrap(), Invocation::Help);
    }

    #[test]
    fn errors() {
        assert_eq!(parse(""), Err(CliError::MissingCommand));
        assert_eq!(parse("draft --week 1"), Err(CliError::UnknownCommand("draft".into())));
        assert_eq!(parse("preview"), Err(CliError::MissingWeek));
        assert_eq!(parse("preview --week"), Err(CliError::MissingValue("--week")));
        assert_eq!(
            parse("preview --week -1"),
            Err(CliError::InvalidValue {
                flag: "--week",
                value: "-1".into()
            })
        );
        assert_eq!(
            parse("preview --league abc --week 2"),
            Err(CliError::InvalidValue {
                flag: "--league",
                value: "abc".into()
            })
        );
        assert_eq!(
            parse("recap --week 2 --freeform"),
            Err(CliError::WrongCommand {
                flag: "--freeform",
                command: "preview"
            })
        );
        assert_eq!(
            parse("preview --week 2 --team 3"),
            Err(CliError::WrongCommand {
                flag: "--team",
                command: "recap"
            })
        );
        assert_eq!(parse("recap --week 2 --bogus"), Err(CliError::UnknownArg("--bogus".into())));
    }

    #[test]
    fn season_rolls_over_in_march() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(current_season(d(2025, 1, 5)), 2024);
        assert_eq!(current_season(d(2025, 2, 28)), 2024);
        assert_eq!(current_season(d(2025, 3, 1)), 2025);
        assert_eq!(current_season(d(2025, 12, 31)), 2025);
    }
}
