//! Operator commands read line by line from stdin.

use crate::state::{FilterChange, Trigger};
use tierboard_core::{normalize, AgentKey, DateRange, DateRangeError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(Trigger),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Date(#[from] DateRangeError),
}

pub const HELP: &str = "\
commands:
  refresh                  re-run with the current filter
  today                    show today only
  range <start> <end>      show a date range (YYYY-MM-DD)
  roster on|off            toggle the fixed-roster filter
  subset <agent>[,<agent>] rank only these agents
  subset all               rank every agent again
  track <agent>[,<agent>]  follow agents in the time-series views
  untrack                  stop following agents
  help                     show this text
  quit                     exit";

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match name.to_ascii_lowercase().as_str() {
        "refresh" | "r" => Command::Run(Trigger::refresh()),
        "today" => Command::Run(Trigger::manual(vec![FilterChange::Today])),
        "range" => match args.as_slice() {
            [start, end] => {
                let range = DateRange::parse(start, end)?;
                Command::Run(Trigger::manual(vec![FilterChange::Range { range }]))
            }
            _ => return Err(CommandError::Usage("range <start> <end>")),
        },
        "roster" => {
            let enabled = match args.as_slice() {
                ["on"] => true,
                ["off"] => false,
                _ => return Err(CommandError::Usage("roster on|off")),
            };
            Command::Run(Trigger::manual(vec![FilterChange::FixedRosterOnly {
                enabled,
            }]))
        }
        "subset" => {
            let agents = match args.as_slice() {
                ["all"] => Vec::new(),
                _ => {
                    let agents = parse_agents(&args.join(" "));
                    if agents.is_empty() {
                        return Err(CommandError::Usage("subset <agent>[,<agent>] | subset all"));
                    }
                    agents
                }
            };
            Command::Run(Trigger::manual(vec![FilterChange::AgentSubset { agents }]))
        }
        "track" => {
            let agents = parse_agents(&args.join(" "));
            if agents.is_empty() {
                return Err(CommandError::Usage("track <agent>[,<agent>]"));
            }
            Command::Run(Trigger::manual(vec![FilterChange::Track { agents }]))
        }
        "untrack" => Command::Run(Trigger::manual(vec![FilterChange::Untrack])),
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// Comma-separated agent refs, e.g. `10 - Ana, 12`.
fn parse_agents(input: &str) -> Vec<AgentKey> {
    let mut agents: Vec<AgentKey> = input
        .split(',')
        .map(normalize)
        .filter(|key| !key.is_empty())
        .collect();
    agents.sort();
    agents.dedup();
    agents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TriggerKind;

    fn trigger(line: &str) -> Trigger {
        match parse_command(line) {
            Ok(Some(Command::Run(trigger))) => trigger,
            other => panic!("expected a trigger for '{}', got {:?}", line, other),
        }
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn test_refresh_and_quit() {
        assert_eq!(trigger("refresh"), Trigger::refresh());
        assert_eq!(parse_command("QUIT"), Ok(Some(Command::Quit)));
        assert_eq!(parse_command("help"), Ok(Some(Command::Help)));
    }

    #[test]
    fn test_range() {
        let t = trigger("range 2025-06-01 2025-06-10");
        assert_eq!(t.kind, TriggerKind::Manual);
        assert_eq!(
            t.changes,
            vec![FilterChange::Range {
                range: DateRange::parse("2025-06-01", "2025-06-10").unwrap()
            }]
        );
        assert!(matches!(
            parse_command("range 2025-06-10 2025-06-01"),
            Err(CommandError::Date(DateRangeError::Inverted { .. }))
        ));
        assert!(matches!(
            parse_command("range 2025-06-10"),
            Err(CommandError::Usage(_))
        ));
    }

    #[test]
    fn test_roster_toggle() {
        assert_eq!(
            trigger("roster off").changes,
            vec![FilterChange::FixedRosterOnly { enabled: false }]
        );
        assert!(parse_command("roster maybe").is_err());
    }

    #[test]
    fn test_track_normalizes_refs() {
        let t = trigger("track 10 - Ana, 12,10");
        assert_eq!(
            t.changes,
            vec![FilterChange::Track {
                agents: vec![AgentKey::from("10"), AgentKey::from("12")]
            }]
        );
        assert!(matches!(parse_command("track"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn test_subset() {
        assert_eq!(
            trigger("subset 12, 10 - Ana").changes,
            vec![FilterChange::AgentSubset {
                agents: vec![AgentKey::from("10"), AgentKey::from("12")]
            }]
        );
        assert_eq!(
            trigger("subset all").changes,
            vec![FilterChange::AgentSubset { agents: Vec::new() }]
        );
        assert!(matches!(parse_command("subset"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_command("dance"),
            Err(CommandError::Unknown("dance".to_string()))
        );
    }
}
