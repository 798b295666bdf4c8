use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;

use crate::{
    characters::{Archetype, StatKind},
    events::EventInstanceId,
    phase::GamePhase,
};

/// One line of input for the interactive driver.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCommand {
    Help,
    Quit,
    Status,
    Phase(GamePhase),
    Week,
    Time(f32),
    Modify {
        character: Archetype,
        stat: StatKind,
        percent: f32,
    },
    Set {
        character: Archetype,
        stat: StatKind,
        value: f32,
    },
    Get {
        character: Archetype,
        stat: StatKind,
    },
    Undo(Archetype),
    Reset,
    Recalculate,
    Trigger(String),
    Display(EventInstanceId),
    Resolve {
        id: EventInstanceId,
        response: String,
    },
    Expire(EventInstanceId),
    ClearEvents,
    Events,
    History,
    Health,
}

#[derive(Debug, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid integer '{value}' for {context}: {source}")]
    InvalidInteger {
        value: String,
        context: &'static str,
        source: ParseIntError,
    },
    #[error("invalid float '{value}' for {context}: {source}")]
    InvalidFloat {
        value: String,
        context: &'static str,
        source: ParseFloatError,
    },
    #[error("unknown character '{0}'")]
    UnknownCharacter(String),
    #[error("unknown stat '{0}'")]
    UnknownStat(String),
    #[error("unknown phase '{0}'")]
    UnknownPhase(String),
}

pub const HELP: &str = "\
commands:
  status                          week, phase, sentiment, resources
  phase <planning|implementation|feedback|event>
  week                            start the next week
  time [seconds]                  advance the clock (default 1)
  modify <character> <stat> <percent>
  set <character> <stat> <value>
  get <character> <stat>
  undo <character>
  reset                           restore base stats
  recalc                          recalculate win rates now
  trigger <event_id>
  display <id> | resolve <id> <response> | expire <id>
  clear                           expire every open event
  events | history | health
  quit";

pub fn parse_command_line(input: &str) -> Result<DriverCommand, CommandParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CommandParseError::Empty);
    }

    let mut parts = trimmed.split_whitespace();
    let verb = parts
        .next()
        .map(|v| v.to_ascii_lowercase())
        .ok_or(CommandParseError::Empty)?;

    match verb.as_str() {
        "help" | "?" => Ok(DriverCommand::Help),
        "quit" | "exit" => Ok(DriverCommand::Quit),
        "status" => Ok(DriverCommand::Status),
        "phase" => {
            let phase_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("phase"))?;
            let phase = phase_str
                .parse::<GamePhase>()
                .map_err(|_| CommandParseError::UnknownPhase(phase_str.to_string()))?;
            Ok(DriverCommand::Phase(phase))
        }
        "week" => Ok(DriverCommand::Week),
        "time" | "tick" => {
            let dt_str = parts.next().unwrap_or("1");
            Ok(DriverCommand::Time(parse_f32(dt_str, "time step")?))
        }
        "modify" | "mod" => {
            let (character, stat) = parse_character_stat(&mut parts)?;
            let percent_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("percent"))?;
            let percent = parse_f32(percent_str.trim_end_matches('%'), "modify percent")?;
            Ok(DriverCommand::Modify {
                character,
                stat,
                percent,
            })
        }
        "set" => {
            let (character, stat) = parse_character_stat(&mut parts)?;
            let value_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("value"))?;
            let value = parse_f32(value_str, "set value")?;
            Ok(DriverCommand::Set {
                character,
                stat,
                value,
            })
        }
        "get" => {
            let (character, stat) = parse_character_stat(&mut parts)?;
            Ok(DriverCommand::Get { character, stat })
        }
        "undo" => {
            let character_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("character"))?;
            Ok(DriverCommand::Undo(parse_character(character_str)?))
        }
        "reset" => Ok(DriverCommand::Reset),
        "recalc" | "recalculate" => Ok(DriverCommand::Recalculate),
        "trigger" => {
            let id = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("event id"))?;
            Ok(DriverCommand::Trigger(id.to_ascii_lowercase()))
        }
        "display" => Ok(DriverCommand::Display(parse_event_id(
            parts.next(),
            "display id",
        )?)),
        "resolve" => {
            let id = parse_event_id(parts.next(), "resolve id")?;
            let response = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("response"))?;
            Ok(DriverCommand::Resolve {
                id,
                response: response.to_string(),
            })
        }
        "expire" => Ok(DriverCommand::Expire(parse_event_id(
            parts.next(),
            "expire id",
        )?)),
        "clear" => Ok(DriverCommand::ClearEvents),
        "events" => Ok(DriverCommand::Events),
        "history" => Ok(DriverCommand::History),
        "health" => Ok(DriverCommand::Health),
        other => Err(CommandParseError::UnknownCommand(other.to_string())),
    }
}

fn parse_character_stat<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
) -> Result<(Archetype, StatKind), CommandParseError> {
    let character_str = parts
        .next()
        .ok_or(CommandParseError::MissingArgument("character"))?;
    let stat_str = parts
        .next()
        .ok_or(CommandParseError::MissingArgument("stat"))?;
    let character = parse_character(character_str)?;
    let stat = stat_str
        .parse::<StatKind>()
        .map_err(|_| CommandParseError::UnknownStat(stat_str.to_string()))?;
    Ok((character, stat))
}

fn parse_character(value: &str) -> Result<Archetype, CommandParseError> {
    value
        .parse::<Archetype>()
        .map_err(|_| CommandParseError::UnknownCharacter(value.to_string()))
}

fn parse_event_id(
    value: Option<&str>,
    context: &'static str,
) -> Result<EventInstanceId, CommandParseError> {
    let value = value.ok_or(CommandParseError::MissingArgument("event id"))?;
    value
        .trim_start_matches('#')
        .parse::<u64>()
        .map(EventInstanceId)
        .map_err(|source| CommandParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

fn parse_f32(value: &str, context: &'static str) -> Result<f32, CommandParseError> {
    value
        .parse::<f32>()
        .map_err(|source| CommandParseError::InvalidFloat {
            value: value.to_string(),
            context,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stat_commands_with_aliases() {
        assert_eq!(
            parse_command_line("modify Caster dmg 15%").unwrap(),
            DriverCommand::Modify {
                character: Archetype::Mage,
                stat: StatKind::Damage,
                percent: 15.0,
            }
        );
        assert_eq!(
            parse_command_line("  get tank hp ").unwrap(),
            DriverCommand::Get {
                character: Archetype::Tank,
                stat: StatKind::Health,
            }
        );
    }

    #[test]
    fn parses_event_commands() {
        assert_eq!(
            parse_command_line("resolve #3 emergency_patch").unwrap(),
            DriverCommand::Resolve {
                id: EventInstanceId(3),
                response: "emergency_patch".to_string(),
            }
        );
        assert_eq!(
            parse_command_line("TRIGGER Exploit_Discovered").unwrap(),
            DriverCommand::Trigger("exploit_discovered".to_string())
        );
        assert_eq!(parse_command_line("time").unwrap(), DriverCommand::Time(1.0));
    }

    #[test]
    fn reports_bad_input() {
        assert!(matches!(parse_command_line("   "), Err(CommandParseError::Empty)));
        assert!(matches!(
            parse_command_line("modify bard hp 5"),
            Err(CommandParseError::UnknownCharacter(name)) if name == "bard"
        ));
        assert!(matches!(
            parse_command_line("set mage mana 5"),
            Err(CommandParseError::UnknownStat(_))
        ));
        assert!(matches!(
            parse_command_line("phase lunch"),
            Err(CommandParseError::UnknownPhase(_))
        ));
        assert!(matches!(
            parse_command_line("resolve x fix"),
            Err(CommandParseError::InvalidInteger { .. })
        ));
        assert!(matches!(
            parse_command_line("modify mage hp"),
            Err(CommandParseError::MissingArgument("percent"))
        ));
        assert!(matches!(
            parse_command_line("dance"),
            Err(CommandParseError::UnknownCommand(_))
        ));
    }
}
