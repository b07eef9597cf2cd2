//! Interactive command parsing.

use std::str::FromStr;

use thiserror::Error;

use crate::bridge::VoiceParam;
use crate::bridge::types::parse_voice_value;
use crate::config::languages::parse_language;
use crate::text::breaks::{DEFAULT_COMMA_BREAK, parse_comma_break, parse_period_break};

pub const HELP: &str = "\
Commands:
  text <TEXT>            replace the text
  append <TEXT>          add a line to the text
  show                   print the text
  clear                  clear the text
  breaks                 insert pause markers for the current settings
  period <SECONDS>       pause after periods (1.0 - 8.0)
  comma [SECONDS|off]    pause after commas (0.1 - 0.9), off to disable
  lang <CODE>            synthesis language
  languages              list languages
  voice [PARAM VALUE]    show or set stability / similarity / style (0.0 - 1.0)
  generate               synthesize the text
  play | pause | stop    control playback
  seek <SECONDS|M:SS>    jump to a position
  save                   save the audio to a file
  key <API_KEY>          store the ElevenLabs API key
  status                 show settings and player state
  dismiss                hide the current message
  help                   show this help
  quit                   exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Text(String),
    Append(String),
    Show,
    Clear,
    Breaks,
    Period(f64),
    Comma(Option<f64>),
    Lang(String),
    Languages,
    Voice(Option<(VoiceParam, f32)>),
    Generate,
    Play,
    Pause,
    Stop,
    Seek(f64),
    Save,
    Key(String),
    Status,
    Dismiss,
    Help,
    Quit,
}

impl Command {
    /// Commands usable before an API key is configured.
    pub fn allowed_unconfigured(&self) -> bool {
        matches!(self, Command::Key(_) | Command::Languages | Command::Help | Command::Quit)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}', type 'help' for a list")]
    Unknown(String),
    #[error("'{command}' expects {expected}")]
    MissingArgument { command: &'static str, expected: &'static str },
    #[error("'{command}': {reason}")]
    InvalidArgument { command: &'static str, reason: String },
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "" => return Err(CommandError::Empty),
            "text" => Command::Text(required("text", "some text", rest)?.to_string()),
            "append" => Command::Append(required("append", "some text", rest)?.to_string()),
            "show" => Command::Show,
            "clear" => Command::Clear,
            "breaks" => Command::Breaks,
            "period" => Command::Period(parse_period_break(required("period", "a duration in seconds", rest)?).map_err(invalid("period"))?),
            "comma" => match rest.to_ascii_lowercase().as_str() {
                "" => Command::Comma(Some(DEFAULT_COMMA_BREAK)),
                "off" | "none" => Command::Comma(None),
                value => Command::Comma(Some(parse_comma_break(value).map_err(invalid("comma"))?)),
            },
            "lang" | "language" => Command::Lang(parse_language(required("lang", "a language code", rest)?).map_err(invalid("lang"))?),
            "languages" => Command::Languages,
            "voice" => {
                if rest.is_empty() {
                    Command::Voice(None)
                } else {
                    let (param, value) = rest.split_once(char::is_whitespace).ok_or(CommandError::MissingArgument { command: "voice", expected: "a parameter and a value" })?;
                    let param = param.parse::<VoiceParam>().map_err(invalid("voice"))?;
                    let value = parse_voice_value(value.trim()).map_err(invalid("voice"))?;
                    Command::Voice(Some((param, value)))
                }
            }
            "generate" | "gen" => Command::Generate,
            "play" => Command::Play,
            "pause" => Command::Pause,
            "stop" => Command::Stop,
            "seek" => Command::Seek(parse_position(required("seek", "a position", rest)?).map_err(invalid("seek"))?),
            "save" => Command::Save,
            "key" => Command::Key(required("key", "an API key", rest)?.to_string()),
            "status" => Command::Status,
            "dismiss" => Command::Dismiss,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

fn required<'a>(command: &'static str, expected: &'static str, rest: &'a str) -> Result<&'a str, CommandError> {
    if rest.is_empty() { Err(CommandError::MissingArgument { command, expected }) } else { Ok(rest) }
}

fn invalid(command: &'static str) -> impl Fn(String) -> CommandError {
    move |reason| CommandError::InvalidArgument { command, reason }
}

/// Parse `12.5` or `1:05` into seconds.
fn parse_position(s: &str) -> Result<f64, String> {
    let seconds = match s.split_once(':') {
        Some((minutes, secs)) => {
            let minutes: u64 = minutes.parse().map_err(|_| format!("'{}' is not a valid position", s))?;
            let secs: f64 = secs.parse().map_err(|_| format!("'{}' is not a valid position", s))?;
            minutes as f64 * 60.0 + secs
        }
        None => s.parse().map_err(|_| format!("'{}' is not a valid position", s))?,
    };
    if seconds.is_finite() { Ok(seconds) } else { Err(format!("'{}' is not a valid position", s)) }
}
