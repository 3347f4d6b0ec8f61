//! Line commands accepted on stdin.

use charfeed_core::filter::ContentMode;
use charfeed_core::error::CoreError;
use charfeed_events::CatalogEventKind;

pub const HELP: &str = "\
commands:
  show                         print the visible feed
  more                         reveal the next page
  mode <safe|nsfw>             switch content mode
  tags [a,b,...]               select tags (empty clears)
  available-tags               list tags offered by the backend
  refresh                      force a catalog refetch
  ratings                      fetch and apply like/dislike counters
  <event> [character-id]       publish a catalog event, e.g. character-updated 42
  help                         this text
  quit                         stop the agent";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Show,
    More,
    Mode(ContentMode),
    Tags(Vec<String>),
    AvailableTags,
    Refresh,
    Ratings,
    Publish {
        kind: CatalogEventKind,
        character_id: Option<String>,
    },
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Missing argument for `{0}`")]
    MissingArgument(&'static str),

    #[error(transparent)]
    Invalid(#[from] CoreError),
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        let Some((word, rest)) = split_word(line) else {
            return Ok(None);
        };

        let command = match word {
            "show" | "ls" => Command::Show,
            "more" | "next" => Command::More,
            "mode" => {
                let (mode, _) = split_word(rest).ok_or(CommandError::MissingArgument("mode"))?;
                Command::Mode(mode.parse()?)
            }
            "tags" => Command::Tags(
                rest.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            "available-tags" => Command::AvailableTags,
            "refresh" => Command::Refresh,
            "ratings" => Command::Ratings,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => match other.parse::<CatalogEventKind>() {
                Ok(kind) => Command::Publish {
                    kind,
                    character_id: split_word(rest).map(|(id, _)| id.to_string()),
                },
                Err(_) => return Err(CommandError::Unknown(other.to_string())),
            },
        };
        Ok(Some(command))
    }
}

fn split_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim())),
        None => Some((input, "")),
    }
}
