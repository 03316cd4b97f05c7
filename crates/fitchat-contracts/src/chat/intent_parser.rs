use super::command_registry::{CommandSpec, NO_ARG_COMMANDS, UPLOAD_COMMANDS};
use crate::session::TaskKind;

/// What a line typed at the chat prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Noop,
    Message(String),
    Upload { task: TaskKind, path: String },
    Clear,
    History,
    Help,
    Quit,
    Unknown { command: String, arg: String },
}

impl Intent {
    pub fn action(&self) -> &'static str {
        match self {
            Intent::Noop => "noop",
            Intent::Message(_) => "message",
            Intent::Upload { .. } => "upload",
            Intent::Clear => "clear",
            Intent::History => "history",
            Intent::Help => "help",
            Intent::Quit => "quit",
            Intent::Unknown { .. } => "unknown",
        }
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|entry| entry.command == command)
        .map(|entry| entry.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

/// Parses one line of chat input.
///
/// Lines starting with `/` followed by a word are commands; everything else
/// that is not blank is a chat message, passed on exactly as typed.
pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::Noop;
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some((_, task)) = UPLOAD_COMMANDS.iter().find(|(name, _)| *name == command) {
                return Intent::Upload {
                    task: *task,
                    path: parse_single_path_arg(arg),
                };
            }

            match find_action(&command, NO_ARG_COMMANDS) {
                Some("clear") => return Intent::Clear,
                Some("history") => return Intent::History,
                Some("help") => return Intent::Help,
                Some("quit") => return Intent::Quit,
                _ => {}
            }

            return Intent::Unknown {
                command,
                arg: arg.to_string(),
            };
        }
    }

    Intent::Message(text.trim_end_matches(['\n', '\r']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_noop() {
        assert_eq!(parse_intent(""), Intent::Noop);
        assert_eq!(parse_intent("   \t "), Intent::Noop);
    }

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(
            parse_intent("how many sets for hypertrophy?"),
            Intent::Message("how many sets for hypertrophy?".to_string())
        );
        assert_eq!(
            parse_intent("/ 3 sets?"),
            Intent::Message("/ 3 sets?".to_string())
        );
    }

    #[test]
    fn upload_commands_map_to_task_kinds() {
        assert_eq!(
            parse_intent("/food lunch.jpg"),
            Intent::Upload {
                task: TaskKind::Food,
                path: "lunch.jpg".to_string()
            }
        );
        assert_eq!(
            parse_intent("/Equipment \"/tmp/leg press.png\""),
            Intent::Upload {
                task: TaskKind::Equipment,
                path: "/tmp/leg press.png".to_string()
            }
        );
        assert_eq!(
            parse_intent("/meal").action(),
            "upload",
        );
    }

    #[test]
    fn upload_without_path_keeps_empty_path() {
        assert_eq!(
            parse_intent("/gear"),
            Intent::Upload {
                task: TaskKind::Equipment,
                path: String::new()
            }
        );
    }

    #[test]
    fn no_arg_commands() {
        assert_eq!(parse_intent("/clear"), Intent::Clear);
        assert_eq!(parse_intent("/history"), Intent::History);
        assert_eq!(parse_intent("  /help  "), Intent::Help);
        assert_eq!(parse_intent("/quit"), Intent::Quit);
        assert_eq!(parse_intent("/exit"), Intent::Quit);
    }

    #[test]
    fn unknown_command_keeps_argument() {
        assert_eq!(
            parse_intent("/macros 2000 kcal"),
            Intent::Unknown {
                command: "macros".to_string(),
                arg: "2000 kcal".to_string()
            }
        );
    }
}
