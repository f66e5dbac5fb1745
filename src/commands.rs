//! Slash-command dispatch (§4.7). Lines starting with `/` are intercepted
//! before the agent ever sees them. The dispatcher only does name lookup and
//! `{input}` substitution against an already-resolved command table; walking
//! the filesystem for user-defined command files is the caller's job.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct CommandTableEntry {
    pub name: String,
    pub body_template: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Clear,
    ShowModel,
    SwitchModel(String),
    Handover(Option<String>),
    Help(Vec<String>),
    CustomPrompt(String),
    Error(String),
}

/// Returns `None` when `input` isn't a slash command at all, so the caller
/// can fall through to treating it as an ordinary prompt.
pub fn dispatch(
    input: &str,
    table: &HashMap<String, CommandTableEntry>,
    conversation_is_empty: bool,
) -> Option<CommandOutcome> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    Some(match name {
        "clear" => CommandOutcome::Clear,
        "model" if arg.is_empty() => CommandOutcome::ShowModel,
        "model" => CommandOutcome::SwitchModel(arg.to_string()),
        "handover" => {
            if conversation_is_empty {
                CommandOutcome::Error("nothing to hand over - the conversation is empty".to_string())
            } else {
                let instructions = if arg.is_empty() { None } else { Some(arg.to_string()) };
                CommandOutcome::Handover(instructions)
            }
        }
        "help" => CommandOutcome::Help(help_lines(table)),
        other => match table.get(other) {
            Some(entry) => CommandOutcome::CustomPrompt(entry.body_template.replace("{input}", arg)),
            None => CommandOutcome::Error(format!("unknown command: /{other}")),
        },
    })
}

fn help_lines(table: &HashMap<String, CommandTableEntry>) -> Vec<String> {
    let mut lines = vec![
        "/clear - clear conversation history".to_string(),
        "/model [name] - show or switch the active model".to_string(),
        "/handover [instructions] - summarize and start fresh".to_string(),
        "/help - list commands".to_string(),
    ];
    let mut custom: Vec<&String> = table.keys().collect();
    custom.sort();
    lines.extend(custom.into_iter().map(|name| format!("/{name} - custom command")));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_table() -> HashMap<String, CommandTableEntry> {
        HashMap::new()
    }

    #[test]
    fn non_slash_input_is_not_a_command() {
        assert_eq!(dispatch("hello there", &empty_table(), false), None);
    }

    #[test]
    fn clear_matches_exactly() {
        assert_eq!(dispatch("/clear", &empty_table(), false), Some(CommandOutcome::Clear));
    }

    #[test]
    fn model_without_argument_shows_current() {
        assert_eq!(dispatch("/model", &empty_table(), false), Some(CommandOutcome::ShowModel));
    }

    #[test]
    fn model_with_argument_switches() {
        assert_eq!(
            dispatch("/model claude-sonnet-4-5", &empty_table(), false),
            Some(CommandOutcome::SwitchModel("claude-sonnet-4-5".to_string()))
        );
    }

    #[test]
    fn handover_refuses_on_empty_conversation() {
        let outcome = dispatch("/handover", &empty_table(), true).unwrap();
        assert!(matches!(outcome, CommandOutcome::Error(_)));
    }

    #[test]
    fn handover_carries_instructions() {
        assert_eq!(
            dispatch("/handover focus on the auth bug", &empty_table(), false),
            Some(CommandOutcome::Handover(Some("focus on the auth bug".to_string())))
        );
    }

    #[test]
    fn unknown_command_falls_through_to_custom_table() {
        let mut table = empty_table();
        table.insert(
            "review".to_string(),
            CommandTableEntry { name: "review".to_string(), body_template: "Review this: {input}".to_string() },
        );
        assert_eq!(
            dispatch("/review the diff", &table, false),
            Some(CommandOutcome::CustomPrompt("Review this: the diff".to_string()))
        );
    }

    #[test]
    fn truly_unknown_command_is_an_error() {
        let outcome = dispatch("/nonexistent", &empty_table(), false).unwrap();
        assert_eq!(outcome, CommandOutcome::Error("unknown command: /nonexistent".to_string()));
    }
}
