//! Slash command handlers for the chat loop.
//!
//! Local commands never contact the model. Handlers that need to mutate the
//! runner's state (model, system instructions) return it in the action so
//! the loop applies the change where the state lives.

use colored::Colorize;

use crate::api::models;
use crate::message::{Role, Turn};

/// Action returned by slash command handling.
#[derive(Debug, PartialEq)]
pub(crate) enum CommandAction {
    /// Command was handled; continue the loop.
    Continue,
    /// Exit the session.
    Quit,
    /// Switch to this model for subsequent requests.
    SetModel(String),
    /// Replace the system instructions and rebuild the prompt.
    SetSystem(String),
    /// Unrecognized command.
    Unknown(String),
}

/// Dispatch a slash command.
pub(crate) fn handle(line: &str, turns: &mut Vec<Turn>, model: &str) -> CommandAction {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        "/help" => {
            println!("{}", "Commands:".bold());
            println!("  {}            show this help message", "/help".cyan());
            println!("  {}         show full conversation history", "/history".cyan());
            println!("  {}           clear all history and start again", "/reset".cyan());
            println!("  {}    show or switch the model", "/model [name]".cyan());
            println!("  {}   replace the system instructions", "/system <text>".cyan());
            println!("  {}            exit", "/quit".cyan());
            CommandAction::Continue
        }
        "/history" => {
            for turn in turns.iter() {
                let label = match turn.role {
                    Role::User => "you:".green().bold(),
                    Role::Assistant => "kumo:".cyan().bold(),
                };
                println!("{}\n{}", label, turn.text());
                println!();
            }
            CommandAction::Continue
        }
        "/reset" => {
            turns.clear();
            println!("{}", "History cleared.".dimmed());
            CommandAction::Continue
        }
        "/model" => {
            if rest.is_empty() {
                models::print_models(model);
                return CommandAction::Continue;
            }
            if !models::is_known(rest) {
                println!(
                    "{} {} is not in the known model table; using it anyway",
                    "note:".yellow(),
                    rest
                );
            }
            CommandAction::SetModel(rest.to_string())
        }
        "/system" => {
            if rest.is_empty() {
                println!("usage: /system <instructions>");
                return CommandAction::Continue;
            }
            CommandAction::SetSystem(rest.to_string())
        }
        "/quit" => CommandAction::Quit,
        _ => CommandAction::Unknown(line.to_string()),
    }
}
