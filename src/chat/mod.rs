//! Interactive chat loop and turn orchestration.
//!
//! [`Runner`] owns the conversation history and drives the full cycle: read
//! a line, issue a streaming request, fold the response, scan it for an
//! embedded directive, confirm with the user, execute the tool, feed the
//! result back as the next user turn, and repeat until the model's turn
//! carries no invocation.
//!
//! Failure policy: transport/protocol errors, directive syntax errors, and
//! unknown tool names unwind out of [`Runner::run`] and end the session;
//! tool execution failures are absorbed into a `<function_result>` turn so
//! the model can recover.

mod commands;

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;

use crate::accumulator::Accumulator;
use crate::api::{Client, MessageRequest, WireMessage};
use crate::config::Config;
use crate::constants::{HISTORY_FILENAME, MAX_TOKENS, PROMPT_CONTEXT_FILES};
use crate::directive::{FunctionCall, Parser};
use crate::message::{BlockType, ContentBlock, Turn};
use crate::output::{drain, StdoutRenderer};
use crate::prompt;
use crate::tools::{self, Invocation};

/// The interactive session driver.
pub struct Runner {
    pub client: Client,
    pub model: String,
    /// Directive prefix token, injected into the parser and the prompt.
    pub prefix: String,
    /// Replaces the built-in persona when set (config or `--system-prompt`).
    pub custom_instructions: Option<String>,
    /// Files embedded into the system prompt via `--file`.
    pub context_files: Vec<PathBuf>,
}

impl Runner {
    /// Runs the chat loop until `/quit`, Ctrl+D, or a fatal error.
    pub async fn run(mut self) -> Result<()> {
        let parser = Parser::new(self.prefix.clone());
        let mut system_prompt = self.build_system_prompt()?;
        let mut turns: Vec<Turn> = Vec::new();

        // Record the tool contract in the debug log for this session.
        for spec in tools::TOOL_SPECS {
            tracing::debug!(
                target: "kumo.tools",
                tool = spec.name,
                schema = %spec.input_schema(),
                "tool available"
            );
        }

        println!(
            "{} [model: {}] (Ctrl+D to exit, /help for commands)",
            "kumo".bold().cyan(),
            self.model.yellow(),
        );
        println!();

        let mut rl = DefaultEditor::new()?;
        let history_path = Config::cache_dir()?.join(HISTORY_FILENAME);
        if history_path.exists() {
            let _ = rl.load_history(&history_path);
        }

        loop {
            match rl.readline(&format!("{} ", ">".green().bold())) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }

                    if line.starts_with('/') {
                        match commands::handle(&line, &mut turns, &self.model) {
                            commands::CommandAction::Continue => {}
                            commands::CommandAction::Quit => break,
                            commands::CommandAction::SetModel(model) => {
                                self.model = model;
                                println!("{} {}", "model:".dimmed(), self.model.yellow());
                            }
                            commands::CommandAction::SetSystem(instructions) => {
                                self.custom_instructions = Some(instructions);
                                system_prompt = self.build_system_prompt()?;
                                println!("{}", "System instructions replaced.".dimmed());
                            }
                            commands::CommandAction::Unknown(cmd) => {
                                println!("{} Unknown command: {}", "?".yellow(), cmd);
                            }
                        }
                        continue;
                    }

                    let _ = rl.add_history_entry(&line);
                    turns.push(Turn::user(&line));
                    println!();

                    self.drive_turns(&parser, &system_prompt, &mut turns).await?;
                    println!();
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "goodbye.".dimmed());
                    break;
                }
                Err(err) => {
                    eprintln!("{} {}", "error:".red().bold(), err);
                    break;
                }
            }
        }

        if let Some(parent) = history_path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let _ = rl.save_history(&history_path);

        Ok(())
    }

    /// One round of the turn state machine. Loops internally as long as the
    /// model keeps invoking tools; at most one invocation is in flight at a
    /// time, and each runs only after explicit confirmation.
    async fn drive_turns(
        &self,
        parser: &Parser,
        system_prompt: &str,
        turns: &mut Vec<Turn>,
    ) -> Result<()> {
        let mut more_work = true;

        while more_work {
            more_work = false;

            let request = MessageRequest {
                model: self.model.clone(),
                max_tokens: MAX_TOKENS,
                system: Some(system_prompt.to_string()),
                // Halt generation right at the invoke marker so nothing
                // trails the directive.
                stop_sequences: vec![parser.invoke_marker()],
                stream: true,
                messages: turns.iter().map(WireMessage::from).collect(),
            };

            // Display worker: drains the live fragment channel while we wait
            // for the completed turn, then exits when the channel closes.
            let (tx, rx) = mpsc::unbounded_channel();
            let display = tokio::spawn(async move {
                let mut renderer = StdoutRenderer::new();
                drain(rx, &mut renderer).await;
            });

            let accumulator = Accumulator::new(&self.client);
            let outcome = tokio::select! {
                result = accumulator.complete(request, Some(tx)) => Some(result),
                _ = tokio::signal::ctrl_c() => None,
            };

            // The sender is gone on both branches; wait until every buffered
            // fragment has reached the terminal before printing anything else.
            let _ = display.await;

            let Some(result) = outcome else {
                // Roll back the turn that was awaiting an answer so the user
                // can retry or rephrase.
                turns.pop();
                println!("\n{}", "interrupted".dimmed());
                return Ok(());
            };
            let result = result?;

            tracing::debug!(
                blocks = result.content_blocks.len(),
                stop_reason = result.stop_reason.as_deref().unwrap_or(""),
                stop_sequence = result.stop_sequence.as_deref().unwrap_or(""),
                input_tokens = result.input_tokens,
                output_tokens = result.output_tokens,
                "turn complete"
            );

            let (blocks, call) = scan_blocks(parser, result.content_blocks)?;
            turns.push(Turn::assistant(blocks));
            println!(
                "{}",
                format!(
                    "[tokens: {} in, {} out]",
                    result.input_tokens, result.output_tokens
                )
                .dimmed()
            );

            let Some(call) = call else {
                continue;
            };
            // An unknown tool name in a well-formed call is fatal.
            let invocation = Invocation::from_call(&call)?;

            if !confirm(&invocation)? {
                println!("{}", "Command not accepted, aborting".yellow());
                break;
            }

            let (stdout_text, stderr_text, exit_code) = match invocation.run() {
                Ok(output) => (output, String::new(), 0),
                Err(err) => {
                    eprintln!("\n{} {:#}", "command error:".red().bold(), err);
                    (String::new(), format!("{:#}", err), 1)
                }
            };

            if !stdout_text.is_empty() {
                println!("\n{}\n{}", "output:".dimmed(), stdout_text);
            }

            turns.push(Turn::user(function_result(
                &stdout_text,
                &stderr_text,
                exit_code,
            )));
            more_work = true;
        }

        Ok(())
    }

    fn build_system_prompt(&self) -> Result<String> {
        let mut builder = prompt::Builder::new(infer_project(), self.prefix.clone());
        builder.custom_instructions = self.custom_instructions.clone();

        if self.context_files.is_empty() {
            let root = std::env::current_dir()?;
            let files = tools::project_files(&root);
            builder.first_files = files.iter().take(PROMPT_CONTEXT_FILES).cloned().collect();
            builder.file_count = Some(files.len());
        } else {
            for path in &self.context_files {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read --file {}", path.display()))?;
                builder.files_content.push(prompt::FileContent {
                    filename: path.display().to_string(),
                    content,
                });
            }
        }

        Ok(builder.build())
    }
}

/// Scan the turn's text blocks for embedded directives.
///
/// Each block yields at most its first complete directive; when several
/// blocks carry one, the last block's call governs. Blocks that carried a
/// call keep their text only through `end_function`, with the invoke line
/// restored. An end-of-input parse means "no directive in this block";
/// anything else is a syntax error and fatal.
fn scan_blocks(
    parser: &Parser,
    blocks: Vec<ContentBlock>,
) -> Result<(Vec<ContentBlock>, Option<FunctionCall>)> {
    let mut call = None;
    let mut kept = Vec::with_capacity(blocks.len());

    for mut block in blocks {
        if block.block_type == BlockType::Text {
            match parser.parse(&block.text) {
                Ok((found, _leading)) => {
                    block.text = parser.canonical_text(&block.text);
                    call = Some(found);
                }
                Err(err) if err.is_end_of_input() => {}
                Err(err) => {
                    return Err(err).context("malformed directive in model output");
                }
            }
        }
        kept.push(block);
    }

    Ok((kept, call))
}

/// The result envelope appended to history after a tool runs.
fn function_result(stdout: &str, stderr: &str, exit_code: i32) -> String {
    format!(
        "<function_result>\n<stdout>{}</stdout>\n<stderr>{}</stderr>\n<exit_code>{}</exit_code>\n</function_result>",
        stdout, stderr, exit_code
    )
}

/// Show the invocation (and a diff for file changes), then ask for approval.
fn confirm(invocation: &Invocation) -> Result<bool> {
    println!("\nRequest to run command:\n\n{}\n", invocation.preview());
    if let Some(preview) = change_preview(invocation) {
        println!("{}", preview);
    }

    print!("ok? (y/N): ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Error reading from stdin")?;
    Ok(line.trim() == "y")
}

/// A colored diff of what a file-modifying invocation would change.
fn change_preview(invocation: &Invocation) -> Option<String> {
    match invocation {
        Invocation::WriteFile { filename, content } => {
            let old = fs::read_to_string(filename).ok();
            Some(crate::diff::preview(filename, old.as_deref(), content))
        }
        Invocation::ReplaceString {
            filename,
            original,
            replacement,
            count,
        } => {
            let old = fs::read_to_string(filename).ok()?;
            let (_, new) = tools::replace_count(&old, original, replacement, *count);
            Some(crate::diff::preview(filename, Some(&old), &new))
        }
        _ => None,
    }
}

/// Project identity for the system prompt: the git origin URL when
/// available, the working directory otherwise.
fn infer_project() -> String {
    if let Ok(output) = std::process::Command::new("git")
        .args(["remote", "get-url", "origin"])
        .output()
    {
        if output.status.success() {
            let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !url.is_empty() {
                return url;
            }
        }
    }
    std::env::current_dir()
        .map(|dir| dir.display().to_string())
        .unwrap_or_default()
}
