//! Interactive chat application for hosted LLM completions.
//!
//! This binary provides a streaming REPL interface for chatting with models
//! served by Groq's OpenAI-compatible API. Every completed exchange is saved
//! to a local SQLite database so past chats can be listed and continued.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings (reads GROQ_API_KEY)
//! parley-chat
//!
//! # Specify a model and a token budget
//! parley-chat --model llama-3.3-70b-versatile --max-tokens 4096
//!
//! # Keep chats for a different user in a different file
//! parley-chat --user alice --db alice.db
//!
//! # Disable colors (useful for piping output)
//! parley-chat --no-color
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/models` - List available models
//! - `/model <id>` - Change the model
//! - `/tokens <n>` - Set the response token budget
//! - `/history` - List past chats
//! - `/load <id>` - Continue a past chat
//! - `/clear` - Clear conversation history
//! - `/stats` - Show session statistics
//! - `/quit` - Exit the application

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use parley::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, Renderer, help_text,
    parse_command,
};
use parley::{Completions, Groq, MODELS, RecordStore};

/// Main entry point for the parley-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("parley-chat [OPTIONS]");
    init_tracing();

    let config = ChatConfig::try_from(args)?;
    let client = Groq::with_options(None, config.base_url.clone(), None)?;
    let store = RecordStore::open(&config.db_path).await?;
    tracing::info!(
        db = %config.db_path.display(),
        user = %config.user_id,
        model = config.model.id,
        "chat starting"
    );

    let mut session = ChatSession::new(client, store, &config);
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    println!(
        "Parley Chat (model: {}, user: {})",
        config.model.id, config.user_id
    );
    println!("Type /help for commands, /quit to exit\n");

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Check for slash commands
                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Clear => {
                            session.clear();
                            renderer.print_info("Conversation cleared.");
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Models => {
                            let selected = session.model().map(|m| m.id);
                            for model in MODELS {
                                renderer.print_model(model, Some(model.id) == selected);
                            }
                        }
                        ChatCommand::Model(id) => match session.select_model(&id) {
                            Ok(true) => renderer.print_info(&format!(
                                "Model changed to: {id} (conversation cleared, max_tokens {})",
                                session.max_tokens()
                            )),
                            Ok(false) => renderer.print_info(&format!("Already using {id}.")),
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::MaxTokens(requested) => {
                            let used = session.set_max_tokens(requested);
                            renderer.print_info(&format!("max_tokens set to {used}"));
                        }
                        ChatCommand::History => match session.past_chats().await {
                            Ok(records) if records.is_empty() => {
                                renderer.print_info("No previous chats.");
                            }
                            Ok(records) => {
                                renderer.print_info("Previous chats:");
                                for record in &records {
                                    renderer.print_past_chat(record);
                                }
                            }
                            Err(err) => {
                                renderer.print_error(&format!("Failed to list chats: {err}"))
                            }
                        },
                        ChatCommand::Load(id) => match session.load_chat(id).await {
                            Ok(turns) => {
                                for turn in turns {
                                    renderer.print_turn(turn);
                                }
                            }
                            Err(err) => {
                                renderer.print_error(&format!("Failed to load chat {id}: {err}"))
                            }
                        },
                        ChatCommand::Stats => {
                            print_stats(&session);
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                // Regular message - send to API
                if let Err(e) = session.submit(line, &mut renderer).await {
                    renderer.print_error(&e.to_string());
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    session.store().close().await;
    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

fn print_stats<C: Completions>(session: &ChatSession<C>) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!(
        "      Model: {}",
        stats.model.as_deref().unwrap_or("(none)")
    );
    println!("      Turns: {}", stats.turn_count);
    println!("      Max tokens: {}", stats.max_tokens);
    println!("      User: {}", stats.user_id);
    println!(
        "      Responses: {}",
        if stats.stream { "streamed" } else { "whole" }
    );
    println!(
        "      Exchanges: {} answered / {} abandoned / {} unsaved",
        stats.exchanges, stats.abandoned, stats.unsaved
    );
    match session.store().path() {
        Some(path) => println!("      Database: {}", path.display()),
        None => println!("      Database: (in memory)"),
    }
}
