#[cfg(test)]
#[path = "terminal_test.rs"]
mod tests;

use anyhow::Result;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use yansi::Paint;

use crate::domain::models::Action;
use crate::domain::models::Event;
use crate::domain::models::Message;
use crate::domain::models::Role;
use crate::domain::models::SlashCommand;

pub fn help_text() -> String {
    let text = r#"
COMMANDS:
- /stop (/s) - Stops the reply currently being generated, keeping what has arrived so far.
- /regenerate (/r) - Discards the replies after your last message and asks again.
- /clear (/c) - Starts a new conversation.
- /export (/e) - Writes the conversation and system prompt to a JSON file in the export directory.
- /system [TEXT] - Sets the system prompt sent with every request. Leave TEXT empty to clear it.
- /quit /exit (/q) - Exit chatline.
- /help (/h) - Provides this help menu.

Anything else you type is sent as a message.
        "#;

    return text.trim().to_string();
}

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Action(Action),
    Help,
    Unknown(String),
}

/// Maps one line typed by the user to what should happen with it.
pub fn parse_input(line: &str) -> Option<Input> {
    let text = line.trim();
    if text.is_empty() {
        return None;
    }

    if !text.starts_with('/') {
        return Some(Input::Action(Action::Send(text.to_string())));
    }

    let cmd = match SlashCommand::parse(text) {
        Some(cmd) => cmd,
        None => return Some(Input::Unknown(text.to_string())),
    };

    if cmd.is_help() {
        return Some(Input::Help);
    }

    let action = if cmd.is_quit() {
        Action::Quit()
    } else if cmd.is_stop() {
        Action::Stop()
    } else if cmd.is_regenerate() {
        Action::Regenerate()
    } else if cmd.is_clear() {
        Action::Clear()
    } else if cmd.is_export() {
        Action::Export()
    } else {
        Action::SetSystemPrompt(cmd.text())
    };

    return Some(Input::Action(action));
}

/// Turns controller events into plain transcript text.
pub struct Transcript {
    user_label: String,
    streamed: bool,
}

impl Default for Transcript {
    fn default() -> Transcript {
        return Transcript::new(&Role::User.label());
    }
}

impl Transcript {
    pub fn new(user_label: &str) -> Transcript {
        return Transcript {
            user_label: user_label.to_string(),
            streamed: false,
        };
    }

    fn label(&self, role: Role) -> String {
        if role == Role::User {
            return self.user_label.to_string();
        }

        return role.label();
    }

    fn message(&self, message: &Message) -> String {
        return format!("{}: {}\n", self.label(message.role), message.content);
    }

    pub fn render(&mut self, event: &Event) -> String {
        match event {
            Event::ConversationReset(messages) => {
                return messages
                    .iter()
                    .map(|message| return self.message(message))
                    .collect::<Vec<String>>()
                    .join("");
            }
            Event::MessageAppended(message) => {
                // The user's own line is already on screen.
                if message.role == Role::User {
                    return "".to_string();
                }
                if message.content.is_empty() {
                    return format!("{}: ", self.label(message.role));
                }
                return self.message(message);
            }
            Event::SessionStarted(_) => {
                self.streamed = false;
                return "".to_string();
            }
            Event::ContentAppended(_, fragment) => {
                self.streamed = true;
                return fragment.to_string();
            }
            Event::ContentReplaced(_, content) => {
                if self.streamed {
                    return format!("\n{content}");
                }
                return content.to_string();
            }
            Event::SessionFinished(..) => {
                self.streamed = false;
                return "\n".to_string();
            }
            Event::Notice(text) => {
                return format!("* {text}\n");
            }
            Event::Exported(file_path) => {
                return format!("* Exported conversation to {}\n", file_path.display());
            }
        }
    }
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<Event>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut transcript = Transcript::default();

    while let Some(event) = rx.recv().await {
        let mut text = transcript.render(&event);
        if text.is_empty() {
            continue;
        }
        if matches!(event, Event::Notice(_) | Event::Exported(_)) {
            text = Paint::yellow(text).to_string();
        }

        stdout.write_all(text.as_bytes()).await?;
        stdout.flush().await?;
    }

    return Ok(());
}

/// Reads stdin line by line and forwards actions until the user quits or
/// input ends. Events are printed as they arrive.
pub async fn start(
    tx: mpsc::UnboundedSender<Action>,
    rx: mpsc::UnboundedReceiver<Event>,
) -> Result<()> {
    let printer = tokio::spawn(print_events(rx));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut quit = false;

    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Some(Input::Action(action)) => {
                quit = action == Action::Quit();
                tx.send(action)?;
                if quit {
                    break;
                }
            }
            Some(Input::Help) => {
                println!("{}", help_text());
            }
            Some(Input::Unknown(text)) => {
                println!(
                    "{}",
                    Paint::yellow(format!("* Unknown command {text}. Type /help for the list."))
                );
            }
            None => (),
        }
    }

    // Input ended without /quit.
    if !quit && !tx.is_closed() {
        tx.send(Action::Quit())?;
    }
    drop(tx);

    printer.await??;

    return Ok(());
}
