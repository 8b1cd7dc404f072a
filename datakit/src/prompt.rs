//! A one-shot command prompt.

use std::future::Future;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use log::{debug, warn};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Command {name} failed: {reason:#}")]
    Command { name: String, reason: anyhow::Error },
}

pub type PromptResult<T> = Result<T, PromptError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    /// The command ran; holds the message it produced.
    Completed(String),
    /// No command with this name.
    Unknown(String),
}

impl PromptOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            PromptOutcome::Completed(_) => 0,
            PromptOutcome::Unknown(_) => 1,
        }
    }
}

type Handler = Box<dyn Fn(Vec<String>) -> LocalBoxFuture<'static, anyhow::Result<String>>>;

struct Command {
    name: String,
    title: String,
    handler: Handler,
}

#[derive(Default)]
pub struct Prompt {
    commands: Vec<Command>,
}

impl Prompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command. A later registration under the same name replaces
    /// the earlier one but keeps its place in the menu.
    pub fn command<F, Fut>(mut self, name: &str, title: &str, handler: F) -> Self
    where
        F: Fn(Vec<String>) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<String>> + 'static,
    {
        let command = Command {
            name: name.to_string(),
            title: title.to_string(),
            handler: Box::new(move |args| handler(args).boxed_local()),
        };

        match self.commands.iter_mut().find(|existing| existing.name == name) {
            Some(existing) => *existing = command,
            None => self.commands.push(command),
        }
        self
    }

    pub fn menu(&self) -> String {
        let lines: Vec<String> = self
            .commands
            .iter()
            .map(|command| format!("{} - {}", command.name, command.title))
            .collect();

        format!("Enter a command:\n\n{}\n\n", lines.join("\n"))
    }

    /// Shows the menu, reads one line and runs the command it names with the
    /// remaining words as arguments.
    pub async fn run<R, W>(&self, mut input: R, output: &mut W) -> PromptResult<PromptOutcome>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        output.write_all(self.menu().as_bytes()).await?;
        output.flush().await?;

        let mut line = String::new();
        input.read_line(&mut line).await?;

        let mut words = line.split_whitespace().map(str::to_string);
        let name = words.next().unwrap_or_default();
        let args: Vec<String> = words.collect();

        let Some(command) = self.commands.iter().find(|command| command.name == name) else {
            warn!("Unknown command {name}");
            output
                .write_all(format!("Unknown command {name}\n").as_bytes())
                .await?;
            output.flush().await?;
            return Ok(PromptOutcome::Unknown(name));
        };

        debug!("Running command {name} with {} argument(s)", args.len());
        let message = (command.handler)(args)
            .await
            .map_err(|reason| PromptError::Command {
                name: name.clone(),
                reason,
            })?;

        output.write_all(format!("{message}\n").as_bytes()).await?;
        output.flush().await?;
        Ok(PromptOutcome::Completed(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> Prompt {
        Prompt::new()
            .command("echo", "repeat the arguments", |args| async move {
                Ok::<_, anyhow::Error>(args.join(" "))
            })
            .command("fail", "always fails", |_| async {
                Err::<String, _>(anyhow::anyhow!("nothing to do"))
            })
    }

    #[test]
    fn test_menu_lists_commands_in_order() {
        assert_eq!(
            prompt().menu(),
            "Enter a command:\n\necho - repeat the arguments\nfail - always fails\n\n"
        );
        assert_eq!(Prompt::new().menu(), "Enter a command:\n\n\n\n");
    }

    #[test]
    fn test_re_registering_replaces_the_title() {
        let prompt = prompt().command("echo", "say it again", |_| async {
            Ok::<_, anyhow::Error>(String::new())
        });
        assert_eq!(
            prompt.menu(),
            "Enter a command:\n\necho - say it again\nfail - always fails\n\n"
        );
    }

    #[tokio::test]
    async fn test_runs_known_command() {
        let mut output: Vec<u8> = Vec::new();
        let outcome = prompt()
            .run(&b"echo hello  world\n"[..], &mut output)
            .await
            .unwrap();

        assert_eq!(outcome, PromptOutcome::Completed("hello world".to_string()));
        assert_eq!(outcome.exit_code(), 0);

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Enter a command:\n\n"));
        assert!(output.ends_with("\n\nhello world\n"));
    }

    #[tokio::test]
    async fn test_unknown_command_exits_with_one() {
        let mut output: Vec<u8> = Vec::new();
        let outcome = prompt().run(&b"jump\n"[..], &mut output).await.unwrap();

        assert_eq!(outcome, PromptOutcome::Unknown("jump".to_string()));
        assert_eq!(outcome.exit_code(), 1);
        assert!(String::from_utf8(output)
            .unwrap()
            .ends_with("Unknown command jump\n"));
    }

    #[tokio::test]
    async fn test_empty_input_is_unknown() {
        let mut output: Vec<u8> = Vec::new();
        let outcome = prompt().run(&b""[..], &mut output).await.unwrap();
        assert_eq!(outcome, PromptOutcome::Unknown(String::new()));
    }

    #[tokio::test]
    async fn test_command_errors_carry_the_name() {
        let mut output: Vec<u8> = Vec::new();
        let err = prompt().run(&b"fail\n"[..], &mut output).await.unwrap_err();

        assert!(matches!(err, PromptError::Command { ref name, .. } if name == "fail"));
        assert_eq!(err.to_string(), "Command fail failed: nothing to do");
    }
}
