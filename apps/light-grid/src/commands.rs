use std::io::BufRead;
use std::thread;

use crossbeam_channel::Sender;
use light_sync::LightId;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Toggle(LightId),
    Status,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let command = match (words.next()?, words.next()) {
            ("toggle" | "t", Some(id)) => Command::Toggle(parse_id(id)),
            ("status" | "s", None) => Command::Status,
            ("quit" | "q" | "exit", None) => Command::Quit,
            _ => return None,
        };
        if words.next().is_some() {
            return None;
        }
        Some(command)
    }
}

fn parse_id(raw: &str) -> LightId {
    raw.parse::<u64>()
        .map(LightId::Seq)
        .unwrap_or_else(|_| LightId::from(raw))
}

/// Reads commands from stdin until EOF, which is treated as `quit`.
pub fn spawn_stdin_reader(commands: Sender<Command>) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        warn!(error = %err, "failed to read command");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match Command::parse(&line) {
                    Some(command) => {
                        if commands.send(command).is_err() {
                            return;
                        }
                    }
                    None => warn!(input = %line.trim(), "unknown command, expected toggle <id> | status | quit"),
                }
            }
            debug!("stdin closed");
            let _ = commands.send(Command::Quit);
        })
}
