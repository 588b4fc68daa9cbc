//! Line-oriented command console standing in for a GUI host.

use feedtap_site::session::{EventSink, Session};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

pub(crate) const HELP: &str =
    "commands: items | next | refresh | open <index> | channels | channel <name> | observers | quit";

#[derive(Debug, PartialEq)]
pub(crate) enum Command {
    Items,
    Next,
    Refresh,
    Open(i64),
    Channels,
    Channel(String),
    Observers,
    Help,
    Quit,
}

pub(crate) fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb {
        "items" => Command::Items,
        "next" => Command::Next,
        "refresh" => Command::Refresh,
        "open" => {
            let index = words.next().ok_or("usage: open <index>")?;
            Command::Open(
                index
                    .parse()
                    .map_err(|_| format!("not an index: {}", index))?,
            )
        }
        "channels" => Command::Channels,
        "channel" => {
            let name = words.by_ref().collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                return Err("usage: channel <name>".to_string());
            }
            Command::Channel(name)
        }
        "observers" => Command::Observers,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {}", other)),
    };

    if words.next().is_some() {
        return Err(format!("too many arguments for {}", verb));
    }
    Ok(Some(command))
}

/// Prints forwarded session events as JSON lines.
pub(crate) struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&self, name: &str, payload: Value) {
        println!("<< {} {}", name, payload);
    }
}

/// Read commands from stdin until `quit` or end of input.
pub(crate) async fn run(session: &Session) -> anyhow::Result<()> {
    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        if command == Command::Quit {
            break;
        }
        if let Err(e) = execute(session, command).await {
            warn!(error = %e, "command failed");
            println!("error: {}", e);
        }
    }

    info!("console closed");
    Ok(())
}

async fn execute(session: &Session, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Items => {
            let items = session.get_items().await?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        Command::Next => session.next_page().await?,
        Command::Refresh => session.refresh().await?,
        Command::Open(index) => {
            let note = session.on_item_click(index).await?;
            let title = note.title.as_ref().map(|t| t.text.as_str()).unwrap_or("");
            let comments: usize = note.comments.iter().map(|c| c.count()).sum();
            if note.is_video() {
                println!("video note \"{}\", {} comments, capturing", title, comments);
            } else {
                println!(
                    "image note \"{}\", {} slides, {} comments",
                    title,
                    note.slides().len(),
                    comments
                );
            }
        }
        Command::Channels => {
            for channel in session.channels().await? {
                let marker = if channel.active { "*" } else { " " };
                println!("{} {}", marker, channel.text);
            }
        }
        Command::Channel(name) => {
            session.select_channel(&name).await?;
            println!("switched to {}", name);
        }
        Command::Observers => {
            for handle in session.observers().await? {
                println!("{}", handle);
            }
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
    Ok(())
}
