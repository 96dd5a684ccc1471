//! Line-oriented front end: reads commands from stdin while session events
//! stream in from the background request.

use std::sync::Arc;

use anyhow::{Context, Result};
use client_core::{OptimizerSession, SessionError, SessionEvent, ToggleOutcome};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::warn;

use crate::render;

const HELP: &str = "commands: list | toggle <item> | submit | view | reload | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Toggle(String),
    Submit,
    View,
    Reload,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "list" | "ls" => Self::List,
            "toggle" | "t" if rest.is_empty() => {
                return Err("toggle needs an item name".to_string())
            }
            "toggle" | "t" => Self::Toggle(rest.to_string()),
            "submit" | "optimize" => Self::Submit,
            "view" => Self::View,
            "reload" => Self::Reload,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(format!("unknown command '{other}'")),
        };
        Ok(Some(command))
    }
}

pub async fn run(session: Arc<OptimizerSession>) -> Result<()> {
    let mut events = session.subscribe_events();
    if let Err(err) = session.load_catalog().await {
        warn!(%err, "planner: initial menu load failed");
    }
    print!("{}", render::render_catalog(&session.current_view().await));
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match Command::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => execute(&session, command).await?,
                    Ok(None) => {}
                    Err(message) => println!("{message}; {HELP}"),
                }
            }
            event = events.recv() => match event {
                Ok(event) => on_event(&session, &event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "planner: dropped session events");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.shutdown().await;
    Ok(())
}

async fn execute(session: &Arc<OptimizerSession>, command: Command) -> Result<()> {
    match command {
        Command::List => print!("{}", render::render_catalog(&session.current_view().await)),
        Command::View => print!("{}", render::render_view(&session.current_view().await)),
        Command::Help => println!("{HELP}"),
        Command::Toggle(item) => {
            if session.toggle(&item).await? == ToggleOutcome::UnknownItem {
                println!("'{item}' is not on the menu");
            }
        }
        Command::Submit => {
            session.submit().await?;
        }
        Command::Reload => match session.reload_catalog().await {
            Ok(_) | Err(SessionError::Catalog(_) | SessionError::Superseded) => {}
            Err(err) => return Err(err.into()),
        },
        Command::Quit => {}
    }
    Ok(())
}

async fn on_event(session: &OptimizerSession, event: &SessionEvent) {
    if let Some(line) = render::render_event(event) {
        println!("{line}");
    }
    if matches!(
        event,
        SessionEvent::Succeeded { .. } | SessionEvent::Failed { .. }
    ) {
        print!("{}", render::render_view(&session.current_view().await));
    }
}

#[cfg(test)]
#[path = "tests/interactive_tests.rs"]
mod tests;
