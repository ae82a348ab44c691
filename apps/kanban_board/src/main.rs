use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use kanban_client::{load_settings, BoardClient, BoardEvent, ClientSettings, DetailState, TransitionOutcome};
use kanban_shared::domain::{CardDetail, CardNumber, Lane, TextEntry};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kanban-board", about = "Browse and move cards on a kanban board server")]
struct Cli {
    /// Overrides KANBAN_SERVER_URL and ~/.config/kanban/config.yaml.
    #[arg(long)]
    server_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Projects,
    Cards {
        #[arg(long)]
        project: String,
    },
    Show {
        #[arg(long)]
        project: String,
        #[arg(long)]
        number: i64,
    },
    /// Moves a card out of Review. Todo and Doing need --reason.
    Transition {
        #[arg(long)]
        project: String,
        #[arg(long)]
        number: i64,
        #[arg(long)]
        to: Lane,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Follows live changes until interrupted.
    Watch {
        #[arg(long)]
        project: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let settings = match cli.server_url.as_deref() {
        Some(raw) => ClientSettings::with_server_url(raw)?,
        None => load_settings(),
    };
    info!(server_url = %settings.server_url, "using board server");
    let client = BoardClient::connect(&settings)?;

    match cli.command {
        Command::Projects => {
            client.reload_projects().await?;
            for project in client.snapshot().await.projects {
                println!("{}\t{}", project.slug, project.name);
            }
        }
        Command::Cards { project } => {
            client.select_project(Some(project)).await?;
            print_lanes(&client).await;
        }
        Command::Show { project, number } => {
            client.select_project(Some(project)).await?;
            client.select_card(CardNumber(number)).await?;
            match client.snapshot().await.detail {
                DetailState::Loaded(detail) => print_detail(&detail),
                other => bail!("card detail unavailable: {other:?}"),
            }
        }
        Command::Transition {
            project,
            number,
            to,
            reason,
        } => transition(&client, project, CardNumber(number), to, reason).await?,
        Command::Watch { project } => watch(&client, project).await?,
    }

    client.shutdown().await;
    Ok(())
}

async fn print_lanes(client: &BoardClient) {
    for lane in Lane::ALL {
        let cards = client.cards_in_lane(lane).await;
        println!("{lane} ({})", cards.len());
        for card in cards {
            let todos = card.todo_progress();
            let acceptance = card.acceptance_progress();
            println!(
                "  #{:<4} {}  [todos {}/{}, acceptance {}/{}]",
                card.number.0, card.title, todos.done, todos.total, acceptance.done, acceptance.total
            );
        }
    }
}

fn print_entries(heading: &str, entries: &[TextEntry]) {
    if entries.is_empty() {
        return;
    }
    println!("{heading}:");
    for entry in entries {
        println!("  [{}] {}", entry.timestamp.format("%Y-%m-%d %H:%M"), entry.body);
    }
}

fn print_detail(detail: &CardDetail) {
    println!("{} {}", detail.card_ref(), detail.title);
    println!("status: {}", detail.status);
    if let Some(branch) = &detail.branch {
        println!("branch: {branch}");
    }
    print_entries("description", &detail.description);
    for (heading, items) in [("todos", &detail.todos), ("acceptance criteria", &detail.acceptance_criteria)] {
        if items.is_empty() {
            continue;
        }
        println!("{heading}:");
        for item in items {
            let mark = if item.completed { "x" } else { " " };
            println!("  [{mark}] {}", item.text);
        }
    }
    print_entries("comments", &detail.comments);
}

async fn transition(
    client: &Arc<BoardClient>,
    project: String,
    number: CardNumber,
    target: Lane,
    reason: Option<String>,
) -> Result<()> {
    if target == Lane::Review {
        bail!("Review is not a transition target; use Todo, Doing or Done");
    }
    client.select_project(Some(project)).await?;
    client.select_card(number).await?;
    let current = match client.snapshot().await.detail {
        DetailState::Loaded(detail) => detail.status,
        other => bail!("card detail unavailable: {other:?}"),
    };
    if current != Lane::Review {
        bail!("card #{number} is in {current}; only Review cards can be moved back");
    }

    let outcome = match client.request_transition(target).await? {
        TransitionOutcome::Prompted => {
            client
                .submit_reason(reason.as_deref().unwrap_or_default())
                .await?
        }
        other => other,
    };
    if outcome != TransitionOutcome::Completed {
        bail!("card #{number} was not moved to {target}");
    }
    println!("moved #{number} to {target}");
    Ok(())
}

async fn watch(client: &Arc<BoardClient>, project: Option<String>) -> Result<()> {
    let mut events = client.subscribe_events();
    client.load().await?;
    if project.is_some() {
        client.select_project(project).await?;
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted; stopping watch");
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(BoardEvent::ProjectsChanged) => {
                    let projects = client.snapshot().await.projects;
                    println!("projects: {}", projects.iter().map(|p| p.slug.as_str()).collect::<Vec<_>>().join(", "));
                }
                Ok(BoardEvent::CardsChanged) => print_lanes(client).await,
                Ok(BoardEvent::Error(message)) => eprintln!("error: {message}"),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => info!(skipped, "watch output lagged"),
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}
