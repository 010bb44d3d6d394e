use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use client_core::{load_settings, BoardClient, MutationOutcome, RollbackStrategy, Severity};
use shared::domain::{Board, ColumnId, TaskId};
use tracing::info;

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides the configured database location.
    #[arg(long)]
    database_url: Option<String>,
    /// Overrides the configured confirmation failure probability (0 to 1).
    #[arg(long, value_parser = parse_probability)]
    failure_probability: Option<f64>,
    #[arg(long)]
    rollback_strategy: Option<RollbackStrategy>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Show {
        #[arg(long)]
        json: bool,
    },
    Add {
        column_id: String,
        #[arg(required = true, num_args = 1..)]
        content: Vec<String>,
    },
    Move {
        task_id: String,
        to_column: String,
    },
    Delete {
        task_id: String,
    },
    Login {
        username: String,
    },
    Logout,
    Whoami,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(database_url) = cli.database_url {
        settings.database_url = database_url;
    }
    if let Some(probability) = cli.failure_probability {
        settings.failure_probability = probability;
    }
    if let Some(strategy) = cli.rollback_strategy {
        settings.rollback_strategy = strategy;
    }

    let client = BoardClient::initialize(&settings).await?;
    let result = run(&client, cli.command).await;
    client.shutdown().await;
    result
}

fn parse_probability(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|err| format!("'{raw}' is not a number: {err}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("'{raw}' is outside 0..=1"))
    }
}

async fn run(client: &BoardClient, command: Command) -> Result<()> {
    match command {
        Command::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&client.board())?);
            } else {
                print_board(&client.board());
            }
        }
        Command::Add { column_id, content } => {
            let (task, outcome) = client
                .coordinator()
                .add_task(&ColumnId::from(column_id), &content.join(" "))
                .await?;
            info!(task_id = %task.id, "add finished");
            report(client, &outcome);
        }
        Command::Move { task_id, to_column } => {
            let task_id = TaskId::from(task_id);
            let board = client.board();
            let (from_column, index) = board
                .locate_task(&task_id)
                .ok_or_else(|| anyhow!("no task with id '{task_id}'"))?;
            let item = board
                .column(from_column)
                .and_then(|column| column.items.get(index).cloned())
                .ok_or_else(|| anyhow!("no task with id '{task_id}'"))?;

            let outcome = client
                .coordinator()
                .move_task(from_column, &ColumnId::from(to_column), item)
                .await?;
            report(client, &outcome);
        }
        Command::Delete { task_id } => {
            let task_id = TaskId::from(task_id);
            let board = client.board();
            let (column_id, _) = board
                .locate_task(&task_id)
                .ok_or_else(|| anyhow!("no task with id '{task_id}'"))?;

            let outcome = client.coordinator().delete_task(column_id, &task_id).await?;
            report(client, &outcome);
        }
        Command::Login { username } => {
            let username = client.session().login(&username).await?;
            println!("Logged in as {username}");
        }
        Command::Logout => {
            if client.session().logout().await? {
                println!("Logged out");
            } else {
                println!("Nobody was logged in");
            }
        }
        Command::Whoami => match client.session().current_user().await? {
            Some(username) => println!("{username}"),
            None => println!("Not logged in"),
        },
    }

    Ok(())
}

fn report(client: &BoardClient, outcome: &MutationOutcome) {
    match outcome {
        MutationOutcome::Skipped => println!("Nothing to do"),
        MutationOutcome::Committed => println!("Saved"),
        MutationOutcome::RolledBack { .. } => println!("Reverted"),
    }
    for notification in client.notifications().active() {
        let marker = match notification.severity {
            Severity::Error => "!",
            Severity::Success => "+",
        };
        println!("{marker} {}", notification.message);
    }
    print_board(&client.board());
}

fn print_board(board: &Board) {
    for (column_id, column) in board.columns() {
        println!("{} ({column_id}) [{}]", column.name, column.items.len());
        for task in &column.items {
            println!("  {:>14}  {}", task.id.as_str(), task.content);
        }
    }
}
