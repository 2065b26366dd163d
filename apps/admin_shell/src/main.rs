use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use camelot_core::{
    admin::register_admin,
    initial_naming_context,
    worker::{Worker, WorkerSettings},
};
use clap::{Parser, Subcommand};
use client_core::{ClientBridge, DialogHandler};
use serde_json::json;
use shared::Name;
use tracing_subscriber::EnvFilter;

mod config;
mod demo;
mod shell;

use config::{load_settings, Overrides};
use shell::{parse_operator, ConsoleDialogs, Shell};

#[derive(Parser, Debug)]
#[command(name = "admin_shell", about = "Browse and edit the person table")]
struct Cli {
    #[arg(long, default_value = "admin_shell.toml")]
    config: PathBuf,
    #[command(flatten)]
    overrides: Overrides,
    /// Answer yes to every confirmation.
    #[arg(long, short = 'y')]
    yes: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    List {
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        descending: bool,
    },
    Add {
        first_name: String,
        last_name: String,
        #[arg(long)]
        birth_year: Option<i64>,
    },
    Edit {
        row: usize,
        field: String,
        value: String,
    },
    Remove {
        row: usize,
    },
    Filter {
        field: String,
        value: String,
        #[arg(long, default_value = "contains")]
        operator: String,
    },
    /// Walk through listing, adding, editing, filtering and removing.
    Demo,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config)?;
    settings.apply_overrides(&cli.overrides);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    tracing::debug!(?settings, "settings loaded");

    let backing = demo::open_backend(&settings)?;
    let root = initial_naming_context();
    let admin_route = register_admin(&root, Arc::new(demo::person_admin(&backing, &settings)))?;
    let worker = Worker::spawn(root, WorkerSettings::default())?;
    let mut shell = Shell::new(
        ClientBridge::new(worker, ConsoleDialogs::new(cli.yes)),
        admin_route,
    );

    let result = run(&mut shell, cli.command.unwrap_or(Command::Demo));
    shell.shutdown();
    result
}

fn run<D: DialogHandler>(shell: &mut Shell<D>, command: Command) -> Result<()> {
    let table = shell.open()?;
    match command {
        Command::List { sort, descending } => {
            if let Some(field) = sort {
                shell.sort(&table, &field, descending)?;
            }
            print!("{}", shell.render(&table)?);
        }
        Command::Add {
            first_name,
            last_name,
            birth_year,
        } => {
            let row = shell.add(
                &table,
                &[
                    ("first_name", json!(first_name)),
                    ("last_name", json!(last_name)),
                    ("birth_year", json!(birth_year)),
                ],
            )?;
            println!("added row {row}");
            print!("{}", shell.render(&table)?);
        }
        Command::Edit { row, field, value } => {
            shell.edit(&table, row, &field, json!(value))?;
            print!("{}", shell.render(&table)?);
        }
        Command::Remove { row } => {
            if shell.remove(&table, row)? {
                println!("removed row {row}");
            } else {
                println!("nothing removed");
            }
            print!("{}", shell.render(&table)?);
        }
        Command::Filter {
            field,
            value,
            operator,
        } => {
            shell.filter(&table, &field, parse_operator(&operator)?, json!(value))?;
            print!("{}", shell.render(&table)?);
        }
        Command::Demo => demo_session(shell, &table)?,
    }
    Ok(())
}

fn demo_session<D: DialogHandler>(shell: &mut Shell<D>, table: &Name) -> Result<()> {
    println!("== all people");
    print!("{}", shell.render(table)?);

    println!("== newest first");
    shell.sort(table, "birth_year", true)?;
    print!("{}", shell.render(table)?);

    println!("== add a person");
    let row = shell.add(
        table,
        &[
            ("first_name", json!("Ingmar")),
            ("last_name", json!("Bergman")),
            ("birth_year", json!(1918)),
        ],
    )?;
    print!("{}", shell.render(table)?);

    println!("== correct the first name");
    shell.edit(table, row, "first_name", json!("Ernst Ingmar"))?;
    print!("{}", shell.render(table)?);

    println!("== people named K...");
    let other = shell.open()?;
    shell.filter(&other, "last_name", parse_operator("starts_with")?, json!("K"))?;
    print!("{}", shell.render(&other)?);

    println!("== remove the new person");
    shell.remove(table, row)?;
    print!("{}", shell.render(table)?);
    Ok(())
}
