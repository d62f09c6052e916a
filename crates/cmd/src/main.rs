// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{io::Write, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use snafu::{ResultExt, Whatever};

mod active;
mod error;
mod frontier;
mod settings;

use frontier::{Action, Frontier, Outcome, PriorityFrontier, RoundRobinFrontier, execute};
use settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "frontier", about = "Persistent crawl frontier queues", version)]
struct Cli {
    /// Settings file (TOML, YAML or JSON).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Priority(PriorityArgs),
    RoundRobin(RoundRobinArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Items served lowest priority first, FIFO or LIFO within a priority.
Examples:

frontier priority push --priority 1 https://example.com/
frontier priority pop

")]
struct PriorityArgs {
    #[command(subcommand)]
    command: PriorityCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum PriorityCommand {
    /// Store an item.
    Push {
        #[arg(short, long, allow_negative_numbers = true, default_value_t = 0)]
        priority: i32,
        item:     String,
    },
    /// Remove and print the next item.
    Pop,
    /// Print the next item without removing it.
    Peek,
    /// Print the number of stored items.
    Len,
}

impl From<PriorityCommand> for Action<i32> {
    fn from(command: PriorityCommand) -> Self {
        match command {
            PriorityCommand::Push { priority, item } => Self::Push {
                key:  priority,
                item: item.into_bytes(),
            },
            PriorityCommand::Pop => Self::Pop,
            PriorityCommand::Peek => Self::Peek,
            PriorityCommand::Len => Self::Len,
        }
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Items served one key at a time in rotation.
Examples:

frontier round-robin push --key example.com https://example.com/
frontier round-robin pop

")]
struct RoundRobinArgs {
    #[command(subcommand)]
    command: RoundRobinCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum RoundRobinCommand {
    /// Store an item.
    Push {
        #[arg(short, long)]
        key:  String,
        item: String,
    },
    /// Remove and print the next item.
    Pop,
    /// Print the next item without removing it.
    Peek,
    /// Print the number of stored items.
    Len,
}

impl From<RoundRobinCommand> for Action<String> {
    fn from(command: RoundRobinCommand) -> Self {
        match command {
            RoundRobinCommand::Push { key, item } => Self::Push {
                key,
                item: item.into_bytes(),
            },
            RoundRobinCommand::Pop => Self::Pop,
            RoundRobinCommand::Peek => Self::Peek,
            RoundRobinCommand::Len => Self::Len,
        }
    }
}

fn run<F: Frontier>(settings: &Settings, action: Action<F::Key>) -> Result<(), Whatever> {
    let outcome = execute::<F>(&settings.queue, action)
        .whatever_context(format!("Failed to run {} frontier", F::NAME))?;

    let mut stdout = std::io::stdout().lock();
    let written = match outcome {
        Outcome::Pushed | Outcome::Item(None) => Ok(()),
        Outcome::Item(Some(item)) => stdout
            .write_all(&item)
            .and_then(|()| stdout.write_all(b"\n")),
        Outcome::Len(len) => writeln!(stdout, "{len}"),
    };
    written.whatever_context("Failed to write to stdout")
}

fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    let settings =
        Settings::load(cli.config.as_deref()).whatever_context("Failed to load settings")?;
    let _guards = frontier_common_telemetry::init_global_logging("frontier", &settings.logging)
        .whatever_context("Failed to initialize logging")?;

    match cli.commands {
        Commands::Priority(args) => run::<PriorityFrontier>(&settings, args.command.into()),
        Commands::RoundRobin(args) => run::<RoundRobinFrontier>(&settings, args.command.into()),
    }
}
