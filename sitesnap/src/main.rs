use clap::ArgMatches;
use colored::Colorize;
use commands::command_argument_builder;
use sitesnap::handlers::{
    expand_root, handle_archive, handle_delete, handle_sites, handle_snapshots, print_banner,
};
use sitesnap_core::{JobManager, SnapshotStore};
use tracing::Level;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbose = chosen_command.get_flag("verbose");

    tracing_subscriber::fmt()
        .with_max_level(if verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        return;
    }

    if let Err(e) = run(&chosen_command, quiet).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(chosen_command: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let root = chosen_command
        .get_one::<String>("root")
        .map(|root| expand_root(root))
        .unwrap_or_else(|| expand_root("~/.local/share/sitesnap/"));
    let manager = JobManager::new(SnapshotStore::new(root));

    match chosen_command.subcommand() {
        Some(("archive", primary_command)) => {
            handle_archive(primary_command, &manager, quiet).await
        }
        Some(("sites", primary_command)) => handle_sites(primary_command, &manager).await,
        Some(("snapshots", primary_command)) => {
            handle_snapshots(primary_command, &manager).await
        }
        Some(("delete", primary_command)) => handle_delete(primary_command, &manager).await,
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
