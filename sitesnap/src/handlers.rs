use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use sitesnap_core::{
    DELETE_ALL_CONFIRMATION, JobManager, JobRecord, JobStatus, LinkStyle, SiteSummary,
    StartRequest,
};
use sitesnap_crawler::storage::{LANDING_FILE, LOCAL_DIR};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(line)
        && url.has_host()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    eprintln!("⚠️  Skipping invalid URL '{}'", line);
    None
}

/// Expand `~` in the snapshot root.
pub fn expand_root(root: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(root).as_ref())
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

fn status_label(status: JobStatus) -> ColoredString {
    match status {
        JobStatus::Running => status.as_str().yellow(),
        JobStatus::Success => status.as_str().green(),
        JobStatus::Error => status.as_str().red(),
    }
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

pub fn print_banner() {
    print_divider();
    println!(
        "{} {}",
        "  SITESNAP".bright_white().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
    print_divider();
    println!();
}

pub fn render_sites(sites: &[SiteSummary]) -> String {
    if sites.is_empty() {
        return "No archived sites.\n".to_string();
    }

    let mut out = String::new();
    for site in sites {
        out.push_str(&format!(
            "  {} {}  {} snapshot(s)  last: {}\n",
            "•".blue(),
            site.host.bright_white(),
            site.snapshots.to_string().cyan(),
            site.last_started.as_deref().unwrap_or("never")
        ));
    }
    out
}

pub fn render_snapshots(host: &str, records: &[JobRecord]) -> String {
    if records.is_empty() {
        return format!("No snapshots for {}.\n", host);
    }

    let mut out = format!("{}\n{}\n", host.bright_white().bold(), "─".repeat(host.len()));
    for record in records {
        out.push_str(&format!(
            "  {}  {:<8} {:>4} pages  {:>10}  depth {}  {}\n",
            record.ts,
            status_label(record.status),
            record.count_fetched,
            format_bytes(record.bytes_stored),
            record.depth,
            record.root_url
        ));
        if let Some(error) = &record.error {
            out.push_str(&format!("      {} {}\n", "✗".red(), error));
        }
    }
    out
}

pub async fn handle_archive(args: &ArgMatches, manager: &JobManager, quiet: bool) -> Result<()> {
    let raw = args
        .get_one::<String>("url")
        .context("--url is required")?;
    let Some(url) = parse_url_line(raw) else {
        bail!("'{}' is not a valid URL", raw);
    };
    let depth = *args.get_one::<usize>("depth").unwrap_or(&1);
    let max_pages = *args.get_one::<usize>("max-pages").unwrap_or(&60);
    let link_style = if args.get_flag("relative-links") {
        LinkStyle::Relative
    } else {
        LinkStyle::Archive
    };

    let request = StartRequest::new(url)
        .with_depth(depth)
        .with_max_pages(max_pages)
        .with_link_style(link_style);
    let id = manager.start(request)?;

    if !quiet {
        println!("{} Archiving {}", "→".blue(), raw.bright_white());
        println!("{} Job: {}", "→".blue(), id.to_string().cyan());
        println!("Max depth: {}  Page limit: {}\n", depth, max_pages);
    }

    let bar = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(100)
    };
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("=>-"),
    );
    bar.enable_steady_tick(Duration::from_millis(100));

    let state = loop {
        let state = manager.status(&id)?;
        bar.set_position(state.progress as u64);
        bar.set_message(format!(
            "{} pages, {}",
            state.details.pages,
            format_bytes(state.details.bytes)
        ));
        if !state.status.is_running() {
            break state;
        }
        tokio::time::sleep(STATUS_POLL_INTERVAL).await;
    };
    bar.finish_and_clear();

    if state.status == JobStatus::Error {
        bail!(
            "Capture failed: {}",
            state.error.as_deref().unwrap_or("unknown error")
        );
    }

    let landing = manager
        .store()
        .snapshot_dir(&id.host, &id.ts)?
        .join(LOCAL_DIR)
        .join(LANDING_FILE);

    println!("{} Capture complete!", "✓".green().bold());
    println!(
        "  {} pages, {} stored",
        state.details.pages.to_string().cyan(),
        format_bytes(state.details.bytes).cyan()
    );
    println!(
        "  {} {}",
        "Open:".blue(),
        landing.display().to_string().bright_white()
    );
    Ok(())
}

pub async fn handle_sites(args: &ArgMatches, manager: &JobManager) -> Result<()> {
    let sites = manager.list_sites().await?;
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&sites)?);
    } else {
        print!("{}", render_sites(&sites));
    }
    Ok(())
}

pub async fn handle_snapshots(args: &ArgMatches, manager: &JobManager) -> Result<()> {
    let host = args.get_one::<String>("HOST").context("HOST is required")?;
    let records = manager.host_snapshots(host).await?;
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print!("{}", render_snapshots(host, &records));
    }
    Ok(())
}

pub async fn handle_delete(args: &ArgMatches, manager: &JobManager) -> Result<()> {
    match args.subcommand() {
        Some(("snapshot", sub)) => {
            let host = sub.get_one::<String>("HOST").context("HOST is required")?;
            let ts = sub.get_one::<String>("TS").context("TS is required")?;
            manager.delete_snapshot(host, ts).await?;
            println!("{} Deleted snapshot {}/{}", "✓".green().bold(), host, ts);
        }
        Some(("host", sub)) => {
            let host = sub.get_one::<String>("HOST").context("HOST is required")?;
            manager.delete_host(host).await?;
            println!("{} Deleted all snapshots of {}", "✓".green().bold(), host);
        }
        Some(("all", sub)) => {
            let confirm = sub.get_one::<String>("confirm").map(String::as_str);
            if confirm.is_none() {
                eprintln!(
                    "{} Pass --confirm {} to delete every snapshot",
                    "⚠".yellow().bold(),
                    DELETE_ALL_CONFIRMATION
                );
            }
            manager.delete_all(confirm).await?;
            println!(
                "{} Deleted everything under {}",
                "✓".green().bold(),
                manager.store().root().display()
            );
        }
        _ => bail!("unknown delete target"),
    }
    Ok(())
}
