//! Command-line interface for the harvester.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::agencies::AgencyIndex;
use crate::client::{RegistryClient, SectionRequest};
use crate::config::{validate_date, validate_title, ClientConfig, ECFR_API_BASE};
use crate::error::{HarvesterError, Result};
use crate::output::save_jsonl;

/// eCFR Harvester - Download federal regulation text from the eCFR registry.
#[derive(Parser)]
#[command(name = "ecfr-harvester")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// eCFR API base URL
    #[arg(long, global = true, env = "ECFR_API_BASE", default_value = ECFR_API_BASE)]
    pub api_base: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List agencies and the CFR chapters they own.
    Agencies,

    /// List CFR titles.
    Titles,

    /// Download the sections of a title and write them as JSON Lines.
    Download {
        /// CFR title number (1-50)
        title: String,

        /// Snapshot date in YYYY-MM-DD format (default: today)
        #[arg(short, long)]
        date: Option<String>,

        /// Output directory (default: data/)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = ClientConfig::default().with_base_url(cli.api_base);

    match cli.command {
        Commands::Agencies => agencies_command(config),
        Commands::Titles => titles_command(config),
        Commands::Download {
            title,
            date,
            output,
        } => download_command(config, &title, date.as_deref(), output.as_deref()),
    }
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn agencies_command(config: ClientConfig) -> Result<()> {
    let client = RegistryClient::new(config)?;
    let agencies = client.agencies()?;

    for agency in &agencies {
        let refs: Vec<String> = agency
            .cfr_references
            .iter()
            .map(|r| match &r.chapter {
                Some(chapter) => format!("{}/{chapter}", r.title),
                None => r.title.to_string(),
            })
            .collect();
        println!(
            "{:<60} {:<10} {}",
            style(&agency.slug).cyan(),
            agency.short_name.as_deref().unwrap_or("-"),
            refs.join(", ")
        );
    }
    println!();
    println!("{} agencies", style(agencies.len()).bold());
    Ok(())
}

fn titles_command(config: ClientConfig) -> Result<()> {
    let client = RegistryClient::new(config)?;
    for title in client.titles()? {
        let as_of = title
            .up_to_date_as_of
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        let name = if title.reserved {
            style(format!("{} (reserved)", title.name)).dim()
        } else {
            style(title.name.clone())
        };
        println!("{:>3}  {as_of:<10}  {name}", title.number);
    }
    Ok(())
}

/// Execute the download command.
fn download_command(
    config: ClientConfig,
    title: &str,
    date: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let date_str = date
        .map(String::from)
        .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());

    // Validate inputs before making HTTP requests
    let title = validate_title(title)?;
    let effective_date = validate_date(&date_str)?;

    if let Some(output_dir) = output {
        if !output_dir.is_dir() {
            return Err(HarvesterError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Output directory does not exist: {}", output_dir.display()),
            )));
        }
    }

    println!(
        "{} title {} for date {}",
        style("Downloading").bold(),
        style(title).cyan(),
        style(&date_str).green()
    );
    println!();

    let pb = spinner();
    pb.set_message("Downloading agencies...");

    let client = RegistryClient::new(config)?;
    let page = client.agencies().and_then(|agencies| {
        pb.set_message(format!("Downloading title {title}..."));
        let request =
            SectionRequest::new(effective_date, vec![title], AgencyIndex::new(&agencies));
        client.fetch_page(&request, None)
    });
    let page = match page {
        Ok(page) => page,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };

    pb.set_message("Saving JSONL...");
    let path = match save_jsonl(&page.records, title, effective_date, output) {
        Ok(path) => path,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };
    pb.finish_and_clear();

    println!("  Sections: {}", page.records.len());
    if page.unowned > 0 {
        println!("  Unowned: {}", style(page.unowned).yellow().bold());
    }
    println!();
    println!("{} {}", style("Saved to:").green().bold(), path.display());

    Ok(())
}
