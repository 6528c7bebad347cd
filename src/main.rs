use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use logseq_tools::config::Settings;
use logseq_tools::logseq::LogseqClient;
use logseq_tools::text::fit_column;
use logseq_tools::{export, import, init_tracing, timelog};

#[derive(Parser)]
#[command(name = "logseq_tools", about = "Export, import and time-log utilities for a Logseq graph")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a page (embeds resolved) to a markdown file with front matter
    Export {
        /// Page name, e.g. "blog/2024-03-05-My-Trip"
        #[arg(short, long)]
        page: String,
        /// Destination file; its directory must already exist
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Replace embedded base64 images with local assets
    ProcessImages {
        /// Directory containing markdown files
        #[arg(long)]
        input_dir: PathBuf,
        /// Directory for processed journals and assets
        #[arg(long)]
        output_dir: PathBuf,
    },
    /// Run the external reflow tool on markdown files
    Longdown {
        /// Directory with markdown files
        #[arg(long)]
        input_dir: PathBuf,
        /// Directory for reflowed output
        #[arg(long)]
        output_dir: PathBuf,
    },
    /// Append markdown files to existing journal files
    Append {
        /// Directory containing markdown files to append
        #[arg(long)]
        input_dir: PathBuf,
        /// Directory with existing journal files
        #[arg(long)]
        output_dir: PathBuf,
    },
    /// Extract CLOCK entries from journals as CSV
    TimeLog {
        /// Dir to read files from
        #[arg(short, long)]
        source_dir: PathBuf,
        /// Glob pattern for journals
        #[arg(short, long, default_value = "*.md")]
        pattern: String,
        /// Write CSV here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;
    info!(api_url = %settings.api_url, token_set = settings.token.is_some(), "settings loaded");

    let result = match cli.command {
        Commands::Export { page, output } => {
            let client = LogseqClient::new(&settings)?;
            let summary = export::export_page(&client, &page, &output, settings.max_embed_depth)?;
            println!(
                "Wrote {} lines to {} (date: {}, title: {})",
                summary.lines,
                output.display(),
                summary.front.date,
                summary.front.title
            );
            Ok(())
        }
        Commands::ProcessImages { input_dir, output_dir } => {
            let notes = import::list_notes(&input_dir, None)?;
            let stats = import::process_images(&notes, &output_dir)?;
            println!(
                "Migrated {} notes, rewrote {} of {} images.",
                stats.notes, stats.rewritten, stats.images
            );
            Ok(())
        }
        Commands::Longdown { input_dir, output_dir } => {
            let n = import::reflow(&settings.reflow_command, &input_dir, &output_dir)?;
            println!("Reflowed {} files into {}.", n, output_dir.display());
            Ok(())
        }
        Commands::Append { input_dir, output_dir } => {
            let n = import::append_notes(&input_dir, &output_dir)?;
            println!("Appended {} files into {}.", n, output_dir.display());
            Ok(())
        }
        Commands::TimeLog { source_dir, pattern, output } => {
            let entries = timelog::collect_entries(&source_dir, &pattern)?;
            match &output {
                Some(path) => {
                    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
                    timelog::write_csv(file, &entries)?;
                }
                None => timelog::write_csv(io::stdout().lock(), &entries)?,
            }
            print_tag_summary(&entries);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_tag_summary(entries: &[timelog::TimeEntry]) {
    if entries.is_empty() {
        eprintln!("No clock entries found.");
        return;
    }
    let totals = timelog::minutes_by_tag(entries);
    eprintln!("{:<32} | {:>8}", "Tag", "Minutes");
    eprintln!("{}", "-".repeat(43));
    for (tag, mins) in &totals {
        eprintln!("{:<32} | {:>8}", fit_column(tag, 32), mins);
    }
    let total: i64 = entries.iter().map(|e| e.duration_mins).sum();
    eprintln!("\n{} entries | {} minutes", entries.len(), total);
}

/// `42.0s`, `3:07`, or `1:02:09` depending on magnitude.
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    match secs {
        0..=59 => format!("{:.1}s", d.as_secs_f64()),
        60..=3599 => format!("{}:{:02}", m, s),
        _ => format!("{}:{:02}:{:02}", h, m, s),
    }
}
