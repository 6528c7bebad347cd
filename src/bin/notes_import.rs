use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use logseq_tools::{import, init_tracing};

/// Migrate exported notes into a graph's journals/assets layout.
#[derive(Parser)]
#[command(name = "notes_import")]
struct Args {
    /// Directory containing exported markdown notes
    #[arg(long)]
    input_dir: PathBuf,
    /// Graph directory receiving journals/ and assets/
    #[arg(long)]
    output_dir: PathBuf,
    /// Only notes whose file name starts with this
    #[arg(long)]
    prefix: Option<String>,
    /// List matching notes and exit without touching anything
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let notes = import::list_notes(&args.input_dir, args.prefix.as_deref())?;
    info!("{} notes matched in {:?}", notes.len(), args.input_dir);

    if args.dry_run {
        for note in &notes {
            println!("{}", note.display());
        }
        println!("{} notes would be migrated.", notes.len());
        return Ok(());
    }

    let stats = import::process_images(&notes, &args.output_dir)?;
    println!(
        "Migrated {} notes, rewrote {} of {} images.",
        stats.notes, stats.rewritten, stats.images
    );
    Ok(())
}
