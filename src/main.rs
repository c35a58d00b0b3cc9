use anyhow::{bail, Context, Result};
use clap::Parser;
use isrc_crossref::catalog::CatalogSource;
use isrc_crossref::index::{build_index_from_path, BuildOptions, DEFAULT_CHUNK_SIZE};
use isrc_crossref::log_only;
use isrc_crossref::matcher::match_catalog;
use isrc_crossref::models::RunStatistics;
use isrc_crossref::progress::{create_bytes_bar, create_spinner, format_count, set_log_only};
use isrc_crossref::report::{print_matches, print_summary, AnalysisReport};
use isrc_crossref::safety::validate_output_path;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "isrc-crossref")]
#[command(about = "Match a track catalog against an unclaimed-rights reference table by ISRC")]
struct Args {
    /// Header-less TSV reference table
    reference: PathBuf,

    /// Catalog JSON (track array, or object with a `catalog` array)
    #[arg(long, conflicts_with = "spotify_db", required_unless_present = "spotify_db")]
    catalog: Option<PathBuf>,

    /// Spotify metadata dump (SQLite); requires --artist
    #[arg(long, requires = "artist")]
    spotify_db: Option<PathBuf>,

    /// Artist to load from the Spotify dump (case-insensitive)
    #[arg(long)]
    artist: Option<String>,

    /// Write the JSON report here
    #[arg(long)]
    output: Option<PathBuf>,

    /// Rows read per chunk; bounds peak memory of the build
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: NonZeroUsize,

    /// Chunks read ahead of the parser
    #[arg(long, default_value = "2")]
    prefetch: usize,

    #[arg(long, default_value = "0")]
    workers: usize,

    /// Parse chunks on the calling thread only
    #[arg(long)]
    sequential: bool,

    /// Replace progress bars with plain log lines (for non-TTY runs)
    #[arg(long)]
    log_only: bool,

    /// Matches to print to the console
    #[arg(long, default_value = "20")]
    show: usize,
}

impl Args {
    fn catalog_source(&self) -> Result<CatalogSource> {
        match (&self.catalog, &self.spotify_db, &self.artist) {
            (Some(path), _, _) => Ok(CatalogSource::Json(path.clone())),
            (None, Some(db), Some(artist)) => Ok(CatalogSource::SpotifyDump {
                db: db.clone(),
                artist: artist.clone(),
            }),
            _ => bail!("Either --catalog or --spotify-db with --artist is required"),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let start = Instant::now();
    let source = args.catalog_source()?;

    if let Some(ref output) = args.output {
        validate_output_path(output, &[args.reference.as_path(), source.path()])?;
    }

    // Catalog first: it is small, and a bad catalog should fail before the long build
    let pb = create_spinner(&format!("Loading catalog from {}", source));
    let catalog = source
        .load()
        .with_context(|| format!("Failed to load catalog {}", source))?;
    pb.finish_with_message(format!("Loaded {} catalog entries", catalog.len()));
    log_only!("[CATALOG] {} entries from {}", format_count(catalog.len() as u64), source);

    println!("Indexing reference table: {:?}", args.reference);
    let total_bytes = std::fs::metadata(&args.reference)
        .with_context(|| format!("Reference table {:?} not found", args.reference))?
        .len();
    let options = BuildOptions {
        chunk_size: args.chunk_size,
        parallel_parse: !args.sequential,
        prefetch_chunks: args.prefetch,
    };
    let pb = create_bytes_bar(total_bytes, "Indexing");
    let (index, index_stats) = build_index_from_path(&args.reference, &options, &pb)?;
    pb.finish_with_message(format!(
        "Indexed {} unique ISRCs",
        format_count(index_stats.unique_keys)
    ));
    index_stats.log_phase("index");

    let outcome = match_catalog(&index, &catalog);
    log_only!(
        "[MATCH] {}/{} entries found in reference table",
        format_count(outcome.stats.matches),
        format_count(outcome.stats.entries_examined)
    );

    let stats = RunStatistics::new(index_stats, outcome.stats);
    stats.log_phase("run");

    if let Some(ref output) = args.output {
        AnalysisReport::new(&args.reference, &source, &stats, &catalog, &outcome.matches)
            .write_to_file(output)?;
        println!("Report written to {:?}", output);
    }

    print_matches(&outcome.matches, args.show);
    print_summary(&stats, start.elapsed());

    Ok(())
}
