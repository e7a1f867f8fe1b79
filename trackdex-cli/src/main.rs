//! trackdex CLI
//!
//! Command-line interface for fetching track metadata snapshots and
//! merging them into a catalog.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use owo_colors::Stream::{Stderr, Stdout};

use trackdex_client::{CatalogClient, Credentials, config_path, credential_sources};
use trackdex_merge::{
    MergeReport, MergeVariant, merge_dir, top_genres, write_catalog_csv, write_catalog_json,
};
use trackdex_pipeline::{DEFAULT_TARGET, FetchEvent, RunOptions, RunOutcome, run_fetch};

/// Exit code for a fetch run that found nothing new. Scripted callers
/// distinguish "nothing to do" from a failure.
const EXIT_EMPTY: u8 = 2;

#[derive(Parser)]
#[command(name = "trackdex")]
#[command(about = "Build a local track-metadata catalog from the Spotify Web API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one snapshot of not-yet-seen tracks
    Fetch {
        /// New tracks to collect before stopping
        #[arg(short, long, default_value_t = DEFAULT_TARGET)]
        target: usize,

        /// Seed for a reproducible query batch (default: current time)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Directory snapshot CSVs are written to
        #[arg(long, default_value = "exports")]
        exports: PathBuf,

        /// Seen-id ledger file (default: <exports>/seen_track_ids.txt)
        #[arg(long)]
        ledger: Option<PathBuf>,

        /// Artist-genre cache file (default: <exports>/genres_cache.json)
        #[arg(long)]
        genre_cache: Option<PathBuf>,
    },

    /// Merge all snapshots into one deduplicated catalog
    Merge {
        /// Directory holding snapshot CSVs
        #[arg(long, default_value = "exports")]
        exports: PathBuf,

        /// Output CSV path (default depends on --optimized)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Also write a JSON rendition next to the CSV
        #[arg(long)]
        json: bool,

        /// Filter low-popularity and genre-less tracks, sort by popularity
        #[arg(long)]
        optimized: bool,
    },

    /// Manage API credentials configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current credentials and their sources
    Show,

    /// Print the config file path
    Path,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            target,
            seed,
            exports,
            ledger,
            genre_cache,
        } => run_fetch_command(target, seed, exports, ledger, genre_cache),
        Commands::Merge {
            exports,
            out,
            json,
            optimized,
        } => run_merge_command(exports, out, json, optimized),
        Commands::Config { action } => match action {
            ConfigAction::Show => run_config_show(),
            ConfigAction::Path => run_config_path(),
        },
    }
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("  {spinner:.cyan} {msg}")
            .unwrap()
            .tick_chars("/-\\|"),
    );
    pb
}

/// Run the fetch command.
fn run_fetch_command(
    target: usize,
    seed: Option<u64>,
    exports: PathBuf,
    ledger: Option<PathBuf>,
    genre_cache: Option<PathBuf>,
) -> ExitCode {
    let creds = match Credentials::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!(
                "{} Failed to load API credentials: {}",
                "\u{2718}".if_supports_color(Stderr, |t| t.red()),
                e,
            );
            eprintln!();
            eprintln!("Set credentials via environment variables:");
            eprintln!("  SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET");
            eprintln!();
            eprintln!("Or create ~/.config/trackdex/credentials.toml:");
            eprintln!("  [spotify]");
            eprintln!("  client_id = \"...\"");
            eprintln!("  client_secret = \"...\"");
            return ExitCode::FAILURE;
        }
    };

    let pb = spinner();
    pb.set_message("Connecting...");
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let client = match CatalogClient::new(creds) {
        Ok(c) => c,
        Err(e) => {
            pb.finish_and_clear();
            eprintln!(
                "{} Failed to connect: {}",
                "\u{2718}".if_supports_color(Stderr, |t| t.red()),
                e,
            );
            return ExitCode::FAILURE;
        }
    };
    pb.finish_and_clear();
    println!(
        "{} Connected",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
    );

    let options = RunOptions {
        target,
        ledger_path: ledger.unwrap_or_else(|| exports.join("seen_track_ids.txt")),
        genre_cache_path: genre_cache.unwrap_or_else(|| exports.join("genres_cache.json")),
        exports_dir: exports,
        seed,
    };

    let pb = spinner();
    let progress_callback = |event: FetchEvent| match event {
        FetchEvent::RunStarted {
            seed,
            queries,
            markets,
            already_seen,
        } => {
            pb.println(format!(
                "Seed {}: {} queries across markets {} ({} ids already seen)",
                seed.if_supports_color(Stdout, |t| t.bold()),
                queries,
                markets.join(", ").if_supports_color(Stdout, |t| t.cyan()),
                already_seen,
            ));
            pb.tick();
        }
        FetchEvent::BlockStarted { ref query, ref market } => {
            pb.set_message(format!("Searching \"{query}\" [{market}]"));
            pb.tick();
        }
        FetchEvent::BlockFinished {
            new_tracks,
            collected,
            target,
        } => {
            pb.set_message(format!("[{collected}/{target}] +{new_tracks} new tracks"));
            pb.tick();
        }
        FetchEvent::EnrichingGenres { artists } => {
            pb.set_message(format!("Fetching genres for {artists} artists"));
            pb.tick();
        }
        FetchEvent::WritingSnapshot { count } => {
            pb.set_message(format!("Writing {count} rows"));
            pb.tick();
        }
    };

    match run_fetch(&client, &options, &progress_callback) {
        Ok(RunOutcome::Written { path, count, seed }) => {
            pb.finish_and_clear();
            println!(
                "{} {} tracks written to {} {}",
                "\u{2714}".if_supports_color(Stdout, |t| t.green()),
                count,
                path.display().if_supports_color(Stdout, |t| t.cyan()),
                format!("(seed {seed})").if_supports_color(Stdout, |t| t.dimmed()),
            );
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Empty { seed }) => {
            pb.finish_and_clear();
            println!(
                "{}",
                format!("No unseen tracks found (seed {seed}); nothing written")
                    .if_supports_color(Stdout, |t| t.dimmed()),
            );
            ExitCode::from(EXIT_EMPTY)
        }
        Err(e) => {
            pb.finish_and_clear();
            eprintln!(
                "{} Fetch failed: {}",
                "\u{2718}".if_supports_color(Stderr, |t| t.red()),
                e,
            );
            ExitCode::FAILURE
        }
    }
}

/// Run the merge command.
fn run_merge_command(
    exports: PathBuf,
    out: Option<PathBuf>,
    json: bool,
    optimized: bool,
) -> ExitCode {
    let variant = if optimized {
        MergeVariant::Optimized
    } else {
        MergeVariant::Full
    };
    let out = out.unwrap_or_else(|| {
        PathBuf::from(if optimized {
            "optimized_tracks.csv"
        } else {
            "combined_tracks_dataset.csv"
        })
    });

    println!(
        "Merging snapshots in: {}",
        exports.display().if_supports_color(Stdout, |t| t.cyan()),
    );

    let (rows, report) = match merge_dir(&exports, variant) {
        Ok(result) => result,
        Err(e) => {
            eprintln!(
                "{} Merge failed: {}",
                "\u{2718}".if_supports_color(Stderr, |t| t.red()),
                e,
            );
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = write_catalog_csv(&out, &rows) {
        eprintln!(
            "{} Error writing {}: {}",
            "\u{2718}".if_supports_color(Stderr, |t| t.red()),
            out.display(),
            e,
        );
        return ExitCode::FAILURE;
    }
    if json {
        let json_path = out.with_extension("json");
        if let Err(e) = write_catalog_json(&json_path, &rows) {
            eprintln!(
                "{} Error writing {}: {}",
                "\u{2718}".if_supports_color(Stderr, |t| t.red()),
                json_path.display(),
                e,
            );
            return ExitCode::FAILURE;
        }
    }

    print_merge_report(&report, &rows, &out, json);
    ExitCode::SUCCESS
}

fn print_merge_report(
    report: &MergeReport,
    rows: &[trackdex_pipeline::TrackRecord],
    out: &PathBuf,
    json: bool,
) {
    for file in &report.per_file {
        println!(
            "  {}",
            format!("{}: {} rows", file.name, file.rows).if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    if report.files_skipped > 0 {
        println!(
            "  {} {} unreadable file(s) skipped",
            "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
            report.files_skipped,
        );
    }
    println!();
    println!("{}", "Summary:".if_supports_color(Stdout, |t| t.bold()));
    println!("  Combined rows:        {}", report.rows_combined);
    println!("  After id dedup:       {}", report.after_id_dedup);
    println!("  After name dedup:     {}", report.after_name_dedup);
    if let Some(after_filter) = report.after_filter {
        println!("  After quality filter: {}", after_filter);
    }
    if let Some((lo, hi)) = report.popularity_range {
        println!("  Popularity range:     {lo}-{hi}");
    }
    println!("  Distinct artists:     {}", report.distinct_artists);
    println!(
        "  {} {} tracks written to {}{}",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        report.final_count,
        out.display().if_supports_color(Stdout, |t| t.cyan()),
        if json { " (+ .json)" } else { "" },
    );

    let top = top_genres(rows, 10);
    if !top.is_empty() {
        println!();
        println!("{}", "Top genres:".if_supports_color(Stdout, |t| t.bold()));
        for (genre, count) in &top {
            println!("  {:>6}  {}", count, genre);
        }
    }
}

// -- Config subcommands --

/// Mask a string, showing only the first 2 characters.
fn mask_value(s: &str) -> String {
    if s.chars().count() <= 2 {
        "****".to_string()
    } else {
        let prefix: String = s.chars().take(2).collect();
        format!("{prefix}****")
    }
}

/// Show current credentials and their sources.
fn run_config_show() -> ExitCode {
    let path = config_path();
    let sources = credential_sources();

    println!(
        "{}",
        "Spotify API Configuration".if_supports_color(Stdout, |t| t.bold()),
    );
    println!();

    match &path {
        Some(p) if p.exists() => {
            println!(
                "  Config file: {} {}",
                p.display().if_supports_color(Stdout, |t| t.cyan()),
                "(exists)".if_supports_color(Stdout, |t| t.green()),
            );
        }
        Some(p) => {
            println!(
                "  Config file: {} {}",
                p.display().if_supports_color(Stdout, |t| t.cyan()),
                "(not found)".if_supports_color(Stdout, |t| t.dimmed()),
            );
        }
        None => {
            println!(
                "  Config file: {}",
                "could not determine path".if_supports_color(Stdout, |t| t.red()),
            );
        }
    }
    println!();

    let creds = Credentials::load().ok();
    let fields: &[(&str, &trackdex_client::CredentialSource, Option<String>, bool)] = &[
        (
            "client_id",
            &sources.client_id,
            creds.as_ref().map(|c| c.client_id.clone()),
            false,
        ),
        (
            "client_secret",
            &sources.client_secret,
            creds.as_ref().map(|c| c.client_secret.clone()),
            true,
        ),
    ];

    for (name, source, value, is_secret) in fields {
        let source_str = format!("({})", source);
        let shown = match source {
            trackdex_client::CredentialSource::Missing => None,
            _ => value
                .as_ref()
                .map(|v| if *is_secret { mask_value(v) } else { v.clone() }),
        };
        match shown {
            Some(v) => {
                println!(
                    "  {} {} {}",
                    format!("{}:", name).if_supports_color(Stdout, |t| t.cyan()),
                    v,
                    source_str.if_supports_color(Stdout, |t| t.dimmed()),
                );
            }
            None => {
                println!(
                    "  {} {} {}",
                    format!("{}:", name).if_supports_color(Stdout, |t| t.cyan()),
                    "not set".if_supports_color(Stdout, |t| t.yellow()),
                    source_str.if_supports_color(Stdout, |t| t.dimmed()),
                );
            }
        }
    }
    ExitCode::SUCCESS
}

/// Print the config file path.
fn run_config_path() -> ExitCode {
    match config_path() {
        Some(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("Could not determine config directory");
            ExitCode::FAILURE
        }
    }
}
