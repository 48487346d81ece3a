use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::warn;

use catalog_scraper::catalog::enrollment::fetch_enrollment;
use catalog_scraper::catalog::{Campus, Catalog, SearchParts};
use catalog_scraper::http::HttpClient;
use catalog_scraper::mappings::generate::{generate, generate_graduate, GenerateOptions, GRADUATE_FILE};
use catalog_scraper::mappings::{run_merge, MappingSet, MergeOptions};
use catalog_scraper::ratings::{
    build_index, CampusListing, GraphQlRatings, InstructorResolver, RatingIndex, RatingsClient,
};
use catalog_scraper::Settings;

#[derive(Parser)]
#[command(name = "catalog_scraper", about = "University course catalog scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up a course with its sections and professors
    Course {
        /// Course identifier, e.g. CSE1010
        identifier: String,
        /// Campus to scope sections to
        #[arg(short, long, default_value = "any")]
        campus: Campus,
        /// Answer from offline mappings when available
        #[arg(long)]
        mappings: bool,
        /// Leave out sections (and therefore professors)
        #[arg(long)]
        no_sections: bool,
        /// Leave out professors
        #[arg(long)]
        no_professors: bool,
    },
    /// Look up a single section of a course
    Section {
        identifier: String,
        section: String,
    },
    /// Live enrollment for a section
    Enrollment {
        /// Term code, e.g. 1248
        term: String,
        class_number: String,
        section: String,
    },
    /// Ratings report for an instructor id
    Report { id: String },
    /// Resolve an instructor name to rating ids
    Resolve { name: String },
    /// Merge course mapping snapshots into courses.json
    Merge {
        /// Directory holding the snapshots
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
        /// Write even when nothing changed
        #[arg(long)]
        force: bool,
    },
    /// Build the ratings index from per-campus instructor listings
    Index {
        /// JSON files of {name, id} entries
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output path (default: configured index path)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Regenerate course mappings from the course-search listing
    Generate {
        /// Output path (default: configured mappings path, or courses-grad.json
        /// next to it with --graduate)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Scrape the graduate catalog's subject pages instead
        #[arg(long)]
        graduate: bool,
        /// Max courses to enrich
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Regenerate even if the listing size is unchanged
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load().context("loading settings")?;

    let result = match cli.command {
        Commands::Course {
            identifier,
            campus,
            mappings,
            no_sections,
            no_professors,
        } => {
            let catalog = build_catalog(&settings)?;
            let mut include = Vec::new();
            if !no_sections {
                include.push(SearchParts::Sections);
            }
            if !no_professors {
                include.push(SearchParts::Professors);
            }
            match catalog.search_course(&identifier, campus, mappings, &include).await {
                Some(payload) => print_json(&payload),
                None => {
                    println!("No course found for '{}'.", identifier);
                    Ok(())
                }
            }
        }
        Commands::Section { identifier, section } => {
            let catalog = build_catalog(&settings)?;
            match catalog.search_by_section(&identifier, &section).await {
                Some(payload) => print_json(&payload),
                None => {
                    println!("No section {} found for '{}'.", section, identifier);
                    Ok(())
                }
            }
        }
        Commands::Enrollment {
            term,
            class_number,
            section,
        } => {
            let http = HttpClient::new(&settings)?;
            match fetch_enrollment(http.inner(), &settings, &term, &class_number, &section).await {
                Some(payload) => print_json(&payload),
                None => {
                    println!("Enrollment unavailable for class {}.", class_number);
                    Ok(())
                }
            }
        }
        Commands::Report { id } => {
            let http = HttpClient::new(&settings)?;
            let ratings = GraphQlRatings::new(http.inner().clone(), &settings);
            match ratings.report(&id).await? {
                Some(report) => print_json(&report),
                None => {
                    println!("No instructor with id {}.", id);
                    Ok(())
                }
            }
        }
        Commands::Resolve { name } => {
            let http = HttpClient::new(&settings)?;
            let ratings = GraphQlRatings::new(http.inner().clone(), &settings);
            let resolver = InstructorResolver::new(load_index(&settings), ratings, settings.institution.clone());
            print_json(&resolver.resolve(&name).await)
        }
        Commands::Merge { dir, dry_run, force } => {
            let report = run_merge(&dir, MergeOptions { dry_run, force })
                .with_context(|| format!("merging snapshots in {}", dir.display()))?;
            println!(
                "Canonical {} ({} sources): {} added, {} patched, {} -> {} entries.",
                report.canonical.display(),
                report.sources.len(),
                report.added,
                report.patched,
                report.before,
                report.after
            );
            match (report.written, &report.backup) {
                (true, Some(backup)) => println!("Written. Previous saved to {}.", backup.display()),
                (true, None) => println!("Written."),
                (false, _) if dry_run => println!("Dry run, nothing written."),
                (false, _) => println!("Nothing changed. Use --force to rewrite anyway."),
            }
            Ok(())
        }
        Commands::Index { files, out } => {
            let mut listings = Vec::with_capacity(files.len());
            for file in &files {
                let raw = std::fs::read_to_string(file)
                    .with_context(|| format!("reading {}", file.display()))?;
                let listing: Vec<CampusListing> = serde_json::from_str(&raw)
                    .with_context(|| format!("parsing {}", file.display()))?;
                println!("{}: {} instructors", file.display(), listing.len());
                listings.push(listing);
            }
            let index = RatingIndex::new(build_index(listings));
            let out = out.unwrap_or_else(|| PathBuf::from(&settings.index_path));
            index.save(&out)?;
            println!("Wrote {} index entries to {}.", index.len(), out.display());
            Ok(())
        }
        Commands::Generate {
            out,
            graduate,
            limit,
            force,
        } => {
            let http = HttpClient::new(&settings)?;
            let options = GenerateOptions { limit, force };
            let (report, out) = if graduate {
                let out = out.unwrap_or_else(|| graduate_path(&settings));
                let report = generate_graduate(&http, &settings, &out, options).await?;
                (report, out)
            } else {
                let out = out.unwrap_or_else(|| PathBuf::from(&settings.mappings_path));
                let report = generate(&http, &settings, &out, options).await?;
                (report, out)
            };
            if report.written {
                println!(
                    "Generated {} mappings ({} listed, previously {}).",
                    report.generated,
                    report.listed,
                    report.previous.map(|p| p.to_string()).unwrap_or_else(|| "none".into())
                );
                if let Some(backup) = &report.backup {
                    println!("Previous mappings saved to {}.", backup.display());
                }
            } else {
                println!(
                    "Listing has the same {} entries as {}. Use --force to regenerate.",
                    report.listed,
                    out.display()
                );
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn build_catalog(settings: &Settings) -> anyhow::Result<Catalog<HttpClient, GraphQlRatings>> {
    let http = HttpClient::new(settings)?;
    let ratings = GraphQlRatings::new(http.inner().clone(), settings);
    let resolver = InstructorResolver::new(load_index(settings), ratings, settings.institution.clone());
    Ok(Catalog::new(settings.clone(), http, resolver, load_mappings(settings)))
}

fn load_index(settings: &Settings) -> RatingIndex {
    RatingIndex::load(&settings.index_path).unwrap_or_else(|e| {
        warn!("Ratings index {} unavailable ({}), resolving remotely only", settings.index_path, e);
        RatingIndex::default()
    })
}

fn load_mappings(settings: &Settings) -> MappingSet {
    MappingSet::load(&settings.mappings_path).unwrap_or_else(|e| {
        warn!("Course mappings {} unavailable ({})", settings.mappings_path, e);
        MappingSet::default()
    })
}

fn graduate_path(settings: &Settings) -> PathBuf {
    Path::new(&settings.mappings_path)
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(GRADUATE_FILE)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
