//! hitfactor - fetch practical-shooting match results and print rankings.
//!
//! Run `hitfactor --help` for options.

use std::io;

use anyhow::{bail, Result};
use clap::Parser;
use futures::future::join_all;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hitfactor_core::utils::{format_age, format_score, truncate_string};
use hitfactor_core::{CompetitorResult, Config, MatchService, ScoreOptions, StageScore};

/// Width of the name column in result tables
const NAME_WIDTH: usize = 28;

#[derive(Parser, Debug)]
#[command(
    name = "hitfactor",
    version,
    about = "Fetch practical-shooting match results and print rankings"
)]
struct Args {
    /// Upstream content type (e.g. ipsc)
    #[arg(required_unless_present = "stats", requires = "competition_id")]
    content_type: Option<String>,

    /// Competition id within the content type
    competition_id: Option<String>,

    /// Only competitors in this division
    #[arg(long)]
    division: Option<String>,

    /// Rank within a category (pool-scoped normalization)
    #[arg(long)]
    category: Option<String>,

    /// Drop these stage numbers before totalling
    #[arg(long, value_delimiter = ',', value_name = "N")]
    exclude: Vec<u32>,

    /// Compare these competitor keys on the stages they all shot
    #[arg(long, value_delimiter = ',', value_name = "KEY")]
    compare: Vec<String>,

    /// Print one stage's results instead of totals
    #[arg(long, value_name = "N")]
    stage: Option<u32>,

    /// Also rank another competition (repeatable)
    #[arg(long, value_name = "TYPE/ID", value_parser = parse_competition)]
    also: Vec<(String, String)>,

    /// Print cache statistics afterwards
    #[arg(long)]
    stats: bool,
}

fn parse_competition(s: &str) -> Result<(String, String), String> {
    match s.split_once('/') {
        Some((content_type, id)) if !content_type.is_empty() && !id.is_empty() => {
            Ok((content_type.to_string(), id.to_string()))
        }
        _ => Err(format!("expected <type/id>, got {}", s)),
    }
}

impl Args {
    /// Positional competition first, then every `--also`.
    fn competitions(&self) -> Vec<(String, String)> {
        let primary = self.content_type.clone().zip(self.competition_id.clone());
        primary.into_iter().chain(self.also.iter().cloned()).collect()
    }

    fn options(&self) -> ScoreOptions {
        let options = ScoreOptions::default().excluding(self.exclude.iter().copied());
        match &self.category {
            Some(category) => options.with_category(category),
            None => options,
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

fn print_results(title: &str, results: &[CompetitorResult]) {
    println!("{}", title);
    println!(
        "{:>4}  {:<8}  {:<width$}  {:<14}  {:>6}  {:>10}  {:>4}",
        "#", "Key", "Name", "Division", "Stages", "Total", "Pen",
        width = NAME_WIDTH
    );
    for r in results {
        println!(
            "{:>4}  {:<8}  {:<width$}  {:<14}  {:>6}  {:>10}  {:>4}",
            r.rank,
            truncate_string(&r.competitor_key, 8),
            truncate_string(&r.name, NAME_WIDTH),
            truncate_string(&r.division, 14),
            r.stages_shot(),
            format_score(r.total_score),
            r.total_penalties,
            width = NAME_WIDTH
        );
    }
    println!();
}

fn print_stage(title: &str, scores: &[StageScore]) {
    println!("{}", title);
    println!(
        "{:<8}  {:>8}  {:>7}  {:>7}  {:>3} {:>3} {:>3} {:>3} {:>3}  {:>4}  {:>8}",
        "Key", "HF", "Time", "Points", "A", "C", "D", "M", "NS", "Pen", "Score"
    );
    for s in scores {
        println!(
            "{:<8}  {:>8.4}  {:>7.2}  {:>7.1}  {:>3} {:>3} {:>3} {:>3} {:>3}  {:>4}  {:>8}",
            truncate_string(&s.competitor_key, 8),
            s.hit_factor,
            s.time,
            s.points,
            s.hits.a,
            s.hits.c,
            s.hits.d,
            s.hits.m,
            s.hits.ns,
            s.penalties,
            format_score(s.score)
        );
    }
    println!();
}

async fn print_stats(service: &MatchService) {
    let sync = service.sync_cache_stats().await;
    let responses = service.response_cache_stats().await;
    println!("Sync cache: {} entries", sync.count);
    for entry in &sync.entries {
        println!(
            "  {}  age {}  idle {}  {} scorecards",
            entry.key,
            format_age(entry.age_secs),
            format_age(entry.idle_secs),
            entry.scorecard_count
        );
    }
    println!(
        "Response cache: {} entries, ttl {}s",
        responses.size, responses.ttl_secs
    );
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load()?;
    let service = MatchService::from_config(&config)?;
    let options = args.options();
    let division = args.division.as_deref();
    let competitions = args.competitions();

    let jobs = competitions.iter().map(|(content_type, id)| {
        let service = &service;
        let options = &options;
        let args = &args;
        async move {
            let title = format!("{}/{}", content_type, id);
            if let Some(stage) = args.stage {
                let scores = service
                    .stage_results(content_type, id, division, stage, options.category.as_deref())
                    .await?;
                print_stage(&format!("{} stage {}", title, stage), &scores);
            } else if args.compare.is_empty() {
                let results = service
                    .compute_scores(content_type, id, division, options)
                    .await?;
                print_results(&title, &results);
            } else {
                let results = service
                    .compare_competitors(content_type, id, division, &args.compare, options)
                    .await?;
                print_results(&format!("{} (comparison)", title), &results);
            }
            Ok::<_, hitfactor_core::ApiError>(())
        }
    });

    let mut failed = 0;
    for (result, (content_type, id)) in join_all(jobs).await.into_iter().zip(&competitions) {
        if let Err(e) = result {
            error!(content_type = %content_type, competition_id = %id, error = %e, "Failed to load results");
            eprintln!("Error: {}/{}: {}", content_type, id, e);
            failed += 1;
        }
    }

    if args.stats {
        print_stats(&service).await;
    }

    if failed > 0 {
        bail!("{} of {} competitions failed", failed, competitions.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = init_tracing();
    let args = Args::parse();
    info!(competitions = args.competitions().len(), "hitfactor starting");

    run(args).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("hitfactor").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_basic() {
        let args = parse(&["ipsc", "m-1"]).unwrap();
        assert_eq!(args.competitions(), vec![("ipsc".to_string(), "m-1".to_string())]);
        assert!(!args.stats);
    }

    #[test]
    fn test_parse_options() {
        let args = parse(&[
            "ipsc", "m-1", "--division", "Open", "--category", "Senior", "--exclude", "2,5",
            "--compare", "12,41", "--also", "uspsa/99", "--stats",
        ])
        .unwrap();
        assert_eq!(args.division.as_deref(), Some("Open"));
        assert_eq!(args.exclude, vec![2, 5]);
        assert_eq!(args.compare, vec!["12", "41"]);

        let competitions = args.competitions();
        assert_eq!(competitions.len(), 2);
        assert_eq!(competitions[0].0, "ipsc");
        assert_eq!(competitions[1], ("uspsa".to_string(), "99".to_string()));

        let options = args.options();
        assert_eq!(options.category.as_deref(), Some("Senior"));
        assert!(options.excluded_stages.contains(&5));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["ipsc"]).is_err());
        assert!(parse(&["ipsc", "m-1", "--exclude", "two"]).is_err());
        assert!(parse(&["ipsc", "m-1", "--division"]).is_err());
        assert!(parse(&["ipsc", "m-1", "--bogus"]).is_err());
        assert!(parse(&["ipsc", "m-1", "--also", "nope"]).is_err());
    }

    #[test]
    fn test_parse_stats_only() {
        let args = parse(&["--stats"]).unwrap();
        assert!(args.stats);
        assert!(args.competitions().is_empty());
    }

    #[test]
    fn test_parse_competition_pair() {
        assert_eq!(
            parse_competition("ipsc/m-1"),
            Ok(("ipsc".to_string(), "m-1".to_string()))
        );
        assert!(parse_competition("ipsc/").is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
