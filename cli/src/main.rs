//! ordermatch CLI - group-buy comment matching tool
//!
//! A command-line tool for matching comments against a product catalog.

use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use ordermatch::{
    normalize_with, Catalog, MatchOptions, MatchResult, NormalizeOptions, OrderMatcher,
};
use rayon::prelude::*;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Korean group-buy comment matching
#[derive(Parser)]
#[command(
    name = "ordermatch",
    author = "iyulab",
    version,
    about = "Match group-buy comments against a product catalog",
    long_about = "ordermatch - Turns free-form Korean group-buy comments into structured orders.\n\n\
                  Catalogs are JSON files: an array of products or {\"products\": [...]}.\n\n\
                  Usage:\n  \
                  ordermatch match <catalog> <comment>     Match one comment\n  \
                  ordermatch batch <catalog> <comments>    Match a file of comments\n  \
                  ordermatch classify <catalog>            Show the catalog pattern"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Load matching options from a JSON file
    #[arg(long, global = true)]
    options: Option<PathBuf>,

    /// Use strict acceptance thresholds
    #[arg(long, global = true, conflicts_with = "lenient")]
    strict: bool,

    /// Use lenient acceptance thresholds
    #[arg(long, global = true)]
    lenient: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Match a single comment
    Match {
        /// Catalog JSON file
        catalog: PathBuf,

        /// Comment text
        comment: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Match every comment of a file (one per line, or a JSON array of strings)
    Batch {
        /// Catalog JSON file
        catalog: PathBuf,

        /// Comments file
        comments: PathBuf,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output compact JSON (no indentation)
        #[arg(long)]
        compact: bool,

        /// Confidence below which a result counts as escalated
        #[arg(long, default_value = "0.7")]
        threshold: f64,
    },

    /// Show the pattern of a catalog
    Classify {
        /// Catalog JSON file
        catalog: PathBuf,
    },

    /// Show the analysis of a comment
    Analyze {
        /// Catalog JSON file
        catalog: PathBuf,

        /// Comment text
        comment: String,
    },

    /// Print the normalized form of a text
    Normalize {
        /// Text to normalize
        text: String,

        /// Skip look-alike and numeral substitutions
        #[arg(long)]
        minimal: bool,
    },

    /// Show version information
    Version,
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    let options = load_options(cli.options.as_deref(), cli.strict, cli.lenient)?;
    let matcher = OrderMatcher::new().with_options(options);

    match command {
        Commands::Match {
            catalog,
            comment,
            json,
        } => {
            let catalog = Catalog::from_path(&catalog)?;
            let result = matcher.match_comment(&comment, &catalog);

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&comment, &result, matcher.options().multi_product_threshold);
            }
        }

        Commands::Batch {
            catalog,
            comments,
            output,
            compact,
            threshold,
        } => {
            let catalog = Catalog::from_path(&catalog)?;
            let comments = load_comments(&comments)?;

            let pb = create_progress(comments.len() as u64);
            let results: Vec<MatchResult> = comments
                .par_iter()
                .map(|comment| {
                    let result = matcher.match_comment(comment, &catalog);
                    pb.inc(1);
                    result
                })
                .collect();
            pb.finish_and_clear();

            let records: Vec<BatchRecord<'_>> = comments
                .iter()
                .zip(&results)
                .map(|(comment, result)| BatchRecord { comment, result })
                .collect();
            let json = if compact {
                serde_json::to_string(&records)?
            } else {
                serde_json::to_string_pretty(&records)?
            };
            write_output(output.as_ref(), &json)?;

            if let Some(path) = output {
                println!(
                    "{} Matched {} comments: {}",
                    "✓".green().bold(),
                    comments.len(),
                    path.display()
                );
                print_summary(&summarize(&results, threshold));
            }
        }

        Commands::Classify { catalog } => {
            let catalog = Catalog::from_path(&catalog)?;
            let pattern = matcher.classify(&catalog);

            println!("{}", "Catalog Pattern".cyan().bold());
            println!("{}", "─".repeat(40));
            println!("{}: {}", "Products".bold(), catalog.len());
            println!("{}: {}", "Pattern".bold(), pattern.pattern_type);
            println!("{}: {}", "Unit".bold(), pattern.unit);
            println!("{}: {:.2}", "Confidence".bold(), pattern.confidence);
            println!(
                "{}: {}",
                "Numbers mean quantity".bold(),
                yes_no(pattern.numbers_mean_quantity)
            );
            println!(
                "{}: {}",
                "Optimal pricing".bold(),
                yes_no(pattern.use_optimal_price)
            );
        }

        Commands::Analyze { catalog, comment } => {
            let catalog = Catalog::from_path(&catalog)?;
            let analysis = matcher.analyze(&comment, &catalog);

            println!("{}", "Comment Analysis".cyan().bold());
            println!("{}", "─".repeat(40));
            println!("{}: {}", "Normalized".bold(), analysis.normalized);
            println!("{}: {}", "Type".bold(), analysis.comment_type);
            println!("{}: {}", "Multi-product".bold(), yes_no(analysis.multi_product));
            println!("{}: {}", "Numeric tokens".bold(), analysis.numeric_count);
            match analysis.recommended {
                Some(kind) => println!("{}: {}", "Recommended".bold(), kind),
                None => println!("{}: {}", "Recommended".bold(), "escalate".yellow()),
            }

            if !analysis.patterns.is_empty() {
                println!("\n{}", "Detected Patterns".cyan().bold());
                println!("{}", "─".repeat(40));
                for pattern in &analysis.patterns {
                    println!(
                        "  {:?} '{}' ({:.2})",
                        pattern.kind, pattern.matched, pattern.confidence
                    );
                }
            }
        }

        Commands::Normalize { text, minimal } => {
            let options = if minimal {
                NormalizeOptions::minimal()
            } else {
                NormalizeOptions::default()
            };
            println!("{}", normalize_with(&text, &options));
        }

        Commands::Version => {
            print_version();
        }
    }

    Ok(())
}

/// One line of batch output.
#[derive(serde::Serialize)]
struct BatchRecord<'a> {
    comment: &'a str,
    #[serde(flatten)]
    result: &'a MatchResult,
}

/// Counts of a batch run.
#[derive(Debug, Default, PartialEq)]
struct Summary {
    total: usize,
    matched: usize,
    fallback: usize,
    escalated: usize,
}

fn summarize(results: &[MatchResult], threshold: f64) -> Summary {
    results.iter().fold(
        Summary {
            total: results.len(),
            ..Summary::default()
        },
        |mut summary, result| {
            if !result.is_empty() {
                summary.matched += 1;
            }
            if result.fallback_used {
                summary.fallback += 1;
            }
            if result.needs_escalation(threshold) {
                summary.escalated += 1;
            }
            summary
        },
    )
}

fn print_summary(summary: &Summary) {
    println!("\n{}", "Statistics".cyan().bold());
    println!("{}", "─".repeat(40));
    println!("{}: {}", "Comments".bold(), summary.total);
    println!("{}: {}", "Matched".bold(), summary.matched);
    println!("{}: {}", "Fallback".bold(), summary.fallback);
    println!("{}: {}", "Escalate".bold(), summary.escalated);
}

fn print_result(comment: &str, result: &MatchResult, threshold: f64) {
    println!("{}: {}", "Comment".bold(), comment);

    if result.is_empty() {
        println!("{} No order found", "!".yellow().bold());
        for line in &result.diagnostics {
            println!("  {}", line.dimmed());
        }
        return;
    }

    for candidate in &result.candidates {
        println!(
            "  {} {} × {} = {}",
            "✓".green(),
            candidate.title,
            candidate.quantity,
            format_price(candidate.total_price)
        );
    }

    let confidence = format!("{:.2}", result.confidence);
    let confidence = if result.needs_escalation(threshold) {
        confidence.yellow()
    } else {
        confidence.green()
    };
    println!("{}: {}", "Total".bold(), format_price(result.total_price()));
    println!("{}: {}", "Confidence".bold(), confidence);
    if let Some(matcher) = result.matcher {
        println!("{}: {}", "Matcher".bold(), matcher);
    }
    if result.fallback_used {
        println!("{} below threshold, returned as fallback", "!".yellow().bold());
    }
}

fn format_price(price: f64) -> String {
    format!("{:.0}원", price)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

fn load_options(
    path: Option<&Path>,
    strict: bool,
    lenient: bool,
) -> Result<MatchOptions, Box<dyn std::error::Error>> {
    let options = match path {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None if strict => MatchOptions::strict(),
        None if lenient => MatchOptions::lenient(),
        None => MatchOptions::default(),
    };
    Ok(options)
}

/// Reads comments: a JSON array of strings, or one comment per non-blank line.
fn load_comments(path: &Path) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    if content.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(&content)?);
    }
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn print_version() {
    println!("{} {}", "ordermatch".green().bold(), env!("CARGO_PKG_VERSION"));
    println!("Korean group-buy comment to order matching");
    println!();
    println!("Catalog patterns: single, box, size variant, quantity variant, mixed");
    println!("Repository: https://github.com/iyulab/ordermatch");
}

fn create_progress(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.blue} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message("matching");
    pb
}

fn write_output(path: Option<&PathBuf>, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", content)?;
        }
    }
    Ok(())
}
