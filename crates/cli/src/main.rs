//! Command line driver converting parsed rules to SQL queries.
//!
//! Usage:
//!     sigsql convert rules.json -O table=eventlog --mapping fields.json
//!     sigsql options

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use sigsql_model::ParsedRule;
use sigsql_query::options::OPTIONS;
use sigsql_query::{BackendOptions, QueryDialect, SqlDialect, StaticFieldMap};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG: &str = "sigsql=debug";

#[derive(Parser)]
#[command(name = "sigsql")]
#[command(about = "Convert parsed detection rules into SQL queries")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert rules to queries
    Convert {
        /// Path to a JSON file holding one parsed rule or an array of them
        rules: PathBuf,

        /// Backend option as key=value (repeatable)
        #[arg(short = 'O', long = "option")]
        options: Vec<String>,

        /// Path to a JSON field mapping
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// Emit one query per condition instead of the last one only
        #[arg(long)]
        all_conditions: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// List the recognised backend options
    Options,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleFile {
    Many(Vec<ParsedRule>),
    One(ParsedRule),
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            rules,
            options,
            mapping,
            all_conditions,
            format,
        } => {
            let options = BackendOptions::from_pairs(&options)?;
            let mapping = match mapping {
                Some(path) => load_mapping(&path)?,
                None => StaticFieldMap::default(),
            };
            let dialect = SqlDialect::new(options, mapping);
            let rules = load_rules(&rules)?;

            let failed = run_convert(&dialect, &rules, all_conditions, format)?;
            if failed > 0 {
                eprintln!("{} of {} rules failed", failed, rules.len());
                std::process::exit(1);
            }
        }
        Commands::Options => run_options(),
    }

    Ok(())
}

/// `RUST_LOG` directives when set, `sigsql=debug` otherwise.
fn log_filter(directives: Option<String>) -> EnvFilter {
    match directives {
        Some(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(DEFAULT_LOG),
    }
}

fn load_rules(path: &Path) -> Result<Vec<ParsedRule>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let file: RuleFile =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

    Ok(match file {
        RuleFile::Many(rules) => rules,
        RuleFile::One(rule) => vec![rule],
    })
}

fn load_mapping(path: &Path) -> Result<StaticFieldMap> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Convert every rule, reporting failures and continuing. Returns the
/// number of rules that failed.
fn run_convert(
    dialect: &SqlDialect<StaticFieldMap>,
    rules: &[ParsedRule],
    all_conditions: bool,
    format: Format,
) -> Result<usize> {
    let mut failed = 0;
    let mut converted = Vec::new();

    for (i, rule) in rules.iter().enumerate() {
        let title = rule.title.clone().unwrap_or_else(|| format!("rule #{}", i + 1));

        let result = if all_conditions {
            dialect.translate_all(rule)
        } else {
            dialect.translate(rule).map(|query| vec![query])
        };

        match result {
            Ok(queries) => converted.push((title, queries)),
            Err(e) => {
                tracing::error!(rule = %title, error = %e, "Conversion failed");
                failed += 1;
            }
        }
    }

    match format {
        Format::Json => {
            let out: Vec<_> = converted
                .iter()
                .map(|(title, queries)| serde_json::json!({ "title": title, "queries": queries }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Text => {
            for (_, queries) in &converted {
                for query in queries {
                    println!("{}", query);
                }
            }
        }
    }

    Ok(failed)
}

fn run_options() {
    for (key, default, description) in OPTIONS {
        println!("{:<10} {:<8} {}", key, default, description);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigsql_model::Node;

    #[test]
    fn test_log_filter_respects_env() {
        let filter = log_filter(Some("sigsql=warn".to_string())).to_string();
        assert!(filter.contains("sigsql=warn"));
        assert!(!filter.contains("debug"));
    }

    #[test]
    fn test_log_filter_default() {
        assert_eq!(log_filter(None).to_string(), DEFAULT_LOG);
        assert_eq!(log_filter(Some(String::new())).to_string(), DEFAULT_LOG);
    }

    #[test]
    fn test_convert_counts_each_failure_once() {
        let dialect = SqlDialect::new(BackendOptions::default(), StaticFieldMap::default());
        let rules = vec![
            ParsedRule::new(Node::map_item("EventID", 1)),
            ParsedRule::new(Node::value("mimikatz")),
            ParsedRule::default(),
        ];
        assert_eq!(run_convert(&dialect, &rules, true, Format::Text).unwrap(), 2);
        assert_eq!(run_convert(&dialect, &rules, false, Format::Json).unwrap(), 2);
    }
}
