use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use tracing_subscriber::EnvFilter;

use bank_statement_engine::{
    rules::load_rules, AccountHint, BankStatementParser, BankTransaction, EngineConfig,
    ParseOptions, ParseResult, VERSION,
};

const USAGE: &str = "\
Usage: bank-statement-engine <file>... [options]

Options:
  --json                 Print each ParseResult as JSON
  --normalize            Fill normalizedDescription
  --no-categorize        Skip auto-categorization
  --no-validate          Skip validation
  --delimiter <c>        CSV delimiter (default: sniffed)
  --date-format <fmt>    CSV date format, e.g. DD/MM/YYYY
  --bank <code>          Account hint for CSV files
  --branch <code>
  --account <number>
  --config <file>        Engine config (JSON)
  --rules <file>         Extra categorization rules (JSON)
  --history <file>       Previously imported transactions (JSON) for duplicate checks";

struct CliArgs {
    files: Vec<PathBuf>,
    json: bool,
    options: ParseOptions,
    config: Option<PathBuf>,
    rules: Option<PathBuf>,
    history: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{}", USAGE);
        return Ok(());
    }

    let cli = parse_args(&args)?;
    let parser = build_parser(&cli)?;
    let history = match &cli.history {
        Some(path) => load_history(path)?,
        None => Vec::new(),
    };

    if !cli.json {
        println!("🏦 Bank Statement Engine v{}", VERSION);
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // One scoped thread per file; the parser and history are shared read-only
    let results: Vec<(PathBuf, Result<ParseResult>)> = thread::scope(|scope| {
        let handles: Vec<_> = cli
            .files
            .iter()
            .map(|path| {
                let parser = &parser;
                let history = &history;
                let options = &cli.options;
                (path, scope.spawn(move || parse_file(parser, path, options, history)))
            })
            .collect();

        handles
            .into_iter()
            .map(|(path, handle)| (path.clone(), worker_result(handle.join())))
            .collect()
    });

    let mut failures = 0;
    for (path, result) in results {
        match result {
            Ok(result) if cli.json => {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            Ok(result) => print_report(&path, &result),
            Err(e) => {
                failures += 1;
                eprintln!("❌ {}: {:#}", path.display(), e);
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} files failed to parse", failures, cli.files.len());
    }

    Ok(())
}

/// A panicking worker still counts as a failed file
fn worker_result<T>(joined: thread::Result<Result<T>>) -> Result<T> {
    joined.unwrap_or_else(|_| Err(anyhow!("worker thread panicked")))
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut cli = CliArgs {
        files: Vec::new(),
        json: false,
        options: ParseOptions::default(),
        config: None,
        rules: None,
        history: None,
    };
    let mut hint = AccountHint::default();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| -> Result<String> {
            iter.next()
                .cloned()
                .with_context(|| format!("{} needs a value", flag))
        };

        match arg.as_str() {
            "--json" => cli.json = true,
            "--normalize" => cli.options.normalize_descriptions = true,
            "--no-categorize" => cli.options.auto_categorize = false,
            "--no-validate" => cli.options.validate_balance = false,
            "--delimiter" => {
                let raw = value(arg.as_str())?;
                let delimiter = match raw.as_str() {
                    "\\t" | "tab" => '\t',
                    other => {
                        let mut chars = other.chars();
                        match (chars.next(), chars.next()) {
                            (Some(c), None) => c,
                            _ => bail!("--delimiter must be a single character, got '{}'", other),
                        }
                    }
                };
                cli.options.csv_delimiter = Some(delimiter);
            }
            "--date-format" => cli.options.csv_date_format = Some(value(arg.as_str())?),
            "--bank" => hint.bank_code = Some(value(arg.as_str())?),
            "--branch" => hint.branch_code = Some(value(arg.as_str())?),
            "--account" => hint.account_number = Some(value(arg.as_str())?),
            "--config" => cli.config = Some(PathBuf::from(value(arg.as_str())?)),
            "--rules" => cli.rules = Some(PathBuf::from(value(arg.as_str())?)),
            "--history" => cli.history = Some(PathBuf::from(value(arg.as_str())?)),
            flag if flag.starts_with("--") => bail!("Unknown option: {}\n\n{}", flag, USAGE),
            file => cli.files.push(PathBuf::from(file)),
        }
    }

    if cli.files.is_empty() {
        bail!("No statement files given\n\n{}", USAGE);
    }

    if hint != AccountHint::default() {
        cli.options.account = Some(hint);
    }

    Ok(cli)
}

fn build_parser(cli: &CliArgs) -> Result<BankStatementParser> {
    let mut parser = match &cli.config {
        Some(path) => {
            let config = EngineConfig::from_file(path)?;
            BankStatementParser::with_config(config)
                .with_context(|| format!("Invalid engine config: {}", path.display()))?
        }
        None => BankStatementParser::new(),
    };

    if let Some(path) = &cli.rules {
        let rules = load_rules(path)?;
        let count = rules.len();
        for rule in rules {
            parser
                .categorizer_mut()
                .create_rule(rule)
                .with_context(|| format!("Invalid rule in {}", path.display()))?;
        }
        tracing::info!("Loaded {} custom rules from {}", count, path.display());
    }

    Ok(parser)
}

fn load_history(path: &Path) -> Result<Vec<BankTransaction>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse history JSON: {}", path.display()))
}

fn parse_file(
    parser: &BankStatementParser,
    path: &Path,
    options: &ParseOptions,
    history: &[BankTransaction],
) -> Result<ParseResult> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    // Bank exports are often Latin-1; keep going with replacement characters
    let content = String::from_utf8_lossy(&bytes);

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("statement");

    let result = if history.is_empty() {
        parser.parse(&content, file_name, options)
    } else {
        parser.parse_with_history(&content, file_name, options, history)
    };

    result.with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_report(path: &Path, result: &ParseResult) {
    let statement = &result.statement;
    let summary = &statement.summary;

    println!("\n📂 {}", path.display());
    println!("   Parser:  {} ({:.2}ms)", result.parser_used, result.processing_time_ms);
    println!(
        "   Account: {} {} / {} / {}",
        statement.account.bank_name.as_deref().unwrap_or("?"),
        statement.account.bank_code,
        statement.account.branch_code,
        statement.account.account_number
    );
    println!(
        "   Period:  {} → {}",
        statement.period.start_date, statement.period.end_date
    );
    println!(
        "   Balance: {} → {} {}",
        statement.balance.opening_balance,
        statement.balance.closing_balance,
        statement.balance.currency
    );
    println!(
        "   📊 {} transactions: +{} ({}) / -{} ({}) = {}",
        summary.total_transactions,
        summary.total_credits,
        summary.credit_count,
        summary.total_debits,
        summary.debit_count,
        summary.net_movement
    );

    if let Some(categorization) = &result.categorization {
        println!(
            "   🏷️  {} categorized, {} low confidence",
            categorization.categorized, categorization.low_confidence
        );
        for (category, count) in &categorization.by_category {
            println!("      {:<20} {}", category.as_str(), count);
        }
    }

    if statement.is_valid {
        println!("   ✅ Valid ({} warnings)", statement.validation_warnings.len());
    } else {
        println!("   ❌ Invalid ({} errors)", statement.validation_errors.len());
    }
    for issue in &statement.validation_errors {
        println!("      ❌ {:?}: {}", issue.code, issue.message);
    }
    for issue in &statement.validation_warnings {
        println!("      ⚠️  {:?}: {}", issue.code, issue.message);
    }
}
