//! pam-netfilter - check rule files and try module arguments without a PAM stack

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context};
use clap::Parser;
use netfilter_core::{
    Dispatcher, FilterError, Item, ModuleArgs, Phase, RequestContext, ResultCode, StaticItems, Verdict,
};
use netfilter_rules::{Effect, ParseOptions, RuleStore};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pam-netfilter")]
#[command(about = "Check pam_network_filter rule files and module arguments")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Parse a rule file and list its rules
    Check {
        /// Rule file path
        file: PathBuf,
        /// Effect of rules without a marker
        #[arg(long, default_value = "allow", value_parser = parse_effect)]
        sense: Effect,
        /// Lowercase patterns, as done for host name items
        #[arg(long)]
        fold_case: bool,
        /// Require exact patterns to be valid login names, as done for user items
        #[arg(long)]
        user_names: bool,
        /// Print the rules as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one phase against a given item value
    Eval {
        /// Item the candidate stands for
        #[arg(long, default_value = "rhost")]
        item: String,
        /// Value the host would report for the item
        #[arg(long)]
        candidate: String,
        /// Phase to run
        #[arg(long, default_value = "authenticate")]
        phase: Phase,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
        /// Module arguments, as written in the service configuration
        args: Vec<String>,
    },
}

#[derive(Debug, Serialize)]
struct EvalReport {
    phase: Phase,
    item: Item,
    candidate: String,
    verdict: Option<Verdict>,
    result: &'static str,
    code: i32,
}

fn parse_effect(value: &str) -> Result<Effect, String> {
    Effect::from_keyword(value).ok_or_else(|| format!("expected 'allow' or 'deny', got '{}'", value))
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check {
            file,
            sense,
            fold_case,
            user_names,
            json,
        } => {
            let options = ParseOptions {
                sense,
                fold_case,
                user_names,
            };
            let store = RuleStore::load(&file, &options)
                .with_context(|| format!("checking {}", file.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&store)?);
            } else {
                for rule in store.iter() {
                    println!("{:>5}  {}", rule.line, rule);
                }
                println!("{}: {} rule(s)", file.display(), store.len());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Eval {
            item,
            candidate,
            phase,
            json,
            args,
        } => {
            let report = evaluate(&item, candidate, phase, args)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let verdict = report
                    .verdict
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{} {:?}={}: verdict {}, {} ({})",
                    report.phase.symbol(),
                    report.item,
                    report.candidate,
                    verdict,
                    report.result,
                    report.code
                );
            }
            if report.code == ResultCode::Success.as_raw() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn evaluate(item: &str, candidate: String, phase: Phase, args: Vec<String>) -> anyhow::Result<EvalReport> {
    let item: Item = item.parse().map_err(|e| anyhow!("{}", e))?;
    let mut module_args = vec![format!("item={}", item.name())];
    module_args.extend(args);

    let items = StaticItems::new().with(item.source(), candidate.clone());
    let dispatcher = Dispatcher::new();
    let ctx = RequestContext::new(phase, 0, &module_args, &items);
    debug!("{:?}", ctx);
    let code = dispatcher.dispatch(&ctx);

    let verdict = if phase.performs_matching() {
        let verdict = ModuleArgs::parse(&module_args)
            .map_err(FilterError::from)
            .and_then(|parsed| dispatcher.evaluate(&items, &parsed))
            .unwrap_or(Verdict::Indeterminate);
        Some(verdict)
    } else {
        None
    };

    Ok(EvalReport {
        phase,
        item,
        candidate,
        verdict,
        result: code.name(),
        code: code.as_raw(),
    })
}
