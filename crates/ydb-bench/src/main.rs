pub(crate) mod cli;

use std::fmt::Write;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use core_sampler::{CheckedQuery, TestPlan, check_plan, full_message};
use core_values::ConversionRegistry;
use dotenv::dotenv;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

const TARGETS: [&str; 4] = ["ydb_bench", "core_sampler", "core_executor", "core_values"];

fn main() -> ExitCode {
    dotenv().ok();

    let opts = cli::CliOpts::parse();

    setup_tracing(&opts);

    match opts.command {
        cli::Command::Check { plan } => check(&plan),
        cli::Command::Types => {
            print_types(ConversionRegistry::global());
            ExitCode::SUCCESS
        }
    }
}

fn setup_tracing(opts: &cli::CliOpts) {
    let targets_with_level = |level: LevelFilter| -> Vec<(&str, LevelFilter)> {
        TARGETS.iter().map(|t| ((*t), level)).collect()
    };
    let level: LevelFilter = opts.tracing_level.clone().into();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(match std::env::var("RUST_LOG") {
                    Ok(val) => match val.parse::<Targets>() {
                        Ok(log_targets_from_env) => log_targets_from_env,
                        Err(err) => {
                            eprintln!("Failed to parse RUST_LOG: {err:?}");
                            Targets::default()
                                .with_targets(targets_with_level(level))
                                .with_default(LevelFilter::WARN)
                        }
                    },
                    _ => Targets::default()
                        .with_targets(targets_with_level(level))
                        .with_default(LevelFilter::WARN),
                }),
        )
        .init();
}

#[allow(clippy::print_stdout, clippy::print_stderr)]
fn check(path: &Path) -> ExitCode {
    let plan = match TestPlan::load(path) {
        Ok(plan) => plan,
        Err(err) => {
            eprintln!("{}", full_message(&err));
            return ExitCode::FAILURE;
        }
    };
    match check_plan(&plan, ConversionRegistry::global()) {
        Ok(checked) => {
            for source in &plan.data_sources {
                println!("{}{}", source.data_source, source.connection_info());
                if let Some(cert) = source.tls_certificate() {
                    println!("  tls certificate: {}", cert.display());
                }
            }
            for query in &checked {
                print!("{}", describe(query));
            }
            println!(
                "{}: {} data sources, {} queries OK",
                path.display(),
                plan.data_sources.len(),
                checked.len()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(plan = %path.display(), "Test plan check failed");
            eprintln!("{}", full_message(&err));
            ExitCode::FAILURE
        }
    }
}

fn describe(query: &CheckedQuery) -> String {
    let mut text = format!("[{}] {}\n", query.spec.query_kind, query.name);
    for param in &query.params {
        let _ = writeln!(text, "  {} = {}", param.name, param.value);
    }
    text
}

#[allow(clippy::print_stdout)]
fn print_types(registry: &ConversionRegistry) {
    let mut tags: Vec<&str> = registry.tags().collect();
    tags.sort_unstable();
    for tag in tags {
        println!("{tag}");
    }
}
