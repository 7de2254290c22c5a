use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::error;
use tracing_subscriber::EnvFilter;

use screen_translate::app::{self, ExecutionPlan};
use screen_translate::cli::parse_cli;
use screen_translate::console::ConsoleSink;
use screen_translate::scan_loop::ScanSummary;
use screen_translate::settings::resolve_settings;
use screen_translate_capture::{Backend, Configuration};

const DEFAULT_LOG_FILTER: &str = "screen_translate=info";

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let (cli, sources) = parse_cli();
    init_tracing(cli.log_level.as_deref());

    if cli.list_backends {
        print_available_backends();
        return ExitCode::SUCCESS;
    }

    let settings = match resolve_settings(&cli, &sources) {
        Ok(settings) => settings,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if cli.list_models {
        return match app::list_models(&settings).await {
            Ok(models) => {
                print_models(&models);
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!("{err}");
                ExitCode::FAILURE
            }
        };
    }

    let plan = ExecutionPlan {
        settings,
        max_cycles: cli.cycles,
        sink: Arc::new(ConsoleSink::new()),
        interactive: std::io::stdin().is_terminal(),
    };
    match app::run(plan).await {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_available_backends() {
    let names: Vec<&'static str> = Configuration::available_backends()
        .iter()
        .map(Backend::as_str)
        .collect();
    if names.is_empty() {
        println!("available backends: (none compiled)");
    } else {
        println!("available backends: {}", names.join(", "));
    }
}

fn print_models(models: &[String]) {
    if models.is_empty() {
        println!("translator endpoint reported no models");
    }
    for model in models {
        println!("{model}");
    }
}

fn print_summary(summary: &ScanSummary) {
    println!(
        "{} cycles: {} completed, {} unchanged, {} failed, {} cancelled; {} labels rendered",
        summary.cycles,
        summary.completed,
        summary.unchanged,
        summary.failed,
        summary.cancelled,
        summary.rendered
    );
}
