use clap::{Arg, ArgAction, Command};
use cycle_analyzer::AnalyzeOptions;
use std::process;
use tracing::{error, info};

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("Sets a custom config file")
}

#[tokio::main]
async fn main() {
    let matches = Command::new("Cycle Analyzer")
        .version("1.0")
        .about("Detects production cycles and cross-checks time sequences across tables")
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("analyze")
                .about("Analyze tables and optionally write the LOTE tables")
                .arg(config_arg())
                .arg(
                    Arg::new("strategy")
                        .long("strategy")
                        .value_name("STRATEGY")
                        .help("auto, interpolate, reconstruct, pattern or none"),
                )
                .arg(
                    Arg::new("tables")
                        .long("tables")
                        .value_name("NAMES")
                        .value_delimiter(',')
                        .help("Comma separated tables; defaults to every table with the time column"),
                )
                .arg(
                    Arg::new("reference")
                        .long("reference")
                        .value_name("TABLE")
                        .help("Reference table for LOTE_SUMMARY and LOTE_DATA"),
                ),
        )
        .subcommand(
            Command::new("serve")
                .about("Run the HTTP API")
                .arg(config_arg()),
        )
        .get_matches();

    cycle_analyzer::init_tracing(matches.get_flag("json-logs"));

    match matches.subcommand() {
        Some(("analyze", analyze_matches)) => {
            let config_path = analyze_matches
                .get_one::<String>("config")
                .map(|s| s.as_str())
                .unwrap_or("config/analyzer.toml");
            let options = AnalyzeOptions {
                strategy: analyze_matches.get_one::<String>("strategy").cloned(),
                tables: analyze_matches
                    .get_many::<String>("tables")
                    .map(|values| values.cloned().collect()),
                reference_table: analyze_matches.get_one::<String>("reference").cloned(),
            };
            info!(config = config_path, "Starting cycle analysis");

            if let Err(e) = cycle_analyzer::run_analysis_pipeline(config_path, options).await {
                error!(error = %e, "Cycle analysis failed");
                process::exit(1);
            }
        }
        Some(("serve", serve_matches)) => {
            let config_path = serve_matches
                .get_one::<String>("config")
                .map(|s| s.as_str())
                .unwrap_or("config/analyzer.toml");

            if let Err(e) = cycle_analyzer::run_api_server(config_path).await {
                error!(error = %e, "API server error");
                process::exit(1);
            }
        }
        _ => {
            eprintln!("No subcommand specified. Use --help for usage information.");
            process::exit(1);
        }
    }
}
