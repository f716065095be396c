//! SOAR integrations - script runner
//!
//! `soar-integrations <integration> <script> [--input FILE] [--test-run] [--first-run]`
//!
//! Reads the invocation document from `--input` or stdin, runs the registered
//! action or connector and prints the result document on stdout.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use soar_integrations::api::registry::{self, Script};
use soar_integrations::config::RuntimeConfig;
use soar_integrations::constants;
use soar_integrations::http::BlockingTransportFactory;
use soar_integrations::platform::connector::OverflowLimiter;
use soar_integrations::platform::{
    ActionContext, ActionOutcome, ConnectorContext, FileContextStore, Invocation, ScriptOutput,
    ScriptResult,
};

#[derive(Debug, Parser)]
#[command(name = constants::APP_NAME, version = constants::APP_VERSION)]
struct Cli {
    /// Integration name, e.g. "Vectra QUX"
    integration: String,

    /// Action or connector name, e.g. "Describe Entity"
    #[arg(required_unless_present = "list")]
    script: Option<String>,

    /// Invocation document (JSON); stdin when omitted
    #[arg(long)]
    input: Option<PathBuf>,

    /// Connector test run: one alert at most, context is not saved
    #[arg(long)]
    test_run: bool,

    /// First invocation of an async action
    #[arg(long)]
    first_run: bool,

    /// List the scripts of the integration
    #[arg(long)]
    list: bool,
}

fn read_invocation(input: Option<&PathBuf>) -> Result<Invocation> {
    let content = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read invocation from {:?}", path))?,
        None => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("Failed to read invocation from stdin")?;
            content
        }
    };
    if content.trim().is_empty() {
        return Ok(Invocation::default());
    }
    serde_json::from_str(&content).context("Invocation is not a valid JSON document")
}

fn print_result(result: &ScriptResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

fn run(cli: Cli, config: RuntimeConfig) -> Result<ExitCode> {
    if cli.list {
        for entry in registry::scripts_of(&cli.integration) {
            let kind = match entry.script {
                Script::Action(_) => "action",
                Script::Connector(_) => "connector",
            };
            println!("{} ({})", entry.name, kind);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let script_name = cli.script.as_deref().unwrap_or_default();
    let entry = registry::find(&cli.integration, script_name)
        .ok_or_else(|| anyhow!("Unknown script \"{}\" for integration \"{}\"", script_name, cli.integration))?;
    let invocation = read_invocation(cli.input.as_ref())?;
    let transports = BlockingTransportFactory::new(config.request_timeout_override);

    match entry.script {
        Script::Action(action) => {
            let mut output = ScriptOutput::default();
            let outcome = {
                let mut ctx = ActionContext::new(&invocation.params, &mut output, &transports);
                ctx.is_first_run = cli.first_run || invocation.additional_data.is_none();
                ctx.additional_data = invocation.additional_data.clone();
                action(&mut ctx)
            };
            print_result(&ScriptResult::from_action(outcome, output))?;
            Ok(ExitCode::SUCCESS)
        }
        Script::Connector(connector) => {
            let identifier = invocation
                .context_identifier
                .clone()
                .unwrap_or_else(|| format!("{}_{}", entry.integration, entry.name));
            let mut store = FileContextStore::open(&config.context_dir, &identifier)?;
            log::debug!("Connector context at {:?}", store.path());
            let mut overflow = OverflowLimiter::new(config.overflow_limit);

            let result = {
                let mut ctx = ConnectorContext {
                    params: &invocation.params,
                    store: &mut store,
                    transports: &transports,
                    overflow: &mut overflow,
                    is_test_run: cli.test_run,
                    started: Instant::now(),
                };
                connector(&mut ctx)
            };

            match result {
                Ok(run) => {
                    let count = run.alerts.len();
                    let outcome = ActionOutcome::completed(format!("Created {} alert(s)", count), count as u64);
                    print_result(&ScriptResult::from_connector(outcome, run.alerts))?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    log::error!("Got exception on main handler. Error: {}", err);
                    print_result(&ScriptResult::from_connector(ActionOutcome::failed(err.to_string()), Vec::new()))?;
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let config = RuntimeConfig::from_env();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_filter.as_str()))
        .target(env_logger::Target::Stderr)
        .init();

    log::info!("{} v{} starting", constants::APP_NAME, constants::APP_VERSION);

    let cli = Cli::parse();
    match run(cli, config) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{:#}", err);
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
