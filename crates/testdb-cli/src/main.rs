#![deny(clippy::all)]

use std::sync::Arc;

use atty::Stream;
use clap::Parser;
use color_eyre::Result;
use serde_json::Value;
use testdb_core::api::{
    self, CommandContext, CommandInfo, CommandStatus, Config, ExecutionOutcome, GlobalOptions,
    SystemEffects,
};

mod cli;
mod dispatch;
mod style;

use cli::TestdbCli;
use dispatch::{command_info, dispatch_command};
use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = match TestdbCli::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.use_stderr() => {
            let _ = err.print();
            std::process::exit(1);
        }
        Err(err) => err.exit(),
    };
    init_tracing(cli.trace, cli.verbose, cli.quiet);

    let global = GlobalOptions {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        root: cli.root.as_ref().map(|p| p.to_string_lossy().to_string()),
    };

    let (info, outcome) = run(&cli, &global)?;
    let code = emit_output(&cli, info, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn run(cli: &TestdbCli, global: &GlobalOptions) -> Result<(CommandInfo, ExecutionOutcome)> {
    let config = match Config::load(global) {
        Ok(config) => config,
        Err(err) => return Ok((command_info(&cli.command), api::error_outcome(&err))),
    };
    tracing::debug!(root = %config.root().display(), "loaded configuration");
    let effects = Arc::new(SystemEffects::new(&config));
    let ctx = CommandContext::new(config, effects);
    dispatch_command(&ctx, &cli.command)
}

fn init_tracing(trace: bool, verbose: u8, quiet: bool) {
    let level = if trace {
        "trace"
    } else if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("testdb={level},testdb_core={level},testdb_cli={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn emit_output(cli: &TestdbCli, info: CommandInfo, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.exit_code();
    let style = Style::new(cli.no_color, atty::is(Stream::Stdout));

    if cli.json {
        let payload = api::to_json_response(info, outcome);
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(code);
    }

    let message = api::format_status_message(info, &outcome.message);
    if cli.quiet {
        if outcome.status != CommandStatus::Ok {
            eprintln!("{message}");
        }
        return Ok(code);
    }

    println!("{}", style.status(outcome.status, &message));
    for input in changed_inputs(&outcome.details) {
        println!("{}", style.info(&format!("  changed: {input}")));
    }
    if let Some(hint) = hint_from_details(&outcome.details) {
        println!("{}", style.info(&format!("Hint: {hint}")));
    }
    Ok(code)
}

fn hint_from_details(details: &Value) -> Option<&str> {
    details
        .as_object()
        .and_then(|map| map.get("hint"))
        .and_then(Value::as_str)
}

fn changed_inputs(details: &Value) -> Vec<&str> {
    let report = details.get("template").unwrap_or(details);
    report
        .get("changed_inputs")
        .and_then(Value::as_array)
        .map(|inputs| inputs.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}
