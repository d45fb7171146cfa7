// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use casebook_app::{AppState, Backend, ScopeId};
use casebook_backend::Client;
use casebook_testkit::MemoryBackend;
use config::Config;
use runtime::CaseRuntime;
use std::env;
use std::path::PathBuf;

const DEMO_SEED: u64 = 42;
const DEMO_ROWS: usize = 25;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `casebook --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    logging::init(config.log_level(), &config.log_path()?)?;

    let tables = config.tables(options.scope.as_deref().map(ScopeId::from));
    let mut state = AppState::new(tables)?;
    if let Some(name) = options.table.as_deref().or(config.default_table()) {
        state = state.with_active_table(name)?;
    }

    let backend: Box<dyn Backend> = if options.demo {
        tracing::info!(seed = DEMO_SEED, rows = DEMO_ROWS, "starting with demo data");
        Box::new(MemoryBackend::demo(DEMO_SEED, DEMO_ROWS))
    } else {
        let client = Client::new(config.backend_url()?, &config.api_key(), config.timeout()?)
            .with_context(|| {
                format!(
                    "invalid [backend] config in {}; fix url/timeout values",
                    options.config_path.display()
                )
            })?;
        if options.check_only {
            client.ping(&config.table_names())?;
        }
        tracing::info!(url = client.base_url(), "connecting");
        Box::new(client)
    };
    if options.check_only {
        return Ok(());
    }

    let mut runtime = CaseRuntime::new(backend);
    casebook_tui::run_app(&mut state, &mut runtime)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    table: Option<String>,
    scope: Option<String>,
    print_config_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        table: None,
        scope: None,
        print_config_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--table" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--table requires a table name"))?;
                options.table = Some(value.as_ref().to_owned());
            }
            "--scope" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--scope requires a center id"))?;
                let value = value.as_ref().trim();
                if value.is_empty() {
                    anyhow::bail!("--scope requires a non-empty center id");
                }
                options.scope = Some(value.to_owned());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("casebook");
    println!("  --config <path>          Use a specific config path");
    println!("  --table <name>           Open this table first");
    println!("  --scope <id>             Only show rows for one center");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Launch with generated demo data (in-memory)");
    println!("  --check                  Validate config and reach the backend, then exit");
    println!("  --help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, parse_cli_args};
    use anyhow::Result;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/casebook-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                table: None,
                scope: None,
                print_config_path: false,
                demo: false,
                print_example: false,
                check_only: false,
                show_help: false,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_reads_table_and_scope() -> Result<()> {
        let options = parse_cli_args(
            vec!["--table", "educators", "--scope", " 3 "],
            default_options_path(),
        )?;
        assert_eq!(options.table.as_deref(), Some("educators"));
        assert_eq!(options.scope.as_deref(), Some("3"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_values() {
        for (args, expected) in [
            (vec!["--config"], "--config requires a file path"),
            (vec!["--table"], "--table requires a table name"),
            (vec!["--scope"], "--scope requires a center id"),
            (vec!["--scope", " "], "non-empty"),
        ] {
            let error = parse_cli_args(args, default_options_path())
                .expect_err("missing value should fail");
            assert!(error.to_string().contains(expected), "{error}");
        }
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_sets_print_and_check_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--print-config-path", "--print-example-config", "--check"],
            default_options_path(),
        )?;
        assert!(options.print_config_path);
        assert!(!options.demo);
        assert!(options.print_example);
        assert!(options.check_only);
        assert!(!options.show_help);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_demo_and_help_flags() -> Result<()> {
        let options = parse_cli_args(vec!["--demo"], default_options_path())?;
        assert!(options.demo);

        let long = parse_cli_args(vec!["--help"], default_options_path())?;
        assert!(long.show_help);

        let short = parse_cli_args(vec!["-h"], default_options_path())?;
        assert!(short.show_help);
        Ok(())
    }
}
