// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, bail};
use config::Config;
use curio_app::AppState;
use curio_db::Store;
use curio_tui::UiOptions;
use runtime::DbRuntime;
use std::env;
use std::path::PathBuf;

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
            "load config {}; run `curio --print-example-config` for a template",
            options.config_path.display()
        )
    })?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or CURIO_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;
    if options.demo {
        store.seed_demo_data()?;
    }

    if options.check_only {
        return Ok(());
    }

    let ui_options = UiOptions {
        page_size: config.page_size(),
        debounce: config.debounce()?,
    };

    let mut state = AppState::default();
    let mut runtime = DbRuntime::new(&store);
    curio_tui::run_app(&mut state, &mut runtime, ui_options)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args(
    mut args: impl Iterator<Item = String>,
    default_config_path: PathBuf,
) -> Result<CliOptions> {
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => options.show_help = true,
            "--config" => {
                let Some(path) = args.next() else {
                    bail!("--config requires a path argument");
                };
                options.config_path = PathBuf::from(path);
            }
            "--print-config-path" => options.print_config_path = true,
            "--print-db-path" => options.print_db_path = true,
            "--print-example-config" => options.print_example = true,
            "--demo" => options.demo = true,
            "--check" => options.check_only = true,
            other => bail!("unknown argument {other:?}; run `curio --help` for usage"),
        }
    }

    Ok(options)
}

fn print_help() {
    println!(
        "\
curio -- a keyboard-driven curator for shelves of collectible pieces

USAGE:
  curio [OPTIONS]

OPTIONS:
  --config <path>          use an explicit config file
  --print-config-path      print the resolved config path and exit
  --print-db-path          print the resolved database path and exit
  --print-example-config   print a config template and exit
  --demo                   run against an in-memory database with sample data
  --check                  validate config and database, then exit
  -h, --help               show this help

KEYS:
  f/b        next/previous shelf          j/k      move cursor
  space      select piece                 c        clear selection
  t/y        move to top/bottom           m        grab (then j/k, enter, esc)
  /          filter                       a        add piece
  d          delete piece                 [/]      page
  s          save now                     q        quit (saves pending)
"
    );
}
