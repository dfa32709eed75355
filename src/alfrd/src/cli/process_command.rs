use super::commands::{Cli, Command, ConfigCommand, ProjectCommand, SheetCommand};
use super::handlers;
use crate::config::{Config, ConfigLoader};
use crate::constants::LOG_FILE;
use crate::{livelog, logging};
use alfrd_common::{error_message, warning_message, Colorize};
use anyhow::Result;
use clap::Parser;

/// Process the command line and exit with a non-zero status on failure.
pub fn process_command() {
    // NOTE: this exits on a parsing error
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_config_file(path),
        None => ConfigLoader::load_default_config(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            error_message!("{:#}", err);
            std::process::exit(2);
        }
    };

    if let Err(err) = logging::setup_logging(&config.alfrd_dir.join(LOG_FILE)) {
        warning_message!("file logging disabled: {:#}", err);
    }
    livelog::set_capacity(config.live_log_capacity);

    let result = run(cli.command, &config);

    if cli.verbose {
        println!("{}", livelog::dump());
    }
    if let Err(err) = result {
        error_message!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Project { command } => match command {
            ProjectCommand::Create { name } => handlers::create(config, &name),
            ProjectCommand::Rm { name } => handlers::rm(config, &name),
            ProjectCommand::List => handlers::list(config),
            ProjectCommand::Add { name, paths, copy } => handlers::add(config, &name, &paths, copy),
            ProjectCommand::Show { name } => handlers::show(config, &name),
        },
        Command::Config { command } => match command {
            ConfigCommand::Save { project, fresh } => handlers::save(config, &project, fresh),
            ConfigCommand::Bind {
                project,
                step,
                before,
                after,
            } => handlers::bind(config, &project, &step, &before, &after),
            ConfigCommand::Param {
                project,
                step,
                params,
                edit,
            } => handlers::param(config, &project, &step, params, edit),
        },
        Command::Run { project, step } => handlers::run_step(config, &project, &step),
        Command::Sheet { command } => match command {
            SheetCommand::Show {
                url,
                sid,
                worksheet,
                wid,
                key,
                rows,
            } => tokio::runtime::Runtime::new()?.block_on(handlers::sheet_show(
                config, url, sid, worksheet, wid, key, rows,
            )),
        },
    }
}
