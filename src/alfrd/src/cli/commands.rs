use alfrd_common::workdir::ALFRD_WORK_DIR;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

fn about_message() -> String {
    format!(
        "Bookkeeping for processing pipelines: project scripts, step registry and spreadsheet status\nVersion: {}",
        env!("CARGO_PKG_VERSION")
    )
}

fn footer_message() -> String {
    format!(
        "Working Directory: {:?}\nProjects: {:?}\nCredentials: {:?}\nLog: {:?}\n",
        &ALFRD_WORK_DIR.path,
        &ALFRD_WORK_DIR.projects_dir,
        &ALFRD_WORK_DIR.credentials_file,
        &ALFRD_WORK_DIR.log_file
    )
}

#[derive(Parser, Clone)]
#[clap(
    name = "alfrd",
    about = about_message(),
    version = env!("CARGO_PKG_VERSION"),
    after_help = footer_message()
)]
pub struct Cli {
    /// TOML settings file, instead of `<alfrd dir>/config.toml`
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print the live log when the command finishes
    #[clap(short, long, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create, remove, list and fill project directories
    Project {
        #[clap(subcommand)]
        command: ProjectCommand,
    },

    /// Edit the step configuration (config.yaml) of a project
    Config {
        #[clap(subcommand)]
        command: ConfigCommand,
    },

    /// Run one step of a project together with its bound validators
    Run {
        project: String,
        step: String,
    },

    /// Inspect a Google spreadsheet
    Sheet {
        #[clap(subcommand)]
        command: SheetCommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProjectCommand {
    /// Create an empty project
    Create { name: String },

    /// Remove a project and everything in it
    Rm { name: String },

    /// List the existing projects
    List,

    /// Add files or directories to a project
    Add {
        name: String,
        #[clap(required = true)]
        paths: Vec<PathBuf>,
        /// Copy files instead of linking them
        #[clap(long)]
        copy: bool,
    },

    /// Show the steps, validators and bindings of a project
    Show { name: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Write the registry of a project to its config.yaml
    Save {
        project: String,
        /// Ignore the existing config.yaml instead of merging it
        #[clap(long)]
        fresh: bool,
    },

    /// Bind validators to run before or after a step
    Bind {
        project: String,
        #[clap(long)]
        step: String,
        #[clap(long, value_delimiter = ',')]
        before: Vec<String>,
        #[clap(long, value_delimiter = ',')]
        after: Vec<String>,
    },

    /// Add step parameters as key=value pairs
    Param {
        project: String,
        #[clap(long)]
        step: String,
        #[clap(required = true, value_parser = parse_key_val)]
        params: Vec<(String, String)>,
        /// Change existing parameters instead of adding new ones
        #[clap(long)]
        edit: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SheetCommand {
    /// Fetch a worksheet and print its first rows
    Show {
        /// Spreadsheet url, used when no --sid is given
        #[clap(long)]
        url: Option<String>,
        #[clap(long)]
        sid: Option<String>,
        /// Worksheet title; wins over --wid
        #[clap(long)]
        worksheet: Option<String>,
        #[clap(long, default_value_t = 0)]
        wid: usize,
        /// Service-account key file
        #[clap(long)]
        key: Option<PathBuf>,
        #[clap(long, default_value_t = 20)]
        rows: usize,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}
