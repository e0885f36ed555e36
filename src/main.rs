use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use mizmerge::config::Config;
use mizmerge::document::MissionDocument;
use mizmerge::pipeline;
use mizmerge::report::DocumentReport;
use mizmerge::select::{self, Candidate, SelectionError};

mod format;
mod telemetry;

use format::OutputFormat;

/// Merge flight groups between DCS missions
///
/// Copies the named flight groups (and their numbered variants) from one or
/// more donor missions into a copy of a base mission. Group and unit ids are
/// renumbered where they clash, and parking slots shared by two aircraft are
/// reported.
///
/// QUICK START:
///
///   miz-merge list
///   miz-merge merge                    # pick base and donors interactively
///   miz-merge merge --base 0 --donors 2,3
///
/// The base mission is never modified: it is copied to `output_name`
/// (from miz-merge.toml) in the missions directory and the copy is merged
/// into.
#[derive(Parser)]
#[command(name = "miz-merge")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'miz-merge <command> --help' for more information on a specific command.")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "MIZMERGE_CONFIG", default_value = "miz-merge.toml")]
    config: PathBuf,

    /// Log debug detail (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge groups from donor missions into a copy of a base mission
    Merge(MergeArgs),

    /// List the candidate missions with their selection numbers
    List {
        /// Missions directory (default: from config, then ~/Saved Games/DCS/Missions)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Show the ids, offered groups and parking use of one mission
    Inspect {
        /// The .miz file
        file: PathBuf,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Args)]
struct MergeArgs {
    /// Missions directory (default: from config, then ~/Saved Games/DCS/Missions)
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Base mission, by number or file name (prompted if omitted)
    #[arg(long)]
    base: Option<String>,

    /// Donor missions, comma separated numbers or file names (prompted if omitted)
    #[arg(long, value_delimiter = ',')]
    donors: Vec<String>,

    /// Output file name, overriding output_name from the config
    #[arg(long)]
    output: Option<String>,

    /// Report format: text or json
    #[arg(long, default_value = "text")]
    format: OutputFormat,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    let config = Config::load(&cli.config)?;
    match cli.command {
        Commands::Merge(args) => run_merge(config, args),
        Commands::List { dir } => run_list(&config, dir),
        Commands::Inspect { file, format } => run_inspect(&config, &file, format),
    }
}

fn missions_dir(config: &Config, dir: Option<PathBuf>) -> Result<PathBuf> {
    dir.or_else(|| config.resolved_missions_dir())
        .context("no missions directory: pass --dir or set missions_dir in the config")
}

fn candidates(config: &Config, dir: &Path) -> Result<Vec<Candidate>> {
    let found = select::list_candidates(dir, &config.name_filter)?;
    if found.is_empty() {
        return Err(SelectionError::NoCandidates {
            dir: dir.to_owned(),
            filter: config.name_filter.clone(),
        }
        .into());
    }
    Ok(found)
}

fn run_list(config: &Config, dir: Option<PathBuf>) -> Result<()> {
    let dir = missions_dir(config, dir)?;
    for (i, c) in candidates(config, &dir)?.iter().enumerate() {
        println!("{i:>3}  {}", c.file_name);
    }
    Ok(())
}

fn run_inspect(config: &Config, file: &Path, format: OutputFormat) -> Result<()> {
    let doc = MissionDocument::load(file, config.document_options())
        .with_context(|| format!("could not load {}", file.display()))?;
    println!("{}", format.render(&DocumentReport::from_document(&doc))?);
    Ok(())
}

fn run_merge(mut config: Config, args: MergeArgs) -> Result<()> {
    if let Some(output) = args.output {
        config.output_name = output;
        config.validate()?;
    }
    let dir = missions_dir(&config, args.dir)?;
    let candidates = candidates(&config, &dir)?;

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut prompt_out = io::stderr();

    let base = match args.base.as_deref() {
        Some(selector) => select::resolve(&candidates, selector)?,
        None => &candidates[select::prompt_base(&mut input, &mut prompt_out, &candidates)?],
    };
    let donors: Vec<PathBuf> = if args.donors.is_empty() {
        let base_index = candidates
            .iter()
            .position(|c| c.path == base.path)
            .unwrap_or(usize::MAX);
        select::prompt_donors(&mut input, &mut prompt_out, &candidates, base_index)?
            .into_iter()
            .map(|i| candidates[i].path.clone())
            .collect()
    } else {
        args.donors
            .iter()
            .map(|s| select::resolve(&candidates, s).map(|c| c.path.clone()))
            .collect::<Result<_, _>>()?
    };
    if donors.iter().all(|d| *d == base.path) {
        bail!("no donor missions selected besides the base");
    }

    let output = dir.join(&config.output_name);
    tracing::info!(
        base = %base.file_name,
        donors = donors.len(),
        output = %output.display(),
        "merging"
    );
    let report = pipeline::merge_missions(&base.path, &donors, &output, &config)?;
    println!("{}", args.format.render(&report)?);
    Ok(())
}
