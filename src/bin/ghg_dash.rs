use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use ghg_dashboard::config::ConfigLoader;
use ghg_dashboard::dashboard::{
    Dashboard, load_catalogue, load_defaults_document, load_labels,
};
use ghg_dashboard::defaults::resolve_defaults;
use ghg_dashboard::domain::SourceKey;
use ghg_dashboard::error::DashError;
use ghg_dashboard::output::{IndexSummary, JsonOutput, SnapshotSummary};
use ghg_dashboard::remote::HttpRemoteClient;

#[derive(Parser)]
#[command(name = "ghg-dash")]
#[command(about = "Inspect a greenhouse-gas measurement catalogue and its cached series")]
#[command(version)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Path to ghg-dashboard.json (defaults to the current directory)"
    )]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Summarize the indexed catalogue")]
    Index,
    #[command(about = "Open a session, apply selections and print what would be rendered")]
    Show(ShowArgs),
    #[command(about = "List map markers for a species")]
    Sites(SitesArgs),
}

#[derive(Args)]
struct ShowArgs {
    #[arg(long)]
    species: Option<String>,

    #[arg(long = "toggle", help = "Source key to toggle, e.g. co2.DECC_TAC_185m_picarro")]
    toggle: Vec<String>,

    #[arg(long)]
    clear: bool,
}

#[derive(Args)]
struct SitesArgs {
    #[arg(long)]
    species: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<DashError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DashError) -> u8 {
    match error {
        DashError::MissingConfig
        | DashError::InvalidSourceKey(_)
        | DashError::InvalidComponent { .. } => 2,
        DashError::CatalogueLoad(_) => 3,
        error if error.is_fetch_failure() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let client = HttpRemoteClient::new()?;

    match cli.command {
        Command::Index => {
            let catalogue = load_catalogue(&config, &client)?;
            let labels = load_labels(&config, &client);
            let summary = IndexSummary::new(&catalogue, &labels);
            JsonOutput::print_index(&summary).into_diagnostic()
        }
        Command::Show(args) => {
            let mut dashboard = Dashboard::load(&config, client)?;
            if let Some(species) = &args.species {
                dashboard.change_species(species);
            }
            if args.clear {
                dashboard.clear();
            }
            let keys = args
                .toggle
                .iter()
                .map(|key| key.parse::<SourceKey>())
                .collect::<Result<Vec<_>, DashError>>()?;
            dashboard.toggle(&keys);
            dashboard.settle();

            let snapshot = dashboard.snapshot();
            JsonOutput::print_snapshot(&SnapshotSummary::from(&snapshot)).into_diagnostic()
        }
        Command::Sites(args) => {
            let catalogue = load_catalogue(&config, &client)?;
            let species = match args.species {
                Some(species) => Some(species),
                None => {
                    let document = load_defaults_document(&config, &client);
                    resolve_defaults(&catalogue, config.default_policy, document.as_ref())
                        .map(|defaults| defaults.species)
                }
            };
            let markers = species
                .map(|species| catalogue.site_markers(&species))
                .unwrap_or_default();
            JsonOutput::print_markers(&markers).into_diagnostic()
        }
    }
}
