use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use hdb_resale_manager::app::{App, FetchReport, ProgressSink};
use hdb_resale_manager::assistant::{AssistantClient, OpenAiHttpClient};
use hdb_resale_manager::config::{ConfigLoader, ResolvedConfig};
use hdb_resale_manager::datagov::DataGovHttpClient;
use hdb_resale_manager::eligibility::{self, Applicant, Citizenship, FamilyNucleus};
use hdb_resale_manager::error::ResaleError;
use hdb_resale_manager::filter::{self, DatasetBounds, FilterParams};
use hdb_resale_manager::output::{JsonOutput, TextProgress};
use hdb_resale_manager::stats;
use hdb_resale_manager::store::CacheStore;

#[derive(Parser)]
#[command(name = "hdb-rm")]
#[command(about = "HDB resale transactions data manager (data.gov.sg fetch, cache and query)")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    /// Suppress progress output; print results only.
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Manage the resale transactions dataset")]
    Data(DataArgs),
    #[command(about = "Check BTO eligibility")]
    Check(CheckArgs),
    #[command(about = "Ask the HDB assistant a question")]
    Ask(AskArgs),
}

#[derive(Args)]
struct DataArgs {
    #[command(subcommand)]
    command: Option<DataCommand>,
}

#[derive(Subcommand)]
enum DataCommand {
    #[command(about = "Load the dataset, fetching from data.gov.sg on a cache miss")]
    Fetch,
    #[command(about = "Fetch the latest dataset and overwrite the cache")]
    Refresh,
    #[command(about = "Show cache presence and freshness")]
    Info,
    #[command(about = "Average resale prices by town, flat type and year")]
    Summary(SummaryArgs),
}

#[derive(Args, Clone)]
struct SummaryArgs {
    #[arg(long)]
    town: Vec<String>,

    #[arg(long)]
    flat_type: Vec<String>,

    #[arg(long)]
    year_from: Option<i32>,

    #[arg(long)]
    year_to: Option<i32>,
}

#[derive(Args)]
struct CheckArgs {
    #[arg(long, value_enum)]
    citizenship: Citizenship,

    #[arg(long)]
    age: u32,

    #[arg(long, value_enum)]
    family_nucleus: FamilyNucleus,

    /// Average gross monthly household income, SGD.
    #[arg(long)]
    income: u32,

    #[arg(long)]
    owns_property: bool,

    #[arg(long)]
    disposed_property: bool,
}

#[derive(Args)]
struct AskArgs {
    question: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(resale) = report.downcast_ref::<ResaleError>() {
            return ExitCode::from(map_exit_code(resale));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ResaleError) -> u8 {
    match error {
        ResaleError::ConfigRead(_) | ResaleError::ConfigParse(_) => 2,
        ResaleError::DataGovHttp(_)
        | ResaleError::DataGovStatus { .. }
        | ResaleError::DownloadTimeout { .. }
        | ResaleError::Assistant(_) => 3,
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
    let sink: &dyn ProgressSink = if cli.quiet { &JsonOutput } else { &TextProgress };

    match cli.command {
        Commands::Data(args) => run_data(args, &config, sink),
        Commands::Check(args) => run_check(args),
        Commands::Ask(args) => run_ask(args, &config),
    }
}

fn run_data(args: DataArgs, config: &ResolvedConfig, sink: &dyn ProgressSink) -> miette::Result<()> {
    let command = args.command.unwrap_or(DataCommand::Fetch);
    let app = build_app(config)?;

    match command {
        DataCommand::Fetch => {
            let report = app.get_dataset(sink)?;
            JsonOutput::print(&report.summary()).into_diagnostic()
        }
        DataCommand::Refresh => {
            let report = app.refresh_dataset(sink)?;
            JsonOutput::print(&report.summary()).into_diagnostic()
        }
        DataCommand::Info => {
            let store = app.store();
            let info = InfoResult {
                cached: store.exists(),
                archive_path: store.archive_path().to_string(),
                last_updated: store
                    .exists()
                    .then(|| store.last_modified().ok().map(|stamp| stamp.to_rfc3339()))
                    .flatten(),
            };
            JsonOutput::print(&info).into_diagnostic()
        }
        DataCommand::Summary(summary_args) => {
            let report = app.get_dataset(sink)?;
            run_summary(summary_args, &report)
        }
    }
}

fn run_summary(args: SummaryArgs, report: &FetchReport) -> miette::Result<()> {
    let params = FilterParams {
        towns: args.town,
        flat_types: args.flat_type,
        year_range: match (args.year_from, args.year_to) {
            (None, None) => None,
            (from, to) => Some((from.unwrap_or(i32::MIN), to.unwrap_or(i32::MAX))),
        },
        ..FilterParams::default()
    };
    let filtered = filter::apply(&report.dataset, &params);
    let summary = SummaryResult {
        records: filtered.len(),
        bounds: DatasetBounds::of(&filtered),
        by_town: stats::average_price_by_town(&filtered),
        by_flat_type: stats::average_price_by_flat_type(&filtered),
        by_year: stats::average_price_by_year(&filtered),
    };
    JsonOutput::print(&summary).into_diagnostic()
}

fn run_check(args: CheckArgs) -> miette::Result<()> {
    let applicant = Applicant {
        citizenship: args.citizenship,
        age: args.age,
        family_nucleus: args.family_nucleus,
        monthly_household_income: args.income,
        owns_other_property: args.owns_property,
        disposed_private_property: args.disposed_property,
    };
    let report = eligibility::check(&applicant);
    JsonOutput::print(&report).into_diagnostic()
}

fn run_ask(args: AskArgs, config: &ResolvedConfig) -> miette::Result<()> {
    let client = OpenAiHttpClient::new(
        config.assistant_base_url.clone(),
        config.assistant_model.clone(),
    )?;
    let answer = client.answer(&args.question, &[])?;
    JsonOutput::print(&AnswerResult { answer }).into_diagnostic()
}

fn build_app(config: &ResolvedConfig) -> miette::Result<App<DataGovHttpClient>> {
    let client = DataGovHttpClient::new(config.poll, config.request_timeout)?;
    let store = CacheStore::new(config.cache_path.clone());
    Ok(App::new(store, client, config.collection_id))
}

#[derive(serde::Serialize)]
struct InfoResult {
    cached: bool,
    archive_path: String,
    last_updated: Option<String>,
}

#[derive(serde::Serialize)]
struct SummaryResult {
    records: usize,
    bounds: Option<DatasetBounds>,
    by_town: Vec<stats::AveragePrice>,
    by_flat_type: Vec<stats::AveragePrice>,
    by_year: Vec<stats::YearAverage>,
}

#[derive(serde::Serialize)]
struct AnswerResult {
    answer: String,
}
