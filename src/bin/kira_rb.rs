use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_reference_builder::config::{ConfigLoader, ResolvedConfig};
use kira_reference_builder::dispatch::{BuildDispatcher, BuildOutcome, BuildRequest, BuildStatus};
use kira_reference_builder::domain::{BuildTarget, EntityKind, InputKind};
use kira_reference_builder::error::KiraError;
use kira_reference_builder::output::{ConsoleProgress, JsonOutput, OutputMode};
use kira_reference_builder::parser::DefaultParsers;
use kira_reference_builder::registry::AdaptorRegistry;
use kira_reference_builder::store::JsonStore;
use kira_reference_builder::tool::SystemToolRunner;

#[derive(Parser)]
#[command(name = "kira-rb")]
#[command(about = "Build normalized genomic reference datasets and query them per species")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Transform one source dataset into JSON collections")]
    Build(BuildArgs),
    #[command(about = "List build targets and their inputs")]
    Targets,
    #[command(about = "List configured species")]
    Species,
    #[command(about = "Load a build output directory into the store")]
    Load(LoadArgs),
    #[command(about = "Query a loaded collection")]
    Query(QueryArgs),
}

#[derive(Args)]
struct BuildArgs {
    #[arg(long)]
    target: String,

    #[arg(long, short)]
    input: Option<PathBuf>,

    #[arg(long, short)]
    output: PathBuf,

    #[arg(long, short)]
    species: Option<String>,

    #[arg(long, short)]
    assembly: Option<String>,

    #[arg(long)]
    reference_genome_file: Option<PathBuf>,
}

#[derive(Args)]
struct LoadArgs {
    #[arg(long)]
    from: PathBuf,

    #[arg(long, short)]
    species: String,

    #[arg(long, short)]
    assembly: Option<String>,
}

#[derive(Args)]
struct QueryArgs {
    #[arg(long, short)]
    species: String,

    #[arg(long, short)]
    assembly: Option<String>,

    #[arg(long, short)]
    entity: EntityKind,

    #[arg(long)]
    id: Option<String>,

    #[arg(long)]
    limit: Option<usize>,

    #[arg(long)]
    count: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(kira) = report.downcast_ref::<KiraError>() {
                return ExitCode::from(map_exit_code(kira));
            }
            ExitCode::from(1)
        }
    }
}

// parse and tool launch failures never surface as errors here; `run_build` maps them to 3
fn map_exit_code(error: &KiraError) -> u8 {
    if error.is_configuration() { 2 } else { 1 }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    match cli.command {
        Commands::Targets => {
            print_targets();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Species => {
            let config = ConfigLoader::resolve(cli.config.as_deref())?;
            print_species(&config, output_mode).into_diagnostic()?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Build(args) => {
            let config = ConfigLoader::resolve(cli.config.as_deref())?;
            run_build(args, config, output_mode)
        }
        Commands::Load(args) => {
            let config = ConfigLoader::resolve(cli.config.as_deref())?;
            run_load(args, config, output_mode)
        }
        Commands::Query(args) => {
            let config = ConfigLoader::resolve(cli.config.as_deref())?;
            run_query(args, config)
        }
    }
}

fn run_build(
    args: BuildArgs,
    config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<ExitCode> {
    let fail_on_parse_error = config.fail_on_parse_error;
    let dispatcher = BuildDispatcher::new(config, SystemToolRunner::new(), DefaultParsers);
    let request = BuildRequest {
        target: args.target,
        input: args.input,
        output: args.output,
        species: args.species,
        assembly: args.assembly,
        reference_genome_file: args.reference_genome_file,
    };

    let outcome = match output_mode {
        OutputMode::Json => {
            let outcome = dispatcher.execute(&request, &JsonOutput)?;
            JsonOutput::print_outcome(&outcome).into_diagnostic()?;
            outcome
        }
        OutputMode::Human => {
            let outcome = dispatcher.execute(&request, &ConsoleProgress)?;
            print_build_summary(&outcome);
            outcome
        }
    };

    if fail_on_parse_error && outcome.has_failures() {
        return Ok(ExitCode::from(3));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_load(
    args: LoadArgs,
    config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<ExitCode> {
    let store = config
        .store
        .as_ref()
        .ok_or_else(|| KiraError::ConfigParse("no \"store\" section configured".to_string()))?;
    let (_, key) = config
        .catalog
        .adaptor_key(&args.species, args.assembly.as_deref())
        .ok_or_else(|| KiraError::UnknownSpecies(args.species.clone()))?;

    let collections = JsonStore::load(&args.from, &store.root, &key)?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_json(&collections).into_diagnostic()?,
        OutputMode::Human => {
            println!("loaded {} collections into {key}", collections.len());
            for name in collections {
                println!("  {name}");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_query(args: QueryArgs, config: ResolvedConfig) -> miette::Result<ExitCode> {
    let store = config
        .store
        .clone()
        .ok_or_else(|| KiraError::ConfigParse("no \"store\" section configured".to_string()))?;
    let mut registry = AdaptorRegistry::new(config.catalog.clone(), JsonStore::new());
    registry.set_configuration(store);
    registry.open(&args.species, args.assembly.as_deref())?;

    let adaptor = registry.resolve(args.entity, &args.species, args.assembly.as_deref())?;
    let result = if args.count {
        serde_json::json!({ "count": adaptor.count()? })
    } else if let Some(id) = &args.id {
        serde_json::Value::Array(adaptor.get_by_id(id)?)
    } else {
        serde_json::Value::Array(adaptor.get_all(args.limit)?)
    };
    JsonOutput::print_json(&result).into_diagnostic()?;

    registry.close();
    Ok(ExitCode::SUCCESS)
}

fn print_build_summary(outcome: &BuildOutcome) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    match &outcome.status {
        BuildStatus::Completed => {
            println!("{green}✅ {} built into {}{reset}", outcome.target, outcome.output)
        }
        BuildStatus::ParseFailed { message } => {
            println!("{red}❌ {} failed: {message}{reset}", outcome.target)
        }
    }
    if let Some(aux) = &outcome.auxiliary {
        if aux.succeeded {
            println!("{green}   {} ok{reset}", aux.script);
        } else {
            println!("{yellow}⚠️ {} failed, see {}{reset}", aux.script, aux.log_file);
        }
    }
}

fn print_targets() {
    for target in BuildTarget::all() {
        let spec = target.input_spec();
        let input = match spec.kind {
            InputKind::File => "file",
            InputKind::Directory => "directory",
        };
        let mandatory = spec
            .mandatory
            .iter()
            .map(|option| format!("--{option}"))
            .collect::<Vec<_>>()
            .join(" ");
        let note = if target.is_implemented() {
            ""
        } else {
            " (not implemented)"
        };
        println!("{:<22} {:<10} {mandatory}{note}", target.as_str(), input);
    }
}

fn print_species(config: &ResolvedConfig, output_mode: OutputMode) -> std::io::Result<()> {
    match output_mode {
        OutputMode::Json => JsonOutput::print_json(&config.catalog.all()),
        OutputMode::Human => {
            for sp in config.catalog.all() {
                println!(
                    "{:<12} {:<28} {:<16} {}",
                    sp.id, sp.scientific_name, sp.common_name, sp.default_assembly
                );
            }
            Ok(())
        }
    }
}
