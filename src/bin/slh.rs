use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use synleth_harmonizer::app::{App, ProgressSink, RunOptions};
use synleth_harmonizer::authority::HgncHttpClient;
use synleth_harmonizer::config::ConfigLoader;
use synleth_harmonizer::domain::N_A;
use synleth_harmonizer::error::SlError;
use synleth_harmonizer::output::{JsonOutput, OutputLayout, StderrProgress, TsvWriter};
use synleth_harmonizer::store::Store;
use synleth_harmonizer::summary::{DEFAULT_HUB_DEGREE, NetworkSummary};

#[derive(Parser)]
#[command(name = "slh")]
#[command(about = "Harmonize synthetic-lethality screen data against HGNC gene symbols")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Ingest all configured studies and write the interaction table")]
    Run(RunArgs),
    #[command(about = "Download the HGNC complete set into the cache")]
    FetchHgnc(FetchArgs),
    #[command(about = "Show the current symbol and identifiers for gene symbols")]
    Resolve(ResolveArgs),
    #[command(about = "Summarize the interaction network of a written table")]
    Summarize(SummarizeArgs),
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    config: Option<String>,

    /// Authority file, overriding the config and the cached download.
    #[arg(long)]
    hgnc: Option<PathBuf>,

    #[arg(long, short)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputLayout::Basic)]
    layout: OutputLayout,

    #[arg(long)]
    threads: Option<usize>,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct FetchArgs {
    #[arg(long)]
    force: bool,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ResolveArgs {
    #[arg(required = true)]
    symbols: Vec<String>,

    #[arg(long)]
    hgnc: Option<PathBuf>,
}

#[derive(Args)]
struct SummarizeArgs {
    path: PathBuf,

    #[arg(long, default_value_t = DEFAULT_HUB_DEGREE)]
    hub_degree: usize,

    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        return ExitCode::from(map_exit_code(&report));
    }
    ExitCode::SUCCESS
}

/// `SlError`s must reach the report through `?`, not `into_diagnostic`, or
/// they cannot be downcast here.
fn map_exit_code(report: &miette::Report) -> u8 {
    report
        .downcast_ref::<SlError>()
        .map(SlError::exit_code)
        .unwrap_or(1)
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = Store::new()?;
    let app = App::new(store, HgncHttpClient::new()?);

    match cli.command {
        Commands::Run(args) => run_harmonize(args, &app),
        Commands::FetchHgnc(args) => {
            let sink = progress_sink(args.json);
            let fetch = app.ensure_authority(args.force, sink)?;
            if args.json {
                JsonOutput::print_json(&fetch).into_diagnostic()?;
            } else {
                println!("{} ({})", fetch.path, fetch.action);
            }
            Ok(())
        }
        Commands::Resolve(args) => {
            let resolver = app.load_resolver(args.hgnc.as_deref(), &StderrProgress)?;
            for raw in &args.symbols {
                let symbol = resolver.resolve_current_symbol(raw);
                let curie = resolver.ncbigene_curie(symbol);
                let ensembl = resolver.get_ensembl_id(symbol).unwrap_or(N_A);
                println!(
                    "{raw}\t{symbol}\t{}\t{ensembl}",
                    curie.as_deref().unwrap_or(N_A)
                );
            }
            Ok(())
        }
        Commands::Summarize(args) => {
            let summary = NetworkSummary::from_tsv(&args.path, args.hub_degree)?;
            if args.json {
                JsonOutput::print_summary(&summary).into_diagnostic()?;
            } else {
                print_summary(&summary);
            }
            Ok(())
        }
    }
}

fn run_harmonize(args: RunArgs, app: &App<HgncHttpClient>) -> miette::Result<()> {
    let config = ConfigLoader::resolve(args.config.as_deref())?;
    let sink = progress_sink(args.json);

    let authority = args.hgnc.as_deref().or(config.hgnc.as_deref());
    let resolver = app.load_resolver(authority, sink)?;
    let options = RunOptions {
        threads: args.threads,
    };
    let result = app.run(&resolver, &config, &options, sink)?;

    let output = args.output.unwrap_or_else(|| config.output.clone());
    let output = Utf8PathBuf::from_path_buf(output)
        .map_err(|path| SlError::Filesystem(format!("non UTF-8 output path {}", path.display())))?;
    TsvWriter::write_records(&output, &result.records, args.layout, &resolver)?;

    if args.json {
        JsonOutput::print_run(&result).into_diagnostic()?;
    } else {
        let report = result.report();
        for study in &report.studies {
            println!(
                "{}: {} records, {} positive, {} negative, {} canonical, {} rows skipped",
                study.study_id,
                study.records,
                study.positive,
                study.negative,
                study.canonical,
                study.rows_skipped
            );
        }
        println!(
            "wrote {} records ({} positive, {} negative) to {output}",
            report.records, report.positive, report.negative
        );
    }
    Ok(())
}

fn progress_sink(json: bool) -> &'static dyn ProgressSink {
    if json { &JsonOutput } else { &StderrProgress }
}

fn print_summary(summary: &NetworkSummary) {
    println!("Total genes: {}", summary.total_genes);
    println!("Total genes in positive set: {}", summary.positive_genes);
    for hub in &summary.hubs {
        println!("{} - degree: {}", hub.gene, hub.degree);
    }
    println!("Degree distribution:");
    for (degree, genes) in &summary.degree_distribution {
        println!("Degree: {degree}, number of genes: {genes}");
    }
    println!("Total number of positive interactions: {}", summary.positive_interactions);
}
