use std::fs;
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use charcoal_rs::config::ClassifierConfig;
use charcoal_rs::fasta::{create_fasta_sink, read_fasta_records};
use charcoal_rs::refdb::SketchIndex;
use charcoal_rs::sketch_io::{load_genome_sketch, load_reference_index};
use charcoal_rs::taxdb::{parse_lineage_csv, parse_provided_lineages};
use charcoal_rs::taxonomy::{Lineage, Rank};
use charcoal_rs::{build_hit_list_from_files, classify_genome, partition_contigs};

type CliResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "charcoal-rs")]
#[command(version)]
#[command(about = "Find and remove taxonomically foreign contigs from genome assemblies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one genome's contigs and split them into clean and dirty FASTA
    Clean(CleanArgs),

    /// Rank many genomes by contamination
    Hitlist(HitlistArgs),
}

#[derive(Args)]
struct SharedArgs {
    /// Reference sketches (JSON, optionally .gz)
    #[arg(long)]
    references: PathBuf,

    /// Lineage spreadsheet for the references
    #[arg(long)]
    lineages: PathBuf,

    /// Headerless `genome,superkingdom,phylum,...` spreadsheet
    #[arg(long)]
    provided_lineages: Option<PathBuf>,

    /// Classifier thresholds (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rank at which contigs must agree with the genome
    #[arg(long)]
    match_rank: Option<Rank>,
}

#[derive(Args)]
struct CleanArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// Genome FASTA (optionally .gz)
    #[arg(long)]
    genome: PathBuf,

    /// Per-contig sketch for the genome (JSON, optionally .gz)
    #[arg(long)]
    genome_sketch: PathBuf,

    /// Clean contigs output; gzip when ending in .gz
    #[arg(long)]
    clean: PathBuf,

    /// Dirty contigs output; gzip when ending in .gz
    #[arg(long)]
    dirty: PathBuf,

    /// Contig report CSV
    #[arg(long)]
    report: PathBuf,

    /// Genome summary CSV
    #[arg(long)]
    summary: PathBuf,

    /// Per-reference match listing (JSON)
    #[arg(long)]
    matches_json: Option<PathBuf>,

    /// Contig decisions (JSON)
    #[arg(long)]
    contigs_json: Option<PathBuf>,

    /// Pass every contig through when the genome lineage cannot be resolved
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct HitlistArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// Hit list CSV output
    #[arg(long)]
    output: PathBuf,

    /// Cross-genome contamination map (JSON)
    #[arg(long)]
    contam_json: Option<PathBuf>,

    /// Genome sketch files (JSON, optionally .gz)
    #[arg(required = true)]
    genomes: Vec<PathBuf>,
}

fn spinner(color: &str, message: &str) -> CliResult<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template(&format!("{{spinner:.{}}} {{msg}}", color))?,
    );
    spinner.set_message(message.to_string());
    Ok(spinner)
}

fn load_config(shared: &SharedArgs, force: bool) -> CliResult<ClassifierConfig> {
    let mut config = match &shared.config {
        Some(path) => ClassifierConfig::from_json_file(path)?,
        None => ClassifierConfig::default(),
    };
    if let Some(rank) = shared.match_rank {
        config.match_rank = rank;
    }
    config.force |= force;
    config.validate()?;
    Ok(config)
}

fn load_references(shared: &SharedArgs, config: &ClassifierConfig) -> CliResult<(SketchIndex, AHashMap<String, Lineage>)> {
    let sp = spinner("blue", "Loading reference sketches...")?;
    let lineages = parse_lineage_csv(&shared.lineages)?;
    let index = load_reference_index(&shared.references, lineages)?;
    let provided = match &shared.provided_lineages {
        Some(path) => parse_provided_lineages(path)?,
        None => AHashMap::new(),
    };
    sp.finish_with_message(format!(
        "Loaded {} references (match rank {}).",
        index.len(),
        config.match_rank
    ));
    Ok((index, provided))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn run_clean(args: CleanArgs) -> CliResult<()> {
    let config = load_config(&args.shared, args.force)?;
    let (index, provided) = load_references(&args.shared, &config)?;

    let sp = spinner("green", "Classifying contigs...")?;
    let genome = load_genome_sketch(&args.genome_sketch)?;
    let provided_lineage = provided
        .get(&genome.name)
        .or_else(|| provided.get(&file_name(&args.genome)));
    let report = classify_genome(&genome, &index, provided_lineage, &config)?;
    match &report.resolution.comment {
        Some(comment) if !report.is_resolved() => sp.finish_with_message(format!("Unresolved: {}", comment)),
        _ => sp.finish_with_message(format!(
            "{} clean, {} dirty, {} no_hash, {} no_ident contigs.",
            report.stats.n_clean, report.stats.n_dirty, report.stats.n_no_hash, report.stats.n_no_ident
        )),
    }

    let sp = spinner("yellow", "Writing output files...")?;
    let records = read_fasta_records(&args.genome)?;
    let mut clean = create_fasta_sink(&args.clean)?;
    let mut dirty = create_fasta_sink(&args.dirty)?;
    let written = partition_contigs(&report, &records, clean.as_mut(), dirty.as_mut(), config.force)?;

    fs::write(&args.report, report.get_contig_report()?)?;
    fs::write(&args.summary, report.get_genome_summary()?)?;
    if let Some(path) = &args.contigs_json {
        fs::write(path, report.get_contig_report_json()?)?;
    }
    if let Some(path) = &args.matches_json {
        // empty file for an unresolved genome
        let text = match report.match_report(&config) {
            Some(listing) => listing.to_json()?,
            None => String::new(),
        };
        fs::write(path, text)?;
    }
    sp.finish_with_message(format!(
        "Wrote {} clean bp to {}, {} dirty bp to {}.",
        written.clean_bp,
        args.clean.display(),
        written.dirty_bp,
        args.dirty.display()
    ));
    Ok(())
}

fn run_hitlist(args: HitlistArgs) -> CliResult<()> {
    let config = load_config(&args.shared, false)?;
    let (index, provided) = load_references(&args.shared, &config)?;

    let sp = spinner("green", &format!("Examining {} genomes...", args.genomes.len()))?;
    let batch = build_hit_list_from_files(&args.genomes, &index, &provided, &config);
    sp.finish_with_message(format!("Examined {} genomes.", batch.hit_list.len()));

    let sp = spinner("yellow", "Writing output files...")?;
    fs::write(&args.output, batch.hit_list.to_csv()?)?;
    if let Some(path) = &args.contam_json {
        fs::write(path, batch.contamination.to_json()?)?;
    }
    sp.finish_with_message("Output files created.");
    Ok(())
}

fn main() -> CliResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Clean(args) => run_clean(args),
        Commands::Hitlist(args) => run_hitlist(args),
    }
}
