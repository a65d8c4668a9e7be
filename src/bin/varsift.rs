//! varsift CLI
//!
//! Command-line interface for filtering variant tables.

use clap::{Args, Parser, Subcommand};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use varsift::{
    FilterCategory, FilterConfig, FilteredView, Role, Session, VarSiftConfig, VariantType,
};

#[derive(Parser)]
#[command(name = "varsift")]
#[command(version = "1.0.0")]
#[command(about = "Filter tab-delimited variant tables by type, inheritance, cohort and region")]
#[command(long_about = r#"
varsift: in-memory variant table filtering

Input: one header line, then one row per variant.
  annotation columns ... | sample genotype, score, depth | next sample ...

Every enabled filter category is intersected; selected variant types are unioned.
"#)]
struct Cli {
    /// JSON file overriding header markers, column names and thresholds
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show table shape and sample roles
    Info {
        /// Input table
        input: PathBuf,
    },

    /// Filter rows and print the included ones
    Filter {
        /// Input table
        input: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,

        /// Output format: table, tsv, json
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Limit output rows
        #[arg(short, long)]
        limit: Option<usize>,

        /// Also write the included rows (with samples) to this file
        #[arg(short, long)]
        write: Option<PathBuf>,
    },

    /// Show per-sample genotypes of one row
    Samples {
        /// Input table
        input: PathBuf,

        /// Row number among the included rows (0-based)
        row: usize,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Count included rows per gene
    Genes {
        /// Input table
        input: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,

        /// Output format: table, tsv, json
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Pair an anchor variant with its compound-het partners
    Pairs {
        /// Input table
        input: PathBuf,

        /// Row keys: anchor first, then partners
        #[arg(required = true)]
        keys: Vec<String>,

        /// Include every sample's genotype fields
        #[arg(short, long)]
        samples: bool,

        /// Output format: table, tsv, json
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Write the table back out unchanged
    Dump {
        /// Input table
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Variant type to include (repeatable): Stop, DIV-fs, DIV-c, Splice-site, ...
    #[arg(short = 't', long = "type")]
    types: Vec<VariantType>,

    /// Filter category to enable (repeatable): missing-known-id, case-control, ...
    #[arg(short = 'C', long = "category")]
    categories: Vec<FilterCategory>,

    /// Gene list for gene-include / gene-exclude
    #[arg(long)]
    genes: Option<PathBuf>,

    /// BED-like region file for region-include
    #[arg(long)]
    regions: Option<PathBuf>,

    /// Minimum discordant affected/normal pairs
    #[arg(long, default_value_t = 0)]
    min_pairs: usize,

    /// Minimum matching case samples
    #[arg(long, default_value_t = 0)]
    min_cases: usize,

    /// Maximum matching control samples
    #[arg(long, default_value_t = 0)]
    max_controls: usize,

    /// Case-insensitive regex on the gene column
    #[arg(short = 'g', long)]
    gene_pattern: Option<String>,

    /// Custom boolean query, e.g. 'Chr == "chr1" && LeftFlank > 1000'
    #[arg(short = 'q', long)]
    query: Option<String>,

    /// JSON filter configuration; command-line toggles are added to it
    #[arg(long)]
    filters: Option<PathBuf>,
}

impl FilterArgs {
    fn to_config(&self) -> Result<FilterConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.filters {
            Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
            None => FilterConfig::default(),
        };
        for t in &self.types {
            config = config.with_type(*t);
        }
        for c in &self.categories {
            config = config.with_category(*c);
        }
        if self.query.is_some() {
            config = config.with_category(FilterCategory::CustomQuery);
            config.custom_query = self.query.clone();
        }
        if self.genes.is_some() {
            config.gene_file = self.genes.clone();
        }
        if self.regions.is_some() {
            config.region_file = self.regions.clone();
        }
        if self.gene_pattern.is_some() {
            config.gene_pattern = self.gene_pattern.clone();
        }
        config.min_discordant_pairs = config.min_discordant_pairs.max(self.min_pairs);
        config.min_case_matches = config.min_case_matches.max(self.min_cases);
        config.max_control_matches = config.max_control_matches.max(self.max_controls);
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => VarSiftConfig::from_json_file(path)?,
        None => VarSiftConfig::default(),
    };

    match cli.command {
        Commands::Info { input } => {
            show_info(&input, &config)?;
        }
        Commands::Filter {
            input,
            filters,
            format,
            limit,
            write,
        } => {
            filter_file(&input, &config, &filters, &format, limit, write)?;
        }
        Commands::Samples {
            input,
            row,
            filters,
        } => {
            show_samples(&input, &config, &filters, row)?;
        }
        Commands::Genes {
            input,
            filters,
            format,
        } => {
            let session = filtered_session(&input, &config, &filters)?;
            print_view(&session.gene_summary(session.root())?, &format, None)?;
        }
        Commands::Pairs {
            input,
            keys,
            samples,
            format,
        } => {
            let session = Session::open(&input, &config)?;
            print_view(&session.pairing(session.root(), keys.as_slice(), samples)?, &format, None)?;
        }
        Commands::Dump { input, output } => {
            dump_file(&input, &config, output)?;
        }
    }

    Ok(())
}

fn filtered_session(
    input: &Path,
    config: &VarSiftConfig,
    filters: &FilterArgs,
) -> Result<Session, Box<dyn std::error::Error>> {
    let mut session = Session::open(input, config)?;
    let root = session.root();
    session.apply_filters(root, &filters.to_config()?)?;
    Ok(session)
}

fn show_info(input: &Path, config: &VarSiftConfig) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let session = Session::open(input, config)?;
    let elapsed = start.elapsed();
    let root = session.root();
    let store = session.store(root)?;

    println!("varsift table info");
    println!("==================");
    println!("Input:      {}", input.display());
    println!("Rows:       {}", store.row_count());
    println!("Columns:    {}", store.catalog().len());
    println!("Samples:    {}", store.roster().len());
    println!("Load time:  {:.2}ms", elapsed.as_secs_f64() * 1000.0);
    println!();
    println!("Sample roles:");
    println!(
        "  affected/normal pairs: {}",
        session.count_role(root, Role::AffectedNormalPair)?
    );
    println!("  cases:                 {}", session.count_role(root, Role::Case)?);
    println!("  controls:              {}", session.count_role(root, Role::Control)?);
    println!();
    println!("Columns:");
    for (i, name) in store.catalog().names().iter().enumerate() {
        let editable = if store.catalog().is_editable(i) {
            " (editable)"
        } else {
            ""
        };
        println!("  {:3} {}{}", i, name, editable);
    }
    Ok(())
}

fn filter_file(
    input: &Path,
    config: &VarSiftConfig,
    filters: &FilterArgs,
    format: &str,
    limit: Option<usize>,
    write: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut session = filtered_session(input, config, filters)?;
    let elapsed = start.elapsed();
    let root = session.root();

    print_view(&session.filtered_rows(root)?, format, limit)?;

    if let Some(path) = write {
        let child = session.subset(root, None)?;
        let mut writer = BufWriter::new(File::create(&path)?);
        session.store(child)?.write_tsv(&mut writer)?;
        writer.flush()?;
        eprintln!(
            "Wrote {} rows to {}",
            session.store(child)?.row_count(),
            path.display()
        );
    }

    eprintln!(
        "{}/{} rows included ({:.2}ms)",
        session.visible_count(root)?,
        session.store(root)?.row_count(),
        elapsed.as_secs_f64() * 1000.0
    );
    Ok(())
}

fn show_samples(
    input: &Path,
    config: &VarSiftConfig,
    filters: &FilterArgs,
    row: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = filtered_session(input, config, filters)?;
    let detail = session.sample_detail(session.root(), row)?;
    if detail.is_empty() {
        println!("(no rows included)");
        return Ok(());
    }
    println!("{:20} {:10} {:8} {:8}", "Sample", "Genotype", "Score", "Depth");
    println!("{}", "-".repeat(50));
    for sample in detail {
        println!(
            "{:20} {:10} {:8} {:8}",
            sample.name, sample.genotype.call, sample.genotype.score, sample.genotype.depth
        );
    }
    Ok(())
}

fn dump_file(
    input: &Path,
    config: &VarSiftConfig,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(input, config)?;
    let store = session.store(session.root())?;
    match output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            store.write_tsv(&mut writer)?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            store.write_tsv(&mut lock)?;
        }
    }
    Ok(())
}

fn print_view(
    view: &FilteredView,
    format: &str,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let shown = limit.unwrap_or(view.rows.len()).min(view.rows.len());
    let rows = &view.rows[..shown];

    match format {
        "tsv" => {
            println!("{}", view.header.join("\t"));
            for row in rows {
                println!("{}", row.join("\t"));
            }
        }
        "json" => {
            let limited = FilteredView {
                header: view.header.clone(),
                rows: rows.to_vec(),
            };
            println!("{}", serde_json::to_string_pretty(&limited)?);
        }
        _ => {
            // Table format
            println!("{}", view.header.join("\t"));
            println!("{}", "-".repeat(view.header.len() * 12));
            for row in rows {
                println!("{}", row.join("\t"));
            }
            println!();
            println!("({} rows)", view.rows.len());
        }
    }
    Ok(())
}
