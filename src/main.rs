//! Sampling benchmark CLI

use aqp_bench::bench::{BenchConfig, BenchmarkRunner, Method, ScheduleKind};
use aqp_bench::schema::{parse_ddl, TableSchema};
use aqp_bench::source::{FileSource, FileSourceOptions, MemorySource, RecordSource};
use aqp_bench::store::{MemoryStore, TableStore};
use aqp_bench::tpch::{self, LineitemGenerator};
use aqp_bench::{BenchError, Materializer, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "aqp_bench")]
#[command(about = "Benchmark sampling strategies for approximate aggregate queries")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a lineitem .tbl file
    Generate {
        /// Scale factor (0.01 = 60k rows, 1 = 6M rows)
        #[arg(short, long, default_value = "0.01")]
        sf: f64,

        /// Output file
        #[arg(short, long, default_value = "data/lineitem.tbl")]
        output: PathBuf,

        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Run the benchmark and report time and error per method
    Run {
        #[command(flatten)]
        input: InputArgs,

        /// JSON configuration file; command-line flags override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Methods to run (comma separated)
        #[arg(short, long, value_enum, value_delimiter = ',')]
        methods: Vec<Method>,

        /// Queries to run (comma separated): avg, count, sum, min, max
        #[arg(short, long, value_delimiter = ',', default_value = "avg")]
        queries: Vec<String>,

        /// Number of trials per method
        #[arg(short, long)]
        trials: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        /// Share of the table each sampling method loads
        #[arg(short, long)]
        fraction: Option<f64>,

        /// Run parallel scans on worker threads
        #[arg(long)]
        threads: bool,

        /// Directory for per-table ledgers, statistics and resume offsets
        #[arg(long)]
        ledger_dir: Option<PathBuf>,

        /// Start each contiguous load where the previous one ended
        #[arg(long)]
        resume: bool,

        /// Write the method → (times, errors) series as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load a table with one method and run a SQL query on the result
    Sql {
        /// SQL query string
        query: String,

        #[command(flatten)]
        input: InputArgs,

        #[arg(short, long, value_enum, default_value = "reference")]
        method: Method,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// Directory holding the metadata method's offset ledgers
        #[arg(long)]
        ledger_dir: Option<PathBuf>,
    },

    /// Parse a schema file and list its tables
    Schema {
        /// File with CREATE TABLE statements
        path: PathBuf,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Delimited table file; a generated lineitem table is used when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Schema file with the input's CREATE TABLE statement (default: lineitem)
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Rows of generated lineitem data when no input file is given
    #[arg(long, default_value = "60000")]
    rows: usize,

    /// Field delimiter of the input file
    #[arg(long, default_value = "|")]
    delimiter: char,

    /// The input file starts with a header line
    #[arg(long)]
    header: bool,

    /// Read the whole input file into memory before benchmarking
    #[arg(long)]
    preload: bool,
}

impl InputArgs {
    fn open(&self) -> Result<Arc<dyn RecordSource>> {
        let Some(path) = &self.input else {
            let start = Instant::now();
            let source = LineitemGenerator::new().generate_source(self.rows);
            println!("Generated {} lineitem rows in {:?}", self.rows, start.elapsed());
            return Ok(Arc::new(source));
        };

        let schema = match &self.schema {
            Some(ddl) => schema_for(path, ddl)?,
            None => tpch::lineitem_schema(),
        };
        if !self.delimiter.is_ascii() {
            return Err(BenchError::InvalidArgument(format!(
                "delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            )));
        }
        let options = FileSourceOptions {
            delimiter: self.delimiter as u8,
            has_header: self.header,
        };
        let start = Instant::now();
        let source = FileSource::open_with_options(path, schema, options)?;
        println!(
            "Indexed {} rows of {} in {:?}",
            source.len(),
            source.path().display(),
            start.elapsed()
        );
        if self.preload {
            let start = Instant::now();
            let memory = MemorySource::try_from_source(&source)?;
            println!("Preloaded {} rows in {:?}", memory.len(), start.elapsed());
            return Ok(Arc::new(memory));
        }
        Ok(Arc::new(source))
    }
}

/// Pick the table named like the data file (`lineitem.tbl` → `lineitem`)
fn schema_for(data: &Path, ddl: &Path) -> Result<TableSchema> {
    let tables = parse_ddl(&std::fs::read_to_string(ddl)?)?;
    let stem = data
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    tables
        .into_iter()
        .find(|t| t.name.eq_ignore_ascii_case(&stem))
        .ok_or(BenchError::TableNotFound(stem))
}

fn main() {
    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Generate { sf, output, seed } => {
            let rows = tpch::lineitem_rows(sf);
            println!("Generating {} lineitem rows (scale factor {})", rows, sf);
            let start = Instant::now();
            LineitemGenerator::with_seed(seed).write_tbl(&output, rows)?;
            println!("Wrote {} in {:?}", output.display(), start.elapsed());
        }

        Commands::Run {
            input,
            config,
            methods,
            queries,
            trials,
            seed,
            fraction,
            threads,
            ledger_dir,
            resume,
            output,
        } => {
            let mut config = match config {
                Some(path) => BenchConfig::from_json_file(path)?,
                None => BenchConfig::default(),
            };
            if !methods.is_empty() {
                config.methods = methods;
            }
            if let Some(trials) = trials {
                config.trials = trials;
            }
            if let Some(seed) = seed {
                config.seed = seed;
            }
            if let Some(fraction) = fraction {
                config.sample_fraction = fraction;
            }
            if threads {
                config.schedule = ScheduleKind::Threads;
            }
            if ledger_dir.is_some() {
                config.ledger_dir = ledger_dir;
            }
            if resume {
                config.resume_contiguous = true;
            }

            let names: Vec<&str> = queries.iter().map(String::as_str).collect();
            let mut runner = BenchmarkRunner::new(config)?;
            runner.add_table(input.open()?)?;
            for query in tpch::bench_queries(&names)? {
                runner.add_query(query);
            }

            let start = Instant::now();
            let report = runner.run()?;
            println!("\nBenchmark finished in {:?}\n", start.elapsed());
            print!("{}", report);

            if let Some(path) = output {
                let json = serde_json::to_string_pretty(&report.series())?;
                std::fs::write(&path, json)?;
                println!("\nSeries written to {}", path.display());
            }
        }

        Commands::Sql {
            query,
            input,
            method,
            seed,
            ledger_dir,
        } => {
            let source = input.open()?;
            let config = BenchConfig {
                ledger_dir,
                ..BenchConfig::default()
            };
            let mut runner = BenchmarkRunner::new(config)?;
            runner.add_table(source.clone())?;
            let plan = runner.plan(method, source.as_ref())?;

            let start = Instant::now();
            let mut rng = StdRng::seed_from_u64(seed);
            let sample = plan.run(source.as_ref(), &mut rng)?;
            let mut store = MemoryStore::new();
            store.create_table(source.schema())?;
            Materializer::load(
                &mut store,
                source.schema(),
                sample.records(),
                runner.config().load_chunk_size,
            )?;
            let rows = store.execute_query(&query)?;
            let elapsed = start.elapsed();

            let batch = rows.to_record_batch()?;
            println!("{}", arrow::util::pretty::pretty_format_batches(&[batch])?);
            println!(
                "\n{} row(s) from a {} sample of {} rows in {:?}",
                rows.num_rows(),
                method,
                sample.len(),
                elapsed
            );
        }

        Commands::Schema { path } => {
            let tables = parse_ddl(&std::fs::read_to_string(&path)?)?;
            for table in tables {
                println!("{}", table.name);
                for column in &table.columns {
                    println!("  {:<20} {:?}", column.name, column.kind);
                }
            }
        }
    }
    Ok(())
}
