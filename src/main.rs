use clap::{Parser, Subcommand, builder::styling};
use eyre::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use urban_mobility_etl::{Source, cli};

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Urban Mobility ETL: load taxi, ride-hail and transit data into one store
#[derive(Parser)]
#[command(name = "umetl", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source database settings from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline over three NDJSON source files
    Run {
        /// NDJSON file of taxi trips
        #[arg(long)]
        trips: PathBuf,

        /// NDJSON file of ride-hail travel times
        #[arg(long)]
        travel_times: PathBuf,

        /// NDJSON file of transit stop events
        #[arg(long)]
        transit: PathBuf,

        /// SQL schema script to apply before loading
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Transform one NDJSON file without touching the database
    Transform {
        /// Source kind: taxi, uber or transit
        source: Source,

        /// NDJSON file to read
        input: PathBuf,

        /// NDJSON file to write
        output: PathBuf,
    },

    /// Print a stored table as NDJSON
    Show {
        /// Table name
        table: String,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Run a read query with positional parameters (? or %s)
    Query {
        /// SQL query text
        sql: String,

        /// Parameter values, bound in order
        params: Vec<String>,
    },

    /// Execute a SQL schema script
    InitSchema {
        /// SQL file, statements separated by ';'
        #[arg(default_value = "schema.sql")]
        schema: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let dotenv = dotenvy::from_filename(&cli.env);

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    match dotenv {
        Ok(path) => log::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {
            log::debug!("No dotenv file at {}, using process environment", cli.env)
        }
        Err(e) => log::warn!("Failed to load {}: {}", cli.env.bright_black(), e),
    }

    match cli.command {
        Commands::Run {
            trips,
            travel_times,
            transit,
            schema,
        } => {
            let database = cli::open_database();
            if let Some(schema) = schema {
                log::info!("Applying schema {}", schema.display().bright_black());
                database.initialize_schema(&schema);
            }

            let results = cli::run_pipeline(&database, trips, travel_times, transit);
            for (source, ok) in results.iter() {
                match ok {
                    true => println!("{} {}", "✓".green(), source.label()),
                    false => println!("{} {}", "✗".red(), source.label()),
                }
            }

            let cached = database.memory_tables();
            if !cached.is_empty() {
                log::warn!(
                    "Held in memory only: {}",
                    cached.join(", ").yellow()
                );
            }
            database.close();

            if !results.all_succeeded() {
                eyre::bail!("One or more sources failed");
            }
        }
        Commands::Transform {
            source,
            input,
            output,
        } => {
            log::info!(
                "Transforming {} data from {}",
                source.label().cyan(),
                input.display().bright_black()
            );
            let count = cli::transform_file(source, &input, &output)?;
            log::info!("✓ Wrote {} record(s) to {}", count, output.display());
        }
        Commands::Show { table, limit } => {
            let database = cli::open_database();
            print!("{}", cli::show_table(&database, &table, limit)?);
        }
        Commands::Query { sql, params } => {
            let database = cli::open_database();
            print!("{}", cli::run_query(&database, &sql, &params)?);
        }
        Commands::InitSchema { schema } => {
            let database = cli::open_database();
            cli::init_schema(&database, &schema)?;
            log::info!("✓ Schema applied from {}", schema.display());
        }
    }

    Ok(())
}
