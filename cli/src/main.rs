use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use jsonschema_mapper_core::{map_json_models, FieldDescriptor, MapOptions, ModelSet};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "jsonschema-mapper")]
#[command(about = "Map JSON data from one JSON Schema model onto another by field name")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Map a source document onto a target model
    Map {
        /// Source data JSON file
        source_data: PathBuf,

        /// JSON Schema describing the source data
        #[arg(long)]
        source_schema: PathBuf,

        /// JSON Schema describing the target model
        #[arg(long)]
        target_schema: PathBuf,

        /// Source model name (defaults to the source schema's root)
        #[arg(long)]
        source_model: Option<String>,

        /// Target model name (defaults to the target schema's root)
        #[arg(long)]
        target_model: Option<String>,

        /// Max elements built for one list from scattered fields
        #[arg(long, default_value_t = MapOptions::default().max_iterations)]
        max_iterations: usize,

        /// Output mapped JSON file (defaults to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the recorded mapping errors to this file as JSON
        #[arg(long)]
        errors: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,

        /// Exit with an error when only a partial mapping could be produced
        #[arg(long)]
        fail_on_partial: bool,
    },

    /// Describe how the mapper sees the fields of a model
    Describe {
        /// JSON Schema file
        schema: PathBuf,

        /// Model name (defaults to the schema's root)
        #[arg(long)]
        model: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum OutputFormat {
    Pretty,
    Compact,
}

#[derive(Serialize)]
struct ModelDescription<'a> {
    model: &'a str,
    description: Option<&'a str>,
    fields: Vec<FieldDescriptor<'a>>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for JSON
    let log_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Map {
            source_data,
            source_schema,
            target_schema,
            source_model,
            target_model,
            max_iterations,
            output,
            errors,
            format,
            fail_on_partial,
        } => {
            let source_schema = read_json(&source_schema, "source schema")?;
            let target_schema = read_json(&target_schema, "target schema")?;
            let data = read_json(&source_data, "source data")?;

            let options = MapOptions {
                max_iterations,
                ..MapOptions::default()
            };
            // Recorded errors reach stderr through the mapper's warn-level report.
            let report = map_json_models(
                &source_schema,
                source_model.as_deref(),
                &data,
                &target_schema,
                target_model.as_deref(),
                &options,
            )
            .map_err(|e| anyhow::Error::from(e).context("Mapping failed"))?;

            if let Some(path) = errors {
                write_json(&report.errors, Some(&path), format)?;
            }

            write_json(&report.output, output.as_ref(), format)?;

            if fail_on_partial && !report.is_complete() {
                bail!(
                    "Only a partial mapping could be produced ({} error(s))",
                    report.errors.len()
                );
            }
        }
        Commands::Describe {
            schema,
            model,
            format,
        } => {
            let models = load_models(&schema)?;
            let model = match model.as_deref() {
                Some(name) => models
                    .get(name)
                    .with_context(|| format!("No model named '{}' in {}", name, schema.display()))?,
                None => models.root().context("Schema has no root model")?,
            };

            let description = ModelDescription {
                model: &model.name,
                description: model.description.as_deref(),
                fields: FieldDescriptor::for_model(model),
            };
            write_json(&description, None, format)?;
        }
    }

    Ok(())
}

fn read_json(path: &Path, what: &str) -> Result<serde_json::Value> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", what, path.display()))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse {} from: {}", what, path.display()))
}

fn load_models(path: &Path) -> Result<ModelSet> {
    let schema = read_json(path, "schema")?;
    ModelSet::from_schema(&schema).map_err(|e| {
        anyhow::Error::from(e).context(format!("Failed to load models from: {}", path.display()))
    })
}

fn write_json<T: Serialize + ?Sized>(
    val: &T,
    path: Option<&PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let mut writer: Box<dyn Write> = if let Some(p) = path {
        let file = File::create(p)
            .with_context(|| format!("Failed to create output file: {}", p.display()))?;
        Box::new(BufWriter::new(file))
    } else {
        Box::new(BufWriter::new(io::stdout()))
    };

    match format {
        OutputFormat::Pretty => {
            serde_json::to_writer_pretty(&mut writer, val).context("Failed to write JSON")?;
        }
        OutputFormat::Compact => {
            serde_json::to_writer(&mut writer, val).context("Failed to write JSON")?;
        }
    }

    // Ensure trailing newline
    writeln!(writer).context("Failed to write trailing newline")?;
    writer.flush().context("Failed to flush output")?;

    Ok(())
}
