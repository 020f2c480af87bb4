//! tabletmem CLI
//!
//! Loads comma-separated rows through a memtable into a rowset file, and
//! prints rowset files back.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tabletmem::{
    AggregationType, ColumnDef, ColumnType, Datum, FileRowsetWriter, FlushMetrics, KeysType,
    MemTable, MemTableConfig, MemTracker, RowsetReader, Schema, TabletError,
};
use tracing_subscriber::{fmt, EnvFilter};

/// Null marker in input files
const NULL_FIELD: &str = "\\N";

/// tabletmem CLI
#[derive(Parser, Debug)]
#[command(name = "tabletmem-cli")]
#[command(about = "Load rows through a tablet memtable and inspect rowset files")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Insert rows from a CSV file and flush them into a rowset
    Load {
        /// Column spec `name:type[:key|:<aggregation>]`, repeated in schema order
        #[arg(short, long = "column", required = true)]
        columns: Vec<String>,

        /// Keys type: dup, unique or agg
        #[arg(short, long, default_value = "dup")]
        keys: String,

        /// Comma-separated input, one row per line; `\N` is null
        #[arg(short, long)]
        input: PathBuf,

        /// Rowset file to create
        #[arg(short, long)]
        output: PathBuf,

        /// Tablet id used in logs
        #[arg(long, default_value = "0")]
        tablet_id: i64,

        /// Memory limit for the memtable, in MB
        #[arg(short = 'm', long)]
        mem_limit_mb: Option<u64>,
    },

    /// Print every row of a rowset file
    Dump {
        /// Rowset file to read
        path: PathBuf,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tabletmem=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Load {
            columns,
            keys,
            input,
            output,
            tablet_id,
            mem_limit_mb,
        } => load(&columns, &keys, &input, &output, tablet_id, mem_limit_mb),
        Commands::Dump { path } => dump(&path),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn load(
    columns: &[String],
    keys: &str,
    input: &Path,
    output: &Path,
    tablet_id: i64,
    mem_limit_mb: Option<u64>,
) -> tabletmem::Result<()> {
    let keys_type = KeysType::parse(keys)
        .ok_or_else(|| TabletError::Config(format!("unknown keys type '{}'", keys)))?;
    let defs = columns
        .iter()
        .map(|spec| parse_column(spec.as_str()))
        .collect::<tabletmem::Result<Vec<_>>>()?;
    let schema = Arc::new(Schema::new(defs)?);

    let mut config = MemTableConfig::builder();
    if let Some(mb) = mem_limit_mb {
        config = config.mem_limit(mem_limit_bytes(mb)?);
    }
    let config = config.build();

    let process_tracker = MemTracker::root("process", None);
    let mut memtable = MemTable::new(tablet_id, Arc::clone(&schema), keys_type, &process_tracker, &config)?;

    tracing::info!("Loading {:?} into tablet {} ({})", input, tablet_id, keys_type);

    let reader = BufReader::new(File::open(input)?);
    let mut over_limit = false;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let tuple = parse_line(&schema, &line).map_err(|e| match e {
            TabletError::Decode { column, reason } => TabletError::Decode {
                column,
                reason: format!("line {}: {}", line_no + 1, reason),
            },
            other => other,
        })?;
        let outcome = memtable.insert(&tuple)?;
        if outcome.mem_limit_exceeded && !over_limit {
            over_limit = true;
            tracing::warn!("Memory limit reached at line {}", line_no + 1);
        }
    }

    let metrics = FlushMetrics::new();
    let mut writer = FileRowsetWriter::create(output)?;
    match memtable.flush(&mut writer) {
        Ok(stats) => metrics.record(&stats),
        Err(e) => {
            metrics.record_failure();
            return Err(e);
        }
    }

    println!(
        "wrote {} rows to {} ({} bytes of memtable memory, {} us)",
        metrics.rows_flushed(),
        output.display(),
        memtable.memory_usage(),
        metrics.flush_duration_us()
    );
    Ok(())
}

fn dump(path: &Path) -> tabletmem::Result<()> {
    let reader = RowsetReader::open(path)?;
    println!("{} rows", reader.row_count());

    for row in reader.iter() {
        let row = row?;
        let fields: Vec<String> = row.iter().map(format_cell).collect();
        println!("{}", fields.join(","));
    }
    Ok(())
}

/// `name:type`, `name:type:key` or `name:type:<aggregation>`
fn parse_column(spec: &str) -> tabletmem::Result<ColumnDef> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(TabletError::Config(format!(
            "column spec '{}' must be name:type[:key|:agg]",
            spec
        )));
    }

    let ty = ColumnType::parse(parts[1])
        .ok_or_else(|| TabletError::Config(format!("unknown column type '{}'", parts[1])))?;

    match parts.get(2) {
        Some(&"key") => Ok(ColumnDef::key(parts[0], ty)),
        Some(agg) => {
            let agg = AggregationType::parse(agg)
                .ok_or_else(|| TabletError::Config(format!("unknown aggregation '{}'", agg)))?;
            Ok(ColumnDef::value(parts[0], ty, agg))
        }
        None => Ok(ColumnDef::value(parts[0], ty, AggregationType::None)),
    }
}

fn parse_line(schema: &Schema, line: &str) -> tabletmem::Result<Vec<Option<Datum>>> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != schema.num_columns() {
        return Err(TabletError::Decode {
            column: fields.len().min(schema.num_columns()),
            reason: format!(
                "{} fields, schema has {} columns",
                fields.len(),
                schema.num_columns()
            ),
        });
    }

    fields
        .iter()
        .enumerate()
        .map(|(col, field)| {
            if field.trim() == NULL_FIELD {
                return Ok(None);
            }
            let ty = schema.column(col).ty;
            // byte payloads are kept exactly as written
            let text = match ty {
                ColumnType::Varchar | ColumnType::Hll => *field,
                _ => field.trim(),
            };
            Datum::parse(text, ty)
                .map(Some)
                .ok_or_else(|| TabletError::Decode {
                    column: col,
                    reason: format!("'{}' is not a valid {}", field, ty),
                })
        })
        .collect()
}

fn mem_limit_bytes(mb: u64) -> tabletmem::Result<u64> {
    mb.checked_mul(1024 * 1024)
        .ok_or_else(|| TabletError::Config(format!("memory limit of {} MB is too large", mb)))
}

fn format_cell(cell: &Option<Datum>) -> String {
    match cell {
        None => NULL_FIELD.to_string(),
        Some(Datum::TinyInt(v)) => v.to_string(),
        Some(Datum::SmallInt(v)) => v.to_string(),
        Some(Datum::Int(v)) => v.to_string(),
        Some(Datum::BigInt(v)) => v.to_string(),
        Some(Datum::LargeInt(v)) => v.to_string(),
        Some(Datum::Float(v)) => v.to_string(),
        Some(Datum::Double(v)) => v.to_string(),
        Some(Datum::Bytes(bytes)) => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => format!("<{} bytes>", bytes.len()),
        },
    }
}
