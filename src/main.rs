use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use quarrydb::common::types::Rid;
use quarrydb::{EngineConfig, StorageEngine};

#[derive(Parser)]
#[command(author, version, about = "QuarryDB - inspect and edit record files")]
struct Cli {
    /// Directory holding table files and the log
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Buffer pool size (number of frames)
    #[arg(short, long, default_value_t = 64)]
    pool_size: usize,

    /// Do not write transaction log records
    #[arg(long)]
    no_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a table of fixed-size records
    Create {
        table: String,
        record_size: usize,
    },

    /// Insert one record given as hex
    Insert {
        table: String,
        hex: String,
    },

    /// Print every record of a table
    Scan {
        table: String,
    },

    /// Delete the record at (page, slot)
    Delete {
        table: String,
        page: u32,
        slot: u32,
    },

    /// Delete a table and its file
    Drop {
        table: String,
    },

    /// List tables
    Tables,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = EngineConfig {
        data_dir: cli.data_dir,
        buffer_pool_size: cli.pool_size,
        enable_logging: !cli.no_log,
        ..EngineConfig::default()
    };
    let engine = StorageEngine::open(config).context("Failed to open data directory")?;

    let outcome = execute(&engine, cli.command);
    engine.shutdown().context("Failed to shut down cleanly")?;
    outcome
}

fn execute(engine: &StorageEngine, command: Commands) -> Result<()> {
    match command {
        Commands::Create { table, record_size } => {
            let handle = engine.create_table(&table, record_size)?;
            println!(
                "Created table {} ({} bytes per record, {} records per page)",
                table,
                handle.record_size(),
                handle.header().num_records_per_page
            );
        }
        Commands::Insert { table, hex } => {
            let record = hex::decode(hex.trim()).context("Record is not valid hex")?;
            let rid = engine
                .txn_manager()
                .run(|txn| engine.insert_record(txn, &table, &record))?;
            println!("Inserted {}", rid);
        }
        Commands::Scan { table } => {
            let records = engine
                .txn_manager()
                .run(|txn| engine.scan_table(txn, &table))?;
            for (rid, record) in &records {
                println!("{}\t{}", rid, hex::encode(record));
            }
            println!("({} records)", records.len());
        }
        Commands::Delete { table, page, slot } => {
            let rid = Rid::new(page, slot);
            engine
                .txn_manager()
                .run(|txn| engine.delete_record(txn, &table, rid))?;
            println!("Deleted {}", rid);
        }
        Commands::Drop { table } => {
            engine.drop_table(&table)?;
            println!("Dropped table {}", table);
        }
        Commands::Tables => {
            for name in engine.table_names() {
                println!("{}", name);
            }
        }
    }
    Ok(())
}
