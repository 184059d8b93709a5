//! Demo application showcasing the counters registry and its observers.
//!
//! A pool of worker threads updates counters through [`AtomicCounter`]
//! handles while the main thread periodically renders the registry in the
//! selected format.
//!
//! Run with:
//! ```bash
//! cargo run --example demo --features demo -- --format table
//! ```

use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use registro::buffer::AlignedBuffer;
use registro::layout::{COUNTER_LENGTH, METADATA_LENGTH};
use registro::observers::prometheus::PrometheusObserver;
use registro::observers::table::{TableObserver, TableStyle};
use registro::registry::{CountersManager, CountersReader};
use registro::snapshot::RegistrySnapshot;

/// Output format for rendering the registry.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Pretty ASCII table
    Table,
    /// JSON snapshot
    Json,
    /// Prometheus exposition format
    Prometheus,
}

/// Table style selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum StyleChoice {
    Ascii,
    Rounded,
    Sharp,
    Modern,
    Markdown,
}

impl From<StyleChoice> for TableStyle {
    fn from(choice: StyleChoice) -> Self {
        match choice {
            StyleChoice::Ascii => TableStyle::Ascii,
            StyleChoice::Rounded => TableStyle::Rounded,
            StyleChoice::Sharp => TableStyle::Sharp,
            StyleChoice::Modern => TableStyle::Modern,
            StyleChoice::Markdown => TableStyle::Markdown,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Live counters registry demo")]
struct Args {
    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Table style (table format only)
    #[arg(long, value_enum, default_value = "rounded")]
    style: StyleChoice,

    /// Number of worker threads
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Number of render passes before exiting
    #[arg(long, default_value_t = 5)]
    rounds: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let metadata = AlignedBuffer::new(64 * METADATA_LENGTH);
    let values = AlignedBuffer::new(64 * COUNTER_LENGTH);
    let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

    let mut handles = Vec::new();
    for worker in 0..args.workers {
        let processed = manager.new_counter(&format!("worker-{worker} messages processed"))?;
        let errors = manager.new_counter(&format!("worker-{worker} errors"))?;
        handles.push((processed, errors));
    }

    let reader = CountersReader::new(metadata.as_buffer(), values.as_buffer());

    thread::scope(|scope| -> Result<(), Box<dyn std::error::Error>> {
        for (worker, (processed, errors)) in handles.iter().enumerate() {
            scope.spawn(move || {
                for i in 0u64.. {
                    processed.increment();
                    if i % 97 == 0 {
                        errors.increment();
                    }
                    // Uneven workers make the table more interesting.
                    thread::sleep(Duration::from_micros(50 * (worker as u64 + 1)));
                }
            });
        }

        for round in 0..args.rounds {
            thread::sleep(Duration::from_millis(500));
            println!("--- round {} ---", round + 1);
            match args.format {
                OutputFormat::Table => {
                    let observer = TableObserver::new().with_style(args.style.into());
                    println!("{}", observer.render(&reader)?);
                }
                OutputFormat::Json => {
                    let snapshot = RegistrySnapshot::capture(&reader)?;
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                }
                OutputFormat::Prometheus => {
                    let observer = PrometheusObserver::new().with_namespace("demo");
                    println!("{}", observer.render(&reader)?);
                }
            }
        }

        std::process::exit(0);
    })
}
