//! Cross-process demo over a memory-mapped counters file.
//!
//! Run the writer in one terminal and any number of observers in others:
//!
//! ```bash
//! cargo run --example mmap_demo --features "mmap table" -- writer /tmp/demo.counters
//! cargo run --example mmap_demo --features "mmap table" -- observer /tmp/demo.counters
//! ```

use std::thread;
use std::time::Duration;

use registro::mapped::MappedCountersFile;
use registro::observers::table::TableObserver;
use registro::registry::{CountersManager, CountersReader};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let role = args.next().unwrap_or_default();
    let path = args.next().unwrap_or_else(|| "/tmp/registro.counters".to_owned());

    match role.as_str() {
        "writer" => writer(&path),
        "observer" => observer(&path),
        _ => {
            eprintln!("usage: mmap_demo <writer|observer> [path]");
            std::process::exit(2);
        }
    }
}

fn writer(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let file = MappedCountersFile::create(path, 64)?;
    let mut manager = CountersManager::new(file.metadata_buffer(), file.values_buffer());

    let received = manager.new_counter("messages received")?;
    let dispatched = manager.new_counter("messages dispatched")?;
    let depth = manager.new_counter("queue depth")?;

    println!("writing counters to {path} (ctrl-c to stop)");
    loop {
        received.add(3);
        dispatched.add(2);
        depth.set_ordered(received.get() - dispatched.get());
        thread::sleep(Duration::from_millis(100));
    }
}

fn observer(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let file = MappedCountersFile::open(path)?;
    let reader = CountersReader::new(file.metadata_buffer(), file.values_buffer());
    let observer = TableObserver::new();

    loop {
        println!("{}", observer.render(&reader)?);
        thread::sleep(Duration::from_secs(1));
    }
}
