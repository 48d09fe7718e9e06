//! Basic lwthread example
//!
//! Two workers, five counting threads. Each thread prints, sleeps a little
//! longer than the one before it, and yields between iterations; the main
//! OS thread waits for all five.
//!
//! # Environment Variables
//!
//! - `LWT_FLUSH_EPRINT=1` - Flush debug output immediately (useful for crash debugging)
//! - `LWT_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `LWT_DEBUG=1` - Scheduler debug logging (config dump, dispatch tracing)

use lwthread::{current_id, kinfo, sleep_ms, yield_now, SchedResult, Scheduler};
// LWT_LOG_LEVEL=debug LWT_FLUSH_EPRINT=1 cargo run -p lwthread-basic

fn counter(id: u64) {
    println!("Thread {} starting (green id {:?})", id, current_id());

    for i in 0..5 {
        println!("Thread {}: Count {}", id, i);
        sleep_ms(100 * id);
        yield_now();
    }

    println!("Thread {} finished", id);
}

fn main() -> SchedResult<()> {
    println!("=== lwthread Basic Example (v{}) ===\n", lwthread::VERSION);

    let mut scheduler = Scheduler::create(2)?;
    scheduler.start()?;
    println!("Scheduler started with {} worker threads", scheduler.num_workers());

    let mut threads = Vec::with_capacity(5);
    for id in 1..=5u64 {
        match scheduler.spawn(move || counter(id)) {
            Ok(t) => {
                println!("Created thread {}", id);
                threads.push((id, t));
            }
            Err(e) => eprintln!("Failed to create thread {}: {}", id, e),
        }
    }

    for (id, t) in &threads {
        println!("Waiting for thread {}", id);
        scheduler.wait(t)?;
        println!("Thread {} joined", id);
    }

    kinfo!("{} thread(s) completed", threads.len());
    println!("All threads completed, shutting down");
    scheduler.stop();
    scheduler.destroy();

    println!("\n=== Example Complete ===");
    Ok(())
}
