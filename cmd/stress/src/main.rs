//! Stress test - many green threads
//!
//! Spawns a large number of threads that yield repeatedly, then joins them
//! all from a single coordinator green thread.
//!
//! Usage: `stress [num_threads] [num_workers]`

use lwthread::{join, kinfo, spawn, yield_now, SchedResult, Scheduler, SchedulerConfig, Thread};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

const YIELDS_PER_THREAD: usize = 10;

fn main() -> SchedResult<()> {
    println!("=== lwthread Stress Test ===\n");

    let mut args = std::env::args().skip(1);
    let num_threads: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(10_000);
    let num_workers: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(8);

    // Small stacks: thousands of threads are alive at once.
    let config = SchedulerConfig::from_env()
        .num_workers(num_workers)
        .stack_size(32 * 1024);
    let mut scheduler = Scheduler::with_config(config)?;
    scheduler.start()?;

    let completed = Arc::new(AtomicU64::new(0));
    let switches = Arc::new(AtomicU64::new(0));
    let start = Instant::now();

    println!("Spawning {} threads on {} workers...", num_threads, num_workers);

    let c = completed.clone();
    let s = switches.clone();
    let coordinator = scheduler.spawn(move || {
        let spawn_start = Instant::now();
        let mut threads: Vec<Thread> = Vec::with_capacity(num_threads);

        for i in 0..num_threads {
            let c = c.clone();
            let s = s.clone();
            let spawned = spawn(move || {
                for _ in 0..YIELDS_PER_THREAD {
                    yield_now();
                    s.fetch_add(1, Ordering::Relaxed);
                }
                c.fetch_add(1, Ordering::Relaxed);
            });
            match spawned {
                Ok(t) => threads.push(t),
                Err(e) => {
                    eprintln!("spawn {} failed: {}", i, e);
                    break;
                }
            }
        }
        kinfo!("spawned {} threads in {:?}", threads.len(), spawn_start.elapsed());

        for t in &threads {
            if let Err(e) = join(t) {
                eprintln!("join {} failed: {}", t.id(), e);
            }
        }
    })?;

    scheduler.wait(&coordinator)?;
    let total_time = start.elapsed();
    scheduler.destroy();

    let done = completed.load(Ordering::Relaxed);
    println!("\n=== Results ===");
    println!("Total threads:   {}", num_threads);
    println!("Completed:       {}", done);
    println!("Yields:          {}", switches.load(Ordering::Relaxed));
    println!("Total time:      {:?}", total_time);
    println!(
        "Throughput:      {:.0} threads/sec",
        done as f64 / total_time.as_secs_f64()
    );

    println!("\n=== Stress Test Complete ===");
    Ok(())
}
