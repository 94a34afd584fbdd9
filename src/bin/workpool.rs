use std::process::exit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use log::{error, info};

use workpool::{BlockingQueue, Result, ThreadHandle, ThreadPool, WorkerPool};

const DEFAULT_TASKS: usize = 8;
const DEFAULT_ITEMS: u32 = 5;

#[derive(Parser)]
#[command(name = "workpool", version, about = "Exercise the workpool primitives")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run counting tasks on a worker pool, then destroy it
    Pool {
        /// Number of worker threads (defaults to the CPU count)
        #[arg(long, value_name = "N")]
        workers: Option<u32>,
        /// Number of tasks to submit
        #[arg(long, default_value_t = DEFAULT_TASKS, value_name = "N")]
        tasks: usize,
        /// Simulated work per task, in milliseconds
        #[arg(long, default_value_t = 0, value_name = "MS")]
        work_ms: u64,
    },
    /// Move items through a blocking queue with producer and consumer threads
    Queue {
        /// Number of producers, and of consumers
        #[arg(long, default_value_t = 4, value_name = "N")]
        threads: u32,
        /// Items pushed by each producer
        #[arg(long, default_value_t = DEFAULT_ITEMS, value_name = "N")]
        items: u32,
    },
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Stderr)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{}", e);
        exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    info!("workpool {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Pool {
            workers,
            tasks,
            work_ms,
        } => run_pool(
            workers.unwrap_or_else(|| num_cpus::get() as u32),
            tasks,
            Duration::from_millis(work_ms),
        ),
        Commands::Queue { threads, items } => run_queue(threads, items),
    }
}

fn run_pool(workers: u32, tasks: usize, work: Duration) -> Result<()> {
    let pool = WorkerPool::new(workers)?;
    info!(
        "Pool ready with {} of {} workers",
        pool.spawned_workers(),
        workers
    );

    let completed = Arc::new(AtomicUsize::new(0));
    let started = Instant::now();
    for index in 0..tasks {
        let completed = Arc::clone(&completed);
        pool.submit(move || {
            info!("Processing task {}", index);
            if !work.is_zero() {
                thread::sleep(work);
            }
            completed.fetch_add(1, Ordering::SeqCst);
        })?;
    }

    let dropped = pool.destroy();
    info!("Pool destroyed after {:?}", started.elapsed());
    println!(
        "completed {} of {} tasks on {} workers ({} dropped)",
        completed.load(Ordering::SeqCst),
        tasks,
        workers,
        dropped
    );
    Ok(())
}

fn run_queue(threads: u32, items: u32) -> Result<()> {
    let queue = Arc::new(BlockingQueue::new());

    let producers: Vec<ThreadHandle> = (0..threads)
        .map(|id| {
            let queue = Arc::clone(&queue);
            ThreadHandle::new(Some(&format!("producer-{id}")), move || {
                for i in 0..items {
                    let value = id * 100 + i;
                    match queue.push(value) {
                        Ok(()) => info!("Producer {} pushed {}", id, value),
                        Err(e) => error!("Producer {} lost {}: {}", id, value, e),
                    }
                }
            })
        })
        .collect();

    let popped = Arc::new(AtomicUsize::new(0));
    let consumers: Vec<ThreadHandle> = (0..threads)
        .map(|id| {
            let queue = Arc::clone(&queue);
            let popped = Arc::clone(&popped);
            ThreadHandle::new(Some(&format!("consumer-{id}")), move || {
                for _ in 0..items {
                    let value = queue.pop();
                    info!("Consumer {} popped {}", id, value);
                    popped.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in producers.iter().chain(&consumers) {
        handle.start()?;
    }
    for handle in producers.iter().chain(&consumers) {
        handle.join()?;
    }

    println!(
        "popped {} items, {} left in queue",
        popped.load(Ordering::SeqCst),
        queue.len()
    );
    Ok(())
}
