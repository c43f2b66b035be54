//! framecoro - demo host loop

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use framecoro::runtime::scheduler::{from_fn, Fault, ManualClock, Scheduler, Step, Target, Task, WaitForSeconds};
use framecoro::util::{config, logger};
use framecoro::{NAME, VERSION};
use serde::Serialize;
use tracing::info;

/// Frame-driven cooperative coroutine scheduler
#[derive(Parser, Debug)]
#[command(name = "framecoro")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive a simulated host loop
    Demo {
        /// Number of worker tasks
        #[arg(long, default_value_t = 4)]
        tasks: usize,

        /// Steps each worker performs
        #[arg(long, default_value_t = 5)]
        steps: u32,

        /// Maximum number of frames to run
        #[arg(long, default_value_t = 1000)]
        ticks: u64,

        /// Make the first worker fault at this step
        #[arg(long)]
        fault_at: Option<u32>,

        /// Simulated frame length in milliseconds
        #[arg(long, default_value_t = 16)]
        frame_ms: u64,

        /// Scheduler configuration file (RON or JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print version information
    Version,
}

#[derive(Debug, Serialize)]
struct Summary {
    frames: u64,
    supervisor_completed: bool,
    supervisor_fault: Option<String>,
    steps_recorded: usize,
    stats: framecoro::SchedulerStats,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        logger::init_debug();
    } else {
        logger::init();
    }

    match args.command {
        Commands::Demo {
            tasks,
            steps,
            ticks,
            fault_at,
            frame_ms,
            config: config_path,
            json,
        } => {
            let scheduler_config = match &config_path {
                Some(path) => config::load_config(path)
                    .with_context(|| format!("Failed to load config: {}", path.display()))?,
                None => Default::default(),
            };
            let summary = run_demo(
                Scheduler::with_config(scheduler_config),
                tasks,
                steps,
                ticks,
                fault_at,
                Duration::from_millis(frame_ms),
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "{} frames, supervisor completed: {}, fault: {}, steps recorded: {}",
                    summary.frames,
                    summary.supervisor_completed,
                    summary.supervisor_fault.as_deref().unwrap_or("none"),
                    summary.steps_recorded
                );
                println!(
                    "started {}, completed {}, faulted {}, cancelled {}",
                    summary.stats.tasks_started,
                    summary.stats.tasks_completed,
                    summary.stats.tasks_faulted,
                    summary.stats.tasks_cancelled
                );
            }
        }
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
        }
    }

    Ok(())
}

/// Workers step once per simulated frame delay; a supervisor awaits each in turn.
fn run_demo(
    mut scheduler: Scheduler,
    tasks: usize,
    steps: u32,
    max_frames: u64,
    fault_at: Option<u32>,
    frame: Duration,
) -> Summary {
    let clock = ManualClock::new();
    let log: Rc<RefCell<Vec<(usize, u32)>>> = Rc::default();
    let workers_target = Target::new();

    let workers: Vec<Task> = (0..tasks)
        .map(|index| {
            let clock = clock.clone();
            let log = Rc::clone(&log);
            let fault_step = if index == 0 { fault_at } else { None };
            let mut step = 0;
            scheduler.start_for(
                workers_target,
                from_fn(move |_cx, resumed| {
                    resumed?;
                    if step == steps {
                        return Ok(Step::Complete);
                    }
                    if fault_step == Some(step) {
                        return Err(Fault::msg(format!("worker {} failed at step {}", index, step)));
                    }
                    log.borrow_mut().push((index, step));
                    step += 1;
                    Ok(Step::wait(WaitForSeconds::with_clock(clock.clone(), frame * (index as u32 + 1))))
                }),
            )
        })
        .collect();

    let mut pending = workers.into_iter();
    let supervisor = scheduler.start(from_fn(move |cx, resumed| {
        resumed?;
        match pending.next() {
            Some(worker) => Ok(Step::await_task(&worker)),
            None => {
                cx.stop_target(workers_target);
                Ok(Step::Complete)
            }
        }
    }));

    let mut frames = 0;
    while scheduler.has_live_tasks() && frames < max_frames {
        scheduler.advance_all();
        clock.advance(frame);
        frames += 1;
    }
    info!("demo finished after {} frames", frames);

    let summary = Summary {
        frames,
        supervisor_completed: supervisor.is_completed(),
        supervisor_fault: supervisor.fault().map(|f| format!("{:#}", f.error())),
        steps_recorded: log.borrow().len(),
        stats: *scheduler.stats(),
    };
    scheduler.shutdown();
    summary
}
