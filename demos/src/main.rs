//! Learner demos
//!
//! Synthetic actors feed random episodes to a learner training a toy
//! actor-critic network. The backend is `Autodiff<NdArray>` on the CPU, or
//! `Autodiff<Wgpu>` on the default GPU with the `wgpu` feature.
//!
//! ```bash
//! # Uniform sampling from the ordinary pool
//! RUST_LOG=info cargo run --release -p demos -- uniform
//!
//! # Outcome-balanced sampling (win / final / ordinary)
//! RUST_LOG=info cargo run --release -p demos -- mixed
//!
//! # Same, training on the GPU
//! RUST_LOG=info cargo run --release -p demos --features wgpu -- mixed
//! ```

mod synthetic;

use burn::backend::Autodiff;
#[cfg(not(feature = "wgpu"))]
use burn::backend::NdArray;
#[cfg(feature = "wgpu")]
use burn::backend::wgpu::Wgpu;
use burn::module::Module;
use impala_learner::{DeviceConfig, LearnerConfig, LearnerProcess, SamplingStrategy, StopReason};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use synthetic::{spawn_actors, ActorCounters, ReinforceLoss, ToyNet};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Backend Type
// ============================================================================

#[cfg(not(feature = "wgpu"))]
type B = Autodiff<NdArray<f32>>;

#[cfg(feature = "wgpu")]
type B = Autodiff<Wgpu>;

const N_ACTORS: usize = 4;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "uniform" => run(SamplingStrategy::Uniform),
            "mixed" => run(SamplingStrategy::Mixed),
            _ => {
                println!("Unknown sampling strategy: {}", args[1]);
                println!();
                print_usage();
            }
        }
    } else {
        print_usage();
    }
}

fn print_usage() {
    println!("Usage: cargo run --release -p demos -- <strategy>");
    println!();
    println!("  uniform    Take the head of the ordinary pool");
    println!("  mixed      10% win, 20% final, rest ordinary");
    println!();
    println!("  Set RUST_LOG=debug to see every update and scalar.");
}

fn run(sampling: SamplingStrategy) {
    println!("=== Learner demo ({:?} sampling) ===", sampling);
    println!();

    let config = LearnerConfig::new()
        .with_max_time_for_training(Duration::from_secs(20))
        .with_batch_size(8)
        .with_count_of_batches(2)
        .with_sequence_length(16)
        .with_buffer_size(2)
        .with_num_epochs(2)
        .with_learning_rate(3e-4)
        .with_sampling(sampling)
        .with_random_sample(true);

    println!("Configuration:");
    println!(
        "  Sample size: {} ({} x {}), threshold: {}",
        config.sample_size(),
        config.count_of_batches,
        config.batch_size,
        config.buffer_threshold()
    );
    println!(
        "  Epochs: {}, steps per update: {}",
        config.num_epochs,
        config.steps_per_update()
    );
    println!();

    let device_config = DeviceConfig::<B>::resolve();
    let model = ToyNet::<B>::new(device_config.device());
    let optimizer = config.create_optimizer::<B, ToyNet<B>>();
    let sequence_length = config.sequence_length;
    let ttl = config.max_time_for_training;

    let learner = match LearnerProcess::new(config, model, optimizer, ReinforceLoss) {
        Ok(learner) => learner.with_device(device_config),
        Err(e) => {
            eprintln!("Failed to create learner: {}", e);
            return;
        }
    };
    let learner = match learner.with_csv_metrics() {
        Ok(learner) => learner,
        Err(e) => {
            eprintln!("Failed to open metrics file: {}", e);
            return;
        }
    };
    println!("Model parameters: {}", learner.parameter_count());

    let stop = Arc::new(AtomicBool::new(false));
    let counters = Arc::new(ActorCounters::default());
    let actors = spawn_actors(
        N_ACTORS,
        sequence_length,
        learner.pools().clone(),
        Arc::clone(&stop),
        Arc::clone(&counters),
    );

    println!("Starting learner...");
    println!();
    let handle = learner.start();

    let report = loop {
        if let Some(report) = handle.wait_report(Duration::from_secs(2)) {
            break Some(report);
        }
        if !handle.is_running() {
            break handle.wait_report(Duration::from_secs(5));
        }
        let stats = handle.stats();
        println!(
            "Updates: {:>4} | Steps: {:>8} | Consumed: {:>6} | Pools: {}",
            stats.updates,
            stats.steps,
            stats.trajectories_consumed,
            handle.pool_sizes()
        );
    };

    stop.store(true, Ordering::Relaxed);
    for actor in actors {
        let _ = actor.join();
    }

    println!();
    println!(
        "Actors produced: ordinary={} final={} win={}",
        counters.ordinary.load(Ordering::Relaxed),
        counters.final_.load(Ordering::Relaxed),
        counters.win.load(Ordering::Relaxed)
    );

    match report {
        Some(report) => {
            println!(
                "Learner stopped after {:?} (ttl {:?}): {} updates, {} steps",
                report.elapsed, ttl, report.updates, report.steps
            );
            if let StopReason::Failed(e) = &report.stop {
                eprintln!("Learner failed: {}", e);
            }
        }
        None => eprintln!("Learner exited without a report"),
    }

    match handle.join() {
        Ok(model) => println!("Trained model returned ({} parameters)", model.num_params()),
        Err(_) => eprintln!("Learner thread panicked"),
    }
}
