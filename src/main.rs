//! Demo binary: runs a small pool of echo-style workers and drives a
//! synthetic workload against it, shutting down gracefully on Ctrl+C/SIGTERM.

use clap::Parser;
use crewpool::{Pool, PoolConfig, PoolError, Strategy, Worker, WorkerFactory, WorkerId};
use std::time::Duration;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Runtime configuration for the `crewpool-demo` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "crewpool-demo",
    version,
    about = "Demo driver for the crewpool worker pool"
)]
struct CliArgs {
    /// Steady-state worker count.
    ///
    /// Environment variable: `POOL_SIZE`
    #[arg(long, env = "POOL_SIZE", default_value_t = 5)]
    pool_size: usize,

    /// Additional workers allowed transiently under load.
    ///
    /// Environment variable: `POOL_MAX_OVERFLOW`
    #[arg(long, env = "POOL_MAX_OVERFLOW", default_value_t = 10)]
    pool_max_overflow: usize,

    /// Use FIFO idle-worker reinsertion instead of the default LIFO.
    #[arg(long, default_value_t = false)]
    fifo: bool,

    /// Number of demo jobs to submit concurrently before shutting down.
    ///
    /// Environment variable: `DEMO_JOBS`
    #[arg(long, env = "DEMO_JOBS", default_value_t = 20)]
    demo_jobs: usize,

    /// Seconds to wait for in-flight work to drain during shutdown before
    /// giving up on a clean `stop()`.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 10)]
    shutdown_timeout: u64,
}

fn build_pool_config(args: &CliArgs) -> Result<PoolConfig, PoolError> {
    PoolConfig::builder()
        .size(args.pool_size)
        .max_overflow(args.pool_max_overflow)
        .strategy(if args.fifo { Strategy::Fifo } else { Strategy::Lifo })
        .name("crewpool-demo")
        .build()
}

struct EchoWorker {
    id: WorkerId,
}

impl Worker for EchoWorker {
    type Message = String;
    type Reply = String;

    async fn handle(&mut self, msg: Self::Message) -> Self::Reply {
        tokio::time::sleep(Duration::from_millis(20)).await;
        format!("{msg} (handled by {:?})", self.id)
    }
}

struct EchoFactory;

impl WorkerFactory for EchoFactory {
    type Worker = EchoWorker;

    fn spawn(&self, id: WorkerId) -> crewpool::Result<EchoWorker> {
        Ok(EchoWorker { id })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    crewpool::telemetry::init_tracing();

    let args = CliArgs::parse();
    let demo_jobs = args.demo_jobs;
    let config = build_pool_config(&args)?;

    let pool = Pool::new(config, EchoFactory)?;

    #[cfg(feature = "tracing")]
    tracing::info!(?demo_jobs, "submitting demo workload");

    let mut jobs = Vec::with_capacity(demo_jobs);
    for i in 0..demo_jobs {
        let pool = pool.clone();
        jobs.push(tokio::spawn(async move {
            pool.work(format!("job-{i}"), true, Some(Duration::from_secs(5)))
                .await
        }));
    }

    tokio::select! {
        _ = futures_all(jobs) => {}
        () = shutdown_signal() => {
            #[cfg(feature = "tracing")]
            tracing::info!("shutdown signal received, stopping pool");
        }
    }

    let shutdown_timeout = Duration::from_secs(args.shutdown_timeout);
    match tokio::time::timeout(shutdown_timeout, pool.stop()).await {
        Ok(result) => result?,
        Err(_) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(?shutdown_timeout, "pool did not drain before shutdown timeout");
        }
    }
    Ok(())
}

async fn futures_all(jobs: Vec<tokio::task::JoinHandle<crewpool::Result<String>>>) {
    for job in jobs {
        match job.await {
            Ok(Ok(reply)) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(%reply, "job completed");
            }
            Ok(Err(_err)) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_err, "job failed");
            }
            Err(_join_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_join_err, "job task panicked");
            }
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
