//! # Example: timeout
//!
//! A single slow unit against a one second deadline.
//!
//! Shows how to:
//! - Set an invocation deadline with [`PoolConfig::timeout`]
//! - Stop a body promptly through its context when the deadline fires
//! - Tell a timed-out run apart from a completed or cancelled one
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► start(), enqueue(5s of work), complete_input()
//!   ├─► t = 1s: deadline fires
//!   │     ├─► context.request_stop()  ─► body returns Canceled
//!   │     └─► context destroyed (never pooled)
//!   └─► wait() ─► RunOutcome::TimedOut(record)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=parapipe=info cargo run --example timeout
//! ```

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parapipe::{
    BodyFn, BodyRef, ContextError, ContextFactory, ExecutionContext, Invocation, Orchestrator,
    PoolConfig, RunOutcome, UnitError,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

struct Worker {
    stop: CancellationToken,
}

impl ExecutionContext for Worker {
    fn request_stop(&self) {
        println!("worker: stop requested");
        self.stop.cancel();
    }

    fn close(&self) {
        println!("worker: closed");
    }
}

struct Workers;

#[async_trait]
impl ContextFactory for Workers {
    type Context = Worker;

    async fn create(&self) -> Result<Worker, ContextError> {
        Ok(Worker {
            stop: CancellationToken::new(),
        })
    }
}

fn slow() -> BodyRef<Worker, Duration, ()> {
    BodyFn::arc("slow", |inv: Invocation<Worker, Duration, ()>| async move {
        inv.streams.information(parapipe::InformationRecord::new("working")).await?;
        tokio::select! {
            _ = inv.context.stop.cancelled() => Err(UnitError::Canceled),
            _ = tokio::time::sleep(inv.input) => {
                inv.streams.success(()).await?;
                Ok::<_, UnitError>(())
            }
        }
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== timeout example ===\n");

    let mut cfg = PoolConfig::default();
    cfg.throttle_limit = 1;
    cfg.timeout = Duration::from_secs(1);

    let orch = Orchestrator::new(cfg, Workers, slow())?;
    let started = Instant::now();
    let mut output = orch.start()?;
    orch.enqueue(Duration::from_secs(5))?;
    orch.complete_input();

    while let Some(item) = output.recv().await {
        println!("output: {:?}", item.event);
    }

    let summary = orch.wait().await?;
    match &summary.outcome {
        RunOutcome::TimedOut(record) => println!("timed out after {:?}: {record}", started.elapsed()),
        RunOutcome::Cancelled => println!("cancelled"),
        RunOutcome::Completed => println!("completed"),
    }
    println!("pool: {:?}", orch.pool_stats());
    Ok(())
}
