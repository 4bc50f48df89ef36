//! # Example: basic_pipeline
//!
//! Runs one body over a batch of numbers with at most three contexts.
//!
//! Shows how to:
//! - Implement [`ExecutionContext`] and [`ContextFactory`] for a costly resource
//! - Pass captured variables to every unit with [`OrchestratorBuilder::bind`]
//! - Write to several output channels from one body
//! - Consume the merged output and read the [`RunSummary`](parapipe::RunSummary)
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► OrchestratorBuilder::new(cfg).bind("exponent", 2).build(factory, body)
//!   ├─► start()  ─► OutputStream
//!   ├─► enqueue(1..=12), complete_input()
//!   ├─► print every output item as it arrives (unit id + channel)
//!   └─► wait() ─► summary, dispose()
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=parapipe=debug cargo run --example basic_pipeline
//! ```

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parapipe::{
    BodyFn, BodyRef, ContextError, ContextFactory, ExecutionContext, Invocation,
    OrchestratorBuilder, OutputEvent, PoolConfig, ProgressRecord, UnitError,
};
use tracing_subscriber::EnvFilter;

/// Pretend interpreter session: slow to build, cheap to reuse.
struct Session {
    id: u64,
    handled: AtomicUsize,
}

impl ExecutionContext for Session {
    fn request_stop(&self) {
        println!("session {} asked to stop", self.id);
    }

    fn close(&self) {
        println!(
            "session {} closed after {} items",
            self.id,
            self.handled.load(Ordering::Relaxed)
        );
    }
}

#[derive(Default)]
struct Sessions {
    next: AtomicU64,
}

#[async_trait]
impl ContextFactory for Sessions {
    type Context = Session;

    async fn create(&self) -> Result<Session, ContextError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(Session {
            id: self.next.fetch_add(1, Ordering::Relaxed) + 1,
            handled: AtomicUsize::new(0),
        })
    }
}

fn power() -> BodyRef<Session, u64, u64> {
    BodyFn::arc("power", |inv: Invocation<Session, u64, u64>| async move {
        let exponent = inv.bindings.get::<u32>("exponent").copied().unwrap_or(1);
        inv.context.handled.fetch_add(1, Ordering::Relaxed);

        inv.streams
            .verbose(format!("session {} takes {}", inv.context.id, inv.input))
            .await?;
        if inv.input % 5 == 0 {
            return Err(UnitError::fail(format!("{} is not welcome here", inv.input)));
        }
        tokio::time::sleep(Duration::from_millis(20 * inv.input)).await;
        inv.streams
            .progress(ProgressRecord::new(1, "power", "done").with_percent(100).completed())
            .await?;
        inv.streams.success(inv.input.pow(exponent)).await?;
        Ok::<_, UnitError>(())
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== basic_pipeline example ===\n");

    // 1. Configure the invocation
    let mut cfg = PoolConfig::default();
    cfg.throttle_limit = 3;

    // 2. Build the orchestrator
    let orch = OrchestratorBuilder::new(cfg)
        .bind("exponent", 2u32)
        .build(Sessions::default(), power())?;
    orch.cancel_on_shutdown_signal();

    // 3. Start and feed input
    let mut output = orch.start()?;
    for n in 1..=12 {
        orch.enqueue(n)?;
    }
    orch.complete_input();

    // 4. Consume merged output
    while let Some(item) = output.recv().await {
        let unit = item.unit.map(|u| u.to_string()).unwrap_or_else(|| "-".into());
        match item.event {
            OutputEvent::Success(v) => println!("[{unit}] success  {v}"),
            OutputEvent::Error(e) => println!("[{unit}] error    {e}"),
            OutputEvent::Verbose(m) => println!("[{unit}] verbose  {m}"),
            OutputEvent::Progress(p) => println!("[{unit}] progress {}%", p.percent_complete.unwrap_or(0)),
            other => println!("[{unit}] {:?}", other.kind()),
        }
    }

    // 5. Summary and teardown
    let summary = orch.wait().await?;
    println!(
        "\noutcome={:?} dispatched={} succeeded={} failed={}",
        summary.outcome, summary.dispatched, summary.succeeded, summary.failed
    );
    println!("pool: {:?}", orch.pool_stats());
    orch.dispose().await;
    Ok(())
}
