//! Runs a leader with two followers. The leader finishes after a second, the
//! followers are killed because of it, and the final status is printed.
//!
//! ```text
//! cargo run --example leader_group
//! RUST_LOG=allocvisor=debug cargo run --example leader_group
//! ```

use std::sync::Arc;

use serde_json::json;

use allocvisor::{
    AllocRunner, Allocation, LogWriter, LoggerConfig, MemStore, RecordingUpdater, RestartPolicy,
    TaskDef, logger_init,
};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    logger_init(&LoggerConfig {
        level,
        ..LoggerConfig::default()
    })?;

    let alloc = Allocation::new(
        "web-1",
        "web",
        vec![
            TaskDef::new("server").leader().with_config(json!({"run_for_ms": 1000})),
            TaskDef::new("log-shipper"),
            TaskDef::new("metrics"),
        ],
    )
    .with_restart_policy(RestartPolicy::never());

    let store = MemStore::new();
    let updater = RecordingUpdater::new();
    let runner = AllocRunner::builder(alloc)
        .with_store(Arc::new(store.clone()))
        .with_updater(Arc::new(updater.clone()))
        .with_subscribers(vec![Arc::new(LogWriter::new())])
        .build()?;

    let status = Arc::clone(&runner).run().await?;
    println!("allocation finished: {}", status.as_str());

    for (name, record) in runner.alloc_state().task_states {
        let events: Vec<_> = record.events.iter().map(|e| format!("{:?}", e.kind)).collect();
        println!("  {name:<12} {:<5} {}", record.state.as_str(), events.join(" -> "));
    }
    println!("status updates sent: {}", updater.count());

    runner.destroy().await;
    runner.destroyed().await;
    println!("state collected: {}", !store.contains("web-1"));
    Ok(())
}
