//! Runs one poll through start, an early round on quorum, a timed round and close.
//!
//! ```text
//! RUST_LOG=alarmvisor=debug cargo run --example poll_lifecycle
//! ```

use std::sync::Arc;
use std::time::Duration;

use alarmvisor::polls::{self, MemoryStore, Poll, PollEvent, PollId, PollScheduler, PollStore};
use alarmvisor::{Config, JitterPolicy, LogReceiver, Manager};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config {
        grace: Duration::from_secs(5),
        check_interval: Duration::from_secs(30),
        rescan_jitter: JitterPolicy::Equal,
        ..Config::default()
    };

    let bus: Manager<PollEvent> = Manager::new(cfg.bus_capacity_clamped());
    if polls::default_bus::install(bus.clone()).is_err() {
        anyhow::bail!("default poll bus already installed");
    }
    polls::default_bus::add_receiver(Arc::new(LogReceiver::new("polls"))).await?;

    let store = Arc::new(MemoryStore::new());
    let scheduler = PollScheduler::start(store.clone(), bus, &cfg).await?;

    let id = PollId(1);
    let poll = Poll::new(id, "team offsite", chrono::Utc::now() + chrono::Duration::seconds(1))
        .with_round_duration(Duration::from_secs(3))
        .with_quorum(2)
        .with_rounds(1, 2);
    scheduler.create_poll(poll).await?;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    for voter in ["ann", "bob"] {
        let round = scheduler.cast_vote(id, voter).await?;
        println!("{voter} voted in round {round}");
    }

    // Round 2 is final: it closes when its three seconds are up.
    tokio::time::sleep(Duration::from_secs(4)).await;
    println!("final state: {:?}", store.get(id).await?.state);
    for (service, due) in scheduler.next_wakes() {
        println!("{service} next wakes at {due}");
    }

    scheduler.shutdown().await?;
    Ok(())
}
