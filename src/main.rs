use crossroom::{CrossRoomClient, CrossRoomConfig, MemoryRegion};
use std::sync::Arc;
use tracing::{error, info, warn};

fn main() {
    // Initialize logging (INFO by default, override with RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    // Optional JSON config path as first argument
    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            CrossRoomConfig::load(&path)?
        }
        None => CrossRoomConfig::default(),
    };

    let major = Arc::new(MemoryRegion::with_members(
        "major",
        vec!["10.0.0.1:6379".into(), "10.0.0.2:6379".into()],
    ));
    let minor = Arc::new(MemoryRegion::with_members(
        "minor",
        vec!["10.1.0.1:6379".into()],
    ));

    let client = CrossRoomClient::builder(major.clone(), minor.clone())
        .config(config)
        .build()?;

    // Normal traffic
    let written = client.set("user:42:name", "ada");
    info!("set on major: applied={}", written.major.is_applied());
    info!("set on minor: applied={}", written.minor.wait().is_applied());

    client.incr_by("user:42:visits", 3).minor.wait();
    info!("visits = {:?}", client.get("user:42:visits")?);

    // Major outage: reads keep working from the minor region
    warn!("Simulating major region outage");
    major.set_failing(true);
    for _ in 0..8 {
        let name = client.get("user:42:name")?;
        info!("read during outage: {:?}", name);
    }
    info!("major-read breaker: {:?}", client.breaker().state(crossroom::ResourceKey::MajorRead));

    let during = client.set("user:42:name", "grace");
    info!(
        "write during outage: major failed={} blocked={}",
        during.major.is_failed(),
        during.major.is_blocked()
    );
    during.minor.wait();

    major.set_failing(false);

    let topology = serde_json::to_string_pretty(&client.topology())?;
    println!("{}", topology);

    client.shutdown();
    Ok(())
}
