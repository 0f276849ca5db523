use anyhow::{Context, anyhow, bail};
use clusterstate_distributor::communicator::{
    CommunicatorOptions, Completion, NodeCommunicator, NodeReply, NodeTarget,
};
use clusterstate_distributor::http::HttpTransport;
use clusterstate_distributor::node::ClusterStateReceiver;
use clusterstate_distributor::node::handlers::router;
use clusterstate_distributor::state::{ClusterState, FeedBlock, NodeType, StateBundle};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        // .with_max_level(tracing::Level::DEBUG)
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("node") => run_node(&args[2..]).await,
        Some("publish") => run_publish(&args[2..]).await,
        _ => {
            print_usage(&args[0]);
            std::process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} node --bind <addr:port>", program);
    eprintln!(
        "       {} publish --node <storage|distributor>.<index>=<addr:port>... --state <text>",
        program
    );
    eprintln!(
        "           [--space <name>]... [--deferred] [--feed-block <reason>] [--config <file.json>] [--latency-budget-ms <ms>]"
    );
    eprintln!("Example: {} node --bind 127.0.0.1:19100", program);
    eprintln!(
        "Example: {} publish --node storage.0=127.0.0.1:19100 --state \"version:4 distributor:1 storage:1\" --deferred",
        program
    );
}

fn value_of<'a>(args: &'a [String], i: usize) -> anyhow::Result<&'a str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing value for {}", args[i]))
}

async fn run_node(args: &[String]) -> anyhow::Result<()> {
    let mut bind_addr: Option<SocketAddr> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                bind_addr = Some(value_of(args, i)?.parse()?);
                i += 2;
            }
            other => bail!("unknown argument for node: {}", other),
        }
    }
    let bind_addr = bind_addr.ok_or_else(|| anyhow!("--bind is required"))?;

    let receiver = Arc::new(ClusterStateReceiver::new());
    let app = router(receiver);

    tracing::info!("Node listening for cluster states on {}", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn parse_target(spec: &str) -> anyhow::Result<NodeTarget> {
    let (key, address) = spec
        .split_once('=')
        .ok_or_else(|| anyhow!("expected <type>.<index>=<addr>, got '{}'", spec))?;
    let (node_type, index) = key
        .split_once('.')
        .ok_or_else(|| anyhow!("expected <type>.<index>, got '{}'", key))?;
    let node_type = match node_type {
        "storage" => NodeType::Storage,
        "distributor" => NodeType::Distributor,
        other => bail!("unknown node type '{}'", other),
    };
    let index: u16 = index
        .parse()
        .with_context(|| format!("invalid node index '{}'", index))?;

    Ok(NodeTarget::new(node_type, index, address))
}

async fn run_publish(args: &[String]) -> anyhow::Result<()> {
    let mut targets: Vec<NodeTarget> = vec![];
    let mut state_text: Option<String> = None;
    let mut spaces: Vec<String> = vec![];
    let mut deferred = false;
    let mut feed_block: Option<FeedBlock> = None;
    let mut options = CommunicatorOptions::default();
    let mut latency_budget = Duration::from_millis(100);

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--node" => {
                targets.push(parse_target(value_of(args, i)?)?);
                i += 2;
            }
            "--state" => {
                state_text = Some(value_of(args, i)?.to_string());
                i += 2;
            }
            "--space" => {
                spaces.push(value_of(args, i)?.to_string());
                i += 2;
            }
            "--feed-block" => {
                feed_block = Some(FeedBlock::blocked(value_of(args, i)?));
                i += 2;
            }
            "--config" => {
                let path = value_of(args, i)?;
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path))?;
                options = serde_json::from_str(&raw)
                    .with_context(|| format!("invalid options in {}", path))?;
                i += 2;
            }
            "--latency-budget-ms" => {
                latency_budget = Duration::from_millis(value_of(args, i)?.parse()?);
                i += 2;
            }
            "--deferred" => {
                deferred = true;
                i += 1;
            }
            other => bail!("unknown argument for publish: {}", other),
        }
    }

    if targets.is_empty() {
        bail!("at least one --node is required");
    }
    let baseline: ClusterState = state_text
        .ok_or_else(|| anyhow!("--state is required"))?
        .parse()?;

    let mut builder = StateBundle::builder(baseline.clone()).deferred_activation(deferred);
    for space in spaces {
        builder = builder.spaced_state(space, baseline.clone());
    }
    if let Some(feed_block) = feed_block {
        builder = builder.feed_block(feed_block);
    }
    let bundle = builder.build();

    let communicator = NodeCommunicator::new(Arc::new(HttpTransport::new()), options, latency_budget)?;

    // Encode once for the whole fan-out.
    let encoded = Arc::new(communicator.codec().encode(&bundle)?);
    tracing::info!(
        "Publishing {} to {} nodes ({} bytes, {:?})",
        bundle,
        targets.len(),
        encoded.payload.len(),
        encoded.compression
    );

    let published: Vec<_> = targets
        .iter()
        .map(|target| communicator.publish_encoded(encoded.clone(), bundle.version(), target.clone()))
        .collect();
    let failed = await_all(published).await;
    if failed > 0 {
        bail!("{} of {} nodes did not acknowledge version {}", failed, targets.len(), bundle.version());
    }

    if deferred {
        let activated: Vec<_> = targets
            .iter()
            .map(|target| communicator.activate_version(bundle.version(), target.clone()))
            .collect();
        let failed = await_all(activated).await;
        if failed > 0 {
            bail!("{} of {} nodes did not activate version {}", failed, targets.len(), bundle.version());
        }
    }

    tracing::info!("Version {} is active on all {} nodes", bundle.version(), targets.len());
    Ok(())
}

/// Waits for every completion and returns how many calls failed.
async fn await_all<T>(completions: Vec<Completion<T>>) -> usize {
    let mut failed = 0;
    for completion in completions {
        match completion.await {
            Ok(NodeReply {
                node,
                round_trip,
                result: Ok(_),
                ..
            }) => tracing::info!("  - {} ok after {:?}", node, round_trip),
            Ok(NodeReply {
                node,
                result: Err(e),
                ..
            }) => {
                tracing::error!("  - {} failed: {}", node, e);
                failed += 1;
            }
            Err(_) => {
                tracing::error!("  - call abandoned before completing");
                failed += 1;
            }
        }
    }
    failed
}
