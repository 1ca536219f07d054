//! Command implementations for the Weave CLI.

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use weave_deploy::{Bundle, HttpControlPlane, JobHandle, Orchestrator, ARCHIVE_NAME};
use weave_graph::RawFlow;
use weave_health::{ComposeProbe, HealthWatcher, StatusProbe};
use weave_render::{ArtifactSet, RenderEnv};
use weave_types::{DeployStatus, FlowId, RemoteTarget, StatusUpdate, Topology};

fn load_flow(path: &Path) -> anyhow::Result<RawFlow> {
    let payload = std::fs::read_to_string(path)
        .with_context(|| format!("reading payload {}", path.display()))?;
    let flow: RawFlow =
        serde_json::from_str(&payload).with_context(|| format!("parsing {}", path.display()))?;
    tracing::debug!(flow = %flow.id, name = %flow.name, "payload loaded");
    Ok(flow)
}

fn compile_topology(flow: &RawFlow) -> anyhow::Result<Topology> {
    let graph = weave_graph::compile(flow).context("compiling pipeline graph")?;
    Ok(weave_topology::build_topology(&graph))
}

fn render(flow: &RawFlow) -> anyhow::Result<ArtifactSet> {
    let topology = compile_topology(flow)?;
    weave_render::render_artifacts(&topology, RenderEnv::from_env())
        .context("rendering deployment artifacts")
}

/// Compile a payload and emit the service topology as JSON.
pub fn compile(input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let flow = load_flow(input)?;
    let topology = compile_topology(&flow)?;
    let json = serde_json::to_string_pretty(&topology)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Topology written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Render the deployment artifacts into a directory, optionally packing
/// them into the transfer archive as well.
pub fn export(input: &Path, output: &Path, archive: bool) -> anyhow::Result<()> {
    let flow = load_flow(input)?;
    let artifacts = render(&flow)?;

    std::fs::create_dir_all(output)
        .with_context(|| format!("creating {}", output.display()))?;
    for artifact in &artifacts.files {
        let path = output.join(&artifact.name);
        std::fs::write(&path, &artifact.content)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("  {}", path.display());
    }

    if archive {
        let bundle = Bundle::stage(&artifacts).context("packing archive")?;
        let dest = output.join(ARCHIVE_NAME);
        std::fs::copy(bundle.archive_path(), &dest)
            .with_context(|| format!("writing {}", dest.display()))?;
        println!("  {}", dest.display());
    }
    println!("Exported {} artifacts", artifacts.files.len());
    Ok(())
}

/// Deploy to a remote host over ssh + compose and follow the status
/// stream until it terminates.
pub async fn deploy_remote(input: &Path, target: RemoteTarget) -> anyhow::Result<()> {
    let flow = load_flow(input)?;
    let artifacts = render(&flow)?;

    println!("Deploying {} to {}", flow.name, target.label());
    let orchestrator = Orchestrator::new();
    let handle = orchestrator.deploy_remote(target, &artifacts)?;
    follow(handle).await
}

/// Deploy through the cluster control plane and follow the status
/// stream until it terminates.
pub async fn deploy_cluster(input: &Path, namespace: &str, api_url: &str) -> anyhow::Result<()> {
    let flow = load_flow(input)?;
    let artifacts = render(&flow)?;
    let flow_id = FlowId::new(flow.id.clone());

    println!("Deploying {} to namespace {namespace} via {api_url}", flow.name);
    let api = Arc::new(HttpControlPlane::new(api_url));
    let orchestrator = Orchestrator::new();
    let handle = orchestrator.deploy_control_plane(api, namespace, &flow_id, &artifacts)?;
    follow(handle).await
}

/// Watch an already-deployed remote target until it settles.
pub async fn watch(target: RemoteTarget) -> anyhow::Result<()> {
    println!("Watching {}", target.label());
    let probe: Arc<dyn StatusProbe> = Arc::new(ComposeProbe::new(target));
    let (tx, mut rx) = mpsc::channel(64);
    let watcher = tokio::spawn(async move { HealthWatcher::new(probe).watch(&tx).await });

    while let Some(update) = rx.recv().await {
        print_update(&update);
    }
    let final_status = watcher.await.context("watcher task failed")?;
    finish(final_status)
}

async fn follow(mut handle: JobHandle) -> anyhow::Result<()> {
    println!("Job {} started", handle.job.id);
    let mut final_status = DeployStatus::InProgress;
    while let Some(update) = handle.updates.recv().await {
        final_status = update.status;
        print_update(&update);
    }
    finish(final_status)
}

fn print_update(update: &StatusUpdate) {
    println!("[{}] {}", update.status, update.message);
    for service in &update.services {
        println!("    {} {}", service.name, service.state);
    }
    if update.status == DeployStatus::Error {
        for line in &update.log_tail {
            println!("    | {line}");
        }
    }
}

fn finish(status: DeployStatus) -> anyhow::Result<()> {
    if status == DeployStatus::Error {
        eprintln!("Deployment failed");
        std::process::exit(1);
    }
    println!("Deployment healthy");
    Ok(())
}
