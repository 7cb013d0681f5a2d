//! CLI command implementations

use crate::output::{format_event, format_reply, OutputFormat};
use anyhow::Context;
use kino_bridge::{
    BridgeConfig, ChannelDelegate, MethodCall, MethodReply, PlayerEvent, PlayerHandle,
    SimulatedConfig, SimulatedEngine, SinkMessage, SurfaceTextureRegistry, VideoPlayerPlugin,
};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Build a plugin with a foreground rendering context and a simulated engine
pub fn build_plugin(config: Option<&Path>, engine: SimulatedConfig) -> anyhow::Result<VideoPlayerPlugin> {
    let config = match config {
        Some(path) => BridgeConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => BridgeConfig::default(),
    };
    let engine = Arc::new(SimulatedEngine::new(engine));
    Ok(VideoPlayerPlugin::new(config, engine).with_surfaces(Arc::new(SurfaceTextureRegistry::new())))
}

/// One line of a run script
#[derive(Debug, Deserialize, PartialEq)]
#[serde(untagged)]
enum ScriptLine {
    /// `{"wait": 200}` pauses the script so events can arrive
    Wait { wait: u64 },
    Call(MethodCall),
}

fn parse_line(line: &str) -> Option<anyhow::Result<ScriptLine>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(serde_json::from_str(line).with_context(|| format!("invalid script line: {line}")))
}

/// Print every message from one player's event stream until it ends
fn spawn_event_printer(
    handle: PlayerHandle,
    mut rx: UnboundedReceiver<SinkMessage>,
    format: OutputFormat,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            println!("{}", format_event(handle, &message, format));
            if message.is_end_of_stream() {
                break;
            }
        }
        debug!(handle = %handle, "Event stream closed");
    })
}

fn created_handle(reply: &MethodReply) -> Option<PlayerHandle> {
    reply
        .result()
        .and_then(|r| r.get("handle"))
        .and_then(|h| h.as_i64())
        .map(PlayerHandle)
}

/// Execute a JSON-lines script against the plugin
pub async fn run(plugin: VideoPlayerPlugin, script: Option<&Path>, format: &str) -> anyhow::Result<()> {
    match script {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open script {}", path.display()))?;
            run_script(plugin, BufReader::new(file), format).await
        }
        None => run_script(plugin, BufReader::new(tokio::io::stdin()), format).await,
    }
}

async fn run_script<R>(plugin: VideoPlayerPlugin, reader: R, format: &str) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let format = OutputFormat::from(format);
    let mut printers = Vec::new();
    let mut lines = reader.lines();
    let mut calls = 0usize;

    while let Some(line) = lines.next_line().await.context("failed to read script")? {
        let Some(parsed) = parse_line(&line) else {
            continue;
        };
        match parsed? {
            ScriptLine::Wait { wait } => {
                debug!(wait_ms = wait, "Waiting");
                tokio::time::sleep(Duration::from_millis(wait)).await;
            }
            ScriptLine::Call(call) => {
                calls += 1;
                let reply = plugin.on_method_call(&call);
                println!("{}", format_reply(&call, &reply, format));

                if call.method == "create" {
                    if let Some(handle) = created_handle(&reply) {
                        let (delegate, rx) = ChannelDelegate::channel();
                        plugin.listen(handle, delegate)?;
                        printers.push(spawn_event_printer(handle, rx, format));
                    }
                }
            }
        }
    }

    plugin.on_destroy();
    for printer in printers {
        if let Err(e) = printer.await {
            warn!(error = %e, "Event printer failed");
        }
    }
    info!(calls, "Script finished");
    Ok(())
}

/// Create a player, play `uri` for `play_ms`, then dispose it
pub async fn demo(plugin: VideoPlayerPlugin, uri: &str, play_ms: u64, format: &str) -> anyhow::Result<()> {
    let format = OutputFormat::from(format);
    let send = |call: MethodCall| {
        let reply = plugin.on_method_call(&call);
        println!("{}", format_reply(&call, &reply, format));
        reply
    };

    let reply = send(MethodCall::without_arguments("create"));
    let handle = created_handle(&reply).context("create did not return a handle")?;

    let (delegate, mut rx) = ChannelDelegate::channel();
    plugin.listen(handle, delegate)?;

    send(MethodCall::new("setDataSource", json!({ "handle": handle, "uri": uri })));

    let prepared = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(message) = rx.recv().await {
            println!("{}", format_event(handle, &message, format));
            match message {
                SinkMessage::Event(PlayerEvent::Prepared { .. }) => return Ok(()),
                SinkMessage::Error(error) => anyhow::bail!("{error}"),
                _ => {}
            }
        }
        anyhow::bail!("event stream closed before the player was prepared")
    })
    .await
    .context("timed out waiting for the player to prepare")?;
    prepared?;

    send(MethodCall::new("play", json!({ "handle": handle })));

    let ticks = 5;
    for _ in 0..ticks {
        tokio::time::sleep(Duration::from_millis(play_ms / ticks)).await;
        while let Ok(message) = rx.try_recv() {
            println!("{}", format_event(handle, &message, format));
        }
        send(MethodCall::new("position", json!({ "handle": handle })));
    }

    send(MethodCall::new("dispose", json!({ "handle": handle })));
    while let Some(message) = rx.recv().await {
        println!("{}", format_event(handle, &message, format));
        if message.is_end_of_stream() {
            break;
        }
    }

    let reply = send(MethodCall::new("position", json!({ "handle": handle })));
    anyhow::ensure!(
        reply.error_code() == Some("unknown_handle"),
        "disposed handle {handle} is still reachable"
    );
    Ok(())
}
