/// mpv IPC driver with separated reader/writer tasks.
///
/// Architecture:
///
/// ```text
///   MpvDriver::spawn_and_connect()
///         │
///         ├── writer_task   ← receives MpvRequest via mpsc, serialises → socket
///         └── reader_task   ← reads JSON lines from socket
///                                ├── response (has request_id) → matched oneshot::Sender
///                                └── event / property-change   → event_tx channel
/// ```
///
/// Public API:
///   - `MpvHandle` — cheaply cloneable.  `send(cmd)` returns a `Future<Value>`.
///   - `MpvDriver` — owns the process and its session lifecycle
///     (`Uninitialized → Ready → Disposed`); operations outside `Ready`
///     no-op or fail without touching engine state.
///
/// Platform notes:
/// - Unix:   Unix domain sockets
/// - Windows: Named pipes  \\.\pipe\<name>
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

// ── global request-id counter ─────────────────────────────────────────────────

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

// ── observation property IDs ──────────────────────────────────────────────────

/// Fixed observe_property IDs.  We match on these in property-change events.
pub const OBS_PAUSE: u64 = 1;

// ── internal channel types ────────────────────────────────────────────────────

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line (already has '\n')
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An mpv event / property-change that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// Returns `Some((obs_id, data))` if this is a property-change event.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.raw.get("event")?.as_str()? == "property-change" {
            let id = self.raw.get("id")?.as_u64()?;
            let data = self.raw.get("data").unwrap_or(&Value::Null);
            Some((id, data))
        } else {
            None
        }
    }

    /// Returns the event name, e.g. "end-file", "start-file", "file-loaded".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }
}

// ── public handle ─────────────────────────────────────────────────────────────

/// Cloneable handle to the mpv writer task.  Use `send()` to fire a command
/// and await the response.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }
}

// ── session lifecycle ─────────────────────────────────────────────────────────

/// Explicit player session state, replacing any process-wide
/// initialization flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No process yet, or the previous one died; may (re)spawn.
    #[default]
    Uninitialized,
    /// Process running and IPC connected.
    Ready,
    /// Torn down for good; spawn attempts are refused.
    Disposed,
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Owns the mpv child process and manages (re)connection.
///
/// After calling `spawn_and_connect()`, a `MpvHandle` is returned and the
/// session is `Ready`.  If the process dies, `mark_dead()` returns the
/// session to `Uninitialized` so a later play can respawn.
pub struct MpvDriver {
    socket_name: String,
    process: Option<tokio::process::Child>,
    session: SessionState,
    pub last_volume: f32,
}

impl MpvDriver {
    pub fn new(volume: f32) -> Self {
        Self {
            socket_name: zap_proto::platform::mpv_socket_name(),
            process: None,
            session: SessionState::Uninitialized,
            last_volume: volume,
        }
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn process_alive(&mut self) -> bool {
        if self.session != SessionState::Ready {
            return false;
        }
        if let Some(ref mut child) = self.process {
            child.try_wait().ok().flatten().is_none()
        } else {
            false
        }
    }

    /// The process died underneath us: allow a later respawn.
    pub fn mark_dead(&mut self) {
        if self.session == SessionState::Ready {
            self.session = SessionState::Uninitialized;
        }
        self.process = None;
    }

    /// Final teardown; the driver refuses to spawn afterwards.
    pub async fn dispose(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
        self.session = SessionState::Disposed;
    }

    fn spawn_process(&mut self, controls_enabled: bool) -> anyhow::Result<()> {
        let mpv_binary = zap_proto::platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;

        let vol_arg = format!(
            "--volume={}",
            (self.last_volume * 100.0).clamp(0.0, 100.0).round() as i64
        );
        let ipc_arg = zap_proto::platform::mpv_socket_arg();
        // OSC (mpv's own on-screen seek bar) follows the controls flag,
        // mirroring the remote's two interaction modes.
        let osc_arg = if controls_enabled {
            "--osc=yes"
        } else {
            "--osc=no"
        };

        let child = tokio::process::Command::new(mpv_binary)
            .arg("--idle=yes")
            .arg("--force-window=immediate")
            .arg("--keep-open=yes")
            .arg(&ipc_arg)
            .arg(osc_arg)
            .arg("--osd-on-seek=msg-bar")
            .arg("--osd-duration=2500")
            .arg("--quiet")
            .arg(vol_arg)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()?;
        self.process = Some(child);
        Ok(())
    }

    // ── spawn / connect ───────────────────────────────────────────────────────

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
        controls_enabled: bool,
    ) -> anyhow::Result<MpvHandle> {
        if self.session == SessionState::Disposed {
            anyhow::bail!("player session disposed");
        }

        // Kill stale process
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }

        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        info!("mpv: spawning new process");
        self.spawn_process(controls_enabled)?;

        // Wait for socket to appear
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        self.session = SessionState::Ready;
        Ok(Self::start_io_tasks(stream, event_tx))
    }

    #[cfg(unix)]
    fn start_io_tasks(stream: UnixStream, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle {
        let (read_half, write_half) = stream.into_split();
        let reader = BufReader::new(read_half);

        // pending map: req_id → reply channel.  Shared between writer (inserts)
        // and reader (resolves).
        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

        let pending_w = pending.clone();
        tokio::spawn(writer_task(write_half, cmd_rx, pending_w));
        tokio::spawn(reader_task(reader, pending, event_tx));

        MpvHandle { tx: cmd_tx }
    }

    // ── Windows ───────────────────────────────────────────────────────────────

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
        controls_enabled: bool,
    ) -> anyhow::Result<MpvHandle> {
        if self.session == SessionState::Disposed {
            anyhow::bail!("player session disposed");
        }

        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }

        info!("mpv: spawning new process");
        self.spawn_process(controls_enabled)?;

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            match ClientOptions::new().open(&pipe_path) {
                Ok(client) => {
                    info!("mpv: connected to named pipe");
                    self.session = SessionState::Ready;
                    return Ok(Self::start_io_tasks_windows(client, event_tx));
                }
                Err(_) => continue,
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }

    #[cfg(windows)]
    fn start_io_tasks_windows(
        pipe: tokio::net::windows::named_pipe::NamedPipeClient,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> MpvHandle {
        use tokio::io::split;
        let (read_half, write_half) = split(pipe);
        let reader = BufReader::new(read_half);

        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

        let pending_w = pending.clone();
        tokio::spawn(writer_task(write_half, cmd_rx, pending_w));
        tokio::spawn(reader_task(reader, pending, event_tx));

        MpvHandle { tx: cmd_tx }
    }
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn reader_task<R>(
    mut reader: BufReader<R>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>,
    event_tx: mpsc::Sender<MpvEvent>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                // Fail all pending requests
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("mpv IPC connection closed")));
                }
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    // This is a command response — route to pending request
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"]
                                .as_str()
                                .unwrap_or("unknown error")
                                .to_string();
                            debug!("mpv reader: response req={} err={}", req_id, err);
                            Err(anyhow::anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    } else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                    }
                } else {
                    // Unsolicited event / property-change
                    let _ = event_tx.send(MpvEvent { raw: val }).await;
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("mpv IPC read error: {}", e)));
                }
                break;
            }
        }
    }
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(
    mut writer: W,
    mut rx: mpsc::Receiver<PendingRequest>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>,
) where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register reply channel before writing so reader can match it
        {
            let mut map = pending.lock().await;
            map.insert(req.req_id, req.reply);
        }
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            let mut map = pending.lock().await;
            if let Some(tx) = map.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

// ── convenience wrappers (used by ZapperCore) ─────────────────────────────────

impl MpvHandle {
    /// Switch playback to `url`.
    pub async fn load(&self, url: &str) -> anyhow::Result<()> {
        self.send(json!(["loadfile", url])).await?;
        Ok(())
    }

    pub async fn seek_relative(&self, secs: f64) -> anyhow::Result<()> {
        self.send(json!(["seek", secs, "relative"])).await?;
        Ok(())
    }

    pub async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.send(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    pub async fn get_time_pos(&self) -> anyhow::Result<Option<f64>> {
        let resp = self.send(json!(["get_property", "time-pos"])).await?;
        Ok(resp["data"].as_f64())
    }

    pub async fn get_duration(&self) -> anyhow::Result<Option<f64>> {
        let resp = self.send(json!(["get_property", "duration"])).await?;
        Ok(resp["data"].as_f64())
    }

    /// Show or relax mpv's own on-screen controller (only meaningful
    /// when the player was spawned with the OSC enabled).
    pub async fn set_osc_visibility(&self, always: bool) -> anyhow::Result<()> {
        let mode = if always { "always" } else { "auto" };
        self.send(json!(["script-message", "osc-visibility", mode]))
            .await?;
        Ok(())
    }

    /// Register observe_property for the pause flag.  Must be called
    /// after every fresh connection; mpv then pushes property-change
    /// events whenever it flips.
    pub async fn observe_playback_properties(&self) {
        match self.send(json!(["observe_property", OBS_PAUSE, "pause"])).await {
            Ok(_) => debug!("mpv: observe_property pause"),
            Err(e) => warn!("mpv: observe_property pause failed: {}", e),
        }
    }
}
