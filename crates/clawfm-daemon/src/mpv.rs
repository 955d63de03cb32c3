/// mpv playback backend over JSON IPC.
///
/// ```text
///   MpvDriver::spawn_and_connect()
///         │
///         ├── writer_task   ← MpvRequest via mpsc, serialised → socket
///         └── reader_task   ← JSON lines from socket
///                                ├── response (has request_id) → matching oneshot
///                                └── event / property-change   → translator
///                                                                    └── AudioEvent → engine
/// ```
///
/// `MpvOutput` is the [`AudioOutput`] the station core drives.  It spawns mpv
/// lazily on the first command and respawns it if the process has died.
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clawfm_engine::output::{AudioEvent, AudioOutput};
use clawfm_proto::platform;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

// ── observation property IDs ──────────────────────────────────────────────────

pub const OBS_TIME_POS: u64 = 1;
pub const OBS_DURATION: u64 = 2;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String,
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An unsolicited mpv message (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.raw.get("event")?.as_str()? == "property-change" {
            let id = self.raw.get("id")?.as_u64()?;
            let data = self.raw.get("data").unwrap_or(&Value::Null);
            Some((id, data))
        } else {
            None
        }
    }

    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }
}

// ── handle ────────────────────────────────────────────────────────────────────

/// Cloneable handle to the writer task.
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

    pub async fn set_property(&self, name: &str, value: Value) -> anyhow::Result<()> {
        self.send(json!(["set_property", name, value])).await?;
        Ok(())
    }

    /// Replace the current file.  Pause is set first so the new file never
    /// starts on its own.
    pub async fn load_paused(&self, url: &str) -> anyhow::Result<()> {
        self.set_property("pause", json!(true)).await?;
        let resp = self.send(json!(["loadfile", url, "replace"])).await?;
        debug!("mpv: loadfile response: {:?}", resp);
        Ok(())
    }

    pub async fn seek_absolute(&self, secs: f64) -> anyhow::Result<()> {
        self.send(json!(["seek", secs, "absolute"])).await?;
        Ok(())
    }

    /// Observations persist across files, so this runs once per connection.
    pub async fn observe_properties(&self) {
        for (id, name) in [(OBS_TIME_POS, "time-pos"), (OBS_DURATION, "duration")] {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Owns the mpv child process.
pub struct MpvDriver {
    socket_name: String,
    process: Option<tokio::process::Child>,
    volume: f32,
}

impl MpvDriver {
    pub fn new(volume: f32) -> Self {
        Self {
            socket_name: platform::mpv_socket_name(),
            process: None,
            volume,
        }
    }

    pub fn process_alive(&mut self) -> bool {
        let Some(child) = self.process.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!("mpv process exited: {}", status);
                false
            }
            Err(e) => {
                warn!("mpv process_alive check failed: {}", e);
                false
            }
        }
    }

    fn spawn_process(&mut self) -> anyhow::Result<()> {
        let mpv_binary =
            platform::find_mpv_binary().ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;
        let vol_arg = format!(
            "--volume={}",
            (self.volume * 100.0).clamp(0.0, 100.0).round() as i64
        );

        let data_dir = platform::data_dir();
        std::fs::create_dir_all(&data_dir)?;
        let stderr_path = data_dir.join("mpv-stderr.log");
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;

        let child = tokio::process::Command::new(&mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg(platform::mpv_socket_arg())
            .arg("--quiet")
            .arg(vol_arg)
            .stdout(std::process::Stdio::null())
            .stderr(stderr_file)
            .kill_on_drop(true)
            .spawn()?;
        info!(
            "mpv: spawned {} (pid {:?}), stderr → {}",
            mpv_binary.display(),
            child.id(),
            stderr_path.display()
        );
        self.process = Some(child);
        Ok(())
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        self.spawn_process()?;

        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(read_half, write_half, event_tx))
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
        self.spawn_process()?;

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(read_half, write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

fn start_io_tasks<R, W>(read_half: R, write_half: W, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);
    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));
    MpvHandle { tx: cmd_tx }
}

async fn fail_all(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap, event_tx: mpsc::Sender<MpvEvent>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_all(&pending, "mpv IPC connection closed").await;
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
                    let reply = pending.lock().await.remove(&req_id);
                    match reply {
                        Some(tx) => {
                            let result = if val["error"].as_str() == Some("success") {
                                Ok(val)
                            } else {
                                let err = val["error"].as_str().unwrap_or("unknown error");
                                Err(anyhow::anyhow!("mpv error: {}", err))
                            };
                            let _ = tx.send(result);
                        }
                        None => debug!("mpv reader: response for unknown req={}", req_id),
                    }
                } else if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                    debug!("mpv reader: event receiver gone");
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_all(&pending, "mpv IPC read error").await;
                break;
            }
        }
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // register before writing so the reader can always match the reply
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: req={} {}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

// ── event translation ─────────────────────────────────────────────────────────

/// Load ids sent with `loadfile` whose `start-file` has not been seen yet.
pub type PendingLoads = Arc<std::sync::Mutex<VecDeque<u64>>>;

/// Turns raw mpv events into engine [`AudioEvent`]s.
///
/// Each `start-file` claims the oldest pending load id, and every event up
/// to the next `start-file` is tagged with it.  Anything seen before the
/// first claimed file carries load id 0, which the engine never issues.
#[derive(Debug, Default)]
pub struct EventTranslator {
    pending: PendingLoads,
    load_id: u64,
    duration: Option<f64>,
    metadata_sent: bool,
}

impl EventTranslator {
    pub fn new(pending: PendingLoads) -> Self {
        Self {
            pending,
            ..Self::default()
        }
    }

    pub fn translate(&mut self, evt: &MpvEvent) -> Option<AudioEvent> {
        if let Some((id, data)) = evt.as_property_change() {
            let value = data.as_f64().filter(|v| v.is_finite());
            return match id {
                OBS_DURATION => {
                    self.duration = value;
                    let duration = value.filter(|d| *d > 0.0)?;
                    if self.metadata_sent {
                        return None;
                    }
                    self.metadata_sent = true;
                    Some(AudioEvent::MetadataReady {
                        load_id: self.load_id,
                        duration,
                    })
                }
                OBS_TIME_POS => value.map(|position| AudioEvent::TimeUpdate {
                    load_id: self.load_id,
                    position,
                    duration: self.duration,
                }),
                _ => None,
            };
        }

        match evt.event_name() {
            Some("start-file") => {
                let claimed = match self.pending.lock() {
                    Ok(mut pending) => pending.pop_front(),
                    Err(_) => None,
                };
                self.load_id = claimed.unwrap_or(0);
                self.duration = None;
                self.metadata_sent = false;
                debug!("mpv: start-file for load #{}", self.load_id);
                None
            }
            Some("end-file") => {
                let reason = evt.raw.get("reason").and_then(|v| v.as_str());
                debug!("mpv: end-file load #{} reason={:?}", self.load_id, reason);
                (reason == Some("eof")).then_some(AudioEvent::Ended {
                    load_id: self.load_id,
                })
            }
            _ => None,
        }
    }
}

// ── AudioOutput ───────────────────────────────────────────────────────────────

pub struct MpvOutput {
    driver: MpvDriver,
    handle: Option<MpvHandle>,
    audio_tx: mpsc::Sender<AudioEvent>,
    translator: Option<JoinHandle<()>>,
    pending: PendingLoads,
}

impl MpvOutput {
    pub fn new(volume: f32, audio_tx: mpsc::Sender<AudioEvent>) -> Self {
        Self {
            driver: MpvDriver::new(volume),
            handle: None,
            audio_tx,
            translator: None,
            pending: PendingLoads::default(),
        }
    }

    fn with_pending(&self, f: impl FnOnce(&mut VecDeque<u64>)) {
        match self.pending.lock() {
            Ok(mut pending) => f(&mut pending),
            Err(_) => warn!("mpv: pending load queue poisoned"),
        }
    }

    /// Live handle, spawning (or respawning) mpv when needed.
    async fn connected(&mut self) -> anyhow::Result<MpvHandle> {
        if let Some(handle) = &self.handle {
            if self.driver.process_alive() {
                return Ok(handle.clone());
            }
            warn!("mpv: process gone, respawning");
        }
        if let Some(task) = self.translator.take() {
            task.abort();
        }

        // loads sent to a dead process will never start
        self.with_pending(VecDeque::clear);

        let (event_tx, mut event_rx) = mpsc::channel::<MpvEvent>(256);
        let handle = self.driver.spawn_and_connect(event_tx).await?;
        handle.observe_properties().await;

        let audio_tx = self.audio_tx.clone();
        let pending = Arc::clone(&self.pending);
        self.translator = Some(tokio::spawn(async move {
            let mut translator = EventTranslator::new(pending);
            while let Some(evt) = event_rx.recv().await {
                if let Some(audio) = translator.translate(&evt) {
                    if audio_tx.send(audio).await.is_err() {
                        break;
                    }
                }
            }
        }));
        self.handle = Some(handle.clone());
        Ok(handle)
    }
}

impl AudioOutput for MpvOutput {
    async fn load(&mut self, load_id: u64, url: &str) -> anyhow::Result<()> {
        let handle = self.connected().await?;
        // queue before loadfile so its start-file always finds the id
        self.with_pending(|pending| pending.push_back(load_id));
        let result = handle.load_paused(url).await;
        if result.is_err() {
            self.with_pending(|pending| pending.retain(|id| *id != load_id));
        }
        result
    }

    async fn play(&mut self) -> anyhow::Result<()> {
        self.connected().await?.set_property("pause", json!(false)).await
    }

    async fn pause(&mut self) -> anyhow::Result<()> {
        self.connected().await?.set_property("pause", json!(true)).await
    }

    async fn seek(&mut self, secs: f64) -> anyhow::Result<()> {
        self.connected().await?.seek_absolute(secs).await
    }

    async fn set_muted(&mut self, muted: bool) -> anyhow::Result<()> {
        self.connected().await?.set_property("mute", json!(muted)).await
    }
}

impl Drop for MpvOutput {
    fn drop(&mut self) {
        if let Some(task) = self.translator.take() {
            task.abort();
        }
    }
}
