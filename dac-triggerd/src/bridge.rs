//! JSON-lines bridge to a media-system process
//!
//! Zone subscription messages and settings requests come in one JSON object
//! per line; transport commands and settings replies go out the same way, so
//! a bridge process can be attached with a pair of pipes:
//!
//! ```text
//! in:  {"cmd":"Changed","data":{"zones_changed":[{"zone_id":"z1","display_name":"Den","state":"playing"}]}}
//! out: {"zone_id":"z1","control":"pause"}
//! in:  {"cmd":"SaveSettings","data":{"values":{"turnOnPause":30},"dry_run":true}}
//! out: {"cmd":"SettingsSaved","data":{"status":"NotValid","settings":{...},"persisted":false}}
//! in:  {"cmd":"GetSettings"}
//! out: {"cmd":"Settings","data":{...}}
//! ```
//!
//! Output is queued to a single writer task. The service loop never waits on
//! the pipe; when the queue is full the line is dropped and logged.

use anyhow::Result;
use dac_trigger::{
    Control, SaveOutcome, Settings, SettingsLayout, TriggerHandle, ZoneEvent, ZoneId,
    ZoneTransport,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Lines queued for output before new ones are dropped
pub const OUTPUT_QUEUE: usize = 64;

/// Queues JSON lines for a writer task; clones share the queue
#[derive(Debug, Clone)]
pub struct LineWriter {
    tx: mpsc::Sender<String>,
}

impl LineWriter {
    /// A writer and the receiving end of its queue
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Start a task writing queued lines to `out`
    ///
    /// The task returns `out` once every clone of the writer is dropped and
    /// the queue is drained.
    pub fn spawn<W>(out: W, capacity: usize) -> (Self, JoinHandle<W>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (writer, rx) = Self::channel(capacity);
        (writer, tokio::spawn(write_lines(out, rx)))
    }

    /// Queue `value` as one line without waiting; false if it was dropped
    pub fn send<T: Serialize>(&self, value: &T) -> bool {
        let line = match serde_json::to_string(value) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to encode output line: {}", e);
                return false;
            }
        };

        match self.tx.try_send(line) {
            Ok(()) => true,
            Err(TrySendError::Full(line)) => {
                warn!("Output queue full, dropping {}", line);
                false
            }
            Err(TrySendError::Closed(line)) => {
                debug!("Output closed, dropping {}", line);
                false
            }
        }
    }
}

async fn write_lines<W>(mut out: W, mut rx: mpsc::Receiver<String>) -> W
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        if let Err(e) = write_line(&mut out, &line).await {
            error!("Failed to write output line: {}", e);
        }
    }
    out
}

async fn write_line<W: AsyncWrite + Unpin>(out: &mut W, line: &str) -> std::io::Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

#[derive(Debug, Serialize)]
struct ControlLine<'a> {
    zone_id: &'a ZoneId,
    control: Control,
}

/// Sends each transport command as a JSON line
#[derive(Debug, Clone)]
pub struct JsonLinesTransport {
    lines: LineWriter,
}

impl JsonLinesTransport {
    pub fn new(lines: LineWriter) -> Self {
        Self { lines }
    }
}

impl ZoneTransport for JsonLinesTransport {
    fn control(&self, zone: &ZoneId, control: Control) {
        let line = ControlLine {
            zone_id: zone,
            control,
        };
        if !self.lines.send(&line) {
            error!("Failed to send {} to zone {}", control, zone);
        }
    }
}

/// One input line
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Request {
    Zone(ZoneEvent),
    Settings(SettingsRequest),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", content = "data")]
enum SettingsRequest {
    SaveSettings {
        values: Settings,
        #[serde(default)]
        dry_run: bool,
    },
    GetSettings,
}

#[derive(Debug, Serialize)]
#[serde(tag = "cmd", content = "data")]
enum Reply<'a> {
    SettingsSaved(&'a SaveOutcome),
    Settings(&'a SettingsLayout),
}

/// Counts from one run of [`serve_requests`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BridgeStats {
    /// Zone events passed to the service
    pub forwarded: usize,
    /// Settings requests answered
    pub answered: usize,
    pub rejected: usize,
}

/// Serve requests from `reader` until end of input or service stop
///
/// Zone events are forwarded to the service. Settings requests are answered
/// with one reply line on `lines`. Blank lines are skipped; anything else is
/// logged and counted as rejected.
pub async fn serve_requests<R>(
    reader: R,
    handle: &TriggerHandle,
    lines: &LineWriter,
) -> Result<BridgeStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut input = reader.lines();
    let mut stats = BridgeStats::default();

    while let Some(line) = input.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<Request>(line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Ignoring malformed request: {}", e);
                stats.rejected += 1;
                continue;
            }
        };

        let served = match request {
            Request::Zone(event) => handle.zone_event(event).await.map(|()| {
                stats.forwarded += 1;
            }),
            Request::Settings(SettingsRequest::SaveSettings { values, dry_run }) => handle
                .save_settings(values, dry_run)
                .await
                .map(|outcome| {
                    lines.send(&Reply::SettingsSaved(&outcome));
                    stats.answered += 1;
                }),
            Request::Settings(SettingsRequest::GetSettings) => {
                handle.settings().await.map(|layout| {
                    lines.send(&Reply::Settings(&layout));
                    stats.answered += 1;
                })
            }
        };

        if served.is_err() {
            debug!("Trigger service stopped, no longer serving requests");
            break;
        }
    }

    Ok(stats)
}
