//! Output forwarding for the supervised process.
//!
//! Each of the child's streams is read line by line, written to its sink
//! (a file or the host's own stream) and checked against the readiness
//! probe.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;

use super::process::Shared;
use crate::core::error::{LauncherError, LauncherResult};

/// Longest line kept in memory; longer output is forwarded in pieces.
const MAX_LINE_BYTES: u64 = 64 * 1024;

#[derive(Debug, Clone, Copy)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

pub(super) enum OutputSink {
    Host(StreamKind),
    File(tokio::fs::File),
    Discard,
}

impl OutputSink {
    /// A file sink when `path` is set, the matching host stream otherwise.
    pub(super) async fn open(path: Option<&Path>, kind: StreamKind) -> LauncherResult<Self> {
        let Some(path) = path else {
            return Ok(OutputSink::Host(kind));
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| LauncherError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let file = tokio::fs::File::create(path)
            .await
            .map_err(|source| LauncherError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(OutputSink::File(file))
    }

    async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        match self {
            OutputSink::Host(StreamKind::Stdout) => {
                let mut out = tokio::io::stdout();
                out.write_all(&buf).await?;
                out.flush().await
            }
            OutputSink::Host(StreamKind::Stderr) => {
                let mut err = tokio::io::stderr();
                err.write_all(&buf).await?;
                err.flush().await
            }
            OutputSink::File(file) => {
                file.write_all(&buf).await?;
                file.flush().await
            }
            OutputSink::Discard => Ok(()),
        }
    }
}

/// Spawn a task that drains `stream` until the child closes it.
pub(super) fn spawn_stream_forwarder<S>(
    stream: S,
    kind: StreamKind,
    mut sink: OutputSink,
    shared: Arc<Shared>,
) -> JoinHandle<()>
where
    S: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let launch_id = shared.launch_id();
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match (&mut reader)
                .take(MAX_LINE_BYTES)
                .read_until(b'\n', &mut buf)
                .await
            {
                Ok(0) => {
                    tracing::debug!(launch_id = %launch_id, stream = %kind, "output stream closed");
                    break;
                }
                Ok(_) => {
                    // The JVM's output encoding follows the platform locale.
                    let decoded = String::from_utf8_lossy(&buf);
                    let line = decoded.trim_end_matches(['\r', '\n']);
                    if let Err(e) = sink.write_line(line).await {
                        tracing::warn!(
                            launch_id = %launch_id,
                            stream = %kind,
                            error = %e,
                            "output sink failed, discarding further output"
                        );
                        sink = OutputSink::Discard;
                    }
                    tracing::trace!(launch_id = %launch_id, stream = %kind, "{line}");
                    shared.observe_line(line);
                }
                Err(e) => {
                    tracing::warn!(
                        launch_id = %launch_id,
                        stream = %kind,
                        error = %e,
                        "output stream read error"
                    );
                    break;
                }
            }
        }
    })
}
