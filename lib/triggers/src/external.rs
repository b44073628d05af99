//! External-process trigger (§4.7): spawns a child process running the
//! configured file and speaks the line-delimited JSON IPC protocol (§6).

use crate::error::TriggerRunError;
use crate::ipc::{ChildMessage, ChildStatus, HostMessage};
use crate::runner::{FireSink, TriggerRunner};
use crate::trigger::TriggerKind;
use async_trait::async_trait;
use serde_json::Value;
use silver_telegram_core::TriggerId;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct RunningChild {
    child: Child,
    stdin: Arc<Mutex<ChildStdin>>,
    cancel: CancellationToken,
    reader_task: JoinHandle<()>,
    driver_task: JoinHandle<()>,
}

/// Spawns a child process and drives the host side of the IPC protocol
/// for it.
pub struct ExternalProcessTrigger {
    id: TriggerId,
    file_path: String,
    config: Value,
    fire_sink: Arc<dyn FireSink>,
    ready_timeout: Duration,
    ready: Arc<AtomicBool>,
    running: Mutex<Option<RunningChild>>,
}

impl ExternalProcessTrigger {
    /// Builds an external-process trigger.
    #[must_use]
    pub fn new(
        id: TriggerId,
        file_path: impl Into<String>,
        config: Value,
        fire_sink: Arc<dyn FireSink>,
        ready_timeout: Duration,
    ) -> Self {
        Self {
            id,
            file_path: file_path.into(),
            config,
            fire_sink,
            ready_timeout,
            ready: Arc::new(AtomicBool::new(false)),
            running: Mutex::new(None),
        }
    }

    async fn write_message(stdin: &Arc<Mutex<ChildStdin>>, message: &HostMessage) -> Result<(), TriggerRunError> {
        let mut line = serde_json::to_string(message)
            .map_err(|err| TriggerRunError::Ipc(format!("failed to serialize message: {err}")))?;
        line.push('\n');
        let mut guard = stdin.lock().await;
        guard
            .write_all(line.as_bytes())
            .await
            .map_err(|err| TriggerRunError::Ipc(format!("failed to write to child: {err}")))
    }
}

#[async_trait]
impl TriggerRunner for ExternalProcessTrigger {
    fn id(&self) -> TriggerId {
        self.id
    }

    fn kind(&self) -> TriggerKind {
        TriggerKind::External
    }

    async fn start(&self, parent_cancel: CancellationToken) -> Result<(), TriggerRunError> {
        if tokio::fs::metadata(&self.file_path).await.is_err() {
            return Err(TriggerRunError::Io(format!(
                "trigger file does not exist: {}",
                self.file_path
            )));
        }

        let mut child = Command::new(&self.file_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|err| TriggerRunError::Io(format!("failed to spawn child: {err}")))?;

        let stdin = Arc::new(Mutex::new(
            child
                .stdin
                .take()
                .ok_or_else(|| TriggerRunError::Io("child has no stdin".to_string()))?,
        ));
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TriggerRunError::Io("child has no stdout".to_string()))?;

        let (tx, mut rx) = mpsc::channel::<ChildMessage>(32);
        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match serde_json::from_str::<ChildMessage>(&line) {
                        Ok(message) => {
                            if tx.send(message).await.is_err() {
                                return;
                            }
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, line = %line, "malformed line from trigger child");
                        }
                    },
                    Ok(None) | Err(_) => return,
                }
            }
        });

        Self::write_message(&stdin, &HostMessage::Start { config: self.config.clone() }).await?;

        let first = tokio::time::timeout(self.ready_timeout, rx.recv()).await;
        match first {
            Ok(Some(ChildMessage::Status {
                status: ChildStatus::Ready,
                ..
            })) => {}
            Ok(Some(ChildMessage::Status {
                status: ChildStatus::Error,
                message,
            })) => {
                let _ = child.kill().await;
                return Err(TriggerRunError::Ipc(format!(
                    "child reported startup error: {}",
                    message.unwrap_or_default()
                )));
            }
            Ok(Some(_)) => {
                let _ = child.kill().await;
                return Err(TriggerRunError::Ipc("expected a status message first".to_string()));
            }
            Ok(None) => {
                let _ = child.kill().await;
                return Err(TriggerRunError::Ipc("child closed its output before becoming ready".to_string()));
            }
            Err(_) => {
                let _ = child.kill().await;
                return Err(TriggerRunError::Ipc("timed out waiting for child readiness".to_string()));
            }
        }

        let cancel = parent_cancel.child_token();
        let driver_fire_sink = Arc::clone(&self.fire_sink);
        let driver_stdin = Arc::clone(&stdin);
        let driver_id = self.id;
        let driver_cancel = cancel.clone();
        let driver_task = tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    () = driver_cancel.cancelled() => return,
                    message = rx.recv() => message,
                };
                let Some(message) = message else { return };
                match message {
                    ChildMessage::Event { request_id, payload } => {
                        let fire_sink = Arc::clone(&driver_fire_sink);
                        let stdin = Arc::clone(&driver_stdin);
                        tokio::spawn(async move {
                            let outcome = fire_sink.fire(driver_id, Some(payload)).await;
                            let _ = outcome;
                            let reply = HostMessage::Reply {
                                request_id,
                                error: None,
                            };
                            if let Err(err) = ExternalProcessTrigger::write_message(&stdin, &reply).await {
                                tracing::warn!(error = %err, "failed to reply to trigger child event");
                            }
                        });
                    }
                    ChildMessage::Error { message, .. } => {
                        tracing::warn!(trigger = %driver_id, message = %message, "external trigger child reported an error");
                    }
                    ChildMessage::Status { .. } => {
                        tracing::warn!(trigger = %driver_id, "unexpected status message after startup");
                    }
                }
            }
        });

        self.ready.store(true, Ordering::SeqCst);
        *self.running.lock().await = Some(RunningChild {
            child,
            stdin,
            cancel,
            reader_task,
            driver_task,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<(), TriggerRunError> {
        self.ready.store(false, Ordering::SeqCst);
        let Some(mut running) = self.running.lock().await.take() else {
            return Ok(());
        };

        let _ = Self::write_message(&running.stdin, &HostMessage::Kill).await;
        running.cancel.cancel();
        running.driver_task.abort();
        running.reader_task.abort();
        let _ = running.child.wait().await;
        Ok(())
    }

    async fn invoke(&self, payload: Value) -> Result<(), TriggerRunError> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(TriggerRunError::NotReady);
        }
        let running = self.running.lock().await;
        let Some(running) = running.as_ref() else {
            return Err(TriggerRunError::NotReady);
        };
        Self::write_message(&running.stdin, &HostMessage::Invoke { payload }).await
    }
}
