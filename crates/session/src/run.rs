use crate::error::{ErrorKind, Result};
use crate::prompt::BatchPrompt;
use crate::settings::ScanPreferences;
use crate::state::{Command, SessionEvent, SessionMachine, SessionState};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use quire_config::Configuration;
use quire_device::{DeviceHandle, PageArtifact, TransferMode};
use quire_output::{Materialized, OutputPipeline};
use std::collections::VecDeque;
use std::time::Duration;
use tempfile::TempDir;
use tracing::instrument;

/// Where a finished scan's pages go.
#[async_trait]
pub trait PageSink: Send + Sync {
    async fn deliver(&self, pages: &[PageArtifact]) -> Result<Vec<Materialized>>;
}

#[async_trait]
impl PageSink for OutputPipeline {
    async fn deliver(&self, pages: &[PageArtifact]) -> Result<Vec<Materialized>> {
        self.process(pages).await.or_raise(|| ErrorKind::Output)
    }
}

/// How a successful session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionReport {
    pub pages: usize,
    pub outputs: Vec<Materialized>,
}

/// Drives one device through a [`SessionMachine`].
///
/// Owns the device for the whole session. Device events are consumed one at
/// a time; each command the machine answers with is carried out before the
/// next event is read.
pub struct ScanSession {
    device: DeviceHandle,
    machine: SessionMachine,
    prompt: Box<dyn BatchPrompt>,
    idle_timeout: Duration,
    // Holds file-transfer pages until the sink has copied them.
    _scratch: Option<TempDir>,
}
impl ScanSession {
    pub fn new(device: DeviceHandle, config: &Configuration, prompt: Box<dyn BatchPrompt>) -> Result<Self> {
        let transfer = device.transfer_mode();
        let scratch = match transfer {
            TransferMode::File => {
                Some(tempfile::Builder::new().prefix("quire-").tempdir().or_raise(|| ErrorKind::Scratch)?)
            },
            TransferMode::Memory => None,
        };
        let download_dir = scratch.as_ref().map(|dir| dir.path().to_path_buf());
        tracing::debug!(%transfer, download_dir = ?download_dir, "Preparing session");
        Ok(Self {
            device,
            machine: SessionMachine::new(ScanPreferences::from_config(config), transfer, download_dir),
            prompt,
            idle_timeout: config.session_timeout(),
            _scratch: scratch,
        })
    }

    /// Runs the session to a terminal state.
    ///
    /// Fails if the device, the band data or the sink fails. The device is
    /// released when this returns, whatever the outcome.
    #[instrument(skip_all, fields(device = %self.device.info().name))]
    pub async fn run(mut self, sink: &dyn PageSink) -> Result<SessionReport> {
        let mut events = self.device.take_events().ok_or_raise(|| ErrorKind::Disconnected)?;
        let mut outputs = Vec::new();
        let mut pending: VecDeque<Command> = self.machine.start().into();
        loop {
            while let Some(command) = pending.pop_front() {
                if let Some(event) = self.execute(command, sink, &mut outputs).await {
                    pending.extend(self.machine.handle(event));
                }
            }
            if self.machine.state().is_terminal() {
                break;
            }
            let event = match tokio::time::timeout(self.idle_timeout, events.recv()).await {
                Ok(Some(event)) => SessionEvent::Device(event),
                Ok(None) => SessionEvent::Disconnected,
                Err(_) => {
                    tracing::debug!(seconds = self.idle_timeout.as_secs(), state = %self.machine.state(), "No event from scanner");
                    SessionEvent::TimedOut
                },
            };
            pending.extend(self.machine.handle(event));
        }

        match self.machine.state() {
            SessionState::Succeeded => Ok(SessionReport { pages: self.machine.pages().len(), outputs }),
            _ => {
                let kind = self.machine.failure().cloned().unwrap_or(ErrorKind::Disconnected);
                exn::bail!(kind)
            },
        }
    }

    /// Carries out one command, returning the local event it produces.
    async fn execute(
        &mut self,
        command: Command,
        sink: &dyn PageSink,
        outputs: &mut Vec<Materialized>,
    ) -> Option<SessionEvent> {
        tracing::trace!(?command, "Executing");
        match command {
            Command::OpenSession => {
                tracing::info!("Opening session with {}", self.device.info());
                self.device.open_session().await.err().map(|e| failed("open session", &e))
            },
            Command::SelectUnit(kind) => self.device.select_unit(kind).await.err().map(|e| failed("select unit", &e)),
            Command::Configure(settings) => match self.device.configure(&settings).await {
                Ok(()) => Some(SessionEvent::ConfigurationApplied),
                Err(e) => Some(failed("configure", &e)),
            },
            Command::RequestScan => {
                tracing::info!("Scanning");
                self.device.request_scan().await.err().map(|e| failed("scan", &e))
            },
            Command::PromptBatch => Some(SessionEvent::BatchDecision(self.prompt.next_page().await)),
            Command::CloseSession => {
                if let Err(e) = self.device.close_session().await {
                    tracing::warn!(error = ?e, "Could not close the scanner session");
                }
                None
            },
            Command::Deliver => match sink.deliver(self.machine.pages()).await {
                Ok(written) => {
                    *outputs = written;
                    Some(SessionEvent::OutputFinished(true))
                },
                Err(e) => {
                    tracing::error!(error = ?e, "Could not write scanned pages");
                    Some(SessionEvent::OutputFinished(false))
                },
            },
        }
    }
}

fn failed(request: &'static str, error: &quire_device::error::Error) -> SessionEvent {
    tracing::error!(error = ?error, "Could not send {request} request");
    SessionEvent::RequestFailed(request)
}
