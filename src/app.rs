//! One invocation from configuration to filed pages.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use quire_config::Configuration;
use quire_device::backend::FolderDiscovery;
use quire_device::{BrowseMode, BrowseOutcome, DeviceBrowser, DeviceInfo, DiscoveryHandle, Selector};
use quire_output::OutputPipeline;
use quire_session::{BatchPrompt, ScanSession, SessionReport};
use std::sync::Arc;
use time::{OffsetDateTime, UtcOffset};
use tracing::instrument;

/// How a successful invocation ended.
#[derive(Debug)]
pub enum Outcome {
    /// `list` was set; these devices were seen.
    Listed(Vec<DeviceInfo>),
    Scanned(SessionReport),
}

/// The devices declared in the configuration.
pub fn discovery(config: &Configuration) -> DiscoveryHandle {
    Arc::new(FolderDiscovery::new(&config.devices))
}

/// Finds a scanner on `discovery`, scans with it, and files the pages.
///
/// Outputs are named and dated from the moment the session starts, in the
/// local `offset`.
#[instrument(skip_all, fields(list = config.list))]
pub async fn run(
    config: &Configuration,
    discovery: DiscoveryHandle,
    prompt: Box<dyn BatchPrompt>,
    offset: UtcOffset,
) -> Result<Outcome> {
    let mode = if config.list { BrowseMode::List } else { BrowseMode::Select };
    let selector = Selector::new(config.scanner.as_deref(), config.exact);
    let browser = DeviceBrowser::new(Arc::clone(&discovery), selector, mode);
    let outcome = browser.browse(config.browse_timeout()).outcome().await.or_raise(|| ErrorKind::Discovery)?;

    let device = match outcome {
        BrowseOutcome::Listed(devices) => {
            if devices.is_empty() {
                tracing::warn!("No scanners found");
            }
            return Ok(Outcome::Listed(devices));
        },
        outcome => outcome.into_selected().or_raise(|| ErrorKind::NotFound)?,
    };
    tracing::info!("Using {device}");

    let handle = discovery.connect(&device).await.or_raise(|| ErrorKind::Connect(device.name.clone()))?;
    let session = match ScanSession::new(handle, config, prompt) {
        Ok(session) => session,
        Err(e) => return session_failed(e),
    };
    let started_at = OffsetDateTime::now_utc().to_offset(offset);
    let pipeline = OutputPipeline::new(config, started_at);
    match session.run(&pipeline).await {
        Ok(report) => {
            tracing::info!(pages = report.pages, outputs = report.outputs.len(), "Done");
            Ok(Outcome::Scanned(report))
        },
        Err(e) => session_failed(e),
    }
}

fn session_failed<T>(e: quire_session::error::Error) -> Result<T> {
    let reason = (*e).to_string();
    Err(e).or_raise(|| ErrorKind::Session(reason))
}
