//! Time-bounded device discovery and selection.

use crate::backend::DiscoveryHandle;
use crate::error::{ErrorKind, Result};
use crate::models::DeviceInfo;
use exn::ResultExt;
use futures::StreamExt;
use std::pin::pin;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Which discovered device to pick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// The first device discovered.
    Any,
    /// The first device whose name (or id) contains the pattern, ignoring case.
    Contains(String),
    /// The first device whose name (or id) is exactly the pattern.
    Exact(String),
}
impl Selector {
    pub fn new(pattern: Option<&str>, exact: bool) -> Self {
        match pattern {
            None => Self::Any,
            Some(p) if exact => Self::Exact(p.to_string()),
            Some(p) => Self::Contains(p.to_lowercase()),
        }
    }

    pub fn matches(&self, device: &DeviceInfo) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(pattern) => device.name == *pattern || device.id == *pattern,
            Self::Contains(pattern) => {
                device.name.to_lowercase().contains(pattern) || device.id.to_lowercase().contains(pattern)
            },
        }
    }
}

/// What discovery is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrowseMode {
    /// Stop at the first device accepted by the [`Selector`].
    Select,
    /// Report every device seen during the window.
    List,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrowseOutcome {
    Selected(DeviceInfo),
    Listed(Vec<DeviceInfo>),
    NotFound,
}
impl BrowseOutcome {
    /// The selected device, or [`ErrorKind::NotFound`].
    pub fn into_selected(self) -> Result<DeviceInfo> {
        match self {
            Self::Selected(device) => Ok(device),
            Self::Listed(_) | Self::NotFound => exn::bail!(ErrorKind::NotFound),
        }
    }
}

/// Runs discovery against a [`DiscoveryHandle`] for a bounded time.
pub struct DeviceBrowser {
    discovery: DiscoveryHandle,
    selector: Selector,
    mode: BrowseMode,
}
impl DeviceBrowser {
    pub fn new(discovery: DiscoveryHandle, selector: Selector, mode: BrowseMode) -> Self {
        Self { discovery, selector, mode }
    }

    /// Starts discovery in the background and returns immediately.
    ///
    /// Discovery ends when a device is selected, when `timeout` elapses, when
    /// [`Browse::stop`] is called, or when the platform reports enumeration is
    /// complete. A finished browse cannot be resumed.
    pub fn browse(self, timeout: Duration) -> Browse {
        let cancel = CancellationToken::new();
        let span = tracing::debug_span!("browse", timeout_secs = timeout.as_secs_f32(), mode = ?self.mode);
        tracing::debug!(seconds = timeout.as_secs_f32(), "Waiting to find scanners");
        let task = tokio::spawn(self.run(timeout, cancel.clone()).instrument(span));
        Browse { cancel, task }
    }

    async fn run(self, timeout: Duration, cancel: CancellationToken) -> BrowseOutcome {
        let mut listed = Vec::new();
        let mut devices = self.discovery.discover();
        let mut deadline = pin!(tokio::time::sleep(timeout));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Discovery stopped");
                    break;
                },
                _ = &mut deadline => {
                    tracing::debug!("Discovery window elapsed");
                    break;
                },
                next = devices.next() => match next {
                    Some(Ok(device)) => {
                        tracing::debug!(name = %device.name, id = %device.id, transport = %device.transport, "Found device");
                        match self.mode {
                            BrowseMode::List => {
                                tracing::info!("* {}", device.name);
                                listed.push(device);
                            },
                            BrowseMode::Select if self.selector.matches(&device) => {
                                return BrowseOutcome::Selected(device);
                            },
                            BrowseMode::Select => tracing::debug!(name = %device.name, "Device does not match selector"),
                        }
                    },
                    Some(Err(e)) => tracing::warn!(error = ?e, "Error during discovery; continuing"),
                    None => {
                        tracing::debug!("Discovery reported enumeration complete");
                        break;
                    },
                },
            }
        }
        match self.mode {
            BrowseMode::List => BrowseOutcome::Listed(listed),
            BrowseMode::Select => BrowseOutcome::NotFound,
        }
    }
}

/// A running discovery.
pub struct Browse {
    cancel: CancellationToken,
    task: JoinHandle<BrowseOutcome>,
}
impl Browse {
    /// Requests discovery to stop. Safe to call any number of times, including
    /// after discovery has already finished.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Waits for discovery to finish.
    pub async fn outcome(self) -> Result<BrowseOutcome> {
        self.task.await.or_raise(|| ErrorKind::Discovery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockDevice, MockDiscovery};
    use rstest::rstest;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn device(name: &str) -> DeviceInfo {
        DeviceInfo::new(name, format!("id-{}", name.to_lowercase().replace(' ', "-")), "mock")
    }

    #[rstest]
    #[case(Selector::Any, "Anything", true)]
    #[case(Selector::new(Some("epson"), false), "EPSON Perfection V39", true)]
    #[case(Selector::new(Some("Canon"), false), "EPSON Perfection V39", false)]
    #[case(Selector::new(Some("EPSON"), true), "EPSON Perfection V39", false)]
    #[case(Selector::new(Some("EPSON Perfection V39"), true), "EPSON Perfection V39", true)]
    #[case(Selector::new(Some("epson perfection v39"), true), "EPSON Perfection V39", false)]
    fn test_selector(#[case] selector: Selector, #[case] name: &str, #[case] expected: bool) {
        assert_eq!(selector.matches(&device(name)), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_selects_first_match() {
        let discovery = MockDiscovery::new()
            .with_device(Duration::from_millis(100), device("Canon LiDE"))
            .with_device(Duration::from_millis(100), device("Epson One"))
            .with_device(Duration::from_millis(100), device("Epson Two"));
        let browser = DeviceBrowser::new(Arc::new(discovery), Selector::new(Some("epson"), false), BrowseMode::Select);
        let outcome = browser.browse(Duration::from_secs(10)).outcome().await.unwrap();
        assert_eq!(outcome, BrowseOutcome::Selected(device("Epson One")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_with_no_devices() {
        let browser = DeviceBrowser::new(Arc::new(MockDiscovery::new()), Selector::Any, BrowseMode::Select);
        let started = Instant::now();
        let outcome = browser.browse(Duration::from_secs(1)).outcome().await.unwrap();
        assert_eq!(outcome, BrowseOutcome::NotFound);
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(outcome.into_selected().map_err(|e| (*e).clone()).unwrap_err(), ErrorKind::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_after_deadline_is_ignored() {
        let discovery = MockDiscovery::new().with_device(Duration::from_secs(5), device("Late"));
        let browser = DeviceBrowser::new(Arc::new(discovery), Selector::Any, BrowseMode::Select);
        let outcome = browser.browse(Duration::from_secs(2)).outcome().await.unwrap();
        assert_eq!(outcome, BrowseOutcome::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_reports_everything_in_window() {
        let discovery = MockDiscovery::new()
            .with_device(Duration::from_millis(10), device("One"))
            .with_device(Duration::from_millis(10), device("Two"));
        let browser = DeviceBrowser::new(Arc::new(discovery), Selector::new(Some("one"), false), BrowseMode::List);
        let outcome = browser.browse(Duration::from_secs(1)).outcome().await.unwrap();
        assert_eq!(outcome, BrowseOutcome::Listed(vec![device("One"), device("Two")]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_enumeration_complete_ends_early() {
        let discovery = MockDiscovery::new().with_device(Duration::from_millis(10), device("Only")).finite();
        let browser = DeviceBrowser::new(Arc::new(discovery), Selector::Any, BrowseMode::List);
        let started = Instant::now();
        let outcome = browser.browse(Duration::from_secs(10)).outcome().await.unwrap();
        assert_eq!(outcome, BrowseOutcome::Listed(vec![device("Only")]));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let browser = DeviceBrowser::new(Arc::new(MockDiscovery::new()), Selector::Any, BrowseMode::Select);
        let browse = browser.browse(Duration::from_secs(3600));
        browse.stop();
        browse.stop();
        let started = Instant::now();
        assert_eq!(browse.outcome().await.unwrap(), BrowseOutcome::NotFound);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_selected_device_connects_once() {
        let discovery: DiscoveryHandle = Arc::new(
            MockDiscovery::new()
                .with_device(Duration::from_millis(10), device("Canon LiDE"))
                .with_connectable(Duration::from_millis(10), MockDevice::new("Epson One")),
        );
        let selector = Selector::new(Some("epson"), false);
        let browser = DeviceBrowser::new(Arc::clone(&discovery), selector, BrowseMode::Select);
        let selected = browser.browse(Duration::from_secs(10)).outcome().await.unwrap().into_selected().unwrap();
        assert_eq!(selected.id, "mock:Epson One");

        let handle = discovery.connect(&selected).await.unwrap();
        assert_eq!(handle.info(), &selected);
        let Err(err) = discovery.connect(&selected).await else { panic!("connected to the same device twice") };
        assert_eq!(*err, ErrorKind::Connect("Epson One".into()));
        let Err(err) = discovery.connect(&device("Canon LiDE")).await else { panic!("connected without a handle") };
        assert_eq!(*err, ErrorKind::Connect("Canon LiDE".into()));
    }
}
