//! The scan session as an explicit state machine.
//!
//! [`SessionMachine`] never talks to a device. It consumes one
//! [`SessionEvent`] at a time and answers with the [`Command`]s the driver
//! must carry out, which keeps every transition testable with synthetic
//! events.

use crate::error::ErrorKind;
use crate::prompt::BatchDecision;
use crate::settings::{ScanPreferences, negotiate};
use derive_more::Display;
use quire_device::{
    Assembly, BandAssembler, DeviceEvent, FunctionalUnit, PageArtifact, ScanSettings, TransferMode, UnitKind,
};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum SessionState {
    Idle,
    SessionOpening,
    UnitSelecting,
    Configuring,
    Scanning,
    /// Waiting for the user to decide whether to scan another page.
    PageComplete,
    Closing,
    Succeeded,
    Failed,
}
impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Everything the machine reacts to.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    Device(DeviceEvent),
    /// The negotiated settings were handed to the device.
    ConfigurationApplied,
    BatchDecision(BatchDecision),
    /// The output sink finished with the pages, successfully or not.
    OutputFinished(bool),
    /// A request could not be sent at all.
    RequestFailed(&'static str),
    /// No device event arrived within the idle timeout.
    TimedOut,
    /// The device's event channel closed.
    Disconnected,
}

/// Work the driver must do on the machine's behalf.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    OpenSession,
    SelectUnit(UnitKind),
    Configure(Box<ScanSettings>),
    RequestScan,
    /// Ask whether to scan another page.
    PromptBatch,
    CloseSession,
    /// Hand [`SessionMachine::pages`] to the output sink.
    Deliver,
}

pub struct SessionMachine {
    state: SessionState,
    preferences: ScanPreferences,
    transfer: TransferMode,
    download_dir: Option<PathBuf>,
    unit: Option<FunctionalUnit>,
    settings: Option<ScanSettings>,
    pages: Vec<PageArtifact>,
    assembler: BandAssembler,
    failure: Option<ErrorKind>,
}
impl SessionMachine {
    pub fn new(preferences: ScanPreferences, transfer: TransferMode, download_dir: Option<PathBuf>) -> Self {
        Self {
            state: SessionState::Idle,
            preferences,
            transfer,
            download_dir,
            unit: None,
            settings: None,
            pages: Vec::new(),
            assembler: BandAssembler::new(),
            failure: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Pages collected so far, in scan order.
    pub fn pages(&self) -> &[PageArtifact] {
        &self.pages
    }

    /// The unit the device confirmed, once it has.
    pub fn unit(&self) -> Option<&FunctionalUnit> {
        self.unit.as_ref()
    }

    /// Why the session failed, once it has.
    pub fn failure(&self) -> Option<&ErrorKind> {
        self.failure.as_ref()
    }

    /// `Idle → SessionOpening`.
    pub fn start(&mut self) -> Vec<Command> {
        if self.state != SessionState::Idle {
            tracing::warn!(state = %self.state, "Session already started");
            return vec![];
        }
        self.transition(SessionState::SessionOpening);
        vec![Command::OpenSession]
    }

    /// Applies one event. Events arriving after a terminal state are ignored.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Command> {
        if self.state.is_terminal() {
            tracing::trace!(?event, state = %self.state, "Ignoring event after session ended");
            return vec![];
        }
        match event {
            SessionEvent::Device(event) => self.on_device(event),
            SessionEvent::ConfigurationApplied if self.state == SessionState::Configuring => {
                self.transition(SessionState::Scanning);
                vec![Command::RequestScan]
            },
            SessionEvent::BatchDecision(decision) if self.state == SessionState::PageComplete => match decision {
                BatchDecision::Continue => {
                    self.transition(SessionState::Scanning);
                    vec![Command::RequestScan]
                },
                BatchDecision::Stop => self.close(),
            },
            SessionEvent::OutputFinished(ok) if self.state == SessionState::Closing => match ok {
                true => {
                    self.transition(SessionState::Succeeded);
                    vec![]
                },
                false => self.fail(ErrorKind::Output),
            },
            SessionEvent::RequestFailed(request) => self.fail(ErrorKind::Request(request)),
            SessionEvent::TimedOut => self.fail(ErrorKind::Timeout),
            SessionEvent::Disconnected => self.fail(ErrorKind::Disconnected),
            event => {
                tracing::warn!(?event, state = %self.state, "Ignoring event unexpected in this state");
                vec![]
            },
        }
    }

    fn on_device(&mut self, event: DeviceEvent) -> Vec<Command> {
        use SessionState as S;
        match (self.state, event) {
            (_, DeviceEvent::Status(status)) => {
                tracing::debug!(%status, "Scanner status");
                vec![]
            },
            (_, DeviceEvent::Error(fault)) => self.fail(ErrorKind::Device(fault.message)),
            (_, DeviceEvent::Removed) => self.fail(ErrorKind::Removed),
            (S::Closing, DeviceEvent::SessionClosed(fault)) => {
                if let Some(fault) = fault {
                    tracing::warn!(%fault, "Scanner reported an error while closing the session");
                }
                vec![]
            },
            (_, DeviceEvent::SessionClosed(_)) => self.fail(ErrorKind::UnexpectedClose),

            (S::SessionOpening, DeviceEvent::SessionOpened(Some(fault))) => {
                self.fail(ErrorKind::OpenSession(fault.message))
            },
            (S::SessionOpening, DeviceEvent::SessionOpened(None)) => {
                tracing::debug!("Session opened; waiting for scanner to become ready");
                vec![]
            },
            (S::SessionOpening, DeviceEvent::DeviceReady) => {
                self.transition(S::UnitSelecting);
                vec![Command::SelectUnit(self.preferences.unit)]
            },

            (S::UnitSelecting, DeviceEvent::UnitSelected { error: Some(fault), .. }) => {
                self.fail(ErrorKind::UnitSelection(fault.message))
            },
            (S::UnitSelecting, DeviceEvent::UnitSelected { unit: None, error: None }) => {
                tracing::debug!("Unit confirmation carried no unit; waiting for another");
                vec![]
            },
            (S::UnitSelecting, DeviceEvent::UnitSelected { unit: Some(unit), error: None }) => {
                if unit.kind() != self.preferences.unit {
                    tracing::debug!(got = %unit.kind(), wanted = %self.preferences.unit, "Ignoring confirmation for another unit");
                    return vec![];
                }
                tracing::info!("Using the {}", unit.kind());
                let settings = negotiate(&self.preferences, &unit, self.transfer, self.download_dir.clone());
                self.unit = Some(unit);
                self.settings = Some(settings.clone());
                self.transition(S::Configuring);
                vec![Command::Configure(Box::new(settings))]
            },

            (S::Scanning, DeviceEvent::PageReceived(path)) => {
                let resolution = self.settings.as_ref().map_or(0, |s| s.resolution);
                let index = self.pages.len();
                tracing::debug!(page = index, path = %path.display(), "Received page");
                self.pages.push(PageArtifact::File { index, path, resolution });
                vec![]
            },
            (S::Scanning, DeviceEvent::BandReceived(band)) => match self.assembler.feed(band) {
                Ok(Assembly::InProgress { received, expected }) => {
                    tracing::trace!(received, expected, "Received band");
                    vec![]
                },
                Ok(Assembly::Complete(image)) => {
                    let index = self.pages.len();
                    tracing::debug!(page = index, width = image.layout.width, height = image.layout.height, "Assembled page");
                    self.pages.push(PageArtifact::Raster { index, image });
                    vec![]
                },
                Err(e) => self.fail(ErrorKind::Assembly((*e).to_string())),
            },
            (S::Scanning, DeviceEvent::PageCompleted(Some(fault))) => self.fail(ErrorKind::Scan(fault.message)),
            (S::Scanning, DeviceEvent::PageCompleted(None)) => {
                if let Err(e) = self.assembler.finish() {
                    return self.fail(ErrorKind::Assembly((*e).to_string()));
                }
                tracing::info!(pages = self.pages.len(), "Scan complete");
                match self.preferences.batch {
                    true => {
                        self.transition(S::PageComplete);
                        vec![Command::PromptBatch]
                    },
                    false => self.close(),
                }
            },

            (state, event) => {
                tracing::warn!(?event, %state, "Ignoring device event unexpected in this state");
                vec![]
            },
        }
    }

    /// Finalizes the pages: closes the device session and delivers them.
    fn close(&mut self) -> Vec<Command> {
        self.transition(SessionState::Closing);
        vec![Command::CloseSession, Command::Deliver]
    }

    /// Terminal. Issues no commands: the device may no longer be usable.
    fn fail(&mut self, kind: ErrorKind) -> Vec<Command> {
        tracing::debug!(error = %kind, state = %self.state, "Session failed");
        self.failure = Some(kind);
        self.transition(SessionState::Failed);
        vec![]
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(from = %self.state, to = %next, "Session transition");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_config::{Configuration, PaperSize};
    use quire_device::{DeviceFault, Geometry, PixelFormat, RasterBand, RasterLayout, Size, UnitDetails};
    use rstest::rstest;

    fn feeder() -> FunctionalUnit {
        FunctionalUnit {
            details: UnitDetails::DocumentFeeder { duplex: false },
            resolutions: vec![150, 300],
            resolution: 150,
            pixel_formats: vec![PixelFormat::Rgb8, PixelFormat::Mono1],
        }
    }

    fn flatbed() -> FunctionalUnit {
        FunctionalUnit {
            details: UnitDetails::Flatbed { physical_size: Size { width: 8.5, height: 11.0 } },
            ..feeder()
        }
    }

    fn machine(config: Configuration, transfer: TransferMode) -> SessionMachine {
        SessionMachine::new(ScanPreferences::from_config(&config), transfer, Some(PathBuf::from("/scratch")))
    }

    fn device(machine: &mut SessionMachine, event: DeviceEvent) -> Vec<Command> {
        machine.handle(SessionEvent::Device(event))
    }

    fn selected(unit: FunctionalUnit) -> DeviceEvent {
        DeviceEvent::UnitSelected { unit: Some(unit), error: None }
    }

    /// Drives a fresh machine up to `Scanning`.
    fn scanning(config: Configuration, transfer: TransferMode) -> SessionMachine {
        let mut m = machine(config, transfer);
        assert_eq!(m.start(), [Command::OpenSession]);
        assert!(device(&mut m, DeviceEvent::SessionOpened(None)).is_empty());
        assert_eq!(device(&mut m, DeviceEvent::DeviceReady), [Command::SelectUnit(UnitKind::DocumentFeeder)]);
        let commands = device(&mut m, selected(feeder()));
        assert!(matches!(commands.as_slice(), [Command::Configure(_)]));
        assert_eq!(m.handle(SessionEvent::ConfigurationApplied), [Command::RequestScan]);
        assert_eq!(m.state(), SessionState::Scanning);
        m
    }

    fn band(layout: RasterLayout, start_row: u32, rows: u32) -> RasterBand {
        RasterBand { layout, start_row, rows, data: vec![0; (layout.bytes_per_row * rows) as usize] }
    }

    #[test]
    fn test_happy_path_file_transfer() {
        let mut m = scanning(Configuration::default(), TransferMode::File);
        assert!(device(&mut m, DeviceEvent::PageReceived("/scratch/Scan 1.jpg".into())).is_empty());
        assert!(device(&mut m, DeviceEvent::PageReceived("/scratch/Scan 2.jpg".into())).is_empty());
        assert_eq!(device(&mut m, DeviceEvent::PageCompleted(None)), [Command::CloseSession, Command::Deliver]);
        assert_eq!(m.state(), SessionState::Closing);
        assert!(device(&mut m, DeviceEvent::SessionClosed(None)).is_empty());
        assert_eq!(m.state(), SessionState::Closing);
        assert!(m.handle(SessionEvent::OutputFinished(true)).is_empty());
        assert_eq!(m.state(), SessionState::Succeeded);

        let pages = m.pages();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1], PageArtifact::File { index: 1, path: "/scratch/Scan 2.jpg".into(), resolution: 150 });
    }

    #[test]
    fn test_open_error_fails_without_requests() {
        let mut m = machine(Configuration::default(), TransferMode::File);
        m.start();
        assert!(device(&mut m, DeviceEvent::SessionOpened(Some(DeviceFault::new("busy")))).is_empty());
        assert_eq!(m.state(), SessionState::Failed);
        assert_eq!(m.failure(), Some(&ErrorKind::OpenSession("busy".into())));
        // Nothing revives a failed session.
        assert!(device(&mut m, DeviceEvent::DeviceReady).is_empty());
        assert_eq!(m.state(), SessionState::Failed);
    }

    #[test]
    fn test_malformed_unit_confirmations_are_ignored() {
        let mut m = machine(Configuration::default(), TransferMode::File);
        m.start();
        device(&mut m, DeviceEvent::DeviceReady);
        assert!(device(&mut m, DeviceEvent::UnitSelected { unit: None, error: None }).is_empty());
        assert!(device(&mut m, selected(flatbed())).is_empty());
        assert_eq!(m.state(), SessionState::UnitSelecting);
        assert!(m.unit().is_none());

        let commands = device(&mut m, selected(feeder()));
        assert_eq!(m.state(), SessionState::Configuring);
        let [Command::Configure(settings)] = commands.as_slice() else { panic!("unexpected {commands:?}") };
        assert_eq!(settings.geometry, Geometry::Feeder { paper: PaperSize::Letter, duplex: false });
        assert_eq!(settings.download_dir, Some(PathBuf::from("/scratch")));
    }

    #[test]
    fn test_flatbed_selection() {
        let mut m = machine(Configuration { flatbed: true, ..Default::default() }, TransferMode::File);
        m.start();
        assert_eq!(device(&mut m, DeviceEvent::DeviceReady), [Command::SelectUnit(UnitKind::Flatbed)]);
        assert!(device(&mut m, selected(feeder())).is_empty());
        assert!(matches!(device(&mut m, selected(flatbed())).as_slice(), [Command::Configure(_)]));
    }

    #[test]
    fn test_unit_selection_error() {
        let mut m = machine(Configuration::default(), TransferMode::File);
        m.start();
        device(&mut m, DeviceEvent::DeviceReady);
        device(&mut m, DeviceEvent::UnitSelected { unit: Some(feeder()), error: Some(DeviceFault::new("jammed")) });
        assert_eq!(m.failure(), Some(&ErrorKind::UnitSelection("jammed".into())));
    }

    #[test]
    fn test_batch_continue_then_stop() {
        let mut m = scanning(Configuration { batch: true, ..Default::default() }, TransferMode::File);
        device(&mut m, DeviceEvent::PageReceived("/scratch/1.jpg".into()));
        assert_eq!(device(&mut m, DeviceEvent::PageCompleted(None)), [Command::PromptBatch]);
        assert_eq!(m.state(), SessionState::PageComplete);
        assert_eq!(m.handle(SessionEvent::BatchDecision(BatchDecision::Continue)), [Command::RequestScan]);
        device(&mut m, DeviceEvent::PageReceived("/scratch/2.jpg".into()));
        assert_eq!(device(&mut m, DeviceEvent::PageCompleted(None)), [Command::PromptBatch]);
        assert_eq!(
            m.handle(SessionEvent::BatchDecision(BatchDecision::Stop)),
            [Command::CloseSession, Command::Deliver]
        );
        assert_eq!(m.pages().len(), 2);
    }

    #[test]
    fn test_bands_assemble_into_pages() {
        let mut m = scanning(Configuration::default(), TransferMode::Memory);
        let layout = RasterLayout::packed(4, 10, PixelFormat::Rgb8, 300);
        for start in [0, 2, 4, 6, 8] {
            assert!(device(&mut m, DeviceEvent::BandReceived(band(layout, start, 2))).is_empty());
        }
        device(&mut m, DeviceEvent::BandReceived(band(layout, 0, 10)));
        device(&mut m, DeviceEvent::PageCompleted(None));
        assert_eq!(m.state(), SessionState::Closing);
        assert_eq!(m.pages().len(), 2);
        assert!(matches!(&m.pages()[1], PageArtifact::Raster { index: 1, image } if image.data.len() == 120));
    }

    #[rstest]
    #[case::gap(vec![(0, 2), (4, 2)])]
    #[case::restart(vec![(0, 2), (0, 2)])]
    fn test_bad_bands_fail(#[case] bands: Vec<(u32, u32)>) {
        let mut m = scanning(Configuration::default(), TransferMode::Memory);
        let layout = RasterLayout::packed(4, 10, PixelFormat::Rgb8, 300);
        for (start, rows) in bands {
            device(&mut m, DeviceEvent::BandReceived(band(layout, start, rows)));
        }
        assert_eq!(m.state(), SessionState::Failed);
        assert!(matches!(m.failure(), Some(ErrorKind::Assembly(_))));
    }

    #[test]
    fn test_truncated_page_at_completion() {
        let mut m = scanning(Configuration::default(), TransferMode::Memory);
        let layout = RasterLayout::packed(4, 10, PixelFormat::Rgb8, 300);
        device(&mut m, DeviceEvent::BandReceived(band(layout, 0, 4)));
        assert!(device(&mut m, DeviceEvent::PageCompleted(None)).is_empty());
        assert!(matches!(m.failure(), Some(ErrorKind::Assembly(_))));
    }

    #[rstest]
    #[case(SessionEvent::Device(DeviceEvent::PageCompleted(Some(DeviceFault::new("paper jam")))), ErrorKind::Scan("paper jam".into()))]
    #[case(SessionEvent::Device(DeviceEvent::Error(DeviceFault::new("lamp"))), ErrorKind::Device("lamp".into()))]
    #[case(SessionEvent::Device(DeviceEvent::Removed), ErrorKind::Removed)]
    #[case(SessionEvent::Device(DeviceEvent::SessionClosed(None)), ErrorKind::UnexpectedClose)]
    #[case(SessionEvent::TimedOut, ErrorKind::Timeout)]
    #[case(SessionEvent::Disconnected, ErrorKind::Disconnected)]
    #[case(SessionEvent::RequestFailed("scan"), ErrorKind::Request("scan"))]
    fn test_failures_while_scanning(#[case] event: SessionEvent, #[case] expected: ErrorKind) {
        let mut m = scanning(Configuration::default(), TransferMode::File);
        device(&mut m, DeviceEvent::PageReceived("/scratch/1.jpg".into()));
        assert!(m.handle(event).is_empty());
        assert_eq!(m.state(), SessionState::Failed);
        assert_eq!(m.failure(), Some(&expected));
    }

    /// Drives a fresh machine to `target`, which must come before `Scanning`.
    fn advanced_to(target: SessionState) -> SessionMachine {
        let mut m = machine(Configuration::default(), TransferMode::File);
        m.start();
        if target != SessionState::SessionOpening {
            device(&mut m, DeviceEvent::DeviceReady);
        }
        if target == SessionState::Configuring {
            device(&mut m, selected(feeder()));
        }
        assert_eq!(m.state(), target);
        m
    }

    #[rstest]
    fn test_device_loss_before_scanning(
        #[values(SessionState::SessionOpening, SessionState::UnitSelecting, SessionState::Configuring)]
        state: SessionState,
        #[values(
            (DeviceEvent::Error(DeviceFault::new("lamp")), ErrorKind::Device("lamp".into())),
            (DeviceEvent::SessionClosed(None), ErrorKind::UnexpectedClose)
        )]
        case: (DeviceEvent, ErrorKind),
    ) {
        let (event, expected) = case;
        let mut m = advanced_to(state);
        assert!(device(&mut m, event).is_empty());
        assert_eq!(m.state(), SessionState::Failed);
        assert_eq!(m.failure(), Some(&expected));
        // A failed session issues nothing further, whatever arrives.
        assert!(device(&mut m, DeviceEvent::DeviceReady).is_empty());
        assert!(device(&mut m, selected(feeder())).is_empty());
        assert!(m.handle(SessionEvent::ConfigurationApplied).is_empty());
        assert_eq!(m.state(), SessionState::Failed);
    }

    #[test]
    fn test_output_failure_fails_session() {
        let mut m = scanning(Configuration::default(), TransferMode::File);
        device(&mut m, DeviceEvent::PageReceived("/scratch/1.jpg".into()));
        device(&mut m, DeviceEvent::PageCompleted(None));
        m.handle(SessionEvent::OutputFinished(false));
        assert_eq!(m.failure(), Some(&ErrorKind::Output));
    }

    #[test]
    fn test_status_and_stray_events_change_nothing() {
        let mut m = scanning(Configuration::default(), TransferMode::File);
        assert!(device(&mut m, DeviceEvent::Status("warming up".into())).is_empty());
        assert!(device(&mut m, DeviceEvent::DeviceReady).is_empty());
        assert!(m.handle(SessionEvent::ConfigurationApplied).is_empty());
        assert!(m.handle(SessionEvent::BatchDecision(BatchDecision::Continue)).is_empty());
        assert_eq!(m.state(), SessionState::Scanning);
    }
}
