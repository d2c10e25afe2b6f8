//! Capture device lifecycle.
//!
//! A [`CaptureBackend`] knows how to enumerate input devices and wire one of
//! them to a [`CaptureChannel`]. [`DeviceLifecycle`] keeps at most one
//! [`DeviceSession`] open on top of it and makes sure the channel is closed
//! before the stream goes away.

#[cfg(feature = "cpal")]
pub mod cpal_backend;

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{AudioConfig, AxisSeries, CaptureChannel, Result, ScopeError};

/// Entry of the backend's capture device list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
}

/// Sample encoding delivered by the device before conversion to `f32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Parameters actually granted by the backend for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub index: usize,
    pub name: String,
    pub sample_rate: u32,
    pub format: SampleFormat,
    /// Samples per callback, or `None` when the backend picks the period.
    pub period: Option<u32>,
    pub channels: u16,
}

impl DeviceSpec {
    /// Whether these parameters differ from what `request` asked for. A
    /// period left to the backend is not a difference.
    pub fn differs_from(&self, request: &AudioConfig) -> bool {
        self.sample_rate != request.sample_rate
            || self.channels != request.channels
            || self.format != SampleFormat::F32
            || self
                .period
                .map_or(false, |period| period != request.buffer_size as u32)
    }
}

/// Running stream owned by a session.
pub trait StreamHandle {
    /// Stops callback delivery and releases the stream. Calling it again is
    /// a no-op.
    fn close(&mut self) -> Result<()>;
}

/// A stream the backend managed to open, together with what it granted.
pub struct OpenedStream {
    pub spec: DeviceSpec,
    pub handle: Box<dyn StreamHandle>,
}

/// Audio subsystem able to feed a [`CaptureChannel`].
pub trait CaptureBackend {
    /// Lists the capture devices in index order.
    fn devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Opens device `index` and starts delivering its samples into `channel`.
    ///
    /// The request is a preference: implementations grant whatever the device
    /// supports and describe it in the returned [`DeviceSpec`].
    fn open(
        &mut self,
        index: usize,
        request: &AudioConfig,
        channel: Arc<CaptureChannel>,
    ) -> Result<OpenedStream>;
}

/// One open capture device.
pub struct DeviceSession {
    spec: DeviceSpec,
    channel: Arc<CaptureChannel>,
    stream: Box<dyn StreamHandle>,
    closed: bool,
}

impl DeviceSession {
    pub fn spec(&self) -> &DeviceSpec {
        &self.spec
    }

    pub fn channel(&self) -> &Arc<CaptureChannel> {
        &self.channel
    }

    /// Axes for this session's granted sample rate.
    pub fn axes(&self) -> AxisSeries {
        AxisSeries::new(self.channel.len(), self.spec.sample_rate)
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.channel.close();
        self.stream.close()
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::warn!(%err, device = self.spec.index, "failed to close capture stream");
        }
    }
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("spec", &self.spec)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Opens, switches and closes capture sessions. At most one session is
/// active at any time.
pub struct DeviceLifecycle<B> {
    backend: B,
    request: AudioConfig,
    session: Option<DeviceSession>,
}

impl<B: CaptureBackend> DeviceLifecycle<B> {
    pub fn new(backend: B, request: AudioConfig) -> Result<Self> {
        request.validate()?;
        Ok(Self {
            backend,
            request,
            session: None,
        })
    }

    pub fn devices(&self) -> Result<Vec<DeviceInfo>> {
        self.backend.devices()
    }

    /// Stops the current session, if any, and opens device `index`.
    ///
    /// On failure no session is active afterwards.
    pub fn start(&mut self, index: usize) -> Result<&DeviceSession> {
        self.stop();

        let channel = Arc::new(CaptureChannel::new(
            self.request.buffer_size,
            self.request.tail_policy,
        ));
        let opened = self
            .backend
            .open(index, &self.request, channel.clone())?;

        let mut session = DeviceSession {
            spec: opened.spec,
            channel,
            stream: opened.handle,
            closed: false,
        };
        if session.spec.sample_rate == 0 {
            if let Err(err) = session.shutdown() {
                tracing::warn!(%err, device = index, "failed to close rejected capture stream");
            }
            return Err(ScopeError::open(index, "device reported a sample rate of 0"));
        }

        let spec = &session.spec;
        if spec.differs_from(&self.request) {
            tracing::warn!(
                device = spec.index,
                requested_rate = self.request.sample_rate,
                granted_rate = spec.sample_rate,
                requested_channels = self.request.channels,
                granted_channels = spec.channels,
                format = %spec.format,
                period = ?spec.period,
                "capture device granted different parameters; adopting them"
            );
        }
        tracing::info!(
            device = spec.index,
            name = %spec.name,
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            "capture session started"
        );

        Ok(&*self.session.insert(session))
    }

    /// Closes the current session. Does nothing when none is active.
    pub fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            match session.shutdown() {
                Ok(()) => tracing::info!(device = session.spec.index, "capture session stopped"),
                Err(err) => tracing::warn!(
                    %err,
                    device = session.spec.index,
                    "capture session stopped with errors"
                ),
            }
        }
    }

    pub fn session(&self) -> Option<&DeviceSession> {
        self.session.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn request(&self) -> &AudioConfig {
        &self.request
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B> fmt::Debug for DeviceLifecycle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceLifecycle")
            .field("request", &self.request)
            .field("session", &self.session)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::FakeBackend;
    use super::*;

    fn lifecycle(rates: &[u32]) -> DeviceLifecycle<FakeBackend> {
        let request = AudioConfig {
            buffer_size: 8,
            ..AudioConfig::default()
        };
        DeviceLifecycle::new(FakeBackend::with_rates(rates), request).unwrap()
    }

    #[test]
    fn start_adopts_granted_parameters() {
        let mut devices = lifecycle(&[48_000]);
        let session = devices.start(0).unwrap();

        assert_eq!(session.spec().sample_rate, 48_000);
        assert_eq!(session.channel().len(), 8);
        assert_eq!(session.axes().sample_rate(), 48_000);
        assert!(devices.is_active());
    }

    #[test]
    fn switching_devices_keeps_one_session() {
        let mut devices = lifecycle(&[8, 16]);
        devices.start(0).unwrap();
        let first = devices.backend().last_channel();

        devices.start(1).unwrap();
        assert!(!first.is_open());
        assert_eq!(devices.backend().open_streams.load(Ordering::SeqCst), 1);
        assert_eq!(devices.session().unwrap().spec().index, 1);
    }

    #[test]
    fn stop_is_idempotent_and_closes_the_channel() {
        let mut devices = lifecycle(&[8]);
        devices.stop();

        devices.start(0).unwrap();
        let channel = devices.backend().last_channel();
        devices.stop();
        devices.stop();

        assert!(!devices.is_active());
        assert!(!channel.is_open());
        channel.deliver(&[1.0; 8]);
        assert_eq!(channel.revision().unwrap(), 0);
        assert_eq!(devices.backend().open_streams.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_start_leaves_nothing_running() {
        let mut devices = DeviceLifecycle::new(
            FakeBackend::with_rates(&[8, 8]).broken(1),
            AudioConfig::default(),
        )
        .unwrap();
        devices.start(0).unwrap();

        let err = devices.start(1).unwrap_err();
        assert!(matches!(err, ScopeError::DeviceOpen { index: 1, .. }));
        assert!(!devices.is_active());
        assert_eq!(devices.backend().open_streams.load(Ordering::SeqCst), 0);

        assert!(matches!(
            devices.start(7),
            Err(ScopeError::DeviceNotFound { index: 7, available: 2 })
        ));
    }

    #[test]
    fn zero_sample_rate_is_an_open_failure() {
        let mut devices = lifecycle(&[0]);
        assert!(matches!(
            devices.start(0),
            Err(ScopeError::DeviceOpen { index: 0, .. })
        ));
        assert!(!devices.is_active());
        assert_eq!(devices.backend().open_streams.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn zero_sample_rate_with_failing_close_still_reports_open_failure() {
        let request = AudioConfig::default();
        let mut devices =
            DeviceLifecycle::new(FakeBackend::with_rates(&[0]).failing_close(), request).unwrap();

        assert!(matches!(
            devices.start(0),
            Err(ScopeError::DeviceOpen { index: 0, .. })
        ));
        assert!(!devices.is_active());
        assert!(!devices.backend().last_channel().is_open());
        assert_eq!(devices.backend().open_streams.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn spec_mismatch_detection() {
        let request = AudioConfig::default();
        let mut spec = DeviceSpec {
            index: 0,
            name: "mic".into(),
            sample_rate: request.sample_rate,
            format: SampleFormat::F32,
            period: Some(request.buffer_size as u32),
            channels: request.channels,
        };
        assert!(!spec.differs_from(&request));

        spec.period = None;
        assert!(!spec.differs_from(&request));
        spec.period = Some(512);
        assert!(spec.differs_from(&request));
        spec.period = None;

        spec.format = SampleFormat::I16;
        assert!(spec.differs_from(&request));
        assert_eq!(spec.format.to_string(), "i16");
    }
}
