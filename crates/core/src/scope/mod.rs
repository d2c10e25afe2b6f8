use std::fmt;

use crate::{
    config::validate_scale, AppConfig, AxisSeries, BufferExchange, CaptureBackend, DeviceInfo,
    DeviceLifecycle, DeviceSpec, Result, SpectrumAnalyzer,
};

/// Everything the presentation layer needs to draw one frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub time: &'a [f32],
    pub samples: &'a [f32],
    pub frequency: &'a [f32],
    pub spectrum: &'a [f32],
    pub device: Option<&'a DeviceSpec>,
    /// Whether the spectrum was recomputed by the latest [`Scope::update`].
    pub fresh: bool,
}

impl Frame<'_> {
    pub fn is_active(&self) -> bool {
        self.device.is_some()
    }
}

/// Consumer-side façade over capture, exchange and analysis.
///
/// Call [`update`](Self::update) once per rendered frame and read the series
/// back through [`frame`](Self::frame). The spectrum is only recomputed when
/// the capture channel has seen a delivery since the previous update; otherwise
/// the previous one is kept.
pub struct Scope<B> {
    devices: DeviceLifecycle<B>,
    exchange: BufferExchange,
    analyzer: SpectrumAnalyzer,
    axes: AxisSeries,
    scale: f32,
    fresh: bool,
}

impl<B: CaptureBackend> Scope<B> {
    pub fn new(backend: B, config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let len = config.audio.buffer_size;
        Ok(Self {
            devices: DeviceLifecycle::new(backend, config.audio.clone())?,
            exchange: BufferExchange::new(len),
            analyzer: SpectrumAnalyzer::new(len)?,
            axes: AxisSeries::new(len, config.audio.sample_rate),
            scale: config.analysis.scale,
            fresh: false,
        })
    }

    pub fn devices(&self) -> Result<Vec<DeviceInfo>> {
        self.devices.devices()
    }

    /// Switches capture to device `index` and rebuilds the axes from the
    /// parameters it granted. On failure nothing is capturing.
    pub fn start(&mut self, index: usize) -> Result<&DeviceSpec> {
        self.exchange.detach();
        self.fresh = false;

        let session = self.devices.start(index)?;
        let axes = session.axes();
        let channel = session.channel().clone();

        self.analyzer.resize(channel.len())?;
        self.exchange.attach(channel);
        self.axes = axes;

        self.device()
            .ok_or_else(|| "capture session vanished after start".into())
    }

    /// Stops capturing. The last snapshot, spectrum and axes stay readable.
    pub fn stop(&mut self) {
        self.exchange.detach();
        self.devices.stop();
        self.fresh = false;
    }

    pub fn is_active(&self) -> bool {
        self.devices.is_active()
    }

    pub fn device(&self) -> Option<&DeviceSpec> {
        self.devices.session().map(|session| session.spec())
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Sets the spectrum multiplier used from the next computation on.
    pub fn set_scale(&mut self, scale: f32) -> Result<()> {
        validate_scale(scale)?;
        self.scale = scale;
        Ok(())
    }

    /// Takes this frame's snapshot and recomputes the spectrum if new samples
    /// arrived. Returns whether it did.
    pub fn update(&mut self) -> Result<bool> {
        self.fresh = self.exchange.acquire_snapshot()?;
        if self.fresh {
            self.analyzer.compute(self.exchange.snapshot(), self.scale)?;
        }
        Ok(self.fresh)
    }

    pub fn snapshot(&self) -> &[f32] {
        self.exchange.snapshot()
    }

    pub fn spectrum(&self) -> &[f32] {
        self.analyzer.magnitudes()
    }

    pub fn axes(&self) -> &AxisSeries {
        &self.axes
    }

    pub fn frame(&self) -> Frame<'_> {
        Frame {
            time: self.axes.time(),
            samples: self.snapshot(),
            frequency: self.axes.frequency(),
            spectrum: self.spectrum(),
            device: self.device(),
            fresh: self.fresh,
        }
    }
}

impl<B> fmt::Debug for Scope<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("devices", &self.devices)
            .field("analyzer", &self.analyzer)
            .field("sample_rate", &self.axes.sample_rate())
            .field("scale", &self.scale)
            .finish()
    }
}
