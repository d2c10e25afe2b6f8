//! Core library for the Spectroscope application.
//!
//! An audio backend delivers samples on its own thread into a
//! [`CaptureChannel`]; once per rendered frame the consumer copies them out
//! through a [`BufferExchange`] and, when a new revision arrived, runs the
//! [`SpectrumAnalyzer`] over the copy. [`Scope`] bundles these together with
//! the device lifecycle and the axis model so a front end only has to pick a
//! device, set the scale and read back [`Frame`]s.

pub mod analysis;
pub mod axis;
pub mod capture;
pub mod config;
pub mod device;
pub mod error;
pub mod exchange;
pub mod scope;

pub use analysis::{dominant_bin, SpectrumAnalyzer};
pub use axis::AxisSeries;
pub use capture::CaptureChannel;
pub use config::{AnalysisConfig, AppConfig, AudioConfig, TailPolicy};
#[cfg(feature = "cpal")]
pub use device::cpal_backend::CpalBackend;
pub use device::{
    CaptureBackend, DeviceInfo, DeviceLifecycle, DeviceSession, DeviceSpec, OpenedStream,
    SampleFormat, StreamHandle,
};
pub use error::{Result, ScopeError};
pub use exchange::BufferExchange;
pub use scope::{Frame, Scope};
