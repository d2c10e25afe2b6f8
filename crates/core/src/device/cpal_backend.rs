use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, FromSample, Sample, SizedSample, SupportedBufferSize, SupportedStreamConfig,
};

use super::{CaptureBackend, DeviceInfo, DeviceSpec, OpenedStream, SampleFormat, StreamHandle};
use crate::{AudioConfig, CaptureChannel, Result, ScopeError};

/// Capture backend over the default cpal host.
pub struct CpalBackend {
    host: cpal::Host,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    fn input_devices(&self) -> Result<Vec<cpal::Device>> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| ScopeError::Backend(format!("could not list input devices: {e}")))?;
        Ok(devices.collect())
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for CpalBackend {
    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        self.input_devices()?
            .iter()
            .enumerate()
            .map(|(index, device)| {
                let name = device
                    .name()
                    .map_err(|e| ScopeError::Backend(format!("error getting name: {e}")))?;
                Ok(DeviceInfo { index, name })
            })
            .collect()
    }

    fn open(
        &mut self,
        index: usize,
        request: &AudioConfig,
        channel: Arc<CaptureChannel>,
    ) -> Result<OpenedStream> {
        let mut devices = self.input_devices().map_err(|e| ScopeError::open(index, e))?;
        let available = devices.len();
        if index >= available {
            return Err(ScopeError::DeviceNotFound { index, available });
        }
        let device = devices.swap_remove(index);
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported = negotiate(&device, request).map_err(|e| ScopeError::open(index, e))?;
        let mut config = supported.config();
        let period = match supported.buffer_size() {
            SupportedBufferSize::Range { min, max }
                if (*min..=*max).contains(&(request.buffer_size as u32)) =>
            {
                Some(request.buffer_size as u32)
            }
            _ => None,
        };
        config.buffer_size = match period {
            Some(frames) => BufferSize::Fixed(frames),
            None => BufferSize::Default,
        };

        let format = supported.sample_format();
        tracing::debug!(device = index, ?config, ?format, "opening capture stream");

        let stream = match format {
            cpal::SampleFormat::I8 => build_stream::<i8>(&device, &config, channel),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, channel),
            cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, channel),
            cpal::SampleFormat::I64 => build_stream::<i64>(&device, &config, channel),
            cpal::SampleFormat::U8 => build_stream::<u8>(&device, &config, channel),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, channel),
            cpal::SampleFormat::U32 => build_stream::<u32>(&device, &config, channel),
            cpal::SampleFormat::U64 => build_stream::<u64>(&device, &config, channel),
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, channel),
            cpal::SampleFormat::F64 => build_stream::<f64>(&device, &config, channel),
            other => {
                return Err(ScopeError::open(
                    index,
                    format!("unsupported sample format {other:?}"),
                ))
            }
        }
        .map_err(|e| ScopeError::open(index, format!("could not build stream: {e}")))?;

        stream
            .play()
            .map_err(|e| ScopeError::open(index, format!("failed to start stream: {e}")))?;

        let spec = DeviceSpec {
            index,
            name,
            sample_rate: config.sample_rate.0,
            format: convert_format(format),
            period,
            channels: config.channels,
        };

        Ok(OpenedStream {
            spec,
            handle: Box::new(CpalStream {
                stream: Some(stream),
            }),
        })
    }
}

/// Picks the supported config closest to the request: the requested rate
/// first, then `f32` samples, then the requested channel count. Falls back to
/// the device default when no range covers the rate.
fn negotiate(
    device: &cpal::Device,
    request: &AudioConfig,
) -> std::result::Result<SupportedStreamConfig, String> {
    let wanted = cpal::SampleRate(request.sample_rate);
    let ranges = device
        .supported_input_configs()
        .map_err(|e| format!("error getting input configs: {e}"))?;

    let best = ranges
        .filter(|range| range.min_sample_rate() <= wanted && wanted <= range.max_sample_rate())
        .min_by_key(|range| {
            (
                range.sample_format() != cpal::SampleFormat::F32,
                range.channels() != request.channels,
                range.channels(),
            )
        });

    match best {
        Some(range) => Ok(range.with_sample_rate(wanted)),
        None => device
            .default_input_config()
            .map_err(|e| format!("could not get default config: {e}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channel: Arc<CaptureChannel>,
) -> std::result::Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let stride = usize::from(config.channels.max(1));
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            channel.deliver_iter(data.iter().step_by(stride).map(|s| f32::from_sample(*s)));
        },
        move |err| {
            tracing::error!(%err, "capture stream error");
        },
        None,
    )
}

fn convert_format(format: cpal::SampleFormat) -> SampleFormat {
    match format {
        cpal::SampleFormat::I8 => SampleFormat::I8,
        cpal::SampleFormat::I16 => SampleFormat::I16,
        cpal::SampleFormat::I32 => SampleFormat::I32,
        cpal::SampleFormat::I64 => SampleFormat::I64,
        cpal::SampleFormat::U8 => SampleFormat::U8,
        cpal::SampleFormat::U16 => SampleFormat::U16,
        cpal::SampleFormat::U32 => SampleFormat::U32,
        cpal::SampleFormat::U64 => SampleFormat::U64,
        cpal::SampleFormat::F64 => SampleFormat::F64,
        _ => SampleFormat::F32,
    }
}

struct CpalStream {
    stream: Option<cpal::Stream>,
}

impl StreamHandle for CpalStream {
    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            let paused = stream.pause();
            drop(stream);
            paused.map_err(|e| ScopeError::Backend(format!("failed to pause stream: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TailPolicy;

    #[test]
    fn open_failures_stay_in_the_device_category() {
        let mut backend = CpalBackend::new();
        let channel = Arc::new(CaptureChannel::new(8, TailPolicy::Rolling));
        let result = backend.open(usize::MAX, &AudioConfig::default(), channel);

        assert!(matches!(
            result,
            Err(ScopeError::DeviceOpen { index: usize::MAX, .. })
                | Err(ScopeError::DeviceNotFound { index: usize::MAX, .. })
        ));
    }
}
