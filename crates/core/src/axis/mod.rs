/// Time and frequency coordinates for the snapshot and spectrum buffers.
///
/// `T0 = N / sample_rate` is the duration covered by one buffer and
/// `f0 = 1 / T0` the spacing between neighbouring bins. Both arrays depend only
/// on the buffer length and the sample rate, so they are rebuilt on device
/// changes and never per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSeries {
    sample_rate: u32,
    period: f32,
    resolution: f32,
    time: Vec<f32>,
    frequency: Vec<f32>,
}

impl AxisSeries {
    /// Builds the axes for `len` samples captured at `sample_rate` Hz.
    ///
    /// `sample_rate` must be positive; the lifecycle never hands out a session
    /// with a zero rate.
    pub fn new(len: usize, sample_rate: u32) -> Self {
        let period = len as f32 / sample_rate as f32;
        let resolution = 1.0 / period;
        let time = (0..len)
            .map(|i| i as f32 * period / len as f32)
            .collect();
        let frequency = (0..spectrum_len(len))
            .map(|k| k as f32 * resolution)
            .collect();

        Self {
            sample_rate,
            period,
            resolution,
            time,
            frequency,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Buffer duration `T0` in seconds.
    pub fn period(&self) -> f32 {
        self.period
    }

    /// Bin spacing `f0` in Hz.
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// Upper frequency limit used when plotting the whole spectrum.
    pub fn frequency_span(&self) -> f32 {
        self.resolution * self.frequency.len() as f32
    }

    pub fn time(&self) -> &[f32] {
        &self.time
    }

    pub fn frequency(&self) -> &[f32] {
        &self.frequency
    }
}

/// Number of bins produced by a real transform of `len` samples.
pub fn spectrum_len(len: usize) -> usize {
    len / 2 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn unit_rate_gives_integer_axes() {
        let axes = AxisSeries::new(8, 8);
        assert_eq!(axes.period(), 1.0);
        assert_eq!(axes.resolution(), 1.0);
        assert_eq!(axes.time().len(), 8);
        assert_eq!(axes.frequency(), &[0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(axes.frequency_span(), 5.0);
    }

    #[test]
    fn axes_follow_sample_rate() {
        for &(len, rate) in &[(4096usize, 44_100u32), (1024, 48_000), (10, 3)] {
            let axes = AxisSeries::new(len, rate);
            assert_eq!(axes.frequency().len(), len / 2 + 1);

            for (i, t) in axes.time().iter().enumerate() {
                assert_relative_eq!(*t, i as f32 / rate as f32, max_relative = 1e-5);
            }
            for (k, f) in axes.frequency().iter().enumerate() {
                let expected = k as f32 / (len as f32 / rate as f32);
                assert_relative_eq!(*f, expected, max_relative = 1e-5);
            }
        }
    }
}
