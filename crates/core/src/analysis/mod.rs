use std::{cmp::Ordering, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{axis::spectrum_len, Result, ScopeError};

/// Magnitude spectrum of a fixed-length real signal.
///
/// The forward plan and its working buffers are created once for the
/// configured length and reused for every frame; they are released together
/// with the analyzer. No window is applied, so leakage from non-integer
/// periods shows up as expected.
pub struct SpectrumAnalyzer {
    planner: RealFftPlanner<f32>,
    fft: FftResources,
    magnitudes: Vec<f32>,
}

impl SpectrumAnalyzer {
    /// Creates an analyzer for buffers of `len` samples.
    pub fn new(len: usize) -> Result<Self> {
        let mut planner = RealFftPlanner::new();
        let fft = FftResources::plan(&mut planner, len)?;
        Ok(Self {
            planner,
            fft,
            magnitudes: vec![0.0; spectrum_len(len)],
        })
    }

    /// Transform length.
    pub fn len(&self) -> usize {
        self.fft.size
    }

    pub fn is_empty(&self) -> bool {
        self.fft.size == 0
    }

    /// Re-plans the transform for a new buffer length. The previous spectrum
    /// is discarded.
    pub fn resize(&mut self, len: usize) -> Result<()> {
        if len == self.fft.size {
            return Ok(());
        }
        self.fft = FftResources::plan(&mut self.planner, len)?;
        self.magnitudes = vec![0.0; spectrum_len(len)];
        Ok(())
    }

    /// Computes `scale * |X[k]| / N` for every bin `k` in `0..=N/2`.
    ///
    /// Bin 0 is the DC component and the last bin is Nyquist.
    pub fn compute(&mut self, snapshot: &[f32], scale: f32) -> Result<&[f32]> {
        if snapshot.len() != self.fft.size {
            return Err(ScopeError::InvalidInput(
                "snapshot length does not match the transform length",
            ));
        }

        let fft = &mut self.fft;
        fft.input.copy_from_slice(snapshot);
        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        let n = fft.size as f32;
        for (magnitude, bin) in self.magnitudes.iter_mut().zip(&fft.spectrum) {
            *magnitude = scale * bin.norm() / n;
        }

        Ok(&self.magnitudes)
    }

    /// Spectrum produced by the most recent [`compute`](Self::compute).
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }
}

/// Returns the index and value of the strongest bin, ignoring NaNs.
pub fn dominant_bin(spectrum: &[f32]) -> Option<(usize, f32)> {
    spectrum
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, value)| !value.is_nan())
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl FftResources {
    fn plan(planner: &mut RealFftPlanner<f32>, size: usize) -> Result<Self> {
        if size < 2 {
            return Err(ScopeError::InvalidConfig(format!(
                "transform length must be at least 2, got {size}"
            )));
        }

        let plan = planner.plan_fft_forward(size);
        let scratch = plan.make_scratch_vec();
        let spectrum = plan.make_output_vec();
        let input = plan.make_input_vec();
        Ok(Self {
            size,
            plan,
            scratch,
            spectrum,
            input,
        })
    }
}

impl fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("size", &self.fft.size)
            .field("bins", &self.magnitudes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI;

    fn sine(len: usize, cycles: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * cycles * i as f32 / len as f32).sin())
            .collect()
    }

    #[test]
    fn dc_signal_only_fills_bin_zero() {
        let mut analyzer = SpectrumAnalyzer::new(8).unwrap();
        let spectrum = analyzer.compute(&[1.0; 8], 1.0).unwrap();

        assert_eq!(spectrum.len(), 5);
        assert!(spectrum[0] > 0.0);
        assert_abs_diff_eq!(spectrum[0], 1.0, epsilon = 1e-6);
        for value in &spectrum[1..] {
            assert_abs_diff_eq!(*value, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn sinusoid_peaks_at_its_bin() {
        let len = 256;
        let mut analyzer = SpectrumAnalyzer::new(len).unwrap();

        for m in [1usize, 7, 32, 127] {
            let spectrum = analyzer.compute(&sine(len, m as f32), 1.0).unwrap();
            let (bin, value) = dominant_bin(spectrum).unwrap();
            assert_eq!(bin, m);
            assert_abs_diff_eq!(value, 0.5, epsilon = 1e-3);
        }
    }

    #[test]
    fn off_bin_sinusoid_peaks_at_nearest_bin() {
        let mut analyzer = SpectrumAnalyzer::new(128).unwrap();
        let spectrum = analyzer.compute(&sine(128, 10.2), 1.0).unwrap();
        assert_eq!(dominant_bin(spectrum).map(|(bin, _)| bin), Some(10));
    }

    #[test]
    fn scale_is_linear() {
        let len = 64;
        let signal: Vec<f32> = (0..len)
            .map(|i| ((i * 7919) % 23) as f32 / 23.0 - 0.5)
            .collect();
        let mut analyzer = SpectrumAnalyzer::new(len).unwrap();

        let single = analyzer.compute(&signal, 3.0).unwrap().to_vec();
        let double = analyzer.compute(&signal, 6.0).unwrap();
        for (a, b) in single.iter().zip(double) {
            assert_eq!(*b, 2.0 * a);
        }
    }

    #[test]
    fn compute_is_repeatable() {
        let mut analyzer = SpectrumAnalyzer::new(32).unwrap();
        let signal = sine(32, 3.0);
        let first = analyzer.compute(&signal, 5.0).unwrap().to_vec();
        let second = analyzer.compute(&signal, 5.0).unwrap();
        assert_eq!(first.as_slice(), second);
    }

    #[test]
    fn rejects_mismatched_input() {
        let mut analyzer = SpectrumAnalyzer::new(16).unwrap();
        assert!(matches!(
            analyzer.compute(&[0.0; 8], 1.0),
            Err(ScopeError::InvalidInput(_))
        ));
        assert!(SpectrumAnalyzer::new(1).is_err());
    }

    #[test]
    fn resize_replans() {
        let mut analyzer = SpectrumAnalyzer::new(16).unwrap();
        analyzer.resize(8).unwrap();
        assert_eq!(analyzer.len(), 8);
        assert_eq!(analyzer.magnitudes().len(), 5);
        analyzer.compute(&[1.0; 8], 2.0).unwrap();
        assert_abs_diff_eq!(analyzer.magnitudes()[0], 2.0, epsilon = 1e-6);
    }
}
