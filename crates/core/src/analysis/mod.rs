use std::{
    f32::consts::PI,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{audio::AudioSink, Result, ScopeError};

pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32_768;
pub const DEFAULT_FFT_SIZE: usize = 2048;
pub const DEFAULT_SMOOTHING_TIME_CONSTANT: f32 = 0.8;
pub const DEFAULT_MIN_DECIBELS: f32 = -100.0;
pub const DEFAULT_MAX_DECIBELS: f32 = -30.0;

/// Rejects transform sizes the analyser cannot run.
pub fn validate_fft_size(size: usize) -> Result<()> {
    if !size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&size) {
        return Err(ScopeError::config(format!(
            "fft size {size} must be a power of two between {MIN_FFT_SIZE} and {MAX_FFT_SIZE}"
        )));
    }
    Ok(())
}

/// Passive analysis stage that retains the most recent `fft_size` samples
/// written to it and exposes time and frequency domain snapshots.
///
/// Handles are cheap to clone and share one underlying node, so the writer
/// can live on an audio thread while the reader polls from the draw loop.
#[derive(Clone)]
pub struct AnalyserNode {
    shared: Arc<Mutex<AnalyserState>>,
}

impl AnalyserNode {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(AnalyserState::new(DEFAULT_FFT_SIZE))),
        }
    }

    pub fn fft_size(&self) -> Result<usize> {
        Ok(self.lock()?.ring.len())
    }

    /// Number of frequency bins, always half the transform size.
    pub fn frequency_bin_count(&self) -> Result<usize> {
        Ok(self.fft_size()? / 2)
    }

    /// Changes the transform size. The retained history is discarded.
    pub fn set_fft_size(&self, size: usize) -> Result<()> {
        validate_fft_size(size)?;
        let mut state = self.lock()?;
        if state.ring.len() != size {
            *state = AnalyserState {
                smoothing_time_constant: state.smoothing_time_constant,
                min_decibels: state.min_decibels,
                max_decibels: state.max_decibels,
                ..AnalyserState::new(size)
            };
            tracing::debug!(fft_size = size, "analyser reconfigured");
        }
        Ok(())
    }

    pub fn set_smoothing_time_constant(&self, value: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ScopeError::config(
                "smoothing time constant must lie within [0, 1]",
            ));
        }
        self.lock()?.smoothing_time_constant = value;
        Ok(())
    }

    pub fn set_decibel_range(&self, min_decibels: f32, max_decibels: f32) -> Result<()> {
        if !(min_decibels < max_decibels) {
            return Err(ScopeError::config(
                "minimum decibels must be below maximum decibels",
            ));
        }
        let mut state = self.lock()?;
        state.min_decibels = min_decibels;
        state.max_decibels = max_decibels;
        Ok(())
    }

    /// Copies the oldest `min(out.len(), fft_size)` samples of the current
    /// window into `out`.
    pub fn get_float_time_domain_data(&self, out: &mut [f32]) -> Result<()> {
        let state = self.lock()?;
        for (slot, value) in out.iter_mut().zip(state.window()) {
            *slot = value;
        }
        Ok(())
    }

    /// Same as [`Self::get_float_time_domain_data`] but quantised to bytes,
    /// with 128 as the zero line.
    pub fn get_byte_time_domain_data(&self, out: &mut [u8]) -> Result<()> {
        let state = self.lock()?;
        for (slot, value) in out.iter_mut().zip(state.window()) {
            *slot = to_time_domain_byte(value);
        }
        Ok(())
    }

    /// Writes up to `frequency_bin_count` smoothed magnitudes scaled to bytes
    /// between the configured decibel bounds.
    pub fn get_byte_frequency_data(&self, out: &mut [u8]) -> Result<()> {
        let mut state = self.lock()?;
        state.update_spectrum()?;

        let min_db = state.min_decibels;
        let range = state.max_decibels - min_db;
        for (slot, magnitude) in out.iter_mut().zip(&state.smoothed) {
            let db = if *magnitude > 0.0 {
                20.0 * magnitude.log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = (255.0 / range * (db - min_db)).floor();
            *slot = scaled.clamp(0.0, 255.0) as u8;
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, AnalyserState>> {
        self.shared
            .lock()
            .map_err(|_| ScopeError::Poisoned("analyser node"))
    }
}

impl Default for AnalyserNode {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for AnalyserNode {
    fn write(&self, samples: &[f32]) -> Result<()> {
        let mut state = self.lock()?;
        state.push(samples);
        Ok(())
    }
}

impl fmt::Debug for AnalyserNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyserNode").finish()
    }
}

struct AnalyserState {
    ring: Vec<f32>,
    write_pos: usize,
    smoothing_time_constant: f32,
    min_decibels: f32,
    max_decibels: f32,
    smoothed: Vec<f32>,
    fft: FftResources,
}

impl AnalyserState {
    fn new(size: usize) -> Self {
        Self {
            ring: vec![0.0; size],
            write_pos: 0,
            smoothing_time_constant: DEFAULT_SMOOTHING_TIME_CONSTANT,
            min_decibels: DEFAULT_MIN_DECIBELS,
            max_decibels: DEFAULT_MAX_DECIBELS,
            smoothed: vec![0.0; size / 2],
            fft: FftResources::new(size),
        }
    }

    fn push(&mut self, samples: &[f32]) {
        let size = self.ring.len();
        // Only the tail of an oversized block survives.
        let samples = &samples[samples.len().saturating_sub(size)..];
        for &sample in samples {
            self.ring[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % size;
        }
    }

    /// Retained samples in chronological order.
    fn window(&self) -> impl Iterator<Item = f32> + '_ {
        let (newer, older) = self.ring.split_at(self.write_pos);
        older.iter().chain(newer).copied()
    }

    fn update_spectrum(&mut self) -> Result<()> {
        let size = self.ring.len();
        let (newer, older) = self.ring.split_at(self.write_pos);
        for (index, (slot, value)) in self
            .fft
            .input
            .iter_mut()
            .zip(older.iter().chain(newer))
            .enumerate()
        {
            *slot = *value * blackman_value(index, size);
        }

        self.fft.plan.process_with_scratch(
            &mut self.fft.input,
            &mut self.fft.spectrum,
            &mut self.fft.scratch,
        )?;

        let tau = self.smoothing_time_constant;
        let norm = 1.0 / size as f32;
        for (previous, bin) in self.smoothed.iter_mut().zip(&self.fft.spectrum) {
            let magnitude = bin.norm() * norm;
            let value = tau * *previous + (1.0 - tau) * magnitude;
            *previous = if value.is_finite() { value } else { 0.0 };
        }
        Ok(())
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl FftResources {
    fn new(size: usize) -> Self {
        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(size);
        let scratch = plan.make_scratch_vec();
        let spectrum = plan.make_output_vec();
        let input = plan.make_input_vec();
        Self {
            plan,
            scratch,
            spectrum,
            input,
        }
    }
}

fn to_time_domain_byte(value: f32) -> u8 {
    (128.0 * (1.0 + value)).floor().clamp(0.0, 255.0) as u8
}

fn blackman_value(index: usize, len: usize) -> f32 {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    let phase = 2.0 * PI * index as f32 / len as f32;
    a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
}
