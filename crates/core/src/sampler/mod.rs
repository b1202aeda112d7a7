//! Captures time-domain snapshots of a live signal for display.
//!
//! Amplitude is not normalised: a quiet source draws a small trace.

use crate::{
    audio::{AudioContext, GainNode},
    config::SamplerConfig,
    AnalyserNode, Result, ScopeError,
};

/// Byte value of a zero-amplitude sample.
pub const MIDLINE: u8 = 128;

/// One analysis window plus the offset the trace should start from.
///
/// Borrows the sampler's scratch buffer, so it cannot outlive the next call
/// to [`ScopeSampler::sample`]. Use [`ScopeSample::to_owned_data`] to keep
/// the bytes around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeSample<'a> {
    pub data: &'a [u8],
    pub trigger_index: usize,
}

impl<'a> ScopeSample<'a> {
    /// Builds a sample from arbitrary bytes, detecting the trigger point.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            trigger_index: trigger_index(data),
        }
    }

    pub fn to_owned_data(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

/// Returns the index `i` of the first rising midline crossing, where
/// `data[i] < 128 <= data[i + 1]`, or 0 when the window never crosses.
pub fn trigger_index(data: &[u8]) -> usize {
    data.windows(2)
        .position(|pair| pair[0] < MIDLINE && pair[1] >= MIDLINE)
        .unwrap_or(0)
}

/// Taps a signal through a unity-gain input node into an analyser and reads
/// one window per call.
#[derive(Debug)]
pub struct ScopeSampler {
    input: GainNode,
    analyser: AnalyserNode,
    buffer: Vec<u8>,
}

impl ScopeSampler {
    /// Creates a sampler with a 1024 point analyser, yielding 512 byte
    /// windows (about 12 ms of a 44.1 kHz source).
    pub fn new(context: &AudioContext) -> Result<Self> {
        let config = SamplerConfig {
            sample_rate: context.sample_rate(),
            ..SamplerConfig::default()
        };
        Self::with_config(context, &config)
    }

    /// Fails if the configured sample rate differs from the context's, since
    /// the analysis window length depends on it.
    pub fn with_config(context: &AudioContext, config: &SamplerConfig) -> Result<Self> {
        config.validate()?;
        if config.sample_rate != context.sample_rate() {
            return Err(ScopeError::config(format!(
                "sampler expects {} Hz but the audio context runs at {} Hz",
                config.sample_rate,
                context.sample_rate()
            )));
        }

        let input = context.create_gain();
        let analyser = context.create_analyser();
        analyser.set_fft_size(config.fft_size)?;
        input.connect(&analyser)?;

        let buffer = vec![MIDLINE; analyser.frequency_bin_count()?];
        tracing::debug!(
            window = buffer.len(),
            sample_rate = context.sample_rate(),
            "sampler ready"
        );

        Ok(Self {
            input,
            analyser,
            buffer,
        })
    }

    /// Reads the latest window into the scratch buffer.
    pub fn sample(&mut self) -> Result<ScopeSample<'_>> {
        self.analyser.get_byte_time_domain_data(&mut self.buffer)?;
        Ok(ScopeSample::new(&self.buffer))
    }

    /// Node external sources connect to or write into.
    pub fn input(&self) -> &GainNode {
        &self.input
    }

    pub fn analyser(&self) -> &AnalyserNode {
        &self.analyser
    }

    pub fn window_len(&self) -> usize {
        self.buffer.len()
    }
}
