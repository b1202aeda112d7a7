use std::sync::{Arc, Mutex, MutexGuard};

use crate::{AnalyserNode, Result, ScopeError};

/// Anything that accepts blocks of mono `f32` samples in `[-1, 1]`.
pub trait AudioSink: Send + Sync {
    fn write(&self, samples: &[f32]) -> Result<()>;
}

/// Audio processing context the scope taps into. It only carries the rate
/// the connected source runs at and acts as the factory for graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioContext {
    sample_rate: u32,
}

impl AudioContext {
    /// Creates a context at 44.1 kHz.
    pub fn new() -> Self {
        Self::with_sample_rate(44_100)
    }

    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Creates a unity-gain node with no outputs.
    pub fn create_gain(&self) -> GainNode {
        GainNode::new()
    }

    pub fn create_analyser(&self) -> AnalyserNode {
        AnalyserNode::new()
    }
}

impl Default for AudioContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Gain stage that scales every block and forwards it to its outputs.
///
/// Cloning yields another handle to the same node, so an audio thread can
/// keep one to write into while the graph owner keeps another.
#[derive(Clone)]
pub struct GainNode {
    shared: Arc<Mutex<GainState>>,
}

struct GainState {
    gain: f32,
    outputs: Vec<Arc<dyn AudioSink>>,
    scratch: Vec<f32>,
}

impl GainNode {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(GainState {
                gain: 1.0,
                outputs: Vec::new(),
                scratch: Vec::new(),
            })),
        }
    }

    pub fn gain(&self) -> Result<f32> {
        Ok(self.lock()?.gain)
    }

    pub fn set_gain(&self, gain: f32) -> Result<()> {
        self.lock()?.gain = gain;
        Ok(())
    }

    /// Routes the output of this node into `destination`. Outputs receive
    /// blocks in connection order.
    pub fn connect<S: AudioSink + Clone + 'static>(&self, destination: &S) -> Result<()> {
        self.lock()?.outputs.push(Arc::new(destination.clone()));
        Ok(())
    }

    pub fn output_count(&self) -> Result<usize> {
        Ok(self.lock()?.outputs.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, GainState>> {
        self.shared
            .lock()
            .map_err(|_| ScopeError::Poisoned("gain node"))
    }
}

impl Default for GainNode {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for GainNode {
    fn write(&self, samples: &[f32]) -> Result<()> {
        let mut state = self.lock()?;
        let GainState {
            gain,
            outputs,
            scratch,
        } = &mut *state;

        let block = if *gain == 1.0 {
            samples
        } else {
            scratch.clear();
            scratch.extend(samples.iter().map(|sample| sample * *gain));
            scratch.as_slice()
        };

        for output in outputs.iter() {
            output.write(block)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for GainNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GainNode").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(analyser: &AnalyserNode) -> Vec<f32> {
        let mut out = vec![0.0; analyser.fft_size().unwrap()];
        analyser.get_float_time_domain_data(&mut out).unwrap();
        out
    }

    #[test]
    fn unity_gain_passes_samples_through() {
        let context = AudioContext::new();
        let gain = context.create_gain();
        let analyser = context.create_analyser();
        analyser.set_fft_size(32).unwrap();
        gain.connect(&analyser).unwrap();

        let block: Vec<f32> = (0..32).map(|i| i as f32 / 64.0).collect();
        gain.write(&block).unwrap();

        assert_eq!(gain.gain().unwrap(), 1.0);
        assert_eq!(window(&analyser), block);
    }

    #[test]
    fn scales_and_fans_out_to_every_output() {
        let gain = GainNode::new();
        let first = AnalyserNode::new();
        let second = AnalyserNode::new();
        first.set_fft_size(32).unwrap();
        second.set_fft_size(32).unwrap();
        gain.connect(&first).unwrap();
        gain.connect(&second).unwrap();
        gain.set_gain(0.5).unwrap();

        gain.write(&[0.5; 32]).unwrap();

        assert_eq!(gain.output_count().unwrap(), 2);
        assert!(window(&first).iter().all(|&v| v == 0.25));
        assert!(window(&second).iter().all(|&v| v == 0.25));
    }

    #[test]
    fn gain_stages_can_be_chained() {
        let head = GainNode::new();
        let tail = GainNode::new();
        let analyser = AnalyserNode::new();
        analyser.set_fft_size(32).unwrap();
        head.connect(&tail).unwrap();
        tail.connect(&analyser).unwrap();
        tail.set_gain(2.0).unwrap();

        head.write(&[0.25; 32]).unwrap();
        assert!(window(&analyser).iter().all(|&v| v == 0.5));
    }

    #[test]
    fn handles_are_shareable_across_threads() {
        let gain = GainNode::new();
        let analyser = AnalyserNode::new();
        analyser.set_fft_size(32).unwrap();
        gain.connect(&analyser).unwrap();

        let writer = gain.clone();
        std::thread::spawn(move || writer.write(&[1.0; 32]).unwrap())
            .join()
            .unwrap();

        let mut bytes = [0u8; 16];
        analyser.get_byte_time_domain_data(&mut bytes).unwrap();
        assert!(bytes.iter().all(|&b| b == 255));
    }
}
