use serde::{Deserialize, Serialize};

use crate::{analysis, host, surface::Color, Result, ScopeError};

/// Top-level configuration structure for the scope widget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub sampler: SamplerConfig,
    pub renderer: RendererStyle,
    pub draw: DrawConfig,
}

impl ScopeConfig {
    /// Parses a configuration from JSON. Missing fields fall back to their
    /// defaults and the result is validated before it is returned.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.sampler.validate()?;
        self.renderer.validate()?;
        self.draw.validate()
    }
}

/// Configuration of the sampler and its analyser node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Rate the source is assumed to run at. The window length in seconds
    /// follows from `fft_size / sample_rate`.
    pub sample_rate: u32,
    pub fft_size: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            fft_size: 1024,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ScopeError::config("sample rate must be non-zero"));
        }
        analysis::validate_fft_size(self.fft_size)
    }
}

/// Colours, line widths and padding used by the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererStyle {
    /// Vertical padding in pixels kept free above and below the trace.
    pub padding: f32,
    pub background: Color,
    pub axis_color: Color,
    pub axis_width: f32,
    pub trace_color: Color,
    pub trace_width: f32,
}

impl Default for RendererStyle {
    fn default() -> Self {
        Self {
            padding: 10.0,
            background: Color::rgb(0x11, 0x11, 0x11),
            axis_color: Color::rgb(0x55, 0x55, 0x55),
            axis_width: 1.0,
            trace_color: Color::rgb(0xff, 0x00, 0x00),
            trace_width: 4.0,
        }
    }
}

impl RendererStyle {
    pub fn validate(&self) -> Result<()> {
        if !(self.padding >= 0.0) {
            return Err(ScopeError::config("padding must not be negative"));
        }
        if !(self.axis_width > 0.0) || !(self.trace_width > 0.0) {
            return Err(ScopeError::config("line widths must be positive"));
        }
        Ok(())
    }
}

/// Cadence of the draw loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    /// Fixed tick rate. `None` or `Some(0)` follows the display refresh.
    pub fps: Option<u32>,
    /// Refresh rate of the display the event loop emulates.
    pub refresh_rate_hz: u32,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            fps: None,
            refresh_rate_hz: 60,
        }
    }
}

impl DrawConfig {
    pub fn validate(&self) -> Result<()> {
        host::rate_interval(self.refresh_rate_hz)?;
        match self.fps {
            Some(fps) if fps > 0 => host::rate_interval(fps).map(|_| ()),
            _ => Ok(()),
        }
    }
}
