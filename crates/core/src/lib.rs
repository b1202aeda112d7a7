//! Core library for the Wavescope oscilloscope widget.
//!
//! The pipeline has three stages. A [`ScopeSampler`] taps a live signal and
//! returns one byte window per call, aligned to a rising zero crossing. A
//! [`ScopeRenderer`] paints that window onto a fixed-size [`Surface`]. A
//! [`DrawBatch`] ticks registered callbacks on a [`Host`], either at a fixed
//! rate or at the display refresh.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod host;
pub mod mapping;
pub mod render;
pub mod sampler;
pub mod surface;
pub mod timeline;

pub use analysis::AnalyserNode;
pub use audio::{AudioContext, AudioSink, GainNode};
pub use config::{DrawConfig, RendererStyle, SamplerConfig, ScopeConfig};
pub use error::{Result, ScopeError};
pub use host::{Clock, EventLoop, Host, ManualClock, SystemClock, Task, TaskHandle};
pub use mapping::map_range;
pub use render::ScopeRenderer;
pub use sampler::{trigger_index, ScopeSample, ScopeSampler};
pub use surface::{Color, DisplayList, DrawCommand, PixelSurface, Point, Rect, Stroke, Surface};
pub use timeline::{BatchState, Cadence, DrawBatch};
