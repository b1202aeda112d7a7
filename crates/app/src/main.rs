use std::{cell::RefCell, f32::consts::TAU, rc::Rc, time::Duration};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wavescope_core::{
    AudioSink, Cadence, Clock, DisplayList, DrawBatch, EventLoop, ManualClock, ScopeConfig,
    ScopeRenderer, ScopeSampler, SystemClock,
};

fn main() -> wavescope_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            if args.realtime {
                run(SystemClock::new(), &args)
            } else {
                run(ManualClock::new(), &args)
            }
        }
        Commands::Defaults => {
            println!("{}", ScopeConfig::default().to_json_pretty()?);
            Ok(())
        }
    }
}

fn run<C: Clock + 'static>(clock: C, args: &RunArgs) -> wavescope_core::Result<()> {
    let mut config = ScopeConfig::default();
    config.draw.fps = args.fps;
    config.sampler.sample_rate = args.sample_rate;
    config.validate()?;

    tracing::info!(
        fps = ?config.draw.fps,
        frequency = args.frequency,
        width = args.width,
        height = args.height,
        "starting scope"
    );

    let context = wavescope_core::AudioContext::with_sample_rate(config.sampler.sample_rate);
    let mut sampler = ScopeSampler::with_config(&context, &config.sampler)?;
    let renderer = Rc::new(RefCell::new(ScopeRenderer::with_style(
        DisplayList::new(args.width, args.height),
        config.renderer.clone(),
    )));

    let host = Rc::new(EventLoop::new(clock, config.draw.refresh_rate_hz)?);
    let batch = DrawBatch::from_config(host.clone(), &config.draw);
    let tick = match batch.cadence() {
        Cadence::Fixed(interval) => interval,
        Cadence::DisplayRefresh => host.frame_interval(),
    };

    let mut tone = ToneGenerator::new(args.frequency, args.amplitude, context.sample_rate());
    let block_len = (tick.as_secs_f64() * f64::from(context.sample_rate())).ceil() as usize;
    let input = sampler.input().clone();
    batch.add(move || {
        let block = tone.next_block(block_len);
        if let Err(err) = input.write(&block) {
            tracing::error!(%err, "failed to feed the scope input");
        }
    });

    let last_trigger = Rc::new(RefCell::new(None));
    let frame = renderer.clone();
    let trigger = last_trigger.clone();
    batch.add(move || match sampler.sample() {
        Ok(sample) => {
            tracing::trace!(trigger_index = sample.trigger_index, "sampled");
            *trigger.borrow_mut() = Some(sample.trigger_index);
            frame.borrow_mut().draw(&sample);
        }
        Err(err) => tracing::error!(%err, "failed to sample the scope input"),
    });

    batch.start();
    host.run_for(Duration::from_millis(args.duration_ms));
    batch.stop();

    tracing::info!(
        ticks = batch.ticks(),
        last_trigger = ?*last_trigger.borrow(),
        "scope finished"
    );

    if args.dump {
        println!("{}", renderer.borrow().surface().to_json()?);
    }
    Ok(())
}

/// Sine source standing in for a real audio input.
struct ToneGenerator {
    phase: f32,
    step: f32,
    amplitude: f32,
}

impl ToneGenerator {
    fn new(frequency: f32, amplitude: f32, sample_rate: u32) -> Self {
        Self {
            phase: 0.0,
            step: TAU * frequency / sample_rate as f32,
            amplitude,
        }
    }

    fn next_block(&mut self, len: usize) -> Vec<f32> {
        (0..len)
            .map(|_| {
                let value = self.phase.sin() * self.amplitude;
                self.phase = (self.phase + self.step) % TAU;
                value
            })
            .collect()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Triggered oscilloscope for live audio", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Feed a test tone through the scope and run the draw loop.
    Run(RunArgs),
    /// Print the default configuration as JSON.
    Defaults,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Fixed draw rate. Omit (or pass 0) to follow the display refresh.
    #[arg(long)]
    fps: Option<u32>,
    /// Frequency of the test tone in Hz.
    #[arg(long, default_value_t = 220.0)]
    frequency: f32,
    /// Peak amplitude of the test tone, 1.0 is full scale.
    #[arg(long, default_value_t = 0.8)]
    amplitude: f32,
    /// Sample rate the tone is generated at.
    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,
    /// How long to run the loop for.
    #[arg(long, default_value_t = 1_000)]
    duration_ms: u64,
    /// Surface width in pixels.
    #[arg(long, default_value_t = 640)]
    width: u32,
    /// Surface height in pixels.
    #[arg(long, default_value_t = 240)]
    height: u32,
    /// Pace ticks with the wall clock instead of simulating time.
    #[arg(long)]
    realtime: bool,
    /// Print the last frame's drawing commands as JSON.
    #[arg(long)]
    dump: bool,
}
