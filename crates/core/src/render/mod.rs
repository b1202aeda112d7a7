use crate::{
    config::RendererStyle,
    mapping::map_range,
    sampler::ScopeSample,
    surface::{Point, Rect, Stroke, Surface},
};

/// Extra horizontal pixels per sample so the trace still reaches the right
/// edge when the width does not divide evenly.
pub const STEP_OVERLAP_PX: usize = 2;

/// Paints one [`ScopeSample`] per call onto a fixed-size surface.
///
/// Every draw repaints the whole surface, so the output depends only on the
/// surface size, the style and the sample.
#[derive(Debug)]
pub struct ScopeRenderer<S: Surface> {
    surface: S,
    width: u32,
    height: u32,
    style: RendererStyle,
}

impl<S: Surface> ScopeRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self::with_style(surface, RendererStyle::default())
    }

    /// Binds to `surface`, capturing its current size.
    pub fn with_style(surface: S, style: RendererStyle) -> Self {
        let (width, height) = surface.size();
        Self {
            surface,
            width,
            height,
            style,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn style(&self) -> &RendererStyle {
        &self.style
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Horizontal distance between consecutive samples for a window of
    /// `len` samples.
    pub fn step_px(&self, len: usize) -> usize {
        (self.width as usize).div_ceil(len.max(1)) + STEP_OVERLAP_PX
    }

    /// Screen-space y for a byte amplitude: 0 sits `padding` above the
    /// bottom edge, 255 `padding` below the top.
    pub fn amplitude_y(&self, value: u8) -> f32 {
        let padding = self.style.padding;
        map_range(
            f32::from(value),
            0.0,
            255.0,
            self.height as f32 - padding,
            padding,
        )
    }

    /// Trace points from the trigger index onward, clipped to the width.
    pub fn trace_points(&self, sample: &ScopeSample<'_>) -> Vec<Point> {
        let step = self.step_px(sample.data.len());
        let start = sample.trigger_index.min(sample.data.len());
        sample.data[start..]
            .iter()
            .zip((0..self.width as usize).step_by(step))
            .map(|(&value, x)| Point::new(x as f32, self.amplitude_y(value)))
            .collect()
    }

    pub fn draw(&mut self, sample: &ScopeSample<'_>) -> &mut Self {
        let width = self.width as f32;
        let height = self.height as f32;
        let points = self.trace_points(sample);

        self.surface.begin_frame();
        self.surface
            .fill_rect(Rect::new(0.0, 0.0, width, height), self.style.background);

        let centre = height / 2.0;
        self.surface.stroke_polyline(
            &[Point::new(0.0, centre), Point::new(width, centre)],
            Stroke {
                color: self.style.axis_color,
                width: self.style.axis_width,
            },
        );

        self.surface.stroke_polyline(
            &points,
            Stroke {
                color: self.style.trace_color,
                width: self.style.trace_width,
            },
        );

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{Color, DisplayList, DrawCommand, PixelSurface};

    fn trace(list: &DisplayList) -> Vec<Point> {
        match list.commands().last() {
            Some(DrawCommand::StrokePolyline { points, .. }) => points.clone(),
            other => panic!("expected trace stroke, got {other:?}"),
        }
    }

    #[test]
    fn step_spreads_samples_across_the_width() {
        let renderer = ScopeRenderer::new(DisplayList::new(1024, 200));
        assert_eq!(renderer.step_px(512), 4);
        assert_eq!(renderer.step_px(1000), 4);
        assert_eq!(renderer.step_px(2048), 3);
        assert_eq!(renderer.step_px(0), 1026);
    }

    #[test]
    fn maps_amplitudes_inside_the_padding() {
        let renderer = ScopeRenderer::new(DisplayList::new(100, 120));
        assert_eq!(renderer.amplitude_y(0), 110.0);
        assert_eq!(renderer.amplitude_y(255), 10.0);
        assert!((renderer.amplitude_y(128) - 60.0).abs() < 0.5);
    }

    #[test]
    fn draws_background_axis_then_trace() {
        let mut renderer = ScopeRenderer::new(DisplayList::new(64, 40));
        let data = [128u8; 16];
        renderer.draw(&ScopeSample::new(&data));

        let commands = renderer.surface().commands();
        assert_eq!(commands.len(), 3);
        assert_eq!(
            commands[0],
            DrawCommand::FillRect {
                rect: Rect::new(0.0, 0.0, 64.0, 40.0),
                color: Color::rgb(0x11, 0x11, 0x11),
            }
        );
        assert_eq!(
            commands[1],
            DrawCommand::StrokePolyline {
                points: vec![Point::new(0.0, 20.0), Point::new(64.0, 20.0)],
                stroke: Stroke {
                    color: Color::rgb(0x55, 0x55, 0x55),
                    width: 1.0,
                },
            }
        );
        assert!(matches!(
            &commands[2],
            DrawCommand::StrokePolyline { stroke, .. } if stroke.width == 4.0
        ));
    }

    #[test]
    fn trace_starts_at_the_trigger_and_stops_at_the_edge() {
        // 20 samples over 30px: step = ceil(30 / 20) + 2 = 4, so x = 0..28.
        let mut renderer = ScopeRenderer::new(DisplayList::new(30, 50));
        let data: Vec<u8> = (0..20).map(|i| if i < 3 { 100 } else { 200 }).collect();
        let sample = ScopeSample::new(&data);
        assert_eq!(sample.trigger_index, 2);

        renderer.draw(&sample);
        let points = trace(renderer.surface());

        let xs: Vec<f32> = points.iter().map(|p| p.x).collect();
        assert_eq!(xs, [0.0, 4.0, 8.0, 12.0, 16.0, 20.0, 24.0, 28.0]);
        assert_eq!(points[0].y, renderer.amplitude_y(100));
        assert_eq!(points[1].y, renderer.amplitude_y(200));
    }

    #[test]
    fn trace_ends_with_the_data_when_it_runs_out_first() {
        let mut renderer = ScopeRenderer::new(DisplayList::new(100, 50));
        let data = [10u8, 120, 130, 140];
        renderer.draw(&ScopeSample::new(&data));

        // Trigger at 1, step = 25 + 2.
        let xs: Vec<f32> = trace(renderer.surface()).iter().map(|p| p.x).collect();
        assert_eq!(xs, [0.0, 27.0, 54.0]);
    }

    #[test]
    fn empty_samples_only_paint_the_frame() {
        let mut renderer = ScopeRenderer::new(DisplayList::new(10, 10));
        renderer.draw(&ScopeSample::new(&[]));
        assert!(trace(renderer.surface()).is_empty());
    }

    #[test]
    fn repeated_draws_are_pixel_identical() {
        let data: Vec<u8> = (0..512).map(|i| ((i * 7) % 256) as u8).collect();
        let sample = ScopeSample::new(&data);

        let mut first = ScopeRenderer::new(PixelSurface::new(320, 120));
        first.draw(&sample).draw(&sample);
        let mut second = ScopeRenderer::new(PixelSurface::new(320, 120));
        second.draw(&sample);

        assert_eq!(first.surface().pixels(), second.surface().pixels());

        let mut list = ScopeRenderer::new(DisplayList::new(320, 120));
        list.draw(&sample);
        let once = list.surface().clone();
        list.draw(&sample);
        assert_eq!(list.surface(), &once);
    }

    #[test]
    fn paints_background_axis_and_trace_pixels() {
        let mut renderer = ScopeRenderer::new(PixelSurface::new(64, 40));
        let data = [255u8; 32];
        renderer.draw(&ScopeSample::new(&data));
        let surface = renderer.surface();

        let style = RendererStyle::default();
        assert_eq!(surface.pixel(0, 39), Some(style.background));
        assert_eq!(surface.pixel(30, 20), Some(style.axis_color));
        // Full-scale samples sit on y = padding.
        assert_eq!(surface.pixel(10, 10), Some(style.trace_color));
    }
}
