/// Linearly maps `value` from `[in_min, in_max]` onto `[out_min, out_max]`.
///
/// Output ranges may be inverted (`out_min > out_max`), which is how the
/// renderer flips byte amplitudes into screen space. Values outside the
/// input range extrapolate. `in_min == in_max` divides by zero and yields a
/// non-finite result; callers must pass distinct input bounds.
pub fn map_range(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    (value - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_byte_range_onto_inverted_screen_range() {
        assert_eq!(map_range(0.0, 0.0, 255.0, 100.0, 0.0), 100.0);
        assert_eq!(map_range(255.0, 0.0, 255.0, 100.0, 0.0), 0.0);
        assert!((map_range(128.0, 0.0, 255.0, 100.0, 0.0) - 49.8).abs() < 0.01);
    }

    #[test]
    fn inverted_mapping_is_monotonically_decreasing() {
        let mapped: Vec<f32> = (0..=255u8)
            .map(|byte| map_range(f32::from(byte), 0.0, 255.0, 480.0, 0.0))
            .collect();
        assert!(mapped.windows(2).all(|pair| pair[1] < pair[0]));
    }

    #[test]
    fn extrapolates_outside_the_input_range() {
        assert_eq!(map_range(20.0, 0.0, 10.0, 0.0, 1.0), 2.0);
        assert_eq!(map_range(-10.0, 0.0, 10.0, 0.0, 1.0), -1.0);
    }

    #[test]
    fn degenerate_input_range_is_not_finite() {
        assert!(!map_range(1.0, 5.0, 5.0, 0.0, 1.0).is_finite());
    }
}
