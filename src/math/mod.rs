pub mod matrix;
pub mod shape;

pub use matrix::Matrix;
pub use shape::Shape;

/// Index of the largest value, scanning left to right; the first index
/// attaining the maximum wins. NaN entries never win. `None` for an empty slice.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::argmax;

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[0.0; 10]), Some(0));
    }

    #[test]
    fn argmax_skips_nan_and_handles_empty() {
        assert_eq!(argmax(&[f32::NAN, 0.3, 0.1]), Some(1));
        assert_eq!(argmax(&[]), None);
    }
}
