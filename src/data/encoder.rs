use serde::{Deserialize, Serialize};

use crate::data::sample::{ImageTensor, Sample, NUM_CLASSES};
use crate::error::{Error, Result};
use crate::math::argmax;

/// Which target representation the encoder produces.
///
/// A build picks one convention per trainer binding: one-hot pairs with
/// categorical cross-entropy, scalar with sparse losses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMode {
    OneHot,
    Scalar,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    OneHot([f32; NUM_CLASSES]),
    Scalar(u8),
}

impl Target {
    pub fn mode(&self) -> TargetMode {
        match self {
            Target::OneHot(_) => TargetMode::OneHot,
            Target::Scalar(_) => TargetMode::Scalar,
        }
    }

    /// The ground-truth digit, arg-max decoded for one-hot targets.
    pub fn label(&self) -> u8 {
        match self {
            Target::OneHot(v) => argmax(v).unwrap_or(0) as u8,
            Target::Scalar(l) => *l,
        }
    }
}

/// A normalized image paired with its target. Image and target are never
/// stored apart, so their pairing survives any reordering of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSample {
    pub image: ImageTensor,
    pub target: Target,
}

/// Length-10 vector with a single 1.0 at `label`.
pub fn one_hot(label: i64) -> Result<[f32; NUM_CLASSES]> {
    let idx = check_label(label)?;
    let mut encoded = [0.0; NUM_CLASSES];
    encoded[idx as usize] = 1.0;
    Ok(encoded)
}

fn check_label(label: i64) -> Result<u8> {
    if (0..NUM_CLASSES as i64).contains(&label) {
        Ok(label as u8)
    } else {
        Err(Error::EncodingRange { label })
    }
}

/// Normalizes pixels to `p / 255.0` and encodes the label. Pure; safe to call
/// from several threads on different samples.
pub fn encode(sample: &Sample, mode: TargetMode) -> Result<EncodedSample> {
    let target = match mode {
        TargetMode::OneHot => Target::OneHot(one_hot(sample.label)?),
        TargetMode::Scalar => Target::Scalar(check_label(sample.label)?),
    };
    let pixels = sample.pixels.iter().map(|&p| p as f32 / 255.0).collect();
    Ok(EncodedSample { image: ImageTensor::new(pixels)?, target })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::IMAGE_PIXELS;

    fn sample(label: i64) -> Sample {
        Sample { label, pixels: (0..IMAGE_PIXELS).map(|i| (i % 256) as u8).collect() }
    }

    #[test]
    fn pixels_are_divided_by_255() {
        let encoded = encode(&sample(2), TargetMode::OneHot).unwrap();
        for (i, v) in encoded.image.as_slice().iter().enumerate() {
            assert!((0.0..=1.0).contains(v));
            assert_eq!(*v, (i % 256) as f32 / 255.0);
            assert_eq!((v * 255.0).round() as usize, i % 256);
        }
    }

    #[test]
    fn one_hot_has_a_single_one_and_decodes_back() {
        for n in 0..10 {
            let v = one_hot(n).unwrap();
            assert_eq!(v.iter().filter(|&&x| x == 1.0).count(), 1);
            assert_eq!(v.iter().filter(|&&x| x == 0.0).count(), 9);
            assert_eq!(v.iter().sum::<f32>(), 1.0);
            assert_eq!(argmax(&v), Some(n as usize));
        }
    }

    #[test]
    fn labels_outside_the_digit_range_fail() {
        assert!(matches!(one_hot(10), Err(Error::EncodingRange { label: 10 })));
        assert!(matches!(encode(&sample(-1), TargetMode::Scalar), Err(Error::EncodingRange { label: -1 })));
    }

    #[test]
    fn scalar_mode_keeps_the_label() {
        let encoded = encode(&sample(7), TargetMode::Scalar).unwrap();
        assert_eq!(encoded.target, Target::Scalar(7));
        assert_eq!(encoded.target.label(), 7);
        assert_eq!(encoded.target.mode(), TargetMode::Scalar);
    }
}
