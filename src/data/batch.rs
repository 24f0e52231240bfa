use crate::data::encoder::{EncodedSample, TargetMode};
use crate::data::sample::IMAGE_PIXELS;
use crate::error::{Error, Result};

/// An immutable, insertion-ordered collection of encoded samples from one file.
///
/// Only a [`BatchBuilder`] can grow one; once frozen it is shared read-only
/// (typically behind an `Arc`).
#[derive(Debug, Clone)]
pub struct Batch {
    samples: Vec<EncodedSample>,
    target_mode: TargetMode,
}

impl Batch {
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn target_mode(&self) -> TargetMode {
        self.target_mode
    }

    pub fn samples(&self) -> &[EncodedSample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EncodedSample> {
        self.samples.iter()
    }

    /// Ground-truth digits, in batch order.
    pub fn labels(&self) -> Vec<u8> {
        self.samples.iter().map(|s| s.target.label()).collect()
    }

    /// Rough heap footprint of the pixel data in bytes.
    pub fn approx_bytes(&self) -> usize {
        self.samples.len() * IMAGE_PIXELS * std::mem::size_of::<f32>()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a EncodedSample;
    type IntoIter = std::slice::Iter<'a, EncodedSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// The growing, exclusively-owned side of a [`Batch`].
#[derive(Debug)]
pub struct BatchBuilder {
    samples: Vec<EncodedSample>,
    target_mode: TargetMode,
}

impl BatchBuilder {
    pub fn new(target_mode: TargetMode) -> Self {
        BatchBuilder { samples: Vec::new(), target_mode }
    }

    /// Appends a sample and returns the new count. A sample whose target
    /// convention differs from the builder's is rejected with
    /// [`Error::TargetMode`] and the batch is left unchanged.
    pub fn push(&mut self, sample: EncodedSample) -> Result<usize> {
        let found = sample.target.mode();
        if found != self.target_mode {
            return Err(Error::TargetMode { expected: self.target_mode, found });
        }
        self.samples.push(sample);
        Ok(self.samples.len())
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn freeze(self) -> Batch {
        Batch { samples: self.samples, target_mode: self.target_mode }
    }
}
