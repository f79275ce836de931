//! [`FaceMatcher`]: Euclidean-distance comparison of face descriptors.

use common::ProtectionError;
use serde::{Deserialize, Serialize};

use super::capture::ConfirmedCapture;

/// Distance below which two descriptors are considered the same face.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;

/// One face embedding as produced by the external model.
///
/// Always non-empty with finite components; persisted verbatim as
/// `metadata.faceDescriptor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FaceDescriptor(Vec<f64>);

impl FaceDescriptor {
    /// Validate and wrap a raw embedding.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectionError::InvalidDescriptor`] if `values` is empty or
    /// contains NaN or an infinity.
    pub fn new(values: Vec<f64>) -> Result<Self, ProtectionError> {
        if values.is_empty() {
            return Err(ProtectionError::InvalidDescriptor(
                "descriptor is empty".into(),
            ));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(ProtectionError::InvalidDescriptor(format!(
                "component {i} is not a finite number"
            )));
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Dimensionality of the embedding.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; descriptors are validated non-empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }
}

impl TryFrom<Vec<f64>> for FaceDescriptor {
    type Error = ProtectionError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<FaceDescriptor> for Vec<f64> {
    fn from(d: FaceDescriptor) -> Self {
        d.0
    }
}

/// Euclidean distance between two descriptors of equal length.
///
/// # Errors
///
/// Returns [`ProtectionError::InvalidDescriptor`] if the lengths differ.
pub fn euclidean_distance(a: &FaceDescriptor, b: &FaceDescriptor) -> Result<f64, ProtectionError> {
    if a.len() != b.len() {
        return Err(ProtectionError::InvalidDescriptor(format!(
            "length mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    let sum: f64 = a
        .as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| (x - y) * (x - y))
        .sum();
    Ok(sum.sqrt())
}

/// `true` iff the distance between `candidate` and `stored` is strictly below `threshold`.
///
/// # Errors
///
/// Returns [`ProtectionError::InvalidDescriptor`] if the lengths differ.
pub fn is_match(
    candidate: &FaceDescriptor,
    stored: &FaceDescriptor,
    threshold: f64,
) -> Result<bool, ProtectionError> {
    Ok(euclidean_distance(candidate, stored)? < threshold)
}

/// Threshold-carrying matcher used by the unlock flow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMatcher {
    threshold: f64,
}

impl FaceMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn matches(
        &self,
        candidate: &FaceDescriptor,
        stored: &FaceDescriptor,
    ) -> Result<bool, ProtectionError> {
        is_match(candidate, stored, self.threshold)
    }

    /// Evaluate a confirmed capture against the enrolled descriptor.
    ///
    /// This is the only check the unlock flow accepts.
    ///
    /// # Errors
    ///
    /// - [`ProtectionError::BiometricMismatch`] if the faces do not match.
    /// - [`ProtectionError::InvalidDescriptor`] if the lengths differ.
    pub fn verify(
        &self,
        capture: &ConfirmedCapture,
        stored: &FaceDescriptor,
    ) -> Result<(), ProtectionError> {
        if self.matches(capture.descriptor(), stored)? {
            Ok(())
        } else {
            Err(ProtectionError::BiometricMismatch)
        }
    }
}

impl Default for FaceMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}
