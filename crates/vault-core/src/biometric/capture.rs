//! Live captures versus the confirmed capture that may unlock a file.
//!
//! A UI compares incoming frames continuously and may show "face recognised"
//! feedback from [`Capture::preview`]. That result is advisory. Disclosure
//! needs a [`ConfirmedCapture`], which only exists after the user explicitly
//! confirms one capture via [`Capture::confirm`].

use common::ProtectionError;

use super::matcher::{FaceDescriptor, FaceMatcher};

/// Descriptor extracted from one camera frame.
#[derive(Debug, Clone)]
pub struct Capture {
    descriptor: FaceDescriptor,
}

impl Capture {
    pub fn new(descriptor: FaceDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &FaceDescriptor {
        &self.descriptor
    }

    /// Advisory comparison for live feedback. Never authorises an unlock.
    pub fn preview(
        &self,
        matcher: &FaceMatcher,
        stored: &FaceDescriptor,
    ) -> Result<bool, ProtectionError> {
        matcher.matches(&self.descriptor, stored)
    }

    /// Mark this capture as explicitly confirmed by the user.
    pub fn confirm(self) -> ConfirmedCapture {
        ConfirmedCapture {
            descriptor: self.descriptor,
        }
    }
}

/// A capture the user explicitly confirmed for unlocking.
///
/// Has no public constructor other than [`Capture::confirm`].
#[derive(Debug, Clone)]
pub struct ConfirmedCapture {
    descriptor: FaceDescriptor,
}

impl ConfirmedCapture {
    pub fn descriptor(&self) -> &FaceDescriptor {
        &self.descriptor
    }
}
