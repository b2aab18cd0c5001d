//! Reference face enrollment

use proctor_config::EnrollmentPolicy;

/// Enrollment progress after one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentProgress {
    pub locked: bool,
    pub streak: u32,
}

/// Captures a reference embedding once exactly one face has been seen on
/// enough consecutive frames.
#[derive(Debug, Clone)]
pub struct EnrollmentGate {
    required: u32,
    streak: u32,
    reference: Option<Vec<f64>>,
}

impl EnrollmentGate {
    pub fn new(policy: &EnrollmentPolicy) -> Self {
        Self {
            required: policy.stable_frames,
            streak: 0,
            reference: None,
        }
    }

    /// Feed one frame. Once locked, further observations change nothing.
    pub fn observe(&mut self, face_count: usize, encodings: &[Vec<f64>]) -> EnrollmentProgress {
        if self.is_locked() {
            return self.progress();
        }

        match encodings {
            [single] => {
                self.streak += 1;
                if self.streak >= self.required {
                    self.reference = Some(single.clone());
                }
            }
            _ => {
                if self.streak > 0 {
                    tracing::debug!(
                        face_count,
                        encodings = encodings.len(),
                        streak = self.streak,
                        "Enrollment streak reset"
                    );
                }
                self.streak = 0;
            }
        }

        self.progress()
    }

    pub fn is_locked(&self) -> bool {
        self.reference.is_some()
    }

    pub fn reference(&self) -> Option<&[f64]> {
        self.reference.as_deref()
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn required(&self) -> u32 {
        self.required
    }

    fn progress(&self) -> EnrollmentProgress {
        EnrollmentProgress {
            locked: self.is_locked(),
            streak: self.streak,
        }
    }
}
