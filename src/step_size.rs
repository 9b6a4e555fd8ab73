//! Adaptive step size control.

// Upper bound of the shrink factor after a rejection, whatever the configured factors.
const REJECT_FAC_MAX: f64 = 0.9;

/// Outcome of a trial step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepDecision {
    /// The step is accepted; the next trial step size is attached.
    Accept(f64),
    /// The step is rejected and must be retried with the attached, strictly smaller, step size.
    Reject(f64),
}

/// Used for adaptive step size control of the Fehlberg pair.
#[derive(Clone, Copy, Debug)]
pub struct StepSizeController {
    tolerance: f64,
    safety_factor: f64,
    fac_min: f64,
    fac_max: f64,
    h_max: f64,
}

impl StepSizeController {
    /// Creates a controller responsible for adaptive step size control.
    ///
    /// # Arguments
    ///
    /// * `tolerance`       - Maximum accepted local error per unit step
    /// * `safety_factor`   - Safety factor applied to the optimal step, 0.84 for Fehlberg
    /// * `fac_min`         - Minimum factor between two successive steps
    /// * `fac_max`         - Maximum factor between two successive steps
    /// * `h_max`           - Maximum step size
    ///
    pub fn new(tolerance: f64, safety_factor: f64, fac_min: f64, fac_max: f64, h_max: f64) -> Self {
        StepSizeController {
            tolerance,
            safety_factor,
            fac_min,
            fac_max,
            h_max: h_max.abs(),
        }
    }

    /// Scaling factor `safety * (tol / err)^(1/4)`, clamped into `[fac_min, fac_max]`.
    ///
    /// A zero error yields the maximum factor and a non-finite one the minimum factor.
    pub fn factor(&self, err: f64) -> f64 {
        if !err.is_finite() {
            return self.fac_min;
        }
        if err <= 0.0 {
            return self.fac_max;
        }
        let fac = self.safety_factor * (self.tolerance / err).powf(0.25);
        fac.clamp(self.fac_min, self.fac_max)
    }

    /// Determines if the step must be accepted or rejected and adapts the step size accordingly.
    pub fn decide(&self, err: f64, h: f64) -> StepDecision {
        if err.is_finite() && err <= self.tolerance {
            StepDecision::Accept((h * self.factor(err)).min(self.h_max))
        } else {
            StepDecision::Reject(h * self.factor(err).min(REJECT_FAC_MAX))
        }
    }

    /// Returns the maximum step size allowed.
    pub fn h_max(&self) -> f64 {
        self.h_max
    }

    /// Returns the tolerance the controller enforces.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> StepSizeController {
        StepSizeController::new(1.0E-5, 0.84, 0.1, 4.0, 1.0)
    }

    #[test]
    fn accepted_step_grows_when_error_is_small() {
        match controller().decide(1.0E-9, 0.1) {
            StepDecision::Accept(h) => assert!(h > 0.1),
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[test]
    fn rejected_step_shrinks_strictly() {
        for err in [1.0E-5 * 1.0001, 1.0E-3, 1.0, f64::NAN, f64::INFINITY] {
            match controller().decide(err, 0.1) {
                StepDecision::Reject(h) => assert!(h < 0.1 && h > 0.0, "err {}", err),
                other => panic!("unexpected decision {:?}", other),
            }
        }
    }

    #[test]
    fn zero_error_is_capped_by_fac_max_and_h_max() {
        match controller().decide(0.0, 0.1) {
            StepDecision::Accept(h) => assert!((h - 0.4).abs() < 1.0E-15),
            other => panic!("unexpected decision {:?}", other),
        }
        match controller().decide(0.0, 0.5) {
            StepDecision::Accept(h) => assert!((h - 1.0).abs() < 1.0E-15),
            other => panic!("unexpected decision {:?}", other),
        }
    }
}
