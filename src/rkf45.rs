//! Explicit Runge-Kutta-Fehlberg method of order 4(5) with adaptive step size.
//!
//! The integrator only stores its parameters. Every call to [`Rkf45::advance`] allocates its
//! own stage vectors, so a single instance can be shared between independent integrations.

use crate::butcher_tableau::rkf45;
use crate::ode_shared::{IntegrationError, RateModel, Stats, StepAttempt};
use crate::step_size::{StepDecision, StepSizeController};

use log::{debug, trace};
use nalgebra::DVector;

/// Safety factor of the Fehlberg step size formula.
pub const SAFETY_FACTOR: f64 = 0.84;
/// Default fraction of the horizon used as the first trial step.
pub const DEFAULT_HORIZON_FRACTION: f64 = 0.1;
/// Default bound on consecutive rejections of a single step.
pub const DEFAULT_MAX_REJECTIONS: u32 = 50;
/// Default bound on the number of accepted steps of one call.
pub const DEFAULT_N_MAX: u32 = 100_000;

/// Result of an integration over a horizon.
#[derive(Clone, Debug, PartialEq)]
pub struct Advance {
    /// State at the end of the horizon (5th order solution).
    pub y: DVector<f64>,
    /// Size of the last accepted step.
    pub h_last: f64,
    /// Step size proposed by the controller after the last accepted step.
    pub h_next: f64,
    pub stats: Stats,
    /// Every trial step, in order. Empty unless tracing was enabled.
    pub attempts: Vec<StepAttempt>,
}

/// Structure containing the parameters for the numerical integration.
#[derive(Clone, Debug)]
pub struct Rkf45 {
    tolerance: f64,
    h_init: Option<f64>,
    h_max: Option<f64>,
    horizon_fraction: f64,
    fac_min: f64,
    fac_max: f64,
    max_rejections: u32,
    n_max: u32,
    uround: f64,
    trace: bool,
}

impl Rkf45 {
    /// Default initializer for the structure
    ///
    /// # Arguments
    ///
    /// * `tolerance`   - Maximum accepted local error per unit step, `|y5 - y4| / h`
    ///
    pub fn new(tolerance: f64) -> Self {
        Rkf45 {
            tolerance,
            h_init: None,
            h_max: None,
            horizon_fraction: DEFAULT_HORIZON_FRACTION,
            fac_min: 0.1,
            fac_max: 4.0,
            max_rejections: DEFAULT_MAX_REJECTIONS,
            n_max: DEFAULT_N_MAX,
            uround: f64::EPSILON,
            trace: false,
        }
    }

    /// Advanced initializer for the structure.
    ///
    /// # Arguments
    ///
    /// * `tolerance`        - Maximum accepted local error per unit step
    /// * `horizon_fraction` - Fraction of the horizon used as first trial step. Default is 0.1
    /// * `fac_min`          - Minimum factor between two successive steps. Default is 0.1
    /// * `fac_max`          - Maximum factor between two successive steps. Default is 4.0
    /// * `max_rejections`   - Maximum number of consecutive rejections of one step. Default is 50
    /// * `n_max`            - Maximum number of accepted steps. Default is 100000
    ///
    pub fn from_param(
        tolerance: f64,
        horizon_fraction: f64,
        fac_min: f64,
        fac_max: f64,
        max_rejections: u32,
        n_max: u32,
    ) -> Self {
        Rkf45 {
            horizon_fraction,
            fac_min,
            fac_max,
            max_rejections,
            n_max,
            ..Rkf45::new(tolerance)
        }
    }

    /// Uses `h` as the first trial step instead of a fraction of the horizon.
    ///
    /// Non-positive or non-finite values are ignored.
    pub fn with_initial_step(mut self, h: Option<f64>) -> Self {
        self.h_init = h.filter(|h| h.is_finite() && *h > 0.0);
        self
    }

    /// Caps the step size.
    pub fn with_max_step(mut self, h_max: f64) -> Self {
        self.h_max = Some(h_max);
        self
    }

    /// Records every trial step in [`Advance::attempts`].
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn validate<M: RateModel>(
        &self,
        model: &M,
        t0: f64,
        y0: &DVector<f64>,
        t_end: f64,
    ) -> Result<(), IntegrationError> {
        if model.dim() != y0.len() {
            return Err(IntegrationError::InvalidInput(format!(
                "the model has {} equations but the state has {} components",
                model.dim(),
                y0.len()
            )));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(IntegrationError::InvalidInput(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if !(t0.is_finite() && t_end.is_finite()) || t_end <= t0 {
            return Err(IntegrationError::InvalidInput(format!(
                "target time {} must be finite and after {}",
                t_end, t0
            )));
        }
        if y0.iter().any(|v| !v.is_finite()) {
            return Err(IntegrationError::InvalidInput(
                "initial state contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }

    /// Advances `y0` from `t0` to `t_end`, keeping the local error of every accepted step under the tolerance.
    pub fn advance<M: RateModel>(
        &self,
        model: &M,
        t0: f64,
        y0: &DVector<f64>,
        t_end: f64,
    ) -> Result<Advance, IntegrationError> {
        self.validate(model, t0, y0, t_end)?;

        let dim = y0.len();
        let span = t_end - t0;
        let h_max = self.h_max.unwrap_or(span).min(span);
        let controller =
            StepSizeController::new(self.tolerance, SAFETY_FACTOR, self.fac_min, self.fac_max, h_max);

        let mut stats = Stats::new();
        let mut attempts = Vec::new();
        let mut t = t0;
        let mut y = y0.clone();
        let mut h = self.h_init.unwrap_or(self.horizon_fraction * span).min(h_max);
        let mut h_last = h;
        let mut last = false;

        // Stage derivatives and intermediate states
        let mut k: Vec<DVector<f64>> = vec![DVector::zeros(dim); rkf45::STAGES];
        let mut y_stage = DVector::zeros(dim);
        let mut y_next = DVector::zeros(dim);

        while !last {
            if stats.accepted_steps >= self.n_max {
                return Err(IntegrationError::MaxNumStepReached {
                    t,
                    n_step: stats.accepted_steps,
                });
            }

            // Check if it's the last step
            if t + 1.01 * h >= t_end {
                h = t_end - t;
                last = true;
            }

            let mut rejections = 0;
            loop {
                if !(h > 0.0) || 0.1 * h <= self.uround * t.abs() {
                    return Err(IntegrationError::StepSizeUnderflow { t });
                }

                // 6 stages
                for s in 0..rkf45::STAGES {
                    y_stage.copy_from(&y);
                    for (j, k_j) in k.iter().enumerate().take(s) {
                        y_stage.axpy(h * rkf45::a(s + 1, j + 1), k_j, 1.0);
                    }
                    model.rates(t + rkf45::c(s + 1) * h, &y_stage, &mut k[s]);
                }
                stats.num_eval += rkf45::STAGES as u32;

                // Worst component of |y5 - y4| / h
                let mut err: f64 = 0.0;
                for i in 0..dim {
                    let mut diff = 0.0;
                    for (s, k_s) in k.iter().enumerate() {
                        diff += rkf45::e(s + 1) * k_s[i];
                    }
                    // diff is already divided by h: y5 - y4 = h * sum(e_s * k_s)
                    let err_i = diff.abs();
                    if err_i.is_nan() {
                        err = f64::NAN;
                        break;
                    }
                    err = err.max(err_i);
                }

                let decision = controller.decide(err, h);
                if self.trace {
                    attempts.push(StepAttempt {
                        t,
                        h,
                        error: err,
                        accepted: matches!(decision, StepDecision::Accept(_)),
                    });
                }

                match decision {
                    StepDecision::Accept(h_new) => {
                        y_next.copy_from(&y);
                        for (s, k_s) in k.iter().enumerate() {
                            y_next.axpy(h * rkf45::b5(s + 1), k_s, 1.0);
                        }
                        std::mem::swap(&mut y, &mut y_next);
                        stats.accepted_steps += 1;
                        t = if last { t_end } else { t + h };
                        h_last = h;
                        h = h_new;
                        trace!("accepted step t = {:.6e}, h = {:.3e}, err = {:.3e}", t, h_last, err);
                        break;
                    }
                    StepDecision::Reject(h_new) => {
                        rejections += 1;
                        stats.rejected_steps += 1;
                        debug!(
                            "rejected step at t = {:.6e}: h = {:.3e}, err = {:.3e} > {:.3e}",
                            t, h, err, self.tolerance
                        );
                        if rejections > self.max_rejections {
                            return Err(IntegrationError::TooManyRejections { t, rejections });
                        }
                        h = h_new;
                        last = false;
                    }
                }
            }

            if !last && t + h > t_end {
                h = t_end - t;
            }
        }

        Ok(Advance {
            y,
            h_last,
            h_next: h,
            stats,
            attempts,
        })
    }
}

/// Advances `y0` from `t0` to `t_end` with the default parameters and the given tolerance.
///
/// Returns the final state and the size of the last accepted step.
pub fn advance<M: RateModel>(
    t0: f64,
    y0: &DVector<f64>,
    t_end: f64,
    model: &M,
    tolerance: f64,
) -> Result<(DVector<f64>, f64), IntegrationError> {
    let out = Rkf45::new(tolerance).advance(model, t0, y0, t_end)?;
    Ok((out.y, out.h_last))
}

#[cfg(test)]
mod tests {
    use super::*;

    // dy/dt = -y
    struct Decay;
    impl RateModel for Decay {
        fn dim(&self) -> usize {
            1
        }
        fn rate(&self, _i: usize, _t: f64, y: &DVector<f64>) -> f64 {
            -y[0]
        }
    }

    // dy/dt = (5 x^2 - y) / exp(x + y)
    struct Test3;
    impl RateModel for Test3 {
        fn dim(&self) -> usize {
            1
        }
        fn rate(&self, _i: usize, t: f64, y: &DVector<f64>) -> f64 {
            (5. * t * t - y[0]) / (t + y[0]).exp()
        }
    }

    // Blows up at t = 1
    struct Blowup;
    impl RateModel for Blowup {
        fn dim(&self) -> usize {
            1
        }
        fn rate(&self, _i: usize, _t: f64, y: &DVector<f64>) -> f64 {
            y[0] * y[0]
        }
    }

    #[test]
    fn test_decay_reaches_target_time() {
        let out = Rkf45::new(1.0E-8)
            .advance(&Decay, 0.0, &DVector::from_vec(vec![1.0]), 1.0)
            .unwrap();
        assert!((out.y[0] - (-1.0f64).exp()).abs() < 1.0E-7);
        assert!(out.h_last > 0.0);
        assert_eq!(out.stats.num_eval, 6 * (out.stats.accepted_steps + out.stats.rejected_steps));
    }

    #[test]
    fn test_integrate_test3() {
        let out = Rkf45::new(1.0E-9)
            .advance(&Test3, 0.0, &DVector::from_vec(vec![1.0]), 0.5)
            .unwrap();
        assert!((out.y[0] - 0.913059243).abs() < 1.0E-7);
    }

    #[test]
    fn test_mismatched_dimensions_are_rejected() {
        let res = Rkf45::new(1.0E-6).advance(&Decay, 0.0, &DVector::from_vec(vec![1.0, 2.0]), 1.0);
        assert!(matches!(res, Err(IntegrationError::InvalidInput(_))));
    }

    #[test]
    fn test_non_positive_tolerance_is_rejected() {
        for tol in [0.0, -1.0E-6, f64::NAN] {
            let res = Rkf45::new(tol).advance(&Decay, 0.0, &DVector::from_vec(vec![1.0]), 1.0);
            assert!(matches!(res, Err(IntegrationError::InvalidInput(_))));
        }
    }

    #[test]
    fn test_target_before_start_is_rejected() {
        let res = Rkf45::new(1.0E-6).advance(&Decay, 1.0, &DVector::from_vec(vec![1.0]), 1.0);
        assert!(matches!(res, Err(IntegrationError::InvalidInput(_))));
    }

    #[test]
    fn test_singularity_fails_instead_of_looping() {
        let res = Rkf45::from_param(1.0E-6, 0.1, 0.1, 4.0, 20, 10_000).advance(
            &Blowup,
            0.0,
            &DVector::from_vec(vec![1.0]),
            2.0,
        );
        let err = res.unwrap_err();
        assert!(err.time().unwrap() < 1.0, "{}", err);
    }

    #[test]
    fn test_initial_step_hint_is_used() {
        let out = Rkf45::new(1.0E-6)
            .with_initial_step(Some(1.0E-3))
            .with_trace(true)
            .advance(&Decay, 0.0, &DVector::from_vec(vec![1.0]), 1.0)
            .unwrap();
        assert_eq!(out.attempts[0].h, 1.0E-3);
    }
}
