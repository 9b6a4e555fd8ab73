use approx::assert_relative_eq;
use cstr_control::rkf45::{self, Rkf45};
use cstr_control::{DVector, RateModel};

const INTEGRATION_TOLERANCE: f64 = 1e-5;

type State = DVector<f64>;
type Time = f64;

struct Ode;

// Implement the ODE dy/dt = y - t^2 + 1
impl RateModel for Ode {
    fn dim(&self) -> usize {
        1
    }

    fn rate(&self, _i: usize, t: Time, y: &State) -> f64 {
        y[0] - t * t + 1.0
    }
}

// Two uncoupled equations with different time scales.
struct Stiffish;

impl RateModel for Stiffish {
    fn dim(&self) -> usize {
        2
    }

    fn rate(&self, i: usize, t: Time, y: &State) -> f64 {
        match i {
            0 => -20.0 * (y[0] - t.cos()),
            _ => -0.5 * y[1],
        }
    }
}

#[test]
fn test_textbook_ivp() {
    let y0 = State::from_vec(vec![0.5]);
    let out = Rkf45::new(INTEGRATION_TOLERANCE)
        .advance(&Ode, 0.0, &y0, 2.0)
        .unwrap();
    assert_relative_eq!(out.y[0], analytic_solution(2.0), epsilon = INTEGRATION_TOLERANCE);
    assert!(out.h_last > 0.0 && out.h_last <= 2.0);
}

#[test]
fn test_free_function_matches_integrator() {
    let y0 = State::from_vec(vec![0.5]);
    let (y, h) = rkf45::advance(0.0, &y0, 2.0, &Ode, INTEGRATION_TOLERANCE).unwrap();
    let out = Rkf45::new(INTEGRATION_TOLERANCE)
        .advance(&Ode, 0.0, &y0, 2.0)
        .unwrap();
    assert_eq!(y, out.y);
    assert_eq!(h, out.h_last);
}

#[test]
fn test_rejected_steps_shrink() {
    let tolerance = 1e-8;
    let y0 = State::from_vec(vec![0.5]);
    let out = Rkf45::new(tolerance)
        .with_initial_step(Some(1.0))
        .with_trace(true)
        .advance(&Ode, 0.0, &y0, 2.0)
        .unwrap();

    assert!(out.stats.rejected_steps > 0);
    assert_eq!(
        out.attempts.len() as u32,
        out.stats.accepted_steps + out.stats.rejected_steps
    );
    for pair in out.attempts.windows(2) {
        if !pair[0].accepted {
            assert_eq!(pair[1].t, pair[0].t);
            assert!(pair[1].h < pair[0].h, "{:?}", pair);
        }
    }
    for attempt in out.attempts.iter().filter(|a| a.accepted) {
        assert!(attempt.error <= tolerance);
    }
    assert!(out.attempts.last().unwrap().accepted);
    assert_relative_eq!(out.y[0], analytic_solution(2.0), epsilon = 1e-7);
}

#[test]
fn test_accepted_steps_tile_the_horizon() {
    let y0 = State::from_vec(vec![0.0, 1.0]);
    let out = Rkf45::new(1e-6)
        .with_trace(true)
        .advance(&Stiffish, 0.0, &y0, 3.0)
        .unwrap();
    let accepted: Vec<_> = out.attempts.iter().filter(|a| a.accepted).collect();
    let covered: f64 = accepted.iter().map(|a| a.h).sum();
    assert_relative_eq!(covered, 3.0, epsilon = 1e-12);
    assert_relative_eq!(out.y[1], (-1.5f64).exp(), epsilon = 1e-5);
}

#[test]
fn test_reentrancy() {
    let integrator = Rkf45::new(1e-7);
    let y0 = State::from_vec(vec![0.0, 1.0]);
    let reference = integrator.advance(&Stiffish, 0.0, &y0, 3.0).unwrap();

    let (a, b) = std::thread::scope(|s| {
        let a = s.spawn(|| integrator.advance(&Stiffish, 0.0, &y0, 3.0).unwrap());
        let b = s.spawn(|| integrator.advance(&Stiffish, 0.0, &y0, 3.0).unwrap());
        (a.join().unwrap(), b.join().unwrap())
    });
    // an unrelated call in between must not leak into later ones
    let _ = integrator.advance(&Ode, 0.0, &State::from_vec(vec![0.5]), 1.0).unwrap();
    let c = integrator.advance(&Stiffish, 0.0, &y0, 3.0).unwrap();

    for out in [&a, &b, &c] {
        assert_eq!(out.y, reference.y);
        assert_eq!(out.h_last.to_bits(), reference.h_last.to_bits());
        assert_eq!(out.stats, reference.stats);
    }
}

/// Evaluates the analytic solution of the ODE at the given time.
fn analytic_solution(t: Time) -> f64 {
    (t + 1.0).powi(2) - 0.5 * t.exp()
}
