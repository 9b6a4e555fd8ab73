//! Butcher tableaux of the explicit Runge-Kutta methods used by the crate.

/// Coefficients of the embedded Runge-Kutta-Fehlberg 4(5) pair.
///
/// Stages and weights are numbered from 1, as in the usual tableau notation.
pub mod rkf45 {
    /// Number of stages of the method.
    pub const STAGES: usize = 6;

    /// Coefficient `a_ij` of the Runge-Kutta matrix.
    ///
    /// Returns zero outside of the strictly lower triangular part.
    pub fn a(i: usize, j: usize) -> f64 {
        match (i, j) {
            (2, 1) => 1.0 / 4.0,

            (3, 1) => 3.0 / 32.0,
            (3, 2) => 9.0 / 32.0,

            (4, 1) => 1932.0 / 2197.0,
            (4, 2) => -7200.0 / 2197.0,
            (4, 3) => 7296.0 / 2197.0,

            (5, 1) => 439.0 / 216.0,
            (5, 2) => -8.0,
            (5, 3) => 3680.0 / 513.0,
            (5, 4) => -845.0 / 4104.0,

            (6, 1) => -8.0 / 27.0,
            (6, 2) => 2.0,
            (6, 3) => -3544.0 / 2565.0,
            (6, 4) => 1859.0 / 4104.0,
            (6, 5) => -11.0 / 40.0,

            _ => 0.0,
        }
    }

    /// Node `c_i`.
    pub fn c(i: usize) -> f64 {
        match i {
            2 => 1.0 / 4.0,
            3 => 3.0 / 8.0,
            4 => 12.0 / 13.0,
            5 => 1.0,
            6 => 1.0 / 2.0,
            _ => 0.0,
        }
    }

    /// Weight `b_i` of the 4th order solution.
    pub fn b4(i: usize) -> f64 {
        match i {
            1 => 25.0 / 216.0,
            3 => 1408.0 / 2565.0,
            4 => 2197.0 / 4104.0,
            5 => -1.0 / 5.0,
            _ => 0.0,
        }
    }

    /// Weight `b*_i` of the 5th order solution.
    pub fn b5(i: usize) -> f64 {
        match i {
            1 => 16.0 / 135.0,
            3 => 6656.0 / 12825.0,
            4 => 28561.0 / 56430.0,
            5 => -9.0 / 50.0,
            6 => 2.0 / 55.0,
            _ => 0.0,
        }
    }

    /// Difference `b*_i - b_i` between the two weight sets, used for the error estimate.
    pub fn e(i: usize) -> f64 {
        b5(i) - b4(i)
    }
}

#[cfg(test)]
mod tests {
    use super::rkf45;

    #[test]
    fn weights_sum_to_one() {
        let s4: f64 = (1..=rkf45::STAGES).map(rkf45::b4).sum();
        let s5: f64 = (1..=rkf45::STAGES).map(rkf45::b5).sum();
        assert!((s4 - 1.0).abs() < 1.0E-14);
        assert!((s5 - 1.0).abs() < 1.0E-14);
    }

    #[test]
    fn rows_are_consistent_with_nodes() {
        for i in 2..=rkf45::STAGES {
            let row: f64 = (1..i).map(|j| rkf45::a(i, j)).sum();
            assert!((row - rkf45::c(i)).abs() < 1.0E-14, "row {}", i);
        }
    }
}
