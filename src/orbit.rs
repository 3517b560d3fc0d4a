//! Orbit of a single point, for stepping through its iterations one at a time.

use crate::pixel::Complex;

/**
The orbit `c, c² + c, …` of one point, up to its escape or the budget.

`history` holds every value that stayed within the horizon, starting with `z = c`,
so `escape_count() == history.len() - 1` iterations stayed bounded. A cursor walks
the history with [`OrbitTrace::forward`] and [`OrbitTrace::back`].
*/
#[derive(Clone, Debug, PartialEq)]
pub struct OrbitTrace {
    c: Complex,
    history: Vec<Complex>,
    escaped: bool,
    cursor: usize,
}

impl OrbitTrace {
    pub fn new(c: Complex, max_iter: u32, horizon: f64) -> Self {
        let horizon_squared = horizon * horizon;
        let mut history = vec![c];
        let mut escaped = false;

        let mut z = c;
        for _ in 0..max_iter {
            z = Complex::new(
                z.real * z.real - z.imaginary * z.imaginary + c.real,
                2.0 * z.real * z.imaginary + c.imaginary,
            );
            if z.norm_squared() > horizon_squared {
                escaped = true;
                break;
            }
            history.push(z);
        }

        OrbitTrace {
            c,
            history,
            escaped,
            cursor: 0,
        }
    }

    pub fn c(&self) -> Complex {
        self.c
    }

    pub fn history(&self) -> &[Complex] {
        &self.history
    }

    /// Iterations that stayed within the horizon.
    pub fn escape_count(&self) -> usize {
        self.history.len() - 1
    }

    pub fn escaped(&self) -> bool {
        self.escaped
    }

    pub fn steps(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Complex {
        self.history[self.cursor]
    }

    /// Moves one iteration on; stays put at the last recorded value.
    pub fn forward(&mut self) -> Complex {
        if self.cursor < self.escape_count() {
            self.cursor += 1;
        }
        self.current()
    }

    /// Moves one iteration back; stays put at `c`.
    pub fn back(&mut self) -> Complex {
        self.cursor = self.cursor.saturating_sub(1);
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_until_escape() {
        // 1, 2, 5: the third value leaves the horizon.
        let trace = OrbitTrace::new(Complex::new(1.0, 0.0), 100, 2.0);
        assert_eq!(
            trace.history(),
            [Complex::new(1.0, 0.0), Complex::new(2.0, 0.0)]
        );
        assert_eq!(trace.escape_count(), 1);
        assert!(trace.escaped());
    }

    #[test]
    fn bounded_points_fill_the_budget() {
        let trace = OrbitTrace::new(Complex::new(-1.0, 0.0), 10, 2.0);
        assert!(!trace.escaped());
        assert_eq!(trace.escape_count(), 10);
        assert_eq!(trace.history()[1], Complex::new(0.0, 0.0));
        assert_eq!(trace.history()[2], Complex::new(-1.0, 0.0));
    }

    #[test]
    fn cursor_stays_in_range() {
        let mut trace = OrbitTrace::new(Complex::new(-1.0, 0.0), 3, 2.0);
        assert_eq!(trace.back(), Complex::new(-1.0, 0.0));
        assert_eq!(trace.forward(), Complex::new(0.0, 0.0));
        trace.forward();
        trace.forward();
        trace.forward();
        assert_eq!(trace.steps(), 3);
        trace.back();
        assert_eq!(trace.steps(), 2);
    }
}
