//! Scalar root finding for inverting fitted dose–response curves.

/// Relative step tolerance for convergence.
const XTOL: f64 = 1.49012e-8;
/// Absolute residual tolerance for convergence.
const FTOL: f64 = 1e-12;
const MAX_ITERATIONS: usize = 100;
const MAX_HALVINGS: usize = 60;

#[derive(Debug, Clone, PartialEq)]
pub enum RootError {
    NonFiniteStart { x: f64, value: f64 },
    ZeroDerivative { x: f64 },
    /// Backtracking could not reduce `|g|`.
    NoDescent { x: f64 },
    MaxIterations { x: f64 },
}

impl std::fmt::Display for RootError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RootError::NonFiniteStart { x, value } => write!(f, "g({x}) = {value} is not finite"),
            RootError::ZeroDerivative { x } => write!(f, "derivative vanished at x = {x}"),
            RootError::NoDescent { x } => write!(f, "no step reduced |g| from x = {x}"),
            RootError::MaxIterations { x } => {
                write!(f, "no convergence after {MAX_ITERATIONS} iterations (last x = {x})")
            }
        }
    }
}

/// Find `x` with `g(x) = 0` by Newton's method from `x0`.
///
/// The derivative is a central difference. Each Newton step is halved until
/// `|g|` decreases, which keeps iterates out of regions where `g` is
/// undefined (non-finite values count as no improvement).
pub fn newton<G>(g: G, x0: f64) -> Result<f64, RootError>
where
    G: Fn(f64) -> f64,
{
    let mut x = x0;
    let mut gx = g(x);
    if !(x.is_finite() && gx.is_finite()) {
        return Err(RootError::NonFiniteStart { x, value: gx });
    }

    for _ in 0..MAX_ITERATIONS {
        if gx.abs() <= FTOL {
            return Ok(x);
        }

        let h = (x.abs() * 1e-6).max(f64::MIN_POSITIVE.sqrt());
        let slope = (g(x + h) - g(x - h)) / (2.0 * h);
        if !slope.is_finite() || slope == 0.0 {
            return Err(RootError::ZeroDerivative { x });
        }

        let mut step = -gx / slope;
        let mut accepted = None;
        for _ in 0..MAX_HALVINGS {
            let candidate = x + step;
            let g_candidate = g(candidate);
            if candidate.is_finite() && g_candidate.is_finite() && g_candidate.abs() < gx.abs() {
                accepted = Some((candidate, g_candidate));
                break;
            }
            step *= 0.5;
        }
        let Some((next, g_next)) = accepted else {
            return Err(RootError::NoDescent { x });
        };

        let moved = (next - x).abs();
        x = next;
        gx = g_next;
        if moved <= XTOL * x.abs() || gx.abs() <= FTOL {
            return Ok(x);
        }
    }

    Err(RootError::MaxIterations { x })
}
