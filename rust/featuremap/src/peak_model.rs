//! Gaussian peak model fit by Levenberg-Marquardt least squares.

use nalgebra::{
    Matrix3,
    Vector3,
};
use serde::{
    Deserialize,
    Serialize,
};

const SQRT_TWO_PI: f64 = 2.506_628_274_631_000_7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianParams {
    pub amplitude: f64,
    pub center: f64,
    pub sigma: f64,
}

impl GaussianParams {
    pub fn eval(&self, x: f64) -> f64 {
        let d = x - self.center;
        self.amplitude * (-(d * d) / (2.0 * self.sigma * self.sigma)).exp()
    }

    /// Integral of the curve, `a * sigma * sqrt(2 pi)`.
    pub fn area(&self) -> f64 {
        self.amplitude * self.sigma.abs() * SQRT_TWO_PI
    }

    fn is_usable(&self) -> bool {
        self.amplitude.is_finite()
            && self.center.is_finite()
            && self.sigma.is_finite()
            && self.sigma != 0.0
    }
}

/// Result of fitting the model to one segment.
///
/// A failed fit still carries usable numbers: the initial guess, and the area
/// implied by it. Its goodness of fit is 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum FitOutcome {
    #[serde(rename = "fit")]
    Fit {
        params: GaussianParams,
        area: f64,
        goodness_of_fit: f64,
    },
    #[serde(rename = "failed")]
    FitFailed { fallback: GaussianParams, area: f64 },
}

impl FitOutcome {
    pub fn params(&self) -> &GaussianParams {
        match self {
            FitOutcome::Fit { params, .. } => params,
            FitOutcome::FitFailed { fallback, .. } => fallback,
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            FitOutcome::Fit { area, .. } | FitOutcome::FitFailed { area, .. } => *area,
        }
    }

    pub fn goodness_of_fit(&self) -> f64 {
        match self {
            FitOutcome::Fit {
                goodness_of_fit, ..
            } => *goodness_of_fit,
            FitOutcome::FitFailed { .. } => 0.0,
        }
    }

    pub fn is_fit(&self) -> bool {
        matches!(self, FitOutcome::Fit { .. })
    }

    fn failed(fallback: GaussianParams) -> Self {
        let area = if fallback.area().is_finite() {
            fallback.area()
        } else {
            0.0
        };
        FitOutcome::FitFailed { fallback, area }
    }
}

/// Coefficient of determination of `fitted` against `observed`.
///
/// Bounded above by 1, which it reaches exactly when both slices are equal.
/// A constant `observed` has no variance to explain: the result is 1 for an exact
/// match and 0 otherwise.
pub fn goodness_of_fit(observed: &[f64], fitted: &[f64]) -> f64 {
    if observed.is_empty() || observed.len() != fitted.len() {
        return 0.0;
    }
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
    let ss_res: f64 = observed
        .iter()
        .zip(fitted.iter())
        .map(|(o, f)| (f - o) * (f - o))
        .sum();
    let ss_tot: f64 = observed.iter().map(|o| (o - mean) * (o - mean)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[derive(Debug, Clone, Copy)]
pub struct PeakModel {
    pub max_iterations: usize,
    /// Relative tolerance on the step size and on the decrease of the squared error.
    pub tolerance: f64,
}

impl Default for PeakModel {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
        }
    }
}

const LAMBDA_START: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e12;

impl PeakModel {
    /// Fits `a * exp(-(x - mu)^2 / (2 sigma^2))` to `(x, y)` starting from `guess`.
    ///
    /// Fewer than three points, a degenerate guess, or a fit that runs out of
    /// iterations or leaves finite space gives [`FitOutcome::FitFailed`].
    pub fn fit(&self, x: &[f64], y: &[f64], guess: GaussianParams) -> FitOutcome {
        if x.len() != y.len() || x.len() < 3 || !guess.is_usable() {
            return FitOutcome::failed(guess);
        }

        let sse_at = |p: &Vector3<f64>| -> f64 {
            let params = to_params(p);
            x.iter()
                .zip(y.iter())
                .map(|(xi, yi)| {
                    let r = yi - params.eval(*xi);
                    r * r
                })
                .sum()
        };

        let mut p = Vector3::new(guess.amplitude, guess.center, guess.sigma);
        let mut sse = sse_at(&p);
        let mut lambda = LAMBDA_START;
        let mut converged = sse == 0.0;

        let mut iteration = 0;
        while !converged && iteration < self.max_iterations {
            iteration += 1;
            let (jtj, jtr) = normal_equations(x, y, &p);

            let mut stalled = true;
            while lambda < LAMBDA_MAX {
                let mut damped = jtj;
                for k in 0..3 {
                    damped[(k, k)] += lambda * jtj[(k, k)].max(f64::EPSILON);
                }
                let Some(step) = damped.lu().solve(&jtr) else {
                    lambda *= 10.0;
                    continue;
                };
                let candidate = p + step;
                let candidate_sse = sse_at(&candidate);
                if candidate_sse.is_finite() && candidate[2] != 0.0 && candidate_sse < sse {
                    let decrease = sse - candidate_sse;
                    p = candidate;
                    sse = candidate_sse;
                    lambda = (lambda / 10.0).max(f64::EPSILON);
                    stalled = false;
                    converged = step.norm() <= self.tolerance * (p.norm() + self.tolerance)
                        || decrease <= self.tolerance * sse;
                    break;
                }
                lambda *= 10.0;
            }
            // No damping gives a decrease: the gradient vanishes, we are at a minimum.
            if stalled {
                converged = true;
            }
        }

        let params = to_params(&p);
        if !converged || !params.is_usable() {
            return FitOutcome::failed(guess);
        }
        let fitted: Vec<f64> = x.iter().map(|xi| params.eval(*xi)).collect();
        FitOutcome::Fit {
            area: params.area(),
            goodness_of_fit: goodness_of_fit(y, &fitted),
            params,
        }
    }
}

fn to_params(p: &Vector3<f64>) -> GaussianParams {
    GaussianParams {
        amplitude: p[0],
        center: p[1],
        sigma: p[2].abs(),
    }
}

/// `J^T J` and `J^T r` of the residuals `r = y - f(x)`.
fn normal_equations(x: &[f64], y: &[f64], p: &Vector3<f64>) -> (Matrix3<f64>, Vector3<f64>) {
    let (a, mu, s) = (p[0], p[1], p[2]);
    let mut jtj = Matrix3::zeros();
    let mut jtr = Vector3::zeros();
    for (xi, yi) in x.iter().zip(y.iter()) {
        let d = xi - mu;
        let e = (-(d * d) / (2.0 * s * s)).exp();
        let j = Vector3::new(e, a * e * d / (s * s), a * e * d * d / (s * s * s));
        let r = yi - a * e;
        jtj += j * j.transpose();
        jtr += j * r;
    }
    (jtj, jtr)
}
