//! Linear regression (ordinary least squares / ridge)

use crate::error::{PipelineError, Result};
use crate::origin;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// A fitted-or-unfitted regressor over a dense feature matrix.
pub trait Regressor {
    /// Fit on `x` (rows × features) against `y`.
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()>;

    /// Predict one value per row of `x`.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>>;

    fn is_fitted(&self) -> bool;

    /// Number of input features the fitted model expects
    fn n_features(&self) -> Option<usize>;

    /// Short model family name, recorded in artifact metadata
    fn name(&self) -> &'static str;

    /// Coefficient of determination (R²) on `x`, `y`.
    fn score(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;
        Ok(r2_score(y, y_pred.view()))
    }
}

/// R² of `y_pred` against `y_true`. A constant target scores 1.0 when matched
/// exactly and 0.0 otherwise.
pub fn r2_score(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
    let y_mean = y_true.mean().unwrap_or(0.0);
    let ss_res = (&y_pred - &y_true).mapv(|v| v * v).sum();
    let ss_tot = y_true.mapv(|v| (v - y_mean) * (v - y_mean)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Cholesky solve of the symmetric system `a x = b`.
///
/// When `a` is not positive definite a small diagonal jitter is added once
/// before giving up.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let factor = |a: &Array2<f64>| -> Option<Array2<f64>> {
        let mut l = Array2::zeros((n, n));
        for i in 0..n {
            for j in 0..=i {
                let mut sum = 0.0;
                for k in 0..j {
                    sum += l[[i, k]] * l[[j, k]];
                }
                if i == j {
                    let diag = a[[i, i]] - sum;
                    if diag <= 0.0 {
                        return None;
                    }
                    l[[i, j]] = diag.sqrt();
                } else {
                    l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
                }
            }
        }
        Some(l)
    };

    let l = match factor(a) {
        Some(l) => l,
        None => {
            let mut jittered = a.clone();
            let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
            for k in 0..n {
                jittered[[k, k]] += ridge.max(1e-12);
            }
            factor(&jittered)?
        }
    };

    // L y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Gaussian elimination with partial pivoting (fallback for `cholesky_solve`)
fn gauss_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let mut aug = Array2::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    for col in 0..n {
        let mut max_row = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[max_row, col]].abs() {
                max_row = row;
            }
        }
        if max_row != col {
            for j in 0..=n {
                aug.swap([col, j], [max_row, j]);
            }
        }
        if aug[[col, col]].abs() < 1e-10 {
            return None;
        }

        let pivot = aug[[col, col]];
        for j in col..=n {
            aug[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                if factor != 0.0 {
                    for j in col..=n {
                        aug[[row, j]] -= factor * aug[[col, j]];
                    }
                }
            }
        }
    }

    Some(aug.column(n).to_owned())
}

/// Linear regression model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients (weights)
    coefficients: Option<Array1<f64>>,
    /// Fitted intercept (bias)
    intercept: f64,
    /// Whether to fit intercept
    fit_intercept: bool,
    /// Regularization strength (L2)
    alpha: f64,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    /// Create a new linear regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
            alpha: 0.0,
        }
    }

    /// Enable/disable fitting intercept
    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Set regularization strength (Ridge regression)
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn coefficients(&self) -> Option<ArrayView1<'_, f64>> {
        self.coefficients.as_ref().map(|c| c.view())
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples == 0 {
            return Err(PipelineError::upstream(origin!("linear_regression.fit"), "no training rows"));
        }
        if n_samples != y.len() {
            return Err(PipelineError::upstream(
                origin!("linear_regression.fit"),
                format!("{} rows in x but {} targets", n_samples, y.len()),
            ));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(PipelineError::upstream(
                origin!("linear_regression.fit"),
                "training data contains non-finite values",
            ));
        }

        // Center data if fitting intercept
        let (x_centered, y_centered, x_mean, y_mean) = if self.fit_intercept {
            let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_features));
            let y_mean = y.mean().unwrap_or(0.0);
            let x_centered = &x - &x_mean.view().insert_axis(Axis(0));
            let y_centered = &y - y_mean;
            (x_centered, y_centered, x_mean, y_mean)
        } else {
            (x.to_owned(), y.to_owned(), Array1::zeros(n_features), 0.0)
        };

        // (X^T X + alpha I) w = X^T y
        let mut xtx = x_centered.t().dot(&x_centered);
        for i in 0..n_features {
            xtx[[i, i]] += self.alpha;
        }
        let xty = x_centered.t().dot(&y_centered);

        let coefficients = cholesky_solve(&xtx, &xty)
            .or_else(|| gauss_solve(&xtx, &xty))
            .ok_or_else(|| {
                PipelineError::upstream(
                    origin!("linear_regression.fit"),
                    format!("normal equations are singular ({} features, alpha {})", n_features, self.alpha),
                )
            })?;

        self.intercept = if self.fit_intercept {
            y_mean - coefficients.dot(&x_mean)
        } else {
            0.0
        };
        self.coefficients = Some(coefficients);

        tracing::debug!(rows = n_samples, features = n_features, alpha = self.alpha, "linear regression fitted");
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| PipelineError::not_fitted(origin!("linear_regression.predict"), "LinearRegression"))?;

        if x.ncols() != coefficients.len() {
            return Err(PipelineError::upstream(
                origin!("linear_regression.predict"),
                format!("expected {} features, got {}", coefficients.len(), x.ncols()),
            ));
        }

        Ok(x.dot(coefficients) + self.intercept)
    }

    fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    fn n_features(&self) -> Option<usize> {
        self.coefficients.as_ref().map(|c| c.len())
    }

    fn name(&self) -> &'static str {
        if self.alpha > 0.0 {
            "ridge"
        } else {
            "linear"
        }
    }
}

/// Closed set of regressors that can be persisted under the `model` key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegressionModel {
    Linear(LinearRegression),
}

impl RegressionModel {
    /// Ridge regression with penalty `alpha` (`0.0` is ordinary least squares)
    pub fn ridge(alpha: f64) -> Self {
        RegressionModel::Linear(LinearRegression::new().with_alpha(alpha))
    }
}

impl Regressor for RegressionModel {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        match self {
            RegressionModel::Linear(m) => m.fit(x, y),
        }
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        match self {
            RegressionModel::Linear(m) => m.predict(x),
        }
    }

    fn is_fitted(&self) -> bool {
        match self {
            RegressionModel::Linear(m) => m.is_fitted(),
        }
    }

    fn n_features(&self) -> Option<usize> {
        match self {
            RegressionModel::Linear(m) => m.n_features(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            RegressionModel::Linear(m) => m.name(),
        }
    }
}
