use thiserror::Error;
#[derive(Debug, Error)]
pub enum LpError {
    #[error("sample rate must be greater than zero")]
    InvalidSampleRate,
    #[error("column length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("missing required column `{0}`")]
    MissingColumn(String),
    #[error("malformed input at line {line}: {message}")]
    Format { line: usize, message: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("no sweep segments found in recording")]
    DegenerateSweep,
    #[error(transparent)]
    Fit(#[from] FitError),
    #[error("failed to render plot: {0}")]
    Plot(String),
    #[error("npz error: {0}")]
    Npz(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
/// Reasons a two-stage probe fit can be rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("current never crosses zero; floating potential undefined")]
    NoFloatingPotential,
    #[error("{region} region has {found} points, need at least {required}")]
    InsufficientPoints {
        region: &'static str,
        found: usize,
        required: usize,
    },
    #[error("fit did not converge after {iterations} iterations (last Te = {last_te:.4} eV)")]
    NotConverged { iterations: usize, last_te: f64 },
    #[error("non-physical fit: {0}")]
    NonPhysical(String),
    #[error("exponential fit R^2 = {r_squared:.4} below threshold {min:.4}")]
    PoorFit { r_squared: f64, min: f64 },
}
impl LpError {
    pub(crate) fn format(line: usize, message: impl Into<String>) -> Self {
        LpError::Format {
            line,
            message: message.into(),
        }
    }
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for LpError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        LpError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for LpError {
    fn from(value: image::ImageError) -> Self {
        LpError::Plot(value.to_string())
    }
}
impl From<ndarray_npy::WriteNpzError> for LpError {
    fn from(value: ndarray_npy::WriteNpzError) -> Self {
        LpError::Npz(value.to_string())
    }
}
impl From<ndarray_npy::ReadNpzError> for LpError {
    fn from(value: ndarray_npy::ReadNpzError) -> Self {
        LpError::Npz(value.to_string())
    }
}
pub type LpResult<T> = Result<T, LpError>;
