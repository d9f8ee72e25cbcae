use thiserror::Error;

/// Errors raised by the heatmap transform itself.
///
/// I/O and configuration problems travel as `anyhow::Error`; this type is
/// reserved for requests the data cannot satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeatmapError {
    #[error("\"{year}\" not in list: {available:?}")]
    YearNotInData { year: i32, available: Vec<i32> },
}
