use thiserror::Error;

/// Precondition failures of the probing pass. None of these are recovered,
/// they abort the run before (or instead of) producing an influence map.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("canvas must be at least 1x1, got {height}x{width}")]
    EmptyCanvas { height: usize, width: usize },

    #[error("coordinate ({row}, {col}) lies outside the {height}x{width} canvas")]
    CoordOutOfBounds {
        row: usize,
        col: usize,
        height: usize,
        width: usize,
    },

    #[error("network produced an empty feature map: {channels} channels, {rows}x{cols}")]
    EmptyFeatureMap {
        channels: usize,
        rows: usize,
        cols: usize,
    },

    #[error("network returned {got} samples for a batch of {expected}")]
    BatchMismatch { expected: usize, got: usize },

    #[error("feature map shape changed from {expected:?} to {got:?} between forward passes")]
    ShapeChanged {
        expected: (usize, usize, usize),
        got: (usize, usize, usize),
    },

    #[error("influence map incomplete: {visited} of {expected} coordinates written")]
    IncompleteMap { visited: usize, expected: usize },

    #[error("batch loader worker disconnected before the pass finished")]
    LoaderDisconnected,
}
