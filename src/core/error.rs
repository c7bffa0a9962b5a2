// Copyright @yucwang 2026

use thiserror::Error;

// Configuration mistakes are reported here, before any pixel is traced.
// Degenerate numerics inside an estimator are not errors; those paths are
// terminated locally and the sample simply contributes less.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("unknown sampler \"{0}\" (expected one of: path, pathdirect, pathmis, pathtest, lightsampling, naive, eyelight, furnace, falsecolor)")]
    UnknownSampler(String),
    #[error("unknown false color mode \"{0}\"")]
    UnknownFalsecolor(String),
    #[error("unknown scene preset \"{0}\" (expected cornellbox or furnace)")]
    UnknownPreset(String),
    #[error("failed to load texture {path}: {reason}")]
    Texture { path: String, reason: String },
}
