// MIC/DTA rendering: glyph metrics, text fitting and the PDF painter.
// PDF assembly is CPU-bound and runs inside tokio::task::spawn_blocking.

pub mod fit;
pub mod font_metrics;
pub mod pdf;

use thiserror::Error;

pub use pdf::render_manifest;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PDF assembly failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("PDF write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("render task failed: {0}")]
    Task(String),
}
