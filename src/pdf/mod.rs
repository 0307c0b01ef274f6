//! PDF manipulation module

pub mod geometry;
pub mod overlay;
pub mod qr;
pub mod watermark;
mod writer;

// Re-export commonly used items
pub use geometry::{count_pages, page_size};
pub use overlay::overlay_pdf;
pub use qr::{create_qr_pdf, encode_matrix, QrMatrix, QrOptions};
pub use watermark::{create_watermark_pdf, WatermarkOptions};
