//! PDF Hashmark Library
//!
//! Stamps a PDF with tamper-evidence marks derived from its own bytes.
//! This library provides functionality to:
//! - Read page geometry from an existing PDF
//! - Compute the SHA-256 digest of the original file
//! - Render a tiled, rotated, semi-transparent hash watermark overlay
//! - Render a QR code overlay carrying the digest
//! - Composite single-page overlays onto every page of a document
//!
//! # Example
//!
//! ```no_run
//! use pdf_hashmark::stamp::{stamp_pdf, StampOptions};
//! use std::path::Path;
//!
//! let report = stamp_pdf(
//!     Path::new("sample.pdf"),
//!     Path::new("out"),
//!     &StampOptions::default(),
//! ).expect("Failed to stamp PDF");
//!
//! println!("{} -> {}", report.digest, report.output.display());
//! ```

pub mod error;
pub mod hash;
pub mod layout;
pub mod pdf;
pub mod stamp;

// Re-export commonly used items
pub use error::{Error, Result};
pub use layout::PageSize;
pub use stamp::{stamp_pdf, StampOptions, StampReport};
