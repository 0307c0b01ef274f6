//! QR code overlay carrying the document digest

use lopdf::content::Operation;
use lopdf::Object;
use qrcode::{Color, EcLevel, QrCode};
use std::path::Path;
use tracing::{debug, instrument};

use super::writer::{concat_matrix, real, OverlayDocument};
use crate::error::{Error, Result};
use crate::layout::{top_right_anchor, PageSize, Transform, POINTS_PER_MM};

/// Unscaled edge length of the symbol, quiet zone included (32 mm)
pub const QR_NATURAL_SIZE: f64 = 32.0 * POINTS_PER_MM;

/// Light modules kept around the symbol on every side
pub const QUIET_ZONE_MODULES: usize = 4;

/// Options for rendering the QR overlay
#[derive(Debug, Clone)]
pub struct QrOptions {
    /// Text encoded in the symbol
    pub payload: String,
    /// Multiplier applied to the natural symbol size
    pub scale: f64,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            payload: String::new(),
            scale: 0.6,
        }
    }
}

/// Module grid of an encoded symbol, without the quiet zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    /// Modules per side
    pub width: usize,
    /// Row-major, top row first; `true` is a dark module
    pub dark: Vec<bool>,
}

impl QrMatrix {
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        self.dark[y * self.width + x]
    }

    /// Modules per side including the quiet zone
    pub fn total_width(&self) -> usize {
        self.width + 2 * QUIET_ZONE_MODULES
    }
}

/// Encode a payload with low error correction
pub fn encode_matrix(payload: &str) -> Result<QrMatrix> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L)
        .map_err(|e| Error::QrEncode(e.to_string()))?;

    Ok(QrMatrix {
        width: code.width(),
        dark: code.to_colors().into_iter().map(|c| c == Color::Dark).collect(),
    })
}

/// Rectangles for the dark modules in the symbol's natural coordinate space
///
/// Adjacent dark modules in a row are merged into one rectangle. Returns
/// `(x, y, width, height)` with the origin at the bottom-left of the quiet zone.
fn module_rects(matrix: &QrMatrix) -> Vec<(f64, f64, f64, f64)> {
    let module = QR_NATURAL_SIZE / matrix.total_width() as f64;
    let mut rects = Vec::new();

    for row in 0..matrix.width {
        let y = QR_NATURAL_SIZE - (QUIET_ZONE_MODULES + row + 1) as f64 * module;
        let mut col = 0;

        while col < matrix.width {
            if !matrix.is_dark(col, row) {
                col += 1;
                continue;
            }

            let start = col;
            while col < matrix.width && matrix.is_dark(col, row) {
                col += 1;
            }

            let x = (QUIET_ZONE_MODULES + start) as f64 * module;
            rects.push((x, y, (col - start) as f64 * module, module));
        }
    }

    rects
}

fn qr_operations(page: &PageSize, matrix: &QrMatrix, scale: f64) -> Vec<Operation> {
    let scaled = QR_NATURAL_SIZE * scale;
    let (x, y) = top_right_anchor(page, scaled, scaled);

    let mut ops = vec![
        Operation::new("q", vec![]),
        concat_matrix(&Transform::translate(x, y).then(&Transform::scale(scale))),
        Operation::new("g", vec![Object::Integer(0)]),
    ];

    for (rx, ry, rw, rh) in module_rects(matrix) {
        ops.push(Operation::new("re", vec![real(rx), real(ry), real(rw), real(rh)]));
    }

    ops.push(Operation::new("f", vec![]));
    ops.push(Operation::new("Q", vec![]));
    ops
}

/// Create a single-page PDF with a QR code in the top-right corner
///
/// The symbol is scaled by `options.scale` and anchored so its top-right
/// corner meets the page's; on pages smaller than the symbol it anchors to
/// the origin instead.
#[instrument(skip_all, fields(output = %output.display(), scale = options.scale))]
pub fn create_qr_pdf(output: &Path, page: PageSize, options: &QrOptions) -> Result<()> {
    if !(options.scale > 0.0 && options.scale.is_finite()) {
        return Err(Error::InvalidOption(format!(
            "QR scale must be a positive finite number (got {})",
            options.scale
        )));
    }

    let matrix = encode_matrix(&options.payload)?;
    debug!(modules = matrix.width, "Encoded QR payload");

    OverlayDocument::new().finish(output, page, qr_operations(&page, &matrix, options.scale))
}
