//! Tiled text watermark overlay

use lopdf::content::Operation;
use lopdf::{Object, StringFormat};
use std::path::Path;
use tracing::{debug, instrument};

use super::writer::{
    concat_matrix, opacity_state, real, standard_font, win_ansi_bytes, OverlayDocument,
};
use crate::error::{Error, Result};
use crate::layout::{tile_origins, PageSize, Transform};

/// Font used for the watermark text
pub const WATERMARK_FONT: &str = "Helvetica-Bold";

/// Options for rendering a repeated text watermark
#[derive(Debug, Clone)]
pub struct WatermarkOptions {
    /// Text drawn at every tile
    pub text: String,
    /// Fill opacity between 0 (invisible) and 1 (opaque)
    pub opacity: f64,
    /// Counter-clockwise rotation of each tile, in degrees
    pub angle_degrees: f64,
    /// Font size in points
    pub font_size: f64,
    /// Distance between tile origins along x, in points
    pub horizontal_spacing: f64,
    /// Distance between tile origins along y, in points
    pub vertical_spacing: f64,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            text: "text to add".to_string(),
            opacity: 0.3,
            angle_degrees: 45.0,
            font_size: 20.0,
            horizontal_spacing: 80.0,
            vertical_spacing: 80.0,
        }
    }
}

impl WatermarkOptions {
    fn validate(&self) -> Result<()> {
        let numeric = [
            ("opacity", self.opacity),
            ("angle", self.angle_degrees),
            ("font size", self.font_size),
            ("horizontal spacing", self.horizontal_spacing),
            ("vertical spacing", self.vertical_spacing),
        ];
        if let Some((name, value)) = numeric.iter().find(|(_, value)| !value.is_finite()) {
            return Err(Error::InvalidOption(format!(
                "watermark {} must be a finite number (got {})",
                name, value
            )));
        }
        if !(self.horizontal_spacing > 0.0 && self.vertical_spacing > 0.0) {
            return Err(Error::InvalidOption(format!(
                "watermark spacing must be positive (got {} × {})",
                self.horizontal_spacing, self.vertical_spacing
            )));
        }
        if !(self.font_size > 0.0) {
            return Err(Error::InvalidOption(format!(
                "watermark font size must be positive (got {})",
                self.font_size
            )));
        }
        Ok(())
    }
}

/// Content stream operators for the tiled watermark
///
/// Tiles are laid on a plain grid from the origin; there is no measuring of
/// the text, so tiles near the top and right edges may be clipped.
fn watermark_operations(page: &PageSize, options: &WatermarkOptions) -> Vec<Operation> {
    let rotation = Transform::rotate_degrees(options.angle_degrees);
    let text = Object::String(win_ansi_bytes(&options.text), StringFormat::Literal);

    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(b"GS1".to_vec())]),
        Operation::new("g", vec![Object::Integer(0)]),
    ];

    for (x, y) in tile_origins(page, options.horizontal_spacing, options.vertical_spacing) {
        ops.push(Operation::new("q", vec![]));
        ops.push(concat_matrix(&Transform::translate(x, y).then(&rotation)));
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(b"F1".to_vec()), real(options.font_size)],
        ));
        ops.push(Operation::new("Td", vec![Object::Integer(0), Object::Integer(0)]));
        ops.push(Operation::new("Tj", vec![text.clone()]));
        ops.push(Operation::new("ET", vec![]));
        ops.push(Operation::new("Q", vec![]));
    }

    ops.push(Operation::new("Q", vec![]));
    ops
}

/// Create a single-page PDF carrying the repeated text watermark
///
/// The page has exactly the given size so it lines up with the document it
/// will be overlaid on.
///
/// # Example
///
/// ```no_run
/// use pdf_hashmark::pdf::{create_watermark_pdf, WatermarkOptions};
/// use pdf_hashmark::PageSize;
/// use std::path::Path;
///
/// let options = WatermarkOptions {
///     text: "Document hash: 0123abcd".to_string(),
///     font_size: 9.0,
///     ..Default::default()
/// };
///
/// create_watermark_pdf(Path::new("watermark.pdf"), PageSize::a4(), &options)
///     .expect("Failed to create watermark");
/// ```
#[instrument(skip_all, fields(output = %output.display()))]
pub fn create_watermark_pdf(
    output: &Path,
    page: PageSize,
    options: &WatermarkOptions,
) -> Result<()> {
    options.validate()?;

    let mut overlay = OverlayDocument::new();
    overlay.add_resource("Font", "F1", standard_font(WATERMARK_FONT));
    overlay.add_resource("ExtGState", "GS1", opacity_state(options.opacity.clamp(0.0, 1.0)));

    let ops = watermark_operations(&page, options);
    debug!(operations = ops.len(), "Rendering watermark tiles");

    overlay.finish(output, page, ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Content;
    use lopdf::Document;

    fn count_ops(ops: &[Operation], operator: &str) -> usize {
        ops.iter().filter(|op| op.operator == operator).count()
    }

    #[test]
    fn test_tile_count_matches_grid() {
        let options = WatermarkOptions {
            horizontal_spacing: 300.0,
            vertical_spacing: 150.0,
            ..Default::default()
        };
        let ops = watermark_operations(&PageSize::a4(), &options);

        assert_eq!(count_ops(&ops, "Tj"), 12);
        assert_eq!(count_ops(&ops, "cm"), 12);
        // Balanced graphics state
        assert_eq!(count_ops(&ops, "q"), count_ops(&ops, "Q"));
    }

    #[test]
    fn test_first_tile_is_rotated_at_origin() {
        let page = PageSize::new(100.0, 100.0);
        let ops = watermark_operations(&page, &WatermarkOptions::default());
        let cm = ops.iter().find(|op| op.operator == "cm").unwrap();

        let values: Vec<f32> = cm.operands.iter().map(|o| o.as_float().unwrap()).collect();
        let h = std::f32::consts::FRAC_1_SQRT_2;
        assert!((values[0] - h).abs() < 1e-5);
        assert!((values[2] + h).abs() < 1e-5);
        assert_eq!(values[4], 0.0);
        assert_eq!(values[5], 0.0);
    }

    #[test]
    fn test_rejects_zero_spacing() {
        let dir = tempfile::TempDir::new().unwrap();
        let options = WatermarkOptions {
            horizontal_spacing: 0.0,
            ..Default::default()
        };

        let result = create_watermark_pdf(&dir.path().join("wm.pdf"), PageSize::a4(), &options);
        assert!(matches!(result.unwrap_err(), Error::InvalidOption(_)));
        assert!(!dir.path().join("wm.pdf").exists());
    }

    #[test]
    fn test_rejects_non_finite_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("wm.pdf");
        let cases = [
            WatermarkOptions {
                opacity: f64::NAN,
                ..Default::default()
            },
            WatermarkOptions {
                angle_degrees: f64::INFINITY,
                ..Default::default()
            },
            WatermarkOptions {
                font_size: f64::INFINITY,
                ..Default::default()
            },
            WatermarkOptions {
                vertical_spacing: f64::INFINITY,
                ..Default::default()
            },
        ];

        for options in &cases {
            let result = create_watermark_pdf(&path, PageSize::a4(), options);
            assert!(
                matches!(result, Err(Error::InvalidOption(_))),
                "{:?} should be rejected",
                options
            );
            assert!(!path.exists());
        }
    }

    #[test]
    fn test_watermark_pdf_content() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("wm.pdf");
        let options = WatermarkOptions {
            text: "Document hash: abc".to_string(),
            opacity: 1.7,
            ..Default::default()
        };

        create_watermark_pdf(&path, PageSize::new(160.0, 80.0), &options).unwrap();

        let mut doc = Document::load(&path).unwrap();
        doc.decompress();
        let page_id = doc.get_pages()[&1];

        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        let texts: Vec<&Object> = content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .map(|op| &op.operands[0])
            .collect();

        // 2 columns × 1 row
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].as_str().unwrap(), b"Document hash: abc");

        // Opacity is clamped into range
        let page = doc.get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let gs_id = resources
            .get(b"ExtGState")
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"GS1")
            .unwrap()
            .as_reference()
            .unwrap();
        let gs = doc.get_dictionary(gs_id).unwrap();
        assert_eq!(gs.get(b"ca").unwrap().as_float().unwrap(), 1.0);
    }
}
