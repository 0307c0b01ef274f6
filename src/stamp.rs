//! The stamping pipeline
//!
//! Reads the source geometry, hashes the pristine bytes, renders the two
//! overlays next to the output and merges them in turn. The overlay files are
//! held as scoped temporary paths, so they are removed on every exit path,
//! including early failures.

use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::hash::{hash_file, qr_payload, watermark_text};
use crate::layout::PageSize;
use crate::pdf::{
    count_pages, create_qr_pdf, create_watermark_pdf, overlay_pdf, page_size,
    QrOptions, WatermarkOptions,
};

/// Tunables for one stamping run
#[derive(Debug, Clone)]
pub struct StampOptions {
    /// Watermark fill opacity (0-1)
    pub opacity: f64,
    /// Watermark rotation in degrees
    pub angle_degrees: f64,
    /// Watermark font size in points
    pub font_size: f64,
    /// Horizontal distance between watermark tiles
    pub horizontal_spacing: f64,
    /// Vertical distance between watermark tiles
    pub vertical_spacing: f64,
    /// QR code scale relative to its natural 32 mm size
    pub qr_scale: f64,
}

impl Default for StampOptions {
    fn default() -> Self {
        Self {
            opacity: 0.3,
            angle_degrees: 45.0,
            font_size: 9.0,
            horizontal_spacing: 300.0,
            vertical_spacing: 150.0,
            qr_scale: 0.6,
        }
    }
}

impl StampOptions {
    pub fn watermark_options(&self, digest: &str) -> WatermarkOptions {
        WatermarkOptions {
            text: watermark_text(digest),
            opacity: self.opacity,
            angle_degrees: self.angle_degrees,
            font_size: self.font_size,
            horizontal_spacing: self.horizontal_spacing,
            vertical_spacing: self.vertical_spacing,
        }
    }

    pub fn qr_options(&self, digest: &str) -> QrOptions {
        QrOptions {
            payload: qr_payload(digest),
            scale: self.qr_scale,
        }
    }
}

/// Files written into the output directory during a run
#[derive(Debug, Clone, PartialEq)]
pub struct StampPaths {
    /// `{base}_watermark.pdf`, removed after merging
    pub watermark: PathBuf,
    /// `{base}_qr.pdf`, removed after merging
    pub qr: PathBuf,
    /// `{base}_with_qr_and_watermark{ext}`
    pub output: PathBuf,
}

impl StampPaths {
    /// Derive the run's paths from the input file name
    ///
    /// The final output keeps the input's extension (if any); the overlays
    /// are always `.pdf`.
    pub fn new(input: &Path, output_dir: &Path) -> Result<Self> {
        let base = input
            .file_stem()
            .ok_or_else(|| {
                Error::General(format!("Input path has no file name: {}", input.display()))
            })?
            .to_string_lossy();
        let ext = input
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        Ok(Self {
            watermark: output_dir.join(format!("{}_watermark.pdf", base)),
            qr: output_dir.join(format!("{}_qr.pdf", base)),
            output: output_dir.join(format!("{}_with_qr_and_watermark{}", base, ext)),
        })
    }
}

/// Outcome of a stamping run
#[derive(Debug, Clone)]
pub struct StampReport {
    /// Path of the combined document
    pub output: PathBuf,
    /// Lowercase hex SHA-256 of the original input
    pub digest: String,
    /// Size used for both overlays
    pub page_size: PageSize,
    /// Page count of the output, when it was written
    pub page_count: Option<usize>,
    /// Whether the output directory had to be created
    pub created_output_dir: bool,
    /// Whether the output file exists once the pipeline finished
    pub output_written: bool,
}

/// Check that `input` exists, then create `output_dir` if it is missing
///
/// Returns whether the directory was created. Nothing is written when the
/// input is missing.
pub fn prepare_output_dir(input: &Path, output_dir: &Path) -> Result<bool> {
    if !input.is_file() {
        return Err(Error::FileNotFound(input.to_path_buf()));
    }

    if output_dir.exists() {
        return Ok(false);
    }
    std::fs::create_dir_all(output_dir)?;
    info!("Created output directory: {}", output_dir.display());
    Ok(true)
}

/// Stamp `input` with the hash watermark and QR code, writing into `output_dir`
///
/// A missing input is reported before anything is written. The output
/// directory is created when missing. Any library failure aborts the run;
/// an output file that is absent afterwards is reported through
/// [`StampReport::output_written`] rather than as an error.
#[instrument(skip_all, fields(input = %input.display(), output_dir = %output_dir.display()))]
pub fn stamp_pdf(input: &Path, output_dir: &Path, options: &StampOptions) -> Result<StampReport> {
    let created_output_dir = prepare_output_dir(input, output_dir)?;
    let input = input.canonicalize()?;
    let output_dir = output_dir.canonicalize()?;

    let paths = StampPaths::new(&input, &output_dir)?;

    let page = page_size(&input)?;
    let digest = hash_file(&input)?;
    info!(%digest, width = page.width, height = page.height, "Hashed source document");

    // Dropped on any early return below, deleting whatever was written
    let watermark_overlay = TempPath::try_from_path(paths.watermark.clone())?;
    let qr_overlay = TempPath::try_from_path(paths.qr.clone())?;

    info!("Generating repeated text watermark PDF");
    create_watermark_pdf(&watermark_overlay, page, &options.watermark_options(&digest))?;

    info!("Generating QR code PDF");
    create_qr_pdf(&qr_overlay, page, &options.qr_options(&digest))?;

    info!("Adding watermark and QR to PDF");
    overlay_pdf(&input, &watermark_overlay, &paths.output)?;
    overlay_pdf(&paths.output, &qr_overlay, &paths.output)?;

    for overlay in [watermark_overlay, qr_overlay] {
        let path = overlay.to_path_buf();
        if let Err(e) = overlay.close() {
            warn!("Could not remove temporary overlay {}: {}", path.display(), e);
        }
    }

    let output_written = paths.output.exists();
    let page_count = if output_written {
        Some(count_pages(&paths.output)?)
    } else {
        None
    };

    Ok(StampReport {
        output: paths.output,
        digest,
        page_size: page,
        page_count,
        created_output_dir,
        output_written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Dictionary, Document, Object};
    use tempfile::TempDir;

    /// One empty page with no page box
    fn write_blank_pdf(path: &Path) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        let page_id = doc.add_object(Object::Dictionary(page));
        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
        pages.set("Count", Object::Integer(1));
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(Object::Dictionary(catalog));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc.save(path).unwrap();
    }

    #[test]
    fn test_stamp_paths_naming() {
        let paths = StampPaths::new(Path::new("/docs/sample.pdf"), Path::new("/out")).unwrap();

        assert_eq!(paths.watermark, Path::new("/out/sample_watermark.pdf"));
        assert_eq!(paths.qr, Path::new("/out/sample_qr.pdf"));
        assert_eq!(paths.output, Path::new("/out/sample_with_qr_and_watermark.pdf"));
    }

    #[test]
    fn test_stamp_paths_keep_extension_case_and_dots() {
        let paths = StampPaths::new(Path::new("report.v2.PDF"), Path::new("out")).unwrap();

        assert_eq!(paths.watermark, Path::new("out/report.v2_watermark.pdf"));
        assert_eq!(paths.output, Path::new("out/report.v2_with_qr_and_watermark.PDF"));
    }

    #[test]
    fn test_stamp_paths_without_extension() {
        let paths = StampPaths::new(Path::new("scan"), Path::new("out")).unwrap();
        assert_eq!(paths.output, Path::new("out/scan_with_qr_and_watermark"));
    }

    #[test]
    fn test_default_options_feed_renderers() {
        let options = StampOptions::default();

        let watermark = options.watermark_options("abc");
        assert_eq!(watermark.text, "Document hash: abc");
        assert_eq!(watermark.font_size, 9.0);
        assert_eq!(watermark.horizontal_spacing, 300.0);
        assert_eq!(watermark.vertical_spacing, 150.0);

        let qr = options.qr_options("abc");
        assert_eq!(qr.payload, "PDF Hash: abc\nDocument hash: abc");
        assert_eq!(qr.scale, 0.6);
    }

    #[test]
    fn test_missing_input_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let output_dir = dir.path().join("out");

        let options = StampOptions::default();
        let result = stamp_pdf(Path::new("nonexistent.pdf"), &output_dir, &options);

        assert!(matches!(result.unwrap_err(), Error::FileNotFound(_)));
        assert!(!output_dir.exists(), "Output directory must not be created");
    }

    #[test]
    fn test_prepare_output_dir() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("blank.pdf");
        write_blank_pdf(&input);
        let output_dir = dir.path().join("nested").join("out");

        assert!(prepare_output_dir(&input, &output_dir).unwrap());
        assert!(output_dir.is_dir());
        // Already there on the second call
        assert!(!prepare_output_dir(&input, &output_dir).unwrap());

        let missing = prepare_output_dir(&dir.path().join("missing.pdf"), &dir.path().join("x"));
        assert!(matches!(missing.unwrap_err(), Error::FileNotFound(_)));
        assert!(!dir.path().join("x").exists());
    }

    #[test]
    fn test_non_finite_options_rejected_before_merge() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("blank.pdf");
        write_blank_pdf(&input);

        let options = StampOptions {
            opacity: f64::NAN,
            angle_degrees: f64::INFINITY,
            ..Default::default()
        };
        let output_dir = dir.path().join("out");
        let result = stamp_pdf(&input, &output_dir, &options);

        assert!(matches!(result.unwrap_err(), Error::InvalidOption(_)));
        assert_eq!(std::fs::read_dir(&output_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_render_leaves_no_overlays() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("blank.pdf");
        write_blank_pdf(&input);

        // Watermark renders, then the QR step fails
        let options = StampOptions {
            qr_scale: 0.0,
            ..Default::default()
        };
        let output_dir = dir.path().join("out");
        let result = stamp_pdf(&input, &output_dir, &options);

        assert!(matches!(result.unwrap_err(), Error::InvalidOption(_)));
        assert!(output_dir.exists());
        assert_eq!(std::fs::read_dir(&output_dir).unwrap().count(), 0);
    }
}
