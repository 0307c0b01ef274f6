//! PDF Hashmark CLI tool
//!
//! Stamps a PDF with a tiled hash watermark and a verification QR code.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdf_hashmark::hash::verify_file;
use pdf_hashmark::stamp::{prepare_output_dir, stamp_pdf, StampOptions};
use pdf_hashmark::Error;

/// PDF Hashmark - Stamp a PDF with its own SHA-256 digest
#[derive(Parser)]
#[command(name = "pdf-hashmark")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Writes out/sample_with_qr_and_watermark.pdf
    pdf-hashmark sample.pdf out

    # Denser, fainter watermark and a larger QR code
    pdf-hashmark sample.pdf out --opacity 0.15 --horizontal-spacing 200 --qr-scale 1.0

    # Check an unstamped original against the digest read from its QR code
    pdf-hashmark sample.pdf --verify <SHA256_HEX>")]
struct Cli {
    /// Input PDF file
    input: PathBuf,

    /// Directory for the stamped PDF (created if missing)
    #[arg(required_unless_present = "verify")]
    output_dir: Option<PathBuf>,

    /// Check INPUT against a SHA-256 hex digest instead of stamping it
    #[arg(long, value_name = "HEX", conflicts_with = "output_dir")]
    verify: Option<String>,

    /// Watermark opacity between 0 and 1
    #[arg(long, default_value_t = StampOptions::default().opacity)]
    opacity: f64,

    /// Watermark rotation in degrees
    #[arg(long, default_value_t = StampOptions::default().angle_degrees)]
    angle: f64,

    /// Watermark font size in points
    #[arg(long, default_value_t = StampOptions::default().font_size)]
    font_size: f64,

    /// Horizontal distance between watermark tiles, in points
    #[arg(long, default_value_t = StampOptions::default().horizontal_spacing)]
    horizontal_spacing: f64,

    /// Vertical distance between watermark tiles, in points
    #[arg(long, default_value_t = StampOptions::default().vertical_spacing)]
    vertical_spacing: f64,

    /// QR code scale relative to its natural 32 mm size
    #[arg(long, default_value_t = StampOptions::default().qr_scale)]
    qr_scale: f64,
}

impl Cli {
    fn stamp_options(&self) -> StampOptions {
        StampOptions {
            opacity: self.opacity,
            angle_degrees: self.angle,
            font_size: self.font_size,
            horizontal_spacing: self.horizontal_spacing,
            vertical_spacing: self.vertical_spacing,
            qr_scale: self.qr_scale,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_hashmark=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    if let Some(expected) = &cli.verify {
        return verify(&cli.input, expected);
    }
    let Some(output_dir) = &cli.output_dir else {
        anyhow::bail!("an output directory is required");
    };

    match prepare_output_dir(&cli.input, output_dir) {
        Ok(true) => println!("[~] Created output directory: {}", output_dir.display()),
        Ok(false) => {}
        Err(Error::FileNotFound(path)) => {
            println!("[✘] File not found: {}", path.display());
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    }

    let report = stamp_pdf(&cli.input, output_dir, &cli.stamp_options())?;

    if !report.output_written {
        println!("[✘] Failed to create output PDF.");
        return Ok(ExitCode::FAILURE);
    }

    println!("[✔] Output saved at: {}", report.output.display());
    println!("    SHA-256: {}", report.digest);
    if let Some(pages) = report.page_count {
        println!("    Pages:   {}", pages);
    }

    Ok(ExitCode::SUCCESS)
}

fn verify(input: &Path, expected: &str) -> anyhow::Result<ExitCode> {
    match verify_file(input, expected) {
        Ok(()) => {
            println!("[✔] Digest matches: {}", input.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(Error::DigestMismatch { expected, actual }) => {
            println!("[✘] Digest mismatch: expected {}, got {}", expected, actual);
            Ok(ExitCode::FAILURE)
        }
        Err(Error::FileNotFound(path)) => {
            println!("[✘] File not found: {}", path.display());
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
