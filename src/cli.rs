// ============================================================================
// VolPaint CLI: startup options and the headless backend check
// ============================================================================
//
// Usage examples:
//   volpaint                                        (GUI against the saved backend URL)
//   volpaint --backend http://10.0.0.5:5000 --axis XZ --slice 40
//   volpaint --headless-check                       (query every endpoint, no window)
//
// The headless check runs synchronously on the current thread through the
// same `Backend` trait the canvas workers use.

use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use volpaint::remote::Backend;
use volpaint::remote::http::HttpBackend;
use volpaint::remote::wire::SliceKind;
use volpaint::settings::Settings;
use volpaint::volume::{Axis, SliceCoordinate};
use volpaint::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// VolPaint slice annotation canvas.
#[derive(Parser, Debug, Default)]
#[command(
    name = "volpaint",
    about = "Slice canvas for painting volume annotations against a segmentation backend"
)]
pub struct CliArgs {
    /// Backend base URL; overrides the saved setting for this session.
    #[arg(short, long, value_name = "URL")]
    pub backend: Option<String>,

    /// Initial slicing axis: XY, XZ or YZ.
    #[arg(short, long, value_parser = parse_axis, value_name = "AXIS")]
    pub axis: Option<Axis>,

    /// Initial slice index along the axis.
    #[arg(short, long, value_name = "INDEX")]
    pub slice: Option<u32>,

    /// Query the volume shape and fetch every layer of the initial slice,
    /// print a summary, and exit without opening a window.
    #[arg(long)]
    pub headless_check: bool,
}

fn parse_axis(s: &str) -> Result<Axis, String> {
    Axis::parse(s).ok_or_else(|| format!("unknown axis '{}' (expected XY, XZ or YZ)", s))
}

impl CliArgs {
    /// Settings for this session: the saved file with CLI overrides applied.
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(url) = &self.backend {
            settings.backend_url = url.trim_end_matches('/').to_string();
        }
        settings
    }

    pub fn start_coord(&self) -> SliceCoordinate {
        SliceCoordinate::new(self.axis.unwrap_or_default(), self.slice.unwrap_or(0))
    }
}

// ============================================================================
// Headless check
// ============================================================================

/// Query the backend and return an OS exit code.
/// `0` = every request succeeded, `1` = at least one failed.
pub fn run_headless_check(args: &CliArgs, settings: &Settings) -> ExitCode {
    let backend = match HttpBackend::new(&settings.backend_url, settings.request_timeout()) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: cannot build HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    println!("Backend: {}", backend.base_url());

    let mut failures = 0usize;
    match backend.image_info() {
        Ok(shape) => println!("Volume shape: {} x {} x {}", shape.x, shape.y, shape.z),
        Err(e) => {
            eprintln!("  image info FAILED: {}", e);
            failures += 1;
        }
    }

    let coord = args.start_coord();
    for kind in SliceKind::all() {
        let start = Instant::now();
        match backend.fetch_slice(*kind, coord, settings.label_contour) {
            Ok(raw) => println!(
                "  {:<11} {}x{} {} ({:.1} ms)",
                kind.path(),
                raw.width,
                raw.height,
                raw.data.dtype_name(),
                start.elapsed().as_secs_f64() * 1000.0
            ),
            Err(e) => {
                eprintln!("  {:<11} FAILED: {}", kind.path(), e);
                log_err!("Headless check: {} failed: {}", kind.path(), e);
                failures += 1;
            }
        }
    }

    log_info!("Headless check finished with {} failure(s)", failures);
    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
