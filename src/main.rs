mod app;
mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use eframe::egui;

use app::VolPaintApp;
use volpaint::remote::http::HttpBackend;
use volpaint::settings::Settings;
use volpaint::{log_err, log_info, logger};

fn main() -> ExitCode {
    // Initialize session log (overwrites previous session log)
    logger::init();

    let args = cli::CliArgs::parse();
    let settings = args.apply(Settings::load());

    // -- Headless mode ---------------------------------------------------
    if args.headless_check {
        return cli::run_headless_check(&args, &settings);
    }

    // -- GUI mode --------------------------------------------------------
    let backend = match HttpBackend::new(&settings.backend_url, settings.request_timeout()) {
        Ok(b) => Arc::new(b),
        Err(e) => {
            log_err!("Cannot create HTTP client: {}", e);
            eprintln!("error: cannot create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    log_info!("Backend {}", settings.backend_url);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_title("VolPaint"),
        ..Default::default()
    };

    let start = args.start_coord();
    let result = eframe::run_native(
        "VolPaint",
        options,
        Box::new(move |cc| Box::new(VolPaintApp::new(cc, settings, backend, start))),
    );
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_err!("eframe exited with error: {}", e);
            ExitCode::FAILURE
        }
    }
}
