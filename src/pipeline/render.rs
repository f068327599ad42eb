//! Rendering engine driver: assembled HTML file → PDF on disk.
//!
//! ```text
//! Launching ─▶ Loaded ─▶ Stabilizing ─▶ Exporting ─▶ Closed
//!     │           │           │             │
//!     └───────────┴───────────┴─────────────┴──▶ Failed
//! ```
//!
//! ## Why spawn_blocking?
//!
//! `headless_chrome` blocks the calling thread on every CDP round-trip, and
//! the settle delay is a plain sleep. [`render_document`] is therefore a
//! synchronous function that the orchestrator moves onto Tokio's blocking
//! pool, keeping async worker threads free.
//!
//! ## Why an engine guard?
//!
//! A leaked Chrome process outlives the conversion and keeps its temp
//! profile alive. [`EngineGuard`] owns the instance and closes it exactly
//! once: explicitly after a successful export, from `Drop` on every early
//! return or panic.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use url::Url;

use super::assemble::{DIAGRAM_ERROR_SELECTOR, WATERMARK_SELECTOR};
use super::runnings;
use crate::engine::{
    Engine, EngineError, EngineInstance, LaunchSettings, LaunchStrategy, PdfExportOptions,
};
use crate::error::{ConversionError, Md2PdfError, Phase};
use crate::progress::ConversionProgressCallback;
use crate::request::PaperSpec;

const SLEEP_SLICE: Duration = Duration::from_millis(50);

// ── Cancellation ─────────────────────────────────────────────────────────

/// Cooperative cancellation shared between a caller and a running conversion.
///
/// Checked between driver states and while sleeping through the settle
/// delay. An export already handed to the engine is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on cancellation.
    /// Returns `false` if cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}

// ── Job / report ─────────────────────────────────────────────────────────

/// Everything the driver needs for one render.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub html_path: PathBuf,
    pub output_path: PathBuf,
    pub paper: PaperSpec,
    /// Injected after load, in order.
    pub stylesheets: Vec<String>,
    /// The page carries a watermark overlay worth reading back.
    pub expect_watermark: bool,
    /// The page runs the diagram runtime and has an error surface.
    pub has_diagrams: bool,
    pub render_delay: Duration,
    pub load_timeout: Duration,
    pub launch_plan: Vec<LaunchStrategy>,
    pub settings: LaunchSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    /// Which launch strategy produced the engine.
    pub strategy: &'static str,
    /// Watermark text read back from the page, if any.
    pub watermark: Option<String>,
    pub pdf_bytes: u64,
    pub stage_ms: Vec<(Phase, u64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Launching,
    Loaded,
    Stabilizing,
    Exporting,
    Closed,
    Failed,
}

// ── Engine guard ─────────────────────────────────────────────────────────

pub struct EngineGuard {
    instance: Box<dyn EngineInstance>,
    closed: bool,
}

impl EngineGuard {
    pub fn new(instance: Box<dyn EngineInstance>) -> Self {
        Self {
            instance,
            closed: false,
        }
    }

    pub fn instance(&mut self) -> &mut dyn EngineInstance {
        self.instance.as_mut()
    }

    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if !self.closed {
            self.closed = true;
            self.instance.close();
            debug!("Engine instance closed");
        }
    }
}

impl Drop for EngineGuard {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Driver ───────────────────────────────────────────────────────────────

/// Run one render to completion. Blocking; call from `spawn_blocking`.
pub fn render_document(
    engine: &dyn Engine,
    job: &RenderJob,
    cancel: &CancelFlag,
    progress: &dyn ConversionProgressCallback,
) -> Result<RenderReport, ConversionError> {
    let mut driver = Driver {
        job,
        cancel,
        progress,
        state: DriverState::Launching,
        stage_ms: Vec::new(),
    };
    debug!(state = ?driver.state, "Driver started");
    match driver.run(engine) {
        Ok(report) => Ok(report),
        Err(err) => {
            driver.enter(DriverState::Failed);
            Err(err)
        }
    }
}

struct Driver<'a> {
    job: &'a RenderJob,
    cancel: &'a CancelFlag,
    progress: &'a dyn ConversionProgressCallback,
    state: DriverState,
    stage_ms: Vec<(Phase, u64)>,
}

impl Driver<'_> {
    fn enter(&mut self, next: DriverState) {
        debug!(from = ?self.state, to = ?next, "Driver state change");
        self.state = next;
    }

    fn start_stage(&self, phase: Phase) -> Result<Instant, ConversionError> {
        self.check_cancel(phase)?;
        self.progress.on_stage_start(phase);
        Ok(Instant::now())
    }

    fn finish_stage(&mut self, phase: Phase, started: Instant) {
        let ms = started.elapsed().as_millis() as u64;
        self.stage_ms.push((phase, ms));
        self.progress.on_stage_complete(phase, ms);
    }

    fn check_cancel(&self, phase: Phase) -> Result<(), ConversionError> {
        if self.cancel.is_cancelled() {
            Err(fail(
                phase,
                Md2PdfError::Cancelled {
                    phase: phase.as_str(),
                },
            ))
        } else {
            Ok(())
        }
    }

    fn run(&mut self, engine: &dyn Engine) -> Result<RenderReport, ConversionError> {
        let job = self.job;

        // ── Launching ────────────────────────────────────────────────────
        let started = self.start_stage(Phase::Launch)?;
        let (mut guard, strategy) = self.launch(engine)?;
        self.finish_stage(Phase::Launch, started);

        // ── Loaded ───────────────────────────────────────────────────────
        let started = self.start_stage(Phase::Load)?;
        let url = file_url(&job.html_path).map_err(|e| fail(Phase::Load, e))?;
        guard
            .instance()
            .load(url.as_str(), job.load_timeout)
            .map_err(|e| load_error("navigation", e))?;
        for css in &job.stylesheets {
            guard
                .instance()
                .inject_stylesheet(css)
                .map_err(|e| load_error("style injection", e))?;
        }
        self.enter(DriverState::Loaded);
        self.finish_stage(Phase::Load, started);

        // ── Stabilizing ──────────────────────────────────────────────────
        let started = self.start_stage(Phase::Stabilize)?;
        self.enter(DriverState::Stabilizing);
        if !self.cancel.sleep(job.render_delay) {
            return Err(fail(
                Phase::Stabilize,
                Md2PdfError::Cancelled {
                    phase: Phase::Stabilize.as_str(),
                },
            ));
        }
        let page = guard.instance();
        page.repaint().map_err(|e| stabilize_error("repaint", e))?;

        let diagram_error = if job.has_diagrams {
            page.query_text(DIAGRAM_ERROR_SELECTOR)
                .map_err(|e| stabilize_error("diagram check", e))?
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        } else {
            None
        };
        if let Some(message) = diagram_error {
            warn!("Diagram rendering failed in page: {message}");
            return Err(fail(
                Phase::Stabilize,
                Md2PdfError::DiagramRendering { message },
            ));
        }

        let watermark = if job.expect_watermark {
            page.query_text(WATERMARK_SELECTOR)
                .map_err(|e| stabilize_error("watermark lookup", e))?
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        } else {
            None
        };
        self.finish_stage(Phase::Stabilize, started);

        // ── Exporting ────────────────────────────────────────────────────
        let started = self.start_stage(Phase::Export)?;
        self.enter(DriverState::Exporting);
        let mut options = PdfExportOptions::for_paper(&job.paper);
        if let Some(text) = &watermark {
            options = options.with_running_templates(runnings::header(text), runnings::footer(text));
        }
        let bytes = guard.instance().print_pdf(&options).map_err(|e| {
            fail(
                Phase::Export,
                Md2PdfError::Export {
                    detail: e.to_string(),
                },
            )
        })?;
        if bytes.is_empty() {
            return Err(fail(
                Phase::Export,
                Md2PdfError::Export {
                    detail: "engine returned an empty PDF".into(),
                },
            ));
        }
        write_new(&job.output_path, &bytes).map_err(|e| fail(Phase::Export, e))?;
        self.finish_stage(Phase::Export, started);

        // ── Closed ───────────────────────────────────────────────────────
        guard.close();
        self.enter(DriverState::Closed);
        info!(
            path = %job.output_path.display(),
            bytes = bytes.len(),
            "PDF exported"
        );

        Ok(RenderReport {
            strategy,
            watermark,
            pdf_bytes: bytes.len() as u64,
            stage_ms: std::mem::take(&mut self.stage_ms),
        })
    }

    /// Try each strategy in order; the first instance wins.
    fn launch(&self, engine: &dyn Engine) -> Result<(EngineGuard, &'static str), ConversionError> {
        let mut attempts = Vec::with_capacity(self.job.launch_plan.len());
        for strategy in &self.job.launch_plan {
            self.check_cancel(Phase::Launch)?;
            match engine.launch(strategy, &self.job.settings) {
                Ok(instance) => {
                    info!(strategy = strategy.label(), "Rendering engine launched");
                    return Ok((EngineGuard::new(instance), strategy.label()));
                }
                Err(e) => {
                    warn!(strategy = strategy.label(), "Engine launch failed: {e}");
                    attempts.push(format!("{}: {e}", strategy.label()));
                }
            }
        }
        Err(fail(
            Phase::Launch,
            Md2PdfError::EngineLaunch {
                os: std::env::consts::OS,
                arch: std::env::consts::ARCH,
                attempts,
            },
        ))
    }
}

fn fail(phase: Phase, kind: Md2PdfError) -> ConversionError {
    ConversionError::new(phase, kind)
}

fn load_error(step: &'static str, e: EngineError) -> ConversionError {
    let kind = match e {
        EngineError::Timeout { elapsed_ms } => Md2PdfError::LoadTimeout {
            phase: step,
            elapsed_ms,
        },
        EngineError::Failed(detail) => Md2PdfError::Load {
            phase: step,
            detail,
        },
    };
    fail(Phase::Load, kind)
}

fn stabilize_error(step: &'static str, e: EngineError) -> ConversionError {
    fail(
        Phase::Stabilize,
        Md2PdfError::Load {
            phase: step,
            detail: e.to_string(),
        },
    )
}

/// Write `bytes` to a path that must not exist yet.
fn write_new(path: &Path, bytes: &[u8]) -> Result<(), Md2PdfError> {
    let to_fs = |source: std::io::Error| Md2PdfError::Filesystem {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(to_fs)?;
    file.write_all(bytes).map_err(to_fs)?;
    file.sync_all().map_err(to_fs)
}

/// `file://` URL for a local absolute path.
pub fn file_url(path: &Path) -> Result<Url, Md2PdfError> {
    Url::from_file_path(path).map_err(|()| Md2PdfError::Load {
        phase: "navigation",
        detail: format!("not an absolute file path: {}", path.display()),
    })
}
