//! Conversion entry points.
//!
//! ## Stage order
//!
//! Transform → Assemble → temp file → ResolveOutput → engine driver →
//! Verify. Each failure short-circuits the rest and comes back as one
//! [`ConversionError`] carrying the phase, the attempted output path and
//! the paper options.
//!
//! The assembled page is written to a scoped temp file that is deleted when
//! this function returns, whatever the outcome. The engine instance is
//! owned by the driver and closed on every path.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::ConversionConfig;
use crate::engine::{launch_plan, ChromeEngine, Engine, LaunchSettings};
use crate::error::{ConversionError, Md2PdfError, Phase};
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::assemble::{self, AssembledDocument};
use crate::pipeline::render::{self, CancelFlag, RenderJob};
use crate::pipeline::{highlight, markup, output_path};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::request::ConversionRequest;

/// Built-in stylesheet injected into every page after load.
pub const SHARED_STYLESHEET: &str = include_str!("../assets/pdf.css");

/// Extra idle allowance on top of load timeout and settle delay before the
/// engine abandons the session.
const IDLE_GRACE: Duration = Duration::from_secs(60);

/// Upper bound on a single script evaluation or PDF export.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Convert a Markdown request to a PDF on disk.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns a [`ConversionError`] naming the failed [`Phase`]. No partial
/// success is ever reported: if this returns `Ok`, the file exists.
pub async fn convert(
    request: &ConversionRequest,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConversionError> {
    convert_with_cancel(request, config, &CancelFlag::new()).await
}

/// Like [`convert`], stopping early once `cancel` is raised.
///
/// Cancellation is observed between stages and during the settle delay;
/// an export already in progress runs to completion.
pub async fn convert_with_cancel(
    request: &ConversionRequest,
    config: &ConversionConfig,
    cancel: &CancelFlag,
) -> Result<ConversionOutput, ConversionError> {
    let progress: ProgressCallback = config
        .progress_callback
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgressCallback));

    progress.on_conversion_start();
    let result = run(request, config, cancel, &progress).await;
    match &result {
        Ok(output) => progress.on_conversion_complete(&output.path),
        Err(err) => progress.on_conversion_error(err.phase, &err.kind.to_string()),
    }
    result
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary Tokio runtime internally. Do not call from inside an
/// existing Tokio runtime; use [`convert`] there instead.
pub fn convert_sync(
    request: &ConversionRequest,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConversionError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| {
            ConversionError::new(
                Phase::Validation,
                Md2PdfError::Internal(format!("Failed to create tokio runtime: {e}")),
            )
            .with_context(None, request.paper())
        })?
        .block_on(convert(request, config))
}

/// The page shell a conversion would render, without launching an engine.
pub fn preview_html(
    request: &ConversionRequest,
    config: &ConversionConfig,
) -> Result<String, ConversionError> {
    let fragment = markup::render(request.markdown())
        .map_err(|e| ConversionError::new(Phase::Transform, e).with_context(None, request.paper()))?;
    Ok(assemble::assemble(
        &fragment,
        request.paper(),
        request.watermark(),
        &config.diagram_script_url,
    ))
}

async fn run(
    request: &ConversionRequest,
    config: &ConversionConfig,
    cancel: &CancelFlag,
    progress: &ProgressCallback,
) -> Result<ConversionOutput, ConversionError> {
    let total_start = Instant::now();
    let paper = request.paper();
    let fail = |phase: Phase, kind: Md2PdfError, path: Option<&Path>| {
        ConversionError::new(phase, kind).with_context(path.map(Path::to_path_buf), paper)
    };
    let check_cancel = |phase: Phase, path: Option<&Path>| {
        if cancel.is_cancelled() {
            Err(fail(
                phase,
                Md2PdfError::Cancelled {
                    phase: phase.as_str(),
                },
                path,
            ))
        } else {
            Ok(())
        }
    };

    info!(
        "Starting PDF conversion (format: {}, orientation: {})",
        paper.format.as_str(),
        paper.orientation.as_str()
    );

    // ── Step 1: Transform ────────────────────────────────────────────────
    progress.on_stage_start(Phase::Transform);
    let transform_start = Instant::now();
    let fragment =
        markup::render(request.markdown()).map_err(|e| fail(Phase::Transform, e, None))?;
    let transform_duration_ms = transform_start.elapsed().as_millis() as u64;
    progress.on_stage_complete(Phase::Transform, transform_duration_ms);
    let mut stage_durations_ms = vec![(Phase::Transform, transform_duration_ms)];

    // ── Step 2: Assemble ─────────────────────────────────────────────────
    check_cancel(Phase::Assemble, None)?;
    progress.on_stage_start(Phase::Assemble);
    let stage_start = Instant::now();
    let html = assemble::assemble(
        &fragment,
        paper,
        request.watermark(),
        &config.diagram_script_url,
    );
    let stylesheets = stylesheets(config)
        .await
        .map_err(|e| fail(Phase::Assemble, e, None))?;
    let elapsed = stage_start.elapsed().as_millis() as u64;
    stage_durations_ms.push((Phase::Assemble, elapsed));
    progress.on_stage_complete(Phase::Assemble, elapsed);

    // ── Step 3: Scoped temp file ─────────────────────────────────────────
    progress.on_stage_start(Phase::TempFile);
    let stage_start = Instant::now();
    let document = AssembledDocument::write(&html).map_err(|e| fail(Phase::TempFile, e, None))?;
    debug!(path = %document.path().display(), bytes = document.len(), "Page shell written");
    let elapsed = stage_start.elapsed().as_millis() as u64;
    stage_durations_ms.push((Phase::TempFile, elapsed));
    progress.on_stage_complete(Phase::TempFile, elapsed);

    // ── Step 4: Resolve output ───────────────────────────────────────────
    progress.on_stage_start(Phase::ResolveOutput);
    let stage_start = Instant::now();
    let target = output_path::resolve(
        request.output(),
        config.output_dir_override.as_deref(),
        config.home_dir.as_deref(),
    )
    .map_err(|e| fail(Phase::ResolveOutput, e, None))?;
    let out_path = target.resolved_path.clone();
    info!("Using output path: {}", out_path.display());
    let elapsed = stage_start.elapsed().as_millis() as u64;
    stage_durations_ms.push((Phase::ResolveOutput, elapsed));
    progress.on_stage_complete(Phase::ResolveOutput, elapsed);

    // ── Step 5: Drive the engine ─────────────────────────────────────────
    check_cancel(Phase::Launch, Some(&out_path))?;
    let engine: Arc<dyn Engine> = config
        .engine
        .clone()
        .unwrap_or_else(|| Arc::new(ChromeEngine));
    let pinned = config
        .chrome_path
        .clone()
        .or_else(chrome_locate::cached_chrome_path);
    let job = RenderJob {
        html_path: document.path().to_path_buf(),
        output_path: out_path.clone(),
        paper: paper.clone(),
        stylesheets,
        expect_watermark: request.watermark().is_some(),
        has_diagrams: fragment.has_diagrams(),
        render_delay: config.render_delay,
        load_timeout: config.load_timeout,
        launch_plan: launch_plan(pinned),
        settings: LaunchSettings {
            viewport: config.viewport,
            idle_timeout: config.load_timeout + config.render_delay + IDLE_GRACE,
            command_timeout: COMMAND_TIMEOUT,
        },
    };

    let render_start = Instant::now();
    let task_cancel = cancel.clone();
    let task_progress = progress.clone();
    let report = tokio::task::spawn_blocking(move || {
        render::render_document(engine.as_ref(), &job, &task_cancel, task_progress.as_ref())
    })
    .await
    .map_err(|e| {
        fail(
            Phase::Export,
            Md2PdfError::Internal(format!("Render task panicked: {e}")),
            Some(&out_path),
        )
    })?
    .map_err(|e| e.with_context(Some(out_path.clone()), paper))?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    stage_durations_ms.extend(report.stage_ms.iter().copied());

    // ── Step 6: Verify ───────────────────────────────────────────────────
    progress.on_stage_start(Phase::Verify);
    let stage_start = Instant::now();
    let exists = tokio::fs::metadata(&out_path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !exists {
        return Err(fail(
            Phase::Verify,
            Md2PdfError::OutputMissing {
                path: out_path.clone(),
            },
            Some(&out_path),
        ));
    }
    let elapsed = stage_start.elapsed().as_millis() as u64;
    stage_durations_ms.push((Phase::Verify, elapsed));
    progress.on_stage_complete(Phase::Verify, elapsed);
    drop(document);

    let stats = ConversionStats {
        markdown_bytes: request.markdown().len() as u64,
        html_bytes: html.len() as u64,
        pdf_bytes: report.pdf_bytes,
        code_blocks: fragment.code_blocks,
        highlighted_blocks: fragment.highlighted_blocks,
        diagram_blocks: fragment.diagram_blocks,
        engine_strategy: report.strategy.to_string(),
        transform_duration_ms,
        render_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        stage_durations_ms,
    };
    info!(
        "PDF file created successfully at: {} ({}ms total)",
        out_path.display(),
        stats.total_duration_ms
    );

    Ok(ConversionOutput {
        path: out_path,
        paper: paper.clone(),
        watermark: report.watermark,
        stats,
    })
}

/// Shared stylesheet, theme stylesheet, then the configured extra file.
async fn stylesheets(config: &ConversionConfig) -> Result<Vec<String>, Md2PdfError> {
    let mut sheets = vec![SHARED_STYLESHEET.to_string()];
    if let Some(css) = highlight::theme_css(&config.highlight_theme) {
        sheets.push(css);
    }
    if let Some(path) = &config.stylesheet {
        let css = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| Md2PdfError::Filesystem {
                path: path.clone(),
                source,
            })?;
        sheets.push(css);
    }
    Ok(sheets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_contains_content_and_geometry() {
        let request = ConversionRequest::builder("# Title\n\nHello **world**")
            .paper_format("a4")
            .watermark("DRAFT")
            .build()
            .unwrap();
        let config = ConversionConfig::default();
        let html = preview_html(&request, &config).unwrap();
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("size: 210mm 297mm;"));
        assert!(html.contains("<div id=\"md2pdf-watermark\">DRAFT</div>"));
    }

    #[test]
    fn shared_stylesheet_is_bundled() {
        assert!(SHARED_STYLESHEET.contains("font-family"));
    }

    #[tokio::test]
    async fn extra_stylesheet_is_read_last() {
        let dir = tempfile::tempdir().unwrap();
        let css = dir.path().join("extra.css");
        std::fs::write(&css, "h1 { color: teal; }").unwrap();
        let config = ConversionConfig::builder().stylesheet(&css).build().unwrap();
        let sheets = stylesheets(&config).await.unwrap();
        assert_eq!(sheets.len(), 3);
        assert_eq!(sheets[2], "h1 { color: teal; }");
    }

    #[tokio::test]
    async fn missing_extra_stylesheet_is_a_filesystem_error() {
        let config = ConversionConfig::builder()
            .stylesheet("/definitely/not/here.css")
            .build()
            .unwrap();
        let err = stylesheets(&config).await.unwrap_err();
        assert!(matches!(err, Md2PdfError::Filesystem { .. }));
    }
}
