//! [`Engine`] backed by `headless_chrome`.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::debug;

use super::{Engine, EngineError, EngineInstance, LaunchSettings, LaunchStrategy, PdfExportOptions};

/// Launches a fresh Chrome process per conversion.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeEngine;

impl Engine for ChromeEngine {
    fn launch(
        &self,
        strategy: &LaunchStrategy,
        settings: &LaunchSettings,
    ) -> Result<Box<dyn EngineInstance>, EngineError> {
        let path = match strategy {
            LaunchStrategy::Pinned(path) => path.clone(),
            LaunchStrategy::Discovered => {
                headless_chrome::browser::default_executable().map_err(EngineError::Failed)?
            }
        };
        debug!(strategy = strategy.label(), path = %path.display(), "Starting Chrome");

        let args: Vec<&OsStr> = strategy.extra_args().iter().map(OsStr::new).collect();
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(true)
            .path(Some(path))
            .args(args)
            .window_size(Some(settings.viewport))
            .idle_browser_timeout(settings.idle_timeout)
            .build()
            .map_err(|e| EngineError::Failed(format!("invalid launch options: {e}")))?;

        let browser = Browser::new(options).map_err(|e| EngineError::Failed(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| EngineError::Failed(format!("could not open a tab: {e}")))?;
        tab.set_default_timeout(settings.command_timeout);

        Ok(Box::new(ChromeInstance {
            browser: Some(browser),
            tab: Some(tab),
            command_timeout: settings.command_timeout,
        }))
    }
}

struct ChromeInstance {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
    command_timeout: Duration,
}

/// Run `f` with `timeout` as the tab default, then put `restore` back
/// whether or not `f` succeeded.
fn with_default_timeout<T>(
    set: impl Fn(Duration),
    timeout: Duration,
    restore: Duration,
    f: impl FnOnce() -> T,
) -> T {
    set(timeout);
    let out = f();
    set(restore);
    out
}

impl ChromeInstance {
    fn tab(&self) -> Result<&Arc<Tab>, EngineError> {
        self.tab
            .as_ref()
            .ok_or_else(|| EngineError::Failed("engine instance already closed".into()))
    }

    fn eval(&self, script: &str) -> Result<Option<serde_json::Value>, EngineError> {
        let remote = self
            .tab()?
            .evaluate(script, false)
            .map_err(|e| EngineError::Failed(format!("script evaluation failed: {e}")))?;
        Ok(remote.value)
    }
}

impl EngineInstance for ChromeInstance {
    fn load(&mut self, url: &str, timeout: Duration) -> Result<(), EngineError> {
        let tab = self.tab()?;
        let started = Instant::now();
        let classify = |e: String| {
            let elapsed = started.elapsed();
            if elapsed >= timeout || e.to_lowercase().contains("timeout") {
                EngineError::Timeout {
                    elapsed_ms: elapsed.as_millis() as u64,
                }
            } else {
                EngineError::Failed(e)
            }
        };
        with_default_timeout(
            |t| {
                tab.set_default_timeout(t);
            },
            timeout,
            self.command_timeout,
            || {
                tab.navigate_to(url).map_err(|e| classify(e.to_string()))?;
                tab.wait_until_navigated()
                    .map_err(|e| classify(e.to_string()))
                    .map(|_| ())
            },
        )?;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Navigation settled");
        Ok(())
    }

    fn inject_stylesheet(&mut self, css: &str) -> Result<(), EngineError> {
        let css = serde_json::to_string(css)
            .map_err(|e| EngineError::Failed(format!("could not encode stylesheet: {e}")))?;
        let script = format!(
            "(() => {{ const s = document.createElement('style'); s.textContent = {css}; \
             document.head.appendChild(s); return true; }})()"
        );
        self.eval(&script).map(|_| ())
    }

    fn repaint(&mut self) -> Result<(), EngineError> {
        self.eval(
            "(() => { const b = document.body; b.style.transform = 'translateZ(0)'; \
             const h = b.offsetHeight; b.style.transform = ''; return h; })()",
        )
        .map(|_| ())
    }

    fn query_text(&mut self, selector: &str) -> Result<Option<String>, EngineError> {
        let selector = serde_json::to_string(selector)
            .map_err(|e| EngineError::Failed(format!("could not encode selector: {e}")))?;
        let script = format!(
            "(() => {{ const el = document.querySelector({selector}); \
             return el ? el.textContent : null; }})()"
        );
        match self.eval(&script)? {
            Some(serde_json::Value::String(text)) => Ok(Some(text)),
            _ => Ok(None),
        }
    }

    fn print_pdf(&mut self, options: &PdfExportOptions) -> Result<Vec<u8>, EngineError> {
        let margin = Some(options.margin_in);
        let pdf_options = PrintToPdfOptions {
            landscape: Some(options.landscape),
            display_header_footer: Some(options.display_header_footer()),
            print_background: Some(options.print_background),
            paper_width: Some(options.paper_width_in),
            paper_height: Some(options.paper_height_in),
            margin_top: margin,
            margin_bottom: margin,
            margin_left: margin,
            margin_right: margin,
            header_template: options.header_template.clone(),
            footer_template: options.footer_template.clone(),
            prefer_css_page_size: Some(options.prefer_css_page_size),
            ..Default::default()
        };
        self.tab()?
            .print_to_pdf(Some(pdf_options))
            .map_err(|e| EngineError::Failed(e.to_string()))
    }

    fn close(&mut self) {
        if let Some(tab) = self.tab.take() {
            if let Err(e) = tab.close(false) {
                debug!("Tab close failed: {e}");
            }
        }
        // Dropping the browser terminates the child process.
        self.browser.take();
    }
}

impl Drop for ChromeInstance {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn navigation_timeout_does_not_outlive_navigation() {
        let seen = RefCell::new(Vec::new());
        let nav = Duration::from_secs(5);
        let cmd = Duration::from_secs(120);

        let out: Result<(), EngineError> = with_default_timeout(
            |t| seen.borrow_mut().push(t),
            nav,
            cmd,
            || Err(EngineError::Timeout { elapsed_ms: 5000 }),
        );

        assert!(matches!(out, Err(EngineError::Timeout { .. })));
        assert_eq!(*seen.borrow(), vec![nav, cmd]);
    }
}
