//! Whole-document error pages used when no themed page applies.

use crate::common::RequestContext;
use crate::config::HandlerSettings;
use crate::error::Result;
use crate::failure::{Failure, Frame};
use crate::render::escape_html;
use axum::http::StatusCode;
use std::fmt::Write;

/// Lines shown above and below the failing line in a source excerpt.
const EXCERPT_RADIUS: u32 = 5;

/// Produces a rich diagnostic page for debug mode.
///
/// Errors and panics raised while rendering are caught by the caller, which
/// falls back to [`basic_page`].
pub trait DiagnosticRenderer: Send + Sync + 'static {
    fn render(
        &self,
        failure: &Failure,
        request: &RequestContext,
        settings: &HandlerSettings,
    ) -> Result<String>;
}

/// The default diagnostic page: failure summary, source excerpt, cause chain,
/// stack frames and request input.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrettyPageRenderer;

impl DiagnosticRenderer for PrettyPageRenderer {
    fn render(
        &self,
        failure: &Failure,
        request: &RequestContext,
        settings: &HandlerSettings,
    ) -> Result<String> {
        let mut html = String::new();
        let location = failure.location();

        write!(
            html,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{title}</title>\n<style>{style}</style>\n</head>\n<body>\n",
            title = escape_html(failure.message()),
            style = PRETTY_STYLE,
        )?;

        writeln!(html, "<header>")?;
        writeln!(html, "<div class=\"kind\">{}</div>", escape_html(failure.kind().name()))?;
        writeln!(html, "<h1>{}</h1>", escape_html(failure.message()))?;
        writeln!(
            html,
            "<div class=\"location\">{}</div>",
            source_link(settings, location.file(), location.line())
        )?;
        writeln!(
            html,
            "<div class=\"time\">{}</div>",
            chrono::Utc::now().to_rfc3339()
        )?;
        writeln!(html, "</header>")?;

        if let Some(excerpt) = source_excerpt(location.file(), location.line()) {
            writeln!(html, "<section class=\"source\"><pre>")?;
            for (number, text) in excerpt {
                let class = if number == location.line() { " class=\"hit\"" } else { "" };
                writeln!(
                    html,
                    "<span{}><b>{:>5}</b> {}</span>",
                    class,
                    number,
                    escape_html(&text)
                )?;
            }
            writeln!(html, "</pre></section>")?;
        }

        let causes: Vec<&Failure> = failure.causes().collect();
        if !causes.is_empty() {
            writeln!(html, "<section><h2>Caused by</h2><ol>")?;
            for cause in causes {
                writeln!(
                    html,
                    "<li><b>{}</b> {} <small>{}</small></li>",
                    escape_html(cause.kind().name()),
                    escape_html(cause.message()),
                    source_link(settings, cause.location().file(), cause.location().line()),
                )?;
            }
            writeln!(html, "</ol></section>")?;
        }

        let frames = failure.frames();
        if !frames.is_empty() {
            writeln!(html, "<section><h2>Stack</h2><table>")?;
            for frame in &frames {
                write_frame(&mut html, frame, settings)?;
            }
            writeln!(html, "</table></section>")?;
        }

        writeln!(html, "<section><h2>Request</h2><table>")?;
        if let Some(url) = request.url() {
            writeln!(html, "<tr><th>URL</th><td>{}</td></tr>", escape_html(url))?;
        }
        if let Some(previous) = request.previous() {
            writeln!(html, "<tr><th>Referer</th><td>{}</td></tr>", escape_html(previous))?;
        }
        for (key, value) in request.input() {
            let text = match value.as_str() {
                Some(text) => text.to_string(),
                None => value.to_string(),
            };
            let shown = if settings.is_blacklisted(key) {
                "*".repeat(text.len().min(12))
            } else {
                text
            };
            writeln!(
                html,
                "<tr><th>{}</th><td>{}</td></tr>",
                escape_html(key),
                escape_html(&shown)
            )?;
        }
        writeln!(html, "</table></section>")?;

        writeln!(html, "</body>\n</html>")?;
        Ok(html)
    }
}

fn write_frame(html: &mut String, frame: &Frame, settings: &HandlerSettings) -> Result<()> {
    let class = if frame.is_application() { "app" } else { "vendor" };
    let position = match (&frame.file, frame.line) {
        (Some(file), Some(line)) => source_link(settings, file, line),
        (Some(file), None) => escape_html(file),
        _ => String::new(),
    };
    writeln!(
        html,
        "<tr class=\"{}\"><td>#{}</td><td>{}</td><td>{}</td></tr>",
        class,
        frame.index,
        escape_html(&frame.function),
        position
    )?;
    Ok(())
}

fn source_link(settings: &HandlerSettings, file: &str, line: u32) -> String {
    let label = escape_html(&format!("{}:{}", file, line));
    match &settings.editor {
        Some(editor) => format!(
            "<a href=\"{}\">{}</a>",
            escape_html(&editor.link(file, line)),
            label
        ),
        None => label,
    }
}

/// Lines around `line`, or `None` when the file cannot be read.
fn source_excerpt(file: &str, line: u32) -> Option<Vec<(u32, String)>> {
    let source = std::fs::read_to_string(file).ok()?;
    let first = line.saturating_sub(EXCERPT_RADIUS).max(1);
    let last = line.saturating_add(EXCERPT_RADIUS);

    let excerpt: Vec<(u32, String)> = source
        .lines()
        .zip(1u32..)
        .filter(|(_, number)| (first..=last).contains(number))
        .map(|(text, number)| (number, text.to_string()))
        .collect();

    (!excerpt.is_empty()).then_some(excerpt)
}

const PRETTY_STYLE: &str = "body{font-family:sans-serif;margin:0;background:#f7f7f7;color:#222}\
header{background:#b0413e;color:#fff;padding:24px}header h1{margin:8px 0;font-size:22px}\
.kind{opacity:.8}.location a,.location{color:#fff}.time{opacity:.6;font-size:12px}\
section{background:#fff;margin:16px;padding:16px;border-radius:4px}\
.source pre span{display:block}.source .hit{background:#fde2e1}\
table{border-collapse:collapse;width:100%}td,th{text-align:left;padding:4px 8px;border-bottom:1px solid #eee}\
tr.vendor{color:#999}";

/// A small self-contained page.
///
/// In debug mode it lists the kind, message, origin and frames; otherwise it
/// says nothing about the failure beyond the status.
pub fn basic_page(failure: &Failure, status: StatusCode, debug: bool) -> String {
    let reason = status.canonical_reason().unwrap_or("Error");
    let mut body = String::new();

    if debug {
        let location = failure.location();
        body.push_str(&format!(
            "<h1>{}</h1>\n<h2>{}</h2>\n<p>in {}:{}</p>\n",
            escape_html(failure.message()),
            escape_html(failure.kind().name()),
            escape_html(location.file()),
            location.line()
        ));
        for cause in failure.causes() {
            body.push_str(&format!(
                "<p>Caused by <b>{}</b>: {}</p>\n",
                escape_html(cause.kind().name()),
                escape_html(cause.message())
            ));
        }
        let frames = failure.frames();
        if !frames.is_empty() {
            body.push_str("<ol>\n");
            for frame in frames {
                body.push_str(&format!("<li>{}</li>\n", escape_html(&frame.function)));
            }
            body.push_str("</ol>\n");
        }
    } else {
        body.push_str("<h1>Whoops, looks like something went wrong.</h1>\n");
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{} {}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        status.as_u16(),
        reason,
        body
    )
}
