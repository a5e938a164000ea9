//! In-place SVG minification.
//!
//! Strips what vector editors leave behind (XML prologs, comments, metadata,
//! editor namespaces) and the whitespace between tags. Element `id`
//! attributes are never touched, since stylesheets and `<use>` references
//! point at them. Text, scripts, styles, CDATA and `xml:space="preserve"`
//! content keep their whitespace.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use rayon::prelude::*;
use regex::Regex;
use walkdir::WalkDir;

use crate::scheduler::TaskContext;
use crate::task::{Action, TaskError};

/// Namespaces written by Inkscape, Sodipodi and Sketch.
const EDITOR_NAMESPACES: &str = "inkscape|sodipodi|sketch";

static XML_DECLARATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<\?xml.*?\?>").unwrap());

static DOCTYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!DOCTYPE[^\[>]*(\[.*?\])?\s*>").unwrap());

static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static METADATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<metadata\b[^>]*/>|<metadata\b[^>]*>.*?</metadata>").unwrap()
});

static EDITOR_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?s)<(?:{ns}):[\w-]+\b[^>]*/>|<(?:{ns}):[\w-]+\b[^>]*>.*?</(?:{ns}):[\w-]+>",
        ns = EDITOR_NAMESPACES
    ))
    .unwrap()
});

static EDITOR_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"\s+(?:xmlns:)?(?:{ns})(?::[\w-]+)?\s*=\s*(?:"[^"]*"|'[^']*')"#,
        ns = EDITOR_NAMESPACES
    ))
    .unwrap()
});

static EMPTY_CONTAINER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:defs|g)\s*/>|<defs\s*>\s*</defs>|<g\s*>\s*</g>").unwrap());

static LINE_BREAKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*[\r\n]\s*").unwrap());

static INTER_TAG_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s+<").unwrap());

/// Start of a region whose whitespace is significant.
static PRESERVED_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<!\[CDATA\[|<(text|tspan|script|style)\b[^>]*>|<([\w:-]+)\b[^>]*\bxml:space\s*=\s*["']preserve["'][^>]*>"#,
    )
    .unwrap()
});

/// Errors from the SVG pass.
#[derive(Debug, thiserror::Error)]
pub enum SvgError {
    #[error("SVG directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Failed to read {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("Failed to write {path}: {message}")]
    WriteError { path: String, message: String },
}

/// Totals from one pass over a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinifyReport {
    pub files: usize,
    pub rewritten: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Regex-based SVG minifier.
#[derive(Debug, Clone, Default)]
pub struct SvgMinifier;

impl SvgMinifier {
    /// Create a minifier.
    pub fn new() -> Self {
        Self
    }

    /// Minify one document.
    pub fn minify(&self, source: &str) -> String {
        let passes: [&Regex; 6] = [
            &XML_DECLARATION,
            &DOCTYPE,
            &COMMENT,
            &METADATA,
            &EDITOR_ELEMENT,
            &EDITOR_ATTRIBUTE,
        ];

        let mut svg = source.to_string();
        for pass in passes {
            svg = pass.replace_all(&svg, "").into_owned();
        }

        svg = collapse_whitespace(&svg);

        // Removing one empty group can empty its parent.
        loop {
            let next = EMPTY_CONTAINER.replace_all(&svg, "").into_owned();
            if next == svg {
                break;
            }
            svg = next;
        }

        svg.trim().to_string()
    }

    /// Minify every `*.svg` directly inside `dir`, rewriting changed files.
    pub fn minify_dir(&self, dir: &Path) -> Result<MinifyReport, SvgError> {
        if !dir.is_dir() {
            return Err(SvgError::DirectoryNotFound(dir.display().to_string()));
        }

        let files: Vec<PathBuf> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "svg"))
            .collect();

        let results: Vec<Result<(u64, u64), SvgError>> =
            files.par_iter().map(|path| self.minify_file(path)).collect();

        let mut report = MinifyReport::default();
        for result in results {
            let (before, after) = result?;
            report.files += 1;
            report.bytes_before += before;
            report.bytes_after += after;
            if before != after {
                report.rewritten += 1;
            }
        }

        Ok(report)
    }

    fn minify_file(&self, path: &Path) -> Result<(u64, u64), SvgError> {
        let source = fs::read_to_string(path).map_err(|e| SvgError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let minified = self.minify(&source);
        if minified != source {
            fs::write(path, &minified).map_err(|e| SvgError::WriteError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        }

        Ok((source.len() as u64, minified.len() as u64))
    }
}

/// Collapse whitespace between tags, leaving preserved regions verbatim.
fn collapse_whitespace(svg: &str) -> String {
    let mut out = String::with_capacity(svg.len());
    let mut copied = 0;
    let mut pos = 0;

    while let Some(caps) = PRESERVED_START.captures_at(svg, pos) {
        let Some(open) = caps.get(0) else { break };

        let end = if open.as_str() == "<![CDATA[" {
            svg[open.end()..].find("]]>").map(|i| open.end() + i + 3)
        } else if open.as_str().ends_with("/>") {
            pos = open.end();
            continue;
        } else {
            caps.get(1)
                .or_else(|| caps.get(2))
                .and_then(|name| element_end(svg, open.end(), name.as_str()))
        };
        let end = end.unwrap_or(svg.len());

        out.push_str(&collapse_segment(&svg[copied..open.start()], copied > 0, true));
        out.push_str(&svg[open.start()..end]);
        copied = end;
        pos = end;
    }

    out.push_str(&collapse_segment(&svg[copied..], copied > 0, false));
    out
}

/// Collapse one unpreserved stretch. `after_tag` and `before_tag` say
/// whether a preserved element sits directly before or after it.
fn collapse_segment(segment: &str, after_tag: bool, before_tag: bool) -> String {
    let spaced = LINE_BREAKS.replace_all(segment, " ");
    let mut out = INTER_TAG_WHITESPACE.replace_all(&spaced, "><").into_owned();

    if before_tag {
        let trimmed = out.trim_end();
        if trimmed.ends_with('>') || (after_tag && trimmed.is_empty()) {
            let len = trimmed.len();
            out.truncate(len);
        }
    }
    if after_tag {
        let trimmed = out.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('<') {
            out = trimmed.to_string();
        }
    }

    out
}

/// Byte offset just past the close tag matching an element named `name`
/// whose content starts at `from`.
fn element_end(svg: &str, from: usize, name: &str) -> Option<usize> {
    let open = format!("<{}", name);
    let close = format!("</{}", name);
    let mut depth = 1;
    let mut pos = from;

    loop {
        let close_at = find_tag(svg, pos, &close)?;
        match find_tag(&svg[..close_at], pos, &open) {
            Some(open_at) => {
                let tag_end = open_at + svg[open_at..].find('>')? + 1;
                if !svg[..tag_end].ends_with("/>") {
                    depth += 1;
                }
                pos = tag_end;
            }
            None => {
                let end = close_at + svg[close_at..].find('>')? + 1;
                depth -= 1;
                if depth == 0 {
                    return Some(end);
                }
                pos = end;
            }
        }
    }
}

/// Find `prefix` (`<name` or `</name`) followed by a name boundary.
fn find_tag(svg: &str, from: usize, prefix: &str) -> Option<usize> {
    let mut pos = from;
    while let Some(i) = svg[pos..].find(prefix) {
        let at = pos + i;
        match svg[at + prefix.len()..].chars().next() {
            Some(c) if c.is_whitespace() || c == '>' || c == '/' => return Some(at),
            Some(_) => pos = at + prefix.len(),
            None => return None,
        }
    }
    None
}

/// Task action running [`SvgMinifier::minify_dir`] on a fixed directory.
#[derive(Debug, Clone)]
pub struct MinifySvgAction {
    dir: PathBuf,
}

impl MinifySvgAction {
    /// Create an action minifying the SVGs in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Action for MinifySvgAction {
    async fn run(&self, _ctx: &TaskContext) -> Result<(), TaskError> {
        if !self.dir.is_dir() {
            tracing::warn!("No SVG directory at {}; skipping", self.dir.display());
            return Ok(());
        }

        let dir = self.dir.clone();
        let report = tokio::task::spawn_blocking(move || SvgMinifier::new().minify_dir(&dir))
            .await
            .map_err(|e| TaskError::Panicked(e.to_string()))??;

        tracing::info!(
            "Minified {} SVG files ({} rewritten, {} -> {} bytes)",
            report.files,
            report.rewritten,
            report.bytes_before,
            report.bytes_after
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const EDITOR_SVG: &str = r##"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<!-- Created with Inkscape (http://www.inkscape.org/) -->
<!DOCTYPE svg PUBLIC "-//W3C//DTD SVG 1.1//EN" "http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd">
<svg xmlns="http://www.w3.org/2000/svg"
     xmlns:xlink="http://www.w3.org/1999/xlink"
     xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape"
     xmlns:sodipodi="http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd"
     id="logo" viewBox="0 0 10 10" inkscape:version="0.92">
  <metadata>
    <rdf:RDF><cc:Work rdf:about=""/></rdf:RDF>
  </metadata>
  <sodipodi:namedview pagecolor="#ffffff" inkscape:zoom="1"/>
  <defs>
  </defs>
  <g>
    <g></g>
  </g>
  <g id="mark" inkscape:label="Layer 1">
    <path id="stroke" d="M0 0h10v10z"/>
  </g>
</svg>
"##;

    #[test]
    fn strips_editor_noise() {
        let svg = SvgMinifier::new().minify(EDITOR_SVG);

        assert_eq!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" id="logo" viewBox="0 0 10 10"><g id="mark"><path id="stroke" d="M0 0h10v10z"/></g></svg>"#
        );
    }

    #[test]
    fn preserves_ids_on_empty_elements() {
        let svg = SvgMinifier::new().minify(r#"<svg><g id="anchor"/><g id="x"></g></svg>"#);

        assert!(svg.contains(r#"<g id="anchor"/>"#));
        assert!(svg.contains(r#"<g id="x"></g>"#));
    }

    #[test]
    fn keeps_spaces_between_text_spans() {
        let svg = SvgMinifier::new().minify(
            "<svg>\n  <text x=\"0\"><tspan>Hello</tspan> <tspan>World</tspan></text>\n</svg>\n",
        );

        assert_eq!(
            svg,
            r#"<svg><text x="0"><tspan>Hello</tspan> <tspan>World</tspan></text></svg>"#
        );
    }

    #[test]
    fn keeps_script_line_breaks() {
        let source = "<svg>\n  <script>// init\nstart();</script>\n</svg>";

        assert_eq!(
            SvgMinifier::new().minify(source),
            "<svg><script>// init\nstart();</script></svg>"
        );
    }

    #[test]
    fn keeps_style_and_cdata_verbatim() {
        let source = "<svg>\n<style>\n  .a { fill: red; }\n</style>\n<desc><![CDATA[ one\n  two ]]></desc>\n</svg>";

        assert_eq!(
            SvgMinifier::new().minify(source),
            "<svg><style>\n  .a { fill: red; }\n</style><desc><![CDATA[ one\n  two ]]></desc></svg>"
        );
    }

    #[test]
    fn keeps_xml_space_preserve_content() {
        let source = "<svg>\n  <g xml:space=\"preserve\"><g>a</g>\n  <g>b</g></g>\n  <g id=\"x\">\n  </g>\n</svg>";

        assert_eq!(
            SvgMinifier::new().minify(source),
            "<svg><g xml:space=\"preserve\"><g>a</g>\n  <g>b</g></g><g id=\"x\"></g></svg>"
        );
    }

    #[test]
    fn text_path_does_not_end_a_text_element() {
        let source = "<svg><text><textPath href=\"#p\">A  <tspan>B</tspan></textPath>\n</text>\n</svg>";

        assert_eq!(
            SvgMinifier::new().minify(source),
            "<svg><text><textPath href=\"#p\">A  <tspan>B</tspan></textPath>\n</text></svg>"
        );
    }

    #[test]
    fn minified_output_is_stable() {
        let minifier = SvgMinifier::new();
        let once = minifier.minify(EDITOR_SVG);

        assert_eq!(minifier.minify(&once), once);
    }

    #[test]
    fn rewrites_svgs_in_place() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("logo.svg"), EDITOR_SVG).unwrap();
        fs::write(temp.path().join("clean.svg"), "<svg/>").unwrap();
        fs::write(temp.path().join("notes.txt"), "  <!-- keep -->  ").unwrap();

        let report = SvgMinifier::new().minify_dir(temp.path()).unwrap();

        assert_eq!(report.files, 2);
        assert_eq!(report.rewritten, 1);
        assert!(report.bytes_after < report.bytes_before);

        let logo = fs::read_to_string(temp.path().join("logo.svg")).unwrap();
        assert!(logo.starts_with("<svg"));
        assert!(logo.contains(r#"id="logo""#));

        let notes = fs::read_to_string(temp.path().join("notes.txt")).unwrap();
        assert_eq!(notes, "  <!-- keep -->  ");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let temp = tempdir().unwrap();

        let result = SvgMinifier::new().minify_dir(&temp.path().join("images"));
        assert!(matches!(result, Err(SvgError::DirectoryNotFound(_))));
    }
}
