//! Text fitting: picks the largest font size at which a value fits its box.
//!
//! All geometry is in PDF points with the origin at the bottom-left of the
//! page. Placed lines carry baseline positions ready for a `Td` operator.

use serde::Serialize;

use crate::layout::font_metrics::{FontMetricTable, PdfFont};

pub const ELLIPSIS: &str = "...";

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// How a category of box is filled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitConfig {
    pub font: PdfFont,
    pub min_size: u8,
    pub max_size: u8,
    /// Line height as a multiple of the font size.
    pub leading: f32,
    /// Inset on all four sides.
    pub margin: f32,
    /// Height kept free at the top for the box caption.
    pub title_reserved: f32,
    pub multiline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    /// Baseline.
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitResult {
    pub font_size: u8,
    pub lines: Vec<PlacedLine>,
    pub truncated: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Text preparation
// ────────────────────────────────────────────────────────────────────────────

/// Normalizes line endings to `\n` and drops control characters other than
/// newline and tab.
pub fn clean_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|&c| c == '\n' || c == '\t' || !c.is_control())
        .collect()
}

fn hard_break(word: &str, metrics: &FontMetricTable, size: f32, max_width: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for c in word.chars() {
        let mut candidate = current.clone();
        candidate.push(c);
        if !current.is_empty() && metrics.text_width(&candidate, size) > max_width {
            pieces.push(std::mem::take(&mut current));
            current.push(c);
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Greedy word wrap at a given size. Manual newlines are kept (a blank
/// paragraph becomes an empty line); a word only breaks mid-word when it is
/// wider than the line on its own.
pub fn wrap_lines(text: &str, metrics: &FontMetricTable, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let pieces = if metrics.text_width(word, size) > max_width {
                hard_break(word, metrics, size, max_width)
            } else {
                vec![word.to_string()]
            };

            for piece in pieces {
                let candidate = if current.is_empty() {
                    piece.clone()
                } else {
                    format!("{current} {piece}")
                };
                if metrics.text_width(&candidate, size) <= max_width {
                    current = candidate;
                } else {
                    if !current.is_empty() {
                        lines.push(std::mem::take(&mut current));
                    }
                    current = piece;
                }
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    lines
}

/// Appends the ellipsis, trimming `line` until the result fits. Returns the
/// line unchanged when not even the ellipsis fits.
fn ellipsize(line: &str, metrics: &FontMetricTable, size: f32, max_width: f32) -> String {
    let mut kept: Vec<char> = line.trim_end().chars().collect();
    loop {
        let head: String = kept.iter().collect();
        let candidate = format!("{}{ELLIPSIS}", head.trim_end());
        if metrics.text_width(&candidate, size) <= max_width {
            return candidate;
        }
        if kept.pop().is_none() {
            return line.to_string();
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fitting
// ────────────────────────────────────────────────────────────────────────────

struct Area {
    width: f32,
    height: f32,
}

fn usable_area(rect: &Rect, config: &FitConfig) -> Area {
    Area {
        width: rect.w - 2.0 * config.margin,
        height: rect.h - 2.0 * config.margin - config.title_reserved,
    }
}

/// Largest size in `min..=max` for which `fits` holds, or `None`.
/// Checks `max` first since most values fit comfortably.
fn search_size(min: u8, max: u8, fits: impl Fn(u8) -> bool) -> Option<u8> {
    if fits(max) {
        return Some(max);
    }
    let (mut lo, mut hi) = (i32::from(min), i32::from(max) - 1);
    let mut best = None;
    while lo <= hi {
        let mid = (lo + hi) / 2;
        if fits(mid as u8) {
            best = Some(mid as u8);
            lo = mid + 1;
        } else {
            hi = mid - 1;
        }
    }
    best
}

/// Fits `text` into `rect` according to `config`.
pub fn fit_text(text: &str, rect: &Rect, config: &FitConfig) -> FitResult {
    let cleaned = clean_text(text);
    let cleaned = cleaned.trim();
    let min_size = config.min_size.min(config.max_size);

    if cleaned.is_empty() {
        return FitResult {
            font_size: config.max_size,
            lines: Vec::new(),
            truncated: false,
        };
    }

    let area = usable_area(rect, config);
    if area.width <= 0.0 || area.height <= 0.0 {
        return FitResult {
            font_size: min_size,
            lines: Vec::new(),
            truncated: true,
        };
    }

    if config.multiline {
        fit_multiline(cleaned, rect, config, &area, min_size)
    } else {
        fit_single_line(cleaned, rect, config, &area, min_size)
    }
}

fn fit_multiline(text: &str, rect: &Rect, config: &FitConfig, area: &Area, min_size: u8) -> FitResult {
    let metrics = config.font.metrics();
    let line_height = |size: u8| f32::from(size) * config.leading;

    let fits = |size: u8| {
        let lines = wrap_lines(text, metrics, f32::from(size), area.width);
        lines.len() as f32 * line_height(size) <= area.height
    };

    let (size, mut lines, truncated) = match search_size(min_size, config.max_size, fits) {
        Some(size) => (size, wrap_lines(text, metrics, f32::from(size), area.width), false),
        None => {
            let size_pt = f32::from(min_size);
            let mut lines = wrap_lines(text, metrics, size_pt, area.width);
            let max_lines = (area.height / line_height(min_size)).floor() as usize;
            lines.truncate(max_lines);
            if let Some(last) = lines.last_mut() {
                *last = ellipsize(last, metrics, size_pt, area.width);
            }
            (min_size, lines, true)
        }
    };

    let size_pt = f32::from(size);
    let x = rect.x + config.margin;
    let first_baseline = rect.y + rect.h - config.margin - config.title_reserved - size_pt;
    let placed = lines
        .drain(..)
        .enumerate()
        .map(|(i, text)| PlacedLine {
            text,
            x,
            y: first_baseline - i as f32 * line_height(size),
        })
        .collect();

    FitResult {
        font_size: size,
        lines: placed,
        truncated,
    }
}

fn fit_single_line(text: &str, rect: &Rect, config: &FitConfig, area: &Area, min_size: u8) -> FitResult {
    let metrics = config.font.metrics();
    let line: String = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let fits = |size: u8| {
        let size_pt = f32::from(size);
        size_pt <= area.height && metrics.text_width(&line, size_pt) <= area.width
    };

    let (size, text, truncated) = match search_size(min_size, config.max_size, fits) {
        Some(size) => (size, line, false),
        None => {
            let size_pt = f32::from(min_size);
            let text = if metrics.text_width(&line, size_pt) <= area.width {
                line
            } else {
                ellipsize(&line, metrics, size_pt, area.width)
            };
            (min_size, text, true)
        }
    };

    let size_pt = f32::from(size);
    let baseline = rect.y + config.margin + ((area.height - size_pt) / 2.0).max(0.0);

    FitResult {
        font_size: size,
        lines: vec![PlacedLine {
            text,
            x: rect.x + config.margin,
            y: baseline,
        }],
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inside(rect: &Rect, x: f32, y: f32) -> bool {
        x >= rect.x && x <= rect.x + rect.w && y >= rect.y && y <= rect.y + rect.h
    }

    fn config(multiline: bool) -> FitConfig {
        FitConfig {
            font: PdfFont::Helvetica,
            min_size: 8,
            max_size: 14,
            leading: 1.3,
            margin: 10.0,
            title_reserved: 20.0,
            multiline,
        }
    }

    fn rect(w: f32, h: f32) -> Rect {
        Rect { x: 100.0, y: 200.0, w, h }
    }

    fn assert_inside(result: &FitResult, rect: &Rect) {
        for line in &result.lines {
            assert!(inside(&rect, line.x, line.y), "{line:?} starts outside {rect:?}");
        }
    }

    // ── cleaning ──

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("a\r\nb\rc\u{0007}d\te"), "a\nb\ncd\te");
    }

    // ── wrapping ──

    #[test]
    fn test_wrap_keeps_manual_newlines_and_blank_lines() {
        let m = PdfFont::Helvetica.metrics();
        let lines = wrap_lines("uno\n\ndos", m, 10.0, 500.0);
        assert_eq!(lines, vec!["uno", "", "dos"]);
    }

    #[test]
    fn test_wrap_never_splits_a_word_that_fits() {
        let m = PdfFont::Helvetica.metrics();
        let width = m.text_width("transporte", 10.0) + 1.0;
        let lines = wrap_lines("transporte internacional de carga", m, 10.0, width * 1.5);
        for line in &lines {
            for word in line.split(' ') {
                assert!(["transporte", "internacional", "de", "carga"].contains(&word));
            }
        }
    }

    #[test]
    fn test_wrap_hard_breaks_oversized_words() {
        let m = PdfFont::Helvetica.metrics();
        let width = m.text_width("AAAA", 10.0);
        let lines = wrap_lines("AAAAAAAAAA", m, 10.0, width);
        assert_eq!(lines, vec!["AAAA", "AAAA", "AA"]);
    }

    // ── fitting ──

    #[test]
    fn test_short_text_fits_at_max_size() {
        let r = rect(400.0, 120.0);
        let result = fit_text("SOJA", &r, &config(true));
        assert_eq!(result.font_size, 14);
        assert!(!result.truncated);
        assert_eq!(result.lines.len(), 1);
        assert_inside(&result, &r);
    }

    #[test]
    fn test_empty_text_fits_trivially() {
        let result = fit_text(" \r\n ", &rect(10.0, 10.0), &config(true));
        assert_eq!(result.font_size, 14);
        assert!(result.lines.is_empty());
        assert!(!result.truncated);
    }

    #[test]
    fn test_medium_text_shrinks_between_bounds() {
        let r = rect(300.0, 90.0);
        let text = "Marcas y números de los bultos descripción de las mercaderías ".repeat(2);
        let result = fit_text(&text, &r, &config(true));
        assert!(result.font_size >= 8 && result.font_size < 14);
        assert!(!result.truncated);
        assert_inside(&result, &r);
    }

    #[test]
    fn test_overflow_truncates_with_ellipsis_inside_rect() {
        let r = rect(200.0, 70.0);
        let text = "palabra ".repeat(200);
        let result = fit_text(&text, &r, &config(true));
        assert_eq!(result.font_size, 8);
        assert!(result.truncated);
        assert!(!result.lines.is_empty());
        assert!(result.lines.last().unwrap().text.ends_with(ELLIPSIS));
        assert_inside(&result, &r);

        let m = PdfFont::Helvetica.metrics();
        for line in &result.lines {
            assert!(m.text_width(&line.text, 8.0) <= r.w - 20.0);
        }
    }

    #[test]
    fn test_single_line_truncates_with_ellipsis() {
        let r = rect(120.0, 60.0);
        let result = fit_text(&"X".repeat(100), &r, &config(false));
        assert!(result.truncated);
        assert_eq!(result.lines.len(), 1);
        assert!(result.lines[0].text.ends_with(ELLIPSIS));
        assert_inside(&result, &r);
    }

    #[test]
    fn test_single_line_fits_at_max() {
        let r = rect(300.0, 60.0);
        let result = fit_text("PROVISORIO", &r, &config(false));
        assert_eq!(result.font_size, 14);
        assert_eq!(result.lines[0].text, "PROVISORIO");
        assert_inside(&result, &r);
    }

    #[test]
    fn test_no_usable_area_is_truncated() {
        let result = fit_text("algo", &rect(15.0, 15.0), &config(true));
        assert!(result.truncated);
        assert!(result.lines.is_empty());
    }

    #[test]
    fn test_search_size_is_largest_fitting() {
        assert_eq!(search_size(8, 14, |s| s <= 11), Some(11));
        assert_eq!(search_size(8, 14, |_| true), Some(14));
        assert_eq!(search_size(8, 14, |_| false), None);
    }
}
