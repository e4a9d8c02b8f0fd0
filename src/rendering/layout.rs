//! The preview surface: the rendered element that gets captured.
//!
//! Highlighted markup is applied to the surface, which parses it back into
//! lines of coloured text runs. Span classes are scope atoms, so nesting spans
//! rebuilds the scope stack the theme needs to pick a colour. The surface
//! sits inside a container carrying the externally supplied style
//! (background, padding, font size, font family); captures are taken of the
//! container.

use scraper::{ElementRef, Html};
use syntect::highlighting::{Highlighter, Theme};
use syntect::parsing::Scope;

use crate::language::HighlightResult;
use crate::rendering::paint::Rgba;

/// Column width of a tab stop.
pub const TAB_WIDTH: usize = 4;

/// Monospace cell width as a fraction of the font size.
const CELL_WIDTH_EM: f32 = 0.6;
/// Line height as a multiple of the font size.
const LINE_HEIGHT_EM: f32 = 1.4;

/// Font family used when none is configured.
pub const DEFAULT_FONT_FAMILY: &str = "monospace";

/// Style of the container around the code, set from the outside.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerStyle {
    /// `None` leaves the container transparent
    pub background: Option<Rgba>,
    /// Padding on every side, in px
    pub padding: f32,
    /// Font size in px
    pub font_size: f32,
    /// CSS-style font family list. The built-in capture engine draws on a
    /// fixed monospace grid and ignores it; other engines may honour it.
    pub font_family: String,
}

impl Default for ContainerStyle {
    fn default() -> Self {
        Self {
            background: None,
            padding: 32.0,
            font_size: 14.0,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub color: Rgba,
}

/// Container geometry in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerLayout {
    pub width: f32,
    pub height: f32,
    pub padding: f32,
    pub font_size: f32,
    pub cell_width: f32,
    pub line_height: f32,
    pub columns: usize,
    pub rows: usize,
}

pub struct PreviewSurface {
    style: ContainerStyle,
    theme: Theme,
    markup: String,
    language: String,
    lines: Vec<Vec<TextRun>>,
}

impl PreviewSurface {
    pub fn new(style: ContainerStyle, theme: Theme) -> Self {
        Self {
            style,
            theme,
            markup: String::new(),
            language: String::new(),
            lines: Vec::new(),
        }
    }

    pub fn style(&self) -> &ContainerStyle {
        &self.style
    }

    pub fn set_style(&mut self, style: ContainerStyle) {
        self.style = style;
    }

    /// Swap the theme and recolour the current markup.
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.lines = parse_markup(&self.markup, &self.theme);
    }

    /// Markup currently applied to the surface
    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// `language-<tag>` class of the code element
    pub fn language_class(&self) -> String {
        format!("language-{}", self.language)
    }

    pub fn lines(&self) -> &[Vec<TextRun>] {
        &self.lines
    }

    /// Replace the surface content with `result`'s markup.
    pub fn apply_markup(&mut self, result: &HighlightResult) {
        self.markup = result.markup.clone();
        self.language = result.resolved_language.clone();
        self.lines = parse_markup(&self.markup, &self.theme);
    }

    /// Plain text of the surface, one line per row
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.iter().map(|r| r.text.as_str()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn layout(&self) -> ContainerLayout {
        let font_size = self.style.font_size;
        let padding = self.style.padding.max(0.0);
        let cell_width = font_size * CELL_WIDTH_EM;
        let line_height = font_size * LINE_HEIGHT_EM;
        let columns = self
            .lines
            .iter()
            .map(|line| line.iter().map(|r| r.text.chars().count()).sum::<usize>())
            .max()
            .unwrap_or(0);
        let rows = self.lines.len();

        ContainerLayout {
            width: columns as f32 * cell_width + 2.0 * padding,
            height: rows as f32 * line_height + 2.0 * padding,
            padding,
            font_size,
            cell_width,
            line_height,
            columns,
            rows,
        }
    }
}

struct RunBuilder<'t> {
    highlighter: Highlighter<'t>,
    default: Rgba,
    lines: Vec<Vec<TextRun>>,
    column: usize,
}

impl RunBuilder<'_> {
    fn color_for(&self, stack: &[Scope]) -> Rgba {
        if stack.is_empty() {
            return self.default;
        }
        let c = self.highlighter.style_for_stack(stack).foreground;
        Rgba::new(c.r, c.g, c.b, c.a)
    }

    fn push_text(&mut self, text: &str, stack: &[Scope]) {
        let color = self.color_for(stack);
        for (i, segment) in text.split('\n').enumerate() {
            if i > 0 {
                self.lines.push(Vec::new());
                self.column = 0;
            }
            if segment.is_empty() {
                continue;
            }
            let mut expanded = String::with_capacity(segment.len());
            for ch in segment.chars() {
                if ch == '\t' {
                    let pad = TAB_WIDTH - self.column % TAB_WIDTH;
                    expanded.extend(std::iter::repeat(' ').take(pad));
                    self.column += pad;
                } else if ch != '\r' {
                    expanded.push(ch);
                    self.column += 1;
                }
            }
            if let Some(line) = self.lines.last_mut() {
                match line.last_mut() {
                    Some(last) if last.color == color => last.text.push_str(&expanded),
                    _ => line.push(TextRun { text: expanded, color }),
                }
            }
        }
    }

    fn walk(&mut self, element: ElementRef<'_>, stack: &mut Vec<Scope>) {
        let mut pushed = 0;
        if let Some(class) = element.value().attr("class") {
            let scope_name = class.split_whitespace().collect::<Vec<_>>().join(".");
            if let Ok(scope) = Scope::new(&scope_name) {
                stack.push(scope);
                pushed = 1;
            }
        }

        for child in element.children() {
            if let Some(child_el) = ElementRef::wrap(child) {
                self.walk(child_el, stack);
            } else if let Some(text) = child.value().as_text() {
                self.push_text(text, stack);
            }
        }

        stack.truncate(stack.len() - pushed);
    }
}

fn parse_markup(markup: &str, theme: &Theme) -> Vec<Vec<TextRun>> {
    if markup.is_empty() {
        return Vec::new();
    }

    let default = theme
        .settings
        .foreground
        .map(|c| Rgba::new(c.r, c.g, c.b, c.a))
        .unwrap_or(Rgba::WHITE);
    let mut builder = RunBuilder {
        highlighter: Highlighter::new(theme),
        default,
        lines: vec![Vec::new()],
        column: 0,
    };

    let fragment = Html::parse_fragment(markup);
    let mut stack = Vec::new();
    builder.walk(fragment.root_element(), &mut stack);

    let mut lines = builder.lines;
    while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    lines
}
