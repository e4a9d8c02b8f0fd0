//! Paint commands produced from a laid-out preview surface

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::rendering::layout::PreviewSurface;
use crate::Error;

/// Straight (non-premultiplied) 8-bit RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }
}

impl FromStr for Rgba {
    type Err = Error;

    /// Accepts `#rgb`, `#rrggbb`, `#rrggbbaa` (leading `#` optional) and `transparent`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("transparent") {
            return Ok(Rgba::TRANSPARENT);
        }
        let hex = s.strip_prefix('#').unwrap_or(s);
        let bad = || Error::ConfigError(format!("invalid colour: {}", s));
        if !hex.is_ascii() {
            return Err(bad());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad());
        match hex.len() {
            3 => {
                let nib = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 1], 16)
                        .map(|v| v * 17)
                        .map_err(|_| bad())
                };
                Ok(Rgba::new(nib(0)?, nib(1)?, nib(2)?, 255))
            }
            6 => Ok(Rgba::new(byte(0)?, byte(2)?, byte(4)?, 255)),
            8 => Ok(Rgba::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => Err(bad()),
        }
    }
}

impl TryFrom<String> for Rgba {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Rgba> for String {
    fn from(c: Rgba) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// Coordinates are CSS pixels; the rasterizer applies the capture scale.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        rgba: Rgba,
    },
    /// One character cell of text
    Glyph {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        rgba: Rgba,
        ch: char,
    },
}

/// Flatten the preview into paint commands: container background first,
/// then one glyph cell per visible character.
pub fn paint_surface(surface: &PreviewSurface) -> Vec<PaintCommand> {
    let layout = surface.layout();
    let mut cmds = Vec::new();

    if let Some(bg) = surface.style().background.filter(|c| !c.is_transparent()) {
        cmds.push(PaintCommand::SolidRect {
            x: 0.0,
            y: 0.0,
            width: layout.width,
            height: layout.height,
            rgba: bg,
        });
    }

    // Glyph ink covers most of the cell, leaving a gap between neighbours
    // and between lines.
    let ink_w = layout.cell_width * 0.8;
    let ink_h = layout.font_size * 0.8;
    let ink_dy = (layout.line_height - ink_h) / 2.0;

    for (row, line) in surface.lines().iter().enumerate() {
        let y = layout.padding + row as f32 * layout.line_height + ink_dy;
        let mut col = 0usize;
        for run in line {
            for ch in run.text.chars() {
                if !ch.is_whitespace() && !run.color.is_transparent() {
                    cmds.push(PaintCommand::Glyph {
                        x: layout.padding + col as f32 * layout.cell_width,
                        y,
                        width: ink_w,
                        height: ink_h,
                        rgba: run.color,
                        ch,
                    });
                }
                col += 1;
            }
        }
    }

    cmds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::layout::{ContainerStyle, PreviewSurface};
    use crate::rendering::theme::ThemeCatalog;
    use crate::language::HighlightResult;

    #[test]
    fn parse_colours() {
        assert_eq!("#fff".parse::<Rgba>().unwrap(), Rgba::WHITE);
        assert_eq!("#102030".parse::<Rgba>().unwrap(), Rgba::new(16, 32, 48, 255));
        assert_eq!("10203040".parse::<Rgba>().unwrap(), Rgba::new(16, 32, 48, 64));
        assert!("transparent".parse::<Rgba>().unwrap().is_transparent());
        assert!("#12".parse::<Rgba>().is_err());
        assert!("#zzzzzz".parse::<Rgba>().is_err());
        assert_eq!(Rgba::new(16, 32, 48, 255).to_string(), "#102030");
    }

    #[test]
    fn background_then_glyphs() {
        let themes = ThemeCatalog::load();
        let style = ContainerStyle {
            background: Some(Rgba::new(1, 2, 3, 255)),
            padding: 10.0,
            font_size: 10.0,
            ..ContainerStyle::default()
        };
        let mut surface = PreviewSurface::new(style, themes.resolve("base16-ocean.dark"));
        surface.apply_markup(&HighlightResult {
            markup: "<span class=\"text plain\">a b\n</span>".into(),
            resolved_language: "plaintext".into(),
            resolution: crate::language::Resolution::Forced,
        });

        let cmds = paint_surface(&surface);
        assert_eq!(cmds.len(), 3);
        match &cmds[0] {
            PaintCommand::SolidRect { rgba, .. } => assert_eq!(*rgba, Rgba::new(1, 2, 3, 255)),
            other => panic!("unexpected {:?}", other),
        }
        match (&cmds[1], &cmds[2]) {
            (PaintCommand::Glyph { x: x0, ch: 'a', .. }, PaintCommand::Glyph { x: x1, ch: 'b', .. }) => {
                assert_eq!(*x0, 10.0);
                // 'b' sits two cells to the right, past the space
                assert!((x1 - x0 - 12.0).abs() < 1e-4);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn transparent_background_paints_nothing_behind_text() {
        let themes = ThemeCatalog::load();
        let style = ContainerStyle { background: None, ..ContainerStyle::default() };
        let surface = PreviewSurface::new(style, themes.resolve("InspiredGitHub"));
        assert!(paint_surface(&surface).is_empty());
    }
}
