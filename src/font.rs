//! Typeface JSON fonts.
//!
//! Glyph outlines are strings of drawing commands in font units:
//! `m x y` (move), `l x y` (line), `q x y cx cy` (quadratic, end point
//! first) and `b x y c1x c1y c2x c2y` (cubic, end point first).

use std::collections::HashMap;
use serde::Deserialize;
use three_d::{vec2, Vec2};

use crate::error::LoadError;


#[derive(Clone, Debug, Deserialize)]
pub struct Glyph {
    /// Horizontal advance
    pub ha: f32,
    #[serde(default)]
    pub x_min: Option<f32>,
    #[serde(default)]
    pub x_max: Option<f32>,
    /// Outline commands; absent for blank glyphs such as space
    #[serde(default)]
    pub o: Option<String>,
}


#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}


#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypefaceFont {
    #[serde(default)]
    pub family_name: String,
    pub resolution: f32,
    pub glyphs: HashMap<String, Glyph>,
    #[serde(default)]
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub underline_thickness: f32,
}


/// One outline command with absolute coordinates in font units
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    MoveTo(Vec2),
    LineTo(Vec2),
    QuadTo { control: Vec2, to: Vec2 },
    CubicTo { control1: Vec2, control2: Vec2, to: Vec2 },
}


impl TypefaceFont {
    pub fn from_slice(url: &str, bytes: &[u8]) -> Result<Self, LoadError> {
        let font: TypefaceFont = serde_json::from_slice(bytes).map_err(|e| LoadError::Font {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if !(font.resolution > 0.0) {
            return Err(LoadError::Font {
                url: url.to_string(),
                message: format!("resolution must be positive, got {}", font.resolution),
            });
        }
        Ok(font)
    }

    pub fn glyph(&self, c: char) -> Option<&Glyph> {
        let mut buf = [0u8; 4];
        self.glyphs.get(c.encode_utf8(&mut buf) as &str)
    }

    /// Distance between baselines for text of the given size
    pub fn line_height(&self, size: f32) -> f32 {
        let bb = &self.bounding_box;
        (bb.y_max - bb.y_min + self.underline_thickness) * size / self.resolution
    }

    /// Flattens `text` into closed contours scaled to `size`.
    ///
    /// Each curve is split into `curve_segments` straight pieces. Missing
    /// glyphs fall back to `?`; a newline starts the next line below.
    pub fn text_contours(&self, text: &str, size: f32, curve_segments: u32) -> Vec<Vec<Vec2>> {
        let scale = size / self.resolution;
        let line_height = self.line_height(size);
        let mut contours = Vec::new();
        let mut offset = vec2(0.0, 0.0);

        for c in text.chars() {
            if c == '\n' {
                offset.x = 0.0;
                offset.y -= line_height;
                continue;
            }
            let glyph = match self.glyph(c).or_else(|| self.glyph('?')) {
                Some(glyph) => glyph,
                None => {
                    log::warn!("font {:?} has no glyph for {:?} and no fallback", self.family_name, c);
                    continue;
                }
            };
            if self.glyph(c).is_none() {
                log::warn!("font {:?} has no glyph for {:?}, using '?'", self.family_name, c);
            }
            if let Some(outline) = glyph.o.as_deref() {
                let commands = parse_outline(outline);
                contours.extend(flatten(&commands, scale, offset, curve_segments.max(1)));
            }
            offset.x += glyph.ha * scale;
        }
        contours
    }
}


/// Parses an outline string. Unknown tokens and truncated commands are skipped.
pub fn parse_outline(outline: &str) -> Vec<PathCommand> {
    let tokens: Vec<&str> = outline.split_whitespace().collect();
    let mut commands = Vec::new();
    let mut i = 0;

    // reads `n` numbers following the command at `i`
    let numbers = |i: usize, n: usize| -> Option<Vec<f32>> {
        if i + n >= tokens.len() {
            return None;
        }
        tokens[i + 1..=i + n].iter().map(|t| t.parse::<f32>().ok()).collect()
    };

    while i < tokens.len() {
        let arity = match tokens[i] {
            "m" | "l" => 2,
            "q" => 4,
            "b" => 6,
            "z" => 0,
            _ => {
                i += 1;
                continue;
            }
        };
        if let Some(v) = numbers(i, arity) {
            match tokens[i] {
                "m" => commands.push(PathCommand::MoveTo(vec2(v[0], v[1]))),
                "l" => commands.push(PathCommand::LineTo(vec2(v[0], v[1]))),
                "q" => commands.push(PathCommand::QuadTo {
                    to: vec2(v[0], v[1]),
                    control: vec2(v[2], v[3]),
                }),
                "b" => commands.push(PathCommand::CubicTo {
                    to: vec2(v[0], v[1]),
                    control1: vec2(v[2], v[3]),
                    control2: vec2(v[4], v[5]),
                }),
                _ => {}
            }
        }
        i += arity + 1;
    }
    commands
}


fn flatten(commands: &[PathCommand], scale: f32, offset: Vec2, segments: u32) -> Vec<Vec<Vec2>> {
    let mut contours: Vec<Vec<Vec2>> = Vec::new();
    let mut current: Vec<Vec2> = Vec::new();
    let map = |p: Vec2| vec2(p.x * scale + offset.x, p.y * scale + offset.y);

    for command in commands {
        match *command {
            PathCommand::MoveTo(p) => {
                if current.len() > 1 {
                    contours.push(std::mem::take(&mut current));
                }
                current.clear();
                current.push(map(p));
            }
            PathCommand::LineTo(p) => current.push(map(p)),
            PathCommand::QuadTo { control, to } => {
                let start = match current.last() {
                    Some(p) => *p,
                    None => continue,
                };
                let (c, e) = (map(control), map(to));
                for s in 1..=segments {
                    let t = s as f32 / segments as f32;
                    let u = 1.0 - t;
                    current.push(start * (u * u) + c * (2.0 * u * t) + e * (t * t));
                }
            }
            PathCommand::CubicTo { control1, control2, to } => {
                let start = match current.last() {
                    Some(p) => *p,
                    None => continue,
                };
                let (c1, c2, e) = (map(control1), map(control2), map(to));
                for s in 1..=segments {
                    let t = s as f32 / segments as f32;
                    let u = 1.0 - t;
                    current.push(
                        start * (u * u * u) + c1 * (3.0 * u * u * t) + c2 * (3.0 * u * t * t) + e * (t * t * t),
                    );
                }
            }
        }
    }
    if current.len() > 1 {
        contours.push(current);
    }
    contours
}
