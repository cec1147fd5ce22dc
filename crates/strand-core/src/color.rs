//! CSS-style color strings used by strand styles.
//!
//! Accepts `#RGB`, `#RRGGBB`, `#RRGGBBAA`, `rgb(r, g, b)` and
//! `rgba(r, g, b, a)`. Styles keep the original string; this parser is
//! only used where a renderer needs the channels split out (SVG has no
//! alpha in `stroke`, so alpha goes to `stroke-opacity`).

use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{alt, delimited, opt, preceded, terminated};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::take_while;

/// 8-bit RGB plus floating alpha in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Parse a color string. Surrounding whitespace is ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let mut input = s.trim();
        let color = parse_color.parse_next(&mut input).ok()?;
        input.is_empty().then_some(color)
    }

    /// `#rrggbb`, alpha dropped.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn is_opaque(&self) -> bool {
        self.a >= 1.0
    }
}

fn parse_color(input: &mut &str) -> ModalResult<Color> {
    alt((parse_hex_color, parse_rgba_fn, parse_rgb_fn)).parse_next(input)
}

fn parse_hex_color(input: &mut &str) -> ModalResult<Color> {
    let digits: &str = preceded('#', take_while(3..=8, |c: char| c.is_ascii_hexdigit()))
        .parse_next(input)?;
    hex_channels(digits).ok_or_else(|| winnow::error::ErrMode::Backtrack(ContextError::new()))
}

fn hex_channels(digits: &str) -> Option<Color> {
    let nibble = |i: usize| u8::from_str_radix(&digits[i..=i], 16).ok();
    let byte = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    match digits.len() {
        3 => Some(Color::rgb(
            nibble(0)? * 17,
            nibble(1)? * 17,
            nibble(2)? * 17,
        )),
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::rgba(
            byte(0)?,
            byte(2)?,
            byte(4)?,
            f64::from(byte(6)?) / 255.0,
        )),
        _ => None,
    }
}

fn parse_channel(input: &mut &str) -> ModalResult<u8> {
    delimited(multispace0, digit1, multispace0)
        .try_map(|s: &str| s.parse::<u16>().map(|v| v.min(255) as u8))
        .parse_next(input)
}

fn parse_alpha(input: &mut &str) -> ModalResult<f64> {
    let start = *input;
    let _ = multispace0.parse_next(input)?;
    let body = *input;
    let _ = opt(digit1).parse_next(input)?;
    let _ = opt(preceded('.', digit1)).parse_next(input)?;
    let matched = &body[..body.len() - input.len()];
    let _ = multispace0.parse_next(input)?;
    match matched.parse::<f64>() {
        Ok(a) => Ok(a.clamp(0.0, 1.0)),
        Err(_) => {
            *input = start;
            Err(winnow::error::ErrMode::Backtrack(ContextError::new()))
        }
    }
}

fn parse_rgb_fn(input: &mut &str) -> ModalResult<Color> {
    let _ = "rgb(".parse_next(input)?;
    let r = terminated(parse_channel, ',').parse_next(input)?;
    let g = terminated(parse_channel, ',').parse_next(input)?;
    let b = terminated(parse_channel, ')').parse_next(input)?;
    Ok(Color::rgb(r, g, b))
}

fn parse_rgba_fn(input: &mut &str) -> ModalResult<Color> {
    let _ = "rgba(".parse_next(input)?;
    let r = terminated(parse_channel, ',').parse_next(input)?;
    let g = terminated(parse_channel, ',').parse_next(input)?;
    let b = terminated(parse_channel, ',').parse_next(input)?;
    let a = terminated(parse_alpha, ')').parse_next(input)?;
    Ok(Color::rgba(r, g, b, a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_hex_forms() {
        assert_eq!(Color::parse("#000"), Some(Color::BLACK));
        assert_eq!(Color::parse("#C8AAE6"), Some(Color::rgb(200, 170, 230)));
        let c = Color::parse("#00000096").unwrap();
        assert_eq!((c.r, c.g, c.b), (0, 0, 0));
        assert!((c.a - 150.0 / 255.0).abs() < 1e-12);
    }

    #[test]
    fn parses_functional_forms() {
        assert_eq!(Color::parse("rgb(10, 20, 30)"), Some(Color::rgb(10, 20, 30)));
        assert_eq!(
            Color::parse("rgba(0, 0, 0, 0.5)"),
            Some(Color::rgba(0, 0, 0, 0.5))
        );
        assert_eq!(Color::parse("rgba(0,0,0,1)"), Some(Color::BLACK));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(Color::parse("#12"), None);
        assert_eq!(Color::parse("#12345"), None);
        assert_eq!(Color::parse("blue"), None);
        assert_eq!(Color::parse("rgb(1, 2)"), None);
        assert_eq!(Color::parse("#fff trailing"), None);
    }

    #[test]
    fn hex_output_is_lowercase_six_digits() {
        assert_eq!(Color::rgb(200, 170, 230).to_hex(), "#c8aae6");
        assert_eq!(Color::WHITE.to_hex(), "#ffffff");
    }
}
