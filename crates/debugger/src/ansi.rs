//! Translate ANSI SGR escapes in debuggee output into colour spans.
//!
//! Only the subset Node's console uses is interpreted. Escape sequences are
//! parsed strictly: digits accumulate into the current code, `;` commits it,
//! `m` commits and applies every code. Anything else ends the escape and
//! the bytes read so far are kept as literal text.

use std::ops::Range;

const ESCAPE: &str = "\x1b[";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl Color {
    fn from_offset(offset: u32) -> Color {
        match offset {
            0 => Color::Black,
            1 => Color::Red,
            2 => Color::Green,
            3 => Color::Yellow,
            4 => Color::Blue,
            5 => Color::Magenta,
            6 => Color::Cyan,
            _ => Color::White,
        }
    }
}

/// Text in `range` (byte offsets into [`TranslatedOutput::text`]) is drawn
/// in `color`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorSpan {
    pub range: Range<usize>,
    pub color: Color,
    pub bright: bool,
}

/// Output text with the escapes removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslatedOutput {
    pub text: String,
    pub spans: Vec<ColorSpan>,
}

impl TranslatedOutput {
    fn push(&mut self, text: &str, color: Color, bright: bool) {
        if text.is_empty() {
            return;
        }
        let start = self.text.len();
        self.text.push_str(text);
        let end = self.text.len();
        if let Some(last) = self.spans.last_mut() {
            if last.color == color && last.bright == bright && last.range.end == start {
                last.range.end = end;
                return;
            }
        }
        self.spans.push(ColorSpan {
            range: start..end,
            color,
            bright,
        });
    }
}

/// Stateful translator; the current colour carries over between chunks of
/// the same stream.
#[derive(Debug, Clone, Default)]
pub struct AnsiTranslator {
    color: Color,
    bright: bool,
}

impl AnsiTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn translate(&mut self, chunk: &str) -> TranslatedOutput {
        let mut out = TranslatedOutput::default();
        let mut rest = chunk;
        while let Some(start) = rest.find(ESCAPE) {
            out.push(&rest[..start], self.color, self.bright);
            let after = &rest[start + ESCAPE.len()..];
            match parse_sgr(after) {
                Some((codes, consumed)) => {
                    for code in codes {
                        self.apply(code);
                    }
                    rest = &after[consumed..];
                }
                None => {
                    let literal_end = start + ESCAPE.len() + digits_and_separators(after);
                    out.push(&rest[start..literal_end], self.color, self.bright);
                    rest = &rest[literal_end..];
                }
            }
        }
        out.push(rest, self.color, self.bright);
        out
    }

    fn apply(&mut self, code: u32) {
        match code {
            0 => {
                self.color = Color::Default;
                self.bright = false;
            }
            1 => self.bright = true,
            21 | 22 => self.bright = false,
            30..=37 => self.color = Color::from_offset(code - 30),
            38 | 39 => self.color = Color::Default,
            90..=97 => {
                self.color = Color::from_offset(code - 90);
                self.bright = true;
            }
            // Italic, underline, blink, inverse, conceal and anything else
            // leave the colour alone.
            _ => {}
        }
    }
}

/// Parse `[digits][;digits]*m`, returning the codes and the bytes consumed
/// including the terminator.
fn parse_sgr(input: &str) -> Option<(Vec<u32>, usize)> {
    let mut codes = Vec::new();
    let mut current: u32 = 0;
    for (i, b) in input.bytes().enumerate() {
        match b {
            b'0'..=b'9' => {
                current = current.saturating_mul(10).saturating_add(u32::from(b - b'0'));
            }
            b';' => {
                codes.push(current);
                current = 0;
            }
            b'm' => {
                codes.push(current);
                return Some((codes, i + 1));
            }
            _ => return None,
        }
    }
    None
}

fn digits_and_separators(input: &str) -> usize {
    input
        .bytes()
        .take_while(|b| b.is_ascii_digit() || *b == b';')
        .count()
}
