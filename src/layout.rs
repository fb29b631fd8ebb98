//! Page geometry and watermark placement
//!
//! All values are PDF user-space units (points, 1/72 inch) with the origin at
//! the bottom-left corner of the page.

use lopdf::Object;
use crate::error::{Error, Result};

/// A page rectangle, as found in a MediaBox entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl PageBox {
    /// US Letter size (8.5" × 11"), used when a page declares no MediaBox
    pub fn letter() -> Self {
        Self { llx: 0.0, lly: 0.0, urx: 612.0, ury: 792.0 }
    }

    /// A4 size (210mm × 297mm)
    pub fn a4() -> Self {
        Self { llx: 0.0, lly: 0.0, urx: 595.0, ury: 842.0 }
    }

    /// Build from a `[llx lly urx ury]` array
    ///
    /// Corners may be given in any order; they are normalized so that
    /// `llx <= urx` and `lly <= ury`.
    pub fn from_array(values: &[Object]) -> Result<Self> {
        if values.len() != 4 {
            return Err(Error::General(format!(
                "MediaBox must have 4 entries, found {}",
                values.len()
            )));
        }

        let mut nums = [0.0f32; 4];
        for (slot, value) in nums.iter_mut().zip(values) {
            *slot = value
                .as_float()
                .map_err(|_| Error::General(format!("MediaBox entry is not a number: {:?}", value)))?;
        }

        Ok(Self {
            llx: nums[0].min(nums[2]),
            lly: nums[1].min(nums[3]),
            urx: nums[0].max(nums[2]),
            ury: nums[1].max(nums[3]),
        })
    }

    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }

    pub fn center(&self) -> (f32, f32) {
        (self.llx + self.width() / 2.0, self.lly + self.height() / 2.0)
    }

    pub fn to_array(&self) -> Vec<Object> {
        vec![
            Object::Real(self.llx),
            Object::Real(self.lly),
            Object::Real(self.urx),
            Object::Real(self.ury),
        ]
    }
}

/// Fraction of the font size the text is shifted down so that the visual
/// middle of capital letters, rather than the baseline, sits on the center.
const CAP_HEIGHT_HALF: f32 = 0.36;

/// Text matrix `[a b c d e f]` for a `Tm` operator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMatrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl TextMatrix {
    /// Matrix that draws a line of `text_width` points rotated by `angle_degrees`
    /// with its middle on the center of `page`.
    pub fn centered(page: &PageBox, text_width: f32, font_size: f32, angle_degrees: f32) -> Self {
        let (cx, cy) = page.center();
        let (sin, cos) = angle_degrees.to_radians().sin_cos();

        // Offset from the text's middle to its baseline start, in text space,
        // then rotated into page space.
        let dx = -text_width / 2.0;
        let dy = -font_size * CAP_HEIGHT_HALF;

        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: cx + cos * dx - sin * dy,
            f: cy + sin * dx + cos * dy,
        }
    }

    /// Format as PDF content stream operands followed by `Tm`
    pub fn to_operator(&self) -> String {
        format!(
            "{:.4} {:.4} {:.4} {:.4} {:.2} {:.2} Tm",
            self.a, self.b, self.c, self.d, self.e, self.f
        )
    }
}

/// Helvetica glyph width in 1/1000 em for a WinAnsi byte
fn helvetica_width(byte: u8) -> u16 {
    match byte {
        b' ' | b'!' | b',' | b'.' | b'/' | b':' | b';' | b'[' | b'\\' | b']' | b'f' | b't' => 278,
        b'"' => 355,
        b'#' | b'$' | b'0'..=b'9' | b'?' | b'_' => 556,
        b'%' => 889,
        b'&' => 667,
        b'\'' => 191,
        b'(' | b')' | b'-' | b'`' | b'r' => 333,
        b'*' => 389,
        b'+' | b'<' | b'=' | b'>' | b'~' => 584,
        b'@' => 1015,
        b'A' | b'B' | b'E' | b'K' | b'P' | b'S' | b'V' | b'X' | b'Y' => 667,
        b'C' | b'D' | b'H' | b'N' | b'R' | b'U' => 722,
        b'F' | b'T' | b'Z' => 611,
        b'G' | b'O' | b'Q' => 778,
        b'I' => 278,
        b'J' => 500,
        b'L' => 556,
        b'M' | b'm' => 833,
        b'W' => 944,
        b'^' => 469,
        b'a' | b'b' | b'd' | b'e' | b'g' | b'h' | b'n' | b'o' | b'p' | b'q' | b'u' => 556,
        b'c' | b'k' | b's' | b'v' | b'x' | b'y' | b'z' => 500,
        b'i' | b'j' | b'l' => 222,
        b'w' => 722,
        b'{' | b'}' => 334,
        b'|' => 260,
        _ => 556,
    }
}

/// Width in points of WinAnsi-encoded text set in Helvetica at `font_size`
pub fn text_width(encoded: &[u8], font_size: f32) -> f32 {
    let units: u32 = encoded.iter().map(|&b| helvetica_width(b) as u32).sum();
    units as f32 * font_size / 1000.0
}
