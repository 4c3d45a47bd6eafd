//! A single terminal cell: a code point plus SGR-derived attributes.

/// A terminal color, as set by SGR parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Default,
    Standard(u8),
    Bright(u8),
    Palette256(u8),
    TrueColor(u8, u8, u8),
}

impl Default for Color {
    fn default() -> Self {
        Color::Default
    }
}

/// Formatting attributes attached to a cell, set and cleared by SGR codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attributes {
    pub bold: bool,
    pub faint: bool,
    pub italic: bool,
    pub underline: bool,
    pub double_underline: bool,
    pub blink: bool,
    pub reverse: bool,
    pub conceal: bool,
    pub crossed_out: bool,
    pub foreground: Color,
    pub background: Color,
}

impl Attributes {
    pub fn reset(&mut self) {
        *self = Attributes::default();
    }
}

/// A single screen cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub attrs: Attributes,
}

impl Cell {
    pub fn blank() -> Self {
        Self {
            ch: ' ',
            attrs: Attributes::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ch == ' ' || self.ch == '\0'
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_cell_is_empty() {
        assert!(Cell::blank().is_empty());
    }

    #[test]
    fn reset_clears_all_attributes() {
        let mut attrs = Attributes {
            bold: true,
            foreground: Color::Standard(1),
            ..Default::default()
        };
        attrs.reset();
        assert_eq!(attrs, Attributes::default());
    }
}
