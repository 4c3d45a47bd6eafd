//! VT100/ANSI byte-stream parser. Feeds C0 controls, CSI sequences, and OSC
//! strings into a [`Terminal`].

use crate::term::cell::Color;
use crate::term::terminal::Terminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Ground,
    Escape,
    Csi,
    Osc,
}

/// Incremental parser holding partial-sequence state across `feed` calls.
pub struct AnsiParser {
    state: ParserState,
    params: Vec<u32>,
    current_param: Option<u32>,
    intermediate: Vec<u8>,
    osc_buf: Vec<u8>,
}

impl Default for AnsiParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AnsiParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Ground,
            params: Vec::new(),
            current_param: None,
            intermediate: Vec::new(),
            osc_buf: Vec::new(),
        }
    }

    fn reset_sequence(&mut self) {
        self.params.clear();
        self.current_param = None;
        self.intermediate.clear();
        self.osc_buf.clear();
        self.state = ParserState::Ground;
    }

    fn push_param_digit(&mut self, d: u32) {
        let cur = self.current_param.get_or_insert(0);
        *cur = cur.saturating_mul(10).saturating_add(d);
    }

    fn end_param(&mut self) {
        self.params.push(self.current_param.take().unwrap_or(0));
    }

    fn param(&self, idx: usize, default: u32) -> u32 {
        match self.params.get(idx) {
            Some(0) | None => default,
            Some(&v) => v,
        }
    }

    /// Feed one byte into the parser, applying any completed effect to `term`.
    pub fn feed_byte(&mut self, term: &mut Terminal, b: u8) {
        match self.state {
            ParserState::Ground => self.feed_ground(term, b),
            ParserState::Escape => self.feed_escape(term, b),
            ParserState::Csi => self.feed_csi(term, b),
            ParserState::Osc => self.feed_osc(term, b),
        }
    }

    pub fn feed(&mut self, term: &mut Terminal, bytes: &[u8]) {
        for &b in bytes {
            self.feed_byte(term, b);
        }
    }

    fn feed_ground(&mut self, term: &mut Terminal, b: u8) {
        match b {
            0x1b => self.state = ParserState::Escape,
            0x07 => {} // BEL, no-op in this simulation
            0x08 | b'\t' | b'\r' | b'\n' => term.write_char(b as char),
            0x0b | 0x0c => term.line_feed(),
            _ => {
                if let Some(ch) = char::from_u32(b as u32) {
                    term.write_char(ch);
                }
            }
        }
    }

    fn feed_escape(&mut self, term: &mut Terminal, b: u8) {
        match b {
            b'[' => {
                self.params.clear();
                self.current_param = None;
                self.intermediate.clear();
                self.state = ParserState::Csi;
            }
            b']' => {
                self.osc_buf.clear();
                self.state = ParserState::Osc;
            }
            b'7' => {
                term.save_cursor();
                self.reset_sequence();
            }
            b'8' => {
                term.restore_cursor();
                self.reset_sequence();
            }
            b'D' => {
                term.line_feed();
                self.reset_sequence();
            }
            b'M' => {
                term.reverse_index();
                self.reset_sequence();
            }
            b'E' => {
                term.cursor.col = 0;
                term.line_feed();
                self.reset_sequence();
            }
            b'=' => {
                term.application_keypad = true;
                self.reset_sequence();
            }
            b'>' => {
                term.application_keypad = false;
                self.reset_sequence();
            }
            _ => self.reset_sequence(),
        }
    }

    fn feed_csi(&mut self, term: &mut Terminal, b: u8) {
        match b {
            b'0'..=b'9' => self.push_param_digit((b - b'0') as u32),
            b';' => self.end_param(),
            0x20..=0x2f | 0x3c..=0x3f => self.intermediate.push(b),
            0x40..=0x7e => {
                self.end_param();
                self.dispatch_csi(term, b);
                self.reset_sequence();
            }
            _ => self.reset_sequence(),
        }
    }

    fn feed_osc(&mut self, term: &mut Terminal, b: u8) {
        match b {
            0x07 => {
                self.apply_osc(term);
                self.reset_sequence();
            }
            0x1b => {
                // expect a following '\\' (ST); applied eagerly either way
                self.apply_osc(term);
                self.reset_sequence();
            }
            _ => self.osc_buf.push(b),
        }
    }

    fn apply_osc(&mut self, term: &mut Terminal) {
        let s = String::from_utf8_lossy(&self.osc_buf);
        // "<code>;<text>" - only title-setting codes (0, 1, 2) are honored.
        if let Some((code, text)) = s.split_once(';') {
            if matches!(code, "0" | "1" | "2") {
                term.title = text.to_string();
            }
        }
    }

    fn dispatch_csi(&mut self, term: &mut Terminal, final_byte: u8) {
        match final_byte {
            b'A' => term.move_cursor(term.cursor.col, term.cursor.row.saturating_sub(self.param(0, 1) as usize)),
            b'B' => term.move_cursor(term.cursor.col, term.cursor.row + self.param(0, 1) as usize),
            b'C' => term.move_cursor(term.cursor.col + self.param(0, 1) as usize, term.cursor.row),
            b'D' => term.move_cursor(term.cursor.col.saturating_sub(self.param(0, 1) as usize), term.cursor.row),
            b'E' => term.move_cursor(0, term.cursor.row + self.param(0, 1) as usize),
            b'F' => term.move_cursor(0, term.cursor.row.saturating_sub(self.param(0, 1) as usize)),
            b'G' | b'`' => {
                let col = self.param(0, 1).saturating_sub(1) as usize;
                term.move_cursor(col, term.cursor.row)
            }
            b'd' => {
                let row = self.param(0, 1).saturating_sub(1) as usize;
                term.move_cursor(term.cursor.col, row)
            }
            b'H' | b'f' => {
                let row = self.param(0, 1).saturating_sub(1) as usize;
                let col = self.param(1, 1).saturating_sub(1) as usize;
                term.move_cursor(col, row)
            }
            b'J' => match self.param(0, 0) {
                0 => term.screen.clear_to_eos(term.cursor.col, term.cursor.row),
                1 => term.screen.clear_to_bos(term.cursor.col, term.cursor.row),
                _ => term.screen.clear_all(),
            },
            b'K' => match self.param(0, 0) {
                0 => term.screen.clear_to_eol(term.cursor.col, term.cursor.row),
                1 => term.screen.clear_to_bol(term.cursor.col, term.cursor.row),
                _ => term.screen.clear_line(term.cursor.row),
            },
            b'L' => term.screen.insert_lines(term.cursor.row, self.param(0, 1) as usize),
            b'M' => term.screen.delete_lines(term.cursor.row, self.param(0, 1) as usize),
            b'P' => term
                .screen
                .delete_chars(term.cursor.col, term.cursor.row, self.param(0, 1) as usize),
            b'@' => term
                .screen
                .insert_chars(term.cursor.col, term.cursor.row, self.param(0, 1) as usize),
            b'X' => term
                .screen
                .erase_chars(term.cursor.col, term.cursor.row, self.param(0, 1) as usize),
            b'S' => {
                for _ in 0..self.param(0, 1) {
                    term.screen.scroll_up(term.scroll_top, term.scroll_bottom);
                }
            }
            b'T' => {
                for _ in 0..self.param(0, 1) {
                    term.screen.scroll_down(term.scroll_top, term.scroll_bottom);
                }
            }
            b'r' => {
                let top = self.param(0, 1).saturating_sub(1) as usize;
                let bottom = self.param(1, term.rows() as u32).saturating_sub(1) as usize;
                term.set_scroll_region(top, bottom);
            }
            b's' => term.save_cursor(),
            b'u' => term.restore_cursor(),
            b'm' => self.apply_sgr(term),
            b'h' => self.apply_mode(term, true),
            b'l' => self.apply_mode(term, false),
            b'p' => self.soft_reset(term),
            b'n' | b'c' | b'g' | b'b' | b'Z' => {} // status reports / tab handling: no-op
            _ => {}
        }
    }

    /// DECSTR soft reset: clears SGR attributes, restores the full-screen
    /// scrolling region, and leaves keypad mode normal.
    fn soft_reset(&mut self, term: &mut Terminal) {
        term.attrs.reset();
        term.application_keypad = false;
        let bottom = term.rows().saturating_sub(1);
        term.set_scroll_region(0, bottom);
    }

    fn apply_mode(&mut self, term: &mut Terminal, enable: bool) {
        // DEC private mode 1 = application cursor keys / keypad, as used here.
        if self.intermediate.first() == Some(&b'?') && self.param(0, 0) == 1 {
            term.application_keypad = enable;
        }
    }

    fn apply_sgr(&mut self, term: &mut Terminal) {
        if self.params.is_empty() {
            term.attrs.reset();
            return;
        }
        let mut i = 0;
        while i < self.params.len() {
            let code = self.params[i];
            match code {
                0 => term.attrs.reset(),
                1 => term.attrs.bold = true,
                2 => term.attrs.faint = true,
                3 => term.attrs.italic = true,
                4 => term.attrs.underline = true,
                5 | 6 => term.attrs.blink = true,
                7 => term.attrs.reverse = true,
                8 => term.attrs.conceal = true,
                9 => term.attrs.crossed_out = true,
                21 => term.attrs.double_underline = true,
                22 => {
                    term.attrs.bold = false;
                    term.attrs.faint = false;
                }
                23 => term.attrs.italic = false,
                24 => {
                    term.attrs.underline = false;
                    term.attrs.double_underline = false;
                }
                25 => term.attrs.blink = false,
                27 => term.attrs.reverse = false,
                28 => term.attrs.conceal = false,
                29 => term.attrs.crossed_out = false,
                30..=37 => term.attrs.foreground = Color::Standard((code - 30) as u8),
                38 => {
                    i += self.apply_extended_color(&mut term.attrs, true, i);
                    continue;
                }
                39 => term.attrs.foreground = Color::Default,
                40..=47 => term.attrs.background = Color::Standard((code - 40) as u8),
                48 => {
                    i += self.apply_extended_color(&mut term.attrs, false, i);
                    continue;
                }
                49 => term.attrs.background = Color::Default,
                90..=97 => term.attrs.foreground = Color::Bright((code - 90) as u8),
                100..=107 => term.attrs.background = Color::Bright((code - 100) as u8),
                _ => {}
            }
            i += 1;
        }
    }

    /// Handles `38;5;n` (256-color) and `38;2;r;g;b` (truecolor), same for 48.
    /// Returns how many params were consumed starting at `i` (the `38`/`48`
    /// itself plus its sub-parameters).
    fn apply_extended_color(
        &self,
        attrs: &mut crate::term::cell::Attributes,
        foreground: bool,
        i: usize,
    ) -> usize {
        match self.params.get(i + 1) {
            Some(5) => {
                let n = *self.params.get(i + 2).unwrap_or(&0) as u8;
                let color = Color::Palette256(n);
                if foreground {
                    attrs.foreground = color;
                } else {
                    attrs.background = color;
                }
                3
            }
            Some(2) => {
                let r = *self.params.get(i + 2).unwrap_or(&0) as u8;
                let g = *self.params.get(i + 3).unwrap_or(&0) as u8;
                let b = *self.params.get(i + 4).unwrap_or(&0) as u8;
                let color = Color::TrueColor(r, g, b);
                if foreground {
                    attrs.foreground = color;
                } else {
                    attrs.background = color;
                }
                5
            }
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(parser: &mut AnsiParser, term: &mut Terminal, s: &str) {
        parser.feed(term, s.as_bytes());
    }

    #[test]
    fn plain_text_writes_through() {
        let mut term = Terminal::new(10, 5, 100);
        let mut parser = AnsiParser::new();
        run(&mut parser, &mut term, "hi");
        assert_eq!(term.screen.get_cell(0, 0).unwrap().ch, 'h');
        assert_eq!(term.screen.get_cell(1, 0).unwrap().ch, 'i');
    }

    #[test]
    fn csi_cup_moves_cursor() {
        let mut term = Terminal::new(10, 10, 100);
        let mut parser = AnsiParser::new();
        run(&mut parser, &mut term, "\x1b[3;4H");
        assert_eq!((term.cursor.col, term.cursor.row), (3, 2));
    }

    #[test]
    fn sgr_bold_and_256_color_set_attributes() {
        let mut term = Terminal::new(10, 10, 100);
        let mut parser = AnsiParser::new();
        run(&mut parser, &mut term, "\x1b[1;38;5;200m");
        assert!(term.attrs.bold);
        assert_eq!(term.attrs.foreground, Color::Palette256(200));
    }

    #[test]
    fn sgr_truecolor_background() {
        let mut term = Terminal::new(10, 10, 100);
        let mut parser = AnsiParser::new();
        run(&mut parser, &mut term, "\x1b[48;2;10;20;30m");
        assert_eq!(term.attrs.background, Color::TrueColor(10, 20, 30));
    }

    #[test]
    fn sgr_reset_clears_attributes() {
        let mut term = Terminal::new(10, 10, 100);
        let mut parser = AnsiParser::new();
        run(&mut parser, &mut term, "\x1b[1m\x1b[0m");
        assert_eq!(term.attrs, crate::term::cell::Attributes::default());
    }

    #[test]
    fn osc_sets_title() {
        let mut term = Terminal::new(10, 10, 100);
        let mut parser = AnsiParser::new();
        run(&mut parser, &mut term, "\x1b]2;my title\x07");
        assert_eq!(term.title, "my title");
    }

    #[test]
    fn csi_erase_display_clears_to_end() {
        let mut term = Terminal::new(5, 2, 100);
        let mut parser = AnsiParser::new();
        run(&mut parser, &mut term, "abcde\x1b[1;1H\x1b[0J");
        assert!(term.screen.get_cell(0, 0).unwrap().is_empty());
    }

    #[test]
    fn set_scroll_region_via_csi_r() {
        let mut term = Terminal::new(10, 10, 100);
        let mut parser = AnsiParser::new();
        run(&mut parser, &mut term, "\x1b[2;5r");
        assert_eq!(term.scroll_top, 1);
        assert_eq!(term.scroll_bottom, 4);
    }

    #[test]
    fn dec_private_mode_sets_application_keypad() {
        let mut term = Terminal::new(10, 10, 100);
        let mut parser = AnsiParser::new();
        run(&mut parser, &mut term, "\x1b[?1h");
        assert!(term.application_keypad);
        run(&mut parser, &mut term, "\x1b[?1l");
        assert!(!term.application_keypad);
    }

    #[test]
    fn dec_private_mode_sequence_does_not_leak_as_text() {
        let mut term = Terminal::new(20, 5, 100);
        let mut parser = AnsiParser::new();
        run(&mut parser, &mut term, "\x1b[?1049h");
        assert!(term.screen.get_cell(0, 0).unwrap().is_empty());
    }

    #[test]
    fn csi_p_soft_resets_attributes_and_scroll_region() {
        let mut term = Terminal::new(10, 10, 100);
        let mut parser = AnsiParser::new();
        run(&mut parser, &mut term, "\x1b[2;5r\x1b[1m\x1b[p");
        assert_eq!(term.attrs, crate::term::cell::Attributes::default());
        assert_eq!(term.scroll_top, 0);
        assert_eq!(term.scroll_bottom, 9);
    }
}
