//! The terminal: cursor, scrolling region, SGR state, modes, and the output
//! ring buffer the PTY master reads from.

use std::collections::VecDeque;

use crate::term::cell::{Attributes, Cell};
use crate::term::screen::ScreenBuffer;

#[derive(Debug, Clone, Copy, Default)]
pub struct Cursor {
    pub col: usize,
    pub row: usize,
}

/// VT100/xterm-compatible terminal state layered on top of [`ScreenBuffer`].
pub struct Terminal {
    pub screen: ScreenBuffer,
    pub cursor: Cursor,
    saved_cursor: Option<Cursor>,
    pub scroll_top: usize,
    pub scroll_bottom: usize,
    pub attrs: Attributes,
    pub application_keypad: bool,
    pub title: String,
    output: VecDeque<u8>,
    output_cap: usize,
}

impl Terminal {
    pub fn new(cols: usize, rows: usize, scrollback_bound: usize) -> Self {
        Self {
            screen: ScreenBuffer::new(cols, rows, scrollback_bound),
            cursor: Cursor::default(),
            saved_cursor: None,
            scroll_top: 0,
            scroll_bottom: rows.saturating_sub(1),
            attrs: Attributes::default(),
            application_keypad: false,
            title: String::new(),
            output: VecDeque::new(),
            output_cap: 1 << 16,
        }
    }

    pub fn cols(&self) -> usize {
        self.screen.width()
    }

    pub fn rows(&self) -> usize {
        self.screen.height()
    }

    pub fn resize(&mut self, cols: usize, rows: usize) {
        self.screen.resize(cols, rows);
        self.scroll_bottom = rows.saturating_sub(1);
        self.cursor.col = self.cursor.col.min(cols.saturating_sub(1));
        self.cursor.row = self.cursor.row.min(rows.saturating_sub(1));
    }

    pub fn save_cursor(&mut self) {
        self.saved_cursor = Some(self.cursor);
    }

    pub fn restore_cursor(&mut self) {
        if let Some(c) = self.saved_cursor {
            self.cursor = c;
        }
    }

    pub fn set_scroll_region(&mut self, top: usize, bottom: usize) {
        let bottom = bottom.min(self.rows().saturating_sub(1));
        if top <= bottom {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        }
    }

    /// Clamp the cursor row to the active scrolling region.
    fn clamp_cursor(&mut self) {
        self.cursor.col = self.cursor.col.min(self.cols().saturating_sub(1));
        self.cursor.row = self.cursor.row.clamp(self.scroll_top, self.scroll_bottom);
    }

    pub fn move_cursor(&mut self, col: usize, row: usize) {
        self.cursor.col = col;
        self.cursor.row = row;
        self.clamp_cursor();
    }

    fn scroll_up_region(&mut self) {
        self.screen.scroll_up(self.scroll_top, self.scroll_bottom);
    }

    /// Write one character at the cursor, advancing it. Wraps to the next
    /// line at end-of-line; scrolls the region up by one if that overflows.
    pub fn write_char(&mut self, ch: char) {
        match ch {
            '\n' => {
                self.line_feed();
                return;
            }
            '\r' => {
                self.cursor.col = 0;
                return;
            }
            '\x08' => {
                self.cursor.col = self.cursor.col.saturating_sub(1);
                return;
            }
            '\t' => {
                self.cursor.col = ((self.cursor.col / 8) + 1) * 8;
                if self.cursor.col >= self.cols() {
                    self.cursor.col = self.cols().saturating_sub(1);
                }
                return;
            }
            _ => {}
        }

        let cell = Cell { ch, attrs: self.attrs };
        self.screen.set_cell(self.cursor.col, self.cursor.row, cell);
        self.cursor.col += 1;
        if self.cursor.col >= self.cols() {
            self.cursor.col = 0;
            self.line_feed();
        }
    }

    pub fn line_feed(&mut self) {
        if self.cursor.row == self.scroll_bottom {
            self.scroll_up_region();
        } else {
            self.cursor.row += 1;
        }
    }

    pub fn reverse_index(&mut self) {
        if self.cursor.row == self.scroll_top {
            self.screen.scroll_down(self.scroll_top, self.scroll_bottom);
        } else {
            self.cursor.row = self.cursor.row.saturating_sub(1);
        }
    }

    /// Append bytes for the PTY master to drain, trimming the oldest bytes
    /// if the output ring buffer is full.
    pub fn push_output(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.output.len() >= self.output_cap {
                self.output.pop_front();
            }
            self.output.push_back(b);
        }
    }

    pub fn drain_output(&mut self, max: usize) -> Vec<u8> {
        let n = max.min(self.output.len());
        self.output.drain(..n).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_char_advances_cursor() {
        let mut term = Terminal::new(10, 5, 100);
        term.write_char('a');
        assert_eq!(term.cursor.col, 1);
        assert_eq!(term.screen.get_cell(0, 0).unwrap().ch, 'a');
    }

    #[test]
    fn write_past_end_of_line_wraps_and_scrolls_if_needed() {
        let mut term = Terminal::new(2, 2, 100);
        term.write_char('a');
        term.write_char('b'); // fills row 0, wraps
        assert_eq!(term.cursor.row, 1);
        assert_eq!(term.cursor.col, 0);
    }

    #[test]
    fn scroll_region_clamps_cursor_movement() {
        let mut term = Terminal::new(10, 10, 100);
        term.set_scroll_region(2, 5);
        term.move_cursor(0, 8);
        assert_eq!(term.cursor.row, 5);
        term.move_cursor(0, 0);
        assert_eq!(term.cursor.row, 2);
    }

    #[test]
    fn save_and_restore_cursor_roundtrips() {
        let mut term = Terminal::new(10, 10, 100);
        term.move_cursor(3, 4);
        term.save_cursor();
        term.move_cursor(0, 0);
        term.restore_cursor();
        assert_eq!((term.cursor.col, term.cursor.row), (3, 4));
    }

    #[test]
    fn output_ring_buffer_drains_in_fifo_order() {
        let mut term = Terminal::new(10, 10, 100);
        term.push_output(b"hello");
        assert_eq!(term.drain_output(3), b"hel");
        assert_eq!(term.drain_output(10), b"lo");
    }
}
