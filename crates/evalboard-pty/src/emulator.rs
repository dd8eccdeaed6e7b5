#![forbid(unsafe_code)]

//! In-memory terminal emulator used to verify dashboard output.
//!
//! `TerminalEmulator` replays a raw output stream against a fixed grid of
//! characters and produces a text snapshot that depends only on where glyphs
//! finally landed, not on the escape sequences used to put them there.
//!
//! # Supported sequences
//!
//! | Sequence | Effect |
//! |----------|--------|
//! | `ESC 7` / `ESC 8`, `CSI s` / `CSI u` | Save / restore cursor (one slot) |
//! | `CSI n A/B/C/D` | Cursor up / down / forward / back |
//! | `CSI n E/F` | Next / previous line, column 0 |
//! | `CSI n G` | Absolute column (1-indexed) |
//! | `CSI r;c H`, `CSI r;c f` | Absolute position (1-indexed) |
//! | `CSI n d` | Absolute row (1-indexed) |
//! | `CSI n K` | Erase in line: to end, to start, whole line |
//! | `CSI n J` | Erase in display: to end, to start, whole screen |
//! | `CSI … m` | SGR: recognized, no visual state kept |
//! | `CSI ? 25 h/l` | Cursor visibility |
//! | `ESC ] … BEL` | OSC: consumed and ignored |
//!
//! Any other escape sequence is consumed and ignored.
//!
//! # Invariants
//!
//! 1. **Cursor in bounds**: `cursor_x <= width`, `cursor_y < height`. When
//!    `cursor_x == width` the next glyph wraps to the following line.
//! 2. **Grid fully populated**: `grid.len() == width * height`.
//! 3. **High-water mark tracks written rows**: it is the highest row that
//!    received a glyph, and moves up with the content when the grid scrolls.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unrecognized sequence | Unknown CSI/ESC final byte | Silently ignored |
//! | Malformed UTF-8 | Truncated or invalid sequence | One `U+FFFD` glyph |
//! | Line feed on last row | Output taller than the grid | Grid scrolls up one row |
//!
//! Every character occupies one cell; the dashboard only emits single-width
//! glyphs.

use std::io;

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Ground,
    Escape,
    Csi,
    Osc,
    /// Saw `ESC` inside an OSC string; `\` completes the terminator.
    OscEscape,
}

/// Incremental UTF-8 decoder for bytes arriving one at a time.
#[derive(Debug, Clone, Copy, Default)]
struct Utf8Decoder {
    buf: [u8; 4],
    len: usize,
    expected: usize,
}

impl Utf8Decoder {
    fn is_pending(&self) -> bool {
        self.expected > 0
    }

    fn start(&mut self, byte: u8) -> bool {
        let expected = match byte {
            0xc2..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf4 => 4,
            _ => return false,
        };
        self.buf[0] = byte;
        self.len = 1;
        self.expected = expected;
        true
    }

    /// Feed a continuation byte. Returns the decoded char once complete.
    fn push(&mut self, byte: u8) -> Option<char> {
        self.buf[self.len] = byte;
        self.len += 1;
        if self.len < self.expected {
            return None;
        }
        let decoded = std::str::from_utf8(&self.buf[..self.len])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        self.reset();
        Some(decoded)
    }

    fn reset(&mut self) {
        self.len = 0;
        self.expected = 0;
    }
}

/// Minimal ANSI terminal emulator over a fixed character grid.
///
/// # Example
///
/// ```
/// use evalboard_pty::TerminalEmulator;
///
/// let mut term = TerminalEmulator::new(20, 4);
/// term.write(b"abc\x1b[K\x1b[1Gxyz");
/// assert_eq!(term.row_text(0), "xyz");
/// assert_eq!(term.snapshot(), "xyz");
/// ```
#[derive(Debug, Clone)]
pub struct TerminalEmulator {
    width: u16,
    height: u16,
    grid: Vec<char>,
    cursor_x: u16,
    cursor_y: u16,
    cursor_visible: bool,
    saved_cursor: Option<(u16, u16)>,
    high_water: Option<u16>,
    parse_state: ParseState,
    csi_params: Vec<u16>,
    csi_private: bool,
    utf8: Utf8Decoder,
}

impl TerminalEmulator {
    /// Create an emulator with a blank `width` × `height` grid.
    ///
    /// # Panics
    ///
    /// Panics if width or height is 0.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        assert!(width > 0 && height > 0, "terminal dimensions must be > 0");
        Self {
            width,
            height,
            grid: vec![' '; usize::from(width) * usize::from(height)],
            cursor_x: 0,
            cursor_y: 0,
            cursor_visible: true,
            saved_cursor: None,
            high_water: None,
            parse_state: ParseState::Ground,
            csi_params: Vec::new(),
            csi_private: false,
            utf8: Utf8Decoder::default(),
        }
    }

    // ── Dimensions & Cursor ─────────────────────────────────────────

    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Cursor position as `(column, row)`, 0-indexed.
    #[must_use]
    pub const fn cursor(&self) -> (u16, u16) {
        (self.cursor_x, self.cursor_y)
    }

    #[must_use]
    pub const fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    /// Highest row that has received a glyph, if any.
    #[must_use]
    pub const fn high_water(&self) -> Option<u16> {
        self.high_water
    }

    // ── Grid Inspection ─────────────────────────────────────────────

    #[must_use]
    pub fn char_at(&self, x: u16, y: u16) -> Option<char> {
        (x < self.width && y < self.height).then(|| self.grid[self.idx(x, y)])
    }

    /// Text of one row with trailing spaces trimmed.
    #[must_use]
    pub fn row_text(&self, y: u16) -> String {
        if y >= self.height {
            return String::new();
        }
        let start = self.idx(0, y);
        let end = start + usize::from(self.width);
        let row: String = self.grid[start..end].iter().collect();
        row.trim_end().to_string()
    }

    /// Every row of the grid, joined with `\n`.
    #[must_use]
    pub fn screen_text(&self) -> String {
        (0..self.height)
            .map(|y| self.row_text(y))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Rows up to the high-water mark, trailing spaces and trailing blank
    /// lines removed, joined with `\n`. Empty if nothing was ever written.
    #[must_use]
    pub fn snapshot(&self) -> String {
        let Some(last) = self.high_water else {
            return String::new();
        };
        let mut rows: Vec<String> = (0..=last).map(|y| self.row_text(y)).collect();
        while rows.last().is_some_and(String::is_empty) {
            rows.pop();
        }
        rows.join("\n")
    }

    // ── Input Processing ────────────────────────────────────────────

    /// Interpret a chunk of the output stream.
    ///
    /// Chunks may split escape sequences and UTF-8 characters anywhere.
    pub fn write(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            self.process_byte(byte);
        }
    }

    pub fn write_str(&mut self, text: &str) {
        self.write(text.as_bytes());
    }

    // ── Internal ────────────────────────────────────────────────────

    fn idx(&self, x: u16, y: u16) -> usize {
        usize::from(y) * usize::from(self.width) + usize::from(x)
    }

    fn process_byte(&mut self, byte: u8) {
        match self.parse_state {
            ParseState::Ground => self.ground(byte),
            ParseState::Escape => self.escape(byte),
            ParseState::Csi => self.csi(byte),
            ParseState::Osc => self.osc(byte),
            ParseState::OscEscape => {
                // ST is `ESC \`; anything else also ends the string.
                self.parse_state = ParseState::Ground;
                if byte != b'\\' {
                    self.process_byte(byte);
                }
            }
        }
    }

    fn ground(&mut self, byte: u8) {
        if self.utf8.is_pending() {
            if (0x80..=0xbf).contains(&byte) {
                if let Some(ch) = self.utf8.push(byte) {
                    self.put_char(ch);
                }
                return;
            }
            // Sequence cut short: emit a replacement and reprocess.
            self.utf8.reset();
            self.put_char(char::REPLACEMENT_CHARACTER);
        }

        match byte {
            0x1b => self.parse_state = ParseState::Escape,
            b'\n' => {
                self.linefeed();
                self.cursor_x = 0;
            }
            b'\r' => self.cursor_x = 0,
            0x08 => self.cursor_x = self.cursor_x.min(self.width - 1).saturating_sub(1),
            b'\t' => {
                let next_tab = (self.cursor_x / 8 + 1) * 8;
                self.cursor_x = next_tab.min(self.width - 1);
            }
            0x20..=0x7e => self.put_char(char::from(byte)),
            0x80..=0xff => {
                if !self.utf8.start(byte) {
                    self.put_char(char::REPLACEMENT_CHARACTER);
                }
            }
            _ => {
                // Other C0 controls (BEL included): ignored
            }
        }
    }

    fn escape(&mut self, byte: u8) {
        self.parse_state = ParseState::Ground;
        match byte {
            b'[' => {
                self.parse_state = ParseState::Csi;
                self.csi_params.clear();
                self.csi_private = false;
            }
            b']' => self.parse_state = ParseState::Osc,
            b'7' => self.save_cursor(),
            b'8' => self.restore_cursor(),
            b'D' => self.linefeed(),
            b'E' => {
                self.linefeed();
                self.cursor_x = 0;
            }
            b'M' => self.cursor_y = self.cursor_y.saturating_sub(1),
            _ => trace!(byte, "ignored escape"),
        }
    }

    fn csi(&mut self, byte: u8) {
        match byte {
            b'0'..=b'9' => {
                let digit = u16::from(byte - b'0');
                if let Some(last) = self.csi_params.last_mut() {
                    *last = last.saturating_mul(10).saturating_add(digit);
                } else {
                    self.csi_params.push(digit);
                }
            }
            b';' => {
                if self.csi_params.is_empty() {
                    self.csi_params.push(0);
                }
                self.csi_params.push(0);
            }
            b'?' | b'>' | b'=' | b'<' => self.csi_private = true,
            0x20..=0x2f => {
                // Intermediate bytes: no sequence we handle uses them.
            }
            0x40..=0x7e => {
                self.dispatch_csi(byte);
                self.parse_state = ParseState::Ground;
            }
            _ => self.parse_state = ParseState::Ground,
        }
    }

    fn osc(&mut self, byte: u8) {
        match byte {
            0x07 => self.parse_state = ParseState::Ground,
            0x1b => self.parse_state = ParseState::OscEscape,
            _ => {}
        }
    }

    fn dispatch_csi(&mut self, final_byte: u8) {
        let max_x = self.width - 1;
        let max_y = self.height - 1;

        if self.csi_private {
            if matches!(final_byte, b'h' | b'l') && self.csi_params.contains(&25) {
                self.cursor_visible = final_byte == b'h';
            }
            return;
        }

        let n = Self::param(&self.csi_params, 0, 1);
        match final_byte {
            b'A' => self.cursor_y = self.cursor_y.saturating_sub(n),
            b'B' => self.cursor_y = self.cursor_y.saturating_add(n).min(max_y),
            b'C' => self.cursor_x = self.cursor_x.saturating_add(n).min(max_x),
            b'D' => self.cursor_x = self.cursor_x.min(max_x).saturating_sub(n),
            b'E' => {
                self.cursor_y = self.cursor_y.saturating_add(n).min(max_y);
                self.cursor_x = 0;
            }
            b'F' => {
                self.cursor_y = self.cursor_y.saturating_sub(n);
                self.cursor_x = 0;
            }
            b'G' => self.cursor_x = (n - 1).min(max_x),
            b'H' | b'f' => {
                let col = Self::param(&self.csi_params, 1, 1);
                self.cursor_y = (n - 1).min(max_y);
                self.cursor_x = (col - 1).min(max_x);
            }
            b'd' => self.cursor_y = (n - 1).min(max_y),
            b'J' => self.erase_display(Self::param(&self.csi_params, 0, 0)),
            b'K' => self.erase_line(Self::param(&self.csi_params, 0, 0)),
            b's' => self.save_cursor(),
            b'u' => self.restore_cursor(),
            b'm' => {
                // SGR: no visual state tracked
            }
            _ => trace!(final_byte, "ignored CSI"),
        }
    }

    fn save_cursor(&mut self) {
        self.saved_cursor = Some((self.cursor_x, self.cursor_y));
    }

    fn restore_cursor(&mut self) {
        if let Some((x, y)) = self.saved_cursor {
            self.cursor_x = x.min(self.width - 1);
            self.cursor_y = y.min(self.height - 1);
        }
    }

    fn put_char(&mut self, ch: char) {
        if self.cursor_x >= self.width {
            // Pending wrap
            self.cursor_x = 0;
            self.linefeed();
        }
        let idx = self.idx(self.cursor_x, self.cursor_y);
        self.grid[idx] = ch;
        self.high_water = Some(self.high_water.map_or(self.cursor_y, |hw| hw.max(self.cursor_y)));
        self.cursor_x += 1;
    }

    fn linefeed(&mut self) {
        if self.cursor_y + 1 < self.height {
            self.cursor_y += 1;
        } else {
            self.scroll_up();
        }
    }

    fn scroll_up(&mut self) {
        let width = usize::from(self.width);
        self.grid.drain(..width);
        self.grid.extend(std::iter::repeat_n(' ', width));
        if let Some(row) = self.saved_cursor.as_mut().map(|(_, y)| y) {
            *row = row.saturating_sub(1);
        }
        self.high_water = match self.high_water {
            Some(0) | None => None,
            Some(hw) => Some(hw - 1),
        };
    }

    fn erase_display(&mut self, mode: u16) {
        let cursor = self.idx(self.cursor_x.min(self.width - 1), self.cursor_y);
        let range = match mode {
            0 => self.idx(self.cursor_x.min(self.width), self.cursor_y)..self.grid.len(),
            1 => 0..cursor + 1,
            2 => 0..self.grid.len(),
            _ => return,
        };
        self.grid[range].fill(' ');
    }

    fn erase_line(&mut self, mode: u16) {
        let row_start = self.idx(0, self.cursor_y);
        let row_end = row_start + usize::from(self.width);
        let range = match mode {
            0 => row_start + usize::from(self.cursor_x.min(self.width))..row_end,
            1 => row_start..row_start + usize::from(self.cursor_x.min(self.width - 1)) + 1,
            2 => row_start..row_end,
            _ => return,
        };
        self.grid[range].fill(' ');
    }

    fn param(params: &[u16], idx: usize, default: u16) -> u16 {
        params
            .get(idx)
            .copied()
            .filter(|&v| v > 0)
            .unwrap_or(default)
    }
}

impl io::Write for TerminalEmulator {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        TerminalEmulator::write(self, buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
