//! Terminal rendering of the scrolling prompter

use colored::*;

use crate::domain::prompter::ScrollState;

/// Columns used when wrapping script text
pub const DEFAULT_WIDTH: usize = 64;

/// Script rows visible at once
pub const DEFAULT_ROWS: usize = 9;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Script laid out as wrapped lines, `line_height` scroll units apart
#[derive(Debug, Clone)]
pub struct PrompterView {
    lines: Vec<String>,
    line_height: u32,
    rows: usize,
}

impl PrompterView {
    pub fn new(script: &str, line_height: u32, width: usize, rows: usize) -> Self {
        Self {
            lines: wrap(script, width.max(1)),
            line_height: line_height.max(1),
            rows: rows.max(1),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Offset at which the last line sits on the reading row
    pub fn extent(&self) -> f64 {
        self.lines.len().saturating_sub(1) as f64 * f64::from(self.line_height)
    }

    /// Index of the line on the reading row
    pub fn current_line(&self, position: f64) -> usize {
        let line = (position.max(0.0) / f64::from(self.line_height)).floor() as usize;
        line.min(self.lines.len().saturating_sub(1))
    }

    /// Visible lines as `(index, text)`, with the reading row a third of the
    /// way down the window.
    pub fn window(&self, position: f64) -> Vec<(usize, &str)> {
        let current = self.current_line(position);
        let first = current.saturating_sub(self.rows / 3);
        self.lines
            .iter()
            .enumerate()
            .skip(first)
            .take(self.rows)
            .map(|(index, line)| (index, line.as_str()))
            .collect()
    }

    /// Full frame: header, then the window with the reading row highlighted
    pub fn render(&self, state: &ScrollState) -> String {
        let current = self.current_line(state.position());
        let mut frame = String::from(CLEAR_SCREEN);

        let mode = if state.is_running() {
            "▶ scrolling".green()
        } else {
            "⏸ paused".yellow()
        };
        frame.push_str(&format!(
            "{}  {}  line {}/{}  (Ctrl+C to stop)\n\n",
            mode,
            format!("{:.0} units/s", state.speed()).dimmed(),
            current + 1,
            self.lines.len().max(1)
        ));

        for (index, line) in self.window(state.position()) {
            if index == current {
                frame.push_str(&format!("{} {}\n", "›".cyan(), line.bold()));
            } else {
                frame.push_str(&format!("  {}\n", line.dimmed()));
            }
        }
        frame
    }
}

/// Word-wrap `text` at `width` columns, keeping blank lines between paragraphs
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }

    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}
