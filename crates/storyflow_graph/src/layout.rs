// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node metrics and text wrapping used for height computation.

/// Node visual dimensions (world units)
pub const NODE_WIDTH: f32 = 200.0;
/// Height of the title bar
pub const NODE_HEADER_HEIGHT: f32 = 24.0;
/// Inner padding around text blocks
pub const NODE_PADDING: f32 = 8.0;
/// Height of one wrapped text line
pub const LINE_HEIGHT: f32 = 16.0;
/// Height of one exit row on Choice/Switch nodes
pub const EXIT_ROW_HEIGHT: f32 = 22.0;
/// Side length of the close button in the header
pub const CLOSE_BUTTON_SIZE: f32 = 14.0;
/// Hit radius of an exit anchor
pub const ANCHOR_RADIUS: f32 = 6.0;

/// Minimum heights per node kind
pub const MIN_EXEC_HEIGHT: f32 = 56.0;
/// Minimum Choice height
pub const MIN_CHOICE_HEIGHT: f32 = 56.0;
/// Minimum Switch height
pub const MIN_SWITCH_HEIGHT: f32 = 56.0;
/// End nodes have a fixed height
pub const END_HEIGHT: f32 = 40.0;
/// Minimum Comment height
pub const MIN_COMMENT_HEIGHT: f32 = 40.0;

/// Width available to wrapped text inside a node
pub const TEXT_WIDTH: f32 = NODE_WIDTH - 2.0 * NODE_PADDING;

/// Measures rendered text width. The editor plugs in its font backend; tests
/// and headless tools use [`MonospaceMeasurer`].
pub trait TextMeasurer {
    /// Width of `text` laid out on a single line
    fn text_width(&self, text: &str) -> f32;
}

/// Fixed advance per character
#[derive(Debug, Clone, Copy)]
pub struct MonospaceMeasurer {
    /// Advance of one character
    pub char_width: f32,
}

impl Default for MonospaceMeasurer {
    fn default() -> Self {
        Self { char_width: 7.0 }
    }
}

impl TextMeasurer for MonospaceMeasurer {
    fn text_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.char_width
    }
}

/// Greedy word wrap. Explicit newlines always break, a blank paragraph still
/// occupies a line, and a word wider than `max_width` is split by characters.
/// Empty text yields no lines.
pub fn wrap_text(text: &str, max_width: f32, measurer: &dyn TextMeasurer) -> Vec<String> {
    let mut lines = Vec::new();
    if text.is_empty() {
        return lines;
    }

    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };

            if measurer.text_width(&candidate) <= max_width {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }

            if measurer.text_width(word) <= max_width {
                current = word.to_string();
            } else {
                for ch in word.chars() {
                    current.push(ch);
                    if measurer.text_width(&current) > max_width && current.chars().count() > 1 {
                        current.pop();
                        lines.push(std::mem::replace(&mut current, ch.to_string()));
                    }
                }
            }
        }
        lines.push(current);
    }
    lines
}

/// Number of wrapped lines for `text` inside a node
pub fn line_count(text: &str, measurer: &dyn TextMeasurer) -> usize {
    wrap_text(text, TEXT_WIDTH, measurer).len()
}
