//! Line-start index for offset ↔ position conversion

use crate::mapping::Position;

/// Byte offsets at which each line of a text starts
///
/// Line breaks are `\n`; a preceding `\r` stays part of the line text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    /// Index a text
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            starts,
            len: text.len(),
        }
    }

    /// Number of lines (an empty text has one empty line)
    #[inline]
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Position of a byte offset; offsets past the end clamp to the end
    #[must_use]
    pub fn position_of(&self, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        Position::new(to_u32(line), to_u32(offset - self.starts[line]))
    }

    /// Byte offset of a position, if it lies inside the text
    #[must_use]
    pub fn offset_of(&self, position: Position) -> Option<usize> {
        let line = position.line as usize;
        let start = *self.starts.get(line)?;
        let end = self.starts.get(line + 1).map_or(self.len, |next| next - 1);
        let offset = start + position.column as usize;
        (offset <= end).then_some(offset)
    }

    /// Text of one line without its terminating `\n`
    #[must_use]
    pub fn line_text<'a>(&self, text: &'a str, line: u32) -> Option<&'a str> {
        let line = line as usize;
        let start = *self.starts.get(line)?;
        let end = self.starts.get(line + 1).map_or(self.len, |next| next - 1);
        text.get(start..end)
    }
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
