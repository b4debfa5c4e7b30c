//! Overlapping text windows for documentation files.
//!
//! Sizes are counted in characters, not bytes, and cuts always land on a
//! char boundary. When a window stops short of the end of the content, the
//! cut is pulled back to just after the last newline (or, failing that, the
//! last space) inside the final fifth of the window so chunks tend to end on
//! line or word boundaries.

use crate::types::TextChunkEntry;

#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    /// `chunk_overlap` is clamped below `chunk_size` so every window advances.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    /// Split `content` into chunks. Whitespace-only content yields nothing.
    pub fn chunk(&self, content: &str) -> Vec<TextChunkEntry> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        // Byte offset of every char, plus the end.
        let offsets: Vec<usize> = content
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(content.len()))
            .collect();
        let total_chars = offsets.len() - 1;

        if total_chars <= self.chunk_size {
            return vec![TextChunkEntry {
                text: content.to_string(),
                start_line: 0,
                end_line: count_newlines(content),
                position: 0,
            }];
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;
        // Newlines before `start`, maintained incrementally.
        let mut line_at_start = 0u32;
        let mut line_cursor = 0usize;

        loop {
            let mut end = (start + self.chunk_size).min(total_chars);
            if end < total_chars {
                end = self.natural_cut(content, &offsets, start, end);
            }

            line_at_start += count_newlines(&content[offsets[line_cursor]..offsets[start]]);
            line_cursor = start;

            let text = &content[offsets[start]..offsets[end]];
            chunks.push(TextChunkEntry {
                text: text.to_string(),
                start_line: line_at_start,
                end_line: line_at_start + count_newlines(text),
                position: chunks.len() as u32,
            });

            if end >= total_chars {
                break;
            }
            let next = end.saturating_sub(self.chunk_overlap);
            start = if next > start { next } else { end };
        }

        chunks
    }

    /// Move `end` back to a newline/space boundary in the last 20% of the
    /// window, when one exists after `start`.
    fn natural_cut(&self, content: &str, offsets: &[usize], start: usize, end: usize) -> usize {
        let search_from = end.saturating_sub(self.chunk_size / 5).max(start);
        let window = &content[offsets[search_from]..offsets[end]];

        let boundary = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .map(|byte_pos| offsets[search_from] + byte_pos);

        match boundary {
            Some(byte_pos) => {
                // Index of the char just after the boundary char.
                let cut = offsets.partition_point(|&o| o <= byte_pos);
                if cut > start {
                    cut
                } else {
                    end
                }
            }
            None => end,
        }
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}

fn count_newlines(s: &str) -> u32 {
    s.bytes().filter(|&b| b == b'\n').count() as u32
}
