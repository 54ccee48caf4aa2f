use std::collections::BTreeSet;

use super::document::PageSegment;

const SEPARATOR: char = '\n';

/// A bounded window of page text handed to the extraction prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Overlap carried from the previous chunk, then this chunk's own body.
    pub text: String,
    /// Pages contributing any text, including through the overlap.
    pub pages: BTreeSet<u32>,
    /// Byte length of the carried prefix, separator included.
    pub overlap_len: usize,
}

impl Chunk {
    /// The chunk's own segments joined with `\n`, without the carried overlap.
    pub fn body(&self) -> &str {
        self.text.get(self.overlap_len..).unwrap_or_default()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

// Char offsets of one page's contribution inside the buffer.
#[derive(Debug, Clone, Copy)]
struct Span {
    page: u32,
    start: usize,
    end: usize,
}

#[derive(Default)]
struct Buffer {
    text: String,
    chars: usize,
    spans: Vec<Span>,
    overlap_len: usize,
}

impl Buffer {
    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn push(&mut self, page: u32, text: &str, text_chars: usize) {
        if !self.is_empty() {
            self.text.push(SEPARATOR);
            self.chars = self.chars.saturating_add(1);
        }
        let start = self.chars;
        self.text.push_str(text);
        self.chars = self.chars.saturating_add(text_chars);
        self.spans.push(Span {
            page,
            start,
            end: self.chars,
        });
    }

    fn into_chunk(self) -> Chunk {
        Chunk {
            pages: self
                .spans
                .iter()
                .filter(|span| span.end > span.start)
                .map(|span| span.page)
                .collect(),
            text: self.text,
            overlap_len: self.overlap_len,
        }
    }

    /// Starts the next buffer with the last `seed_chars` chars of this one.
    fn seed(&self, seed_chars: usize) -> Buffer {
        let seed_chars = seed_chars.min(self.chars);
        if seed_chars == 0 {
            return Buffer::default();
        }

        let seed_start = self.chars.saturating_sub(seed_chars);
        let text = tail_chars(&self.text, seed_chars).to_owned();
        let spans = self
            .spans
            .iter()
            .filter(|span| span.end > seed_start)
            .map(|span| Span {
                page: span.page,
                start: span.start.max(seed_start).saturating_sub(seed_start),
                end: span.end.saturating_sub(seed_start),
            })
            .collect();

        let overlap_len = text.len().saturating_add(SEPARATOR.len_utf8());

        Buffer {
            text,
            chars: seed_chars,
            spans,
            overlap_len,
        }
    }
}

/// Groups page segments into chunks of at most `max_chars` characters.
///
/// When a segment does not fit, the current chunk is closed and the next one starts
/// with the last `overlap_chars` characters of the closed chunk. The overlap is
/// shortened so that overlap, separator and segment fit within `max_chars`; only a
/// single segment longer than `max_chars` produces an oversized chunk.
pub fn chunk(segments: &[PageSegment], max_chars: usize, overlap_chars: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut buffer = Buffer::default();

    for segment in segments {
        let segment_chars = segment.text.chars().count();
        let needed = buffer
            .chars
            .saturating_add(usize::from(!buffer.is_empty()))
            .saturating_add(segment_chars);

        if !buffer.is_empty() && needed > max_chars {
            let room = max_chars.saturating_sub(segment_chars.saturating_add(1));
            let next = buffer.seed(overlap_chars.min(room));
            chunks.push(std::mem::replace(&mut buffer, next).into_chunk());
        }

        buffer.push(segment.page_number, &segment.text, segment_chars);
    }

    if !buffer.is_empty() {
        chunks.push(buffer.into_chunk());
    }

    chunks
}

fn tail_chars(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    text.char_indices()
        .rev()
        .nth(count.saturating_sub(1))
        .and_then(|(idx, _)| text.get(idx..))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(page: u32, body: &str) -> PageSegment {
        PageSegment::new(page, body)
    }

    fn joined(segments: &[PageSegment]) -> String {
        segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn small_document_forms_one_chunk_without_leading_separator() {
        let segments = vec![segment(1, "alpha"), segment(2, "beta")];
        let chunks = chunk(&segments, 4000, 100);

        assert_eq!(chunks.len(), 1);
        let only = chunks.first().expect("one chunk");
        assert_eq!(only.text, "[Page 1]\nalpha\n[Page 2]\nbeta");
        assert_eq!(only.overlap_len, 0);
        assert_eq!(only.pages, BTreeSet::from([1, 2]));
    }

    #[test]
    fn bodies_reconstruct_the_document() {
        let segments: Vec<PageSegment> = (1..=12)
            .map(|page| segment(page, &format!("page {page} ").repeat(15 + page as usize)))
            .collect();
        let chunks = chunk(&segments, 400, 60);

        assert!(chunks.len() > 1);
        let rebuilt = chunks
            .iter()
            .map(Chunk::body)
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(rebuilt, joined(&segments));
    }

    #[test]
    fn chunks_respect_the_size_bound() {
        let segments: Vec<PageSegment> = (1..=20)
            .map(|page| segment(page, &"ŕ".repeat(90 + (page as usize * 7) % 50)))
            .collect();
        let chunks = chunk(&segments, 300, 100);

        for chunk in &chunks {
            assert!(chunk.char_len() <= 300, "chunk of {} chars", chunk.char_len());
        }
    }

    #[test]
    fn oversized_single_segment_is_kept_whole() {
        let big = "z".repeat(500);
        let segments = vec![segment(1, "short"), segment(2, &big), segment(3, "tail")];
        let chunks = chunk(&segments, 100, 20);

        assert_eq!(chunks.len(), 3);
        let oversized = chunks.get(1).expect("second chunk");
        assert_eq!(oversized.overlap_len, 0);
        assert_eq!(oversized.body(), segments.get(1).map(|s| s.text.as_str()).unwrap_or_default());
        assert_eq!(oversized.pages, BTreeSet::from([2]));
    }

    #[test]
    fn overlap_seed_carries_its_pages() {
        let segments = vec![
            segment(1, &"a".repeat(60)),
            segment(2, &"b".repeat(60)),
        ];
        let chunks = chunk(&segments, 100, 30);

        assert_eq!(chunks.len(), 2);
        let second = chunks.get(1).expect("second chunk");
        assert_eq!(second.pages, BTreeSet::from([1, 2]));
        assert!(second.text.starts_with(&"a".repeat(30)));
        assert_eq!(second.overlap_len, 31);
        assert!(second.body().starts_with("[Page 2]"));
    }

    #[test]
    fn overlap_shrinks_to_fit_large_segment() {
        let segments = vec![segment(1, &"a".repeat(50)), segment(2, &"b".repeat(80))];
        let chunks = chunk(&segments, 100, 40);

        let second = chunks.get(1).expect("second chunk");
        assert!(second.char_len() <= 100);
        assert_eq!(second.body(), segments.get(1).map(|s| s.text.as_str()).unwrap_or_default());
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk(&[], 4000, 100).is_empty());
    }
}
