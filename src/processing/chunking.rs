//! Word-bounded text splitting with overlap.
//!
//! Sizes are measured in words (maximal runs of non-whitespace). Every chunk after the first
//! starts with up to `overlap` words copied from the end of its predecessor, followed by fresh
//! text. Dropping the overlap prefix from each chunk and concatenating the rest yields the input
//! byte for byte.
//!
//! Cut points prefer, in order:
//!
//! - the last paragraph break (a gap containing a blank line) inside the budget,
//! - the last sentence break (a word ending in `.`, `!` or `?`, or a gap containing a newline),
//! - a hard cut at the word budget.
//!
//! A natural break is only taken when it keeps at least half of the budget, so pathological
//! inputs cannot degrade into one-word chunks.

use super::types::ChunkingError;

/// One segment produced by [`TextSplitter::split`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk text, overlap prefix included.
    pub text: String,
    /// Byte offset of `text` within the source.
    pub start: usize,
    /// Byte length of the prefix repeated from the previous chunk.
    pub overlap_len: usize,
}

impl Chunk {
    /// The part of the chunk not shared with its predecessor.
    pub fn fresh(&self) -> &str {
        &self.text[self.overlap_len..]
    }
}

/// Deterministic splitter configured with a word budget and overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

#[derive(Debug, Clone, Copy)]
struct Word {
    start: usize,
    end: usize,
}

impl TextSplitter {
    /// Create a splitter; `overlap` must be smaller than `chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkingError::InvalidOverlap {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Maximum words per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Words shared between consecutive chunks.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into ordered chunks.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let words = word_spans(text);
        if words.len() <= self.chunk_size {
            return vec![Chunk {
                text: text.to_string(),
                start: 0,
                overlap_len: 0,
            }];
        }

        let mut chunks = Vec::new();
        let mut fresh_start = 0;
        let mut first_word = 0;
        let mut previous_fresh_words = 0;

        while first_word < words.len() {
            let is_first = chunks.is_empty();
            let budget = if is_first {
                self.chunk_size
            } else {
                self.chunk_size - self.overlap
            };
            let remaining = words.len() - first_word;

            let (fresh_end, taken) = if remaining <= budget {
                (text.len(), remaining)
            } else {
                let taken = self.choose_cut(text, &words, first_word, budget);
                (words[first_word + taken].start, taken)
            };

            let carried = if is_first {
                0
            } else {
                self.overlap.min(previous_fresh_words)
            };
            let chunk_start = if carried > 0 {
                words[first_word - carried].start
            } else {
                fresh_start
            };

            chunks.push(Chunk {
                text: text[chunk_start..fresh_end].to_string(),
                start: chunk_start,
                overlap_len: fresh_start - chunk_start,
            });

            fresh_start = fresh_end;
            first_word += taken;
            previous_fresh_words = taken;
        }

        chunks
    }

    /// Number of fresh words to take starting at `first_word`; always within `1..=budget`.
    fn choose_cut(&self, text: &str, words: &[Word], first_word: usize, budget: usize) -> usize {
        let minimum = (budget / 2).max(1);
        let gap_after = |count: usize| {
            let last = words[first_word + count - 1];
            let next = words[first_word + count];
            (&text[last.start..last.end], &text[last.end..next.start])
        };

        let paragraph = (minimum..=budget).rev().find(|&count| {
            let (_, gap) = gap_after(count);
            gap.matches('\n').count() >= 2
        });
        if let Some(count) = paragraph {
            return count;
        }

        let sentence = (minimum..=budget).rev().find(|&count| {
            let (word, gap) = gap_after(count);
            ends_sentence(word) || gap.contains('\n')
        });
        sentence.unwrap_or(budget)
    }
}

fn word_spans(text: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current = None;
    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(start) = current.take() {
                words.push(Word { start, end: idx });
            }
        } else if current.is_none() {
            current = Some(idx);
        }
    }
    if let Some(start) = current {
        words.push(Word {
            start,
            end: text.len(),
        });
    }
    words
}

fn ends_sentence(word: &str) -> bool {
    word.trim_end_matches(['"', '\'', ')', ']', '\u{201D}', '\u{2019}'])
        .ends_with(['.', '!', '?'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_count(text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn sample_texts() -> Vec<String> {
        let mut texts = vec![
            String::new(),
            "   \n\t ".to_string(),
            "single".to_string(),
            "Leading space.  Two spaces here!\n\nNew paragraph?  \"Quoted.\" end".to_string(),
            "héllo wörld ñandú 東京 タワー. ".repeat(17),
        ];
        let mut generated = String::new();
        for idx in 0..240 {
            generated.push_str(&format!("word{idx}"));
            generated.push_str(match idx % 11 {
                0 => ". ",
                5 => "\n",
                7 => "\n\n",
                9 => "?  ",
                _ => " ",
            });
        }
        texts.push(generated);
        texts.push("A".repeat(50_000));
        texts
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert_eq!(TextSplitter::new(0, 0), Err(ChunkingError::InvalidChunkSize));
        assert_eq!(
            TextSplitter::new(5, 5),
            Err(ChunkingError::InvalidOverlap {
                chunk_size: 5,
                overlap: 5
            })
        );
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let splitter = TextSplitter::new(10, 2).expect("splitter");
        assert!(splitter.split("").is_empty());
    }

    #[test]
    fn short_text_yields_single_chunk_without_overlap() {
        let splitter = TextSplitter::new(10, 2).expect("splitter");
        let chunks = splitter.split("just a few words here");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "just a few words here");
        assert_eq!(chunks[0].overlap_len, 0);
    }

    #[test]
    fn removing_overlaps_reconstructs_input() {
        for text in sample_texts() {
            for (size, overlap) in [(1, 0), (3, 1), (7, 0), (7, 6), (20, 5), (64, 10)] {
                let splitter = TextSplitter::new(size, overlap).expect("splitter");
                let rebuilt: String = splitter.split(&text).iter().map(Chunk::fresh).collect();
                assert_eq!(rebuilt, text, "size={size} overlap={overlap}");
            }
        }
    }

    #[test]
    fn chunks_respect_word_bound_and_offsets() {
        for text in sample_texts() {
            for (size, overlap) in [(1, 0), (4, 2), (9, 3), (32, 8)] {
                let splitter = TextSplitter::new(size, overlap).expect("splitter");
                for chunk in splitter.split(&text) {
                    assert!(word_count(&chunk.text) <= size);
                    assert_eq!(&text[chunk.start..chunk.start + chunk.text.len()], chunk.text);
                }
            }
        }
    }

    #[test]
    fn overlap_repeats_tail_of_previous_chunk() {
        let text: String = (0..25).map(|idx| format!("w{idx} ")).collect();
        let splitter = TextSplitter::new(10, 2).expect("splitter");
        let chunks = splitter.split(&text);

        let counts: Vec<_> = chunks.iter().map(|chunk| word_count(&chunk.text)).collect();
        assert_eq!(counts, vec![10, 10, 9]);
        assert_eq!(&chunks[1].text[..chunks[1].overlap_len], "w8 w9 ");
        assert!(chunks[0].text.ends_with("w8 w9 "));
    }

    #[test]
    fn prefers_sentence_boundary_within_budget() {
        let text = "One two three four five six seven. Eight nine ten eleven twelve thirteen.";
        let splitter = TextSplitter::new(10, 0).expect("splitter");
        let chunks = splitter.split(text);
        assert_eq!(chunks[0].text, "One two three four five six seven. ");
        assert_eq!(chunks[1].text, "Eight nine ten eleven twelve thirteen.");
    }

    #[test]
    fn prefers_paragraph_over_later_sentence() {
        let text = "a b c d.\n\ne f g. h i j k l m";
        let splitter = TextSplitter::new(8, 0).expect("splitter");
        let chunks = splitter.split(text);
        assert_eq!(chunks[0].text, "a b c d.\n\n");
    }

    #[test]
    fn ignores_breaks_that_would_waste_the_budget() {
        let text = "Hi. a b c d e f g h i j k";
        let splitter = TextSplitter::new(8, 0).expect("splitter");
        let chunks = splitter.split(text);
        assert_eq!(word_count(&chunks[0].text), 8);
    }

    #[test]
    fn splitting_is_deterministic() {
        let splitter = TextSplitter::new(16, 4).expect("splitter");
        for text in sample_texts() {
            assert_eq!(splitter.split(&text), splitter.split(&text));
        }
    }
}
