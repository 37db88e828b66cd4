//! Script chunker (spec §4.12.1). Word spans are maximal non-whitespace
//! runs. Ported from the original's cursor/word-span/newline-search
//! algorithm, with spec.md's literal constants (700/1000/22) in place of
//! the original's 300/500/45.

pub const MIN_WORDS_BEFORE_SEARCH: usize = 700;
pub const MAX_WORDS_FORCING_CUT: usize = 1000;
pub const MAX_SEGMENTS: usize = 22;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// False when the cut had to be forced at the word-count ceiling
    /// without finding a newline to cut on cleanly.
    pub clean: bool,
}

fn word_spans(chars: &[char]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut in_word = false;
    let mut start = 0usize;
    for (i, c) in chars.iter().enumerate() {
        if c.is_whitespace() {
            if in_word {
                spans.push((start, i));
                in_word = false;
            }
        } else if !in_word {
            start = i;
            in_word = true;
        }
    }
    if in_word {
        spans.push((start, chars.len()));
    }
    spans
}

/// Splits `script` into between 1 and `MAX_SEGMENTS` chunks. Empty input
/// yields an empty vector.
pub fn chunk_text(script: &str) -> Vec<Chunk> {
    let chars: Vec<char> = script.chars().collect();
    let spans = word_spans(&chars);
    let total_words = spans.len();
    if total_words == 0 {
        return Vec::new();
    }

    let mut cuts: Vec<(usize, usize, bool)> = Vec::new();
    let mut cursor = 0usize;
    let mut prev_cut = 0usize;

    while cursor < total_words {
        let j700 = (cursor + MIN_WORDS_BEFORE_SEARCH).min(total_words);
        let j1000 = (cursor + MAX_WORDS_FORCING_CUT).min(total_words);

        let search_start = spans[j700 - 1].1;
        let search_end = spans[j1000 - 1].1;

        let newline_pos = chars[search_start..search_end]
            .iter()
            .position(|&c| c == '\n')
            .map(|offset| search_start + offset);

        let (cut, clean, next_cursor) = match newline_pos {
            Some(pos) => {
                let cut = pos + 1;
                let next_cursor = spans.partition_point(|&(start, _)| start < cut);
                (cut, true, next_cursor)
            }
            None => (search_end, false, j1000),
        };

        cuts.push((prev_cut, cut, clean));
        prev_cut = cut;
        cursor = next_cursor;
    }

    if let Some(last) = cuts.last_mut() {
        if last.1 < chars.len() {
            last.1 = chars.len();
        }
    }

    let mut chunks: Vec<Chunk> = cuts
        .into_iter()
        .map(|(start, end, clean)| Chunk {
            text: chars[start..end].iter().collect(),
            clean,
        })
        .collect();

    if chunks.len() > MAX_SEGMENTS {
        let tail: Vec<Chunk> = chunks.split_off(MAX_SEGMENTS - 1);
        let merged_clean = tail.iter().all(|c| c.clean);
        let merged_text = tail.into_iter().map(|c| c.text).collect::<String>();
        chunks.push(Chunk {
            text: merged_text,
            clean: merged_clean,
        });
    }

    chunks
}
