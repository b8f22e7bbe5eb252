use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;
use crate::analysis::Analyzer;
use crate::analysis::token::Token;
use crate::query::types::QueryPhrase;

const PHRASE_SCORE: u32 = 50;
const TERM_SCORE: u32 = 10;

/// Picks a short excerpt of a document around its best matches.
#[derive(Debug, Clone)]
pub struct SnippetGenerator {
    pub max_chars: usize,
}

impl SnippetGenerator {
    pub fn new(max_chars: usize) -> Self {
        SnippetGenerator { max_chars: max_chars.max(1) }
    }

    /// Excerpt of at most `max_chars` characters.
    ///
    /// `ranked_terms` lists matched terms best first. One candidate window is
    /// centred on the first occurrence of each ranked term and each phrase;
    /// the window with the most phrase and term hits wins, ties going to the
    /// better-ranked term. Without any occurrence the text's opening is used.
    pub fn generate(&self, text: &str, ranked_terms: &[String], phrases: &[QueryPhrase], analyzer: &Analyzer) -> String {
        let text = text.trim();
        if text.chars().count() <= self.max_chars {
            return text.to_string();
        }

        let tokens = analyzer.analyze(text);
        let wanted: HashSet<&str> = ranked_terms.iter().map(String::as_str).collect();

        let mut centres: Vec<usize> = Vec::new();
        for term in ranked_terms {
            if let Some(token) = tokens.iter().find(|t| &t.text == term) {
                centres.push(token.offset);
            }
        }
        for phrase in phrases {
            if let Some(start) = phrase_start(&tokens, &phrase.terms) {
                let first = &tokens[start];
                let last = &tokens[start + phrase.terms.len() - 1];
                centres.push((first.offset + last.offset + last.length) / 2);
            }
        }

        let mut best: Option<((usize, usize), u32)> = None;
        for centre in centres {
            let window = self.window(text, centre);
            let score = score_window(&tokens, window, &wanted, phrases);
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((window, score));
            }
        }

        let (start, end) = match best {
            Some((window, _)) => window,
            None => self.window(text, 0),
        };
        text[start..end].trim().to_string()
    }

    /// Byte range of a window of at most `max_chars` characters around
    /// `centre`, shrunk inward to word boundaries.
    fn window(&self, text: &str, centre: usize) -> (usize, usize) {
        let mut centre = centre.min(text.len());
        while !text.is_char_boundary(centre) {
            centre -= 1;
        }

        let total = text.chars().count();
        let centre_char = text[..centre].chars().count();

        let mut start_char = centre_char.saturating_sub(self.max_chars / 2);
        let end_char = (start_char + self.max_chars).min(total);
        start_char = end_char.saturating_sub(self.max_chars);

        let mut start = byte_at(text, start_char);
        let mut end = byte_at(text, end_char);

        let bounds: Vec<usize> = text.split_word_bound_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        if start > 0 {
            if let Some(b) = bounds.iter().find(|&&b| b >= start) {
                start = *b;
            }
        }
        if end < text.len() {
            if let Some(b) = bounds.iter().rev().find(|&&b| b <= end && b > start) {
                end = *b;
            }
        }
        (start, end.max(start))
    }
}

fn byte_at(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

fn phrase_start(tokens: &[Token], terms: &[String]) -> Option<usize> {
    if terms.is_empty() || tokens.len() < terms.len() {
        return None;
    }
    tokens.windows(terms.len())
        .position(|w| w.iter().zip(terms).all(|(token, term)| &token.text == term))
}

fn score_window(tokens: &[Token], (start, end): (usize, usize), wanted: &HashSet<&str>, phrases: &[QueryPhrase]) -> u32 {
    let inside: Vec<&Token> = tokens.iter()
        .filter(|t| t.offset >= start && t.offset + t.length <= end)
        .collect();

    let term_hits = inside.iter().filter(|t| wanted.contains(t.text.as_str())).count() as u32;
    let phrase_hits = phrases.iter()
        .filter(|p| {
            !p.terms.is_empty()
                && inside.windows(p.terms.len()).any(|w| w.iter().zip(&p.terms).all(|(t, term)| &t.text == term))
        })
        .count() as u32;

    phrase_hits * PHRASE_SCORE + term_hits * TERM_SCORE
}
