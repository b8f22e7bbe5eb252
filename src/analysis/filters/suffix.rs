use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// Shortest stem the `-ing`/`-ed` rules may leave behind.
const MIN_STEM_CHARS: usize = 3;

/// Lightweight suffix stripper: `-ing`, `-ed`, and a trailing `-s` on words
/// longer than three characters.
///
/// Rules are applied until none fires, so stemming an existing stem is a
/// no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuffixStemmer;

impl SuffixStemmer {
    pub fn stem(&self, word: &str) -> String {
        let mut current = word.to_string();
        while let Some(next) = Self::strip_once(&current) {
            current = next;
        }
        current
    }

    fn strip_once(word: &str) -> Option<String> {
        let chars = word.chars().count();

        if word.ends_with("ing") && chars - 3 >= MIN_STEM_CHARS {
            return Some(word[..word.len() - 3].to_string());
        }
        if word.ends_with("ed") && chars - 2 >= MIN_STEM_CHARS {
            return Some(word[..word.len() - 2].to_string());
        }
        if word.ends_with('s') && !word.ends_with("ss") && chars > 3 {
            return Some(word[..word.len() - 1].to_string());
        }
        None
    }
}

impl TokenFilter for SuffixStemmer {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        tokens.into_iter()
            .map(|mut token| {
                token.text = self.stem(&token.text);
                token
            })
            .collect()
    }

    fn name(&self) -> &str {
        "suffix"
    }

    fn clone_box(&self) -> Box<dyn TokenFilter> {
        Box::new(SuffixStemmer)
    }
}
