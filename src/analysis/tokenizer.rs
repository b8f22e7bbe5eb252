use crate::analysis::token::Token;
use unicode_segmentation::UnicodeSegmentation;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;

    fn name(&self) -> &str;

    fn clone_box(&self) -> Box<dyn Tokenizer>;
}

/// Whitespace tokenizer that keeps reference punctuation.
///
/// Lower-cases, strips every non-alphanumeric character except `-` and `:`
/// (so `3:16` and `sons-of-korah` survive), then splits on whitespace.
#[derive(Clone)]
pub struct ReferenceTokenizer {
    pub lowercase: bool,
    pub max_token_length: usize,
}

impl Default for ReferenceTokenizer {
    fn default() -> Self {
        ReferenceTokenizer {
            lowercase: true,
            max_token_length: 255,
        }
    }
}

fn is_kept(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == ':'
}

impl Tokenizer for ReferenceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;

        for word in text.split_whitespace() {
            let offset = word.as_ptr() as usize - text.as_ptr() as usize;

            let cased = if self.lowercase {
                word.to_lowercase()
            } else {
                word.to_string()
            };
            let stripped: String = cased.chars().filter(|c| is_kept(*c)).collect();

            if stripped.is_empty() || stripped.len() > self.max_token_length {
                continue;
            }

            tokens.push(Token::new(stripped, position, offset, word.len()));
            position += 1;
        }

        tokens
    }

    fn name(&self) -> &str {
        "reference"
    }

    fn clone_box(&self) -> Box<dyn Tokenizer> {
        Box::new(self.clone())
    }
}

/// Standard Unicode tokenizer
#[derive(Clone)]
pub struct StandardTokenizer {
    pub lowercase: bool,
    pub max_token_length: usize,
}

impl Default for StandardTokenizer {
    fn default() -> Self {
        StandardTokenizer {
            lowercase: true,
            max_token_length: 255,
        }
    }
}

impl Tokenizer for StandardTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;

        // Use unicode_segmentation to split into words
        for (offset, word) in text.unicode_word_indices() {
            if word.len() > self.max_token_length {
                continue;
            }
            let token_text = if self.lowercase {
                word.to_lowercase()
            } else {
                word.to_string()
            };

            tokens.push(Token::new(token_text, position, offset, word.len()));
            position += 1;
        }

        tokens
    }

    fn name(&self) -> &str {
        "standard"
    }

    fn clone_box(&self) -> Box<dyn Tokenizer> {
        Box::new(self.clone())
    }
}
