use serde::{Serialize, Deserialize};

/// Token representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,      // The token text
    pub position: u32,     // Position in the filtered term sequence (for phrase matching)
    pub offset: usize,     // Byte offset in original text
    pub length: usize,     // Token length in bytes of the original word
}

impl Token {
    pub fn new(text: String, position: u32, offset: usize, length: usize) -> Self {
        Token {
            text,
            position,
            offset,
            length,
        }
    }
}
