// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Word tokenizer.
//!
//! Lowercases the text and splits it on non-alphanumeric characters. Tokens
//! shorter than the minimum length (in characters) or without a single
//! alphabetic character are discarded.

/// Default minimum token length in characters
pub const DEFAULT_TOKEN_MIN_LENGTH: usize = 3;

/// Split `text` into lowercased word tokens.
pub fn tokenize(text: &str, min_length: usize) -> Vec<String> {
    let buffer = text.to_lowercase();
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in buffer.char_indices() {
        if c.is_alphanumeric() {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            push_valid(&buffer[s..i], min_length, &mut tokens);
        }
    }
    // Last token has no trailing separator
    if let Some(s) = start {
        push_valid(&buffer[s..], min_length, &mut tokens);
    }

    tokens
}

fn push_valid(token: &str, min_length: usize, tokens: &mut Vec<String>) {
    if is_valid_token(token, min_length) {
        tokens.push(token.to_string());
    }
}

/// A token is kept if it is long enough and contains a letter.
pub fn is_valid_token(token: &str, min_length: usize) -> bool {
    token.chars().count() >= min_length && token.chars().any(char::is_alphabetic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        let tokens = tokenize("The quick brown fox, 2024 -- jumps!", 3);
        assert_eq!(tokens, vec!["the", "quick", "brown", "fox", "jumps"]);
    }

    #[test]
    fn test_min_length_counts_chars() {
        let tokens = tokenize("Öl är gött", 3);
        assert_eq!(tokens, vec!["gött"]);

        let tokens = tokenize("Öl är gött", 2);
        assert_eq!(tokens, vec!["öl", "är", "gött"]);
    }

    #[test]
    fn test_empty_text() {
        assert!(tokenize("", 3).is_empty());
        assert!(tokenize("   ...  ", 3).is_empty());
    }
}
