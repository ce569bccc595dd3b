use std::iter::FusedIterator;

/// Lazily yields the lowercase words of `text`.
///
/// A word is a maximal run of alphanumeric or `_` characters; everything else
/// separates words and is dropped.
pub fn tokenize(text: &str) -> Tokens<'_> {
    Tokens { rest: text }
}

#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    rest: &'a str,
}

impl Iterator for Tokens<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let start = self.rest.find(is_word_char)?;
        let tail = &self.rest[start..];
        let end = tail.find(|c: char| !is_word_char(c)).unwrap_or(tail.len());
        self.rest = &tail[end..];
        Some(tail[..end].to_lowercase())
    }
}

impl FusedIterator for Tokens<'_> {}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
