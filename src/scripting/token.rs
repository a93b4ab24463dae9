use crate::core::Result;

/// Piece of text split around `open ... close` tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    /// Content between the delimiters, escapes inside it removed.
    Token(String),
}

/// Finds `open`/`close` delimited tokens in text (`#{...}`, `${...}`).
///
/// A backslash directly before the opening delimiter (or before a closing
/// delimiter inside a token) escapes it. An opening delimiter with no
/// matching close is literal text.
#[derive(Debug, Clone, Copy)]
pub struct TokenParser {
    open: &'static str,
    close: &'static str,
}

pub const PARAMETER_TOKENS: TokenParser = TokenParser::new("#{", "}");
pub const SUBSTITUTION_TOKENS: TokenParser = TokenParser::new("${", "}");

impl TokenParser {
    pub const fn new(open: &'static str, close: &'static str) -> Self {
        Self { open, close }
    }

    /// Split text into literal and token segments. Escaped openers become
    /// literal text without their backslash.
    pub fn segments(&self, text: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        self.scan(text, true, &mut |piece| match piece {
            Piece::Literal(s) => literal.push_str(s),
            Piece::Token(content, _) => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Token(content));
            }
        });
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        segments
    }

    /// Whether the text holds at least one unescaped token.
    pub fn has_tokens(&self, text: &str) -> bool {
        self.segments(text)
            .iter()
            .any(|segment| matches!(segment, Segment::Token(_)))
    }

    /// Replace each token by what `handler` returns for its content.
    pub fn replace<F>(&self, text: &str, mut handler: F) -> Result<String>
    where
        F: FnMut(&str) -> Result<String>,
    {
        let mut out = String::with_capacity(text.len());
        let mut failure = None;
        self.scan(text, true, &mut |piece| match piece {
            Piece::Literal(s) => out.push_str(s),
            Piece::Token(content, _) => {
                if failure.is_some() {
                    return;
                }
                match handler(&content) {
                    Ok(replacement) => out.push_str(&replacement),
                    Err(e) => failure = Some(e),
                }
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(out),
        }
    }

    /// Like [`replace`](Self::replace) but text outside tokens, escapes
    /// included, is preserved byte for byte. Used when a later pass will
    /// scan the same text again.
    pub fn rewrite<F>(&self, text: &str, mut handler: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        let mut out = String::with_capacity(text.len());
        self.scan(text, false, &mut |piece| match piece {
            Piece::Literal(s) => out.push_str(s),
            Piece::Token(content, raw) => {
                let rewritten = handler(&content);
                if rewritten == content {
                    out.push_str(raw);
                } else {
                    out.push_str(self.open);
                    out.push_str(&rewritten);
                    out.push_str(self.close);
                }
            }
        });
        out
    }

    fn scan<'t>(&self, text: &'t str, unescape: bool, emit: &mut dyn FnMut(Piece<'t>)) {
        let mut offset = 0;

        while let Some(found) = text[offset..].find(self.open) {
            let start = offset + found;

            if start > 0 && text.as_bytes()[start - 1] == b'\\' {
                if unescape {
                    emit(Piece::Literal(&text[offset..start - 1]));
                    emit(Piece::Literal(self.open));
                } else {
                    emit(Piece::Literal(&text[offset..start + self.open.len()]));
                }
                offset = start + self.open.len();
                continue;
            }

            let body_start = start + self.open.len();
            let mut content = String::new();
            let mut cursor = body_start;
            let mut end = None;
            while let Some(found) = text[cursor..].find(self.close) {
                let close_at = cursor + found;
                if close_at > cursor && text.as_bytes()[close_at - 1] == b'\\' {
                    content.push_str(&text[cursor..close_at - 1]);
                    content.push_str(self.close);
                    cursor = close_at + self.close.len();
                    continue;
                }
                content.push_str(&text[cursor..close_at]);
                end = Some(close_at + self.close.len());
                break;
            }

            match end {
                Some(end) => {
                    emit(Piece::Literal(&text[offset..start]));
                    emit(Piece::Token(content, &text[start..end]));
                    offset = end;
                }
                None => {
                    // Unterminated: everything left is literal
                    emit(Piece::Literal(&text[offset..]));
                    return;
                }
            }
        }

        emit(Piece::Literal(&text[offset..]));
    }
}

enum Piece<'t> {
    Literal(&'t str),
    Token(String, &'t str),
}
