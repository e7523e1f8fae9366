//! Tag-aware message text sanitizer.
//!
//! Character messages carry HTML-like tag blocks (`<think>...</think>`,
//! `<scene>...</scene>`) that would pollute the option-generation context.
//! The sanitizer drops every balanced tag pair together with its body unless
//! the tag name is on the user-configured preserved list, in which case the
//! wrapper survives and the body is sanitized recursively. Tags are handled
//! with a small tokenizer and a stack-free recursive scan over the token
//! list, so the output is fully sanitized in one pass and re-running the
//! sanitizer is a no-op.
//!
//! A trailing markdown pass removes fenced code blocks and image links and
//! collapses runs of blank lines.

use regex::Regex;
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```[\s\S]*?```").unwrap());
static IMAGE_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Message sanitizer configured with a set of preserved tag names.
#[derive(Debug, Clone, Default)]
pub struct TagSanitizer {
    preserved: Vec<String>,
}

impl TagSanitizer {
    /// Build a sanitizer from the comma/whitespace separated tag list in the
    /// settings surface. Names are matched case-insensitively.
    pub fn from_preserved_list(list: &str) -> Self {
        let preserved = list
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(|tag| tag.trim().to_ascii_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect();
        Self { preserved }
    }

    fn is_preserved(&self, name: &str) -> bool {
        self.preserved.iter().any(|p| p.eq_ignore_ascii_case(name))
    }

    /// Sanitize one message body.
    pub fn clean(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let tokens = tokenize(text);
        let mut out = String::with_capacity(text.len());
        self.strip_tokens(&tokens, &mut out);

        let out = CODE_FENCE.replace_all(&out, "");
        let out = IMAGE_LINK.replace_all(&out, "");
        let out = BLANK_RUNS.replace_all(&out, "\n\n");
        out.trim().to_string()
    }

    /// Emit the sanitized form of a token run.
    ///
    /// Balanced pairs are matched by name with depth counting, so an outer
    /// tag pairs with its own close even when the same name nests inside.
    /// An unclosed non-preserved open tag swallows itself and everything
    /// after it within the current run.
    fn strip_tokens(&self, tokens: &[Token<'_>], out: &mut String) {
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Text(text) => {
                    out.push_str(text);
                    i += 1;
                }
                Token::Close { name, raw } => {
                    // A close with no matching open stands alone.
                    if self.is_preserved(name) {
                        out.push_str(raw);
                    }
                    i += 1;
                }
                Token::Open { name, raw } => match find_matching_close(tokens, i, name) {
                    Some(close_idx) => {
                        if self.is_preserved(name) {
                            out.push_str(raw);
                            self.strip_tokens(&tokens[i + 1..close_idx], out);
                            if let Token::Close { raw: close_raw, .. } = &tokens[close_idx] {
                                out.push_str(close_raw);
                            }
                        }
                        i = close_idx + 1;
                    }
                    None => {
                        if self.is_preserved(name) {
                            out.push_str(raw);
                            i += 1;
                        } else {
                            return;
                        }
                    }
                },
            }
        }
    }
}

#[derive(Debug)]
enum Token<'a> {
    Text(&'a str),
    Open { name: &'a str, raw: &'a str },
    Close { name: &'a str, raw: &'a str },
}

/// Split input into literal text and tag tokens. A `<` that does not start
/// a lexable tag stays literal text.
fn tokenize(input: &str) -> Vec<Token<'_>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'<' {
            if let Some((token, end)) = lex_tag(input, i) {
                if text_start < i {
                    tokens.push(Token::Text(&input[text_start..i]));
                }
                tokens.push(token);
                i = end;
                text_start = end;
                continue;
            }
        }
        i += 1;
    }

    if text_start < input.len() {
        tokens.push(Token::Text(&input[text_start..]));
    }

    tokens
}

/// Try to lex a tag at `start` (which points at `<`). Tag names are runs of
/// `[A-Za-z0-9_]` immediately after `<` or `</`; attributes run to the first
/// `>` and are kept verbatim in `raw`.
fn lex_tag(input: &str, start: usize) -> Option<(Token<'_>, usize)> {
    let rest = &input[start + 1..];
    let (closing, body) = match rest.strip_prefix('/') {
        Some(after) => (true, after),
        None => (false, rest),
    };

    let name_len = body
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count();
    if name_len == 0 {
        return None;
    }

    let name = &body[..name_len];
    let close_rel = body[name_len..].find('>')?;

    let prefix = if closing { 2 } else { 1 };
    let end = start + prefix + name_len + close_rel + 1;
    let raw = &input[start..end];

    let token = if closing {
        Token::Close { name, raw }
    } else {
        Token::Open { name, raw }
    };
    Some((token, end))
}

/// Find the close token pairing with the open at `open_idx`, counting
/// nesting depth for same-named opens. Names compare case-insensitively.
fn find_matching_close(tokens: &[Token<'_>], open_idx: usize, name: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (idx, token) in tokens.iter().enumerate().skip(open_idx + 1) {
        match token {
            Token::Open { name: other, .. } if other.eq_ignore_ascii_case(name) => depth += 1,
            Token::Close { name: other, .. } if other.eq_ignore_ascii_case(name) => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}
