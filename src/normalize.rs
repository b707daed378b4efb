//! Input canonicalization.
//!
//! Raw user text is lowercased (optionally), stripped of every character the
//! script does not allow, and segmented into parts: stop characters and stop
//! words both become `.`, and the session later splits on `.`.

use regex::{Regex, RegexBuilder};

use crate::config::ElizaOptions;
use crate::error::Result;

/// Collapse runs of whitespace to a single space and trim both ends.
pub fn contract_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace every run of whitespace with `replacement`, trimming both ends.
pub(crate) fn replace_whitespace(text: &str, replacement: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(replacement)
}

fn char_class_escape(chars: &str) -> String {
    chars
        .chars()
        .map(|c| regex::escape(c.encode_utf8(&mut [0u8; 4])))
        .collect()
}

/// Precompiled input normalizer for one set of options.
#[derive(Debug, Clone)]
pub struct Normalizer {
    lowercase: bool,
    ignore: Regex,
    emoji: Option<Regex>,
    stop_chars: Option<Regex>,
    stop_words: Option<Regex>,
}

impl Normalizer {
    /// Build a normalizer from the character and word settings in `options`.
    pub fn new(options: &ElizaOptions) -> Result<Self> {
        let emoji_class = if options.allow_emoji {
            r"\p{Emoji_Presentation}"
        } else {
            ""
        };
        let ignore = Regex::new(&format!(
            "[^a-zA-Z0-9 {}{}{}]",
            char_class_escape(&options.allow_chars),
            char_class_escape(&options.stop_chars),
            emoji_class
        ))?;

        let emoji = if options.allow_emoji {
            Some(Regex::new(r"\p{Emoji_Presentation}")?)
        } else {
            None
        };

        let stop_chars = if options.stop_chars.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(
                "[{}]",
                char_class_escape(&options.stop_chars)
            ))?)
        };

        let words: Vec<String> = options
            .stop_words
            .iter()
            .map(|w| contract_whitespace(w))
            .filter(|w| !w.is_empty())
            .map(|w| regex::escape(&w))
            .collect();
        let stop_words = if words.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(&format!(r"\b(?:{})\b", words.join("|")))
                    .case_insensitive(true)
                    .build()?,
            )
        };

        Ok(Self {
            lowercase: options.lowercase_input,
            ignore,
            emoji,
            stop_chars,
            stop_words,
        })
    }

    /// Canonicalize `text`. Parts are delimited by `.` in the result.
    pub fn normalize(&self, text: &str) -> String {
        let mut out = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };
        out = self.ignore.replace_all(&out, " ").into_owned();
        if let Some(emoji) = &self.emoji {
            out = emoji.replace_all(&out, " $0 ").into_owned();
        }
        out = contract_whitespace(&out);
        if let Some(stop_chars) = &self.stop_chars {
            out = stop_chars.replace_all(&out, ".").into_owned();
        }
        if let Some(stop_words) = &self.stop_words {
            out = stop_words.replace_all(&out, ".").into_owned();
        }
        out
    }

    /// Split normalized text into trimmed, non-empty parts.
    pub fn split_parts(normalized: &str) -> Vec<String> {
        normalized
            .split('.')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }
}
