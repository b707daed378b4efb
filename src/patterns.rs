//! Pattern synthesis and whole-word matching.
//!
//! Decomposition templates such as `"* i #belief i *"` are turned into
//! anchored regular expressions with one capture group per wildcard and per
//! known tag. Matching uses the `regex` crate, whose engines run in time
//! linear in the input, so nested greedy groups like `(.*)\b(.*)\b(.*)` can
//! not blow up on adversarial input.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::error::Result;
use crate::normalize::contract_whitespace;

/// Capture group emitted for every wildcard.
const WILDCARD_GROUP: &str = "(.*)";

#[derive(Debug)]
enum Segment {
    Text(String),
    Pattern(String),
}

/// Build the alternation pattern `(w1|w2|...)` for each tag.
pub fn build_tag_patterns<'a, I>(tags: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (&'a String, &'a Vec<String>)>,
{
    tags.into_iter()
        .map(|(name, words)| {
            let alternatives = words
                .iter()
                .map(|w| regex::escape(w))
                .collect::<Vec<_>>()
                .join("|");
            (name.clone(), format!("({})", alternatives))
        })
        .collect()
}

fn expand_tags(
    template: &str,
    tag_patterns: &HashMap<String, String>,
    tag_marker: &str,
) -> Vec<Segment> {
    let mut segments = Vec::new();
    if tag_marker.is_empty() {
        segments.push(Segment::Text(template.to_string()));
        return segments;
    }

    let tag_re = match Regex::new(&format!(r"{}(\S+)", regex::escape(tag_marker))) {
        Ok(re) => re,
        Err(_) => {
            segments.push(Segment::Text(template.to_string()));
            return segments;
        }
    };

    let mut text = String::new();
    let mut last = 0;
    for caps in tag_re.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        text.push_str(&template[last..whole.start()]);
        match tag_patterns.get(name.as_str()) {
            Some(pattern) => {
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Pattern(pattern.clone()));
            }
            // unknown tag: drop the marker, keep the word
            None => text.push_str(name.as_str()),
        }
        last = whole.end();
    }
    text.push_str(&template[last..]);
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    segments
}

/// Synthesize the anchored pattern for a decomposition template.
///
/// Known tags become their alternation group and unknown tags degrade to the
/// bare word. Each wildcard (with the whitespace around it) becomes `(.*)`
/// with a word boundary on every side that has template content next to it:
///
/// ```
/// use std::collections::HashMap;
/// use elizaos_eliza_script::patterns::synthesize;
///
/// let tags = HashMap::new();
/// assert_eq!(synthesize("*", &tags, "#", "*"), "^(.*)$");
/// assert_eq!(synthesize("* key *", &tags, "#", "*"), r"^(.*)\bkey\b(.*)$");
/// ```
pub fn synthesize(
    template: &str,
    tag_patterns: &HashMap<String, String>,
    tag_marker: &str,
    wildcard_marker: &str,
) -> String {
    let segments = expand_tags(template, tag_patterns, tag_marker);
    let total_len: usize = segments
        .iter()
        .map(|s| match s {
            Segment::Text(t) | Segment::Pattern(t) => t.len(),
        })
        .sum();

    let wild_re = if wildcard_marker.is_empty() {
        None
    } else {
        Regex::new(&format!(r"\s*{}\s*", regex::escape(wildcard_marker))).ok()
    };

    let mut out = String::from("^");
    let mut offset = 0;
    for segment in &segments {
        match segment {
            Segment::Pattern(pattern) => {
                out.push_str(pattern);
                offset += pattern.len();
            }
            Segment::Text(text) => {
                let Some(wild_re) = &wild_re else {
                    out.push_str(&regex::escape(text));
                    offset += text.len();
                    continue;
                };
                let mut last = 0;
                for m in wild_re.find_iter(text) {
                    out.push_str(&regex::escape(&text[last..m.start()]));
                    let start = offset + m.start();
                    let end = offset + m.end();
                    let at_start = start == 0;
                    let at_end = end == total_len;
                    match (at_start, at_end) {
                        (true, true) => out.push_str(WILDCARD_GROUP),
                        (true, false) => {
                            out.push_str(WILDCARD_GROUP);
                            out.push_str(r"\b");
                        }
                        (false, true) => {
                            out.push_str(r"\b");
                            out.push_str(WILDCARD_GROUP);
                        }
                        (false, false) => {
                            out.push_str(r"\b");
                            out.push_str(WILDCARD_GROUP);
                            out.push_str(r"\b");
                        }
                    }
                    last = m.end();
                }
                out.push_str(&regex::escape(&text[last..]));
                offset += text.len();
            }
        }
    }
    out.push('$');
    out
}

/// Compile a synthesized pattern for case-insensitive matching.
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    Ok(RegexBuilder::new(pattern).case_insensitive(true).build()?)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Pattern that finds `key` as a whole word inside a part.
///
/// Edges made of word characters use `\b`; any other edge (emoji, punctuation)
/// is bounded by whitespace or the ends of the text instead.
pub fn keyword_pattern(key: &str) -> String {
    let left = match key.chars().next() {
        Some(c) if is_word_char(c) => r"\b",
        _ => r"(?:^|\s)",
    };
    let right = match key.chars().last() {
        Some(c) if is_word_char(c) => r"\b",
        _ => r"(?:\s|$)",
    };
    format!("{}{}{}", left, regex::escape(key), right)
}

/// Whole-word substitution table (the script's `pre` and `post` maps).
///
/// Matching is case-insensitive and bounded by whitespace or the ends of the
/// text, which also works for words with accented letters.
#[derive(Debug, Clone)]
pub struct SubstitutionTable {
    entries: Vec<(String, String)>,
    lookup: HashMap<String, String>,
    pattern: Option<Regex>,
}

impl SubstitutionTable {
    /// Build a table; keys are whitespace-contracted, earlier keys win ties.
    pub fn new<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut ordered: Vec<(String, String)> = Vec::new();
        let mut lookup = HashMap::new();
        for (key, value) in entries {
            let key = contract_whitespace(&key);
            if key.is_empty() {
                continue;
            }
            lookup.entry(key.to_lowercase()).or_insert_with(|| value.clone());
            ordered.push((key, value));
        }

        let pattern = if ordered.is_empty() {
            None
        } else {
            let alternatives = ordered
                .iter()
                .map(|(k, _)| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            Some(compile_pattern(&format!(
                r"(?:^|\s)({})(?:\s|$)",
                alternatives
            ))?)
        };

        Ok(Self {
            entries: ordered,
            lookup,
            pattern,
        })
    }

    /// An empty table, which leaves every text untouched.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            lookup: HashMap::new(),
            pattern: None,
        }
    }

    /// Returns true when the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the replacement for a single word or phrase.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lookup.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Replace every whole-word occurrence of a key in a single pass.
    pub fn apply(&self, text: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return text.to_string();
        };

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut pos = 0;
        while pos <= text.len() {
            let Some(m) = pattern.captures_at(text, pos).and_then(|c| c.get(1)) else {
                break;
            };
            out.push_str(&text[last..m.start()]);
            out.push_str(self.get(m.as_str()).unwrap_or(m.as_str()));
            last = m.end();
            // the trailing separator may open the next match
            pos = m.end();
        }
        out.push_str(&text[last..]);
        out
    }
}
