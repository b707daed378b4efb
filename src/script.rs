//! Script compilation.
//!
//! A raw script is a JSON-compatible document:
//!
//! ```json
//! {
//!   "initial": ["How do you do. Please tell me your problem."],
//!   "final": ["Goodbye."],
//!   "quit": ["bye"],
//!   "none": ["Please go on."],
//!   "pre": {"dont": "don't"},
//!   "post": {"my": "your"},
//!   "tags": {"family": ["mother", "father"]},
//!   "keywords": {
//!     "sorry": "Please don't apologise.",
//!     "remember 5": {"* i remember *": ["Do you often think of $2?"]},
//!     "@ my 2": {"* my #family *": "Tell me more about your family."}
//!   }
//! }
//! ```
//!
//! Compilation validates the shape of every field, resolves the three
//! accepted keyword body forms into one canonical [`Rule`] list, synthesizes
//! the decomposition patterns and sorts keywords by rank.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::ElizaOptions;
use crate::error::{ElizaError, Result};
use crate::normalize::{contract_whitespace, replace_whitespace, Normalizer};
use crate::patterns::{
    build_tag_patterns, compile_pattern, keyword_pattern, synthesize, SubstitutionTable,
};

lazy_static! {
    static ref KEY_RANK: Regex = Regex::new(r"^(.*?)\s+(-?\d+)$").expect("regex ok");
}

/// One decomposition rule with its reassembly templates.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Decomposition template as written (memory marker stripped).
    pub decomp: String,
    /// Synthesized anchored pattern.
    pub decomp_pattern: String,
    /// Reassembly templates in declaration order.
    pub reasmb: Vec<String>,
    /// Successful matches are memorized instead of answered.
    pub mem_flag: bool,
    regex: Regex,
}

impl Rule {
    /// Match the decomposition against a whole part, returning the captures
    /// (index 0 is the whole match).
    pub fn decompose<'t>(&self, text: &'t str) -> Option<regex::Captures<'t>> {
        self.regex.captures(text)
    }
}

/// A trigger word or phrase with its rules.
#[derive(Debug, Clone)]
pub struct Keyword {
    /// The literal key, matched as a whole word.
    pub key: String,
    /// Priority; higher ranks are tried first.
    pub rank: i64,
    /// Every rule of this keyword is memory-deferred.
    pub mem_flag: bool,
    /// Rules in declaration order.
    pub rules: Vec<Rule>,
    /// Position of the keyword in the script, used to break rank ties.
    pub orig_idx: usize,
    matcher: Regex,
}

impl Keyword {
    /// Returns true when the key occurs as a whole word in `part`.
    pub fn is_in(&self, part: &str) -> bool {
        self.matcher.is_match(part)
    }
}

/// Keyword body after shape validation.
#[derive(Debug, Clone, PartialEq)]
pub enum KeywordBody {
    /// `"key": "reply"`: one `*` rule with a single template.
    Reply(String),
    /// `"key": ["a", "b"]`: one `*` rule cycling through the templates.
    Replies(Vec<String>),
    /// `"key": {"decomp": "reply" | ["a", "b"], ...}`.
    Rules(Vec<(String, Vec<String>)>),
}

/// A validated, sorted, ready-to-run script.
///
/// Compiled scripts hold no conversation state and can be shared between
/// sessions.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    /// Greeting replies.
    pub initial: Vec<String>,
    /// Farewell replies.
    pub r#final: Vec<String>,
    /// Parts that end the conversation when matched exactly.
    pub quit: Vec<String>,
    /// Phrases that end the conversation when contained anywhere in the input.
    pub quit_substrings: Vec<String>,
    /// Replies used when no keyword and no memory applies.
    pub none: Vec<String>,
    /// Replies for input that is empty after normalization.
    pub empty: Vec<String>,
    /// Substitutions applied to input parts before keyword matching.
    pub pre: SubstitutionTable,
    /// Substitutions applied to captured parameters during reassembly.
    pub post: SubstitutionTable,
    /// Tag name to member words.
    pub tags: Vec<(String, Vec<String>)>,
    /// Keywords sorted by descending rank, then declaration order.
    pub keywords: Vec<Keyword>,
    key_index: HashMap<String, usize>,
    options: ElizaOptions,
    normalizer: Normalizer,
    goto_pattern: Regex,
    param_pattern: Regex,
}

/// Split a declared key into name and rank (`"remember 5"` -> `("remember", 5)`).
///
/// The rank must be separated by whitespace, so a lone number is a key.
pub fn parse_key(declared: &str) -> (String, i64) {
    let key = contract_whitespace(declared);
    if let Some(caps) = KEY_RANK.captures(&key) {
        if let (Some(name), Some(rank)) = (caps.get(1), caps.get(2)) {
            if let Ok(rank) = rank.as_str().parse::<i64>() {
                return (name.as_str().to_string(), rank);
            }
        }
    }
    (key, 0)
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn require<'a>(script: &'a Map<String, Value>, field: &str) -> Result<&'a Value> {
    script
        .get(field)
        .ok_or_else(|| ElizaError::script(field, format!("script is missing '{}'", field)))
}

fn string_array(field: &str, value: &Value) -> Result<Vec<String>> {
    let items = value.as_array().ok_or_else(|| {
        ElizaError::script(
            field,
            format!("'{}' needs to be an array (not {})", field, type_name(value)),
        )
    })?;
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                ElizaError::script(
                    field,
                    format!(
                        "'{}': index {} needs to be string (not {})",
                        field,
                        idx,
                        type_name(item)
                    ),
                )
            })
        })
        .collect()
}

fn object<'a>(field: &str, value: &'a Value) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        ElizaError::script(
            field,
            format!("'{}' needs to be an object (not {})", field, type_name(value)),
        )
    })
}

fn string_map(field: &str, value: &Value) -> Result<Vec<(String, String)>> {
    object(field, value)?
        .iter()
        .map(|(key, val)| {
            val.as_str()
                .map(|s| (key.clone(), s.to_string()))
                .ok_or_else(|| {
                    ElizaError::script(
                        field,
                        format!(
                            "'{}': '{}' needs to be string (not {})",
                            field,
                            key,
                            type_name(val)
                        ),
                    )
                })
        })
        .collect()
}

fn optional_string_array(script: &Map<String, Value>, field: &str) -> Result<Vec<String>> {
    match script.get(field) {
        Some(value) => string_array(field, value),
        None => Ok(Vec::new()),
    }
}

/// Validate the body of a single keyword declaration.
pub fn parse_keyword_body(key: &str, body: &Value) -> Result<KeywordBody> {
    let field = format!("keywords.{}", key);
    match body {
        Value::String(reply) => Ok(KeywordBody::Reply(reply.clone())),
        Value::Array(_) => Ok(KeywordBody::Replies(string_array(&field, body)?)),
        Value::Object(rules) => {
            let mut out = Vec::with_capacity(rules.len());
            for (decomp, reassemblies) in rules {
                let templates = match reassemblies {
                    Value::String(s) => vec![s.clone()],
                    Value::Array(_) => {
                        string_array(&format!("{}.{}", field, decomp), reassemblies)?
                    }
                    other => {
                        return Err(ElizaError::script(
                            field,
                            format!(
                                "'{}' needs to be array or string (not {})",
                                decomp,
                                type_name(other)
                            ),
                        ))
                    }
                };
                out.push((decomp.clone(), templates));
            }
            Ok(KeywordBody::Rules(out))
        }
        other => Err(ElizaError::script(
            "keywords",
            format!(
                "'{}' needs to be object or array or string (not {})",
                key,
                type_name(other)
            ),
        )),
    }
}

fn strip_marker(text: &str, marker: &str) -> Option<String> {
    if marker.is_empty() {
        return None;
    }
    text.strip_prefix(marker).map(|rest| rest.trim_start().to_string())
}

fn compile_keyword(
    declared: &str,
    body: &Value,
    orig_idx: usize,
    options: &ElizaOptions,
    tag_patterns: &HashMap<String, String>,
) -> Result<Keyword> {
    let (mut key, rank) = parse_key(declared);
    let mut mem_flag = false;
    if let Some(stripped) = strip_marker(&key, &options.memory_marker) {
        key = stripped;
        mem_flag = true;
    }
    if key.is_empty() {
        return Err(ElizaError::script(
            "keywords",
            format!("'{}' does not name a keyword", declared),
        ));
    }

    let wildcard = options.wildcard_marker.clone();
    let declared_rules = match parse_keyword_body(declared, body)? {
        KeywordBody::Reply(reply) => vec![(wildcard, vec![reply])],
        KeywordBody::Replies(replies) => vec![(wildcard, replies)],
        KeywordBody::Rules(rules) => rules,
    };

    let mut rules = Vec::with_capacity(declared_rules.len());
    for (decomp, reasmb) in declared_rules {
        let mut decomp = contract_whitespace(&decomp);
        let mut rule_mem = mem_flag;
        if let Some(stripped) = strip_marker(&decomp, &options.memory_marker) {
            decomp = stripped;
            rule_mem = true;
        }
        let decomp_pattern = synthesize(
            &decomp,
            tag_patterns,
            &options.tag_marker,
            &options.wildcard_marker,
        );
        let regex = compile_pattern(&decomp_pattern)?;
        rules.push(Rule {
            decomp,
            decomp_pattern,
            reasmb: reasmb.iter().map(|r| contract_whitespace(r)).collect(),
            mem_flag: rule_mem,
            regex,
        });
    }

    let matcher = compile_pattern(&keyword_pattern(&key))?;
    Ok(Keyword {
        key,
        rank,
        mem_flag,
        rules,
        orig_idx,
        matcher,
    })
}

impl CompiledScript {
    /// Validate and compile a raw script document.
    ///
    /// A top-level `options` object in the script overrides `options` field
    /// by field.
    ///
    /// # Errors
    ///
    /// Returns [`ElizaError::Script`] naming the offending field when a
    /// required field is missing or has the wrong shape.
    pub fn compile(raw: &Value, options: &ElizaOptions) -> Result<Self> {
        let script = raw.as_object().ok_or_else(|| {
            ElizaError::script(
                "script",
                format!("script needs to be an object (not {})", type_name(raw)),
            )
        })?;

        let options = match script.get("options") {
            Some(overrides @ Value::Object(_)) => options.merged_with(overrides)?,
            _ => options.clone(),
        };

        let initial = string_array("initial", require(script, "initial")?)?;
        let r#final = string_array("final", require(script, "final")?)?;
        let quit = string_array("quit", require(script, "quit")?)?;
        let none = string_array("none", require(script, "none")?)?;
        let quit_substrings = optional_string_array(script, "quit*")?;
        let empty = optional_string_array(script, "empty")?;

        let pre = SubstitutionTable::new(string_map("pre", require(script, "pre")?)?)?;
        let post = SubstitutionTable::new(string_map("post", require(script, "post")?)?)?;

        let mut tags = Vec::new();
        for (name, words) in object("tags", require(script, "tags")?)? {
            let words = string_array(&format!("tags.{}", name), words)?;
            tags.push((replace_whitespace(name, "_"), words));
        }
        let tag_patterns = build_tag_patterns(tags.iter().map(|(k, v)| (k, v)));

        let mut keywords = Vec::new();
        for (orig_idx, (declared, body)) in object("keywords", require(script, "keywords")?)?
            .iter()
            .enumerate()
        {
            keywords.push(compile_keyword(
                declared,
                body,
                orig_idx,
                &options,
                &tag_patterns,
            )?);
        }
        keywords.sort_by(|a, b| b.rank.cmp(&a.rank).then(a.orig_idx.cmp(&b.orig_idx)));

        let mut key_index = HashMap::new();
        for (idx, keyword) in keywords.iter().enumerate() {
            key_index.entry(keyword.key.clone()).or_insert(idx);
        }

        let goto_pattern =
            compile_pattern(&format!(r"^{}\s*(.*)$", regex::escape(&options.goto_marker)))?;
        let param_pattern = Regex::new(&format!(
            "{}([0-9]+){}",
            regex::escape(&options.param_marker_pre),
            regex::escape(&options.param_marker_post)
        ))?;
        let normalizer = Normalizer::new(&options)?;

        debug!(
            keywords = keywords.len(),
            tags = tags.len(),
            "compiled script"
        );

        Ok(Self {
            initial,
            r#final,
            quit,
            quit_substrings,
            none,
            empty,
            pre,
            post,
            tags,
            keywords,
            key_index,
            options,
            normalizer,
            goto_pattern,
            param_pattern,
        })
    }

    /// Options in effect for this script (caller options merged with the
    /// script's own `options`).
    pub fn options(&self) -> &ElizaOptions {
        &self.options
    }

    /// The input normalizer built from this script's options.
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Index into [`CompiledScript::keywords`] of the first keyword with this key.
    pub fn keyword_index(&self, key: &str) -> Option<usize> {
        self.key_index.get(key).copied()
    }

    /// If `template` is a redirect directive, the target name.
    pub(crate) fn redirect_target<'t>(&self, template: &'t str) -> Option<&'t str> {
        self.goto_pattern
            .captures(template)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    pub(crate) fn param_pattern(&self) -> &Regex {
        &self.param_pattern
    }
}
