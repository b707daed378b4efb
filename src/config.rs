//! Configuration for the ELIZA script engine.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Runtime options for compiling a script and running a session.
///
/// All fields are optional when deserialized; missing fields take the
/// defaults below. A script document may carry its own `options` object,
/// which overrides these field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElizaOptions {
    /// RNG seed. Negative means "seed from entropy".
    pub seed: i64,

    /// Maximum number of memorized replies; the oldest is dropped on overflow.
    pub memory_size: usize,

    /// Reshuffle reassembly and `none` pools every time they wrap around.
    pub shuffle_choices: bool,

    /// Draw reassembly indices and memory entries at random instead of cycling.
    pub randomize_choices: bool,

    /// Lowercase input before matching.
    pub lowercase_input: bool,

    /// Lowercase every reply produced by `transform`.
    pub lowercase_output: bool,

    /// Marks a wildcard in decomposition templates.
    pub wildcard_marker: String,

    /// Marks a tag reference in decomposition templates.
    pub tag_marker: String,

    /// Prefix marking a keyword or decomposition as memory-deferred.
    pub memory_marker: String,

    /// Prefix marking a reassembly template as a redirect to another keyword.
    #[serde(alias = "redirect_marker")]
    pub goto_marker: String,

    /// Opening delimiter of a positional parameter (`$1`).
    pub param_marker_pre: String,

    /// Closing delimiter of a positional parameter (empty by default).
    pub param_marker_post: String,

    /// Characters that split input into parts.
    pub stop_chars: String,

    /// Words that split input into parts.
    pub stop_words: Vec<String>,

    /// Characters kept in addition to ASCII letters, digits and space.
    pub allow_chars: String,

    /// Keep emoji in the input, separated from surrounding words.
    pub allow_emoji: bool,

    /// Reply used when nothing else applies.
    pub fallback_reply: String,

    /// Number of leading `initial` replies that are never shuffled.
    pub fixed_initial: usize,

    /// Number of leading `final` replies that are never shuffled.
    pub fixed_final: usize,

    /// Maximum number of redirects followed within one keyword execution.
    pub max_redirect_depth: usize,
}

impl Default for ElizaOptions {
    fn default() -> Self {
        Self {
            seed: -1,
            memory_size: 100,
            shuffle_choices: false,
            randomize_choices: false,
            lowercase_input: true,
            lowercase_output: false,
            wildcard_marker: "*".to_string(),
            tag_marker: "#".to_string(),
            memory_marker: "@".to_string(),
            goto_marker: "=".to_string(),
            param_marker_pre: "$".to_string(),
            param_marker_post: String::new(),
            stop_chars: ".,;:?!".to_string(),
            stop_words: vec!["but".to_string()],
            allow_chars: "'äöüß-".to_string(),
            allow_emoji: false,
            fallback_reply: "I am at a loss for words.".to_string(),
            fixed_initial: 0,
            fixed_final: 0,
            max_redirect_depth: 16,
        }
    }
}

impl ElizaOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a (possibly partial) JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON or a field has the
    /// wrong type.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Overlay the entries of a script's `options` object onto these options.
    pub(crate) fn merged_with(&self, overrides: &serde_json::Value) -> Result<Self> {
        let mut base = serde_json::to_value(self)?;
        if let (Some(base_map), Some(over_map)) = (base.as_object_mut(), overrides.as_object()) {
            for (key, value) in over_map {
                let key = if key == "redirect_marker" {
                    "goto_marker"
                } else {
                    key.as_str()
                };
                base_map.insert(key.to_string(), value.clone());
            }
        }
        Ok(serde_json::from_value(base)?)
    }

    /// The configured seed, or `None` when the session should use entropy.
    pub fn seed(&self) -> Option<u64> {
        u64::try_from(self.seed).ok()
    }

    /// Builder: set the RNG seed.
    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder: set the fallback reply.
    pub fn with_fallback_reply(mut self, reply: impl Into<String>) -> Self {
        self.fallback_reply = reply.into();
        self
    }

    /// Builder: enable or disable shuffling on wrap-around.
    pub fn with_shuffle_choices(mut self, shuffle: bool) -> Self {
        self.shuffle_choices = shuffle;
        self
    }

    /// Builder: enable or disable random reassembly selection.
    pub fn with_randomize_choices(mut self, randomize: bool) -> Self {
        self.randomize_choices = randomize;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let options = ElizaOptions::default();
        assert_eq!(options.seed, -1);
        assert_eq!(options.seed(), None);
        assert_eq!(options.memory_size, 100);
        assert!(options.lowercase_input);
        assert_eq!(options.stop_words, vec!["but".to_string()]);
        assert_eq!(options.fallback_reply, "I am at a loss for words.");
    }

    #[test]
    fn test_partial_json() {
        let options =
            ElizaOptions::from_json(r#"{"seed": 3, "redirect_marker": "->"}"#).unwrap();
        assert_eq!(options.seed(), Some(3));
        assert_eq!(options.goto_marker, "->");
        assert_eq!(options.wildcard_marker, "*");
    }

    #[test]
    fn test_invalid_json_type() {
        assert!(ElizaOptions::from_json(r#"{"seed": "zero"}"#).is_err());
    }

    #[test]
    fn test_merge_overrides_fields() {
        let base = ElizaOptions::default().with_seed(7);
        let merged = base
            .merged_with(&json!({"fixed_initial": 2, "redirect_marker": "goto"}))
            .unwrap();
        assert_eq!(merged.seed, 7);
        assert_eq!(merged.fixed_initial, 2);
        assert_eq!(merged.goto_marker, "goto");
    }
}
