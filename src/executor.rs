//! Rule execution: decomposition, reassembly selection, redirects and
//! parameter substitution for one keyword against one input part.

use regex::Captures;
use tracing::debug;

use crate::error::{ElizaError, Result};
use crate::memory::Memory;
use crate::rng::{rnd_int, shuffle, RandomSource};
use crate::script::{CompiledScript, Rule};

/// Cycling state of one rule, owned by a session.
#[derive(Debug, Clone)]
pub struct RuleState {
    /// Index of the most recently used reassembly, `-1` before the first use.
    pub last_choice: isize,
    order: Vec<usize>,
}

impl RuleState {
    fn new(len: usize) -> Self {
        Self {
            last_choice: -1,
            order: (0..len).collect(),
        }
    }

    fn reset(&mut self) {
        self.last_choice = -1;
        for (pos, idx) in self.order.iter_mut().enumerate() {
            *idx = pos;
        }
    }
}

/// Per-session cycling state for every rule of a script, indexed by keyword
/// position and rule position.
#[derive(Debug, Clone)]
pub struct RuleStates {
    states: Vec<Vec<RuleState>>,
}

impl RuleStates {
    /// Fresh state for every rule of `script`.
    pub fn new(script: &CompiledScript) -> Self {
        let states = script
            .keywords
            .iter()
            .map(|k| k.rules.iter().map(|r| RuleState::new(r.reasmb.len())).collect())
            .collect();
        Self { states }
    }

    /// Restart every cycle and restore declaration order.
    pub fn reset(&mut self) {
        for state in self.states.iter_mut().flatten() {
            state.reset();
        }
    }

    /// State of one rule.
    #[cfg(test)]
    pub fn get(&self, keyword: usize, rule: usize) -> Option<&RuleState> {
        self.states.get(keyword).and_then(|rules| rules.get(rule))
    }
}

/// Runs the rules of a keyword with mutable access to the session's state.
pub(crate) struct Executor<'s> {
    pub script: &'s CompiledScript,
    pub rules: &'s mut RuleStates,
    pub memory: &'s mut Memory,
    pub rng: &'s mut dyn RandomSource,
}

impl Executor<'_> {
    /// Try the rules of keyword `keyword` against `part`.
    ///
    /// Returns the reply of the first matching rule that is not
    /// memory-deferred, or an empty string when no rule produced one.
    pub fn execute(&mut self, keyword: usize, part: &str) -> Result<String> {
        self.execute_at(keyword, part, 0)
    }

    fn execute_at(&mut self, keyword_idx: usize, part: &str, depth: usize) -> Result<String> {
        let script = self.script;
        let Some(keyword) = script.keywords.get(keyword_idx) else {
            return Ok(String::new());
        };

        for (rule_idx, rule) in keyword.rules.iter().enumerate() {
            let Some(captures) = rule.decompose(part) else {
                continue;
            };
            debug!(key = %keyword.key, rule = rule_idx, decomp = %rule.decomp, "rule matched");

            let Some(template) = self.next_reassembly(keyword_idx, rule_idx, rule) else {
                continue;
            };
            debug!(reasmb = %template, "reassembly chosen");

            if let Some(target) = script.redirect_target(&template) {
                if let Some(target_idx) = script.keyword_index(target) {
                    if depth >= script.options().max_redirect_depth {
                        return Err(ElizaError::RedirectCycle {
                            keyword: target.to_string(),
                            depth,
                        });
                    }
                    debug!(from = %keyword.key, to = %target, "following redirect");
                    return self.execute_at(target_idx, part, depth + 1);
                }
            }

            let reply = self.reassemble(&template, &captures);
            if rule.mem_flag {
                debug!(reply = %reply, "reply memorized");
                self.memory.push(reply);
                continue;
            }
            return Ok(reply);
        }
        Ok(String::new())
    }

    fn next_reassembly(&mut self, keyword: usize, rule_idx: usize, rule: &Rule) -> Option<String> {
        let len = rule.reasmb.len();
        if len == 0 {
            return None;
        }
        let script = self.script;
        let options = script.options();
        let state = self.rules.states.get_mut(keyword)?.get_mut(rule_idx)?;

        let choice = if options.randomize_choices {
            rnd_int(len, &mut *self.rng)
        } else {
            let next = usize::try_from(state.last_choice + 1).unwrap_or(0);
            let next = if next >= len { 0 } else { next };
            if next == 0 && options.shuffle_choices {
                shuffle(&mut state.order, &mut *self.rng);
            }
            next
        };
        state.last_choice = choice as isize;
        state
            .order
            .get(choice)
            .and_then(|&idx| rule.reasmb.get(idx))
            .cloned()
    }

    /// Substitute positional parameters with post-processed captures.
    fn reassemble(&self, template: &str, captures: &Captures<'_>) -> String {
        let post = &self.script.post;
        let reply = self
            .script
            .param_pattern()
            .replace_all(template, |caps: &Captures<'_>| {
                let param = caps
                    .get(1)
                    .and_then(|m| m.as_str().parse::<usize>().ok())
                    .unwrap_or(0);
                if param == 0 {
                    return String::new();
                }
                match captures.get(param) {
                    Some(value) => {
                        let value = value.as_str().trim();
                        let processed = post.apply(value);
                        debug!(param, value, processed = %processed, "parameter");
                        processed
                    }
                    None => String::new(),
                }
            });
        reply.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ElizaOptions;
    use crate::rng::SeededRandom;
    use serde_json::json;

    fn script(keywords: serde_json::Value, post: serde_json::Value) -> CompiledScript {
        let raw = json!({
            "initial": [], "final": [], "quit": [], "none": [],
            "pre": {}, "post": post, "tags": {},
            "keywords": keywords
        });
        CompiledScript::compile(&raw, &ElizaOptions::default()).unwrap()
    }

    fn run(
        script: &CompiledScript,
        states: &mut RuleStates,
        memory: &mut Memory,
        key: &str,
        part: &str,
    ) -> Result<String> {
        let mut rng = SeededRandom::new(Some(0));
        let idx = script.keyword_index(key).unwrap();
        let mut executor = Executor {
            script,
            rules: states,
            memory,
            rng: &mut rng,
        };
        executor.execute(idx, part)
    }

    #[test]
    fn test_cycles_reassemblies() {
        let script = script(json!({"key1": ["re1", "re2", "re3"]}), json!({}));
        let mut states = RuleStates::new(&script);
        let mut memory = Memory::new(10);
        let replies: Vec<String> = (0..4)
            .map(|_| run(&script, &mut states, &mut memory, "key1", "bla key1 bla").unwrap())
            .collect();
        assert_eq!(replies, vec!["re1", "re2", "re3", "re1"]);
        assert_eq!(states.get(0, 0).unwrap().last_choice, 0);
        states.reset();
        assert_eq!(states.get(0, 0).unwrap().last_choice, -1);
    }

    #[test]
    fn test_parameters_and_post() {
        let script = script(
            json!({"my": {"* my *": ["Why your $2?$0$9 ($1)"]}}),
            json!({"i": "you", "me": "you"}),
        );
        let mut states = RuleStates::new(&script);
        let mut memory = Memory::new(10);
        let reply = run(&script, &mut states, &mut memory, "my", "so my friend hates me").unwrap();
        assert_eq!(reply, "Why your friend hates you? (so)");
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let script = script(
            json!({"key1": {"* key1 x *": "specific $2", "* key1 *": "generic $2"}}),
            json!({}),
        );
        let mut states = RuleStates::new(&script);
        let mut memory = Memory::new(10);
        assert_eq!(
            run(&script, &mut states, &mut memory, "key1", "bla key1 x bla").unwrap(),
            "specific bla"
        );
        assert_eq!(
            run(&script, &mut states, &mut memory, "key1", "bla key1 bla").unwrap(),
            "generic bla"
        );
    }

    #[test]
    fn test_memory_rule_banks_and_continues() {
        let script = script(
            json!({"my": {"@ * my *": "Earlier you said your $2.", "*": "Go on."}}),
            json!({}),
        );
        let mut states = RuleStates::new(&script);
        let mut memory = Memory::new(10);
        let reply = run(&script, &mut states, &mut memory, "my", "my car is broken").unwrap();
        assert_eq!(reply, "Go on.");
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_redirect_cycle_is_bounded() {
        let script = script(json!({"a": "= b", "b": "= a"}), json!({}));
        let mut states = RuleStates::new(&script);
        let mut memory = Memory::new(10);
        let err = run(&script, &mut states, &mut memory, "a", "a b").unwrap_err();
        assert!(matches!(err, ElizaError::RedirectCycle { depth: 16, .. }));
    }

    #[test]
    fn test_unknown_redirect_is_literal() {
        let script = script(json!({"a": "= nowhere"}), json!({}));
        let mut states = RuleStates::new(&script);
        let mut memory = Memory::new(10);
        assert_eq!(
            run(&script, &mut states, &mut memory, "a", "a").unwrap(),
            "= nowhere"
        );
    }
}
