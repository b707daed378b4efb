//! Conversation sessions.
//!
//! An [`ElizaSession`] owns everything that changes during a conversation:
//! reassembly cycling state, pool orders and counters, the memory queue, the
//! RNG and the quit flag. The compiled script itself is never mutated, so
//! one [`CompiledScript`] can back any number of sessions.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ElizaOptions;
use crate::error::{ElizaError, Result};
use crate::executor::{Executor, RuleStates};
use crate::loader;
use crate::memory::Memory;
use crate::normalize::{contract_whitespace, Normalizer};
use crate::rng::{shuffle_fixed, RandomSource, SeededRandom};
use crate::script::{type_name, CompiledScript};

/// Builds the session RNG from the configured seed (`None` = entropy).
pub type RandomFactory = Box<dyn Fn(Option<u64>) -> Box<dyn RandomSource> + Send + Sync>;

/// Round-robin position into one reply pool.
#[derive(Debug, Clone)]
struct Pool {
    last: isize,
    order: Vec<usize>,
}

impl Pool {
    fn new(len: usize) -> Self {
        Self {
            last: -1,
            order: (0..len).collect(),
        }
    }

    fn reset(&mut self) {
        self.last = -1;
        for (pos, idx) in self.order.iter_mut().enumerate() {
            *idx = pos;
        }
    }

    /// Advance and return the index of the next entry. When the cycle wraps
    /// to the start and `reshuffle` is set, everything after the first
    /// `reshuffle` entries is shuffled first.
    fn advance(&mut self, reshuffle: Option<usize>, rng: &mut dyn RandomSource) -> Option<usize> {
        let len = self.order.len();
        if len == 0 {
            return None;
        }
        let next = usize::try_from(self.last + 1).unwrap_or(0);
        let next = if next >= len { 0 } else { next };
        if next == 0 {
            if let Some(keep) = reshuffle {
                shuffle_fixed(&mut self.order, keep, rng);
            }
        }
        self.last = next as isize;
        self.order.get(next).copied()
    }
}

/// A single conversation with a compiled script.
pub struct ElizaSession {
    script: Arc<CompiledScript>,
    rules: RuleStates,
    memory: Memory,
    rng: Box<dyn RandomSource>,
    rng_factory: RandomFactory,
    quit: bool,
    initial: Pool,
    r#final: Pool,
    none: Pool,
    empty: Pool,
}

impl ElizaSession {
    /// Start a session on an already compiled script.
    pub fn new(script: Arc<CompiledScript>) -> Self {
        Self::with_random_source(
            script,
            Box::new(|seed: Option<u64>| {
                Box::new(SeededRandom::new(seed)) as Box<dyn RandomSource>
            }),
        )
    }

    /// Start a session that draws its randomness from `factory`.
    ///
    /// The factory is called with the configured seed on construction and on
    /// every [`reset`](Self::reset).
    pub fn with_random_source(script: Arc<CompiledScript>, factory: RandomFactory) -> Self {
        let options = script.options();
        let rng = factory(options.seed());
        Self {
            rules: RuleStates::new(&script),
            memory: Memory::new(options.memory_size),
            rng,
            rng_factory: factory,
            quit: false,
            initial: Pool::new(script.initial.len()),
            r#final: Pool::new(script.r#final.len()),
            none: Pool::new(script.none.len()),
            empty: Pool::new(script.empty.len()),
            script,
        }
    }

    /// Compile a raw script document and start a session on it.
    ///
    /// # Errors
    ///
    /// Returns [`ElizaError::Script`] when the script is malformed.
    pub fn from_value(raw: &Value, options: &ElizaOptions) -> Result<Self> {
        let script = CompiledScript::compile(raw, options)?;
        Ok(Self::new(Arc::new(script)))
    }

    /// Load a script in authoring format (comments, trailing commas) and
    /// start a session on it.
    pub fn from_script_text(text: &str, options: &ElizaOptions) -> Result<Self> {
        Self::from_value(&loader::read_script(text)?, options)
    }

    /// Start a session on the bundled DOCTOR script.
    pub fn doctor(options: &ElizaOptions) -> Result<Self> {
        Self::from_value(&loader::doctor_script()?, options)
    }

    /// The compiled script backing this session.
    pub fn script(&self) -> &Arc<CompiledScript> {
        &self.script
    }

    /// Options in effect for this session.
    pub fn options(&self) -> &ElizaOptions {
        self.script.options()
    }

    /// Returns true once a quit phrase has been seen.
    pub fn is_quit(&self) -> bool {
        self.quit
    }

    /// Number of replies waiting in memory.
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    /// Return the session to the state of a freshly constructed one.
    pub fn reset(&mut self) {
        self.quit = false;
        self.memory.clear();
        self.rng = (self.rng_factory)(self.script.options().seed());
        self.rules.reset();
        self.initial.reset();
        self.r#final.reset();
        self.none.reset();
        self.empty.reset();
    }

    /// Next greeting. The first `fixed_initial` greetings keep their order;
    /// the rest are reshuffled every time the pool wraps around.
    pub fn get_initial(&mut self) -> String {
        let keep = self.script.options().fixed_initial;
        self.initial
            .advance(Some(keep), self.rng.as_mut())
            .and_then(|idx| self.script.initial.get(idx))
            .cloned()
            .unwrap_or_default()
    }

    /// Next farewell, cycled like [`get_initial`](Self::get_initial).
    pub fn get_final(&mut self) -> String {
        let keep = self.script.options().fixed_final;
        self.r#final
            .advance(Some(keep), self.rng.as_mut())
            .and_then(|idx| self.script.r#final.get(idx))
            .cloned()
            .unwrap_or_default()
    }

    /// Produce the reply to one line of user input.
    pub fn transform(&mut self, text: &str) -> String {
        let reply = self.reply_for(text);
        let reply = if self.script.options().lowercase_output {
            reply.to_lowercase()
        } else {
            reply
        };
        contract_whitespace(&reply)
    }

    /// [`transform`](Self::transform) for input coming from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ElizaError::Input`] when `input` is not a string. The
    /// session is left untouched and stays usable.
    pub fn transform_value(&mut self, input: &Value) -> Result<String> {
        match input {
            Value::String(text) => Ok(self.transform(text)),
            other => Err(ElizaError::input(format!(
                "transform expects a string (not {})",
                type_name(other)
            ))),
        }
    }

    fn reply_for(&mut self, text: &str) -> String {
        if self.quit {
            debug!("session already quit");
            return self.get_final();
        }

        let script = Arc::clone(&self.script);
        let options = script.options();
        let normalized = script.normalizer().normalize(text);
        debug!(normalized = %normalized, "transforming");

        if !script.quit_substrings.is_empty() {
            let haystack = normalized.to_lowercase();
            let hit = script.quit_substrings.iter().any(|phrase| {
                let phrase = contract_whitespace(phrase).to_lowercase();
                !phrase.is_empty() && haystack.contains(&phrase)
            });
            if hit {
                self.quit = true;
                return self.get_final();
            }
        }

        let parts = Normalizer::split_parts(&normalized);
        debug!(?parts, "parts");

        if parts.is_empty() {
            let reshuffle = options.shuffle_choices.then_some(0);
            if let Some(reply) = self
                .empty
                .advance(reshuffle, self.rng.as_mut())
                .and_then(|idx| script.empty.get(idx))
                .filter(|reply| !reply.is_empty())
            {
                debug!(reply = %reply, "using empty reply");
                return reply.clone();
            }
        }

        for (part_idx, part) in parts.iter().enumerate() {
            if script.quit.iter().any(|q| q == part) {
                self.quit = true;
                return self.get_final();
            }

            let part = script.pre.apply(part);
            for (keyword_idx, keyword) in script.keywords.iter().enumerate() {
                if !keyword.is_in(&part) {
                    continue;
                }
                debug!(key = %keyword.key, part = part_idx, "keyword found");
                let mut executor = Executor {
                    script: &script,
                    rules: &mut self.rules,
                    memory: &mut self.memory,
                    rng: self.rng.as_mut(),
                };
                match executor.execute(keyword_idx, &part) {
                    Ok(reply) if !reply.is_empty() => {
                        debug!(reply = %reply, "reply");
                        return reply;
                    }
                    Ok(_) => {}
                    Err(err) => warn!(key = %keyword.key, error = %err, "keyword skipped"),
                }
            }
        }

        debug!("no reply generated through keywords");
        if let Some(reply) = self
            .memory
            .pop(options.randomize_choices, self.rng.as_mut())
            .filter(|reply| !reply.is_empty())
        {
            debug!(reply = %reply, "using memorized reply");
            return reply;
        }

        let reshuffle = options.shuffle_choices.then_some(0);
        if let Some(reply) = self
            .none
            .advance(reshuffle, self.rng.as_mut())
            .and_then(|idx| script.none.get(idx))
            .filter(|reply| !reply.is_empty())
        {
            debug!(reply = %reply, "using none reply");
            return reply.clone();
        }

        debug!(reply = %options.fallback_reply, "using fallback reply");
        options.fallback_reply.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session(keywords: Value) -> ElizaSession {
        let raw = json!({
            "initial": ["init1", "init2"],
            "final": ["final1", "final2"],
            "quit": ["quit1", "quit2"],
            "none": ["none1", "none2"],
            "pre": {},
            "post": {},
            "tags": {},
            "keywords": keywords
        });
        let options = ElizaOptions::default().with_seed(0).with_fallback_reply("fallback");
        ElizaSession::from_value(&raw, &options).unwrap()
    }

    #[test]
    fn test_pool_cycles() {
        let mut rng = SeededRandom::new(Some(0));
        let mut pool = Pool::new(3);
        let picks: Vec<Option<usize>> = (0..4).map(|_| pool.advance(None, &mut rng)).collect();
        assert_eq!(picks, vec![Some(0), Some(1), Some(2), Some(0)]);
        assert_eq!(Pool::new(0).advance(None, &mut rng), None);
    }

    #[test]
    fn test_pool_fixed_prefix_survives_reshuffle() {
        let mut rng = SeededRandom::new(Some(9));
        let mut pool = Pool::new(5);
        for _ in 0..3 {
            assert_eq!(pool.advance(Some(2), &mut rng), Some(0));
            assert_eq!(pool.advance(Some(2), &mut rng), Some(1));
            let mut rest: Vec<usize> = (0..3)
                .filter_map(|_| pool.advance(Some(2), &mut rng))
                .collect();
            rest.sort_unstable();
            assert_eq!(rest, vec![2, 3, 4]);
        }
    }

    #[test]
    fn test_none_then_memory_priority() {
        let mut s = session(json!({
            "my": {"@ * my *": "Earlier: your $2.", "* my *": "Your $2?"}
        }));
        assert_eq!(s.transform("bla bla"), "none1");
        assert_eq!(s.transform("my cat"), "Your cat?");
        assert_eq!(s.memory_len(), 1);
        assert_eq!(s.transform("bla"), "Earlier: your cat.");
        assert_eq!(s.transform("bla"), "none2");
    }

    #[test]
    fn test_quit_is_sticky_until_reset() {
        let mut s = session(json!({"key": "reply"}));
        assert!(!s.is_quit());
        let bye = s.transform("bla. quit1. key");
        assert!(s.is_quit());
        assert!(bye == "final1" || bye == "final2");
        let again = s.transform("key");
        assert!(s.is_quit());
        assert!(again == "final1" || again == "final2");
        s.reset();
        assert!(!s.is_quit());
        assert_eq!(s.transform("key"), "reply");
    }

    #[test]
    fn test_transform_value_rejects_non_strings() {
        let mut s = session(json!({"key": "reply"}));
        let err = s.transform_value(&json!(42)).unwrap_err();
        assert!(matches!(err, ElizaError::Input(_)));
        assert_eq!(s.transform_value(&json!("key")).unwrap(), "reply");
    }

    #[test]
    fn test_redirect_cycle_falls_through() {
        let mut s = session(json!({"a 1": "= b", "b": "= a", "c": "see"}));
        assert_eq!(s.transform("a c"), "see");
        assert_eq!(s.transform("a"), "none1");
    }
}
