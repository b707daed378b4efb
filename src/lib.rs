//! # ELIZA Script Engine
//!
//! A data-driven implementation of Joseph Weizenbaum's ELIZA (MIT, 1966).
//! All conversational behaviour lives in a script: greetings, farewells,
//! substitution tables, word tags and ranked keywords whose decomposition
//! rules are matched against the user's input and answered by cycling
//! through reassembly templates.
//!
//! ## Features
//!
//! - Ranked keywords with wildcard and tag decomposition patterns
//! - Pronoun reflection through `pre` and `post` substitution tables
//! - Memory rules whose replies surface on a later turn
//! - Redirects between keywords with a bounded depth
//! - Seedable, per-session randomness; scripts are shared read-only
//! - A bundled DOCTOR script
//!
//! ## Example
//!
//! ```rust
//! use elizaos_eliza_script::{ElizaOptions, ElizaSession};
//!
//! let mut eliza = ElizaSession::doctor(&ElizaOptions::default()).unwrap();
//! println!("{}", eliza.get_initial());
//! let response = eliza.transform("I am feeling sad today");
//! assert!(!response.is_empty());
//! ```

#![warn(missing_docs)]

pub mod config;
#[cfg(feature = "async")]
pub mod delay;
pub mod error;
pub(crate) mod executor;
pub mod loader;
pub mod memory;
pub mod normalize;
pub mod patterns;
pub mod rng;
pub mod script;
pub mod session;

pub use config::ElizaOptions;
#[cfg(feature = "async")]
pub use delay::Delay;
pub use error::{ElizaError, Result};
pub use rng::{RandomSource, SeededRandom};
pub use script::{CompiledScript, Keyword, KeywordBody, Rule};
pub use session::{ElizaSession, RandomFactory};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doctor_greeting() {
        let mut eliza = ElizaSession::doctor(&ElizaOptions::default()).unwrap();
        assert_eq!(
            eliza.get_initial(),
            "How do you do. Please tell me your problem."
        );
    }

    #[test]
    fn test_doctor_computer() {
        let mut eliza = ElizaSession::doctor(&ElizaOptions::default()).unwrap();
        let response = eliza.transform("Do you know anything about computers?");
        assert_eq!(response, "Do computers worry you?");
    }

    #[test]
    fn test_doctor_sad() {
        let mut eliza = ElizaSession::doctor(&ElizaOptions::default()).unwrap();
        let response = eliza.transform("I am sad");
        assert_eq!(response, "I am sorry to hear that you are sad.");
    }

    #[test]
    fn test_doctor_empty_input() {
        let mut eliza = ElizaSession::doctor(&ElizaOptions::default()).unwrap();
        assert_eq!(
            eliza.transform("   "),
            "You don't have to say anything, but I'm listening."
        );
    }

    #[test]
    fn test_doctor_goodbye() {
        let mut eliza = ElizaSession::doctor(&ElizaOptions::default()).unwrap();
        assert_eq!(eliza.transform("Bye"), "Goodbye. It was nice talking to you.");
        assert!(eliza.is_quit());
    }
}
