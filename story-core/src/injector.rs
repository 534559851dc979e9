//! Probabilistic character injection.
//!
//! Once per turn the injector may ask the model to invent a character and
//! wraps the answer into a developer directive for the next turn's context.

use crate::backend::ModelBackend;
use crate::config::DEFAULT_INJECTION_PROBABILITY;
use crate::error::StoryResult;
use crate::prompts;
use crate::random::{RandomSource, ThreadRandom};
use crate::segment::StorySegment;
use std::sync::Arc;

/// Decides whether a turn gets a new character, and fetches one if so.
#[derive(Clone)]
pub struct CharacterInjector {
    probability: f64,
    random: Arc<dyn RandomSource>,
}

impl Default for CharacterInjector {
    fn default() -> Self {
        Self::new(DEFAULT_INJECTION_PROBABILITY)
    }
}

impl CharacterInjector {
    /// An injector firing with `probability`, driven by the thread RNG.
    pub fn new(probability: f64) -> Self {
        Self {
            probability,
            random: Arc::new(ThreadRandom),
        }
    }

    /// Replace the random source.
    pub fn with_random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    /// Roll for this turn.
    pub fn should_inject(&self) -> bool {
        self.random.next_unit() < self.probability
    }

    /// Maybe produce a character introduction for this turn.
    ///
    /// Returns `Ok(None)` when the roll misses. When it hits, a non-textual
    /// model reply fails the whole call.
    pub async fn maybe_introduce(
        &self,
        backend: &dyn ModelBackend,
    ) -> StoryResult<Option<StorySegment>> {
        if !self.should_inject() {
            return Ok(None);
        }

        let reply = backend.post_character_prompt(prompts::NEW_CHARACTER).await?;
        let description = reply.text().inspect_err(|e| {
            tracing::error!(error = %e, "Character prompt returned no usable description");
        })?;

        tracing::info!(description, "Introducing new character");
        Ok(Some(StorySegment::developer(prompts::character_introduction(
            description,
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ModelReply;
    use crate::error::StoryError;
    use crate::random::{FixedRandom, SeededRandom};
    use crate::segment::Role;
    use crate::testing::MockBackend;

    #[tokio::test]
    async fn test_miss_makes_no_call() {
        let backend = MockBackend::new();
        let injector = CharacterInjector::new(0.3).with_random_source(Arc::new(FixedRandom(0.9)));

        let segment = injector.maybe_introduce(&backend).await.unwrap();
        assert!(segment.is_none());
        assert_eq!(backend.character_prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_hit_wraps_description() {
        let backend = MockBackend::new().with_character_reply(ModelReply::assistant("a one-eyed smuggler"));
        let injector = CharacterInjector::new(0.3).with_random_source(Arc::new(FixedRandom(0.1)));

        let segment = injector.maybe_introduce(&backend).await.unwrap().unwrap();
        assert_eq!(segment.role, Role::Developer);
        assert!(segment.id.is_some());
        assert!(segment.content.ends_with(": a one-eyed smuggler"));
        assert_eq!(backend.character_prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_non_text_description_fails() {
        let backend = MockBackend::new().with_character_reply(ModelReply::assistant(serde_json::json!(null)));
        let injector = CharacterInjector::new(1.0).with_random_source(Arc::new(FixedRandom(0.0)));

        let result = injector.maybe_introduce(&backend).await;
        assert!(matches!(result, Err(StoryError::Validation(_))));
    }

    #[test]
    fn test_rate_converges_to_probability() {
        let trials = 20_000;
        for p in [0.1, 0.3, 0.75] {
            let injector = CharacterInjector::new(p).with_random_source(Arc::new(SeededRandom::new(42)));
            let hits = (0..trials).filter(|_| injector.should_inject()).count();
            let rate = hits as f64 / trials as f64;
            assert!((rate - p).abs() < 0.02, "rate {rate} too far from {p}");
        }
    }

    #[test]
    fn test_bounds() {
        let never = CharacterInjector::new(0.0).with_random_source(Arc::new(FixedRandom(0.0)));
        assert!(!never.should_inject());
        let always = CharacterInjector::new(1.0).with_random_source(Arc::new(FixedRandom(0.999)));
        assert!(always.should_inject());
    }
}
