//! Engine configuration.

use std::path::PathBuf;

/// Default chance that a turn asks the model for a new character.
pub const DEFAULT_INJECTION_PROBABILITY: f64 = 0.3;

/// Configuration for a story engine.
#[derive(Debug, Clone)]
pub struct StoryConfig {
    /// Directory character images are written to.
    pub assets_dir: PathBuf,

    /// File extension of stored images, without the dot.
    pub image_extension: String,

    /// Probability in `[0, 1]` of a character injection per turn.
    pub injection_probability: f64,

    /// Chat model override.
    pub chat_model: Option<String>,

    /// Image model override.
    pub image_model: Option<String>,

    /// Requested image size, e.g. `1024x1024`.
    pub image_size: Option<String>,

    /// Maximum tokens for story replies.
    pub max_tokens: Option<usize>,

    /// Temperature for story generation.
    pub temperature: Option<f32>,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            image_extension: "png".to_string(),
            injection_probability: DEFAULT_INJECTION_PROBABILITY,
            chat_model: None,
            image_model: None,
            image_size: None,
            max_tokens: None,
            temperature: Some(0.8),
        }
    }
}

impl StoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from `STORY_*` environment variables.
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dir) = env_value("STORY_ASSETS_DIR") {
            config.assets_dir = PathBuf::from(dir);
        }
        if let Some(p) = env_value("STORY_INJECTION_PROBABILITY").and_then(|v| v.parse().ok()) {
            config = config.with_injection_probability(p);
        }
        if let Some(model) = env_value("STORY_CHAT_MODEL") {
            config.chat_model = Some(model);
        }
        if let Some(model) = env_value("STORY_IMAGE_MODEL") {
            config.image_model = Some(model);
        }
        if let Some(size) = env_value("STORY_IMAGE_SIZE") {
            config.image_size = Some(size);
        }

        config
    }

    /// Set the assets directory.
    pub fn with_assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets_dir = dir.into();
        self
    }

    /// Set the injection probability, clamped to `[0, 1]`.
    pub fn with_injection_probability(mut self, probability: f64) -> Self {
        self.injection_probability = if probability.is_nan() {
            DEFAULT_INJECTION_PROBABILITY
        } else {
            probability.clamp(0.0, 1.0)
        };
        self
    }

    pub fn with_image_extension(mut self, ext: impl Into<String>) -> Self {
        self.image_extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = Some(model.into());
        self
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = Some(model.into());
        self
    }

    pub fn with_image_size(mut self, size: impl Into<String>) -> Self {
        self.image_size = Some(size.into());
        self
    }

    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
