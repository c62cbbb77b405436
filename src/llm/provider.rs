//! Model reference parsing and provider selection
//!
//! A single configuration string such as `anthropic/claude-opus-4.5` or
//! `anthropic:claude-sonnet-4-5-20250929` names both a provider and a model.
//! It is parsed once into a [`ModelRef`] and the provider route is decided
//! once into a [`ModelSelection`].

use std::fmt;

use tracing::{info, warn};

use crate::config::{
    DEFAULT_MODEL, DEFAULT_SITE_NAME, DEFAULT_SITE_URL, MODEL_ENV, OPENROUTER_API_KEY_ENV,
    SITE_NAME_ENV, SITE_URL_ENV,
};
use crate::env::EnvSource;

/// Provider prefix the direct fallback client serves
pub const DIRECT_PROVIDER: &str = "anthropic";

/// A model identifier with its optional provider prefix split off
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    /// The configuration string exactly as given
    pub raw: String,
    /// Provider prefix, if the string carried one
    pub provider: Option<String>,
    /// Model name with the prefix removed
    pub name: String,
}

impl ModelRef {
    /// Parse a model string.
    ///
    /// `provider:model` is checked first and split on the first colon;
    /// otherwise `provider/model` is split on the first slash. Only one
    /// split ever applies, so `foo:bar/baz` yields the name `bar/baz`.
    pub fn parse(raw: &str) -> Self {
        let split = raw.split_once(':').or_else(|| raw.split_once('/'));
        let (provider, name) = match split {
            Some((provider, name)) => (Some(provider.to_string()), name.to_string()),
            None => (None, raw.to_string()),
        };
        Self {
            raw: raw.to_string(),
            provider,
            name,
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Which provider route serves the model.
///
/// Exactly one variant is chosen per resolution; a default model is always
/// present so there is no "neither" case.
#[derive(Clone, PartialEq, Eq)]
pub enum ModelSelection {
    /// OpenAI-compatible OpenRouter gateway; the model string is sent verbatim
    OpenRouter {
        model: ModelRef,
        api_key: String,
        site_url: String,
        site_name: String,
    },
    /// Direct provider API; the provider prefix is stripped
    Direct { model: ModelRef },
}

impl ModelSelection {
    /// Decide the provider route from environment state.
    ///
    /// A non-empty `OPENROUTER_API_KEY` selects OpenRouter regardless of the
    /// model string's format. Otherwise the direct provider is used.
    pub fn resolve(env: &impl EnvSource) -> Self {
        let model = ModelRef::parse(&env.var_or(MODEL_ENV, DEFAULT_MODEL));

        let selection = match env.var(OPENROUTER_API_KEY_ENV) {
            Some(api_key) => Self::OpenRouter {
                model,
                api_key,
                site_url: env.var_or(SITE_URL_ENV, DEFAULT_SITE_URL),
                site_name: env.var_or(SITE_NAME_ENV, DEFAULT_SITE_NAME),
            },
            None => {
                if let Some(provider) = model.provider.as_deref() {
                    if provider != DIRECT_PROVIDER {
                        warn!(
                            "No {} set; sending {:?} (provider {:?}) to the {} API",
                            OPENROUTER_API_KEY_ENV, model.name, provider, DIRECT_PROVIDER
                        );
                    }
                }
                Self::Direct { model }
            }
        };

        info!("Model selection: {:?}", selection);
        selection
    }

    /// The model name sent to the provider
    pub fn model_name(&self) -> &str {
        match self {
            Self::OpenRouter { model, .. } => &model.raw,
            Self::Direct { model } => &model.name,
        }
    }

    pub fn model(&self) -> &ModelRef {
        match self {
            Self::OpenRouter { model, .. } | Self::Direct { model } => model,
        }
    }

    /// Short route label for logs and diagnostics
    pub fn route(&self) -> &'static str {
        match self {
            Self::OpenRouter { .. } => "openrouter",
            Self::Direct { .. } => DIRECT_PROVIDER,
        }
    }

    pub fn is_openrouter(&self) -> bool {
        matches!(self, Self::OpenRouter { .. })
    }
}

// Keeps the API key out of logs
impl fmt::Debug for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenRouter {
                model,
                site_url,
                site_name,
                ..
            } => f
                .debug_struct("OpenRouter")
                .field("model", &model.raw)
                .field("api_key", &"<redacted>")
                .field("site_url", site_url)
                .field("site_name", site_name)
                .finish(),
            Self::Direct { model } => f
                .debug_struct("Direct")
                .field("model", &model.name)
                .finish(),
        }
    }
}
