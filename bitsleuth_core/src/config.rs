use crate::corpus::CorpusFormat;
use crate::engine::{DEFAULT_MIN_LENGTH_SCORE, DEFAULT_N_GRAM_LENGTH, MIN_MESSAGES_PER_CLUSTER};
use crate::preprocessor::{
    DEFAULT_MAX_SYNC_LENGTH, DEFAULT_MIN_PREAMBLE_LENGTH, FixedBoundaries, PatternPreprocessor,
    Preprocessor,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Grid that sync ends are rounded down to, in bits.
pub const DEFAULT_SHORTEST_FIELD_LENGTH: usize = 8;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct InferenceSettings {
    #[serde(default = "default_shortest_field_length")]
    pub shortest_field_length: usize,
    #[serde(default = "default_min_messages_per_cluster")]
    pub min_messages_per_cluster: usize,
}

fn default_shortest_field_length() -> usize {
    DEFAULT_SHORTEST_FIELD_LENGTH
}

fn default_min_messages_per_cluster() -> usize {
    MIN_MESSAGES_PER_CLUSTER
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            shortest_field_length: default_shortest_field_length(),
            min_messages_per_cluster: default_min_messages_per_cluster(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PreprocessorKind {
    #[default]
    Pattern,
    /// Same preamble end and sync length for every message.
    Fixed,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct PreprocessorSettings {
    #[serde(default)]
    pub kind: PreprocessorKind,
    #[serde(default = "default_min_preamble_length")]
    pub min_preamble_length: usize,
    #[serde(default = "default_max_sync_length")]
    pub max_sync_length: usize,
    /// Used by the `fixed` kind for every message.
    #[serde(default)]
    pub preamble_end: usize,
    #[serde(default)]
    pub sync_length: usize,
}

fn default_min_preamble_length() -> usize {
    DEFAULT_MIN_PREAMBLE_LENGTH
}

fn default_max_sync_length() -> usize {
    DEFAULT_MAX_SYNC_LENGTH
}

impl Default for PreprocessorSettings {
    fn default() -> Self {
        Self {
            kind: PreprocessorKind::default(),
            min_preamble_length: default_min_preamble_length(),
            max_sync_length: default_max_sync_length(),
            preamble_end: 0,
            sync_length: 0,
        }
    }
}

impl PreprocessorSettings {
    /// Builds the configured preprocessor for a corpus of `num_messages` messages.
    pub fn build(&self, num_messages: usize) -> Box<dyn Preprocessor> {
        match self.kind {
            PreprocessorKind::Pattern => Box::new(PatternPreprocessor::new(
                self.min_preamble_length,
                self.max_sync_length,
            )),
            PreprocessorKind::Fixed => Box::new(FixedBoundaries::uniform(
                num_messages,
                self.preamble_end,
                self.sync_length,
            )),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct LengthEngineSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_n_gram_length")]
    pub n_gram_length: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

fn default_enabled() -> bool {
    true
}

fn default_n_gram_length() -> usize {
    DEFAULT_N_GRAM_LENGTH
}

fn default_min_score() -> f64 {
    DEFAULT_MIN_LENGTH_SCORE
}

impl Default for LengthEngineSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            n_gram_length: default_n_gram_length(),
            min_score: default_min_score(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct AddressEngineSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_n_gram_length")]
    pub n_gram_length: usize,
}

impl Default for AddressEngineSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            n_gram_length: default_n_gram_length(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct EngineSettings {
    #[serde(default)]
    pub length: LengthEngineSettings,
    #[serde(default)]
    pub address: AddressEngineSettings,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct CorpusSettings {
    pub path: PathBuf,
    #[serde(default)]
    pub format: CorpusFormat,
}

/// Everything a `FormatFinder` needs besides messages and a preprocessor.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub shortest_field_length: usize,
    pub min_messages_per_cluster: usize,
    pub length_engine: LengthEngineSettings,
    pub address_engine: AddressEngineSettings,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        BitsleuthConfig::default().inference_config()
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct BitsleuthConfig {
    #[serde(default)]
    pub inference: InferenceSettings,
    #[serde(default)]
    pub preprocessor: PreprocessorSettings,
    #[serde(default)]
    pub engines: EngineSettings,
    #[serde(default)]
    pub corpus: Option<CorpusSettings>,
}

impl BitsleuthConfig {
    /// Reads and parses a TOML config file.
    pub fn load_from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;
        Self::from_toml_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Extracts the settings a `FormatFinder` needs.
    pub fn inference_config(&self) -> InferenceConfig {
        InferenceConfig {
            shortest_field_length: self.inference.shortest_field_length,
            min_messages_per_cluster: self.inference.min_messages_per_cluster,
            length_engine: self.engines.length.clone(),
            address_engine: self.engines.address.clone(),
        }
    }
}
