pub mod clusterer;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod format_finder;
pub mod generator;
pub mod merger;
pub mod message;
pub mod normalizer;
pub mod overlap;
pub mod preprocessor;
pub mod range;
pub mod retransform;
pub mod xor_matrix;

pub use config::{BitsleuthConfig, InferenceConfig};
pub use corpus::{CorpusError, CorpusFormat, MessageCorpus};
pub use engine::{AddressEngine, Engine, EngineContext, EngineError, LengthEngine};
pub use error::InferenceError;
pub use format_finder::{FormatFinder, Inference};
pub use generator::{FieldSpec, MessageTypeSpec, ProtocolGenerator};
pub use merger::LabelSet;
pub use message::{Message, MessageError};
pub use preprocessor::{
    Boundaries, FixedBoundaries, PatternPreprocessor, PreprocessError, Preprocessor,
};
pub use range::{CandidateRange, CommonBitRange, CommonRangeContainer, EmptyRange, FieldType};
pub use xor_matrix::XorMatrix;
