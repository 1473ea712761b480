//! LLM client and LLM-backed graph extraction.

mod extractor;
mod llm;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use extractor::{
    conform_to_allow_list, EntityExtractor, ExtractedGraph, ExtractedNode,
    ExtractedRelationship, ExtractionConstraints, ExtractorError, LLMGraphTransformer,
    OutOfVocabulary,
};
pub use llm::{LLMClient, LLMError, Message, OpenAiLLMClient};

#[cfg(any(test, feature = "test-util"))]
pub use mock::MockLLMClient;
