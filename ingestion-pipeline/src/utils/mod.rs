pub mod document;
pub mod identify;
pub mod llm_instructions;
pub mod segmenter;
