// Content generation core: prompt building, response parsing, exemplar selection.
// All LLM calls go through llm_client — no direct Anthropic calls here.

pub mod content_selector;
pub mod parsing;
pub mod prompts;
