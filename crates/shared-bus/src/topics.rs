//! Topic names used by the dream pipeline.

/// Prompts submitted by the bridge, consumed by workers.
pub const USER_PROMPT: &str = "template-generator.user_prompt";

/// Results published by workers, consumed by the ingestion path.
pub const LLM_RESPONSE: &str = "template-generator.llm_response";

/// Whole-mapping snapshots of the response cache.
pub const RESPONSE_CACHE: &str = "template-generator.response_cache";
