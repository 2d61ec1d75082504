//! Token estimation
//!
//! A fixed approximation of 4 characters per token. Chunk sizing, the
//! chunking trigger and the rate limiter's usage fallback all go through
//! these functions, so a real tokenizer can replace them in one place.

/// Characters per token assumed by the approximation
pub const CHARS_PER_TOKEN: usize = 4;

/// Share of the model's context window a single chunk may use.
/// The remainder is left for the prompt and the response.
pub const CHUNK_BUDGET_RATIO: f64 = 0.8;

/// Estimate the token count of a text
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() / CHARS_PER_TOKEN) as u64
}

/// Largest estimated token count one chunk may carry for a model
pub fn max_tokens_per_chunk(token_limit: u64) -> u64 {
    (token_limit as f64 * CHUNK_BUDGET_RATIO).floor() as u64
}

/// Character budget corresponding to a token budget
pub fn chars_for_tokens(tokens: u64) -> usize {
    (tokens as usize).saturating_mul(CHARS_PER_TOKEN)
}

/// Whether content has to be split for a model with `token_limit`.
///
/// Compares characters against the chunk's character budget, so content a
/// few characters past a whole token is split rather than rounded down.
pub fn needs_chunking(content: &str, token_limit: u64) -> bool {
    content.chars().count() > chars_for_tokens(max_tokens_per_chunk(token_limit))
}
