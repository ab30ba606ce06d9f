//! Default values for configuration

/// Default direct sharing endpoint (OAuth token strategy)
pub fn default_direct_url() -> String {
    std::env::var("TUBEDIGEST_DIRECT_URL")
        .unwrap_or_else(|_| "https://300.ya.ru/api/sharing-url".to_string())
}

/// Default session generation endpoint (cookie session strategy)
pub fn default_session_url() -> String {
    std::env::var("TUBEDIGEST_SESSION_URL")
        .unwrap_or_else(|_| "https://300.ya.ru/api/generation".to_string())
}

/// Default environment variable holding the OAuth token
pub fn default_token_env() -> String {
    "YANDEX_API_TOKEN".to_string()
}

/// Default environment variable holding the session cookie value
pub fn default_session_env() -> String {
    "YANDEX_SESSION_ID".to_string()
}

/// Default acquisition request timeout in seconds
pub fn default_acquisition_timeout() -> u64 {
    30
}

/// Default ceiling on session polls
pub fn default_max_poll_attempts() -> u32 {
    30
}

/// Default poll interval when the server does not send one
pub fn default_poll_interval_ms() -> u64 {
    1000
}

/// Minimum thesis count before an outline is accepted
pub fn default_min_outline_theses() -> usize {
    3
}

/// Default user agent
pub fn default_user_agent() -> String {
    format!("tubedigest/{} (Video Digest)", env!("CARGO_PKG_VERSION"))
}

/// Default chat completions base URL
pub fn default_models_api_url() -> String {
    std::env::var("TUBEDIGEST_MODELS_URL")
        .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string())
}

/// Default environment variable holding the model API key
pub fn default_models_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

/// Default summarization models, tried in order
pub fn default_summary_models() -> Vec<String> {
    vec![
        "microsoft/mai-ds-r1:free".to_string(),
        "meta-llama/llama-3.3-70b-instruct:free".to_string(),
        "google/gemma-3-27b-it:free".to_string(),
    ]
}

/// Default token budget ladder, largest first
pub fn default_token_budgets() -> Vec<u32> {
    vec![64000, 32000, 16000, 8000, 4000, 2000]
}

/// Default sampling temperature
pub fn default_temperature() -> f32 {
    0.7
}

/// Default model request timeout in seconds
pub fn default_models_timeout() -> u64 {
    120
}

/// Default token budget for the condensed digest
pub fn default_condense_max_tokens() -> u32 {
    512
}

/// Default pause between full analysis and condensation
pub fn default_condense_pause_secs() -> u64 {
    2
}

/// Response fragments that mark a backend with no capacity
pub fn default_no_capacity_markers() -> Vec<String> {
    vec!["no instances".to_string(), "no capacity".to_string()]
}

/// Default age after which a processing item counts as stuck
pub fn default_stale_minutes() -> i64 {
    30
}

/// Default number of items processed per cycle
pub fn default_max_items_per_cycle() -> usize {
    1
}

/// Default retention window for cleanup
pub fn default_retention_days() -> i64 {
    30
}
