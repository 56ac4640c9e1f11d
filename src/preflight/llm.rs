//! Shape check of the LLM settings handed to the agent. No network calls.

use crate::config::LlmSettings;

const SUPPORTED: &str = "openai, gemini";

pub fn check_llm_settings(llm: &LlmSettings) -> Result<(), String> {
    let (provider, shown) = match (&llm.llm_model, &llm.openai_model) {
        (Some(model), _) => match model.split_once('/') {
            Some((provider, name)) if !provider.is_empty() && !name.is_empty() => {
                (provider.to_ascii_lowercase(), model.clone())
            }
            _ => {
                return Err(format!(
                    "LLM_MODEL format is invalid. Expected 'provider/model' (e.g., 'openai/gpt-4'), got: {}",
                    model
                ));
            }
        },
        (None, Some(model)) => ("openai".to_string(), format!("openai/{}", model)),
        (None, None) => {
            return Err("LLM configuration is missing. Please set either LLM_MODEL \
                        (e.g., 'openai/gpt-4') or OPENAI_MODEL environment variable."
                .to_string());
        }
    };

    match provider.as_str() {
        "openai" if llm.openai_api_key.is_none() => Err(format!(
            "LLM_MODEL is set to '{}' but OPENAI_API_KEY is not set.",
            shown
        )),
        "gemini" if llm.google_api_key.is_none() && llm.gemini_api_key.is_none() => Err(format!(
            "LLM_MODEL is set to '{}' but neither GOOGLE_API_KEY nor GEMINI_API_KEY is set.",
            shown
        )),
        "openai" | "gemini" => Ok(()),
        other => Err(format!(
            "Unsupported LLM provider: {}. Supported providers are: {}",
            other, SUPPORTED
        )),
    }
}
