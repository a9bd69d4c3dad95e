//! Live test against a real chat-completions endpoint.
//!
//! Requires OPENAI_API_KEY. Run with:
//! cargo test --features integ_test --test live_gateway

#[cfg(feature = "integ_test")]
mod tests {
    use kanabot::config::GatewayConfig;
    use kanabot::gateway::{Gateway, OpenAiClient};

    fn client() -> Option<OpenAiClient> {
        let Ok(api_key) = std::env::var("OPENAI_API_KEY") else {
            eprintln!("Skipping test: OPENAI_API_KEY not set");
            return None;
        };
        let config = GatewayConfig {
            api_key,
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            timeout_secs: 60,
        };
        Some(OpenAiClient::new(config).expect("Failed to build client"))
    }

    #[tokio::test]
    async fn test_assistant_answer() {
        let Some(client) = client() else { return };
        let answer = client
            .complete(Some("Answer with a single word."), "What color is the sky on a clear day?")
            .await
            .expect("completion failed");
        println!("Answer: {answer}");
        assert!(answer.to_lowercase().contains("blue"), "unexpected answer: {answer}");
    }

    #[tokio::test]
    async fn test_translation_to_japanese() {
        let Some(client) = client() else { return };
        let answer = client
            .complete(None, "次の文章を日本語に自然な口調で翻訳してください：\nThank you")
            .await
            .expect("completion failed");
        println!("Translated: {answer}");
        assert!(kanabot::language::detect(&answer) == kanabot::language::Language::Home);
    }

    #[tokio::test]
    async fn test_bad_key_is_an_api_error() {
        let config = GatewayConfig {
            api_key: "sk-invalid".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            timeout_secs: 30,
        };
        let client = OpenAiClient::new(config).unwrap();
        let err = client.complete(None, "hi").await.unwrap_err();
        println!("Error: {err}");
        assert!(matches!(err, kanabot::gateway::GatewayError::Api { status: 401, .. }));
    }
}
