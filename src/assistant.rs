//! Remote assistant over an OpenAI-compatible chat-completions endpoint.

use anyhow::{Context as _, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AssistantConfig;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that gives clear, direct answers.";

fn user_prompt(text: &str) -> String {
    format!(
        "Analyze the following text and give a clear, direct answer.\n\
         If it is a question, answer it concisely.\n\
         If it is a problem, provide the solution.\n\
         If it is code, fix or complete it.\n\
         \n\
         Text: {text}\n\
         \n\
         Answer:"
    )
}

/// Sends extracted text to the remote model. All transport, auth, quota,
/// and malformed-response faults surface uniformly as errors; there is no
/// retry policy.
pub trait Assistant: Send + Sync {
    fn ask(&self, text: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Blocking HTTP client for the configured chat endpoint.
pub struct ChatAssistant {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl ChatAssistant {
    pub fn new(config: &AssistantConfig) -> Result<Self> {
        let api_key = Some(config.api_key.clone()).filter(|k| !k.is_empty());
        if api_key.is_none() {
            // Logged once here; each query then fails without a network call
            warn!("no assistant API key configured, queries will fail");
        }
        let client = reqwest::blocking::Client::builder()
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

impl Assistant for ChatAssistant {
    fn ask(&self, text: &str) -> Result<String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("assistant API key not configured"))?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(text),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!("querying {} ({})", self.base_url, self.model);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(&request)
            .send()
            .context("chat request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("chat endpoint returned {status}: {body}");
        }

        let parsed: ChatResponse = response.json().context("malformed chat response")?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("chat response contained no choices"))?;
        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn assistant_for(base_url: &str, api_key: &str) -> ChatAssistant {
        ChatAssistant::new(&AssistantConfig {
            base_url: base_url.to_string(),
            preset: None,
            model: "test-model".to_string(),
            api_key: api_key.to_string(),
            temperature: 0.7,
            max_tokens: 500,
        })
        .expect("client build failed")
    }

    /// Serves exactly one canned HTTP response on a loopback listener.
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind failed");
        let addr = listener.local_addr().expect("no local addr");
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 8192];
                let _ = stream.read(&mut request);
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}")
    }

    #[test]
    fn returns_trimmed_content_on_success() {
        let base = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"  42  "}}]}"#,
        );
        let answer = assistant_for(&base, "test-key").ask("what is 6 x 7").unwrap();
        assert_eq!(answer, "42");
    }

    #[test]
    fn error_status_is_an_error_not_a_panic() {
        let base = serve_once("429 Too Many Requests", r#"{"error":"quota"}"#);
        let result = assistant_for(&base, "test-key").ask("hello");
        assert!(result.is_err());
    }

    #[test]
    fn empty_choices_is_an_error() {
        let base = serve_once("200 OK", r#"{"choices":[]}"#);
        assert!(assistant_for(&base, "test-key").ask("hello").is_err());
    }

    #[test]
    fn missing_key_fails_without_a_network_call() {
        // Reserved TEST-NET-1 address: a connection attempt would hang or
        // error, but the key check must reject the call first
        let assistant = assistant_for("http://192.0.2.1", "");
        let result = assistant.ask("hello");
        assert!(result.unwrap_err().to_string().contains("API key"));
    }
}
