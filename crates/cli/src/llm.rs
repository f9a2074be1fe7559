//! Oracles backed by an OpenAI-compatible chat-completions endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use toolforge_discovery::{ContentExtractor, RawEndpoint};
use toolforge_generation::{DisplayNamer, OracleError, SchemaSynthesizer, SynthesisRequest};

const EXTRACTION_PROMPT: &str = "Extract every HTTP API endpoint described in the documentation \
the user provides. Return only JSON: an object with an \"endpoints\" array whose items have \
\"method\", \"path\", \"server\", \"description\" and \"parameters\" (an array of objects with \
\"name\", \"in\", \"required\", \"description\" and \"schema\"). Return {\"endpoints\": []} if \
there are none.";

const SCHEMA_PROMPT: &str = "Write a JSON Schema (draft-07) for the parameters of the API \
endpoint the user describes. The root is an object whose properties are the groups \"header\", \
\"path\", \"query\" and \"body\" (omit empty groups). Every object node has \"type\", \
\"description\", \"properties\", \"required\" (possibly empty), \"visible\" (all property names) \
and \"additionalProperties\" (false unless the API accepts extra fields). Use enum, format, \
pattern, minimum/maximum, minLength/maxLength and default where the documentation supports \
them. Do not include \"$schema\". Return only the JSON document.";

const NAMING_PROMPT: &str = "Give the API endpoint the user describes a display name of two to \
five words in imperative style, like \"Search Flights\" or \"Create Booking\". No punctuation \
or underscores. Return only the name.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// One model behind a chat-completions URL.
#[derive(Debug, Clone)]
pub struct ChatModel {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl ChatModel {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/chat/completions", base_url.trim().trim_end_matches('/')),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model,
        })
    }

    /// Single system + user exchange; returns the first choice's text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, OracleError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };
        let mut req = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| OracleError::Request(e.without_url().to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(OracleError::Request(format!(
                "model endpoint returned HTTP {}",
                status.as_u16()
            )));
        }
        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| OracleError::Unusable(e.without_url().to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::Unusable("response has no message content".to_string()))
    }
}

/// All three oracles over chat models. Naming may use a smaller model.
pub struct LlmOracles {
    pub main: ChatModel,
    pub naming: ChatModel,
}

#[async_trait]
impl ContentExtractor for LlmOracles {
    async fn extract(&self, text: &str) -> Vec<RawEndpoint> {
        let answer = match self.main.complete(EXTRACTION_PROMPT, text).await {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!("Endpoint extraction failed: {}", e);
                return Vec::new();
            }
        };
        match parse_endpoints(&answer) {
            Ok(endpoints) => endpoints,
            Err(e) => {
                tracing::warn!("Endpoint extraction failed: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl SchemaSynthesizer for LlmOracles {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Value, OracleError> {
        let answer = self
            .main
            .complete(SCHEMA_PROMPT, &describe_endpoint(request))
            .await?;
        parse_json_object(&answer)
    }
}

#[async_trait]
impl DisplayNamer for LlmOracles {
    async fn display_name(
        &self,
        method: &str,
        path: &str,
        description: &str,
    ) -> Result<String, OracleError> {
        let user = format!("HTTP method: {method}\nPath: {path}\nDescription: {description}");
        let answer = self.naming.complete(NAMING_PROMPT, &user).await?;
        let name = answer.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        if name.is_empty() {
            return Err(OracleError::Unusable("empty display name".to_string()));
        }
        Ok(name.to_string())
    }
}

fn describe_endpoint(request: &SynthesisRequest) -> String {
    let parameters = serde_json::to_string(&request.parameters).unwrap_or_default();
    let body = request
        .request_body
        .as_ref()
        .map(Value::to_string)
        .unwrap_or_else(|| "{}".to_string());
    let mut text = format!(
        "Endpoint: {} {}\nDescription: {}\nParameters: {}\nRequest Body: {}",
        request.method, request.path, request.description, parameters, body
    );
    if let Some(docs) = &request.docs {
        text.push_str("\nDocumentation:\n");
        text.push_str(docs);
    }
    text
}

/// Remove a surrounding Markdown code fence, if any.
fn strip_code_fence(answer: &str) -> &str {
    let trimmed = answer.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, b)| b);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn parse_json_object(answer: &str) -> Result<Value, OracleError> {
    let value: Value = serde_json::from_str(strip_code_fence(answer))
        .map_err(|e| OracleError::Unusable(format!("not JSON: {e}")))?;
    if !value.is_object() {
        return Err(OracleError::Unusable("expected a JSON object".to_string()));
    }
    Ok(value)
}

/// Accepts `{"endpoints": [...]}` or a bare array.
fn parse_endpoints(answer: &str) -> Result<Vec<RawEndpoint>, OracleError> {
    let value: Value = serde_json::from_str(strip_code_fence(answer))
        .map_err(|e| OracleError::Unusable(format!("not JSON: {e}")))?;
    let list = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("endpoints") {
            Some(Value::Array(items)) => items,
            _ => return Err(OracleError::Unusable("missing endpoints array".to_string())),
        },
        _ => return Err(OracleError::Unusable("expected an object or array".to_string())),
    };
    Ok(list
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawEndpoint>(item).ok())
        .filter(|ep| !ep.path.trim().is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolforge_test_support::SiteBuilder;

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n[]\n```\n"), "[]");
    }

    #[test]
    fn endpoint_lists_parse_in_both_shapes() {
        let wrapped = r#"{"endpoints": [
            {"method": "get", "path": "/users", "server": null, "description": "List"},
            {"method": "POST", "path": ""},
            "junk"
        ]}"#;
        let eps = parse_endpoints(wrapped).unwrap();
        assert_eq!(eps.len(), 1);
        assert_eq!(eps[0].path, "/users");
        assert_eq!(eps[0].server, "");

        let bare = "```json\n[{\"method\": \"DELETE\", \"path\": \"/users/{id}\"}]\n```";
        assert_eq!(parse_endpoints(bare).unwrap()[0].method, "DELETE");
        assert!(parse_endpoints("no endpoints here").is_err());
    }

    #[test]
    fn schemas_must_be_objects() {
        assert!(parse_json_object("{\"type\": \"object\"}").is_ok());
        assert!(matches!(
            parse_json_object("[1, 2]"),
            Err(OracleError::Unusable(_))
        ));
    }

    #[tokio::test]
    async fn chat_completion_round_trip() {
        let site = SiteBuilder::new()
            .text(
                "/v1/chat/completions",
                r#"{"choices": [{"message": {"role": "assistant", "content": "  \"Search Flights\" "}}]}"#,
            )
            .text("/bad/chat/completions", r#"{"choices": []}"#)
            .serve()
            .await
            .unwrap();
        let model = |base: String| {
            ChatModel::new(&base, Some("k".into()), "m".into(), Duration::from_secs(5)).unwrap()
        };
        let oracles = LlmOracles {
            main: model(site.url("/bad")),
            naming: model(site.url("/v1/")),
        };

        let name = oracles
            .display_name("GET", "/flights/search", "")
            .await
            .unwrap();
        assert_eq!(name, "Search Flights");
        assert_eq!(site.hit_count("/v1/chat/completions"), 1);

        let err = oracles
            .synthesize(&SynthesisRequest {
                method: "GET".into(),
                path: "/x".into(),
                description: String::new(),
                parameters: Vec::new(),
                request_body: None,
                docs: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Unusable(_)));
        assert!(oracles.extract("GET /x").await.is_empty());
    }
}
