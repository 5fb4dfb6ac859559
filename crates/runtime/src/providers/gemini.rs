//! Google Gemini streaming backend.

use crate::model::{
    Backend, Candidate, ChunkStream, Message, ModelError, ModelRequest, Part, Role, StreamChunk,
    ToolCall, ToolOutcome, ToolSpec,
};
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::io::StreamReader;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Schema keywords the Gemini function-declaration parser rejects.
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["$schema", "additionalProperties"];

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTools>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct ApiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<ApiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<ApiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<ApiFunctionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
    #[serde(default, skip_serializing)]
    thought: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    #[serde(default, skip_serializing)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiTools {
    function_declarations: Vec<ApiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct ApiGenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ApiChunk {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseContent {
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating a Gemini backend.
#[derive(Debug, Clone)]
pub struct GeminiBackendBuilder {
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackendBuilder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn build(self) -> GeminiBackend {
        GeminiBackend {
            client: reqwest::Client::new(),
            api_key: self.api_key,
            model: self.model,
            base_url: self.base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Gemini `streamGenerateContent` backend.
///
/// Cloning is cheap; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn builder(api_key: impl Into<String>) -> GeminiBackendBuilder {
        GeminiBackendBuilder::new(api_key)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }

    fn role_to_api(role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Assistant => "model",
        }
    }

    fn part_to_api(part: &Part) -> ApiPart {
        match part {
            Part::Text(text) => ApiPart {
                text: Some(text.clone()),
                ..ApiPart::default()
            },
            Part::ToolCall(call) => ApiPart {
                function_call: Some(ApiFunctionCall {
                    id: None,
                    name: call.name.clone(),
                    args: Some(call.input.clone()),
                }),
                thought_signature: call.signature.clone(),
                ..ApiPart::default()
            },
            Part::ToolResult(result) => {
                let response = match &result.outcome {
                    ToolOutcome::Success { output } => json!({ "result": output }),
                    ToolOutcome::Error { message } => json!({ "error": message }),
                };
                ApiPart {
                    function_response: Some(ApiFunctionResponse {
                        name: result.name.clone(),
                        response,
                    }),
                    ..ApiPart::default()
                }
            }
        }
    }

    fn message_to_api(msg: &Message) -> ApiContent {
        ApiContent {
            role: Some(Self::role_to_api(msg.role)),
            parts: msg.parts.iter().map(Self::part_to_api).collect(),
        }
    }

    fn tools_to_api(specs: &[ToolSpec]) -> Vec<ApiTools> {
        if specs.is_empty() {
            return Vec::new();
        }
        vec![ApiTools {
            function_declarations: specs
                .iter()
                .map(|spec| ApiFunctionDeclaration {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    parameters: sanitize_schema(&spec.schema),
                })
                .collect(),
        }]
    }

    fn build_request(request: &ModelRequest<'_>) -> ApiRequest {
        ApiRequest {
            contents: request.messages.iter().map(Self::message_to_api).collect(),
            system_instruction: request.system.map(|system| ApiContent {
                role: None,
                parts: vec![ApiPart {
                    text: Some(system.to_string()),
                    ..ApiPart::default()
                }],
            }),
            tools: Self::tools_to_api(request.tools),
            generation_config: ApiGenerationConfig {
                temperature: request.temperature,
            },
        }
    }
}

impl std::fmt::Display for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gemini({})", self.model)
    }
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Backend for GeminiBackend {
    async fn stream(&self, request: ModelRequest<'_>) -> Result<ChunkStream, ModelError> {
        let body = Self::build_request(&request);

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "gemini streaming request"
        );

        let response = self
            .client
            .post(self.stream_url())
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let bytes = response
            .bytes_stream()
            .map(|result| result.map_err(std::io::Error::other))
            .boxed();
        Ok(sse_chunks(StreamReader::new(bytes)))
    }
}

/// Drop schema keywords Gemini refuses, at every nesting level.
pub fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), sanitize_schema(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}

/// Turn an SSE body into a stream of chunks.
///
/// Multi-line `data:` fields are joined with newlines; other fields are
/// ignored. The stream ends after the first error.
fn sse_chunks<R>(reader: R) -> ChunkStream
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    stream::unfold(Some(reader.lines()), |state| async move {
        let mut lines = state?;
        let mut data = String::new();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.is_empty() => {
                    if data.is_empty() {
                        continue;
                    }
                    let item = parse_event(&data);
                    let next = item.is_ok().then_some(lines);
                    return Some((item, next));
                }
                Ok(Some(line)) => {
                    if let Some(rest) = line.strip_prefix("data:") {
                        if !data.is_empty() {
                            data.push('\n');
                        }
                        data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
                    }
                }
                Ok(None) if data.is_empty() => return None,
                Ok(None) => return Some((parse_event(&data), None)),
                Err(e) => return Some((Err(ModelError::Network(e.to_string())), None)),
            }
        }
    })
    .boxed()
}

fn parse_event(data: &str) -> Result<StreamChunk, ModelError> {
    let chunk: ApiChunk =
        serde_json::from_str(data).map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

    if let Some(error) = chunk.error {
        return Err(ModelError::Api(format!(
            "{} {}: {}",
            error.code, error.status, error.message
        )));
    }

    let candidates = chunk
        .candidates
        .into_iter()
        .map(|candidate| Candidate {
            parts: candidate
                .content
                .map(|content| content.parts)
                .unwrap_or_default()
                .into_iter()
                .filter_map(part_from_api)
                .collect(),
        })
        .collect();

    Ok(StreamChunk { candidates })
}

fn part_from_api(part: ApiPart) -> Option<Part> {
    if part.thought {
        return None;
    }
    if let Some(call) = part.function_call {
        return Some(Part::ToolCall(ToolCall {
            id: call
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name: call.name,
            input: call.args.unwrap_or_else(|| json!({})),
            signature: part.thought_signature,
        }));
    }
    part.text.map(Part::Text)
}
