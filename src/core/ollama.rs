//! HTTP client for the Ollama server: model listing and streamed generation.

use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use memchr::memchr;
use tracing::debug;

use crate::api::models::{fetch_models, model_names};
use crate::api::{GenerateChunk, GenerateOptions, GenerateRequest, ModelInfo};
use crate::core::error::{summarize_error_body, ClientError};
use crate::core::generation::GenerationRequest;
use crate::utils::url::construct_api_url;

/// Splits a byte stream into newline-terminated lines, holding partial lines between pushes.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete line, without its terminator.
    pub fn next_line(&mut self) -> Option<Result<String, ClientError>> {
        let newline_pos = memchr(b'\n', &self.buffer)?;
        let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
        Some(Self::decode_utf8(&line[..newline_pos]))
    }

    /// Whatever is left after the transport closed without a final newline.
    pub fn take_remainder(&mut self) -> Option<Result<String, ClientError>> {
        if self.buffer.iter().all(u8::is_ascii_whitespace) {
            self.buffer.clear();
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(Self::decode_utf8(&rest))
    }

    fn decode_utf8(bytes: &[u8]) -> Result<String, ClientError> {
        std::str::from_utf8(bytes)
            .map(|line| line.trim().to_string())
            .map_err(|e| ClientError::Malformed(format!("invalid UTF-8 in stream: {e}")))
    }
}

/// Decode one NDJSON line. Blank lines yield `None`.
pub fn decode_line(line: &str) -> Result<Option<GenerateChunk>, ClientError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let chunk: GenerateChunk = serde_json::from_str(trimmed).map_err(|e| {
        ClientError::Malformed(format!("{e} in line {}", summarize_error_body(trimmed)))
    })?;
    if let Some(error) = &chunk.error {
        return Err(ClientError::ServerRejected(summarize_error_body(error)));
    }
    Ok(Some(chunk))
}

/// Incremental generation output. Each item is the text produced since the previous one.
pub struct FragmentStream {
    body: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    decoder: NdjsonDecoder,
    body_done: bool,
    finished: bool,
}

impl FragmentStream {
    fn new(response: reqwest::Response) -> Self {
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Self {
            body,
            decoder: NdjsonDecoder::default(),
            body_done: false,
            finished: false,
        }
    }

    /// `None` once the server reports `done` or closes the body; errors end the stream.
    pub async fn next_fragment(&mut self) -> Option<Result<String, ClientError>> {
        loop {
            if self.finished {
                return None;
            }

            let line = if self.body_done {
                self.decoder.take_remainder()
            } else {
                self.decoder.next_line()
            };

            if let Some(line) = line {
                match line.and_then(|line| decode_line(&line)) {
                    Ok(None) => continue,
                    Ok(Some(chunk)) => {
                        if chunk.done {
                            self.finished = true;
                        }
                        if chunk.response.is_empty() {
                            continue;
                        }
                        return Some(Ok(chunk.response));
                    }
                    Err(err) => {
                        self.finished = true;
                        return Some(Err(err));
                    }
                }
            }

            if self.body_done {
                debug!("generation stream closed without a done marker");
                self.finished = true;
                return None;
            }

            match self.body.next().await {
                Some(Ok(bytes)) => self.decoder.push(&bytes),
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(ClientError::from_transport(err)));
                }
                None => self.body_done = true,
            }
        }
    }
}

/// Stateless apart from the server URL; performs no retries.
#[derive(Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn list_models(&self) -> Result<Vec<String>, ClientError> {
        let response = fetch_models(&self.http, &self.base_url).await?;
        Ok(model_names(response))
    }

    /// Installed models with the size and modification time the server reports.
    pub async fn list_model_details(&self) -> Result<Vec<ModelInfo>, ClientError> {
        Ok(fetch_models(&self.http, &self.base_url).await?.models)
    }

    /// Open a streaming generation. Fails before any fragment if the server is unreachable or
    /// answers with a non-success status.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<FragmentStream, ClientError> {
        let generate_url = construct_api_url(&self.base_url, "api/generate");
        let body = wire_request(request);
        debug!(
            url = %generate_url,
            model = %body.model,
            temperature = body.options.temperature,
            num_predict = body.options.num_predict,
            prompt_chars = body.prompt.chars().count(),
            "sending generation request"
        );

        let response = self
            .http
            .post(generate_url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(ClientError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(ClientError::rejected(status, &error_text));
        }

        Ok(FragmentStream::new(response))
    }
}

pub fn wire_request(request: &GenerationRequest) -> GenerateRequest {
    GenerateRequest {
        model: request.model.clone(),
        prompt: request.prompt.clone(),
        system: request.system.clone(),
        stream: true,
        options: GenerateOptions {
            temperature: request.temperature,
            num_predict: request.token_limit,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::utils::test_utils::{spawn_mock_ollama, test_request, unreachable_base_url, MockStep};

    fn drain(decoder: &mut NdjsonDecoder) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = decoder.next_line() {
            lines.push(line.expect("valid line"));
        }
        lines
    }

    #[test]
    fn decoder_joins_lines_split_across_chunks() {
        let mut decoder = NdjsonDecoder::default();
        decoder.push(br#"{"response":"Hel"#);
        assert!(drain(&mut decoder).is_empty());

        decoder.push(b"lo\",\"done\":false}\n{\"response\":\" world\"");
        assert_eq!(drain(&mut decoder), vec![r#"{"response":"Hello","done":false}"#]);

        decoder.push(b",\"done\":true}\n");
        assert_eq!(
            drain(&mut decoder),
            vec![r#"{"response":" world","done":true}"#]
        );
        assert!(decoder.take_remainder().is_none());
    }

    #[test]
    fn decoder_keeps_multibyte_chars_split_between_chunks() {
        let mut decoder = NdjsonDecoder::default();
        let line = "{\"response\":\"café\"}\n".as_bytes();
        let split = line.len() - 4;
        decoder.push(&line[..split]);
        decoder.push(&line[split..]);
        let decoded = decode_line(&drain(&mut decoder)[0])
            .expect("decodes")
            .expect("not blank");
        assert_eq!(decoded.response, "café");
    }

    #[test]
    fn decoder_reports_invalid_utf8_as_malformed() {
        let mut decoder = NdjsonDecoder::default();
        decoder.push(&[0xff, 0xfe, b'\n']);
        let err = decoder.next_line().expect("one line").expect_err("invalid utf8");
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn decode_line_handles_blank_error_and_garbage() {
        assert!(decode_line("   ").expect("blank ok").is_none());

        let err = decode_line(r#"{"error":"model \"nope\" not found"}"#).expect_err("error line");
        assert_eq!(err, ClientError::ServerRejected("model \"nope\" not found".to_string()));

        let err = decode_line("not json").expect_err("garbage");
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn wire_request_maps_token_limit_to_num_predict() {
        let request = test_request("http://localhost:11434");
        let wire = serde_json::to_value(wire_request(&request)).expect("serializes");
        assert_eq!(wire["stream"], true);
        assert_eq!(wire["model"], "test-model");
        assert_eq!(wire["options"]["num_predict"], 140);
        assert!(wire.get("system").is_none());
    }

    #[tokio::test]
    async fn generate_streams_fragments_until_done() {
        let server = spawn_mock_ollama(
            200,
            vec![
                MockStep::line(r#"{"response":"Hello","done":false}"#),
                MockStep::line(r#"{"response":"","done":false}"#),
                MockStep::line(r#"{"response":" there","done":false}"#),
                MockStep::line(r#"{"response":"","done":true}"#),
                MockStep::line(r#"{"response":"ignored","done":false}"#),
            ],
        );
        let request = test_request(&server.base_url);
        let client = OllamaClient::new(&server.base_url, request.timeout).expect("client");

        let mut stream = client.generate(&request).await.expect("stream opens");
        let mut fragments = Vec::new();
        while let Some(fragment) = stream.next_fragment().await {
            fragments.push(fragment.expect("fragment"));
        }
        assert_eq!(fragments, vec!["Hello".to_string(), " there".to_string()]);

        let captured = server.finish();
        assert!(captured.request_line.starts_with("POST /api/generate"));
        let body: serde_json::Value = serde_json::from_str(&captured.body).expect("json body");
        assert_eq!(body["prompt"], "Once upon a time");
    }

    #[tokio::test]
    async fn generate_surfaces_mid_stream_error_line() {
        let server = spawn_mock_ollama(
            200,
            vec![
                MockStep::line(r#"{"response":"Hi","done":false}"#),
                MockStep::line(r#"{"error":"out of memory"}"#),
            ],
        );
        let request = test_request(&server.base_url);
        let client = OllamaClient::new(&server.base_url, request.timeout).expect("client");

        let mut stream = client.generate(&request).await.expect("stream opens");
        assert_eq!(stream.next_fragment().await, Some(Ok("Hi".to_string())));
        assert_eq!(
            stream.next_fragment().await,
            Some(Err(ClientError::ServerRejected("out of memory".to_string())))
        );
        assert_eq!(stream.next_fragment().await, None);
        server.finish();
    }

    #[tokio::test]
    async fn generate_rejects_non_success_status() {
        let server = spawn_mock_ollama(
            404,
            vec![MockStep::line(r#"{"error":"model 'test-model' not found"}"#)],
        );
        let request = test_request(&server.base_url);
        let client = OllamaClient::new(&server.base_url, request.timeout).expect("client");

        let err = client
            .generate(&request)
            .await
            .err()
            .expect("404 is an error");
        assert_eq!(err.kind(), ErrorKind::ServerRejected);
        assert!(err.to_string().contains("model 'test-model' not found"));
        server.finish();
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connection_error() {
        let base_url = unreachable_base_url();
        let client = OllamaClient::new(&base_url, Duration::from_secs(5)).expect("client");
        let err = client.list_models().await.expect_err("nothing listening");
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[tokio::test]
    async fn list_models_reads_tags() {
        let server = spawn_mock_ollama(
            200,
            vec![MockStep::line(
                r#"{"models":[{"name":"llama2:latest"},{"name":"mistral:7b"}]}"#,
            )],
        );
        let client = OllamaClient::new(&server.base_url, Duration::from_secs(5)).expect("client");
        let models = client.list_models().await.expect("models");
        assert_eq!(models, vec!["llama2:latest", "mistral:7b"]);
        let captured = server.finish();
        assert!(captured.request_line.starts_with("GET /api/tags"));
    }

    #[tokio::test]
    async fn model_details_keep_size_and_modified_time() {
        let server = spawn_mock_ollama(
            200,
            vec![MockStep::line(
                r#"{"models":[{"name":"llama2:latest","size":3825819519,"modified_at":"2023-11-04T14:56:49.277302595-07:00"},{"name":"bare"}]}"#,
            )],
        );
        let client = OllamaClient::new(&server.base_url, Duration::from_secs(5)).expect("client");
        let models = client.list_model_details().await.expect("models");
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].size, Some(3825819519));
        assert_eq!(
            models[0].modified_at.as_deref(),
            Some("2023-11-04T14:56:49.277302595-07:00")
        );
        assert_eq!(models[1].size, None);
        server.finish();
    }
}
