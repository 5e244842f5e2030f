//! Client for a Gradio-hosted inference service

use bench_core::{image_name, Error, ModelId, Prediction, Predictor, PredictorConfig, Result};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::{debug, info};
use url::Url;

/// Response of the call endpoint
#[derive(Debug, Deserialize)]
struct CallResponse {
    event_id: String,
}

/// Predictor speaking the Gradio HTTP API.
///
/// Each prediction uploads the image, starts a call against the named
/// endpoint and reads the call's event stream until it completes.
pub struct GradioPredictor {
    client: Client,
    api_base: String,
    api_name: String,
}

impl GradioPredictor {
    pub fn new(config: &PredictorConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| Error::config(format!("Invalid predictor endpoint: {}", e)))?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        let api_base = format!(
            "{}/{}",
            endpoint.as_str().trim_end_matches('/'),
            config.api_prefix.trim_matches('/')
        );

        info!("Using Gradio predictor at {}", api_base);
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_name: config.api_name.trim_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    /// Upload the image and return its server-side path
    async fn upload(&self, image: &Path) -> Result<String> {
        let bytes = tokio::fs::read(image).await?;
        let part = Part::bytes(bytes).file_name(image_name(image));
        let form = Form::new().part("files", part);

        let response = self
            .client
            .post(self.url("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| request_error("Upload", e))?;

        let paths: Vec<String> = check_status(response, "Upload")
            .await?
            .json()
            .await
            .map_err(|e| Error::invalid_response(format!("Invalid upload response: {}", e)))?;

        paths
            .into_iter()
            .next()
            .ok_or_else(|| Error::invalid_response("Upload returned no file path"))
    }

    /// Start a call and return its event id
    async fn start_call(&self, payload: &Value) -> Result<String> {
        let response = self
            .client
            .post(self.url(&format!("call/{}", self.api_name)))
            .json(payload)
            .send()
            .await
            .map_err(|e| request_error("Call", e))?;

        let call: CallResponse = check_status(response, "Call")
            .await?
            .json()
            .await
            .map_err(|e| Error::invalid_response(format!("Invalid call response: {}", e)))?;

        Ok(call.event_id)
    }

    async fn fetch_result(&self, event_id: &str) -> Result<Prediction> {
        let response = self
            .client
            .get(self.url(&format!("call/{}/{}", self.api_name, event_id)))
            .send()
            .await
            .map_err(|e| request_error("Result", e))?;

        let body = check_status(response, "Result")
            .await?
            .text()
            .await
            .map_err(|e| request_error("Result", e))?;

        parse_event_stream(&body)
    }
}

#[async_trait]
impl Predictor for GradioPredictor {
    async fn predict(&self, image: &Path, task_prompt: &str, model: &ModelId) -> Result<Prediction> {
        debug!("Predicting {} with {}", image.display(), model);

        let uploaded = self.upload(image).await?;
        let payload = call_payload(&uploaded, &image_name(image), task_prompt, model);
        let event_id = self.start_call(&payload).await?;
        self.fetch_result(&event_id).await
    }

    fn describe(&self) -> String {
        format!("{}/call/{}", self.api_base, self.api_name)
    }
}

/// Request body for one call: image, task prompt, no extra text input, model
pub fn call_payload(uploaded_path: &str, orig_name: &str, task_prompt: &str, model: &ModelId) -> Value {
    json!({
        "data": [
            {
                "path": uploaded_path,
                "orig_name": orig_name,
                "meta": { "_type": "gradio.FileData" }
            },
            task_prompt,
            null,
            model.as_str()
        ]
    })
}

/// Extract the payload of the `complete` event from a server-sent event stream
pub fn parse_event_stream(body: &str) -> Result<Prediction> {
    let mut event: Option<&str> = None;
    let mut data = String::new();

    // a trailing blank line terminates the last event
    for line in body.lines().chain(std::iter::once("")) {
        let line = line.trim_end_matches('\r');

        if line.is_empty() {
            match event.take() {
                Some("complete") => {
                    return serde_json::from_str(&data).map_err(|e| {
                        Error::invalid_response(format!("Invalid completion payload: {}", e))
                    });
                }
                Some("error") => {
                    let detail = data.trim();
                    return Err(Error::prediction(if detail.is_empty() || detail == "null" {
                        "Predictor reported an error".to_string()
                    } else {
                        format!("Predictor reported an error: {}", detail)
                    }));
                }
                _ => {}
            }
            data.clear();
        } else if let Some(name) = line.strip_prefix("event:") {
            event = Some(name.trim());
        } else if let Some(chunk) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(chunk.trim_start());
        }
    }

    Err(Error::invalid_response("Event stream ended without a result"))
}

fn request_error(stage: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::timeout(format!("{} request timed out: {}", stage, e))
    } else {
        Error::network(format!("{} request failed: {}", stage, e))
    }
}

async fn check_status(response: Response, stage: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    Err(Error::network(format!("{} request failed: {} {}", stage, status, text)))
}
