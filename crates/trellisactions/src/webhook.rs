use async_trait::async_trait;
use serde_json::{json, Value};
use trelliscore::{into_payload, ActionContext, ActionHandler, NodeError, Payload};

/// Calls an HTTP endpoint with a templated JSON body
pub struct SendWebhookAction {
    client: reqwest::Client,
}

impl SendWebhookAction {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Use a preconfigured client (proxies, timeouts, TLS roots)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for SendWebhookAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionHandler for SendWebhookAction {
    fn action_type(&self) -> &str {
        "send_webhook"
    }

    async fn execute(&self, ctx: ActionContext) -> Result<Payload, NodeError> {
        let url = ctx.render("url")?;
        let method = ctx.render_opt("method")?.unwrap_or_else(|| "POST".to_string());
        // Without an explicit body the node input is forwarded as-is.
        let body = ctx
            .render_value("body")
            .unwrap_or_else(|| Value::Object(ctx.input.clone()));

        ctx.events.info(format!("{} {}", method, url));

        let request = match method.to_uppercase().as_str() {
            "GET" => self.client.get(&url),
            "POST" => self.client.post(&url).json(&body),
            "PUT" => self.client.put(&url).json(&body),
            "PATCH" => self.client.patch(&url).json(&body),
            "DELETE" => self.client.delete(&url),
            _ => {
                return Err(NodeError::InvalidConfig {
                    field: "method".to_string(),
                    reason: format!("unsupported method {}", method),
                })
            }
        };

        let request = match ctx.render_value("headers") {
            Some(Value::Object(headers)) => headers.iter().fold(request, |req, (key, value)| match value.as_str() {
                Some(val) => req.header(key.as_str(), val),
                None => req,
            }),
            _ => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| NodeError::ActionFailed(format!("webhook request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| NodeError::ActionFailed(format!("failed to read webhook response: {}", e)))?;

        if !status.is_success() {
            return Err(NodeError::ActionFailed(format!(
                "webhook returned {}: {}",
                status.as_u16(),
                text
            )));
        }

        ctx.events.info(format!("Response status: {}", status.as_u16()));

        let parsed = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
        Ok(into_payload(json!({
            "webhook_status": status.as_u16(),
            "webhook_response": parsed,
        })))
    }

    fn validate_config(&self, config: &Payload) -> Result<(), NodeError> {
        match config.get("url") {
            Some(Value::String(url)) if !url.trim().is_empty() => Ok(()),
            Some(_) => Err(NodeError::InvalidConfig {
                field: "url".to_string(),
                reason: "expected non-empty string".to_string(),
            }),
            None => Err(NodeError::MissingConfig("url".to_string())),
        }
    }
}
