//! Gmail tools: list, read and send mail as the calling user.
//!
//! All three tools need the user's Google access token. When the user has not
//! connected a Google account, or the grant lacks the needed scope, they
//! return a setup-required output instead of failing.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::credentials::GOOGLE_PROVIDER;
use crate::error::ToolError;
use crate::tool::{Tool, ToolArgs, ToolContext, ToolOutput};

const GMAIL_API_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

const SETUP_MESSAGE: &str =
    "Gmail integration requires OAuth setup. Please link your Google account to use Gmail features.";
const SCOPE_MESSAGE: &str =
    "Your Google account is linked without Gmail access. Please reconnect it and grant Gmail permissions.";

const READ_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.modify",
    "https://mail.google.com/",
];
const SEND_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.compose",
    "https://www.googleapis.com/auth/gmail.modify",
    "https://mail.google.com/",
];

/// HTTP client shared by the Gmail tools.
pub struct GmailClient {
    client: reqwest::Client,
    base_url: String,
}

enum Access {
    Granted(String),
    Setup(ToolOutput),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
    #[serde(default)]
    result_size_estimate: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRef {
    id: String,
    #[serde(default)]
    thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    label_ids: Vec<String>,
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Payload {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: Option<Body>,
    #[serde(default)]
    parts: Vec<Payload>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct Body {
    #[serde(default)]
    data: Option<String>,
}

impl GmailMessage {
    fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .as_ref()?
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    fn is_unread(&self) -> bool {
        self.label_ids.iter().any(|l| l == "UNREAD")
    }

    /// Plain-text body: the payload body, or the first `text/plain` part.
    fn body_text(&self) -> String {
        let Some(payload) = &self.payload else {
            return String::new();
        };
        if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_deref()) {
            return decode_body(data);
        }
        find_plain_text(&payload.parts)
            .map(decode_body)
            .unwrap_or_default()
    }

    fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "threadId": self.thread_id,
            "subject": self.header("Subject").unwrap_or("No Subject"),
            "from": self.header("From").unwrap_or("Unknown Sender"),
            "date": self.header("Date").unwrap_or_default(),
            "snippet": self.snippet,
            "isUnread": self.is_unread(),
        })
    }
}

fn find_plain_text(parts: &[Payload]) -> Option<&str> {
    parts.iter().find_map(|part| {
        if part.mime_type.as_deref() == Some("text/plain") {
            if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
                return Some(data);
            }
        }
        find_plain_text(&part.parts)
    })
}

fn decode_body(data: &str) -> String {
    let trimmed = data.trim_end_matches('=');
    match URL_SAFE_NO_PAD.decode(trimmed) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!(error = %e, "Failed to decode Gmail body");
            String::new()
        }
    }
}

/// Header values must stay on one line.
fn header_value<'a>(name: &str, value: &'a str) -> Result<&'a str, ToolError> {
    if value.contains(['\r', '\n']) {
        return Err(ToolError::InvalidParameter {
            name: name.to_string(),
            reason: "must not contain line breaks".to_string(),
        });
    }
    Ok(value)
}

/// Build the base64url-encoded RFC 2822 message Gmail's send endpoint expects.
fn encode_raw_message(
    to: &str,
    subject: &str,
    body: &str,
    cc: Option<&str>,
    bcc: Option<&str>,
) -> Result<String, ToolError> {
    let to = header_value("to", to)?;
    let subject = header_value("subject", subject)?;
    let cc = cc.map(|cc| header_value("cc", cc)).transpose()?;
    let bcc = bcc.map(|bcc| header_value("bcc", bcc)).transpose()?;

    let mut lines = vec![
        format!("To: {}", to),
        format!("Subject: {}", subject),
        "Content-Type: text/plain; charset=\"UTF-8\"".to_string(),
        "MIME-Version: 1.0".to_string(),
    ];
    if let Some(cc) = cc {
        lines.push(format!("Cc: {}", cc));
    }
    if let Some(bcc) = bcc {
        lines.push(format!("Bcc: {}", bcc));
    }
    lines.push(String::new());
    lines.push(body.to_string());

    Ok(URL_SAFE_NO_PAD.encode(lines.join("\r\n")))
}

impl GmailClient {
    pub fn new() -> Self {
        Self::with_base_url(GMAIL_API_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn access(&self, context: &ToolContext, scopes: &[&str]) -> Result<Access, ToolError> {
        let token = context
            .credentials
            .access_token(&context.user_id, GOOGLE_PROVIDER)
            .await?;

        Ok(match token {
            None => Access::Setup(ToolOutput::setup_required(SETUP_MESSAGE)),
            Some(token) if !token.has_any_scope(scopes) => {
                Access::Setup(ToolOutput::setup_required(SCOPE_MESSAGE))
            }
            Some(token) => Access::Granted(token.token),
        })
    }

    async fn get_message(&self, token: &str, id: &str) -> Result<GmailMessage, ToolError> {
        let response = self
            .client
            .get(format!("{}/messages/{}", self.base_url, id))
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "Failed to fetch email: {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    async fn list(&self, token: &str, max_results: u64, query: &str) -> Result<Value, ToolError> {
        let response = self
            .client
            .get(format!("{}/messages", self.base_url))
            .bearer_auth(token)
            .query(&[("maxResults", max_results.to_string()), ("q", query.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "Failed to fetch emails: {}",
                response.status()
            )));
        }

        let list: MessageList = response.json().await?;
        debug!(count = list.messages.len(), "Fetched Gmail message list");

        let details = join_all(
            list.messages
                .iter()
                .take(max_results as usize)
                .map(|m| self.get_message(token, &m.id)),
        )
        .await;

        let messages: Vec<Value> = list
            .messages
            .iter()
            .zip(details)
            .filter_map(|(reference, detail)| match detail {
                Ok(message) => {
                    let mut summary = message.summary();
                    if summary["threadId"].is_null() {
                        summary["threadId"] = json!(reference.thread_id);
                    }
                    Some(summary)
                }
                Err(e) => {
                    warn!(message_id = %reference.id, error = %e, "Skipping email");
                    None
                }
            })
            .collect();

        Ok(json!({
            "messages": messages,
            "resultSizeEstimate": list.result_size_estimate,
        }))
    }

    async fn send(&self, token: &str, raw: String) -> Result<Value, ToolError> {
        let response = self
            .client
            .post(format!("{}/messages/send", self.base_url))
            .bearer_auth(token)
            .json(&json!({ "raw": raw }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "Failed to send email: {}",
                response.status()
            )));
        }

        let sent: MessageRef = response.json().await?;
        Ok(json!({
            "success": true,
            "messageId": sent.id,
            "threadId": sent.thread_id,
        }))
    }
}

impl Default for GmailClient {
    fn default() -> Self {
        Self::new()
    }
}

/// `listEmails`: recent messages matching a Gmail search query.
pub struct ListEmails {
    gmail: Arc<GmailClient>,
}

impl ListEmails {
    pub fn new(gmail: Arc<GmailClient>) -> Self {
        Self { gmail }
    }
}

#[async_trait]
impl Tool for ListEmails {
    fn name(&self) -> &str {
        "listEmails"
    }

    fn description(&self) -> &str {
        "List emails from the user's Gmail inbox."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "maxResults": {"type": "integer", "minimum": 1, "maximum": 50, "default": 10},
                "query": {
                    "type": "string",
                    "default": "is:unread",
                    "description": "Gmail search query"
                }
            }
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let token = match self.gmail.access(&args.context, READ_SCOPES).await? {
            Access::Granted(token) => token,
            Access::Setup(output) => return Ok(output),
        };
        let max_results = args.get_u64_or("maxResults", 10);
        let query = args
            .get_string_opt("query")
            .unwrap_or_else(|| "is:unread".to_string());

        let result = self.gmail.list(&token, max_results, &query).await?;
        Ok(ToolOutput::success(result))
    }
}

/// `getEmail`: one message with headers and plain-text body.
pub struct GetEmail {
    gmail: Arc<GmailClient>,
}

impl GetEmail {
    pub fn new(gmail: Arc<GmailClient>) -> Self {
        Self { gmail }
    }
}

#[async_trait]
impl Tool for GetEmail {
    fn name(&self) -> &str {
        "getEmail"
    }

    fn description(&self) -> &str {
        "Get a specific email by ID."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "messageId": {"type": "string"}
            },
            "required": ["messageId"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let token = match self.gmail.access(&args.context, READ_SCOPES).await? {
            Access::Granted(token) => token,
            Access::Setup(output) => return Ok(output),
        };
        let message_id = args.get_string("messageId")?;

        let message = self.gmail.get_message(&token, &message_id).await?;
        Ok(ToolOutput::success(json!({
            "id": message.id,
            "threadId": message.thread_id,
            "subject": message.header("Subject").unwrap_or("No Subject"),
            "from": message.header("From").unwrap_or("Unknown Sender"),
            "to": message.header("To").unwrap_or_default(),
            "date": message.header("Date").unwrap_or_default(),
            "body": message.body_text(),
            "snippet": message.snippet,
            "isUnread": message.is_unread(),
            "labelIds": message.label_ids,
        })))
    }
}

/// `sendEmail`: send a plain-text email.
pub struct SendEmail {
    gmail: Arc<GmailClient>,
}

impl SendEmail {
    pub fn new(gmail: Arc<GmailClient>) -> Self {
        Self { gmail }
    }
}

#[async_trait]
impl Tool for SendEmail {
    fn name(&self) -> &str {
        "sendEmail"
    }

    fn description(&self) -> &str {
        "Send an email using Gmail."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "to": {"type": "string", "format": "email"},
                "subject": {"type": "string"},
                "body": {"type": "string"},
                "cc": {"type": "string", "format": "email"},
                "bcc": {"type": "string", "format": "email"}
            },
            "required": ["to", "subject", "body"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let token = match self.gmail.access(&args.context, SEND_SCOPES).await? {
            Access::Granted(token) => token,
            Access::Setup(output) => return Ok(output),
        };
        let to = args.get_string("to")?;
        let subject = args.get_string("subject")?;
        let body = args.get_string("body")?;
        let cc = args.get_string_opt("cc");
        let bcc = args.get_string_opt("bcc");

        let raw = encode_raw_message(&to, &subject, &body, cc.as_deref(), bcc.as_deref())?;
        let result = self.gmail.send(&token, raw).await?;
        Ok(ToolOutput::success(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{AccessToken, NoCredentials, StaticCredentials};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context_with(scopes: Vec<String>) -> ToolContext {
        let credentials = StaticCredentials::new().with_token(
            "user-1",
            GOOGLE_PROVIDER,
            AccessToken::new("google-token", scopes),
        );
        ToolContext::new("user-1", Arc::new(credentials))
    }

    fn args(params: Value, context: ToolContext) -> ToolArgs {
        ToolArgs::new(params.as_object().cloned().unwrap_or_default(), context)
    }

    #[tokio::test]
    async fn test_not_connected_requires_setup() {
        let gmail = Arc::new(GmailClient::with_base_url("http://127.0.0.1:9"));
        let context = ToolContext::new("user-1", Arc::new(NoCredentials));

        let output = ListEmails::new(gmail.clone())
            .execute(args(json!({}), context.clone()))
            .await
            .unwrap();
        assert!(output.is_setup_required());
        assert_eq!(output.to_model_value()["setupRequired"], true);

        let output = SendEmail::new(gmail)
            .execute(args(json!({"to": "a@b.co", "subject": "s", "body": "b"}), context))
            .await
            .unwrap();
        assert!(output.is_setup_required());
    }

    #[tokio::test]
    async fn test_missing_send_scope_requires_setup() {
        let gmail = Arc::new(GmailClient::with_base_url("http://127.0.0.1:9"));
        let context = context_with(vec![READ_SCOPES[0].to_string()]);

        let output = SendEmail::new(gmail)
            .execute(args(json!({"to": "a@b.co", "subject": "s", "body": "b"}), context))
            .await
            .unwrap();
        assert!(output.is_setup_required());
    }

    #[tokio::test]
    async fn test_list_emails_fetches_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages"))
            .and(query_param("q", "is:unread"))
            .and(header("authorization", "Bearer google-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{"id": "m1", "threadId": "t1"}, {"id": "m2", "threadId": "t2"}],
                "resultSizeEstimate": 2
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/messages/m1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m1",
                "threadId": "t1",
                "snippet": "Lunch?",
                "labelIds": ["UNREAD", "INBOX"],
                "payload": {"headers": [
                    {"name": "Subject", "value": "Lunch"},
                    {"name": "From", "value": "ana@example.com"}
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/messages/m2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let gmail = Arc::new(GmailClient::with_base_url(server.uri()));
        let output = ListEmails::new(gmail)
            .execute(args(
                json!({"maxResults": 10, "query": "is:unread"}),
                context_with(Vec::new()),
            ))
            .await
            .unwrap();

        let messages = output.content["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["subject"], "Lunch");
        assert_eq!(messages[0]["isUnread"], true);
        assert_eq!(output.content["resultSizeEstimate"], 2);
    }

    #[tokio::test]
    async fn test_get_email_decodes_multipart_body() {
        let server = MockServer::start().await;
        let encoded = URL_SAFE_NO_PAD.encode("Hello there");
        Mock::given(method("GET"))
            .and(path("/messages/m1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m1",
                "threadId": "t1",
                "snippet": "Hello",
                "labelIds": [],
                "payload": {
                    "mimeType": "multipart/alternative",
                    "headers": [{"name": "To", "value": "me@example.com"}],
                    "parts": [
                        {"mimeType": "text/html", "body": {"data": "PGI-"}},
                        {"mimeType": "text/plain", "body": {"data": encoded}}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let gmail = Arc::new(GmailClient::with_base_url(server.uri()));
        let output = GetEmail::new(gmail)
            .execute(args(json!({"messageId": "m1"}), context_with(Vec::new())))
            .await
            .unwrap();

        assert_eq!(output.content["body"], "Hello there");
        assert_eq!(output.content["subject"], "No Subject");
        assert_eq!(output.content["to"], "me@example.com");
        assert_eq!(output.content["isUnread"], false);
    }

    #[tokio::test]
    async fn test_send_email_posts_raw_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages/send"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "sent-1", "threadId": "t9"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let gmail = Arc::new(GmailClient::with_base_url(server.uri()));
        let output = SendEmail::new(gmail)
            .execute(args(
                json!({"to": "ana@example.com", "subject": "Hi", "body": "See you"}),
                context_with(vec![SEND_SCOPES[0].to_string()]),
            ))
            .await
            .unwrap();

        assert_eq!(output.content["success"], true);
        assert_eq!(output.content["messageId"], "sent-1");
    }

    #[test]
    fn test_raw_message_encoding() {
        let raw = encode_raw_message("a@b.co", "Hi", "Body", Some("c@d.co"), None).unwrap();
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(raw).unwrap()).unwrap();
        assert!(decoded.starts_with("To: a@b.co\r\nSubject: Hi\r\n"));
        assert!(decoded.contains("Cc: c@d.co\r\n"));
        assert!(!decoded.contains("Bcc"));
        assert!(decoded.ends_with("\r\n\r\nBody"));
    }

    #[test]
    fn test_raw_message_rejects_header_line_breaks() {
        let result = encode_raw_message(
            "a@example.com",
            "Hi\r\nBcc: attacker@evil.test",
            "body",
            None,
            None,
        );
        assert!(matches!(
            result,
            Err(ToolError::InvalidParameter { ref name, .. }) if name == "subject"
        ));

        let result = encode_raw_message("a@example.com", "Hi", "body", None, Some("x@y.z\nTo: b@c.d"));
        assert!(matches!(result, Err(ToolError::InvalidParameter { .. })));

        let raw = encode_raw_message("a@example.com", "Hi", "line one\r\nline two", None, None).unwrap();
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(raw).unwrap()).unwrap();
        assert!(decoded.ends_with("\r\n\r\nline one\r\nline two"));
    }

    #[tokio::test]
    async fn test_send_email_rejects_injected_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "sent-1"})))
            .expect(0)
            .mount(&server)
            .await;

        let gmail = Arc::new(GmailClient::with_base_url(server.uri()));
        let result = SendEmail::new(gmail)
            .execute(args(
                json!({"to": "ana@example.com", "subject": "Hi\nBcc: attacker@evil.test", "body": "x"}),
                context_with(vec![SEND_SCOPES[0].to_string()]),
            ))
            .await;

        assert!(matches!(result, Err(ref e) if e.is_invalid_input()));
    }
}
