//! [`RemoteCommandQueue`] against a PostgREST-style remote store, in both
//! its push and pull forms.
//!
//! Watches the remote `commands` table using the same filter conventions a
//! generated PostgREST API exposes (`status=eq.pending`, ascending by
//! `created_at`) for the poll side. [`subscribe`](Self::subscribe) opens a
//! long-lived `GET .../commands/stream?status=eq.pending`
//! server-sent-events connection — the realtime push side the consumer
//! prefers — and forwards each `data:` frame's decoded `Command` into a
//! channel; see `minihub_app::command_consumer` for how the two are
//! combined.

use futures::StreamExt;
use tokio::sync::mpsc;

use minihub_app::ports::command_queue::RemoteCommandQueue;
use minihub_domain::command::Command;
use minihub_domain::error::MiniHubError;

use crate::error::RemoteStoreError;

/// Bounded channel capacity for a freshly opened push subscription.
const SUBSCRIPTION_BUFFER: usize = 256;

/// Talks to a remote `commands` table over HTTP.
#[derive(Clone)]
pub struct RemoteStoreCommandQueue {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RemoteStoreCommandQueue {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("apikey", key).bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, RemoteStoreError> {
        let response = self.authed(builder).send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(RemoteStoreError::Rejected { status, body })
        }
    }
}

impl RemoteCommandQueue for RemoteStoreCommandQueue {
    /// Decodes each row independently rather than the whole page as one
    /// `Vec<Command>`, so a single row with an unrecognized capability (or
    /// otherwise malformed shape) can't block every other legitimately
    /// pending command in the same batch. A row that fails to decode is
    /// isolated via [`fail_unparseable_row`](Self::fail_unparseable_row)
    /// instead of surfacing an error from `poll` itself.
    async fn poll(&self, max: usize) -> Result<Vec<Command>, MiniHubError> {
        let url = format!(
            "{}/commands?status=eq.pending&order=created_at.asc&limit={max}",
            self.base_url
        );
        let response = self
            .send(self.http.get(&url))
            .await
            .map_err(RemoteStoreError::into_domain)?;
        let rows = response
            .json::<Vec<serde_json::Value>>()
            .await
            .map_err(|err| RemoteStoreError::from(err).into_domain())?;

        let mut commands = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<Command>(row.clone()) {
                Ok(command) => commands.push(command),
                Err(error) => {
                    tracing::warn!(%error, "command row failed to decode, isolating from batch");
                    self.fail_unparseable_row(&row).await;
                }
            }
        }
        Ok(commands)
    }

    async fn acknowledge(&self, command: &Command) -> Result<(), MiniHubError> {
        let mut body = serde_json::to_value(&command.status)
            .map_err(|err| RemoteStoreError::Codec(err.to_string()).into_domain())?;
        if let serde_json::Value::Object(ref mut fields) = body {
            let processed_at = serde_json::to_value(command.processed_at)
                .map_err(|err| RemoteStoreError::Codec(err.to_string()).into_domain())?;
            fields.insert("processed_at".to_string(), processed_at);
        }

        let url = format!("{}/commands?id=eq.{}", self.base_url, command.id);
        self.send(self.http.patch(&url).json(&body))
            .await
            .map_err(RemoteStoreError::into_domain)?;
        Ok(())
    }

    /// PATCHes the remote row with a `status=eq.pending` filter baked into
    /// the URL, so the conditional update is evaluated by the remote store
    /// itself rather than by comparing a value we already fetched. Asks for
    /// `Prefer: return=representation` so the response body is the array of
    /// rows the filter actually matched and updated: empty means another
    /// consumer — in this process or another hub instance entirely — already
    /// won the race.
    async fn claim(&self, command: &Command) -> Result<bool, MiniHubError> {
        let url = format!(
            "{}/commands?id=eq.{}&status=eq.pending",
            self.base_url, command.id
        );
        let response = self
            .send(
                self.http
                    .patch(&url)
                    .header("Prefer", "return=representation")
                    .json(&serde_json::json!({"status": "processing"})),
            )
            .await
            .map_err(RemoteStoreError::into_domain)?;
        let rows = response
            .json::<Vec<serde_json::Value>>()
            .await
            .map_err(|err| RemoteStoreError::from(err).into_domain())?;
        Ok(!rows.is_empty())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<Command>, MiniHubError> {
        let url = format!("{}/commands/stream?status=eq.pending", self.base_url);
        let response = self
            .send(self.http.get(&url).header("Accept", "text/event-stream"))
            .await
            .map_err(RemoteStoreError::into_domain)?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        tokio::spawn(self.clone().forward_events(response, tx));
        Ok(rx)
    }
}

impl RemoteStoreCommandQueue {
    /// Reads `data: {...}\n\n` server-sent-event frames off `response` and
    /// decodes each payload as a [`Command`], forwarding it to `tx`. A frame
    /// whose payload doesn't decode as a `Command` is isolated via
    /// [`fail_unparseable_row`](Self::fail_unparseable_row) rather than
    /// silently dropped, so the offending row doesn't sit `pending` forever.
    ///
    /// Returns (drops `tx`) as soon as the stream ends or the receiver is
    /// gone — either way the consumer notices the channel closed and falls
    /// back to polling.
    async fn forward_events(self, response: reqwest::Response, tx: mpsc::Sender<Command>) {
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(error) => {
                    tracing::warn!(%error, "command push stream read failed");
                    return;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(frame_end) = buffer.find("\n\n") {
                let frame = buffer[..frame_end].to_string();
                buffer.drain(..frame_end + 2);

                for item in parse_sse_frame(&frame) {
                    match item {
                        SseItem::Command(command) => {
                            if tx.send(command).await.is_err() {
                                return;
                            }
                        }
                        SseItem::Unparseable(raw) => self.fail_unparseable_row(&raw).await,
                    }
                }
            }
        }
    }

    /// Marks a command row this consumer couldn't decode — e.g. an unknown
    /// capability string — as `failed` on the remote store directly, since
    /// it can never be turned into a well-typed [`Command`] to run through
    /// the normal `processing` path. Dropped silently if the row carries no
    /// recoverable `id`.
    async fn fail_unparseable_row(&self, raw: &serde_json::Value) {
        let Some(id) = raw.get("id").and_then(serde_json::Value::as_str) else {
            tracing::warn!("malformed command row with no recoverable id, dropping");
            return;
        };
        let body = serde_json::json!({
            "status": "failed",
            "error": "unknown_capability",
            "processed_at": minihub_domain::time::now(),
        });
        let url = format!("{}/commands?id=eq.{id}", self.base_url);
        if let Err(error) = self.send(self.http.patch(&url).json(&body)).await {
            tracing::warn!(%error, command_id = %id, "failed to mark unparseable command row as failed");
        }
    }
}

/// One item extracted from an SSE frame: either a well-formed `Command`, or
/// the raw JSON of a row that failed to decode as one.
enum SseItem {
    Command(Command),
    Unparseable(serde_json::Value),
}

/// Extracts the payload out of each `data:` line of a single (already
/// delimiter-stripped) SSE frame, skipping any line that isn't a `data:`
/// field. A line whose JSON doesn't parse at all is dropped (nothing
/// recoverable); a line whose JSON parses but doesn't decode as a `Command`
/// is kept as [`SseItem::Unparseable`] so the caller can isolate it.
fn parse_sse_frame(frame: &str) -> Vec<SseItem> {
    frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| {
            let raw: serde_json::Value = match serde_json::from_str(data.trim()) {
                Ok(raw) => raw,
                Err(error) => {
                    tracing::warn!(%error, "malformed command push event, skipping");
                    return None;
                }
            };
            match serde_json::from_value::<Command>(raw.clone()) {
                Ok(command) => Some(SseItem::Command(command)),
                Err(error) => {
                    tracing::warn!(%error, "command push event failed to decode, isolating");
                    Some(SseItem::Unparseable(raw))
                }
            }
        })
        .collect()
}
