//! `/events` — subscribe-by-topic-pattern WebSocket stream.
//!
//! Clients send `{"type":"subscribe","topics":[...]}` with topic patterns
//! (supporting the event bus's single-segment `*` wildcard); the server
//! streams `{"type":"event","topic":...,"payload":...}` messages back.
//! Unknown topics are accepted silently — no match, no error. A slow
//! consumer sees the event bus's own drop-oldest behavior: a `bus/overflow`
//! event arrives in its place, never an error or a closed socket.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use serde::{Deserialize, Serialize};

use minihub_app::ports::{
    AreaRepository, CommandRepository, DeviceRepository, EntityRepository, EventStore,
    HistorySink, HubRepository, LatestStateSink,
};
use minihub_domain::event::Event;

use crate::state::AppState;

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Subscribe { topics: Vec<String> },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage<'a> {
    Event {
        topic: &'a str,
        payload: &'a serde_json::Value,
    },
}

/// `GET /events` — upgrade to a WebSocket and start the subscribe loop.
pub async fn upgrade<DR, ER, AR, LS, HS, CR, HR, ES>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<DR, ER, AR, LS, HS, CR, HR, ES>>,
) -> Response
where
    DR: DeviceRepository + Send + Sync + 'static,
    ER: EntityRepository + Send + Sync + 'static,
    AR: AreaRepository + Send + Sync + 'static,
    LS: LatestStateSink + Send + Sync + 'static,
    HS: HistorySink + Send + Sync + 'static,
    CR: CommandRepository + Send + Sync + 'static,
    HR: HubRepository + Send + Sync + 'static,
    ES: EventStore + Send + Sync + 'static,
{
    ws.on_upgrade(move |socket| handle(socket, state))
}

async fn handle<DR, ER, AR, LS, HS, CR, HR, ES>(
    mut socket: WebSocket,
    state: AppState<DR, ER, AR, LS, HS, CR, HR, ES>,
) where
    DR: DeviceRepository + Send + Sync + 'static,
    ER: EntityRepository + Send + Sync + 'static,
    AR: AreaRepository + Send + Sync + 'static,
    LS: LatestStateSink + Send + Sync + 'static,
    HS: HistorySink + Send + Sync + 'static,
    CR: CommandRepository + Send + Sync + 'static,
    HR: HubRepository + Send + Sync + 'static,
    ES: EventStore + Send + Sync + 'static,
{
    let mut topics: Vec<String> = Vec::new();
    let mut subscription = state.event_bus.subscribe().await;

    loop {
        tokio::select! {
            event = subscription.recv() => {
                if !should_forward(&event, &topics) {
                    continue;
                }
                if socket.send(Message::Text(encode(&event).into())).await.is_err() {
                    return;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(ClientMessage::Subscribe { topics: new_topics }) =
                            serde_json::from_str::<ClientMessage>(&text)
                        {
                            topics = new_topics;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => return,
                }
            }
        }
    }
}

/// Always forward `bus/overflow` notifications; otherwise require at least
/// one subscribed pattern to match. An empty subscription list matches
/// nothing but `bus/overflow`, since a client that hasn't subscribed yet
/// shouldn't be flooded before it has chosen its topics.
fn should_forward(event: &Event, topics: &[String]) -> bool {
    event.topic == "bus/overflow" || topics.iter().any(|p| event.matches_topic_pattern(p))
}

fn encode(event: &Event) -> String {
    let message = ServerMessage::Event {
        topic: &event.topic,
        payload: &event.payload,
    };
    serde_json::to_string(&message).unwrap_or_else(|_| "{}".to_string())
}
