//! In-process Socket.IO relay: per-document rooms, fan-out to everyone in
//! the room but the sender. Framing is socketioxide's, not ours.

use axum::{routing::get, Router};
use serde_json::{json, Value};
use socketioxide::{extract::Data, extract::SocketRef, SocketIo};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Short enough that a client which stops answering pings is dropped within a test
pub const PING_INTERVAL: Duration = Duration::from_millis(100);

type EventLog = Arc<Mutex<Vec<(String, Value)>>>;

pub struct TestRelay {
    pub url: String,
    log: EventLog,
}

impl TestRelay {
    pub async fn spawn() -> Self {
        let log: EventLog = Arc::default();
        let (layer, io) = SocketIo::builder()
            .ping_interval(PING_INTERVAL)
            .ping_timeout(PING_INTERVAL)
            .build_layer();
        let connect_log = log.clone();
        io.ns("/", move |s: SocketRef| on_connect(s, connect_log.clone()));

        let app = Router::new().route("/", get(|| async { "relay" })).layer(layer);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            url: format!("ws://{}/socket.io/?EIO=4&transport=websocket", addr),
            log,
        }
    }

    /// Payloads of every event with this name the relay has received
    pub fn events(&self, name: &str) -> Vec<Value> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub async fn wait_for_events(&self, name: &str, count: usize) -> Vec<Value> {
        for _ in 0..500 {
            let events = self.events(name);
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("relay never saw {} '{}' events", count, name);
    }
}

fn record(log: &EventLog, name: &str, payload: Value) {
    log.lock().unwrap().push((name.to_string(), payload));
}

fn on_connect(s: SocketRef, log: EventLog) {
    for name in ["join_doc", "leave_doc", "doc_change"] {
        let log = log.clone();
        s.on(name, move |s: SocketRef, Data::<Value>(payload)| {
            on_doc_event(&s, name, payload, &log)
        });
    }
    s.on_disconnect(move |_: SocketRef| record(&log, "disconnect", Value::Null));
}

fn on_doc_event(s: &SocketRef, name: &str, payload: Value, log: &EventLog) {
    record(log, name, payload.clone());
    let Some(doc_id) = payload.get("doc_id").and_then(Value::as_str).map(str::to_string) else {
        return;
    };
    match name {
        "join_doc" => {
            let _ = s.join(doc_id.clone());
            let _ = s
                .to(doc_id)
                .emit("presence", &json!({"event": "join", "user": payload["user"]}));
        }
        "leave_doc" => {
            let _ = s
                .to(doc_id.clone())
                .emit("presence", &json!({"event": "leave", "user": payload["user"]}));
            let _ = s.leave(doc_id);
        }
        "doc_change" => {
            let _ = s.to(doc_id).emit(
                "doc_update",
                &json!({"content": payload["content"], "client_id": payload["client_id"]}),
            );
        }
        _ => {}
    }
}
