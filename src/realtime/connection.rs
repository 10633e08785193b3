//! One WebSocket subscriber: a writer task draining the hub queue and a reader
//! task watching for the client to go away.

use std::sync::Arc;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use super::hub::{HubHandle, Subscriber};

/// Serves `socket` until either side closes it.
///
/// Whichever task stops first signals the other, and both unregister from
/// the hub on the way out. Returns once both have finished.
pub async fn serve_subscriber<S>(hub: HubHandle, socket: S, queue_capacity: usize, peer: String)
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Send + 'static,
{
    let (subscriber, mut outbound) = Subscriber::new(queue_capacity);
    let id = subscriber.id();
    debug!(subscriber_id = %id, %peer, "Subscriber connecting");

    let (mut sink, mut stream) = socket.split();
    hub.register(subscriber).await;
    info!(subscriber_id = %id, %peer, "Subscriber active");

    let (close_tx, close_rx) = watch::channel(false);
    let close_tx = Arc::new(close_tx);

    let writer = {
        let hub = hub.clone();
        let close_tx = Arc::clone(&close_tx);
        let mut close_rx = close_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    next = outbound.recv() => match next {
                        Some(payload) => {
                            if let Err(e) = sink.send(Message::Text(payload.to_string())).await {
                                warn!(subscriber_id = %id, error = %e, "Write to subscriber failed");
                                break;
                            }
                        }
                        None => {
                            debug!(subscriber_id = %id, "Queue closed by hub");
                            break;
                        }
                    },
                    _ = close_rx.changed() => break,
                }
            }
            let _ = close_tx.send(true);
            hub.unregister(id).await;
            let _ = sink.close().await;
        })
    };

    let reader = {
        let hub = hub.clone();
        let mut close_rx = close_rx;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = stream.next() => match frame {
                        Some(Ok(Message::Close(_))) | None => break,
                        // inbound frames carry nothing for us
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            debug!(subscriber_id = %id, error = %e, "Read from subscriber failed");
                            break;
                        }
                    },
                    _ = close_rx.changed() => break,
                }
            }
            let _ = close_tx.send(true);
            hub.unregister(id).await;
        })
    };

    let _ = tokio::join!(writer, reader);
    info!(subscriber_id = %id, %peer, "Subscriber closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::leave_request::{LeaveRequest, LeaveStatus, LeaveType},
        realtime::{event::DomainEvent, hub::Hub},
    };
    use chrono::{NaiveDate, Utc};
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use tokio_tungstenite::{WebSocketStream, tungstenite::protocol::Role};

    async fn socket_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (server, client) = tokio::io::duplex(64 * 1024);
        (
            WebSocketStream::from_raw_socket(server, Role::Server, None).await,
            WebSocketStream::from_raw_socket(client, Role::Client, None).await,
        )
    }

    async fn wait_for_subscribers(hub: &HubHandle, expected: usize) {
        for _ in 0..200 {
            if hub.subscriber_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("hub never reached {expected} subscribers");
    }

    fn leave_canceled() -> DomainEvent {
        DomainEvent::LeaveCanceled(LeaveRequest {
            id: 5,
            employee_id: 1000,
            leave_type: LeaveType::Unpaid,
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            reason: None,
            status: LeaveStatus::Canceled,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn published_events_reach_the_client_as_text_frames() {
        let hub = Hub::spawn(16);
        let (server, mut client) = socket_pair().await;
        tokio::spawn(serve_subscriber(hub.clone(), server, 8, "test".into()));
        wait_for_subscribers(&hub, 1).await;

        hub.publish(leave_canceled());

        let frame = tokio::time::timeout(Duration::from_secs(1), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let Message::Text(text) = frame else {
            panic!("expected a text frame, got {frame:?}");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "LEAVE_CANCELED");
        assert_eq!(value["data"]["id"], 5);
    }

    #[tokio::test]
    async fn client_close_unregisters_and_ends_both_tasks() {
        let hub = Hub::spawn(16);
        let (server, mut client) = socket_pair().await;
        let served = tokio::spawn(serve_subscriber(hub.clone(), server, 8, "test".into()));
        wait_for_subscribers(&hub, 1).await;

        client.close(None).await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), served)
            .await
            .expect("connection did not shut down")
            .unwrap();
        wait_for_subscribers(&hub, 0).await;
    }

    #[tokio::test]
    async fn dropped_transport_unregisters() {
        let hub = Hub::spawn(16);
        let (server, client) = socket_pair().await;
        let served = tokio::spawn(serve_subscriber(hub.clone(), server, 8, "test".into()));
        wait_for_subscribers(&hub, 1).await;

        drop(client);

        tokio::time::timeout(Duration::from_secs(1), served)
            .await
            .expect("connection did not shut down")
            .unwrap();
        assert_eq!(hub.subscriber_count().await, 0);
    }
}
