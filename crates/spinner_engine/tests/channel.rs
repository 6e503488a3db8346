use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use spinner_core::JobId;
use spinner_engine::{ChannelEvent, ConnectionManager, Connector, WsConnector};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

async fn listen() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = Url::parse(&format!("ws://{addr}/ws/")).unwrap();
    (listener, url)
}

fn connector() -> WsConnector {
    WsConnector::new(Duration::from_secs(5))
}

#[tokio::test]
async fn echoes_job_back_as_notification() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let Some(Ok(Message::Text(job))) = ws.next().await else {
            panic!("expected a job announcement");
        };
        ws.send(Message::Ping(Vec::new().into())).await.unwrap();
        ws.send(Message::text(job.as_str().to_string())).await.unwrap();
        job.as_str().to_string()
    });

    let mut connection = ConnectionManager::open(url.clone(), &connector()).await;
    assert!(connection.is_open());
    assert_eq!(connection.endpoint(), &url);

    connection.send(&JobId::from("a/b/c/d")).await;
    assert_eq!(
        connection.next_event().await,
        ChannelEvent::Notification("a/b/c/d".to_string())
    );
    assert_eq!(server.await.unwrap(), "a/b/c/d");
}

#[tokio::test]
async fn server_close_is_reported_once_and_sticks() {
    let (listener, url) = listen().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws
            .close(Some(CloseFrame {
                code: CloseCode::Away,
                reason: "restarting".into(),
            }))
            .await;
        while ws.next().await.is_some() {}
    });

    let mut connection = ConnectionManager::open(url, &connector()).await;
    let ChannelEvent::Closed { reason } = connection.next_event().await else {
        panic!("expected close");
    };
    assert_eq!(reason.as_deref(), Some("1001 restarting"));
    assert!(!connection.is_open());
    assert_eq!(
        connection.next_event().await,
        ChannelEvent::Closed { reason: None }
    );

    // Sending on a closed connection is dropped quietly.
    connection.send(&JobId::from("late")).await;
}

#[tokio::test]
async fn refused_connection_leaves_manager_closed() {
    let (listener, url) = listen().await;
    drop(listener);

    let connection = ConnectionManager::open(url.clone(), &connector()).await;
    assert!(!connection.is_open());
    assert!(connector().connect(&url).await.is_err());
}

#[tokio::test]
async fn client_close_ends_the_session() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let mut saw_close = false;
        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                saw_close = true;
            }
        }
        saw_close
    });

    let mut connection = ConnectionManager::open(url, &connector()).await;
    connection.close().await;
    assert!(!connection.is_open());
    assert!(server.await.unwrap());
}
