// Integration tests for `DetectionStream` against a local WebSocket server.
#![allow(clippy::unwrap_used)]

use futures_util::SinkExt;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use url::Url;

use bob_api::{DetectionStream, Error, StreamEvent, StreamTls, TlsMode};

/// Accept one connection, send `frames`, then close with `code`.
async fn serve_once(frames: Vec<Message>, code: Option<CloseCode>) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        for frame in frames {
            ws.send(frame).await.unwrap();
        }
        let close = code.map(|code| CloseFrame {
            code,
            reason: "bye".into(),
        });
        let _ = ws.close(close).await;
    });

    format!("ws://{addr}/ws/detections").parse().unwrap()
}

#[tokio::test]
async fn test_text_frames_then_close_code() {
    let url = serve_once(
        vec![
            Message::Ping(vec![1, 2].into()),
            Message::Text(r#"{"detections":[]}"#.into()),
            Message::Binary(vec![0xde, 0xad].into()),
            Message::Text("second".into()),
        ],
        Some(CloseCode::Away),
    )
    .await;

    let mut stream = DetectionStream::connect(&url, &StreamTls::default()).await.unwrap();

    assert_eq!(
        stream.next_event().await,
        StreamEvent::MessageReceived(r#"{"detections":[]}"#.into())
    );
    assert_eq!(
        stream.next_event().await,
        StreamEvent::MessageReceived("second".into())
    );
    assert_eq!(stream.next_event().await, StreamEvent::Closed(Some(1001)));
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url: Url = format!("ws://{addr}/ws/detections").parse().unwrap();
    let err = DetectionStream::connect(&url, &StreamTls::default()).await.err().unwrap();
    assert!(matches!(err, Error::WebSocketConnect(_)));
}

#[tokio::test]
async fn test_custom_tls_leaves_plain_stream_alone() {
    let url = serve_once(vec![Message::Text("hello".into())], Some(CloseCode::Normal)).await;
    let tls = StreamTls::from_mode(&TlsMode::DangerAcceptInvalid).unwrap();

    let mut stream = DetectionStream::connect(&url, &tls).await.unwrap();
    assert_eq!(
        stream.next_event().await,
        StreamEvent::MessageReceived("hello".into())
    );
    assert_eq!(stream.next_event().await, StreamEvent::Closed(Some(1000)));
}
