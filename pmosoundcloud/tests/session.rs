use pmosoundcloud::metadata::placeholder_metadata;
use pmosoundcloud::{
    ClientOptions, ErrorKind, PlayMethod, PlaybackController, ResolvedStream, SoundCloudApi,
    StreamSession,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingController {
    failures: Mutex<Vec<(String, ErrorKind)>>,
}

impl RecordingController {
    fn failures(&self) -> Vec<(String, ErrorKind)> {
        self.failures.lock().unwrap().clone()
    }
}

impl PlaybackController for RecordingController {
    fn direct_stream_failed(&self, track_id: &str, kind: ErrorKind, _detail: &str) {
        self.failures
            .lock()
            .unwrap()
            .push((track_id.to_string(), kind));
    }
}

fn resolved(url: String) -> ResolvedStream {
    let mut metadata = placeholder_metadata("soundcloud://555");
    metadata.bitrate = "128k".to_string();
    ResolvedStream {
        url,
        metadata,
        play_method: PlayMethod::Stream,
        duration: 180.5,
    }
}

#[tokio::test]
async fn test_session_streams_bytes() {
    let server = MockServer::start().await;
    let audio: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();

    Mock::given(method("GET"))
        .and(path("/cdn/555.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(audio.clone()))
        .mount(&server)
        .await;

    let controller = Arc::new(RecordingController::default());
    let client = reqwest::Client::new();
    let mut session = StreamSession::open(
        &resolved(format!("{}/cdn/555.mp3", server.uri())),
        &client,
        controller.clone(),
    )
    .await
    .unwrap();

    assert!(!session.can_seek());
    assert!(session.is_remote());
    assert_eq!(session.content_type(), "mp3");
    assert_eq!(session.duration(), 180.5);
    assert_eq!(session.bitrate(), "128k");

    let mut received = Vec::new();
    while let Some(chunk) = session.next_chunk().await.unwrap() {
        received.extend_from_slice(&chunk);
    }

    assert_eq!(received, audio);
    assert_eq!(session.bytes_read(), audio.len() as u64);
    assert!(session.next_chunk().await.unwrap().is_none());
    assert!(controller.failures().is_empty());
}

#[tokio::test]
async fn test_open_failure_notifies_controller() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cdn/expired.mp3"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let controller = Arc::new(RecordingController::default());
    let result = StreamSession::open(
        &resolved(format!("{}/cdn/expired.mp3", server.uri())),
        &reqwest::Client::new(),
        controller.clone(),
    )
    .await;

    let err = result.err().expect("open should fail");
    assert_eq!(err.kind(), ErrorKind::DirectStreamFailed);
    assert_eq!(
        controller.failures(),
        vec![("555".to_string(), ErrorKind::DirectStreamFailed)]
    );
}

/// Serveur qui annonce plus d'octets qu'il n'en envoie puis coupe la connexion
async fn truncating_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await;
        let _ = socket
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nContent-Length: 100000\r\n\r\nID3partial",
            )
            .await;
        let _ = socket.shutdown().await;
    });

    format!("http://{}/cdn/555.mp3", addr)
}

#[tokio::test]
async fn test_mid_stream_failure_notifies_once() {
    let url = truncating_server().await;
    let controller = Arc::new(RecordingController::default());

    let mut session = StreamSession::open(&resolved(url), &reqwest::Client::new(), controller.clone())
        .await
        .unwrap();

    let mut error = None;
    loop {
        match session.next_chunk().await {
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => {
                error = Some(e);
                break;
            }
        }
    }

    let error = error.expect("truncated body should fail");
    assert_eq!(error.kind(), ErrorKind::DirectStreamFailed);
    assert!(session.has_failed());

    // Plus rien à lire, pas de seconde notification
    assert!(session.next_chunk().await.unwrap().is_none());
    assert_eq!(
        controller.failures(),
        vec![("555".to_string(), ErrorKind::DirectStreamFailed)]
    );
}

/// Serveur qui envoie un bloc de 4 octets toutes les 100 ms, puis éventuellement cale
async fn slow_server(chunks: usize, stall_after: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await;
        let _ = socket
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nTransfer-Encoding: chunked\r\n\r\n",
            )
            .await;
        for _ in 0..chunks {
            if socket.write_all(b"4\r\nMP3!\r\n").await.is_err() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        if stall_after {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        let _ = socket.write_all(b"0\r\n\r\n").await;
        let _ = socket.shutdown().await;
    });

    format!("http://{}/cdn/555.mp3", addr)
}

fn short_timeout_api() -> SoundCloudApi {
    SoundCloudApi::new(ClientOptions {
        transport_timeout: Duration::from_millis(400),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_long_stream_outlives_transport_timeout() {
    // 2 s de transfert pour un timeout de transport de 400 ms
    let url = slow_server(20, false).await;
    let api = short_timeout_api();
    let controller = Arc::new(RecordingController::default());

    let mut session = StreamSession::open(&resolved(url), api.streaming_client(), controller.clone())
        .await
        .unwrap();

    let mut received = Vec::new();
    while let Some(chunk) = session.next_chunk().await.unwrap() {
        received.extend_from_slice(&chunk);
    }

    assert_eq!(received.len(), 80);
    assert_eq!(session.bytes_read(), 80);
    assert!(!session.has_failed());
    assert!(controller.failures().is_empty());
}

#[tokio::test]
async fn test_stalled_stream_hits_read_timeout() {
    let url = slow_server(2, true).await;
    let api = short_timeout_api();
    let controller = Arc::new(RecordingController::default());

    let mut session = StreamSession::open(&resolved(url), api.streaming_client(), controller.clone())
        .await
        .unwrap();

    let error = loop {
        match session.next_chunk().await {
            Ok(Some(_)) => continue,
            Ok(None) => panic!("stalled stream should not end cleanly"),
            Err(e) => break e,
        }
    };

    assert_eq!(error.kind(), ErrorKind::DirectStreamFailed);
    assert_eq!(
        controller.failures(),
        vec![("555".to_string(), ErrorKind::DirectStreamFailed)]
    );
}
