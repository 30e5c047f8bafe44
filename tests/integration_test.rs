use async_trait::async_trait;
use mockall::predicate::eq;
use rumqttc::{AsyncClient, ConnAck, ConnectReturnCode, Event, Outgoing, Packet, Publish, QoS};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use ttv_announcer::broker::{dispatch, mqtt_options, BrokerClient, MessageHandler, Subscriber};
use ttv_announcer::config_loader::{Settings, MIN_REQUEST_CAPACITY};
use ttv_announcer::engine::SilentSink;
use ttv_announcer::engine::SpeechSink;
use ttv_announcer::error::{BridgeError, BridgeResult, SpeechError};
use ttv_announcer::router::Router;

mockall::mock! {
    pub Sink {}
    #[async_trait::async_trait]
    impl SpeechSink for Sink {
        async fn speak(&self, text: &str) -> Result<(), SpeechError>;
    }
}

mockall::mock! {
    pub Client {}
    #[async_trait::async_trait]
    impl Subscriber for Client {
        async fn subscribe(&self, topic: &str) -> BridgeResult<()>;
    }
}

fn publish(topic: &str, payload: &str) -> Event {
    Event::Incoming(Packet::Publish(Publish::new(
        topic,
        QoS::AtMostOnce,
        payload.as_bytes().to_vec(),
    )))
}

fn idle_client() -> MockClient {
    let mut client = MockClient::new();
    client.expect_subscribe().times(0);
    client
}

async fn expect_phrase(topic: &str, payload: &str, phrase: &'static str) {
    let mut sink = MockSink::new();
    sink.expect_speak()
        .with(eq(phrase))
        .times(1)
        .returning(|_| Ok(()));

    let router = Router::new(Arc::new(sink));
    dispatch(publish(topic, payload), &idle_client(), &router)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unknown_user_ignores_empty_payload() {
    expect_phrase("/ttv/unknown", "", "unknown user detected").await;
}

#[tokio::test]
async fn test_unknown_user_ignores_username() {
    expect_phrase("/ttv/unknown", "unknown", "unknown user detected").await;
}

#[tokio::test]
async fn test_inbound_welcomes_user() {
    expect_phrase("/ttv/inbound", "alice", "welcome alice").await;
}

#[tokio::test]
async fn test_outbound_says_goodbye() {
    expect_phrase("/ttv/outbound", "bob", "goodbye bob").await;
}

#[tokio::test]
async fn test_payload_is_not_trimmed() {
    expect_phrase("/ttv/inbound", "  Alice ", "welcome   Alice ").await;
}

#[tokio::test]
async fn test_other_topic_is_ignored() {
    let mut sink = MockSink::new();
    sink.expect_speak().times(0);

    let router = Router::new(Arc::new(sink));
    let result = dispatch(publish("/ttv/other", "x"), &idle_client(), &router).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_connack_subscribes_three_topics() {
    let mut seq = mockall::Sequence::new();
    let mut client = MockClient::new();
    for topic in ["/ttv/unknown", "/ttv/inbound", "/ttv/outbound"] {
        client
            .expect_subscribe()
            .with(eq(topic))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
    }

    let mut sink = MockSink::new();
    sink.expect_speak().times(0);
    let router = Router::new(Arc::new(sink));

    let connack = Event::Incoming(Packet::ConnAck(ConnAck::new(
        ConnectReturnCode::Success,
        false,
    )));
    dispatch(connack, &client, &router).await.unwrap();
}

#[tokio::test]
async fn test_keepalive_traffic_is_ignored() {
    let mut sink = MockSink::new();
    sink.expect_speak().times(0);
    let router = Router::new(Arc::new(sink));
    let client = idle_client();

    dispatch(Event::Outgoing(Outgoing::PingReq), &client, &router)
        .await
        .unwrap();
    dispatch(Event::Incoming(Packet::PingResp), &client, &router)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_speech_failure_propagates() {
    let mut sink = MockSink::new();
    sink.expect_speak()
        .times(1)
        .returning(|_| Err(SpeechError::EngineStopped));

    let router = Router::new(Arc::new(sink));
    let err = router.on_message("/ttv/inbound", b"alice").await.unwrap_err();
    assert!(matches!(err, BridgeError::Speech(SpeechError::EngineStopped)));
}

/// Records when each utterance starts and ends.
#[derive(Default)]
struct TimelineSink {
    timeline: Mutex<Vec<String>>,
}

#[async_trait]
impl SpeechSink for TimelineSink {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        self.timeline.lock().unwrap().push(format!("start {}", text));
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.timeline.lock().unwrap().push(format!("end {}", text));
        Ok(())
    }
}

#[tokio::test]
async fn test_handler_speaks_back_to_back_messages_in_sequence() {
    let sink = Arc::new(TimelineSink::default());
    let router = Router::new(sink.clone());
    let client = idle_client();

    let events = vec![publish("/ttv/inbound", "alice"), publish("/ttv/inbound", "carol")];
    for event in events {
        dispatch(event, &client, &router).await.unwrap();
    }

    assert_eq!(
        *sink.timeline.lock().unwrap(),
        vec![
            "start welcome alice",
            "end welcome alice",
            "start welcome carol",
            "end welcome carol",
        ]
    );
}

#[tokio::test]
async fn test_on_connect_fits_minimum_request_capacity() {
    let settings = Settings {
        request_capacity: MIN_REQUEST_CAPACITY,
        ..Settings::default()
    };
    // The event loop is never polled here, so every subscribe must fit the queue
    let (client, _eventloop) = AsyncClient::new(mqtt_options(&settings), settings.request_capacity);
    let router = Router::new(Arc::new(SilentSink));

    let result = tokio::time::timeout(Duration::from_secs(2), router.on_connect(&client)).await;
    assert!(result.expect("subscribes blocked on a full request queue").is_ok());
}

fn publish_frame(topic: &str, payload: &str) -> Vec<u8> {
    let mut frame = vec![0x30, (2 + topic.len() + payload.len()) as u8];
    frame.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    frame.extend_from_slice(topic.as_bytes());
    frame.extend_from_slice(payload.as_bytes());
    frame
}

/// Accepts one client, acknowledges its CONNECT and pushes two publishes at once.
async fn serve_two_publishes(listener: TcpListener) {
    let (mut socket, _) = listener.accept().await.unwrap();
    let mut buf = [0u8; 1024];
    let _ = socket.read(&mut buf).await.unwrap();

    let mut burst = vec![0x20, 0x02, 0x00, 0x00];
    burst.extend(publish_frame("/ttv/inbound", "alice"));
    burst.extend(publish_frame("/ttv/inbound", "carol"));
    socket.write_all(&burst).await.unwrap();

    // Swallow SUBSCRIBE and ping traffic until the client goes away
    while let Ok(n) = socket.read(&mut buf).await {
        if n == 0 {
            break;
        }
    }
}

#[tokio::test]
async fn test_run_loop_speaks_back_to_back_messages_in_sequence() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(serve_two_publishes(listener));

    let settings = Settings {
        hostname: "127.0.0.1".to_string(),
        port,
        client_id: "ttv-announcer-run-test".to_string(),
        ..Settings::default()
    };
    let sink = Arc::new(TimelineSink::default());
    let router = Router::new(sink.clone());
    let client = BrokerClient::new(&settings);

    let spoken_twice = async {
        while sink.timeline.lock().unwrap().len() < 4 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };

    tokio::select! {
        result = client.run(&router) => panic!("run loop ended: {:?}", result.err()),
        _ = tokio::time::timeout(Duration::from_secs(5), spoken_twice) => {}
    }

    assert_eq!(
        *sink.timeline.lock().unwrap(),
        vec![
            "start welcome alice",
            "end welcome alice",
            "start welcome carol",
            "end welcome carol",
        ]
    );
}
