//! Runs the publisher service against a local rosbridge stand-in.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use depthlink_core::Envelope;
use depthlink_publisher::config::PublisherConfig;
use depthlink_publisher::service::DepthPublisherService;
use tokio::net::TcpListener;

#[tokio::test]
async fn service_streams_to_bridge() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Accept one client and collect envelopes until it hangs up.
    let bridge = tokio::spawn(async move {
        use bridge_stub::next_text;
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let mut envelopes = Vec::new();
        while let Some(text) = next_text(&mut ws).await {
            envelopes.push(Envelope::from_json(&text).unwrap());
        }
        envelopes
    });

    let mut config = PublisherConfig::default();
    config.bridge.url = format!("ws://{addr}");
    config.topic.name = "/sim/depth".into();
    config.capture.width = 24;
    config.capture.height = 12;
    config.capture.publish_interval_secs = 0.02;
    config.capture.startup_delay_secs = 0.05;

    let svc = Arc::new(DepthPublisherService::new(config));
    let stop = svc.stop_handle();
    let runner = tokio::spawn({
        let svc = Arc::clone(&svc);
        async move { svc.run().await.map_err(|e| e.to_string()) }
    });

    tokio::time::sleep(Duration::from_millis(400)).await;
    stop.store(false, Ordering::SeqCst);
    let stats = runner.await.unwrap().unwrap();
    drop(svc);

    let envelopes = tokio::time::timeout(Duration::from_secs(5), bridge)
        .await
        .expect("bridge did not see the connection close")
        .unwrap();

    assert!(stats.published >= 1);
    assert!(matches!(
        &envelopes[0],
        Envelope::Advertise { topic, message_type }
            if topic == "/sim/depth" && message_type == "sensor_msgs/msg/CompressedImage"
    ));
    let publishes: Vec<_> = envelopes[1..].iter().filter(|e| e.is_publish()).collect();
    assert!(publishes.len() as u64 >= stats.published);
    for env in publishes {
        let Envelope::Publish { topic, msg } = env else {
            unreachable!()
        };
        assert_eq!(topic, "/sim/depth");
        assert_eq!(msg.format, "png");
        assert_eq!(msg.header.frame_id, "camera");
    }
}

mod bridge_stub {
    use futures::StreamExt;
    use tokio::net::TcpStream;
    use tokio_tungstenite::WebSocketStream;
    use tokio_tungstenite::tungstenite::Message;

    /// Next text frame, or `None` once the peer closes.
    pub async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> Option<String> {
        loop {
            match ws.next().await? {
                Ok(Message::Text(t)) => return Some(t),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }
}
