//! STOMP transport loop for the Darwin PushPort topic.
//!
//! Connects with a durable subscription (client-id derived from the
//! username and host name, subscription named after the host), feeds every
//! frame body to the pipeline, and reconnects after the configured delay
//! whenever the connection drops.

use std::time::Duration;

use async_stomp::client::{Connector, Subscriber};
use async_stomp::FromServer;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::config::DarwinConfig;
use crate::runtime::RealtimePipeline;

/// Run the subscribe/receive loop forever, reconnecting on failure.
pub async fn run(config: &DarwinConfig, pipeline: &mut RealtimePipeline) {
    let host = gethostname::gethostname().to_string_lossy().to_string();

    loop {
        listen_once(config, &host, pipeline).await;
        warn!(
            delay_secs = config.reconnect_delay_secs,
            "Disconnected from Darwin, sleeping before reconnect"
        );
        tokio::time::sleep(Duration::from_secs(config.reconnect_delay_secs)).await;
    }
}

/// One connect-subscribe-receive cycle. Returns when the stream ends or
/// errors; the caller handles the reconnect delay.
async fn listen_once(config: &DarwinConfig, host: &str, pipeline: &mut RealtimePipeline) {
    let server = format!("{}:{}", config.host, config.port);
    let client_id = format!("{}-{}", config.username, host);
    let heartbeat = format!("{},{}", config.heartbeat_ms, config.heartbeat_ms);

    info!(server = %server, client_id = %client_id, "Connecting to Darwin");

    let mut conn = match Connector::builder()
        .server(server.clone())
        .virtualhost(config.host.clone())
        .login(config.username.clone())
        .passcode(config.password.clone())
        .headers(vec![
            ("client-id".to_string(), client_id),
            ("heart-beat".to_string(), heartbeat),
        ])
        .connect()
        .await
    {
        Ok(conn) => conn,
        Err(e) => {
            warn!(error = %e, "Failed to connect to Darwin");
            return;
        }
    };

    info!(topic = %config.topic, "Subscribing to PushPort topic");

    let subscribe = Subscriber::builder()
        .destination(config.topic.clone())
        .id(config.subscription_id.clone())
        .headers(vec![(
            "activemq.subscriptionName".to_string(),
            host.to_string(),
        )])
        .subscribe();

    if let Err(e) = conn.send(subscribe).await {
        warn!(error = %e, "Failed to subscribe to PushPort topic");
        return;
    }

    while let Some(item) = conn.next().await {
        let message = match item {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "STOMP stream error");
                return;
            }
        };

        match message.content {
            FromServer::Message { body, .. } => {
                if let Some(body) = body {
                    pipeline.handle_frame(&body);
                }
            }
            FromServer::Error { message, .. } => {
                warn!(message = ?message, "STOMP error frame");
            }
            other => {
                debug!(frame = ?other, "Ignoring STOMP frame");
            }
        }
    }
}
