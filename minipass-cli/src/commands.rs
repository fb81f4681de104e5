use std::time::Duration;

use minipass_cache::{
    AssetRequest, AssetWorker, FetchOutcome, ServedFrom, WorkerCommand, WorkerConfig,
};
use minipass_notify::{
    NotificationStream, NotifyConfig, PushClient, PushSubscription, SubscriptionKeys, TrayEvent,
};
use tracing::{info, warn};
use url::Url;

use crate::cli::{CacheCommands, PushCommands};
use crate::error::AppError;

/// Run the live notification stream until interrupted
pub async fn listen(
    server: Url,
    max_visible: usize,
    dismiss_after: u64,
    max_reconnects: u32,
) -> Result<(), AppError> {
    let config = NotifyConfig::builder(server)
        .with_max_visible(max_visible)
        .with_auto_dismiss(Duration::from_secs(dismiss_after))
        .with_max_reconnect_attempts(max_reconnects)
        .build();

    info!(url = %config.base_url, "Connecting to notification stream (Ctrl-C to stop)");
    let (stream, handle, mut events) = NotificationStream::new(config)?;
    let runner = tokio::spawn(stream.run());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing notification channel");
                handle.unload();
                break;
            }
            event = events.recv() => {
                match event {
                    Some(event) => report_tray_event(&event),
                    None => break,
                }
            }
        }
    }

    match runner.await {
        Ok(result) => Ok(result?),
        Err(e) => Err(AppError::Initialization(e.to_string())),
    }
}

fn report_tray_event(event: &TrayEvent) {
    match event {
        TrayEvent::Shown {
            id,
            body,
            persistent,
        } => {
            info!(id = %id, persistent, "Notification: {body}");
        }
        TrayEvent::Dismissed { id } => {
            info!(id = %id, "Notification dismissed");
        }
        TrayEvent::Connected => {
            info!("Notification channel established");
        }
        TrayEvent::ConnectionLost { attempt, retry_in } => {
            warn!(
                attempt,
                retry_in_ms = retry_in.as_millis() as u64,
                "Notification channel lost, reconnecting"
            );
        }
        TrayEvent::ConnectionFailed => {
            warn!("Reconnection abandoned; restart to reconnect");
        }
    }
}

/// Manage web-push subscriptions against the server
pub async fn push(server: Url, command: PushCommands) -> Result<(), AppError> {
    let config = NotifyConfig::new(server);
    let client = PushClient::new(&config)?;

    match command {
        PushCommands::VapidKey => {
            let key = client.vapid_public_key().await?;
            info!(bytes = key.len(), "Fetched VAPID public key");
            let hex: String = key.iter().map(|b| format!("{b:02x}")).collect();
            println!("{hex}");
        }
        PushCommands::Subscribe {
            endpoint,
            p256dh,
            auth,
        } => {
            let subscription = PushSubscription {
                endpoint: endpoint.clone(),
                keys: SubscriptionKeys { p256dh, auth },
            };
            client.subscribe(&subscription).await?;
            info!(endpoint = %endpoint, "Push subscription registered");
        }
        PushCommands::Unsubscribe { endpoint } => {
            client.unsubscribe(&endpoint).await?;
            info!(endpoint = %endpoint, "Push subscription removed");
        }
    }
    Ok(())
}

/// Drive the offline asset cache
pub async fn cache(server: Url, command: CacheCommands) -> Result<(), AppError> {
    let worker = AssetWorker::new(WorkerConfig::new(server));

    match command {
        CacheCommands::Warm => {
            let report = warm(&worker).await;
            if !report.failed.is_empty() {
                warn!(failed = ?report.failed, "Some assets could not be pre-cached");
            }
        }
        CacheCommands::Serve { urls } => {
            warm(&worker).await;
            for raw in &urls {
                let url = Url::parse(raw)
                    .map_err(|e| AppError::InvalidInput(format!("Invalid URL '{raw}': {e}")))?;
                serve_one(&worker, url).await;
            }
        }
        CacheCommands::Clear => {
            worker.handle_message(WorkerCommand::ClearCache);
            info!("All cache partitions deleted");
        }
    }
    Ok(())
}

async fn warm(worker: &AssetWorker) -> minipass_cache::PrecacheReport {
    let report = worker.install().await;
    let deleted = worker.activate().await;
    info!(
        cached = report.cached.len(),
        failed = report.failed.len(),
        pruned_partitions = deleted.len(),
        "Cache warmed"
    );
    report
}

async fn serve_one(worker: &AssetWorker, url: Url) {
    let request = AssetRequest::get(url.clone());
    match worker.fetch(&request).await {
        Ok(FetchOutcome::Served { response, source }) => {
            let source = match source {
                ServedFrom::Network => "network",
                ServedFrom::Cache => "cache",
                ServedFrom::Fallback => "fallback",
            };
            info!(
                url = %url,
                status = %response.status,
                bytes = response.body.len(),
                source,
                "Served"
            );
        }
        Ok(FetchOutcome::Passthrough) => {
            info!(url = %url, "Cross-origin request, not intercepted");
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Fetch failed");
        }
    }
}
