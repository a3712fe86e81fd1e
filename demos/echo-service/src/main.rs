mod model;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use transbatch::{BatchingConfig, Service, ServiceConfig};
use crate::model::EchoModel;

const DOCUMENTS: [&str; 4] = [
    "The quick brown fox jumps. Over the lazy dog!",
    "Batching keeps every engine busy.\nEven when requests are small.",
    "Cancel me before I am translated. Please.",
    "Urgent: translate this first!",
];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServiceConfig {
        workers: 2,
        capacity_bytes: 4096,
        vocabs: vec![PathBuf::from("vocab.src"), PathBuf::from("vocab.trg")],
        batching: BatchingConfig {
            max_batch_segments: 2,
            ..BatchingConfig::default()
        },
    };
    let model = EchoModel {
        delay: Duration::from_millis(25),
    };

    let service = match Service::new(config, &model).await {
        Ok(service) => Arc::new(service),
        Err(err) => {
            error!(error = %err, "failed to start service");
            return;
        }
    };

    let handles = DOCUMENTS
        .iter()
        .enumerate()
        .map(|(i, document)| {
            let service = service.clone();
            let document = document.to_string();
            tokio::spawn(async move {
                let tracker = service.translate_part(document, i * 10).await;
                let handle = tracker.handle();
                match i {
                    2 => service.cancel(&handle),
                    3 => service.amend(&handle, 0),
                    _ => {}
                }
                match tracker.await {
                    Ok(response) => println!(
                        "Request {} [{:?}] {:?}",
                        handle.id(),
                        handle.status(),
                        response.target()
                    ),
                    Err(err) => println!("Request {} failed: {}", handle.id(), err),
                }
            })
        })
        .collect::<Vec<_>>();

    for handle in futures::future::join_all(handles).await {
        if let Err(e) = handle {
            println!("Err joining handle: {:?}", e);
        }
    }

    service.stop().await;
    info!(capacity_bytes = service.available_capacity(), "done");
}
