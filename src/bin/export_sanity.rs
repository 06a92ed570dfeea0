//! End-to-end sanity run of the export engine against canned payloads.
//!
//! Drives the full pipeline (fetch, map, serialize, deliver) through a
//! scripted fetcher and an in-memory sink, then prints the resulting
//! CSV artifacts. Useful for eyeballing output formats without portal
//! access.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use portal_order_export_lib::infrastructure::logging::init_logging;
use portal_order_export_lib::infrastructure::order_query::OrderPayload;
use portal_order_export_lib::{
    AppConfig, ExportOrchestrator, ExportSink, FetchError, MemorySink, OrchestratorConfig,
    OrderFetcher, TaskState,
};

struct CannedFetcher;

#[async_trait]
impl OrderFetcher for CannedFetcher {
    async fn fetch_order(
        &self,
        _site: &str,
        order_number: &str,
    ) -> Result<OrderPayload, FetchError> {
        let payload = json!({
            "orderNumber": order_number,
            "internalOrderNumber": format!("D-BE{order_number}-I"),
            "lines": [
                {
                    "description": "Fadenkopf T25",
                    "confirmedQuantity": 3.0,
                    "netTotal": 51.78,
                    "promisedDispatchDate": "2025-09-05",
                    "article": { "number": "ART-99", "han": "5936152" }
                },
                {
                    "description": "Sägekette 3/8\" 1,5mm",
                    "requestedQuantity": 1.0,
                    "netTotal": 24.9,
                    "requestedDispatchDate": "2025-09-12",
                    "article": { "number": "501840672", "han": "5018406" }
                }
            ]
        });
        serde_json::from_value(payload).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(None)?;
    init_logging(&config.logging)?;

    let sink = Arc::new(MemorySink::new());
    let orchestrator = ExportOrchestrator::new(
        OrchestratorConfig::from(&config.download),
        Arc::new(CannedFetcher),
        Arc::clone(&sink) as Arc<dyn ExportSink>,
    );

    let orders = ["4711", "4712", "4713"];
    let mut events = orchestrator.subscribe();
    for order in orders {
        let outcome = orchestrator.submit(order)?;
        info!(order, ?outcome, "submitted");
    }

    let mut remaining = orders.len();
    while remaining > 0 {
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .context("export run did not finish in time")?
            .context("status stream closed early")?;
        info!(
            order = %event.order_number,
            state = event.state.as_str(),
            attempt = event.attempt,
            "status"
        );
        if event.state.is_terminal() {
            remaining -= 1;
        }
    }

    for task in orchestrator.snapshot() {
        assert_eq!(task.state, TaskState::Success, "order {}", task.order_number);
    }
    for artifact in sink.delivered() {
        println!("--- {} ---", artifact.filename);
        println!("{}", artifact.content);
    }
    Ok(())
}
