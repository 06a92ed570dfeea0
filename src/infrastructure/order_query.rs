//! Remote order query adapter
//!
//! Fetches one order per request from the portal's GraphQL endpoint,
//! requesting only the fields the record mapper consumes. This is the
//! single place where structured errors are raised and classified; the
//! download orchestrator's retry policy keys off that classification.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::http_client::HttpClient;
use crate::domain::{ArticleRef, Column, RawRow};
use crate::infrastructure::parsing::RowSource;

/// Minimal-field order query; everything requested here is consumed by
/// the mapper or the export header. Over-fetching is deliberate nowhere.
pub const ORDER_EXPORT_QUERY: &str = "\
query OrderExport($site: String!, $orderNumber: String!) {\
  order(site: $site, orderNumber: $orderNumber) {\
    orderNumber\
    internalOrderNumber\
    lines {\
      description\
      requestedQuantity\
      confirmedQuantity\
      requestedDispatchDate\
      promisedDispatchDate\
      netTotal\
      article { number han }\
      delivery { trackingNumber expectedDate }\
    }\
  }\
}";

/// Failure classification of one order fetch.
///
/// `is_retryable` drives the orchestrator's backoff policy; empty and
/// malformed payloads count as likely-transient upstream hiccups.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("server error (HTTP {status})")]
    Server { status: u16 },

    #[error("response carried no order object")]
    EmptyResponse,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("authentication required (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("order not found")]
    NotFound,

    #[error("request rejected (HTTP {status})")]
    Rejected { status: u16 },
}

impl FetchError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Timeout
                | Self::Server { .. }
                | Self::EmptyResponse
                | Self::Malformed(_)
        )
    }

    /// User-facing message, distinguishing "please re-authenticate" from
    /// "not found".
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized { .. } => "Bitte neu am Portal anmelden.".to_string(),
            Self::NotFound => "Bestellung nicht gefunden.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Source of raw order payloads, implemented by the GraphQL client and by
/// scripted fakes in tests.
#[async_trait]
pub trait OrderFetcher: Send + Sync {
    async fn fetch_order(&self, site: &str, order_number: &str)
        -> Result<OrderPayload, FetchError>;
}

#[derive(Debug, Clone, Deserialize)]
struct QueryResponse {
    data: Option<QueryData>,
    errors: Option<Vec<QueryError>>,
}

#[derive(Debug, Clone, Deserialize)]
struct QueryData {
    order: Option<OrderPayload>,
}

#[derive(Debug, Clone, Deserialize)]
struct QueryError {
    message: String,
}

/// Raw fetched order, cached per `(order_number, site)` for the session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub order_number: String,
    #[serde(default)]
    pub internal_order_number: Option<String>,
    #[serde(default)]
    pub lines: Vec<OrderLinePayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLinePayload {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requested_quantity: Option<f64>,
    #[serde(default)]
    pub confirmed_quantity: Option<f64>,
    #[serde(default)]
    pub requested_dispatch_date: Option<String>,
    #[serde(default)]
    pub promised_dispatch_date: Option<String>,
    #[serde(default)]
    pub net_total: Option<f64>,
    #[serde(default)]
    pub article: Option<ArticlePayload>,
    #[serde(default)]
    pub delivery: Option<DeliveryPayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePayload {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub han: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPayload {
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub expected_date: Option<String>,
}

static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").unwrap());

/// `2025-09-05[T…]` -> `05.09.2025`; anything else passes through for
/// the normalizer to judge.
fn iso_to_german(date: &str) -> String {
    match ISO_DATE.captures(date) {
        Some(caps) => format!("{}.{}.{}", &caps[3], &caps[2], &caps[1]),
        None => date.to_string(),
    }
}

impl RowSource for OrderPayload {
    fn extract_rows(&self) -> Vec<RawRow> {
        self.lines
            .iter()
            .map(|line| {
                let mut row = RawRow::new();
                if let Some(description) = &line.description {
                    row.set(Column::Description, description.clone());
                }
                if let Some(quantity) = line.confirmed_quantity.or(line.requested_quantity) {
                    row.set_quantity(quantity);
                }
                if let Some(total) = line.net_total {
                    row.set_line_total(total);
                }

                let delivery_date = line
                    .delivery
                    .as_ref()
                    .and_then(|d| d.expected_date.as_deref())
                    .or(line.promised_dispatch_date.as_deref())
                    .or(line.requested_dispatch_date.as_deref());
                if let Some(date) = delivery_date {
                    row.set(Column::DeliveryDate, iso_to_german(date));
                }

                if let Some(tracking) = line.delivery.as_ref().and_then(|d| d.tracking_number.as_deref())
                {
                    row.set(Column::Tracking, tracking);
                }
                if let Some(article) = &line.article {
                    row.set_article(ArticleRef {
                        number: article.number.clone().unwrap_or_default(),
                        han: article.han.clone().unwrap_or_default(),
                    });
                }
                row
            })
            .collect()
    }
}

/// GraphQL client against the portal endpoint.
pub struct PortalOrderClient {
    http: HttpClient,
}

impl PortalOrderClient {
    #[must_use]
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl OrderFetcher for PortalOrderClient {
    async fn fetch_order(
        &self,
        site: &str,
        order_number: &str,
    ) -> Result<OrderPayload, FetchError> {
        let body = json!({
            "query": ORDER_EXPORT_QUERY,
            "variables": { "site": site, "orderNumber": order_number },
        });

        let response = self.http.post_json(&body).await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let classified = classify_status(status.as_u16());
            warn!(%status, order_number, "order query failed");
            return Err(classified);
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
            let joined = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(FetchError::Malformed(joined));
        }

        let order = parsed
            .data
            .and_then(|d| d.order)
            .ok_or(FetchError::EmptyResponse)?;

        debug!(
            order_number = %order.order_number,
            lines = order.lines.len(),
            "order payload fetched"
        );
        Ok(order)
    }
}

fn classify_status(status: u16) -> FetchError {
    match status {
        401 | 403 => FetchError::Unauthorized { status },
        404 => FetchError::NotFound,
        408 => FetchError::Timeout,
        429 | 500..=599 => FetchError::Server { status },
        other => FetchError::Rejected { status: other },
    }
}
