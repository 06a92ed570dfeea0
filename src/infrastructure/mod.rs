//! Infrastructure layer: configuration, logging, transport, extraction
//! sources, and artifact delivery.

pub mod config;
pub mod csv_export;
pub mod export_sink;
pub mod http_client;
pub mod logging;
pub mod order_query;
pub mod parsing;

pub use config::AppConfig;
pub use csv_export::{export_filename, to_csv, CsvError};
pub use export_sink::{ArtifactHandle, ExportArtifact, ExportSink, FileSystemSink, MemorySink};
pub use http_client::HttpClient;
pub use order_query::{FetchError, OrderFetcher, OrderPayload, PortalOrderClient};
