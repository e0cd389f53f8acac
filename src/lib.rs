//! Bytebase Provider
//!
//! Exposes the Bytebase API as declarative resources and data sources for
//! an infrastructure-as-code host. The host computes a plan from the
//! schemas declared here, then calls this crate to create, read, update,
//! delete and import objects; every call gets back the new state plus
//! diagnostics.
//!
//! # Overview
//!
//! - **Name codec** ([`names`]): canonical resource names such as
//!   `instances/prod/databases/orders`, parsed and formatted in one place
//! - **Filter compiler** ([`filter`]): typed list filters, IAM conditions
//!   and masking exception conditions, compiled to the server's expression
//!   language and parsed back
//! - **API client** ([`client`]): one CRUD surface over the JSON gateway
//!   and Connect RPC collections, with paging and cancellation
//! - **Schema mapper** ([`mapper`]): attribute tree ↔ message conversion,
//!   set hashing and field-mask computation
//! - **Resources** ([`resources`]) and **data sources** ([`data_sources`])
//! - **Provider** ([`provider`]): the [`ProviderService`] implementation
//!   the host talks to
//!
//! # Quick Start
//!
//! ```ignore
//! use terraform_provider_bytebase::{BytebaseProvider, ProviderService};
//! use tokio_util::sync::CancellationToken;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     terraform_provider_bytebase::init_logging();
//!
//!     let provider = BytebaseProvider::new();
//!     let diagnostics = provider
//!         .configure(json!({
//!             "url": "https://bytebase.example.com",
//!             "service_account": "terraform@service.bytebase.com",
//!             "service_key": "bbs_xxx"
//!         }))
//!         .await?;
//!     assert!(diagnostics.is_empty());
//!
//!     let outcome = provider
//!         .create(
//!             "bytebase_project",
//!             json!({"resource_id": "acme", "title": "Acme"}),
//!             CancellationToken::new(),
//!         )
//!         .await;
//!     println!("{:?}", outcome.state);
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! The provider block takes `url`, `service_account` and `service_key`,
//! each falling back to `BYTEBASE_URL`, `BYTEBASE_SERVICE_ACCOUNT` and
//! `BYTEBASE_SERVICE_KEY`. See [`config`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod client;
pub mod config;
pub mod context;
pub mod data;
pub mod data_sources;
pub mod error;
pub mod filter;
pub mod logging;
pub mod mapper;
pub mod names;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::{Client, HttpTransport, Transport};
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{new_provider, BytebaseProvider};
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{AttributeChange, HandlerOutcome, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tokio_util::sync::CancellationToken;
pub use tonic;
pub use tracing;
