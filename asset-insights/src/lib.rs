//! Typed data-access layer for an OData-style alert service
//!
//! The crate maps the service's wire records onto domain-named attributes
//! through declarative field tables, compiles attribute filters into the
//! service's query dialect (splitting large OR-groups across requests), and
//! materializes responses into typed entities with tenant custom-property
//! support. [`find_alerts`] and [`create_alert`] are the high-level entry
//! points; everything underneath is usable on its own.
//!
//! ```no_run
//! use asset_insights::{FilterSpec, HttpTransport, find_alerts};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let transport = HttpTransport::from_env()?;
//! let filters = FilterSpec::new()
//!     .eq("type", "'PUMP_OVERHEAT'")
//!     .any("severity_code", [10, 15, 20])
//!     .expr("count > 3");
//! let alerts = find_alerts(&transport, filters).await?;
//! for alert in &alerts {
//!     println!("{}", alert);
//! }
//! # Ok(())
//! # }
//! ```

pub mod alert;
pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod fields;
pub mod filters;
pub mod timestamps;
pub mod value;
pub mod warnings;

pub use alert::{
    ALERT_SCHEMA, ALERTS_READ_PATH, ALERTS_WRITE_PATH, Alert, AlertSet, create_alert, find_alerts,
};
pub use client::{HttpTransport, QUERY_LENGTH_BUDGET, Transport, compose_queries};
pub use config::Config;
pub use entity::{Entity, EntitySet, Table, is_custom_key};
pub use error::{
    AttributeUnavailable, ExtractError, FormatError, HeterogeneousTypes, MalformedExpression,
    MixedElements, UnexpectedCreateResult, UnsupportedTimestamp,
};
pub use fields::{EntitySchema, Extractor, FieldDescriptor, QueryTransform, QueryValue};
pub use filters::{FilterArg, FilterClauses, FilterSpec, compile_filters};
pub use timestamps::{
    EpochUnit, TimestampLike, coerce_any_to_instant, instant_to_date_string, instant_to_iso,
    nice_sub_interval, parse_odata_timestamp, parse_string_timestamp,
};
pub use value::FieldValue;
pub use warnings::{Warning, capture, emit};
