//! # Conflux Core
//!
//! Core types and traits for the Conflux configuration engine.
//!
//! This crate provides the foundational types shared by every source and by
//! the aggregator:
//!
//! - [`ConfigurationSource`] / [`MutableSource`] - Source contracts
//! - [`ConfigurationMap`] - Key/value fragment
//! - [`ApplicationIdentity`] - Identity discovered from the bootstrap
//! - [`ConfigContext`] - Once-initialized process-wide state
//! - [`ConfigurationError`] - Standard error type

#![doc(html_root_url = "https://docs.rs/conflux-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
mod identity;
mod source;

pub use context::{env_alias, ConfigContext, EmptyNamingContext, NamingContext, SystemProperties};
pub use error::{ConfigResult, ConfigurationError, ErrorKind};
pub use identity::{
    ApplicationIdentity, DecryptionKey, ADMIN_ENABLED_KEY, APP_NAME_KEY, DECRYPTION_KEY_NAME_KEY,
    DEFAULT_DECRYPTION_KEY_PROPERTY, PROPERTIES_FILE_KEY,
};
pub use source::{
    ConfigurationMap, ConfigurationSource, DeleteOutcome, MutableSource, PutOutcome, StaticSource,
};
