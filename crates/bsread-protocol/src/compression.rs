//! Compression providers, looked up by the name used in headers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{CodecError, ProtocolError, Result};

/// Name of the identity provider. An absent compression maps to it as well.
pub const NONE: &str = "none";

/// A byte transform applied to data headers or channel values.
pub trait CompressionProvider: Send + Sync {
    /// Name carried in `dh_compression` / channel `compression`.
    fn name(&self) -> &str;

    fn compress(&self, data: &[u8]) -> Vec<u8>;

    fn decompress(&self, data: &[u8]) -> std::result::Result<Vec<u8>, CodecError>;
}

/// Pass-through provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl CompressionProvider for Identity {
    fn name(&self) -> &str {
        NONE
    }

    fn compress(&self, data: &[u8]) -> Vec<u8> {
        data.to_vec()
    }

    fn decompress(&self, data: &[u8]) -> std::result::Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }
}

/// Name-keyed set of compression providers.
///
/// Names are resolved when a sender or channel is configured, so an unknown
/// name fails before anything is sent.
#[derive(Clone)]
pub struct CompressionRegistry {
    providers: BTreeMap<String, Arc<dyn CompressionProvider>>,
}

impl CompressionRegistry {
    /// Registry holding only the identity provider.
    pub fn new() -> Self {
        let mut providers: BTreeMap<String, Arc<dyn CompressionProvider>> = BTreeMap::new();
        providers.insert(NONE.to_string(), Arc::new(Identity));
        Self { providers }
    }

    /// Add or replace a provider under its own name.
    pub fn register(&mut self, provider: Arc<dyn CompressionProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Valid names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Look up a provider; `None` resolves to the identity provider.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn CompressionProvider>> {
        let name = name.unwrap_or(NONE);
        self.providers.get(name).cloned().ok_or_else(|| {
            ProtocolError::Configuration(format!(
                "compression '{name}' not supported, available: {}",
                self.names().join(", ")
            ))
        })
    }
}

impl Default for CompressionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompressionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressionRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
