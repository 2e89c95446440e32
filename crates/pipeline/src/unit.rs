//! Destination unit
//!
//! Runtime handle of one configured destination: its storage, the tokens it
//! serves and the hash of the config it was built from. Units are owned by
//! the registry and never shared between two configs; a changed config
//! means a new unit.

use std::fmt;
use std::sync::Arc;

use courier_config::DestinationMode;
use courier_sinks::{SinkError, Storage};

use crate::consumer::{Consumer, StreamConsumer};

pub struct DestinationUnit {
    name: String,
    config_hash: String,
    tokens: Vec<String>,
    storage: Arc<dyn Storage>,
}

impl DestinationUnit {
    pub fn new(
        name: impl Into<String>,
        config_hash: impl Into<String>,
        tokens: Vec<String>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            name: name.into(),
            config_hash: config_hash.into(),
            tokens,
            storage,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    /// Tokens the unit is registered under
    #[inline]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    #[inline]
    pub fn mode(&self) -> DestinationMode {
        self.storage.mode()
    }

    #[inline]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Stream destinations get their own consumer per token
    #[inline]
    pub fn has_own_consumer(&self) -> bool {
        self.mode() == DestinationMode::Stream
    }

    /// Consumer for one of the unit's tokens (stream mode)
    pub fn consumer(&self, token_id: &str) -> Arc<dyn Consumer> {
        Arc::new(StreamConsumer::new(token_id, Arc::clone(&self.storage)))
    }

    /// Close the storage together with its queue
    ///
    /// # Errors
    ///
    /// Returns the storage close error.
    pub async fn close(&self) -> Result<(), SinkError> {
        self.storage.close().await
    }
}

impl fmt::Debug for DestinationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationUnit")
            .field("name", &self.name)
            .field("kind", &self.storage.kind())
            .field("mode", &self.mode())
            .field("tokens", &self.tokens)
            .field("config_hash", &self.config_hash)
            .finish()
    }
}
