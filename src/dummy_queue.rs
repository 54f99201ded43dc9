use async_trait::async_trait;

use crate::{config::BaseConfig, context::Context, error::Result, queue::BaseQueue};

/// A backend that discards everything it is given.
///
/// Used when background processing is disabled, so producers can keep
/// pushing unconditionally.
#[derive(Clone, Debug, Default)]
pub struct DummyQueue {
    cfg: BaseConfig,
}

impl DummyQueue {
    /// `unique` is accepted for signature parity with other backends and ignored.
    pub fn new(cfg: BaseConfig, _unique: bool) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &BaseConfig {
        &self.cfg
    }
}

#[async_trait]
impl BaseQueue for DummyQueue {
    async fn push_item(&self, _ctx: &Context, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn pop_item(&self, _ctx: &Context) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn has_item(&self, _ctx: &Context, _data: &[u8]) -> Result<bool> {
        Ok(false)
    }

    async fn len(&self, _ctx: &Context) -> Result<usize> {
        Ok(0)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn remove_all(&self, _ctx: &Context) -> Result<()> {
        Ok(())
    }
}
