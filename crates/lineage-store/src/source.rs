//! Read capability handed to pipeline stages
//!
//! A [`Source`] is an enumerable view: it lists the keys it can answer for
//! and reads them. Two implementations exist:
//!
//! - [`FixedSource`]: a fixed list of handles, optionally narrowed by tag
//!   or disabled entirely
//! - [`ReadThroughSource`](crate::read_through::ReadThroughSource):
//!   materializes external resources into the store on first read

use crate::error::{StoreError, StoreResult};
use crate::store::ArtifactHandle;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Enumerable read-only view
#[async_trait]
pub trait Source: Send + Sync {
    /// Keys this view can currently answer for, in view order
    async fn enumerate(&self) -> Vec<String>;

    /// Read a key, `None` if this view has nothing under it
    ///
    /// # Errors
    /// Implementation specific; the fixed view never fails
    async fn read(&self, key: &str) -> StoreResult<Option<ArtifactHandle>>;

    /// Read a key that must exist
    ///
    /// # Errors
    /// - `StoreError::NotFound` if the view has nothing under `key`
    async fn read_strict(&self, key: &str) -> StoreResult<ArtifactHandle> {
        self.read(key)
            .await?
            .ok_or_else(|| StoreError::not_found(key))
    }

    /// Every enumerable handle carrying `tag`, in view order
    ///
    /// # Errors
    /// Propagates the first failing read
    async fn read_by_tag(&self, tag: &str) -> StoreResult<Vec<ArtifactHandle>> {
        let mut out = Vec::new();
        for key in self.enumerate().await {
            if let Some(handle) = self.read(&key).await? {
                if handle.tag() == tag {
                    out.push(handle);
                }
            }
        }
        Ok(out)
    }
}

/// View over a fixed list of handles
///
/// Keys are the handles' rendered key texts.
#[derive(Debug, Clone, Default)]
pub struct FixedSource {
    handles: Vec<ArtifactHandle>,
    tags: Option<BTreeSet<String>>,
    disabled: bool,
}

impl FixedSource {
    /// Create view over handles
    #[inline]
    #[must_use]
    pub fn new(handles: Vec<ArtifactHandle>) -> Self {
        Self {
            handles,
            tags: None,
            disabled: false,
        }
    }

    /// View that enumerates nothing and reads nothing
    #[inline]
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    /// Narrow the view to handles whose tag is in `tags`
    #[must_use]
    pub fn filtered<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Check whether the view is disabled
    #[inline]
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn visible(&self) -> impl Iterator<Item = &ArtifactHandle> {
        self.handles
            .iter()
            .filter(move |_| !self.disabled)
            .filter(move |h| self.tags.as_ref().map_or(true, |tags| tags.contains(h.tag())))
    }
}

#[async_trait]
impl Source for FixedSource {
    async fn enumerate(&self) -> Vec<String> {
        self.visible().map(ArtifactHandle::key_text).collect()
    }

    async fn read(&self, key: &str) -> StoreResult<Option<ArtifactHandle>> {
        Ok(self.visible().find(|h| h.key_text() == key).cloned())
    }
}
