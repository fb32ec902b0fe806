//! Range discovery by existence probing.
//!
//! The highest pass probes downward from a ceiling, the lowest pass upward
//! from 1. Each pass runs probes through a `buffered(n)` stream: at most `n`
//! are in flight, results come back in dispatch order, so the first hit is the
//! extremal ID. Dropping the stream at that point discards the remaining
//! in-flight probes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::template::EndpointTemplate;
use super::transport::Transport;

/// Whether an item exists for an ID.
#[async_trait]
pub trait ExistenceProbe: Send + Sync {
    /// True when the ID resolves to an item.
    async fn exists(&self, id: u64) -> bool;
}

/// Probes an ID with a HEAD against each endpoint template in turn.
pub struct TemplateProbe {
    transport: Arc<dyn Transport>,
    templates: Vec<EndpointTemplate>,
}

impl TemplateProbe {
    /// Creates a probe over `templates`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, templates: Vec<EndpointTemplate>) -> Self {
        Self {
            transport,
            templates,
        }
    }
}

#[async_trait]
impl ExistenceProbe for TemplateProbe {
    async fn exists(&self, id: u64) -> bool {
        for template in &self.templates {
            if self.transport.exists(&template.url_for(id)).await {
                return true;
            }
        }
        false
    }
}

/// Lowest and highest existing IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeBounds {
    /// Smallest existing ID.
    pub lowest: u64,
    /// Largest existing ID.
    pub highest: u64,
}

/// Discovers [`RangeBounds`] with bounded concurrent probing.
pub struct RangeScanner {
    probe: Arc<dyn ExistenceProbe>,
    concurrency: usize,
    probes_sent: AtomicUsize,
}

impl RangeScanner {
    /// Creates a scanner running at most `concurrency` probes at once.
    #[must_use]
    pub fn new(probe: Arc<dyn ExistenceProbe>, concurrency: usize) -> Self {
        Self {
            probe,
            concurrency: concurrency.max(1),
            probes_sent: AtomicUsize::new(0),
        }
    }

    /// Probes issued so far.
    #[must_use]
    pub fn probes_sent(&self) -> usize {
        self.probes_sent.load(Ordering::SeqCst)
    }

    /// Finds the highest existing ID at or below `ceiling`, then the lowest
    /// existing ID at or above 1.
    ///
    /// Returns `None` when nothing in `1..=ceiling` exists.
    #[instrument(skip(self), fields(concurrency = self.concurrency))]
    pub async fn discover_bounds(&self, ceiling: u64) -> Option<RangeBounds> {
        if ceiling == 0 {
            return None;
        }

        let Some(highest) = self.first_existing((1..=ceiling).rev()).await else {
            info!(ceiling, "no items found");
            return None;
        };
        info!(highest, "found highest ID");

        // `highest` itself exists, so this pass always finds something.
        let lowest = self.first_existing(1..=highest).await.unwrap_or(highest);
        info!(lowest, highest, probes = self.probes_sent(), "range discovered");

        Some(RangeBounds { lowest, highest })
    }

    async fn first_existing(&self, ids: impl Iterator<Item = u64> + Send) -> Option<u64> {
        let mut results = stream::iter(ids)
            .map(|id| async move {
                self.probes_sent.fetch_add(1, Ordering::SeqCst);
                (id, self.probe.exists(id).await)
            })
            .buffered(self.concurrency);

        while let Some((id, found)) = results.next().await {
            if found {
                return Some(id);
            }
            debug!(id, "probe miss");
        }
        None
    }
}
