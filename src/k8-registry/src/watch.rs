use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::time::Instant;

use futures::future::select;
use futures::future::BoxFuture;
use futures::future::Either;
use futures::future::FutureExt;
use futures::stream::Stream;
use futures::stream::StreamExt;
use tracing::debug;
use tracing::trace;

use fluvio_future::timer::sleep;
use k8_kv_store::RawEvent;
use k8_kv_store::RawEventStream;
use k8_kv_store::RawOp;
use k8_kv_store::Revision;
use k8_types::K8Obj;
use k8_types::K8Watch;
use k8_types::Spec;

use crate::codec::Codec;
use crate::context::RequestContext;
use crate::selector::SelectionPredicate;
use crate::RegistryError;

pub type WatchItem<S> = Result<K8Watch<S>, RegistryError>;

/// typed, filtered change feed.
///
/// raw mutations are decoded and run through the predicate using both the
/// old and new object, so an object moving in or out of the selection shows
/// up as ADDED or DELETED. a cancelled or expired request yields one final
/// `Cancelled` or `Timeout` error before the stream ends. `stop` ends it
/// quietly. either way the store subscription is released
pub struct WatchStream<S: Spec> {
    raw: Option<RawEventStream>,
    until: Option<BoxFuture<'static, RegistryError>>,
    codec: Arc<dyn Codec<S>>,
    predicate: SelectionPredicate,
}

impl<S: Spec> WatchStream<S> {
    pub(crate) fn new(
        raw: RawEventStream,
        codec: Arc<dyn Codec<S>>,
        predicate: SelectionPredicate,
        ctx: &RequestContext,
        prefix: &str,
    ) -> Self {
        let cancelled = ctx.cancel_signal().map(|signal| {
            let key = prefix.to_owned();
            signal
                .cancelled()
                .map(move |_| RegistryError::Cancelled { key })
                .boxed()
        });
        let expired = ctx.deadline().map(|deadline| {
            let key = prefix.to_owned();
            sleep(deadline.saturating_duration_since(Instant::now()))
                .map(move |_| RegistryError::Timeout { key })
                .boxed()
        });
        let until = match (cancelled, expired) {
            (Some(cancelled), Some(expired)) => Some(
                select(cancelled, expired)
                    .map(|either| match either {
                        Either::Left((err, _)) | Either::Right((err, _)) => err,
                    })
                    .boxed(),
            ),
            (Some(until), None) | (None, Some(until)) => Some(until),
            (None, None) => None,
        };

        Self {
            raw: Some(raw),
            until,
            codec,
            predicate,
        }
    }

    /// stop forwarding events and release store subscription
    pub fn stop(&mut self) {
        if self.raw.take().is_some() {
            debug!("{} watch stopped", S::label());
        }
        self.until = None;
    }

    pub fn is_stopped(&self) -> bool {
        self.raw.is_none()
    }

    fn decode(
        &self,
        key: &str,
        bytes: &[u8],
        revision: Revision,
    ) -> Result<K8Obj<S>, RegistryError> {
        let mut obj = self
            .codec
            .decode(bytes)
            .map_err(|source| RegistryError::Corrupt {
                key: key.to_owned(),
                source,
            })?;
        obj.metadata.resource_version = revision.to_string();
        Ok(obj)
    }

    /// typed event for raw mutation, none if selection is not affected.
    /// an undecodable previous value counts as not selected
    fn translate(&self, event: RawEvent) -> Result<Option<K8Watch<S>>, RegistryError> {
        let previous = match &event.prev_value {
            Some(bytes) => match self.decode(&event.key, bytes, event.revision) {
                Ok(obj) => Some(obj),
                Err(err) => {
                    debug!(key = %event.key, %err, "previous value not decodable");
                    None
                }
            },
            None => None,
        };
        let previous = previous.filter(|obj| self.predicate.matches(obj));

        match (event.op, &event.value) {
            (RawOp::Put, Some(bytes)) => {
                let current = self.decode(&event.key, bytes, event.revision)?;
                let selected = self.predicate.matches(&current);
                Ok(match (previous, selected) {
                    (Some(_), true) => Some(K8Watch::MODIFIED(current)),
                    (None, true) => Some(K8Watch::ADDED(current)),
                    (Some(previous), false) => Some(K8Watch::DELETED(previous)),
                    (None, false) => None,
                })
            }
            (RawOp::Put, None) => Ok(None),
            (RawOp::Delete, _) => Ok(previous.map(K8Watch::DELETED)),
        }
    }
}

impl<S: Spec> Stream for WatchStream<S> {
    type Item = WatchItem<S>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(until) = this.until.as_mut() {
                if let Poll::Ready(err) = until.poll_unpin(cx) {
                    debug!(%err, "{} watch ended", S::label());
                    this.stop();
                    return Poll::Ready(Some(Err(err)));
                }
            }

            let raw = match this.raw.as_mut() {
                Some(raw) => raw,
                None => return Poll::Ready(None),
            };

            match raw.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => {
                    this.stop();
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(event)) => {
                    trace!(key = %event.key, revision = event.revision, op = ?event.op, "raw event");
                    match this.translate(event) {
                        Ok(Some(watch_event)) => return Poll::Ready(Some(Ok(watch_event))),
                        Ok(None) => continue,
                        Err(err) => return Poll::Ready(Some(Err(err))),
                    }
                }
            }
        }
    }
}
