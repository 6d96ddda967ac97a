use std::fmt;
use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use futures::channel::oneshot;
use futures::future::pending;
use futures::future::select_all;
use futures::future::BoxFuture;
use futures::future::FutureExt;
use futures::future::Shared;
use tracing::debug;

use fluvio_future::timer::sleep;
use k8_kv_store::KvError;
use k8_types::Spec;

use crate::strategy::FieldError;
use crate::RegistryError;

/// cancels the request it was created with
#[derive(Debug)]
pub struct CancelHandle {
    sender: oneshot::Sender<()>,
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(self) {
        self.flag.store(true, Ordering::SeqCst);
        let _ = self.sender.send(());
    }
}

#[derive(Clone)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
    receiver: Shared<oneshot::Receiver<()>>,
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CancelSignal({})", self.is_cancelled())
    }
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// resolves once cancelled. never resolves if handle was dropped
    pub fn cancelled(&self) -> BoxFuture<'static, ()> {
        let receiver = self.receiver.clone();
        async move {
            if receiver.await.is_err() {
                pending::<()>().await
            }
        }
        .boxed()
    }
}

/// per request data: namespace, deadline and cancellation
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    namespace: Option<String>,
    deadline: Option<Instant>,
    cancel: Option<CancelSignal>,
}

enum Outcome<T> {
    Done(Result<T, KvError>),
    Expired,
    Cancelled,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace<N: Into<String>>(mut self, namespace: N) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self) -> (Self, CancelHandle) {
        let (sender, receiver) = oneshot::channel();
        let flag = Arc::new(AtomicBool::new(false));
        self.cancel = Some(CancelSignal {
            flag: flag.clone(),
            receiver: receiver.shared(),
        });
        (self, CancelHandle { sender, flag })
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|signal| signal.is_cancelled())
            .unwrap_or(false)
    }

    pub fn cancel_signal(&self) -> Option<&CancelSignal> {
        self.cancel.as_ref()
    }

    /// namespace for an object payload.
    /// request namespace fills an empty one, a different one is rejected
    pub fn resolve_namespace<S: Spec>(&self, object_namespace: &str) -> Result<String, RegistryError> {
        if !S::NAME_SPACED {
            return Ok(String::new());
        }
        match (self.namespace(), object_namespace.is_empty()) {
            (Some(ns), true) => Ok(ns.to_owned()),
            (Some(ns), false) if ns != object_namespace => Err(RegistryError::invalid(
                S::label(),
                vec![FieldError::invalid(
                    "metadata.namespace",
                    object_namespace,
                    format!("does not match the namespace of the request: {}", ns),
                )],
            )),
            (_, false) => Ok(object_namespace.to_owned()),
            (None, true) => Err(RegistryError::invalid(
                S::label(),
                vec![FieldError::required(
                    "metadata.namespace",
                    "namespace is required",
                )],
            )),
        }
    }

    /// namespace for requests addressed by name only
    pub fn require_namespace<S: Spec>(&self) -> Result<String, RegistryError> {
        self.resolve_namespace::<S>("")
    }

    /// run single store call bounded by deadline and cancellation.
    /// if caller didn't set a deadline, default timeout applies
    pub(crate) async fn run<T, F>(
        &self,
        default_timeout: Duration,
        key: &str,
        op: F,
    ) -> Result<T, RegistryError>
    where
        F: Future<Output = Result<T, KvError>> + Send,
        T: Send,
    {
        if self.is_cancelled() {
            return Err(RegistryError::Cancelled {
                key: key.to_owned(),
            });
        }

        let deadline = self
            .deadline
            .unwrap_or_else(|| Instant::now() + default_timeout);
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(RegistryError::Timeout {
                key: key.to_owned(),
            });
        }

        let cancelled = match &self.cancel {
            Some(signal) => signal.cancelled(),
            None => pending::<()>().boxed(),
        };

        let racers: Vec<BoxFuture<'_, Outcome<T>>> = vec![
            op.map(Outcome::Done).boxed(),
            sleep(remaining).map(|_| Outcome::Expired).boxed(),
            cancelled.map(|_| Outcome::Cancelled).boxed(),
        ];

        let (outcome, _, _) = select_all(racers).await;
        match outcome {
            Outcome::Done(result) => result.map_err(|err| RegistryError::from_kv(key, err)),
            Outcome::Expired => {
                debug!(key, ?remaining, "store call timed out");
                Err(RegistryError::Timeout {
                    key: key.to_owned(),
                })
            }
            Outcome::Cancelled => {
                debug!(key, "store call cancelled");
                Err(RegistryError::Cancelled {
                    key: key.to_owned(),
                })
            }
        }
    }
}
