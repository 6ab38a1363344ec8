use futures::Stream;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::marker::PhantomData;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::{from_record, Collection, Record, StoreError};
use crate::feed::ChangeEvent;

/// Live query handle. Each emission replaces the previous working set.
///
/// Dropping the handle (or calling [`Subscription::unsubscribe`]) stops emissions
/// immediately; writes issued elsewhere are unaffected.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Vec<Record>>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Runs `fetch` once up front and again after every change to `collection`,
    /// emitting only snapshots that differ from the last one sent.
    ///
    /// `changes` must be obtained before calling this so no write between the
    /// caller's setup and the first fetch is missed.
    pub(crate) fn spawn<F, Fut>(
        collection: Collection,
        mut changes: broadcast::Receiver<ChangeEvent>,
        fetch: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<Record>, StoreError>> + Send + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            let mut last: Option<Vec<Record>> = None;
            let mut refresh = true;

            loop {
                if refresh {
                    match fetch().await {
                        Ok(snapshot) => {
                            if last.as_ref() != Some(&snapshot) {
                                if sender.send(snapshot.clone()).is_err() {
                                    break;
                                }
                                last = Some(snapshot);
                            }
                        }
                        Err(e) => error!("Failed to refresh {} subscription: {}", collection, e),
                    }
                }

                refresh = match changes.recv().await {
                    Ok(event) => event.collection == collection,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            "{} subscription lagged by {} change events, refreshing",
                            collection, skipped
                        );
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
            }

            debug!("{} subscription finished", collection);
        });

        Self { receiver, task }
    }

    /// Waits for the next snapshot. `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<Vec<Record>> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.receiver.close();
        self.task.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A [`Subscription`] decoding each record into `T`.
///
/// Records that fail to decode are logged and left out of the snapshot.
#[derive(Debug)]
pub struct TypedSubscription<T> {
    inner: Subscription,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> TypedSubscription<T> {
    pub fn new(inner: Subscription) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    pub async fn next(&mut self) -> Option<Vec<T>> {
        let records = self.inner.next().await?;
        Some(
            records
                .into_iter()
                .filter_map(|record| match from_record::<T>(record) {
                    Ok(item) => Some(item),
                    Err(e) => {
                        warn!("Skipping undecodable document in snapshot: {}", e);
                        None
                    }
                })
                .collect(),
        )
    }

    pub fn unsubscribe(self) {
        self.inner.unsubscribe();
    }

    pub fn into_stream(self) -> impl Stream<Item = Vec<T>> {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .next()
                .await
                .map(|snapshot| (snapshot, subscription))
        })
    }
}
