// Bounded task runner

use std::future::Future;
use tokio::task::{JoinError, JoinSet};

/// Run `ops` with at most `limit` of them in flight at once.
///
/// Results come back in input order. Once a failure has been observed no
/// further operations are started; operations already running are allowed
/// to finish, then the failure with the lowest input index is returned.
/// The limit applies to this call only: nested calls each get their own.
pub async fn parallel<I, F, T, E>(ops: I, limit: usize) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<JoinError> + Send + 'static,
{
    let limit = limit.max(1);
    let mut tasks = JoinSet::new();
    let mut batch = Batch::new();

    for (index, op) in ops.into_iter().enumerate() {
        while tasks.len() >= limit {
            match tasks.join_next().await {
                Some(joined) => batch.settle(joined),
                None => break,
            }
            // Pick up anything else that finished meanwhile
            while let Some(joined) = tasks.try_join_next() {
                batch.settle(joined);
            }
        }

        if batch.failed() {
            log::debug!("batch failed, not starting operation #{}", index);
            break;
        }

        batch.admit();
        tasks.spawn(async move { (index, op.await) });
    }

    while let Some(joined) = tasks.join_next().await {
        batch.settle(joined);
    }

    batch.finish()
}

/// Bookkeeping for one `parallel` call
struct Batch<T, E> {
    results: Vec<Option<T>>,
    error: Option<(usize, E)>,
}

impl<T, E: From<JoinError>> Batch<T, E> {
    fn new() -> Self {
        Self {
            results: Vec::new(),
            error: None,
        }
    }

    fn admit(&mut self) {
        self.results.push(None);
    }

    fn failed(&self) -> bool {
        self.error.is_some()
    }

    fn settle(&mut self, joined: Result<(usize, Result<T, E>), JoinError>) {
        match joined {
            Ok((index, Ok(value))) => {
                if let Some(slot) = self.results.get_mut(index) {
                    *slot = Some(value);
                }
            }
            Ok((index, Err(err))) => self.fail(index, err),
            // A panicked task has lost its index; rank it after every real failure
            Err(join_err) => self.fail(usize::MAX, E::from(join_err)),
        }
    }

    fn fail(&mut self, index: usize, err: E) {
        let earlier = match &self.error {
            Some((first, _)) => index < *first,
            None => true,
        };

        if earlier {
            self.error = Some((index, err));
        }
    }

    fn finish(self) -> Result<Vec<T>, E> {
        if let Some((_, err)) = self.error {
            return Err(err);
        }

        Ok(self.results.into_iter().flatten().collect())
    }
}
