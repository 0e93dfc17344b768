use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::ExecutionError;

/// A value that is either available now, or requires awaiting a pending computation.
///
/// Sources return this from field resolution so that record loads can be queued while a whole
/// level of the selection tree is resolved, and only awaited afterwards.
pub enum PossiblyDeferred<'a, T> {
    Immediate(Result<T, ExecutionError>),
    Deferred(BoxFuture<'a, Result<T, ExecutionError>>),
}

impl<'a, T> PossiblyDeferred<'a, T>
where
    T: Send + 'a,
{
    pub fn immediate(value: T) -> Self {
        PossiblyDeferred::Immediate(Ok(value))
    }

    pub fn error(error: ExecutionError) -> Self {
        PossiblyDeferred::Immediate(Err(error))
    }

    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, ExecutionError>> + Send + 'a,
    {
        PossiblyDeferred::Deferred(future.boxed())
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self, PossiblyDeferred::Immediate(_))
    }

    pub fn map<U, F>(self, f: F) -> PossiblyDeferred<'a, U>
    where
        U: Send + 'a,
        F: FnOnce(T) -> U + Send + 'a,
    {
        match self {
            PossiblyDeferred::Immediate(result) => PossiblyDeferred::Immediate(result.map(f)),
            PossiblyDeferred::Deferred(future) => {
                PossiblyDeferred::deferred(async move { future.await.map(f) })
            }
        }
    }

    /// Awaits the value.
    pub async fn get(self) -> Result<T, ExecutionError> {
        match self {
            PossiblyDeferred::Immediate(result) => result,
            PossiblyDeferred::Deferred(future) => future.await,
        }
    }
}

/// Evaluates every value in order, stopping at the first error.
///
/// Leading immediate values are unwrapped right away, a list of immediate values stays
/// immediate.
pub fn lazily_evaluate_all<'a, T>(
    values: Vec<PossiblyDeferred<'a, T>>,
) -> PossiblyDeferred<'a, Vec<T>>
where
    T: Send + 'a,
{
    let mut results = Vec::with_capacity(values.len());
    let mut values = values.into_iter();
    while let Some(value) = values.next() {
        match value {
            PossiblyDeferred::Immediate(Ok(value)) => results.push(value),
            PossiblyDeferred::Immediate(Err(error)) => return PossiblyDeferred::error(error),
            PossiblyDeferred::Deferred(future) => {
                return PossiblyDeferred::deferred(async move {
                    results.push(future.await?);
                    for value in values {
                        results.push(value.get().await?);
                    }
                    Ok(results)
                });
            }
        }
    }
    PossiblyDeferred::immediate(results)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::error::DecodingError;
    use crate::json_ext::Path;

    #[tokio::test]
    async fn deferred_values_are_evaluated_lazily() {
        let evaluated = AtomicBool::new(false);
        let value = PossiblyDeferred::deferred(async {
            evaluated.store(true, Ordering::SeqCst);
            Ok(20)
        })
        .map(|value| (value + 1) * 2);

        assert!(!evaluated.load(Ordering::SeqCst));
        assert_eq!(value.get().await, Ok(42));
        assert!(evaluated.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn evaluate_all_stops_at_the_first_error() {
        let error = ExecutionError::decoding(&Path::empty(), DecodingError::MissingValue);
        let values = vec![
            PossiblyDeferred::immediate(1),
            PossiblyDeferred::deferred(async { Ok(2) }),
            PossiblyDeferred::error(error.clone()),
        ];
        assert_eq!(lazily_evaluate_all(values).get().await, Err(error));

        let values = vec![PossiblyDeferred::immediate(1), PossiblyDeferred::immediate(2)];
        let all = lazily_evaluate_all(values);
        assert!(all.is_immediate());
        assert_eq!(all.get().await, Ok(vec![1, 2]));
    }
}
