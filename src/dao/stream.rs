use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use tracing::{debug, trace};

use crate::context::QueryContext;
use crate::error::{DaoError, ScanError};
use crate::executor::{Executor, RowCursor};
use crate::typed::{Column, Row, scan_column, scan_row};
use crate::types::RowValues;

type Decode<T> = fn(Vec<RowValues>) -> Result<T, ScanError>;

/// Lazy, single-pass sequence of decoded rows.
///
/// Nothing is executed until the first poll, which opens the cursor. Each further poll pulls
/// exactly one row. The stream ends after the last row, or right after yielding the first
/// error. Dropping it early releases the cursor and its connection.
pub struct RowStream<'a, T> {
    inner: BoxStream<'a, Result<T, DaoError>>,
}

impl<T> RowStream<'_, T> {
    /// Drain the stream into a `Vec`, stopping at the first error.
    ///
    /// # Errors
    /// Returns the first [`DaoError`] the stream yields.
    pub async fn try_collect_vec(self) -> Result<Vec<T>, DaoError> {
        self.try_collect().await
    }
}

impl<T> Stream for RowStream<'_, T> {
    type Item = Result<T, DaoError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl<T> std::fmt::Debug for RowStream<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream").finish_non_exhaustive()
    }
}

/// Stream every row of `query` as `T`.
#[must_use = "streams do nothing unless polled"]
pub fn find_rows<'a, T: Row>(
    db: &'a dyn Executor,
    ctx: &QueryContext,
    query: &str,
    args: &[RowValues],
) -> RowStream<'a, T> {
    lazy_stream("dao::find_rows", db, ctx, query, args, scan_row::<T>)
}

/// Stream the single selected column of every row of `query` as `S`.
#[must_use = "streams do nothing unless polled"]
pub fn find_columns<'a, S: Column>(
    db: &'a dyn Executor,
    ctx: &QueryContext,
    query: &str,
    args: &[RowValues],
) -> RowStream<'a, S> {
    lazy_stream("dao::find_columns", db, ctx, query, args, scan_column::<S>)
}

enum State<'a> {
    Pending {
        db: &'a dyn Executor,
        ctx: QueryContext,
        args: Vec<RowValues>,
    },
    Open(Box<dyn RowCursor>),
    Done,
}

fn lazy_stream<'a, T: Send + 'static>(
    op: &'static str,
    db: &'a dyn Executor,
    ctx: &QueryContext,
    query: &str,
    args: &[RowValues],
    decode: Decode<T>,
) -> RowStream<'a, T> {
    let query: Arc<str> = Arc::from(query);
    let state = State::Pending {
        db,
        ctx: ctx.clone(),
        args: args.to_vec(),
    };
    let inner = stream::unfold(state, move |state| {
        let query = Arc::clone(&query);
        async move { step(op, &query, state, decode).await }
    })
    .fuse()
    .boxed();
    RowStream { inner }
}

async fn step<'a, T>(
    op: &'static str,
    query: &str,
    state: State<'a>,
    decode: Decode<T>,
) -> Option<(Result<T, DaoError>, State<'a>)> {
    let mut cursor = match state {
        State::Done => return None,
        State::Open(cursor) => cursor,
        State::Pending { db, ctx, args } => {
            debug!(query, args = args.len(), "{}", op);
            match db.query(&ctx, query, &args).await {
                Ok(cursor) => cursor,
                Err(err) => return Some((Err(DaoError::execution(op, query, err)), State::Done)),
            }
        }
    };

    match cursor.next_row().await {
        Ok(Some(values)) => match decode(values) {
            Ok(item) => Some((Ok(item), State::Open(cursor))),
            Err(err) => {
                cursor.close();
                Some((Err(DaoError::scan(op, query, err)), State::Done))
            }
        },
        Ok(None) => {
            trace!(query, "{} exhausted", op);
            cursor.close();
            None
        }
        Err(err) => {
            cursor.close();
            Some((Err(DaoError::cursor_fault(op, query, err)), State::Done))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::DbError;
    use crate::executor::ExecOutcome;

    /// Scripted substrate: every `query` replays the same steps and counts opens/closes.
    struct Scripted {
        steps: Mutex<Vec<Step>>,
        open_error: bool,
        opened: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    #[derive(Clone)]
    enum Step {
        Row(Vec<RowValues>),
        Fault,
    }

    struct ScriptedCursor {
        steps: VecDeque<Step>,
        closed: Arc<AtomicUsize>,
        released: bool,
    }

    impl Scripted {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps),
                open_error: false,
                opened: Arc::new(AtomicUsize::new(0)),
                closed: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl RowCursor for ScriptedCursor {
        async fn next_row(&mut self) -> Result<Option<Vec<RowValues>>, DbError> {
            match self.steps.pop_front() {
                Some(Step::Row(values)) => Ok(Some(values)),
                Some(Step::Fault) => Err(DbError::ConnectionError("lost".into())),
                None => Ok(None),
            }
        }

        fn close(&mut self) {
            if !self.released {
                self.released = true;
                self.closed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    impl Drop for ScriptedCursor {
        fn drop(&mut self) {
            self.close();
        }
    }

    #[async_trait]
    impl Executor for Scripted {
        async fn execute(
            &self,
            _ctx: &QueryContext,
            _query: &str,
            _params: &[RowValues],
        ) -> Result<ExecOutcome, DbError> {
            Ok(ExecOutcome::default())
        }

        async fn query(
            &self,
            _ctx: &QueryContext,
            _query: &str,
            _params: &[RowValues],
        ) -> Result<Box<dyn RowCursor>, DbError> {
            if self.open_error {
                return Err(DbError::ConnectionError("refused".into()));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            let steps = self.steps.lock().expect("steps").clone();
            Ok(Box::new(ScriptedCursor {
                steps: steps.into(),
                closed: Arc::clone(&self.closed),
                released: false,
            }))
        }
    }

    fn ints(values: &[i64]) -> Vec<Step> {
        values
            .iter()
            .map(|v| Step::Row(vec![RowValues::Int(*v)]))
            .collect()
    }

    #[tokio::test]
    async fn nothing_runs_until_first_poll() {
        let db = Scripted::new(ints(&[1, 2]));
        let ctx = QueryContext::background();
        let mut stream = find_columns::<i64>(&db, &ctx, "q", &[]);
        assert_eq!(db.opened.load(Ordering::SeqCst), 0);
        assert_eq!(stream.next().await.map(Result::ok), Some(Some(1)));
        assert_eq!(db.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn yields_rows_in_order_then_releases() {
        let db = Scripted::new(ints(&[3, 1, 2]));
        let ctx = QueryContext::background();
        let got = find_columns::<i64>(&db, &ctx, "q", &[])
            .try_collect_vec()
            .await
            .expect("collect");
        assert_eq!(got, vec![3, 1, 2]);
        assert_eq!(db.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_result_is_an_empty_stream() {
        let db = Scripted::new(Vec::new());
        let ctx = QueryContext::background();
        let mut stream = find_columns::<i64>(&db, &ctx, "q", &[]);
        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
        assert_eq!(db.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn open_failure_yields_exactly_one_error() {
        let mut db = Scripted::new(ints(&[1]));
        db.open_error = true;
        let ctx = QueryContext::background();
        let items: Vec<_> = find_columns::<i64>(&db, &ctx, "SELECT broken", &[])
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        match &items[0] {
            Err(DaoError::Execution { op, query, .. }) => {
                assert_eq!(*op, "dao::find_columns");
                assert_eq!(query, "SELECT broken");
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[tokio::test]
    async fn scan_failure_stops_iteration() {
        let db = Scripted::new(vec![
            Step::Row(vec![RowValues::Int(1)]),
            Step::Row(vec![RowValues::Text("x".into())]),
            Step::Row(vec![RowValues::Int(3)]),
        ]);
        let ctx = QueryContext::background();
        let items: Vec<_> = find_columns::<i64>(&db, &ctx, "q", &[]).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Ok(1)));
        assert!(matches!(items[1], Err(DaoError::Scan { .. })));
        assert_eq!(db.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn trailing_fault_follows_good_rows() {
        let mut steps = ints(&[1, 2]);
        steps.push(Step::Fault);
        let db = Scripted::new(steps);
        let ctx = QueryContext::background();
        let items: Vec<_> = find_columns::<i64>(&db, &ctx, "q", &[]).collect().await;
        assert_eq!(items.len(), 3);
        assert!(matches!(items[0], Ok(1)));
        assert!(matches!(items[1], Ok(2)));
        assert!(matches!(items[2], Err(DaoError::CursorFault { .. })));
    }

    #[tokio::test]
    async fn early_drop_closes_cursor() {
        let db = Scripted::new(ints(&[1, 2, 3]));
        let ctx = QueryContext::background();
        let mut stream = find_columns::<i64>(&db, &ctx, "q", &[]);
        assert!(matches!(stream.next().await, Some(Ok(1))));
        assert_eq!(db.closed.load(Ordering::SeqCst), 0);
        drop(stream);
        assert_eq!(db.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn each_call_is_a_fresh_execution() {
        let db = Scripted::new(ints(&[1]));
        let ctx = QueryContext::background();
        for _ in 0..2 {
            let got = find_columns::<i64>(&db, &ctx, "q", &[])
                .try_collect_vec()
                .await
                .expect("collect");
            assert_eq!(got, vec![1]);
        }
        assert_eq!(db.opened.load(Ordering::SeqCst), 2);
    }
}
