use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rusqlite::InterruptHandle;
use tokio::sync::oneshot;
use tracing::{trace, warn};

use crate::context::QueryContext;
use crate::error::DbError;
use crate::executor::RowCursor;
use crate::types::RowValues;

use super::connection::SqlitePooledConnection;
use super::params::Params;
use super::query::next_values;

type RowResponse = Result<Option<Vec<RowValues>>, DbError>;

/// Interrupt handle shared with the cursor worker.
///
/// The worker disarms it before letting go of the connection, so an interrupt can only land
/// while the cursor still owns the connection and never on the pool's next borrower.
#[derive(Clone)]
struct Interrupter(Arc<Mutex<Option<InterruptHandle>>>);

impl Interrupter {
    fn new(handle: InterruptHandle) -> Self {
        Self(Arc::new(Mutex::new(Some(handle))))
    }

    fn interrupt(&self) {
        let guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = guard.as_ref() {
            handle.interrupt();
        }
    }

    fn disarm(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    #[cfg(test)]
    fn is_armed(&self) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

enum Command {
    Next {
        respond_to: oneshot::Sender<RowResponse>,
    },
    Shutdown,
}

/// Cursor over a `SQLite` result, stepped by a blocking worker that owns the pooled connection.
///
/// The worker only steps the statement when asked for a row, so at most one row is in flight.
/// Dropping or closing the cursor ends the worker, which drops the statement and returns the
/// connection to the pool.
pub struct SqliteCursor {
    sender: Option<Sender<Command>>,
    interrupt: Interrupter,
    ctx: QueryContext,
}

impl SqliteCursor {
    /// Prepare and start `query` on `conn`, handing the connection to a cursor worker.
    ///
    /// # Errors
    /// Returns [`DbError`] if the statement cannot be prepared or bound, or the context fires
    /// before the worker reports back.
    pub(crate) async fn open(
        ctx: QueryContext,
        conn: SqlitePooledConnection,
        query: String,
        params: Params,
    ) -> Result<Self, DbError> {
        ctx.check()?;
        let interrupt = Interrupter::new(conn.get_interrupt_handle());
        let (sender, receiver) = mpsc::channel::<Command>();
        let (opened_tx, opened_rx) = oneshot::channel();
        let worker_interrupt = interrupt.clone();
        tokio::task::spawn_blocking(move || {
            drive_cursor(&conn, &query, &params, opened_tx, &receiver);
            worker_interrupt.disarm();
            drop(conn);
        });

        let mut cursor = Self {
            sender: Some(sender),
            interrupt,
            ctx,
        };
        let opened = tokio::select! {
            biased;
            err = cursor.ctx.done() => {
                cursor.interrupt.interrupt();
                Err(err)
            }
            res = opened_rx => res.unwrap_or_else(|_| {
                Err(DbError::WorkerClosed("SQLite cursor worker dropped while opening".into()))
            }),
        };
        if let Err(err) = opened {
            cursor.close();
            return Err(err);
        }
        trace!("sqlite cursor opened");
        Ok(cursor)
    }
}

#[async_trait]
impl RowCursor for SqliteCursor {
    async fn next_row(&mut self) -> Result<Option<Vec<RowValues>>, DbError> {
        let Some(sender) = self.sender.as_ref() else {
            return Ok(None);
        };
        let (tx, rx) = oneshot::channel();
        if sender.send(Command::Next { respond_to: tx }).is_err() {
            self.close();
            return Err(DbError::WorkerClosed("SQLite cursor worker closed".into()));
        }
        let outcome = tokio::select! {
            biased;
            err = self.ctx.done() => {
                self.interrupt.interrupt();
                Err(err)
            }
            res = rx => res.unwrap_or_else(|_| {
                Err(DbError::WorkerClosed(
                    "SQLite cursor worker dropped while fetching row".into(),
                ))
            }),
        };
        if !matches!(outcome, Ok(Some(_))) {
            self.close();
        }
        outcome
    }

    fn close(&mut self) {
        if let Some(sender) = self.sender.take() {
            // The worker may already have exited after the last row.
            let _ = sender.send(Command::Shutdown);
            trace!("sqlite cursor closed");
        }
    }
}

impl Drop for SqliteCursor {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for SqliteCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteCursor")
            .field("open", &self.sender.is_some())
            .finish_non_exhaustive()
    }
}

/// Step the statement on request until it ends, fails, or the cursor goes away. The statement
/// and rows are dropped on return; the caller still holds the connection.
fn drive_cursor(
    conn: &rusqlite::Connection,
    query: &str,
    params: &Params,
    opened: oneshot::Sender<Result<(), DbError>>,
    receiver: &Receiver<Command>,
) {
    let mut stmt = match conn.prepare(query) {
        Ok(stmt) => stmt,
        Err(err) => {
            let _ = opened.send(Err(err.into()));
            return;
        }
    };
    let column_count = stmt.column_count();
    let mut rows = match stmt.query(&params.as_refs()[..]) {
        Ok(rows) => rows,
        Err(err) => {
            let _ = opened.send(Err(err.into()));
            return;
        }
    };
    if opened.send(Ok(())).is_err() {
        return;
    }

    while let Ok(command) = receiver.recv() {
        match command {
            Command::Next { respond_to } => {
                let outcome = next_values(&mut rows, column_count);
                let finished = !matches!(outcome, Ok(Some(_)));
                if respond_to.send(outcome).is_err() {
                    warn!("sqlite cursor consumer went away mid-fetch");
                    break;
                }
                if finished {
                    break;
                }
            }
            Command::Shutdown => break,
        }
    }
}
