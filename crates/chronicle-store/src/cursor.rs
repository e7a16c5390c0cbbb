use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use chronicle_core::TextSerializer;

use crate::criteria::{translate, Criteria, Filter};
use crate::database::{ConnectionConfig, Session};
use crate::error::StoreError;
use crate::record::MessageRecord;

/// Rows fetched per round trip while streaming.
const FETCH_BATCH: u32 = 256;

enum CursorState {
    /// Constructed but never advanced. Holds no store resources.
    NotStarted,
    /// Session acquired on first advance; rows stream in rowid order.
    Open {
        session: Session,
        filter: Filter,
        buffer: VecDeque<MessageRecord>,
        last_rowid: i64,
        end_of_rows: bool,
    },
    /// No rows remain, or the cursor failed or was closed. Session released.
    Exhausted,
}

/// Lazy, forward-only cursor over decoded events.
///
/// Construction is cheap and touches nothing; the first [`next`](Iterator)
/// call translates the criteria, opens a scoped session, and starts
/// streaming. Rows arrive in store order, which callers must treat as
/// unspecified. The session is released exactly once, on whichever comes
/// first: exhaustion, a failed advance, [`close`](EventCursor::close), or
/// drop.
pub struct EventCursor<T, S: TextSerializer> {
    config: ConnectionConfig,
    serializer: Arc<S>,
    criteria: Criteria,
    state: CursorState,
    closed: bool,
    _decodes_to: PhantomData<fn() -> T>,
}

impl<T, S: TextSerializer> EventCursor<T, S> {
    pub(crate) fn new(config: ConnectionConfig, serializer: Arc<S>, criteria: Criteria) -> Self {
        Self {
            config,
            serializer,
            criteria,
            state: CursorState::NotStarted,
            closed: false,
            _decodes_to: PhantomData,
        }
    }

    /// Release the session and end enumeration. Idempotent: repeated calls,
    /// and calls after natural exhaustion, do nothing and never fail.
    /// Subsequent advances yield no items.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if matches!(self.state, CursorState::Open { .. }) {
            debug!("cursor closed before exhaustion");
        }
        self.state = CursorState::Exhausted;
    }

    /// Rewinding is not supported in any state.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        Err(StoreError::Unsupported("reset"))
    }

    fn open(&mut self) -> Result<(), StoreError> {
        let filter = translate(&self.criteria)?;
        let session = self.config.open()?;
        debug!(clauses = filter.clauses().len(), "cursor session opened");
        self.state = CursorState::Open {
            session,
            filter,
            buffer: VecDeque::new(),
            last_rowid: 0,
            end_of_rows: false,
        };
        Ok(())
    }
}

enum Step {
    Yield(MessageRecord),
    Finish,
    Fail(StoreError),
}

impl<T: DeserializeOwned, S: TextSerializer> Iterator for EventCursor<T, S> {
    type Item = Result<T, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }

        if matches!(self.state, CursorState::NotStarted) {
            if let Err(e) = self.open() {
                self.state = CursorState::Exhausted;
                return Some(Err(e));
            }
        }

        let step = match &mut self.state {
            CursorState::Open {
                session,
                filter,
                buffer,
                last_rowid,
                end_of_rows,
            } => {
                let mut fetch_error = None;
                if buffer.is_empty() && !*end_of_rows {
                    match session.select_batch(filter, *last_rowid, FETCH_BATCH) {
                        Ok(rows) => {
                            if rows.len() < FETCH_BATCH as usize {
                                *end_of_rows = true;
                            }
                            if let Some((rowid, _)) = rows.last() {
                                *last_rowid = *rowid;
                            }
                            buffer.extend(rows.into_iter().map(|(_, record)| record));
                        }
                        Err(e) => fetch_error = Some(e),
                    }
                }
                match fetch_error {
                    Some(e) => Step::Fail(e),
                    None => match buffer.pop_front() {
                        Some(record) => Step::Yield(record),
                        None => Step::Finish,
                    },
                }
            }
            CursorState::Exhausted => return None,
            CursorState::NotStarted => return None,
        };

        match step {
            Step::Yield(record) => match self.serializer.deserialize::<T>(&record.payload) {
                Ok(message) => Some(Ok(message)),
                Err(e) => {
                    self.state = CursorState::Exhausted;
                    Some(Err(StoreError::Decode {
                        type_path: std::any::type_name::<T>(),
                        detail: e.to_string(),
                    }))
                }
            },
            Step::Finish => {
                debug!("cursor exhausted, session released");
                self.state = CursorState::Exhausted;
                None
            }
            Step::Fail(e) => {
                self.state = CursorState::Exhausted;
                Some(Err(e))
            }
        }
    }
}

impl<T, S: TextSerializer> Drop for EventCursor<T, S> {
    fn drop(&mut self) {
        self.close();
    }
}
