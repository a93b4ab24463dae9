use crate::core::Row;
use std::sync::{Arc, Mutex};

/// Receives query rows one at a time instead of a materialized list.
/// Queries run with a handler never touch either cache tier.
pub trait ResultHandler: Send {
    fn handle_result(&mut self, context: &mut ResultContext<'_>);
}

impl<F> ResultHandler for F
where
    F: FnMut(&mut ResultContext<'_>) + Send,
{
    fn handle_result(&mut self, context: &mut ResultContext<'_>) {
        self(context)
    }
}

/// Handler shared between the caller and the execution pipeline.
pub type SharedResultHandler = Arc<Mutex<dyn ResultHandler>>;

/// One row presented to a [`ResultHandler`].
#[derive(Debug)]
pub struct ResultContext<'a> {
    columns: &'a [String],
    row: &'a Row,
    count: usize,
    stopped: bool,
}

impl<'a> ResultContext<'a> {
    pub fn new(columns: &'a [String], row: &'a Row, count: usize) -> Self {
        Self {
            columns,
            row,
            count,
            stopped: false,
        }
    }

    pub fn columns(&self) -> &[String] {
        self.columns
    }

    pub fn row(&self) -> &Row {
        self.row
    }

    /// 1-based number of rows handed out so far.
    pub fn result_count(&self) -> usize {
        self.count
    }

    /// Ask for no more rows.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}
