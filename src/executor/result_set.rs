use super::result_handler::{ResultContext, SharedResultHandler};
use crate::core::Result;
use crate::mapping::RowBounds;
use crate::result::QueryResult;

/// Turns the driver's rows into the statement's result.
pub trait ResultSetHandler: Send {
    fn handle_result_set(&mut self, result: QueryResult) -> Result<QueryResult>;
}

impl<H: ResultSetHandler + ?Sized> ResultSetHandler for Box<H> {
    fn handle_result_set(&mut self, result: QueryResult) -> Result<QueryResult> {
        (**self).handle_result_set(result)
    }
}

/// Applies the row window and, when present, streams rows to a
/// [`ResultHandler`](super::ResultHandler).
pub struct DefaultResultSetHandler {
    bounds: RowBounds,
    handler: Option<SharedResultHandler>,
}

impl DefaultResultSetHandler {
    pub fn new(bounds: RowBounds, handler: Option<SharedResultHandler>) -> Self {
        Self { bounds, handler }
    }
}

impl ResultSetHandler for DefaultResultSetHandler {
    fn handle_result_set(&mut self, result: QueryResult) -> Result<QueryResult> {
        let windowed = result.window(self.bounds.offset, self.bounds.limit);

        let Some(handler) = &self.handler else {
            return Ok(windowed);
        };

        let mut handler = handler.lock()?;
        for (i, row) in windowed.rows.iter().enumerate() {
            let mut context = ResultContext::new(&windowed.columns, row, i + 1);
            handler.handle_result(&mut context);
            if context.is_stopped() {
                break;
            }
        }
        Ok(QueryResult::new(windowed.columns, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use std::sync::{Arc, Mutex};

    fn numbers(n: i64) -> QueryResult {
        QueryResult::new(vec!["n".into()], (1..=n).map(|i| vec![Value::Integer(i)]).collect())
    }

    #[test]
    fn test_row_bounds() {
        let mut handler = DefaultResultSetHandler::new(RowBounds::new(2, 2), None);
        let result = handler.handle_result_set(numbers(5)).unwrap();
        assert_eq!(result.rows, vec![vec![Value::Integer(3)], vec![Value::Integer(4)]]);
    }

    #[test]
    fn test_result_handler_can_stop() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback = move |ctx: &mut ResultContext<'_>| {
            sink.lock().unwrap().push(ctx.row()[0].clone());
            if ctx.result_count() == 2 {
                ctx.stop();
            }
        };
        let shared: SharedResultHandler = Arc::new(Mutex::new(callback));
        let mut handler = DefaultResultSetHandler::new(RowBounds::DEFAULT, Some(shared));

        let result = handler.handle_result_set(numbers(5)).unwrap();
        assert!(result.is_empty());
        assert_eq!(*seen.lock().unwrap(), vec![Value::Integer(1), Value::Integer(2)]);
    }
}
