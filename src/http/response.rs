use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::errors::RequestState;

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    /// Lower-cased header names, per spec §4.4 ("parse headers
    /// case-insensitively").
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct HttpError {
    pub state: RequestState,
    pub detail: String,
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "request failed in state {}: {}", self.state, self.detail)
    }
}

impl std::error::Error for HttpError {}

pub(crate) type Slot = Rc<RefCell<Option<Result<Response, HttpError>>>>;

/// A handle to a request's eventual outcome. Fulfilled when `run_loop`
/// drives the owning request to `DONE` or `ERROR` (spec §4.4).
pub struct ResponseFuture {
    pub(crate) slot: Slot,
}

impl ResponseFuture {
    pub fn is_ready(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Take the result out of the future. Panics if `run_loop` has not yet
    /// fulfilled it — callers always drive `run_loop` to completion before
    /// reading futures (spec §4.4: "`run_loop()` blocks... until every
    /// in-flight request is complete").
    pub fn take(self) -> Result<Response, HttpError> {
        self.slot
            .borrow_mut()
            .take()
            .expect("ResponseFuture polled before run_loop completed")
    }
}
