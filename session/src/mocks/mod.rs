//! Mock providers for tests.
//!
//! Every mock is cheap to clone and clones share their recordings, so a
//! test can hand one clone to the session and assert on another.

mod fetcher;
mod storage;
mod widget;

pub use fetcher::{MockScriptLoader, MockTokenFetcher};
pub use storage::{FailingStorage, RecordingStorage, StorageOp};
pub use widget::{MockWidgetFactory, MockWidgetLibrary, WidgetEvent};

use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
