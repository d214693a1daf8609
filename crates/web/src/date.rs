//! HTTP date header value management service.
//!
//! The formatted date only changes once per second, so a background task refreshes a
//! shared value instead of formatting the clock for every response.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use bytes::Bytes;
use http::HeaderValue;
use tokio::task::JoinHandle;

const UPDATE_INTERVAL: Duration = Duration::from_millis(800);

/// Maintains the current `Date` header value.
///
/// Dropping the service stops its refresh task.
#[derive(Debug)]
pub struct DateService {
    current: Arc<ArcSwap<Bytes>>,
    handle: JoinHandle<()>,
}

impl DateService {
    /// Starts the refresh task; must be called from within a tokio runtime.
    pub fn start() -> Self {
        Self::with_update_interval(UPDATE_INTERVAL)
    }

    fn with_update_interval(update_interval: Duration) -> Self {
        let current = Arc::new(ArcSwap::from_pointee(format_now()));
        let current_arc = Arc::clone(&current);

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(update_interval).await;
                current_arc.store(Arc::new(format_now()));
            }
        });

        Self { current, handle }
    }

    /// The current date as a header value, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
    pub fn http_date(&self) -> Option<HeaderValue> {
        let date = Bytes::clone(&self.current.load());
        HeaderValue::from_maybe_shared(date).ok()
    }
}

impl Drop for DateService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn format_now() -> Bytes {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);
    Bytes::from_owner(buf)
}
