//! Server-side timestamp source shared by store backends.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, SubsecRound as _, Utc};

/// Hands out strictly increasing UTC timestamps at microsecond precision, so
/// `updated_at` always advances and values survive a text round trip intact.
#[derive(Debug, Default)]
pub struct ServerClock {
  last: Mutex<Option<DateTime<Utc>>>,
}

impl ServerClock {
  pub fn now(&self) -> DateTime<Utc> {
    let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
    let mut now = Utc::now().trunc_subsecs(6);
    if let Some(prev) = *last
      && now <= prev
    {
      now = prev + Duration::microseconds(1);
    }
    *last = Some(now);
    now
  }
}
