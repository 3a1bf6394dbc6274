use std::{collections::HashMap, sync::Mutex};

use time::{Duration, OffsetDateTime};

const WINDOW_SECONDS: i64 = 60;

/// Fixed one-minute windows, counted independently per authenticated user and
/// per network origin. Exceeding either limit denies the request.
pub struct RateLimiter {
	per_user: u32,
	per_origin: u32,
	windows: Mutex<HashMap<String, Window>>,
}

#[derive(Clone, Copy)]
struct Window {
	started_at: OffsetDateTime,
	count: u32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decision {
	Allowed,
	Limited { retry_at: OffsetDateTime },
}

impl RateLimiter {
	pub fn new(per_user: u32, per_origin: u32) -> Self {
		Self { per_user, per_origin, windows: Mutex::new(HashMap::new()) }
	}

	pub fn check(&self, user_id: i64, origin: &str, now: OffsetDateTime) -> Decision {
		let mut windows = self.windows.lock().unwrap_or_else(|err| err.into_inner());
		let user_decision =
			bump(&mut windows, format!("user:{user_id}"), self.per_user, now);
		let origin_decision =
			bump(&mut windows, format!("origin:{origin}"), self.per_origin, now);

		// Report the earlier of the two retry times when both limits trip.
		match (user_decision, origin_decision) {
			(Decision::Allowed, Decision::Allowed) => Decision::Allowed,
			(Decision::Limited { retry_at }, Decision::Allowed) => Decision::Limited { retry_at },
			(Decision::Allowed, Decision::Limited { retry_at }) => Decision::Limited { retry_at },
			(Decision::Limited { retry_at: a }, Decision::Limited { retry_at: b }) =>
				Decision::Limited { retry_at: a.min(b) },
		}
	}
}

fn bump(
	windows: &mut HashMap<String, Window>,
	key: String,
	limit: u32,
	now: OffsetDateTime,
) -> Decision {
	let window = windows.entry(key).or_insert(Window { started_at: now, count: 0 });

	if now - window.started_at >= Duration::seconds(WINDOW_SECONDS) {
		window.started_at = now;
		window.count = 0;
	}

	if window.count >= limit {
		return Decision::Limited {
			retry_at: window.started_at + Duration::seconds(WINDOW_SECONDS),
		};
	}

	window.count += 1;

	Decision::Allowed
}
