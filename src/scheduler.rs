// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::discord::state::with_form_sessions;
use crate::workflow::engine::WorkflowEngine;
use crate::workflow::platform::Messenger;
use crate::workflow::store::RequestStore;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tokio::time::MissedTickBehavior;
use type_map::concurrent::TypeMap;

/// Runs one round of periodic maintenance: expires stale voting requests and drops abandoned form sessions.
pub async fn run_maintenance<S: RequestStore, M: Messenger>(engine: &WorkflowEngine<S, M>, bot_state: &RwLock<TypeMap>) {
	let now = Utc::now();
	match engine.sweep_expired(now).await {
		Ok(0) => (),
		Ok(expired) => tracing::info!(expired, "Expired stale voting requests"),
		Err(error) => tracing::error!(source = ?error, "Failed to sweep expired requests"),
	}

	let reaped = with_form_sessions(bot_state, |sessions| sessions.reap(now)).await;
	if reaped > 0 {
		tracing::debug!(reaped, "Dropped abandoned form sessions");
	}
}

/// Runs maintenance every `period` until shutdown is signalled. The first round runs immediately.
pub async fn run_scheduler<S: RequestStore, M: Messenger>(
	engine: &WorkflowEngine<S, M>,
	bot_state: &RwLock<TypeMap>,
	period: Duration,
	mut shutdown: watch::Receiver<bool>,
) {
	let mut interval = tokio::time::interval(period);
	interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		tokio::select! {
			_ = interval.tick() => run_maintenance(engine, bot_state).await,
			changed = shutdown.changed() => {
				if changed.is_err() || *shutdown.borrow() {
					break;
				}
			}
		}
	}
	tracing::info!("Maintenance scheduler stopped");
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::workflow::forms::{FormSessions, SessionPolicy};
	use crate::workflow::kind::RequestKind;
	use crate::workflow::request::RequestStatus;
	use crate::workflow::testing::{Harness, suggestion_in_voting};
	use chrono::TimeDelta;
	use twilight_model::id::Id;

	fn state_with_stale_session() -> RwLock<TypeMap> {
		let mut sessions = FormSessions::new(SessionPolicy {
			ttl: Some(TimeDelta::minutes(30)),
			max_sessions: 10,
		});
		sessions.start(
			Id::new(5),
			RequestKind::ModeratorApplication,
			Id::new(1),
			Utc::now() - TimeDelta::hours(2),
		);
		let mut state = TypeMap::new();
		state.insert(sessions);
		RwLock::new(state)
	}

	#[tokio::test]
	async fn maintenance_expires_requests_and_sessions() {
		let harness = Harness::new(|settings| settings.expire_days = 7);
		let stale = suggestion_in_voting(&harness).await;
		harness.backdate(&stale.id, TimeDelta::days(8));
		let bot_state = state_with_stale_session();

		run_maintenance(&harness.engine, &bot_state).await;

		assert_eq!(harness.stored(&stale.id).status, RequestStatus::Expired);
		assert_eq!(with_form_sessions(&bot_state, |sessions| sessions.len()).await, 0);
	}

	#[tokio::test(start_paused = true)]
	async fn scheduler_runs_until_shutdown() {
		let harness = Harness::new(|settings| settings.expire_days = 7);
		let stale = suggestion_in_voting(&harness).await;
		harness.backdate(&stale.id, TimeDelta::days(8));
		let bot_state = RwLock::new(TypeMap::new());
		let (shutdown_sender, shutdown) = watch::channel(false);

		tokio::join!(
			run_scheduler(&harness.engine, &bot_state, Duration::from_secs(60), shutdown),
			async {
				tokio::time::sleep(Duration::from_secs(150)).await;
				shutdown_sender.send_replace(true);
			}
		);

		assert_eq!(harness.stored(&stale.id).status, RequestStatus::Expired);
	}
}
