// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::engine::WorkflowEngine;
use super::error::WorkflowError;
use super::platform::{ActionButton, ButtonKind, Messenger, OutgoingMessage};
use super::request::{Request, RequestStatus};
use super::settings::GuildRequestSettings;
use super::store::RequestStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use twilight_mention::fmt::Mention;
use twilight_model::id::Id;
use twilight_model::id::marker::{GuildMarker, UserMarker};

/// What a voter asked for
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VoteAction {
	Up,
	Down,
	Remove,
}

impl VoteAction {
	pub fn from_id(id: &str) -> Option<Self> {
		match id {
			"up" => Some(Self::Up),
			"down" => Some(Self::Down),
			"remove" => Some(Self::Remove),
			_ => None,
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDirection {
	Up,
	Down,
}

/// A change recorded in the ledger
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChange {
	Cast(VoteDirection),
	Retract,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct VoteEvent {
	pub voter: Id<UserMarker>,
	pub change: VoteChange,
	pub at: DateTime<Utc>,
}

/// Append-only record of every vote change on a request. Counts are always derived by replaying it.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct VoteLedger {
	events: Vec<VoteEvent>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct VoteTally {
	pub upvotes: u32,
	pub downvotes: u32,
}

impl VoteTally {
	pub fn net(&self) -> i64 {
		i64::from(self.upvotes) - i64::from(self.downvotes)
	}
}

impl VoteLedger {
	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}

	pub fn events(&self) -> &[VoteEvent] {
		&self.events
	}

	fn current_votes(&self) -> HashMap<Id<UserMarker>, VoteDirection> {
		let mut votes = HashMap::new();
		for event in self.events.iter() {
			match event.change {
				VoteChange::Cast(direction) => {
					votes.insert(event.voter, direction);
				}
				VoteChange::Retract => {
					votes.remove(&event.voter);
				}
			}
		}
		votes
	}

	pub fn vote_of(&self, voter: Id<UserMarker>) -> Option<VoteDirection> {
		self.current_votes().get(&voter).copied()
	}

	/// Records a voter's action with toggle semantics: repeating the current direction retracts the vote, and the
	/// opposite direction replaces it. Returns whether anything was recorded.
	pub fn record(&mut self, voter: Id<UserMarker>, action: VoteAction, at: DateTime<Utc>) -> bool {
		let current = self.vote_of(voter);
		let change = match (action, current) {
			(VoteAction::Remove, None) => return false,
			(VoteAction::Remove, Some(_)) => VoteChange::Retract,
			(VoteAction::Up, Some(VoteDirection::Up)) | (VoteAction::Down, Some(VoteDirection::Down)) => {
				VoteChange::Retract
			}
			(VoteAction::Up, _) => VoteChange::Cast(VoteDirection::Up),
			(VoteAction::Down, _) => VoteChange::Cast(VoteDirection::Down),
		};
		self.events.push(VoteEvent { voter, change, at });
		true
	}

	pub fn tally(&self) -> VoteTally {
		let mut tally = VoteTally::default();
		for direction in self.current_votes().values() {
			match direction {
				VoteDirection::Up => tally.upvotes += 1,
				VoteDirection::Down => tally.downvotes += 1,
			}
		}
		tally
	}
}

/// Gets the status a request should resolve to given its tally, if any threshold has been crossed.
pub fn threshold_resolution(tally: VoteTally, approve_threshold: u32, deny_threshold: u32) -> Option<RequestStatus> {
	if approve_threshold > 0 && tally.net() >= i64::from(approve_threshold) {
		Some(RequestStatus::Approved)
	} else if deny_threshold > 0 && tally.net() <= -i64::from(deny_threshold) {
		Some(RequestStatus::Denied)
	} else {
		None
	}
}

/// Result of registering a vote
#[derive(Debug)]
pub struct VoteOutcome {
	pub tally: VoteTally,
	pub auto_resolved: Option<RequestStatus>,
}

/// Renders the public post on which the community votes.
pub fn vote_post(request: &Request, tally: VoteTally) -> OutgoingMessage {
	let descriptor = request.kind.descriptor();
	let frozen = request.status != RequestStatus::Open;
	let mut content = format!(
		"{} **{}: {}**\nSuggested by {}\n",
		descriptor.icon,
		request.id,
		request.title,
		request.requester_id.mention()
	);
	if let Some(description) = request.payload.field("description") {
		content = format!("{}\n{}\n", content, description);
	}
	content = format!(
		"{}\n👍 {} · 👎 {} · Net {:+}",
		content,
		tally.upvotes,
		tally.downvotes,
		tally.net()
	);
	if frozen {
		content = format!("{}\n*Voting closed: {}*", content, request.status);
	}
	let buttons = vec![
		ActionButton {
			custom_id: format!("vote/{}/up", request.id),
			label: String::from("👍"),
			kind: ButtonKind::Success,
			disabled: frozen,
		},
		ActionButton {
			custom_id: format!("vote/{}/down", request.id),
			label: String::from("👎"),
			kind: ButtonKind::Danger,
			disabled: frozen,
		},
		ActionButton {
			custom_id: format!("vote/{}/remove", request.id),
			label: String::from("Remove vote"),
			kind: ButtonKind::Secondary,
			disabled: frozen,
		},
	];
	OutgoingMessage { content, buttons }
}

impl<S: RequestStore, M: Messenger> WorkflowEngine<S, M> {
	/// Records a vote on a request in its public voting phase, resolving the request if a threshold is crossed.
	pub async fn register_vote(
		&self,
		guild_id: Id<GuildMarker>,
		request_id: &str,
		voter: Id<UserMarker>,
		action: VoteAction,
		now: DateTime<Utc>,
	) -> Result<VoteOutcome, WorkflowError> {
		let settings = self.settings_or_default(guild_id).await?;
		let (outcome, request) = self
			.write_request(guild_id, request_id, now, |request| {
				let voting_open = request.kind.descriptor().voting
					&& request.status == RequestStatus::Open
					&& request.public_message_id.is_some();
				if !voting_open {
					return Err(WorkflowError::VotingClosed);
				}
				request.payload.votes.record(voter, action, now);
				let tally = request.payload.votes.tally();
				let auto_resolved = threshold_resolution(tally, settings.approve_threshold, settings.deny_threshold);
				if let Some(status) = auto_resolved {
					request.status = status;
					request.closed_at = Some(now);
					request.closed_by = None;
					request.close_reason = Some(String::from("Resolved by community vote"));
				}
				Ok(VoteOutcome { tally, auto_resolved })
			})
			.await?;

		if outcome.auto_resolved.is_some() {
			tracing::info!(request = %request.id, status = %request.status, "Request resolved by community vote");
			self.finalize(&settings, &request).await;
		} else {
			self.refresh_vote_post(&settings, &request).await;
		}
		Ok(outcome)
	}

	/// Posts the public vote message for a request in its voting phase and records the message on the request.
	pub(super) async fn open_public_vote(
		&self,
		settings: &GuildRequestSettings,
		request: &Request,
		now: DateTime<Utc>,
	) -> Result<(), WorkflowError> {
		let Some(voting_channel) = settings.voting_channel else {
			return Err(WorkflowError::NotConfigured("voting channel"));
		};
		let post = vote_post(request, request.payload.votes.tally());
		let message_id = match self.messenger.send_message(voting_channel, &post).await {
			Ok(message_id) => message_id,
			Err(error) => {
				tracing::error!(source = ?error, request = %request.id, "Failed to post public vote message");
				return Err(WorkflowError::VotePostFailed(error));
			}
		};
		self.write_request(request.guild_id, &request.id, now, |request| {
			request.public_message_id = Some(message_id);
			Ok(())
		})
		.await?;
		Ok(())
	}

	/// Redraws the public vote post with the current tally. Terminal requests are drawn with voting disabled.
	pub(super) async fn refresh_vote_post(&self, settings: &GuildRequestSettings, request: &Request) {
		let (Some(voting_channel), Some(message_id)) = (settings.voting_channel, request.public_message_id) else {
			return;
		};
		let post = vote_post(request, request.payload.votes.tally());
		if let Err(error) = self.messenger.edit_message(voting_channel, message_id, &post).await {
			tracing::warn!(source = ?error, request = %request.id, "Failed to update public vote message");
		}
	}

	/// Posts a community-approved request to the showcase channel.
	pub(super) async fn post_showcase(&self, settings: &GuildRequestSettings, request: &Request) {
		let Some(showcase_channel) = settings.showcase_channel else {
			return;
		};
		let tally = request.payload.votes.tally();
		let mut content = format!(
			"✅ **{}: {}** was approved by the community!\nSuggested by {}",
			request.id,
			request.title,
			request.requester_id.mention()
		);
		if let Some(description) = request.payload.field("description") {
			content = format!("{}\n\n{}", content, description);
		}
		content = format!("{}\n\nFinal tally: 👍 {} · 👎 {}", content, tally.upvotes, tally.downvotes);
		if let Err(error) = self
			.messenger
			.send_message(showcase_channel, &OutgoingMessage::text(content))
			.await
		{
			tracing::warn!(source = ?error, request = %request.id, "Failed to post showcase message");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::workflow::testing::{Harness, suggestion_in_voting};

	fn voter(id: u64) -> Id<UserMarker> {
		Id::new(id)
	}

	#[test]
	fn repeating_a_vote_removes_it() {
		let mut ledger = VoteLedger::default();
		let now = Utc::now();
		assert!(ledger.record(voter(1), VoteAction::Up, now));
		assert!(ledger.record(voter(1), VoteAction::Up, now));
		assert_eq!(ledger.vote_of(voter(1)), None);
		assert_eq!(ledger.tally(), VoteTally::default());
		assert_eq!(ledger.events().len(), 2);
	}

	#[test]
	fn opposite_vote_replaces_previous_one() {
		let mut ledger = VoteLedger::default();
		let now = Utc::now();
		ledger.record(voter(1), VoteAction::Up, now);
		ledger.record(voter(1), VoteAction::Down, now);
		assert_eq!(ledger.vote_of(voter(1)), Some(VoteDirection::Down));
		assert_eq!(
			ledger.tally(),
			VoteTally {
				upvotes: 0,
				downvotes: 1
			}
		);
	}

	#[test]
	fn removing_without_a_vote_records_nothing() {
		let mut ledger = VoteLedger::default();
		assert!(!ledger.record(voter(1), VoteAction::Remove, Utc::now()));
		assert!(ledger.is_empty());
	}

	#[test]
	fn thresholds_of_zero_never_resolve() {
		let tally = VoteTally {
			upvotes: 50,
			downvotes: 0,
		};
		assert_eq!(threshold_resolution(tally, 0, 0), None);
		assert_eq!(threshold_resolution(tally, 50, 0), Some(RequestStatus::Approved));
		let tally = VoteTally {
			upvotes: 1,
			downvotes: 4,
		};
		assert_eq!(threshold_resolution(tally, 3, 3), Some(RequestStatus::Denied));
		assert_eq!(threshold_resolution(tally, 3, 4), None);
	}

	#[tokio::test]
	async fn third_upvote_auto_approves_once() {
		let harness = Harness::new(|settings| settings.approve_threshold = 3);
		let request = suggestion_in_voting(&harness).await;
		let engine = &harness.engine;
		let now = Utc::now();

		for id in 10..12 {
			let outcome = engine
				.register_vote(harness.guild_id, &request.id, voter(id), VoteAction::Up, now)
				.await
				.unwrap();
			assert_eq!(outcome.auto_resolved, None);
		}
		let outcome = engine
			.register_vote(harness.guild_id, &request.id, voter(12), VoteAction::Up, now)
			.await
			.unwrap();
		assert_eq!(outcome.tally.net(), 3);
		assert_eq!(outcome.auto_resolved, Some(RequestStatus::Approved));

		let fourth = engine
			.register_vote(harness.guild_id, &request.id, voter(13), VoteAction::Up, now)
			.await;
		assert!(matches!(fourth, Err(WorkflowError::VotingClosed)));

		let stored = harness.stored(&request.id);
		assert_eq!(stored.status, RequestStatus::Approved);
		assert_eq!(stored.closed_by, None);
		assert_eq!(harness.messenger.messages_to(harness.showcase_channel).len(), 1);
		let frozen_post = harness.messenger.last_edit_of(stored.public_message_id.unwrap()).unwrap();
		assert!(frozen_post.buttons.iter().all(|button| button.disabled));
	}

	#[tokio::test]
	async fn downvotes_past_threshold_deny() {
		let harness = Harness::new(|settings| settings.deny_threshold = 2);
		let request = suggestion_in_voting(&harness).await;
		let now = Utc::now();
		harness
			.engine
			.register_vote(harness.guild_id, &request.id, voter(10), VoteAction::Down, now)
			.await
			.unwrap();
		let outcome = harness
			.engine
			.register_vote(harness.guild_id, &request.id, voter(11), VoteAction::Down, now)
			.await
			.unwrap();
		assert_eq!(outcome.auto_resolved, Some(RequestStatus::Denied));
		assert!(harness.messenger.messages_to(harness.showcase_channel).is_empty());
	}

	#[tokio::test]
	async fn votes_on_pending_suggestions_are_rejected() {
		let harness = Harness::new(|_| ());
		let created = harness.create_suggestion(Id::new(2)).await;
		let result = harness
			.engine
			.register_vote(harness.guild_id, &created.id, voter(10), VoteAction::Up, Utc::now())
			.await;
		assert!(matches!(result, Err(WorkflowError::VotingClosed)));
	}

	#[tokio::test]
	async fn vote_post_shows_running_tally() {
		let harness = Harness::new(|_| ());
		let request = suggestion_in_voting(&harness).await;
		let now = Utc::now();
		harness
			.engine
			.register_vote(harness.guild_id, &request.id, voter(10), VoteAction::Up, now)
			.await
			.unwrap();
		harness
			.engine
			.register_vote(harness.guild_id, &request.id, voter(11), VoteAction::Down, now)
			.await
			.unwrap();
		let post = harness.messenger.last_edit_of(request.public_message_id.unwrap()).unwrap();
		assert!(post.content.contains("👍 1 · 👎 1 · Net +0"));
		assert!(post.buttons.iter().all(|button| !button.disabled));
	}
}
