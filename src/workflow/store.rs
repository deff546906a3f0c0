// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::error::StoreError;
use super::kind::{Family, RequestKind};
use super::request::{Request, RequestStatus};
use super::settings::GuildRequestSettings;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, UserMarker};

/// Result of inserting a new request
#[derive(Debug, Eq, PartialEq)]
pub enum InsertOutcome {
	Inserted,
	/// The requester already has a non-terminal request in the family; nothing was written.
	ActiveInFamily { existing_id: String },
}

/// Criteria for [RequestStore::query_requests]. Unset criteria match everything.
#[derive(Clone, Debug, Default)]
pub struct RequestFilter {
	pub guild_id: Option<Id<GuildMarker>>,
	pub requester_id: Option<Id<UserMarker>>,
	pub kinds: Vec<RequestKind>,
	pub statuses: Vec<RequestStatus>,
	pub created_before: Option<DateTime<Utc>>,
}

impl RequestFilter {
	pub fn matches(&self, request: &Request) -> bool {
		self.guild_id.is_none_or(|guild_id| request.guild_id == guild_id)
			&& self
				.requester_id
				.is_none_or(|requester_id| request.requester_id == requester_id)
			&& (self.kinds.is_empty() || self.kinds.contains(&request.kind))
			&& (self.statuses.is_empty() || self.statuses.contains(&request.status))
			&& self
				.created_before
				.is_none_or(|created_before| request.created_at < created_before)
	}
}

/// The persistence collaborator for requests and guild settings.
#[async_trait]
pub trait RequestStore: Send + Sync + 'static {
	async fn guild_settings(&self, guild_id: Id<GuildMarker>) -> Result<Option<GuildRequestSettings>, StoreError>;

	async fn save_guild_settings(&self, settings: &GuildRequestSettings) -> Result<(), StoreError>;

	async fn all_guild_settings(&self) -> Result<Vec<GuildRequestSettings>, StoreError>;

	/// Allocates the next number in the guild's sequence for an ID prefix. Never returns the same number twice.
	async fn next_sequence(&self, guild_id: Id<GuildMarker>, prefix: &str) -> Result<u32, StoreError>;

	/// Inserts a new request. If `family` is set, the insert only happens when the requester has no non-terminal
	/// request of that family; the check and insert are one atomic step.
	async fn insert_request(&self, request: &Request, family: Option<Family>) -> Result<InsertOutcome, StoreError>;

	async fn request(&self, guild_id: Id<GuildMarker>, id: &str) -> Result<Option<Request>, StoreError>;

	async fn request_by_channel(&self, channel_id: Id<ChannelMarker>) -> Result<Option<Request>, StoreError>;

	async fn query_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError>;

	/// Replaces a stored request with `updated` if the stored copy still has the status and revision of `current`.
	/// Returns whether the write happened. Callers bump `updated.revision` past `current.revision`.
	async fn update_request(&self, current: &Request, updated: &Request) -> Result<bool, StoreError>;
}
