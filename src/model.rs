// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::schema::{guild_request_settings, requests};
use crate::workflow::error::StoreError;
use crate::workflow::kind::{Family, RequestKind};
use crate::workflow::request::{self, Request, RequestPayload};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use twilight_model::id::Id;

#[derive(Clone, Copy, DbEnum, Debug, Eq, PartialEq)]
#[ExistingTypePath = "crate::schema::sql_types::RequestStatus"]
pub enum RequestStatus {
	Open,
	Pending,
	InProgress,
	Approved,
	Denied,
	Closed,
	Expired,
}

impl From<request::RequestStatus> for RequestStatus {
	fn from(status: request::RequestStatus) -> Self {
		match status {
			request::RequestStatus::Open => Self::Open,
			request::RequestStatus::Pending => Self::Pending,
			request::RequestStatus::InProgress => Self::InProgress,
			request::RequestStatus::Approved => Self::Approved,
			request::RequestStatus::Denied => Self::Denied,
			request::RequestStatus::Closed => Self::Closed,
			request::RequestStatus::Expired => Self::Expired,
		}
	}
}

impl From<RequestStatus> for request::RequestStatus {
	fn from(status: RequestStatus) -> Self {
		match status {
			RequestStatus::Open => Self::Open,
			RequestStatus::Pending => Self::Pending,
			RequestStatus::InProgress => Self::InProgress,
			RequestStatus::Approved => Self::Approved,
			RequestStatus::Denied => Self::Denied,
			RequestStatus::Closed => Self::Closed,
			RequestStatus::Expired => Self::Expired,
		}
	}
}

/// A guild's settings document, stored as JSON so that older layouts can be migrated on read
#[derive(Insertable, Queryable, Selectable)]
#[diesel(table_name = guild_request_settings)]
pub struct GuildSettingsRow {
	pub guild_id: i64,
	pub settings: String,
}

/// The database representation of a request
#[derive(Insertable, Queryable, Selectable)]
#[diesel(table_name = requests)]
pub struct RequestRow {
	pub guild_id: i64,
	pub id: String,
	pub kind: String,
	/// The exclusive family the request counts against, if any. Backs the one-active-request-per-family index.
	pub family: Option<String>,
	pub channel_id: Option<i64>,
	pub public_message_id: Option<i64>,
	pub requester_id: i64,
	pub title: String,
	pub status: RequestStatus,
	/// JSON-encoded [RequestPayload], including the vote ledger
	pub payload: String,
	pub claimed_by: Option<i64>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub closed_at: Option<DateTime<Utc>>,
	pub closed_by: Option<i64>,
	pub close_reason: Option<String>,
	pub revision: i32,
}

/// The columns of a request that change over its lifetime
#[derive(AsChangeset)]
#[diesel(table_name = requests, treat_none_as_null = true)]
pub struct RequestChanges {
	pub channel_id: Option<i64>,
	pub public_message_id: Option<i64>,
	pub title: String,
	pub status: RequestStatus,
	pub payload: String,
	pub claimed_by: Option<i64>,
	pub updated_at: DateTime<Utc>,
	pub closed_at: Option<DateTime<Utc>>,
	pub closed_by: Option<i64>,
	pub close_reason: Option<String>,
	pub revision: i32,
}

impl RequestRow {
	pub fn from_request(request: &Request, family: Option<Family>) -> Result<Self, StoreError> {
		Ok(Self {
			guild_id: database_id_from_discord(request.guild_id.get()),
			id: request.id.clone(),
			kind: request.kind.as_id().to_string(),
			family: family.map(|family| family.as_id().to_string()),
			channel_id: request.channel_id.map(|id| database_id_from_discord(id.get())),
			public_message_id: request.public_message_id.map(|id| database_id_from_discord(id.get())),
			requester_id: database_id_from_discord(request.requester_id.get()),
			title: request.title.clone(),
			status: request.status.into(),
			payload: serde_json::to_string(&request.payload)?,
			claimed_by: request.claimed_by.map(|id| database_id_from_discord(id.get())),
			created_at: request.created_at,
			updated_at: request.updated_at,
			closed_at: request.closed_at,
			closed_by: request.closed_by.map(|id| database_id_from_discord(id.get())),
			close_reason: request.close_reason.clone(),
			revision: request.revision,
		})
	}

	pub fn into_request(self) -> Result<Request, StoreError> {
		let Some(kind) = RequestKind::from_id(&self.kind) else {
			return Err(StoreError::Query(format!("request {} has unknown kind {}", self.id, self.kind)));
		};
		let payload: RequestPayload = serde_json::from_str(&self.payload)?;
		Ok(Request {
			guild_id: discord_id(self.guild_id)?,
			channel_id: self.channel_id.map(discord_id).transpose()?,
			public_message_id: self.public_message_id.map(discord_id).transpose()?,
			requester_id: discord_id(self.requester_id)?,
			kind,
			title: self.title,
			status: self.status.into(),
			payload,
			claimed_by: self.claimed_by.map(discord_id).transpose()?,
			created_at: self.created_at,
			updated_at: self.updated_at,
			closed_at: self.closed_at,
			closed_by: self.closed_by.map(discord_id).transpose()?,
			close_reason: self.close_reason,
			revision: self.revision,
			id: self.id,
		})
	}
}

impl RequestChanges {
	pub fn from_request(request: &Request) -> Result<Self, StoreError> {
		Ok(Self {
			channel_id: request.channel_id.map(|id| database_id_from_discord(id.get())),
			public_message_id: request.public_message_id.map(|id| database_id_from_discord(id.get())),
			title: request.title.clone(),
			status: request.status.into(),
			payload: serde_json::to_string(&request.payload)?,
			claimed_by: request.claimed_by.map(|id| database_id_from_discord(id.get())),
			updated_at: request.updated_at,
			closed_at: request.closed_at,
			closed_by: request.closed_by.map(|id| database_id_from_discord(id.get())),
			close_reason: request.close_reason.clone(),
			revision: request.revision,
		})
	}
}

/// Converts an ID used with Discord (unsigned) to an ID for Postgres use (signed)
pub fn database_id_from_discord(discord_id: u64) -> i64 {
	discord_id as i64
}

/// Converts an ID retrieved from the database (signed) to an ID for use with Discord (unsigned)
pub fn discord_id_from_database_id(database_id: i64) -> u64 {
	database_id as u64
}

fn discord_id<T>(database_id: i64) -> Result<Id<T>, StoreError> {
	Id::new_checked(discord_id_from_database_id(database_id))
		.ok_or_else(|| StoreError::Query(String::from("stored Discord ID is zero")))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::workflow::request::FieldAnswer;
	use crate::workflow::voting::VoteAction;

	fn request() -> Request {
		let now = Utc::now();
		let mut payload = RequestPayload::fields(vec![FieldAnswer {
			id: String::from("title"),
			label: String::from("Title"),
			value: String::from("More emoji"),
		}]);
		payload.votes.record(Id::new(9), VoteAction::Up, now);
		Request {
			id: String::from("SUG-0003"),
			guild_id: Id::new(1),
			channel_id: Some(Id::new(u64::MAX)),
			public_message_id: Some(Id::new(44)),
			requester_id: Id::new(2),
			kind: RequestKind::Suggestion,
			title: String::from("More emoji"),
			status: request::RequestStatus::Open,
			payload,
			claimed_by: None,
			created_at: now,
			updated_at: now,
			closed_at: None,
			closed_by: None,
			close_reason: None,
			revision: 4,
		}
	}

	#[test]
	fn rows_preserve_requests() {
		let original = request();
		let row = RequestRow::from_request(&original, None).unwrap();
		assert_eq!(row.kind, "suggestion");
		assert_eq!(row.family, None);
		assert_eq!(row.status, RequestStatus::Open);
		assert!(row.channel_id.unwrap() < 0);
		assert_eq!(row.into_request().unwrap(), original);
	}

	#[test]
	fn family_is_recorded_for_exclusive_kinds() {
		let mut original = request();
		original.kind = RequestKind::ModeratorApplication;
		let row = RequestRow::from_request(&original, Some(Family::Application)).unwrap();
		assert_eq!(row.family.as_deref(), Some("application"));
	}

	#[test]
	fn unknown_kinds_are_rejected() {
		let mut row = RequestRow::from_request(&request(), None).unwrap();
		row.kind = String::from("complaint");
		assert!(matches!(row.into_request(), Err(StoreError::Query(_))));
	}

	#[test]
	fn status_conversion_round_trips() {
		for status in [
			request::RequestStatus::Open,
			request::RequestStatus::Pending,
			request::RequestStatus::InProgress,
			request::RequestStatus::Approved,
			request::RequestStatus::Denied,
			request::RequestStatus::Closed,
			request::RequestStatus::Expired,
		] {
			assert_eq!(request::RequestStatus::from(RequestStatus::from(status)), status);
		}
	}
}
