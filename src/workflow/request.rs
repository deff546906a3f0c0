// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::kind::RequestKind;
use super::voting::VoteLedger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
	Open,
	Pending,
	InProgress,
	Approved,
	Denied,
	Closed,
	Expired,
}

impl RequestStatus {
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Approved | Self::Denied | Self::Closed | Self::Expired)
	}

	/// Position in the forward-only ordering of the state machine. Transitions may never move to a lower rank.
	fn rank(&self) -> u8 {
		match self {
			Self::Open | Self::Pending => 0,
			Self::InProgress => 1,
			Self::Approved | Self::Denied | Self::Closed | Self::Expired => 2,
		}
	}

	/// Whether the state machine has an edge from `self` to `target`.
	pub fn can_move_to(&self, target: RequestStatus) -> bool {
		if self.is_terminal() || *self == target {
			return false;
		}
		match (self, target) {
			// Opening the public voting phase is the only lateral move.
			(Self::Pending, Self::Open) => true,
			(Self::Open | Self::Pending, Self::InProgress) => true,
			_ => target.rank() > self.rank() && target.is_terminal(),
		}
	}
}

impl fmt::Display for RequestStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Open => "Open",
			Self::Pending => "Pending",
			Self::InProgress => "In Progress",
			Self::Approved => "Approved",
			Self::Denied => "Denied",
			Self::Closed => "Closed",
			Self::Expired => "Expired",
		};
		write!(f, "{}", name)
	}
}

/// One answered field from a single-page form
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FieldAnswer {
	pub id: String,
	pub label: String,
	pub value: String,
}

/// One answered question from a multi-page form
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct QuestionAnswer {
	pub question: String,
	pub answer: String,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", content = "entries", rename_all = "snake_case")]
pub enum PayloadEntries {
	Fields(Vec<FieldAnswer>),
	Answers(Vec<QuestionAnswer>),
}

/// The structured data collected for a request.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RequestPayload {
	pub data: PayloadEntries,
	#[serde(default, skip_serializing_if = "VoteLedger::is_empty")]
	pub votes: VoteLedger,
}

impl RequestPayload {
	pub fn fields(fields: Vec<FieldAnswer>) -> Self {
		Self {
			data: PayloadEntries::Fields(fields),
			votes: VoteLedger::default(),
		}
	}

	pub fn answers(answers: Vec<QuestionAnswer>) -> Self {
		Self {
			data: PayloadEntries::Answers(answers),
			votes: VoteLedger::default(),
		}
	}

	/// Gets the value of a single-page field by its ID.
	pub fn field(&self, id: &str) -> Option<&str> {
		match &self.data {
			PayloadEntries::Fields(fields) => fields
				.iter()
				.find(|field| field.id == id)
				.map(|field| field.value.as_str()),
			PayloadEntries::Answers(_) => None,
		}
	}
}

/// A request tracked through the workflow.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Request {
	/// Family-scoped ID, e.g. `BUG-0001`
	pub id: String,
	pub guild_id: Id<GuildMarker>,
	/// The request's private channel. Not set if provisioning failed.
	pub channel_id: Option<Id<ChannelMarker>>,
	/// The public vote post, for requests in the voting phase
	pub public_message_id: Option<Id<MessageMarker>>,
	pub requester_id: Id<UserMarker>,
	pub kind: RequestKind,
	pub title: String,
	pub status: RequestStatus,
	pub payload: RequestPayload,
	pub claimed_by: Option<Id<UserMarker>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub closed_at: Option<DateTime<Utc>>,
	/// Not set when the request was closed automatically.
	pub closed_by: Option<Id<UserMarker>>,
	pub close_reason: Option<String>,
	/// Incremented on every write; used to detect concurrent modification.
	pub revision: i32,
}

impl Request {
	/// Formats a request ID from the type's prefix and the sequence number.
	pub fn format_id(prefix: &str, sequence: u32) -> String {
		format!("{}-{:04}", prefix, sequence)
	}

	pub fn is_terminal(&self) -> bool {
		self.status.is_terminal()
	}

	/// Name used for the request's channel.
	pub fn channel_name(&self) -> String {
		self.id.to_lowercase()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const ALL: [RequestStatus; 7] = [
		RequestStatus::Open,
		RequestStatus::Pending,
		RequestStatus::InProgress,
		RequestStatus::Approved,
		RequestStatus::Denied,
		RequestStatus::Closed,
		RequestStatus::Expired,
	];

	#[test]
	fn terminal_states_have_no_exits() {
		for from in ALL.iter().filter(|status| status.is_terminal()) {
			for to in ALL {
				assert!(!from.can_move_to(to), "{} -> {} should be rejected", from, to);
			}
		}
	}

	#[test]
	fn transitions_only_move_forward() {
		assert!(RequestStatus::Open.can_move_to(RequestStatus::InProgress));
		assert!(RequestStatus::Pending.can_move_to(RequestStatus::Approved));
		assert!(RequestStatus::InProgress.can_move_to(RequestStatus::Closed));
		assert!(RequestStatus::Pending.can_move_to(RequestStatus::Open));
		assert!(!RequestStatus::InProgress.can_move_to(RequestStatus::Open));
		assert!(!RequestStatus::InProgress.can_move_to(RequestStatus::Pending));
		assert!(!RequestStatus::Open.can_move_to(RequestStatus::Pending));
		assert!(!RequestStatus::Open.can_move_to(RequestStatus::Open));
	}

	#[test]
	fn ids_are_zero_padded() {
		assert_eq!(Request::format_id("BUG", 1), "BUG-0001");
		assert_eq!(Request::format_id("APP", 12345), "APP-12345");
	}

	#[test]
	fn payload_serializes_without_empty_ledger() {
		let payload = RequestPayload::fields(vec![FieldAnswer {
			id: String::from("title"),
			label: String::from("Summary"),
			value: String::from("Crash on login"),
		}]);
		let json = serde_json::to_value(&payload).unwrap();
		assert!(json.get("votes").is_none());
		assert_eq!(json["data"]["type"], "fields");
		let parsed: RequestPayload = serde_json::from_value(json).unwrap();
		assert_eq!(parsed, payload);
		assert_eq!(parsed.field("title"), Some("Crash on login"));
	}
}
