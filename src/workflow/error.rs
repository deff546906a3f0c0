// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::request::RequestStatus;
use miette::Diagnostic;
use std::fmt;
use twilight_model::id::Id;
use twilight_model::id::marker::UserMarker;

/// Error from the persistence collaborator
#[derive(Debug, Diagnostic)]
pub enum StoreError {
	Connection(String),
	Query(String),
	Encoding(serde_json::Error),
}

impl From<serde_json::Error> for StoreError {
	fn from(error: serde_json::Error) -> Self {
		Self::Encoding(error)
	}
}

impl std::error::Error for StoreError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::Encoding(error) => Some(error),
			_ => None,
		}
	}
}

impl fmt::Display for StoreError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Connection(error) => write!(f, "couldn't get database connection: {}", error),
			Self::Query(error) => write!(f, "database query failed: {}", error),
			Self::Encoding(error) => write!(f, "stored data couldn't be encoded or decoded: {}", error),
		}
	}
}

/// Error from the messaging platform collaborator
#[derive(Debug, Diagnostic)]
pub struct PlatformError(pub String);

impl std::error::Error for PlatformError {}

impl fmt::Display for PlatformError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "messaging platform error: {}", self.0)
	}
}

/// Errors reported back to the user who triggered a workflow operation
#[derive(Debug, Diagnostic)]
pub enum WorkflowError {
	/// The requester already has a non-terminal request in the same family.
	DuplicateActiveRequest { existing_id: String },
	/// The form session is missing or no longer matches the submitted page.
	SessionExpired,
	Forbidden,
	InvalidTransition { from: RequestStatus, to: RequestStatus },
	AlreadyClaimed { by: Id<UserMarker> },
	/// The request isn't accepting votes.
	VotingClosed,
	NotFound,
	/// The guild has requests turned off or hasn't configured them.
	Disabled,
	/// A required destination isn't configured for the guild.
	NotConfigured(&'static str),
	/// The request kept changing underneath the operation.
	Conflict,
	/// The request is in its voting phase, but the public vote message couldn't be posted. Approving it again
	/// retries the post.
	VotePostFailed(PlatformError),
	Store(StoreError),
}

impl WorkflowError {
	/// Gets the text to show the user who triggered the failing operation.
	pub fn user_message(&self) -> String {
		match self {
			Self::DuplicateActiveRequest { existing_id } => format!(
				"You already have an open request of this type ({}). Wait for it to be resolved before opening another.",
				existing_id
			),
			Self::SessionExpired => String::from("This form expired. Please start again."),
			Self::Forbidden => String::from("You don't have permission to do that."),
			Self::InvalidTransition { from, .. } if from.is_terminal() => {
				format!("This request is already {}.", from.to_string().to_lowercase())
			}
			Self::InvalidTransition { from, to } => {
				format!("This request can't be moved from {} to {}.", from, to)
			}
			Self::AlreadyClaimed { .. } => String::from("This request was already claimed by another staff member."),
			Self::VotingClosed => String::from("Voting on this request is closed."),
			Self::NotFound => String::from("That request couldn't be found."),
			Self::Disabled => String::from("Requests are not enabled on this server."),
			Self::NotConfigured(what) => format!("This server hasn't configured a {} yet.", what),
			Self::Conflict => String::from("This request was changed while handling your action. Please try again."),
			Self::VotePostFailed(_) => String::from(
				"The request is open for voting, but the vote message couldn't be posted. Approve it again to retry.",
			),
			Self::Store(_) => String::from("An internal error occurred handling this request."),
		}
	}
}

impl From<StoreError> for WorkflowError {
	fn from(error: StoreError) -> Self {
		Self::Store(error)
	}
}

impl std::error::Error for WorkflowError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::Store(error) => Some(error),
			Self::VotePostFailed(error) => Some(error),
			_ => None,
		}
	}
}

impl fmt::Display for WorkflowError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::DuplicateActiveRequest { existing_id } => {
				write!(f, "requester already has active request {}", existing_id)
			}
			Self::SessionExpired => write!(f, "form session expired"),
			Self::Forbidden => write!(f, "actor is not allowed to perform this action"),
			Self::InvalidTransition { from, to } => write!(f, "invalid transition from {} to {}", from, to),
			Self::AlreadyClaimed { by } => write!(f, "request already claimed by {}", by),
			Self::VotingClosed => write!(f, "voting is closed"),
			Self::NotFound => write!(f, "request not found"),
			Self::Disabled => write!(f, "requests are disabled for the guild"),
			Self::NotConfigured(what) => write!(f, "no {} configured", what),
			Self::Conflict => write!(f, "request was modified concurrently"),
			Self::VotePostFailed(error) => write!(f, "failed to post public vote message: {}", error),
			Self::Store(error) => write!(f, "store error: {}", error),
		}
	}
}

/// Channel provisioning failed; the request exists without a channel.
#[derive(Debug, Diagnostic)]
pub enum ProvisioningDegraded {
	MissingParent,
	Platform(PlatformError),
}

impl std::error::Error for ProvisioningDegraded {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::MissingParent => None,
			Self::Platform(error) => Some(error),
		}
	}
}

impl fmt::Display for ProvisioningDegraded {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::MissingParent => write!(f, "no channel category is configured for this request type"),
			Self::Platform(error) => write!(f, "channel creation failed: {}", error),
		}
	}
}

/// A transcript couldn't be delivered. Never reverses the transition that triggered it.
#[derive(Debug, Diagnostic)]
pub enum TranscriptDeliveryFailure {
	NoDestination,
	History(PlatformError),
	Upload(PlatformError),
}

impl std::error::Error for TranscriptDeliveryFailure {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::NoDestination => None,
			Self::History(error) | Self::Upload(error) => Some(error),
		}
	}
}

impl fmt::Display for TranscriptDeliveryFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::NoDestination => write!(f, "no transcript channel configured"),
			Self::History(error) => write!(f, "couldn't fetch message history: {}", error),
			Self::Upload(error) => write!(f, "couldn't upload transcript: {}", error),
		}
	}
}
