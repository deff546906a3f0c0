// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::workflow::engine::TransitionOutcome;
use crate::workflow::error::WorkflowError;
use miette::IntoDiagnostic;
use twilight_http::client::Client;
use twilight_model::channel::message::{AllowedMentions, Component, MessageFlags};
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::http::interaction::{InteractionResponse, InteractionResponseType};
use twilight_model::id::Id;
use twilight_model::id::marker::ApplicationMarker;
use twilight_util::builder::InteractionResponseDataBuilder;

pub const NOT_IN_REQUEST_CHANNEL: &str = "This command is only useful in a request channel.";

/// Generates the message to send when a category doesn't give the bot what it needs to manage request channels.
pub fn category_missing_permissions_message(channel_mention: impl std::fmt::Display) -> String {
	format!(
		"The category {} does not give me the permissions I need (View Channel, Manage Channels, Manage Permissions, Send Messages, Read Message History, Attach Files) to create and manage request channels.",
		channel_mention
	)
}

/// A reply only the user who triggered the interaction can see
pub fn ephemeral_message(content: impl Into<String>) -> InteractionResponse {
	let response = InteractionResponseDataBuilder::new()
		.content(content)
		.allowed_mentions(AllowedMentions::default())
		.flags(MessageFlags::EPHEMERAL)
		.build();
	InteractionResponse {
		kind: InteractionResponseType::ChannelMessageWithSource,
		data: Some(response),
	}
}

/// An ephemeral reply carrying components, such as the button to continue a form
pub fn ephemeral_message_with_components(content: impl Into<String>, components: Vec<Component>) -> InteractionResponse {
	let response = InteractionResponseDataBuilder::new()
		.content(content)
		.components(components)
		.allowed_mentions(AllowedMentions::default())
		.flags(MessageFlags::EPHEMERAL)
		.build();
	InteractionResponse {
		kind: InteractionResponseType::ChannelMessageWithSource,
		data: Some(response),
	}
}

/// Acknowledges an interaction whose handling may take longer than Discord waits for a response. The eventual
/// result is sent with [update_deferred].
pub fn deferred_ephemeral() -> InteractionResponse {
	let response = InteractionResponseDataBuilder::new()
		.flags(MessageFlags::EPHEMERAL)
		.build();
	InteractionResponse {
		kind: InteractionResponseType::DeferredChannelMessageWithSource,
		data: Some(response),
	}
}

pub fn modal(custom_id: impl Into<String>, title: impl Into<String>, components: Vec<Component>) -> InteractionResponse {
	let title: String = title.into();
	let response = InteractionResponseDataBuilder::new()
		.custom_id(custom_id)
		.title(title.chars().take(45).collect::<String>())
		.components(components)
		.build();
	InteractionResponse {
		kind: InteractionResponseType::Modal,
		data: Some(response),
	}
}

/// Describes the result of approving, denying, or closing a request to the staff member who did it.
pub fn transition_outcome_message(outcome: &TransitionOutcome) -> String {
	match outcome {
		TransitionOutcome::Finalized(request) => format!("**{}** is now {}.", request.id, request.status),
		TransitionOutcome::VotingOpened(request) => {
			format!("**{}** was approved for a community vote.", request.id)
		}
	}
}

/// Gets the text telling the user why their action failed. Internal failures are logged and reported without
/// detail.
pub fn workflow_error_text(error: &WorkflowError) -> String {
	match error {
		WorkflowError::Store(_) | WorkflowError::Conflict | WorkflowError::VotePostFailed(_) => {
			tracing::error!(source = ?error, "A request operation failed");
		}
		_ => tracing::debug!(source = ?error, "A request operation was rejected"),
	}
	error.user_message()
}

pub fn workflow_error_message(error: &WorkflowError) -> InteractionResponse {
	ephemeral_message(workflow_error_text(error))
}

pub async fn send_response(
	interaction: &InteractionCreate,
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
	response: &InteractionResponse,
) -> miette::Result<()> {
	http_client
		.interaction(application_id)
		.create_response(interaction.id, &interaction.token, response)
		.await
		.into_diagnostic()?;
	Ok(())
}

pub async fn update_deferred(
	interaction: &InteractionCreate,
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
	content: &str,
) -> miette::Result<()> {
	http_client
		.interaction(application_id)
		.update_response(&interaction.token)
		.content(Some(content))
		.allowed_mentions(Some(&AllowedMentions::default()))
		.await
		.into_diagnostic()?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn modal_titles_are_shortened() {
		let response = modal("form/bug", "x".repeat(80), Vec::new());
		assert_eq!(response.kind, InteractionResponseType::Modal);
		let data = response.data.unwrap();
		assert_eq!(data.title.map(|title| title.len()), Some(45));
		assert_eq!(data.custom_id.as_deref(), Some("form/bug"));
	}

	#[test]
	fn ephemeral_messages_are_flagged() {
		let data = ephemeral_message("hi").data.unwrap();
		assert_eq!(data.flags, Some(MessageFlags::EPHEMERAL));
	}

	#[test]
	fn workflow_errors_use_their_user_message() {
		let data = workflow_error_message(&WorkflowError::SessionExpired).data.unwrap();
		assert_eq!(data.content.as_deref(), Some("This form expired. Please start again."));
	}
}
