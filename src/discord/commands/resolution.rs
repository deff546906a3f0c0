// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::string_option;
use crate::discord::Engine;
use crate::discord::utils::permissions::actor_from_interaction;
use crate::discord::utils::responses::{
	NOT_IN_REQUEST_CHANNEL, deferred_ephemeral, send_response, transition_outcome_message, update_deferred,
	workflow_error_text,
};
use crate::discord::utils::timestamp::interaction_time;
use crate::workflow::engine::TransitionTarget;
use crate::workflow::error::WorkflowError;
use miette::bail;
use twilight_http::client::Client;
use twilight_model::application::command::{Command, CommandType};
use twilight_model::application::interaction::InteractionContextType;
use twilight_model::application::interaction::application_command::CommandData;
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::id::Id;
use twilight_model::id::marker::ApplicationMarker;
use twilight_util::builder::command::{CommandBuilder, StringBuilder};

/// Defines one of the commands that resolve the request in the current channel.
pub fn resolution_command(name: &str, description: &str) -> Command {
	let reason_option = StringBuilder::new("reason", "Why the request is being resolved this way")
		.max_length(1000)
		.required(false)
		.build();
	CommandBuilder::new(name, description, CommandType::ChatInput)
		.contexts([InteractionContextType::Guild])
		.option(reason_option)
		.build()
}

pub async fn handle_resolution(
	interaction: &InteractionCreate,
	command_data: &CommandData,
	target: TransitionTarget,
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
	engine: &Engine,
) -> miette::Result<()> {
	let Some(guild_id) = interaction.guild_id else {
		bail!("Request command {} was used outside of a guild", command_data.name);
	};
	let Some(actor) = actor_from_interaction(interaction) else {
		bail!("Request command {} was used by a non-member", command_data.name);
	};
	let Some(channel) = interaction.channel.as_ref() else {
		bail!("Request command {} was used without a channel", command_data.name);
	};
	let reason = string_option(command_data, "reason");

	send_response(interaction, http_client, application_id, &deferred_ephemeral()).await?;

	let result = match engine.request_in_channel(channel.id).await {
		Ok(request) => engine
			.transition(
				guild_id,
				&request.id,
				target,
				&actor,
				reason,
				interaction_time(interaction.id),
			)
			.await
			.map(|outcome| transition_outcome_message(&outcome)),
		Err(WorkflowError::NotFound) => Ok(String::from(NOT_IN_REQUEST_CHANNEL)),
		Err(error) => Err(error),
	};
	let content = match result {
		Ok(content) => content,
		Err(error) => workflow_error_text(&error),
	};
	update_deferred(interaction, http_client, application_id, &content).await
}
