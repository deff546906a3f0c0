// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::discord::Engine;
use crate::discord::utils::permissions::actor_from_interaction;
use crate::discord::utils::responses::{NOT_IN_REQUEST_CHANNEL, ephemeral_message, send_response, workflow_error_message};
use crate::discord::utils::timestamp::interaction_time;
use crate::workflow::error::WorkflowError;
use miette::bail;
use twilight_http::client::Client;
use twilight_model::application::command::{Command, CommandType};
use twilight_model::application::interaction::InteractionContextType;
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::id::Id;
use twilight_model::id::marker::ApplicationMarker;
use twilight_util::builder::command::CommandBuilder;

pub fn command_definition() -> Command {
	CommandBuilder::new("progress", "Mark the request in this channel as being worked on", CommandType::ChatInput)
		.contexts([InteractionContextType::Guild])
		.build()
}

pub async fn handle_command(
	interaction: &InteractionCreate,
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
	engine: &Engine,
) -> miette::Result<()> {
	let Some(guild_id) = interaction.guild_id else {
		bail!("Progress command was used outside of a guild");
	};
	let Some(actor) = actor_from_interaction(interaction) else {
		bail!("Progress command was used by a non-member");
	};
	let Some(channel) = interaction.channel.as_ref() else {
		bail!("Progress command was used without a channel");
	};

	let response = match engine.request_in_channel(channel.id).await {
		Ok(request) => {
			match engine
				.start_progress(guild_id, &request.id, &actor, interaction_time(interaction.id))
				.await
			{
				Ok(request) => ephemeral_message(format!("**{}** is now in progress.", request.id)),
				Err(error) => workflow_error_message(&error),
			}
		}
		Err(WorkflowError::NotFound) => ephemeral_message(NOT_IN_REQUEST_CHANNEL),
		Err(error) => workflow_error_message(&error),
	};
	send_response(interaction, http_client, application_id, &response).await
}
