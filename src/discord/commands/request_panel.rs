// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::discord::utils::responses::{ephemeral_message, send_response};
use crate::discord::utils::shared_components::request_panel_components;
use miette::bail;
use twilight_http::client::Client;
use twilight_model::application::command::{Command, CommandType};
use twilight_model::application::interaction::InteractionContextType;
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::guild::Permissions;
use twilight_model::id::Id;
use twilight_model::id::marker::ApplicationMarker;
use twilight_util::builder::command::CommandBuilder;

const PANEL_MESSAGE: &str = "**Need something from the team?**\nPick what you'd like to open below. Tickets, reports, and applications get a private channel with staff; suggestions go to a community vote once staff approve them.";

pub fn command_definition() -> Command {
	CommandBuilder::new(
		"request_panel",
		"Post the menu members use to open requests in this channel",
		CommandType::ChatInput,
	)
	.contexts([InteractionContextType::Guild])
	.default_member_permissions(Permissions::MANAGE_GUILD)
	.build()
}

pub async fn handle_command(
	interaction: &InteractionCreate,
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
) -> miette::Result<()> {
	let Some(channel) = interaction.channel.as_ref() else {
		bail!("Request panel command was used without a channel");
	};

	let components = request_panel_components();
	let post_result = http_client
		.create_message(channel.id)
		.content(PANEL_MESSAGE)
		.components(&components)
		.await;

	let response = match post_result {
		Ok(_) => ephemeral_message("Posted the request panel."),
		Err(error) => {
			tracing::warn!(source = ?error, channel = %channel.id, "Failed to post the request panel");
			ephemeral_message("I couldn't post in this channel. Check that I can send messages here.")
		}
	};
	send_response(interaction, http_client, application_id, &response).await?;
	Ok(())
}
