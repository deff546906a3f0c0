// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::Engine;
use miette::bail;
use twilight_http::client::Client;
use twilight_model::application::command::Command;
use twilight_model::application::interaction::application_command::{CommandData, CommandOptionValue};
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::id::Id;
use twilight_model::id::marker::ApplicationMarker;

mod approve;
mod claim;
mod close;
mod deny;
mod progress;
mod request_panel;
mod request_settings;
mod resolution;

pub fn command_definitions() -> Vec<Command> {
	vec![
		approve::command_definition(),
		claim::command_definition(),
		close::command_definition(),
		deny::command_definition(),
		progress::command_definition(),
		request_panel::command_definition(),
		request_settings::command_definition(),
	]
}

pub async fn route_command(
	interaction: &InteractionCreate,
	command_data: &CommandData,
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
	engine: &Engine,
) -> miette::Result<()> {
	match command_data.name.as_str() {
		"approve" => approve::handle_command(interaction, command_data, http_client, application_id, engine).await,
		"claim" => claim::handle_command(interaction, http_client, application_id, engine).await,
		"close" => close::handle_command(interaction, command_data, http_client, application_id, engine).await,
		"deny" => deny::handle_command(interaction, command_data, http_client, application_id, engine).await,
		"progress" => progress::handle_command(interaction, http_client, application_id, engine).await,
		"request_panel" => request_panel::handle_command(interaction, http_client, application_id).await,
		"request_settings" => {
			request_settings::handle_command(interaction, command_data, http_client, application_id, engine).await
		}
		_ => bail!("Unknown command encountered: {}\n{:?}", command_data.name, command_data),
	}
}

/// Gets the value of an optional string option passed to a command.
fn string_option(command_data: &CommandData, name: &str) -> Option<String> {
	command_data
		.options
		.iter()
		.find(|option| option.name == name)
		.and_then(|option| match &option.value {
			CommandOptionValue::String(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
			_ => None,
		})
}
