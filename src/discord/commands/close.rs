// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::resolution::{handle_resolution, resolution_command};
use crate::discord::Engine;
use crate::workflow::engine::TransitionTarget;
use twilight_http::client::Client;
use twilight_model::application::command::Command;
use twilight_model::application::interaction::application_command::CommandData;
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::id::Id;
use twilight_model::id::marker::ApplicationMarker;

pub fn command_definition() -> Command {
	resolution_command("close", "Close the request in this channel")
}

pub async fn handle_command(
	interaction: &InteractionCreate,
	command_data: &CommandData,
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
	engine: &Engine,
) -> miette::Result<()> {
	handle_resolution(
		interaction,
		command_data,
		TransitionTarget::Close,
		http_client,
		application_id,
		engine,
	)
	.await
}
