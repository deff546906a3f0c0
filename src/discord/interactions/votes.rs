// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::discord::Engine;
use crate::discord::utils::responses::{deferred_ephemeral, send_response, update_deferred, workflow_error_text};
use crate::discord::utils::timestamp::interaction_time;
use crate::workflow::voting::{VoteAction, VoteOutcome};
use miette::bail;
use twilight_http::client::Client;
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::id::Id;
use twilight_model::id::marker::ApplicationMarker;

fn vote_reply(outcome: &VoteOutcome) -> String {
	let tally = format!(
		"👍 {} · 👎 {} (net {})",
		outcome.tally.upvotes,
		outcome.tally.downvotes,
		outcome.tally.net()
	);
	match outcome.auto_resolved {
		Some(status) => format!("Your vote was counted and settled the vote: the suggestion is {}.\n{}", status, tally),
		None => format!("Your vote was updated.\n{}", tally),
	}
}

pub async fn handle_vote_button(
	interaction: &InteractionCreate,
	custom_id_path: &[String],
	http_client: &Client,
	application_id: Id<ApplicationMarker>,
	engine: &Engine,
) -> miette::Result<()> {
	let (Some(request_id), Some(action)) = (custom_id_path.get(1), custom_id_path.get(2)) else {
		bail!("Invalid custom ID for vote (parts: {:?})", custom_id_path);
	};
	let Some(action) = VoteAction::from_id(action) else {
		bail!("Invalid vote action: {} (custom ID parts: {:?})", action, custom_id_path);
	};
	let Some(guild_id) = interaction.guild_id else {
		bail!("Vote button was used outside of a guild");
	};
	let Some(voter) = interaction.author_id() else {
		bail!("Vote button was used by a non-user");
	};

	// A vote that settles the request runs its resolution before this returns.
	send_response(interaction, http_client, application_id, &deferred_ephemeral()).await?;
	let content = match engine
		.register_vote(guild_id, request_id, voter, action, interaction_time(interaction.id))
		.await
	{
		Ok(outcome) => vote_reply(&outcome),
		Err(error) => workflow_error_text(&error),
	};
	update_deferred(interaction, http_client, application_id, &content).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::workflow::request::RequestStatus;
	use crate::workflow::voting::VoteTally;

	#[test]
	fn replies_mention_auto_resolution() {
		let tally = VoteTally {
			upvotes: 3,
			downvotes: 0,
		};
		let pending = vote_reply(&VoteOutcome {
			tally,
			auto_resolved: None,
		});
		assert!(pending.contains("👍 3 · 👎 0 (net 3)"));
		let resolved = vote_reply(&VoteOutcome {
			tally,
			auto_resolved: Some(RequestStatus::Approved),
		});
		assert!(resolved.contains("settled the vote"));
	}
}
