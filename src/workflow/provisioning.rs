// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::error::{PlatformError, ProvisioningDegraded};
use super::platform::{AccessEntry, AccessLevel, AccessSubject, Messenger};
use super::request::Request;
use super::settings::GuildRequestSettings;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use twilight_model::id::Id;
use twilight_model::id::marker::ChannelMarker;

/// Creates and retires the private channel belonging to each request.
pub struct Provisioning<M> {
	messenger: Arc<M>,
	teardown_grace: Duration,
	shutdown: watch::Receiver<bool>,
}

/// Computes who can see a request's channel: the requester and every staff role for the request's kind.
pub fn access_list(request: &Request, settings: &GuildRequestSettings) -> Vec<AccessEntry> {
	let mut entries = vec![
		AccessEntry {
			subject: AccessSubject::Everyone,
			level: AccessLevel::Hidden,
		},
		AccessEntry {
			subject: AccessSubject::User(request.requester_id),
			level: AccessLevel::ReadWrite,
		},
	];
	for role in settings.staff_roles_for(request.kind) {
		entries.push(AccessEntry {
			subject: AccessSubject::Role(role),
			level: AccessLevel::ReadWrite,
		});
	}
	entries
}

impl<M: Messenger> Provisioning<M> {
	pub fn new(messenger: Arc<M>, teardown_grace: Duration, shutdown: watch::Receiver<bool>) -> Self {
		Self {
			messenger,
			teardown_grace,
			shutdown,
		}
	}

	/// Creates the request's channel under the category configured for its kind.
	pub async fn open(
		&self,
		request: &Request,
		settings: &GuildRequestSettings,
	) -> Result<Id<ChannelMarker>, ProvisioningDegraded> {
		let Some(parent) = settings.category_for(request.kind) else {
			return Err(ProvisioningDegraded::MissingParent);
		};
		let access = access_list(request, settings);
		self.messenger
			.create_channel(request.guild_id, &request.channel_name(), parent, &access)
			.await
			.map_err(ProvisioningDegraded::Platform)
	}

	/// Takes away the requester's ability to write in the channel while leaving the history visible to staff.
	pub async fn revoke(&self, request: &Request) -> Result<(), PlatformError> {
		let Some(channel_id) = request.channel_id else {
			return Ok(());
		};
		let entry = AccessEntry {
			subject: AccessSubject::User(request.requester_id),
			level: AccessLevel::Hidden,
		};
		self.messenger.edit_access(channel_id, entry).await
	}

	/// Deletes the channel once the grace delay has passed. Only process shutdown cancels the deletion.
	pub fn schedule_teardown(&self, channel_id: Id<ChannelMarker>) -> JoinHandle<()> {
		let messenger = Arc::clone(&self.messenger);
		let grace = self.teardown_grace;
		let mut shutdown = self.shutdown.clone();
		tokio::spawn(async move {
			tokio::select! {
				_ = sleep(grace) => {
					if let Err(error) = messenger.delete_channel(channel_id).await {
						tracing::warn!(source = ?error, channel = %channel_id, "Failed to delete request channel");
					}
				}
				_ = shutdown.changed() => {
					tracing::debug!(channel = %channel_id, "Shutting down before request channel deletion");
				}
			}
		})
	}
}
