// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::error::{ProvisioningDegraded, TranscriptDeliveryFailure, WorkflowError};
use super::kind::{Family, RequestKind};
use super::platform::{ActionButton, ButtonKind, Messenger, OutgoingMessage};
use super::provisioning::Provisioning;
use super::request::{PayloadEntries, Request, RequestPayload, RequestStatus};
use super::settings::{Actor, GuildRequestSettings};
use super::store::{InsertOutcome, RequestFilter, RequestStore};
use super::transcript;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use twilight_mention::fmt::Mention;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, UserMarker};

/// Number of times a write is retried when the request changes underneath it.
const MAX_WRITE_ATTEMPTS: usize = 3;

/// Discord refuses messages longer than this.
const MESSAGE_LENGTH_LIMIT: usize = 2000;

#[derive(Clone, Copy, Debug)]
pub struct EngineOptions {
	/// How long a request's channel lives after the request is resolved
	pub channel_delete_grace: Duration,
	/// How many messages of channel history go into a transcript
	pub transcript_message_limit: u16,
}

impl Default for EngineOptions {
	fn default() -> Self {
		Self {
			channel_delete_grace: Duration::from_secs(30),
			transcript_message_limit: 100,
		}
	}
}

/// A staff or requester decision on a request
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransitionTarget {
	Approve,
	Deny,
	Close,
}

impl TransitionTarget {
	pub fn status(&self) -> RequestStatus {
		match self {
			Self::Approve => RequestStatus::Approved,
			Self::Deny => RequestStatus::Denied,
			Self::Close => RequestStatus::Closed,
		}
	}

	pub fn from_id(id: &str) -> Option<Self> {
		match id {
			"approve" => Some(Self::Approve),
			"deny" => Some(Self::Deny),
			"close" => Some(Self::Close),
			_ => None,
		}
	}
}

#[derive(Debug)]
pub enum TransitionOutcome {
	/// The request reached a terminal status.
	Finalized(Request),
	/// The request was approved by staff into its public voting phase.
	VotingOpened(Request),
}

/// A newly created request. If `degraded` is set, the request exists but has no channel.
#[derive(Debug)]
pub struct Created {
	pub request: Request,
	pub degraded: Option<ProvisioningDegraded>,
}

/// Runs requests through their lifecycle: creation, claiming, transitions, voting, and expiry.
pub struct WorkflowEngine<S, M> {
	pub(super) store: Arc<S>,
	pub(super) messenger: Arc<M>,
	provisioning: Provisioning<M>,
	options: EngineOptions,
}

fn truncate(text: &str, limit: usize) -> String {
	if text.chars().count() <= limit {
		return text.to_string();
	}
	let mut truncated: String = text.chars().take(limit.saturating_sub(1)).collect();
	truncated.push('…');
	truncated
}

/// Builds the message posted at the top of a request's channel, with the staff controls under it.
pub fn control_surface(request: &Request) -> OutgoingMessage {
	let descriptor = request.kind.descriptor();
	let mut content = format!(
		"{} **{}: {}**\nOpened by {} · Status: {}\n",
		descriptor.icon,
		request.id,
		request.title,
		request.requester_id.mention(),
		request.status
	);
	match &request.payload.data {
		PayloadEntries::Fields(fields) => {
			for field in fields.iter().filter(|field| field.id != "title" && !field.value.is_empty()) {
				content = format!("{}\n**{}**\n{}\n", content, field.label, field.value);
			}
		}
		PayloadEntries::Answers(answers) => {
			for (index, answer) in answers.iter().enumerate() {
				content = format!("{}\n**{}. {}**\n{}\n", content, index + 1, answer.question, answer.answer);
			}
		}
	}

	let mut buttons = vec![ActionButton {
		custom_id: format!("request/{}/claim", request.id),
		label: String::from("Claim"),
		kind: ButtonKind::Primary,
		disabled: false,
	}];
	if !descriptor.voting {
		buttons.push(ActionButton {
			custom_id: format!("request/{}/progress", request.id),
			label: String::from("Start work"),
			kind: ButtonKind::Secondary,
			disabled: false,
		});
	}
	if descriptor.review_flow {
		buttons.push(ActionButton {
			custom_id: format!("request/{}/approve", request.id),
			label: String::from("Approve"),
			kind: ButtonKind::Success,
			disabled: false,
		});
		buttons.push(ActionButton {
			custom_id: format!("request/{}/deny", request.id),
			label: String::from("Deny"),
			kind: ButtonKind::Danger,
			disabled: false,
		});
	}
	buttons.push(ActionButton {
		custom_id: format!("request/{}/close", request.id),
		label: String::from("Close"),
		kind: ButtonKind::Secondary,
		disabled: false,
	});

	OutgoingMessage {
		content: truncate(&content, MESSAGE_LENGTH_LIMIT),
		buttons,
	}
}

fn resolution_message(request: &Request) -> String {
	let mut content = match request.closed_by {
		Some(closed_by) => format!("🔒 This request was marked **{}** by {}.", request.status, closed_by.mention()),
		None => format!("🔒 This request was marked **{}** automatically.", request.status),
	};
	if let Some(reason) = &request.close_reason {
		content = format!("{}\nReason: {}", content, reason);
	}
	content
}

impl<S: RequestStore, M: Messenger> WorkflowEngine<S, M> {
	pub fn new(store: Arc<S>, messenger: Arc<M>, options: EngineOptions, shutdown: watch::Receiver<bool>) -> Self {
		let provisioning = Provisioning::new(Arc::clone(&messenger), options.channel_delete_grace, shutdown);
		Self {
			store,
			messenger,
			provisioning,
			options,
		}
	}

	pub fn store(&self) -> &S {
		&self.store
	}

	/// Gets the guild's settings, or the disabled defaults if the guild never configured requests.
	pub async fn settings_or_default(&self, guild_id: Id<GuildMarker>) -> Result<GuildRequestSettings, WorkflowError> {
		let settings = self.store.guild_settings(guild_id).await?;
		Ok(settings.unwrap_or_else(|| GuildRequestSettings::new(guild_id)))
	}

	pub async fn request(&self, guild_id: Id<GuildMarker>, request_id: &str) -> Result<Request, WorkflowError> {
		self.store.request(guild_id, request_id).await?.ok_or(WorkflowError::NotFound)
	}

	/// Finds the request that owns a channel.
	pub async fn request_in_channel(&self, channel_id: Id<ChannelMarker>) -> Result<Request, WorkflowError> {
		self.store
			.request_by_channel(channel_id)
			.await?
			.ok_or(WorkflowError::NotFound)
	}

	/// Applies a change to the guild's settings and saves them.
	pub async fn update_settings(
		&self,
		guild_id: Id<GuildMarker>,
		change: impl FnOnce(&mut GuildRequestSettings),
	) -> Result<GuildRequestSettings, WorkflowError> {
		let mut settings = self.settings_or_default(guild_id).await?;
		change(&mut settings);
		self.store.save_guild_settings(&settings).await?;
		tracing::info!(guild = %guild_id, "Updated request settings");
		Ok(settings)
	}

	/// Checks whether a member could open a request of the given kind right now, so they aren't asked to fill out a
	/// form that [WorkflowEngine::create] would reject.
	pub async fn check_can_open(
		&self,
		guild_id: Id<GuildMarker>,
		requester_id: Id<UserMarker>,
		kind: RequestKind,
	) -> Result<(), WorkflowError> {
		let settings = self.settings_or_default(guild_id).await?;
		if !settings.enabled {
			return Err(WorkflowError::Disabled);
		}
		if let Some(family) = kind.descriptor().exclusive_family
			&& let Some(existing) = self.active_in_family(guild_id, requester_id, family).await?
		{
			return Err(WorkflowError::DuplicateActiveRequest {
				existing_id: existing.id,
			});
		}
		Ok(())
	}

	/// Applies `mutate` to the stored request and writes it back, retrying from a fresh read if another write got
	/// there first. An error from `mutate` aborts without writing.
	pub(super) async fn write_request<T>(
		&self,
		guild_id: Id<GuildMarker>,
		request_id: &str,
		now: DateTime<Utc>,
		mut mutate: impl FnMut(&mut Request) -> Result<T, WorkflowError> + Send,
	) -> Result<(T, Request), WorkflowError>
	where
		T: Send,
	{
		for _ in 0..MAX_WRITE_ATTEMPTS {
			let current = self.request(guild_id, request_id).await?;
			let mut updated = current.clone();
			let value = mutate(&mut updated)?;
			updated.revision = current.revision + 1;
			updated.updated_at = now;
			if self.store.update_request(&current, &updated).await? {
				return Ok((value, updated));
			}
			tracing::debug!(request = %request_id, "Request changed during write; retrying");
		}
		Err(WorkflowError::Conflict)
	}

	async fn active_in_family(
		&self,
		guild_id: Id<GuildMarker>,
		requester_id: Id<UserMarker>,
		family: Family,
	) -> Result<Option<Request>, WorkflowError> {
		let filter = RequestFilter {
			guild_id: Some(guild_id),
			requester_id: Some(requester_id),
			kinds: family.kinds(),
			..Default::default()
		};
		let requests = self.store.query_requests(&filter).await?;
		Ok(requests.into_iter().find(|request| !request.is_terminal()))
	}

	/// Creates a request from a submitted form and provisions its channel.
	///
	/// A failure to provision the channel doesn't fail the creation; the request is kept and the failure is returned
	/// in [Created::degraded].
	pub async fn create(
		&self,
		guild_id: Id<GuildMarker>,
		requester_id: Id<UserMarker>,
		kind: RequestKind,
		title: String,
		payload: RequestPayload,
		now: DateTime<Utc>,
	) -> Result<Created, WorkflowError> {
		let settings = match self.store.guild_settings(guild_id).await? {
			Some(settings) if settings.enabled => settings,
			_ => return Err(WorkflowError::Disabled),
		};
		let descriptor = kind.descriptor();
		if let Some(family) = descriptor.exclusive_family
			&& let Some(existing) = self.active_in_family(guild_id, requester_id, family).await?
		{
			return Err(WorkflowError::DuplicateActiveRequest {
				existing_id: existing.id,
			});
		}

		let sequence = self.store.next_sequence(guild_id, descriptor.id_prefix).await?;
		let mut request = Request {
			id: Request::format_id(descriptor.id_prefix, sequence),
			guild_id,
			channel_id: None,
			public_message_id: None,
			requester_id,
			kind,
			title,
			status: descriptor.initial_status,
			payload,
			claimed_by: None,
			created_at: now,
			updated_at: now,
			closed_at: None,
			closed_by: None,
			close_reason: None,
			revision: 0,
		};
		match self.store.insert_request(&request, descriptor.exclusive_family).await? {
			InsertOutcome::Inserted => (),
			InsertOutcome::ActiveInFamily { existing_id } => {
				return Err(WorkflowError::DuplicateActiveRequest { existing_id });
			}
		}
		tracing::info!(request = %request.id, guild = %guild_id, requester = %requester_id, "Created request");

		let degraded = match self.provisioning.open(&request, &settings).await {
			Ok(channel_id) => {
				let result = self
					.write_request(guild_id, &request.id, now, |request| {
						request.channel_id = Some(channel_id);
						Ok(())
					})
					.await;
				match result {
					Ok(((), updated)) => request = updated,
					Err(error) => {
						tracing::error!(source = ?error, request = %request.id, "Failed to record request channel")
					}
				}
				if let Err(error) = self.messenger.send_message(channel_id, &control_surface(&request)).await {
					tracing::warn!(source = ?error, request = %request.id, "Failed to post request controls");
				}
				None
			}
			Err(error) => {
				tracing::warn!(source = ?error, request = %request.id, "Request created without a channel");
				Some(error)
			}
		};

		Ok(Created { request, degraded })
	}

	/// Posts a notice in the request's channel, if it has one.
	async fn post_update(&self, request: &Request, content: String) {
		let Some(channel_id) = request.channel_id else {
			return;
		};
		if let Err(error) = self
			.messenger
			.send_message(channel_id, &OutgoingMessage::text(content))
			.await
		{
			tracing::warn!(source = ?error, request = %request.id, "Failed to post request update");
		}
	}

	/// Assigns a staff member to a request. Claiming a request already claimed by the same staff member does nothing.
	pub async fn claim(
		&self,
		guild_id: Id<GuildMarker>,
		request_id: &str,
		actor: &Actor,
		now: DateTime<Utc>,
	) -> Result<Request, WorkflowError> {
		let settings = self.settings_or_default(guild_id).await?;
		let current = self.request(guild_id, request_id).await?;
		if !actor.is_staff_for(&settings, current.kind) {
			return Err(WorkflowError::Forbidden);
		}
		if current.claimed_by == Some(actor.user_id) && !current.is_terminal() {
			return Ok(current);
		}

		let ((), request) = self
			.write_request(guild_id, request_id, now, |request| {
				if request.is_terminal() {
					return Err(WorkflowError::InvalidTransition {
						from: request.status,
						to: request.status,
					});
				}
				match request.claimed_by {
					Some(by) if by != actor.user_id => Err(WorkflowError::AlreadyClaimed { by }),
					_ => {
						request.claimed_by = Some(actor.user_id);
						Ok(())
					}
				}
			})
			.await?;
		tracing::info!(request = %request.id, staff = %actor.user_id, "Request claimed");
		self.post_update(&request, format!("🙋 {} claimed this request.", actor.user_id.mention()))
			.await;
		Ok(request)
	}

	/// Marks a request as being worked on.
	pub async fn start_progress(
		&self,
		guild_id: Id<GuildMarker>,
		request_id: &str,
		actor: &Actor,
		now: DateTime<Utc>,
	) -> Result<Request, WorkflowError> {
		let settings = self.settings_or_default(guild_id).await?;
		let current = self.request(guild_id, request_id).await?;
		if !actor.is_staff_for(&settings, current.kind) {
			return Err(WorkflowError::Forbidden);
		}

		let ((), request) = self
			.write_request(guild_id, request_id, now, |request| {
				// Voting kinds move on through their public vote, never through staff work.
				if request.kind.descriptor().voting || !request.status.can_move_to(RequestStatus::InProgress) {
					return Err(WorkflowError::InvalidTransition {
						from: request.status,
						to: RequestStatus::InProgress,
					});
				}
				request.status = RequestStatus::InProgress;
				if request.claimed_by.is_none() {
					request.claimed_by = Some(actor.user_id);
				}
				Ok(())
			})
			.await?;
		self.post_update(
			&request,
			format!("🛠️ {} started working on this request.", actor.user_id.mention()),
		)
		.await;
		Ok(request)
	}

	/// Approves, denies, or closes a request.
	///
	/// Staff approving a request of a voting kind that is still pending opens its public voting phase instead of
	/// resolving it. Every other accepted transition is terminal and runs the resolution side effects.
	pub async fn transition(
		&self,
		guild_id: Id<GuildMarker>,
		request_id: &str,
		target: TransitionTarget,
		actor: &Actor,
		reason: Option<String>,
		now: DateTime<Utc>,
	) -> Result<TransitionOutcome, WorkflowError> {
		let settings = self.settings_or_default(guild_id).await?;
		let current = self.request(guild_id, request_id).await?;
		let descriptor = current.kind.descriptor();
		let is_staff = actor.is_staff_for(&settings, current.kind);
		let allowed = match target {
			TransitionTarget::Close => is_staff || actor.user_id == current.requester_id,
			TransitionTarget::Approve | TransitionTarget::Deny => is_staff,
		};
		if !allowed {
			return Err(WorkflowError::Forbidden);
		}
		let approves_into_vote = target == TransitionTarget::Approve && descriptor.voting;
		let opens_vote = approves_into_vote && current.status == RequestStatus::Pending;
		let reposts_vote =
			approves_into_vote && current.status == RequestStatus::Open && current.public_message_id.is_none();
		if (opens_vote || reposts_vote) && settings.voting_channel.is_none() {
			return Err(WorkflowError::NotConfigured("voting channel"));
		}
		if reposts_vote {
			tracing::info!(request = %current.id, staff = %actor.user_id, "Retrying public vote message");
			self.open_public_vote(&settings, &current, now).await?;
			let request = self.request(guild_id, request_id).await?;
			return Ok(TransitionOutcome::VotingOpened(request));
		}

		let (voting_opened, request) = self
			.write_request(guild_id, request_id, now, |request| {
				let target_status = target.status();
				if target != TransitionTarget::Close && !descriptor.review_flow {
					return Err(WorkflowError::InvalidTransition {
						from: request.status,
						to: target_status,
					});
				}
				if target == TransitionTarget::Approve && descriptor.voting && request.status == RequestStatus::Pending {
					request.status = RequestStatus::Open;
					return Ok(true);
				}
				if !request.status.can_move_to(target_status) {
					return Err(WorkflowError::InvalidTransition {
						from: request.status,
						to: target_status,
					});
				}
				request.status = target_status;
				request.closed_at = Some(now);
				request.closed_by = Some(actor.user_id);
				request.close_reason = reason.clone();
				Ok(false)
			})
			.await?;

		if voting_opened {
			tracing::info!(request = %request.id, staff = %actor.user_id, "Request opened for community voting");
			self.open_public_vote(&settings, &request, now).await?;
			self.post_update(
				&request,
				format!("🗳️ {} approved this request for community voting.", actor.user_id.mention()),
			)
			.await;
			let request = self.request(guild_id, request_id).await?;
			return Ok(TransitionOutcome::VotingOpened(request));
		}

		tracing::info!(request = %request.id, status = %request.status, actor = %actor.user_id, "Request resolved");
		self.finalize(&settings, &request).await;
		Ok(TransitionOutcome::Finalized(request))
	}

	/// Expires every voting request left open past its guild's expiry window. Returns how many were expired.
	pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, WorkflowError> {
		let voting_kinds: Vec<RequestKind> = RequestKind::all()
			.into_iter()
			.filter(|kind| kind.descriptor().voting)
			.collect();
		let mut expired = 0;

		for settings in self.store.all_guild_settings().await? {
			if settings.expire_days == 0 {
				continue;
			}
			let cutoff = now - TimeDelta::days(i64::from(settings.expire_days));
			let filter = RequestFilter {
				guild_id: Some(settings.guild_id),
				kinds: voting_kinds.clone(),
				statuses: vec![RequestStatus::Open],
				created_before: Some(cutoff),
				..Default::default()
			};
			let candidates = match self.store.query_requests(&filter).await {
				Ok(candidates) => candidates,
				Err(error) => {
					tracing::error!(source = ?error, guild = %settings.guild_id, "Failed to find expired requests");
					continue;
				}
			};

			for candidate in candidates {
				let result = self
					.write_request(settings.guild_id, &candidate.id, now, |request| {
						if request.status != RequestStatus::Open || request.created_at >= cutoff {
							return Err(WorkflowError::InvalidTransition {
								from: request.status,
								to: RequestStatus::Expired,
							});
						}
						request.status = RequestStatus::Expired;
						request.closed_at = Some(now);
						request.closed_by = None;
						request.close_reason = Some(format!("No decision within {} days", settings.expire_days));
						Ok(())
					})
					.await;
				match result {
					Ok(((), request)) => {
						tracing::info!(request = %request.id, guild = %settings.guild_id, "Request expired");
						expired += 1;
						self.finalize(&settings, &request).await;
					}
					Err(error) => {
						tracing::debug!(source = ?error, request = %candidate.id, "Skipped expiring request")
					}
				}
			}
		}

		Ok(expired)
	}

	/// Runs the side effects of a request reaching a terminal status. Every step is best-effort; failures are logged
	/// and never undo the transition.
	pub(super) async fn finalize(&self, settings: &GuildRequestSettings, request: &Request) {
		self.post_update(request, resolution_message(request)).await;

		match self.deliver_transcript(settings, request).await {
			Ok(()) => (),
			Err(TranscriptDeliveryFailure::NoDestination) => {
				tracing::debug!(request = %request.id, "No transcript channel configured")
			}
			Err(error) => tracing::warn!(source = ?error, request = %request.id, "Failed to deliver transcript"),
		}

		self.notify_requester(request).await;

		if request.kind.descriptor().voting {
			self.refresh_vote_post(settings, request).await;
			if request.status == RequestStatus::Approved {
				self.post_showcase(settings, request).await;
			}
		}

		if let Some(channel_id) = request.channel_id {
			if let Err(error) = self.provisioning.revoke(request).await {
				tracing::warn!(source = ?error, request = %request.id, "Failed to revoke requester channel access");
			}
			self.provisioning.schedule_teardown(channel_id);
		}
	}

	/// Renders the request's transcript and uploads it to the guild's transcript channel.
	pub async fn deliver_transcript(
		&self,
		settings: &GuildRequestSettings,
		request: &Request,
	) -> Result<(), TranscriptDeliveryFailure> {
		let Some(transcript_channel) = settings.transcript_channel else {
			return Err(TranscriptDeliveryFailure::NoDestination);
		};
		let history = match request.channel_id {
			Some(channel_id) => self
				.messenger
				.fetch_recent_messages(channel_id, self.options.transcript_message_limit)
				.await
				.map_err(TranscriptDeliveryFailure::History)?,
			None => Vec::new(),
		};
		let document = transcript::render(request, &history);
		let caption = format!(
			"📄 Transcript for **{}** ({}), {}",
			request.id,
			request.kind.descriptor().display_name,
			request.status
		);
		self.messenger
			.send_document(
				transcript_channel,
				&format!("transcript-{}.html", request.id),
				document.into_bytes(),
				&caption,
			)
			.await
			.map_err(TranscriptDeliveryFailure::Upload)
	}

	async fn notify_requester(&self, request: &Request) {
		let descriptor = request.kind.descriptor();
		let mut content = format!(
			"Your {} **{}** ({}) was marked **{}**.",
			descriptor.display_name, request.id, request.title, request.status
		);
		if let Some(reason) = &request.close_reason {
			content = format!("{}\nReason: {}", content, reason);
		}
		if let Err(error) = self
			.messenger
			.send_direct_message(request.requester_id, &truncate(&content, MESSAGE_LENGTH_LIMIT))
			.await
		{
			tracing::debug!(source = ?error, request = %request.id, "Couldn't message requester");
		}
	}
}
