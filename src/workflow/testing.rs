// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory collaborators for exercising the workflow without Discord or a database.

use super::engine::{EngineOptions, TransitionOutcome, TransitionTarget, WorkflowEngine};
use super::error::{PlatformError, StoreError};
use super::kind::{Family, FormSchema, RequestKind};
use super::platform::{AccessEntry, AccessLevel, AccessSubject, HistoryMessage, Messenger, OutgoingMessage};
use super::request::{FieldAnswer, QuestionAnswer, Request, RequestPayload, RequestStatus};
use super::settings::{Actor, GuildRequestSettings};
use super::store::{InsertOutcome, RequestFilter, RequestStore};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, RoleMarker, UserMarker};

pub const STAFF_ROLE: Id<RoleMarker> = Id::new(50);
const BOT_USER: Id<UserMarker> = Id::new(1);

#[derive(Default)]
struct MemoryState {
	settings: HashMap<Id<GuildMarker>, GuildRequestSettings>,
	sequences: HashMap<(Id<GuildMarker>, String), u32>,
	requests: Vec<Request>,
}

#[derive(Default)]
pub struct MemoryStore {
	state: Mutex<MemoryState>,
	rejected_updates: AtomicUsize,
}

impl MemoryStore {
	pub fn put_settings(&self, settings: GuildRequestSettings) {
		self.state.lock().unwrap().settings.insert(settings.guild_id, settings);
	}

	/// Makes the next `count` conditional updates report that they lost the race.
	pub fn reject_updates(&self, count: usize) {
		self.rejected_updates.store(count, Ordering::SeqCst);
	}
}

#[async_trait]
impl RequestStore for MemoryStore {
	async fn guild_settings(&self, guild_id: Id<GuildMarker>) -> Result<Option<GuildRequestSettings>, StoreError> {
		Ok(self.state.lock().unwrap().settings.get(&guild_id).cloned())
	}

	async fn save_guild_settings(&self, settings: &GuildRequestSettings) -> Result<(), StoreError> {
		self.put_settings(settings.clone());
		Ok(())
	}

	async fn all_guild_settings(&self) -> Result<Vec<GuildRequestSettings>, StoreError> {
		Ok(self.state.lock().unwrap().settings.values().cloned().collect())
	}

	async fn next_sequence(&self, guild_id: Id<GuildMarker>, prefix: &str) -> Result<u32, StoreError> {
		let mut state = self.state.lock().unwrap();
		let sequence = state.sequences.entry((guild_id, prefix.to_string())).or_insert(0);
		*sequence += 1;
		Ok(*sequence)
	}

	async fn insert_request(&self, request: &Request, family: Option<Family>) -> Result<InsertOutcome, StoreError> {
		let mut state = self.state.lock().unwrap();
		if let Some(family) = family {
			let existing = state.requests.iter().find(|existing| {
				existing.guild_id == request.guild_id
					&& existing.requester_id == request.requester_id
					&& existing.kind.descriptor().exclusive_family == Some(family)
					&& !existing.is_terminal()
			});
			if let Some(existing) = existing {
				return Ok(InsertOutcome::ActiveInFamily {
					existing_id: existing.id.clone(),
				});
			}
		}
		state.requests.push(request.clone());
		Ok(InsertOutcome::Inserted)
	}

	async fn request(&self, guild_id: Id<GuildMarker>, id: &str) -> Result<Option<Request>, StoreError> {
		let state = self.state.lock().unwrap();
		Ok(state
			.requests
			.iter()
			.find(|request| request.guild_id == guild_id && request.id == id)
			.cloned())
	}

	async fn request_by_channel(&self, channel_id: Id<ChannelMarker>) -> Result<Option<Request>, StoreError> {
		let state = self.state.lock().unwrap();
		Ok(state
			.requests
			.iter()
			.find(|request| request.channel_id == Some(channel_id))
			.cloned())
	}

	async fn query_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError> {
		let state = self.state.lock().unwrap();
		Ok(state
			.requests
			.iter()
			.filter(|request| filter.matches(request))
			.cloned()
			.collect())
	}

	async fn update_request(&self, current: &Request, updated: &Request) -> Result<bool, StoreError> {
		let rejected = self
			.rejected_updates
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| count.checked_sub(1));
		if rejected.is_ok() {
			return Ok(false);
		}
		let mut state = self.state.lock().unwrap();
		let stored = state
			.requests
			.iter_mut()
			.find(|request| request.guild_id == current.guild_id && request.id == current.id);
		match stored {
			Some(stored) if stored.status == current.status && stored.revision == current.revision => {
				*stored = updated.clone();
				Ok(true)
			}
			_ => Ok(false),
		}
	}
}

/// A call made to the messaging platform
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PlatformCall {
	CreateChannel(String, Id<ChannelMarker>),
	EditAccess(Id<ChannelMarker>, AccessSubject, AccessLevel),
	DeleteChannel(Id<ChannelMarker>),
	SendMessage(Id<ChannelMarker>),
	EditMessage(Id<MessageMarker>),
	DirectMessage(Id<UserMarker>),
	SendDocument(Id<ChannelMarker>, String),
	FetchHistory(Id<ChannelMarker>),
}

#[derive(Default)]
pub struct RecordingMessenger {
	calls: Mutex<Vec<PlatformCall>>,
	sent: Mutex<Vec<(Id<ChannelMarker>, Id<MessageMarker>, OutgoingMessage)>>,
	edits: Mutex<Vec<(Id<MessageMarker>, OutgoingMessage)>>,
	documents: Mutex<HashMap<String, String>>,
	next_id: AtomicU64,
	fail_channel_creation: AtomicBool,
	unreachable_channel: Mutex<Option<Id<ChannelMarker>>>,
}

impl RecordingMessenger {
	fn record(&self, call: PlatformCall) {
		self.calls.lock().unwrap().push(call);
	}

	fn next_id(&self) -> u64 {
		self.next_id.fetch_add(1, Ordering::SeqCst) + 1000
	}

	pub fn calls(&self) -> Vec<PlatformCall> {
		self.calls.lock().unwrap().clone()
	}

	pub fn fail_channel_creation(&self) {
		self.fail_channel_creation.store(true, Ordering::SeqCst);
	}

	/// Makes every message sent to the channel fail until [RecordingMessenger::restore_channel] is called.
	pub fn fail_messages_to(&self, channel_id: Id<ChannelMarker>) {
		*self.unreachable_channel.lock().unwrap() = Some(channel_id);
	}

	pub fn restore_channel(&self) {
		*self.unreachable_channel.lock().unwrap() = None;
	}

	pub fn messages_to(&self, channel_id: Id<ChannelMarker>) -> Vec<OutgoingMessage> {
		self.sent
			.lock()
			.unwrap()
			.iter()
			.filter(|(channel, _, _)| *channel == channel_id)
			.map(|(_, _, message)| message.clone())
			.collect()
	}

	pub fn last_edit_of(&self, message_id: Id<MessageMarker>) -> Option<OutgoingMessage> {
		self.edits
			.lock()
			.unwrap()
			.iter()
			.rev()
			.find(|(message, _)| *message == message_id)
			.map(|(_, message)| message.clone())
	}

	pub fn document(&self, file_name: &str) -> Option<String> {
		self.documents.lock().unwrap().get(file_name).cloned()
	}
}

#[async_trait]
impl Messenger for RecordingMessenger {
	async fn create_channel(
		&self,
		_guild_id: Id<GuildMarker>,
		name: &str,
		parent_id: Id<ChannelMarker>,
		_access: &[AccessEntry],
	) -> Result<Id<ChannelMarker>, PlatformError> {
		self.record(PlatformCall::CreateChannel(name.to_string(), parent_id));
		if self.fail_channel_creation.load(Ordering::SeqCst) {
			return Err(PlatformError(String::from("Missing Permissions")));
		}
		Ok(Id::new(self.next_id()))
	}

	async fn edit_access(&self, channel_id: Id<ChannelMarker>, entry: AccessEntry) -> Result<(), PlatformError> {
		self.record(PlatformCall::EditAccess(channel_id, entry.subject, entry.level));
		Ok(())
	}

	async fn delete_channel(&self, channel_id: Id<ChannelMarker>) -> Result<(), PlatformError> {
		self.record(PlatformCall::DeleteChannel(channel_id));
		Ok(())
	}

	async fn send_message(
		&self,
		channel_id: Id<ChannelMarker>,
		message: &OutgoingMessage,
	) -> Result<Id<MessageMarker>, PlatformError> {
		self.record(PlatformCall::SendMessage(channel_id));
		if *self.unreachable_channel.lock().unwrap() == Some(channel_id) {
			return Err(PlatformError(String::from("Missing Access")));
		}
		let message_id = Id::new(self.next_id());
		self.sent.lock().unwrap().push((channel_id, message_id, message.clone()));
		Ok(message_id)
	}

	async fn edit_message(
		&self,
		_channel_id: Id<ChannelMarker>,
		message_id: Id<MessageMarker>,
		message: &OutgoingMessage,
	) -> Result<(), PlatformError> {
		self.record(PlatformCall::EditMessage(message_id));
		self.edits.lock().unwrap().push((message_id, message.clone()));
		Ok(())
	}

	async fn send_direct_message(&self, user_id: Id<UserMarker>, _content: &str) -> Result<(), PlatformError> {
		self.record(PlatformCall::DirectMessage(user_id));
		Ok(())
	}

	async fn send_document(
		&self,
		channel_id: Id<ChannelMarker>,
		file_name: &str,
		document: Vec<u8>,
		_caption: &str,
	) -> Result<(), PlatformError> {
		self.record(PlatformCall::SendDocument(channel_id, file_name.to_string()));
		self.documents
			.lock()
			.unwrap()
			.insert(file_name.to_string(), String::from_utf8_lossy(&document).into_owned());
		Ok(())
	}

	async fn fetch_recent_messages(
		&self,
		channel_id: Id<ChannelMarker>,
		limit: u16,
	) -> Result<Vec<HistoryMessage>, PlatformError> {
		self.record(PlatformCall::FetchHistory(channel_id));
		let messages = self.messages_to(channel_id);
		let skip = messages.len().saturating_sub(usize::from(limit));
		Ok(messages
			.into_iter()
			.skip(skip)
			.map(|message| HistoryMessage {
				author_id: BOT_USER,
				author_name: String::from("Requests"),
				content: message.content,
				sent_at: Utc::now(),
				attachments: Vec::new(),
			})
			.collect())
	}
}

/// A request as it would look right after creation, with requester 2 in guild 1.
pub fn sample_request(kind: RequestKind, id: &str) -> Request {
	let now = Utc::now();
	Request {
		id: id.to_string(),
		guild_id: Id::new(1),
		channel_id: Some(Id::new(900)),
		public_message_id: None,
		requester_id: Id::new(2),
		kind,
		title: String::from("Sample request"),
		status: kind.descriptor().initial_status,
		payload: RequestPayload::fields(Vec::new()),
		claimed_by: None,
		created_at: now,
		updated_at: now,
		closed_at: None,
		closed_by: None,
		close_reason: None,
		revision: 0,
	}
}

pub fn bug_payload(title: &str) -> RequestPayload {
	RequestPayload::fields(vec![
		FieldAnswer {
			id: String::from("title"),
			label: String::from("Summary"),
			value: title.to_string(),
		},
		FieldAnswer {
			id: String::from("steps"),
			label: String::from("Steps to reproduce"),
			value: String::from("Open the app and log in"),
		},
	])
}

/// A member holding the guild-wide staff role.
pub fn staff(user_id: u64) -> Actor {
	Actor::new(Id::new(user_id), vec![STAFF_ROLE], false)
}

/// An engine wired to in-memory collaborators, with a fully configured guild.
pub struct Harness {
	pub engine: WorkflowEngine<MemoryStore, RecordingMessenger>,
	pub store: Arc<MemoryStore>,
	pub messenger: Arc<RecordingMessenger>,
	pub guild_id: Id<GuildMarker>,
	pub transcript_channel: Id<ChannelMarker>,
	pub voting_channel: Id<ChannelMarker>,
	pub showcase_channel: Id<ChannelMarker>,
	_shutdown: watch::Sender<bool>,
}

impl Harness {
	pub fn new(configure: impl FnOnce(&mut GuildRequestSettings)) -> Self {
		let guild_id = Id::new(1);
		let transcript_channel = Id::new(800);
		let voting_channel = Id::new(801);
		let showcase_channel = Id::new(802);

		let mut settings = GuildRequestSettings::new(guild_id);
		settings.enabled = true;
		settings.staff_roles = vec![STAFF_ROLE];
		settings.categories = RequestKind::all().into_iter().map(|kind| (kind, Id::new(700))).collect();
		settings.transcript_channel = Some(transcript_channel);
		settings.voting_channel = Some(voting_channel);
		settings.showcase_channel = Some(showcase_channel);
		configure(&mut settings);

		let store = Arc::new(MemoryStore::default());
		store.put_settings(settings);
		let messenger = Arc::new(RecordingMessenger::default());
		let (shutdown_sender, shutdown) = watch::channel(false);
		let options = EngineOptions {
			channel_delete_grace: Duration::from_secs(30),
			transcript_message_limit: 100,
		};
		let engine = WorkflowEngine::new(Arc::clone(&store), Arc::clone(&messenger), options, shutdown);

		Self {
			engine,
			store,
			messenger,
			guild_id,
			transcript_channel,
			voting_channel,
			showcase_channel,
			_shutdown: shutdown_sender,
		}
	}

	pub fn stored(&self, id: &str) -> Request {
		let state = self.store.state.lock().unwrap();
		state
			.requests
			.iter()
			.find(|request| request.id == id)
			.cloned()
			.unwrap_or_else(|| panic!("request {} isn't stored", id))
	}

	pub fn request_count(&self) -> usize {
		self.store.state.lock().unwrap().requests.len()
	}

	/// Moves a stored request's creation time into the past.
	pub fn backdate(&self, id: &str, age: TimeDelta) {
		let mut state = self.store.state.lock().unwrap();
		for request in state.requests.iter_mut().filter(|request| request.id == id) {
			request.created_at = Utc::now() - age;
		}
	}

	async fn create(&self, kind: RequestKind, requester: Id<UserMarker>, title: &str, payload: RequestPayload) -> Request {
		self.engine
			.create(self.guild_id, requester, kind, title.to_string(), payload, Utc::now())
			.await
			.unwrap()
			.request
	}

	pub async fn create_bug(&self, requester: Id<UserMarker>) -> Request {
		self.create(RequestKind::Bug, requester, "Crash on login", bug_payload("Crash on login"))
			.await
	}

	pub async fn create_suggestion(&self, requester: Id<UserMarker>) -> Request {
		let payload = RequestPayload::fields(vec![
			FieldAnswer {
				id: String::from("title"),
				label: String::from("Title"),
				value: String::from("Add a music channel"),
			},
			FieldAnswer {
				id: String::from("description"),
				label: String::from("Describe your idea"),
				value: String::from("A channel for sharing playlists"),
			},
		]);
		self.create(RequestKind::Suggestion, requester, "Add a music channel", payload)
			.await
	}

	pub async fn create_application(&self, kind: RequestKind, requester: Id<UserMarker>) -> Request {
		let FormSchema::MultiPage(questions) = kind.descriptor().schema else {
			panic!("{} isn't an application", kind.as_id());
		};
		let answers = questions
			.iter()
			.map(|question| QuestionAnswer {
				question: question.to_string(),
				answer: String::from("An answer"),
			})
			.collect();
		self.create(kind, requester, kind.descriptor().display_name, RequestPayload::answers(answers))
			.await
	}
}

/// Creates a suggestion and has staff approve it into its public voting phase.
pub async fn suggestion_in_voting(harness: &Harness) -> Request {
	let created = harness.create_suggestion(Id::new(2)).await;
	assert_eq!(created.status, RequestStatus::Pending);
	let outcome = harness
		.engine
		.transition(
			harness.guild_id,
			&created.id,
			TransitionTarget::Approve,
			&staff(10),
			None,
			Utc::now(),
		)
		.await
		.unwrap();
	match outcome {
		TransitionOutcome::VotingOpened(request) => request,
		TransitionOutcome::Finalized(request) => panic!("{} was resolved instead of opened for voting", request.id),
	}
}
