// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::error::WorkflowError;
use super::kind::{FieldSpec, FormSchema, RequestKind};
use super::request::{FieldAnswer, QuestionAnswer, RequestPayload};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use twilight_model::id::Id;
use twilight_model::id::marker::{GuildMarker, UserMarker};

/// Number of questions shown on each page of a multi-page form
pub const PAGE_SIZE: usize = 5;

pub fn page_count(question_count: usize) -> usize {
	question_count.div_ceil(PAGE_SIZE)
}

/// The absolute question indices shown on a page.
pub fn page_range(question_count: usize, page: usize) -> Range<usize> {
	let start = (page * PAGE_SIZE).min(question_count);
	let end = (start + PAGE_SIZE).min(question_count);
	start..end
}

fn questions_for(kind: RequestKind) -> &'static [&'static str] {
	match kind.descriptor().schema {
		FormSchema::MultiPage(questions) => questions,
		FormSchema::SinglePage(_) => &[],
	}
}

/// Builds the payload for a single-page form from submitted values keyed by field ID.
///
/// Returns the request title (the `title` field) alongside the payload.
pub fn single_page_payload(fields: &[FieldSpec], values: &HashMap<String, String>) -> (String, RequestPayload) {
	let answers: Vec<FieldAnswer> = fields
		.iter()
		.map(|field| FieldAnswer {
			id: field.id.to_string(),
			label: field.label.to_string(),
			value: values.get(field.id).map(|value| value.trim().to_string()).unwrap_or_default(),
		})
		.collect();
	let title = answers
		.iter()
		.find(|answer| answer.id == "title")
		.map(|answer| answer.value.clone())
		.unwrap_or_default();
	(title, RequestPayload::fields(answers))
}

/// How long sessions live and how many can exist at once
#[derive(Clone, Copy, Debug)]
pub struct SessionPolicy {
	/// Sessions untouched for this long are discarded. `None` keeps them until they're completed or replaced.
	pub ttl: Option<TimeDelta>,
	/// When full, starting a new session evicts the least recently touched one.
	pub max_sessions: usize,
}

impl Default for SessionPolicy {
	fn default() -> Self {
		Self {
			ttl: Some(TimeDelta::minutes(30)),
			max_sessions: 1000,
		}
	}
}

/// A user's in-progress multi-page form
#[derive(Debug)]
pub struct PendingFormSession {
	pub kind: RequestKind,
	pub guild_id: Id<GuildMarker>,
	answers: BTreeMap<usize, String>,
	pub current_page: usize,
	last_touched: DateTime<Utc>,
}

/// A fully answered multi-page form
#[derive(Debug)]
pub struct CompletedForm {
	pub kind: RequestKind,
	pub guild_id: Id<GuildMarker>,
	pub answers: Vec<QuestionAnswer>,
}

impl CompletedForm {
	pub fn into_payload(self) -> RequestPayload {
		RequestPayload::answers(self.answers)
	}
}

#[derive(Debug)]
pub enum PageOutcome {
	/// More pages remain; the user should be offered a way to continue.
	Continue { next_page: usize, page_count: usize },
	Complete(CompletedForm),
}

/// The page a user should be shown next
#[derive(Debug)]
pub struct FormPage {
	pub kind: RequestKind,
	pub page: usize,
	pub page_count: usize,
	pub first_question: usize,
	pub questions: &'static [&'static str],
}

/// All in-progress multi-page forms, keyed by the user filling them out
#[derive(Debug, Default)]
pub struct FormSessions {
	sessions: HashMap<Id<UserMarker>, PendingFormSession>,
	policy: SessionPolicy,
}

impl FormSessions {
	pub fn new(policy: SessionPolicy) -> Self {
		Self {
			sessions: HashMap::new(),
			policy,
		}
	}

	pub fn len(&self) -> usize {
		self.sessions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.is_empty()
	}

	fn is_expired(&self, session: &PendingFormSession, now: DateTime<Utc>) -> bool {
		match self.policy.ttl {
			Some(ttl) => session.last_touched + ttl <= now,
			None => false,
		}
	}

	/// Starts a new session for the user, replacing any session they already had.
	pub fn start(&mut self, user_id: Id<UserMarker>, kind: RequestKind, guild_id: Id<GuildMarker>, now: DateTime<Utc>) {
		self.reap(now);
		if !self.sessions.contains_key(&user_id) && self.sessions.len() >= self.policy.max_sessions {
			let oldest = self
				.sessions
				.iter()
				.min_by_key(|(_, session)| session.last_touched)
				.map(|(user_id, _)| *user_id);
			if let Some(oldest) = oldest {
				tracing::debug!(user = %oldest, "Evicting oldest form session");
				self.sessions.remove(&oldest);
			}
		}
		let session = PendingFormSession {
			kind,
			guild_id,
			answers: BTreeMap::new(),
			current_page: 0,
			last_touched: now,
		};
		self.sessions.insert(user_id, session);
	}

	fn live_session(&mut self, user_id: Id<UserMarker>, now: DateTime<Utc>) -> Option<&mut PendingFormSession> {
		let expired = self
			.sessions
			.get(&user_id)
			.is_some_and(|session| self.is_expired(session, now));
		if expired {
			self.sessions.remove(&user_id);
			return None;
		}
		self.sessions.get_mut(&user_id)
	}

	/// Gets the page the user is currently on.
	pub fn current_page(&mut self, user_id: Id<UserMarker>, now: DateTime<Utc>) -> Result<FormPage, WorkflowError> {
		let Some(session) = self.live_session(user_id, now) else {
			return Err(WorkflowError::SessionExpired);
		};
		let questions = questions_for(session.kind);
		let range = page_range(questions.len(), session.current_page);
		Ok(FormPage {
			kind: session.kind,
			page: session.current_page,
			page_count: page_count(questions.len()),
			first_question: range.start,
			questions: &questions[range],
		})
	}

	/// Records the answers to one page. Each answer is paired with the absolute index of its question; questions
	/// left out are stored as blank.
	///
	/// Submitting a page the session isn't on (such as a stale form from an earlier attempt), or answers to questions
	/// that aren't on the page, fails with [WorkflowError::SessionExpired]. The session is removed once the final
	/// page is submitted.
	pub fn submit_page(
		&mut self,
		user_id: Id<UserMarker>,
		kind: RequestKind,
		page: usize,
		answers: Vec<(usize, String)>,
		now: DateTime<Utc>,
	) -> Result<PageOutcome, WorkflowError> {
		let Some(session) = self.live_session(user_id, now) else {
			return Err(WorkflowError::SessionExpired);
		};
		if session.kind != kind || session.current_page != page {
			return Err(WorkflowError::SessionExpired);
		}

		let questions = questions_for(session.kind);
		let range = page_range(questions.len(), page);
		if answers.iter().any(|(index, _)| !range.contains(index)) {
			return Err(WorkflowError::SessionExpired);
		}
		for index in range {
			session.answers.insert(index, String::new());
		}
		for (index, answer) in answers {
			session.answers.insert(index, answer.trim().to_string());
		}
		session.current_page += 1;
		session.last_touched = now;

		let total_pages = page_count(questions.len());
		if session.current_page < total_pages {
			return Ok(PageOutcome::Continue {
				next_page: session.current_page,
				page_count: total_pages,
			});
		}

		let Some(session) = self.sessions.remove(&user_id) else {
			return Err(WorkflowError::SessionExpired);
		};
		let answers = questions
			.iter()
			.enumerate()
			.map(|(index, question)| QuestionAnswer {
				question: question.to_string(),
				answer: session.answers.get(&index).cloned().unwrap_or_default(),
			})
			.collect();
		Ok(PageOutcome::Complete(CompletedForm {
			kind: session.kind,
			guild_id: session.guild_id,
			answers,
		}))
	}

	/// Removes every expired session, returning how many were removed.
	pub fn reap(&mut self, now: DateTime<Utc>) -> usize {
		let Some(ttl) = self.policy.ttl else {
			return 0;
		};
		let before = self.sessions.len();
		self.sessions.retain(|_, session| session.last_touched + ttl > now);
		before - self.sessions.len()
	}
}
