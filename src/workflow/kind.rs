// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::request::RequestStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every kind of request the bot knows how to run through the workflow.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum RequestKind {
	#[serde(rename = "ticket")]
	Ticket,
	#[serde(rename = "bug")]
	Bug,
	#[serde(rename = "play-report")]
	PlayReport,
	#[serde(rename = "suggestion")]
	Suggestion,
	#[serde(rename = "app-moderator")]
	ModeratorApplication,
	#[serde(rename = "app-admin")]
	AdminApplication,
	#[serde(rename = "app-event-host")]
	EventHostApplication,
}

/// A group of kinds that share the "one open request per requester" rule.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Family {
	#[serde(rename = "ticket")]
	Ticket,
	#[serde(rename = "application")]
	Application,
}

impl Family {
	pub fn as_id(&self) -> &'static str {
		match self {
			Self::Ticket => "ticket",
			Self::Application => "application",
		}
	}

	/// All kinds that belong to the family.
	pub fn kinds(&self) -> Vec<RequestKind> {
		RequestKind::all()
			.into_iter()
			.filter(|kind| kind.descriptor().exclusive_family == Some(*self))
			.collect()
	}
}

/// A single field on a single-page form.
#[derive(Debug)]
pub struct FieldSpec {
	pub id: &'static str,
	pub label: &'static str,
	pub placeholder: Option<&'static str>,
	pub long: bool,
	pub required: bool,
	pub max_length: Option<u16>,
}

/// How the data for a request is collected from the requester.
#[derive(Debug)]
pub enum FormSchema {
	/// All fields are collected in one form.
	SinglePage(&'static [FieldSpec]),
	/// A question list collected over several pages.
	MultiPage(&'static [&'static str]),
}

/// Static metadata describing how a kind of request behaves.
#[derive(Debug)]
pub struct RequestTypeDescriptor {
	pub kind: RequestKind,
	pub display_name: &'static str,
	pub icon: &'static str,
	pub id_prefix: &'static str,
	pub schema: FormSchema,
	pub initial_status: RequestStatus,
	/// Whether staff can approve or deny this kind, rather than only close it.
	pub review_flow: bool,
	pub voting: bool,
	pub exclusive_family: Option<Family>,
}

impl RequestKind {
	pub fn all() -> [Self; 7] {
		[
			Self::Ticket,
			Self::Bug,
			Self::PlayReport,
			Self::Suggestion,
			Self::ModeratorApplication,
			Self::AdminApplication,
			Self::EventHostApplication,
		]
	}

	pub fn as_id(&self) -> &'static str {
		match self {
			Self::Ticket => "ticket",
			Self::Bug => "bug",
			Self::PlayReport => "play-report",
			Self::Suggestion => "suggestion",
			Self::ModeratorApplication => "app-moderator",
			Self::AdminApplication => "app-admin",
			Self::EventHostApplication => "app-event-host",
		}
	}

	pub fn from_id(id: &str) -> Option<Self> {
		Self::all().into_iter().find(|kind| kind.as_id() == id)
	}

	pub fn descriptor(&self) -> &'static RequestTypeDescriptor {
		descriptor_for(*self)
	}
}

impl fmt::Display for RequestKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.descriptor().display_name)
	}
}

pub fn descriptor_for(kind: RequestKind) -> &'static RequestTypeDescriptor {
	match kind {
		RequestKind::Ticket => &TICKET,
		RequestKind::Bug => &BUG,
		RequestKind::PlayReport => &PLAY_REPORT,
		RequestKind::Suggestion => &SUGGESTION,
		RequestKind::ModeratorApplication => &MODERATOR_APPLICATION,
		RequestKind::AdminApplication => &ADMIN_APPLICATION,
		RequestKind::EventHostApplication => &EVENT_HOST_APPLICATION,
	}
}

const fn short(id: &'static str, label: &'static str, max_length: u16) -> FieldSpec {
	FieldSpec {
		id,
		label,
		placeholder: None,
		long: false,
		required: true,
		max_length: Some(max_length),
	}
}

const fn paragraph(id: &'static str, label: &'static str, required: bool) -> FieldSpec {
	FieldSpec {
		id,
		label,
		placeholder: None,
		long: true,
		required,
		max_length: Some(1024),
	}
}

static TICKET: RequestTypeDescriptor = RequestTypeDescriptor {
	kind: RequestKind::Ticket,
	display_name: "Support Ticket",
	icon: "🎫",
	id_prefix: "TICKET",
	schema: FormSchema::SinglePage(&[short("title", "Subject", 60), paragraph("details", "How can we help?", true)]),
	initial_status: RequestStatus::Open,
	review_flow: false,
	voting: false,
	exclusive_family: Some(Family::Ticket),
};

static BUG: RequestTypeDescriptor = RequestTypeDescriptor {
	kind: RequestKind::Bug,
	display_name: "Bug Report",
	icon: "🐛",
	id_prefix: "BUG",
	schema: FormSchema::SinglePage(&[
		short("title", "Summary", 60),
		paragraph("steps", "Steps to reproduce", true),
		paragraph("expected", "What did you expect to happen?", true),
		paragraph("actual", "What actually happened?", true),
	]),
	initial_status: RequestStatus::Open,
	review_flow: false,
	voting: false,
	exclusive_family: None,
};

static PLAY_REPORT: RequestTypeDescriptor = RequestTypeDescriptor {
	kind: RequestKind::PlayReport,
	display_name: "Player Report",
	icon: "🚩",
	id_prefix: "PLAY",
	schema: FormSchema::SinglePage(&[
		short("title", "Player name", 60),
		paragraph("description", "What happened?", true),
		paragraph("evidence", "Evidence (links, screenshots)", false),
	]),
	initial_status: RequestStatus::Open,
	review_flow: false,
	voting: false,
	exclusive_family: None,
};

static SUGGESTION: RequestTypeDescriptor = RequestTypeDescriptor {
	kind: RequestKind::Suggestion,
	display_name: "Suggestion",
	icon: "💡",
	id_prefix: "SUG",
	schema: FormSchema::SinglePage(&[short("title", "Title", 60), paragraph("description", "Describe your idea", true)]),
	initial_status: RequestStatus::Pending,
	review_flow: true,
	voting: true,
	exclusive_family: None,
};

static MODERATOR_APPLICATION: RequestTypeDescriptor = RequestTypeDescriptor {
	kind: RequestKind::ModeratorApplication,
	display_name: "Moderator Application",
	icon: "🛡️",
	id_prefix: "APP",
	schema: FormSchema::MultiPage(&[
		"How old are you?",
		"What timezone are you in?",
		"How long have you been a member of this server?",
		"How many hours per week can you moderate?",
		"Do you have previous moderation experience? Describe it.",
		"Why do you want to become a moderator?",
		"How would you handle a member spamming in chat?",
		"How would you handle a disagreement with another staff member?",
		"A member reports harassment in DMs. What do you do?",
		"What would you change about the server rules?",
		"How do you handle stressful situations?",
		"Which languages do you speak?",
		"Have you ever been punished on this server? Explain.",
		"Anything else you would like us to know?",
	]),
	initial_status: RequestStatus::Pending,
	review_flow: true,
	voting: false,
	exclusive_family: Some(Family::Application),
};

static ADMIN_APPLICATION: RequestTypeDescriptor = RequestTypeDescriptor {
	kind: RequestKind::AdminApplication,
	display_name: "Administrator Application",
	icon: "👑",
	id_prefix: "APP",
	schema: FormSchema::MultiPage(&[
		"How old are you?",
		"What timezone are you in?",
		"How long have you been a member of this server?",
		"How long have you been on the staff team?",
		"How many hours per week can you dedicate?",
		"Describe your previous administration experience.",
		"Why do you want to become an administrator?",
		"Which bots and integrations are you comfortable configuring?",
		"How would you handle a moderator abusing their permissions?",
		"How would you resolve a conflict between two moderators?",
		"How would you respond to a raid?",
		"How would you improve staff onboarding?",
		"What is your approach to writing and enforcing rules?",
		"How do you handle appeals for bans you disagree with?",
		"Describe a difficult decision you made as staff.",
		"What server events would you like to organise?",
		"How do you keep communication transparent with the community?",
		"Have you ever been punished on this server? Explain.",
		"Anything else you would like us to know?",
	]),
	initial_status: RequestStatus::Pending,
	review_flow: true,
	voting: false,
	exclusive_family: Some(Family::Application),
};

static EVENT_HOST_APPLICATION: RequestTypeDescriptor = RequestTypeDescriptor {
	kind: RequestKind::EventHostApplication,
	display_name: "Event Host Application",
	icon: "🎉",
	id_prefix: "APP",
	schema: FormSchema::MultiPage(&[
		"How old are you?",
		"What timezone are you in?",
		"What kind of events would you host?",
		"How often could you host events?",
		"Have you hosted events before? Describe them.",
		"How would you handle a disruptive participant?",
		"How would you promote your events?",
		"Anything else you would like us to know?",
	]),
	initial_status: RequestStatus::Pending,
	review_flow: true,
	voting: false,
	exclusive_family: Some(Family::Application),
};
