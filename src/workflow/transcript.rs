// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Renders closed requests into standalone HTML documents.
//!
//! Everything that came from a user (form answers, titles, messages, attachment links, display names) passes through
//! [escape] before it's placed in the document.

use super::platform::HistoryMessage;
use super::request::{PayloadEntries, Request};
use chrono::{DateTime, Utc};
use std::fmt::Write;

const STYLE: &str = "body{font-family:sans-serif;margin:2em;background:#f6f6f8;color:#222}\
table{border-collapse:collapse}td,th{padding:.25em .75em;text-align:left;vertical-align:top}\
.message{background:#fff;border-radius:6px;margin:.5em 0;padding:.5em 1em}\
.author{font-weight:bold}.time{color:#777;font-size:.85em;margin-left:.5em}\
.content{white-space:pre-wrap}";

/// Escapes text for use in HTML element content and quoted attribute values.
pub fn escape(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());
	for character in text.chars() {
		match character {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#39;"),
			_ => escaped.push(character),
		}
	}
	escaped
}

fn format_time(time: &DateTime<Utc>) -> String {
	time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn metadata_row(document: &mut String, label: &str, value: &str) {
	let _ = write!(document, "<tr><th>{}</th><td>{}</td></tr>", label, escape(value));
}

/// Renders a request and its channel history.
pub fn render(request: &Request, messages: &[HistoryMessage]) -> String {
	let mut document = String::new();
	let title = escape(&format!("{}: {}", request.id, request.title));
	let _ = write!(
		document,
		"<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{}</style>\n</head>\n<body>\n<h1>{}</h1>\n",
		title, STYLE, title
	);

	document.push_str("<table class=\"metadata\">");
	metadata_row(&mut document, "ID", &request.id);
	metadata_row(&mut document, "Type", request.kind.descriptor().display_name);
	metadata_row(&mut document, "Status", &request.status.to_string());
	metadata_row(&mut document, "Requester", &request.requester_id.to_string());
	metadata_row(&mut document, "Created", &format_time(&request.created_at));
	if let Some(claimed_by) = request.claimed_by {
		metadata_row(&mut document, "Claimed by", &claimed_by.to_string());
	}
	if let Some(closed_at) = &request.closed_at {
		metadata_row(&mut document, "Closed", &format_time(closed_at));
	}
	let closer = match request.closed_by {
		Some(closed_by) => closed_by.to_string(),
		None if request.closed_at.is_some() => String::from("automatic"),
		None => String::new(),
	};
	if !closer.is_empty() {
		metadata_row(&mut document, "Closed by", &closer);
	}
	if let Some(reason) = &request.close_reason {
		metadata_row(&mut document, "Reason", reason);
	}
	document.push_str("</table>\n");

	document.push_str("<h2>Submission</h2>\n<dl class=\"payload\">");
	match &request.payload.data {
		PayloadEntries::Fields(fields) => {
			for field in fields {
				let _ = write!(
					document,
					"<dt>{}</dt><dd class=\"content\">{}</dd>",
					escape(&field.label),
					escape(&field.value)
				);
			}
		}
		PayloadEntries::Answers(answers) => {
			for answer in answers {
				let _ = write!(
					document,
					"<dt>{}</dt><dd class=\"content\">{}</dd>",
					escape(&answer.question),
					escape(&answer.answer)
				);
			}
		}
	}
	document.push_str("</dl>\n");

	if !request.payload.votes.is_empty() {
		let tally = request.payload.votes.tally();
		let _ = write!(
			document,
			"<p class=\"votes\">Votes: {} up, {} down (net {:+})</p>\n",
			tally.upvotes,
			tally.downvotes,
			tally.net()
		);
	}

	let _ = write!(document, "<h2>Messages ({})</h2>\n", messages.len());
	for message in messages {
		let _ = write!(
			document,
			"<div class=\"message\"><span class=\"author\">{}</span><span class=\"time\">{}</span><div class=\"content\">{}</div>",
			escape(&message.author_name),
			format_time(&message.sent_at),
			escape(&message.content)
		);
		for attachment in message.attachments.iter() {
			let _ = write!(
				document,
				"<div class=\"attachment\"><a href=\"{}\">{}</a></div>",
				escape(&attachment.url),
				escape(&attachment.file_name)
			);
		}
		document.push_str("</div>\n");
	}

	document.push_str("</body>\n</html>\n");
	document
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::workflow::kind::RequestKind;
	use crate::workflow::platform::HistoryAttachment;
	use crate::workflow::request::{FieldAnswer, RequestPayload, RequestStatus};
	use crate::workflow::testing::sample_request;
	use twilight_model::id::Id;

	const HOSTILE: &str = "<script>alert(\"x\")</script> & 'quoted' <b>bold</b>";

	fn hostile_message() -> HistoryMessage {
		HistoryMessage {
			author_id: Id::new(5),
			author_name: String::from("<img src=x onerror=alert(1)>"),
			content: String::from(HOSTILE),
			sent_at: Utc::now(),
			attachments: vec![HistoryAttachment {
				file_name: String::from("<script>.png"),
				url: String::from("https://cdn.example/a.png\"><script>"),
			}],
		}
	}

	#[test]
	fn attachments_link_to_their_download() {
		let request = sample_request(RequestKind::Bug, "BUG-0001");
		let mut message = hostile_message();
		message.attachments = vec![HistoryAttachment {
			file_name: String::from("crash.log"),
			url: String::from("https://cdn.discordapp.com/attachments/1/2/crash.log"),
		}];
		let document = render(&request, &[message]);
		assert!(document.contains("<a href=\"https://cdn.discordapp.com/attachments/1/2/crash.log\">crash.log</a>"));
	}

	#[test]
	fn escape_replaces_markup_characters() {
		assert_eq!(escape("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&#39;");
		assert_eq!(escape("plain text"), "plain text");
	}

	#[test]
	fn user_content_is_never_rendered_as_markup() {
		let mut request = sample_request(RequestKind::Bug, "BUG-0001");
		request.title = String::from(HOSTILE);
		request.payload = RequestPayload::fields(vec![FieldAnswer {
			id: String::from("steps"),
			label: String::from("Steps <to> reproduce"),
			value: String::from(HOSTILE),
		}]);
		request.close_reason = Some(String::from("</table><h1>pwned</h1>"));
		let document = render(&request, &[hostile_message()]);

		assert!(!document.contains("<script>"));
		assert!(!document.contains("<b>"));
		assert!(!document.contains("<img"));
		assert!(!document.contains("<to>"));
		assert!(!document.contains("<h1>pwned"));
		assert!(document.contains("&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"));
	}

	#[test]
	fn document_includes_metadata_and_history() {
		let mut request = sample_request(RequestKind::Bug, "BUG-0001");
		request.status = RequestStatus::Closed;
		request.claimed_by = Some(Id::new(77));
		request.closed_by = Some(Id::new(78));
		request.closed_at = Some(Utc::now());
		request.close_reason = Some(String::from("fixed"));
		let document = render(&request, &[hostile_message(), hostile_message()]);

		assert!(document.contains("<td>BUG-0001</td>"));
		assert!(document.contains("<td>Bug Report</td>"));
		assert!(document.contains("<td>Closed</td>"));
		assert!(document.contains("<td>77</td>"));
		assert!(document.contains("<td>78</td>"));
		assert!(document.contains("<td>fixed</td>"));
		assert!(document.contains("Messages (2)"));
	}
}
