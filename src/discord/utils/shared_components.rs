// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::workflow::kind::{FieldSpec, RequestKind};
use crate::workflow::platform::{ActionButton, ButtonKind};
use twilight_model::channel::message::component::{
	ActionRow, Button, ButtonStyle, Component, SelectMenu, SelectMenuOption, SelectMenuType, TextInput, TextInputStyle,
};

/// Discord allows at most this many buttons in one action row.
const BUTTONS_PER_ROW: usize = 5;

/// Discord's limit on the length of a text input label
const MAX_LABEL_LENGTH: usize = 45;

fn button_style(kind: ButtonKind) -> ButtonStyle {
	match kind {
		ButtonKind::Primary => ButtonStyle::Primary,
		ButtonKind::Secondary => ButtonStyle::Secondary,
		ButtonKind::Success => ButtonStyle::Success,
		ButtonKind::Danger => ButtonStyle::Danger,
	}
}

/// Lays out buttons into as many action rows as they need.
pub fn button_rows(buttons: &[ActionButton]) -> Vec<Component> {
	buttons
		.chunks(BUTTONS_PER_ROW)
		.map(|row| {
			let components = row
				.iter()
				.map(|button| {
					Component::Button(Button {
						custom_id: Some(button.custom_id.clone()),
						disabled: button.disabled,
						emoji: None,
						label: Some(button.label.clone()),
						style: button_style(button.kind),
						url: None,
						sku_id: None,
					})
				})
				.collect();
			Component::ActionRow(ActionRow { components })
		})
		.collect()
}

/// The select menu members use to start a request.
pub fn request_panel_components() -> Vec<Component> {
	let options = RequestKind::all()
		.into_iter()
		.map(|kind| {
			let descriptor = kind.descriptor();
			SelectMenuOption {
				default: false,
				description: None,
				emoji: None,
				label: format!("{} {}", descriptor.icon, descriptor.display_name),
				value: kind.as_id().to_string(),
			}
		})
		.collect();
	let select_menu = SelectMenu {
		channel_types: None,
		custom_id: String::from("panel/select"),
		default_values: None,
		disabled: false,
		kind: SelectMenuType::Text,
		max_values: None,
		min_values: None,
		options: Some(options),
		placeholder: Some(String::from("What would you like to open?")),
	};
	vec![Component::ActionRow(ActionRow {
		components: vec![Component::SelectMenu(select_menu)],
	})]
}

fn text_input_row(input: TextInput) -> Component {
	Component::ActionRow(ActionRow {
		components: vec![Component::TextInput(input)],
	})
}

/// Text inputs for every field of a single-page form.
pub fn field_inputs(fields: &[FieldSpec]) -> Vec<Component> {
	fields
		.iter()
		.map(|field| {
			text_input_row(TextInput {
				custom_id: field.id.to_string(),
				label: field.label.to_string(),
				max_length: field.max_length,
				min_length: None,
				placeholder: field.placeholder.map(String::from),
				required: Some(field.required),
				style: if field.long {
					TextInputStyle::Paragraph
				} else {
					TextInputStyle::Short
				},
				value: None,
			})
		})
		.collect()
}

/// Text inputs for one page of a multi-page form. Inputs are numbered by their absolute question position.
pub fn question_inputs(first_question: usize, questions: &[&str]) -> Vec<Component> {
	questions
		.iter()
		.enumerate()
		.map(|(offset, question)| {
			let number = first_question + offset + 1;
			let label: String = format!("{}. {}", number, question);
			let label = if label.chars().count() > MAX_LABEL_LENGTH {
				let mut shortened: String = label.chars().take(MAX_LABEL_LENGTH - 1).collect();
				shortened.push('…');
				shortened
			} else {
				label
			};
			text_input_row(TextInput {
				custom_id: format!("question/{}", first_question + offset),
				label,
				max_length: Some(1024),
				min_length: None,
				placeholder: Some(question.chars().take(100).collect()),
				required: Some(true),
				style: TextInputStyle::Paragraph,
				value: None,
			})
		})
		.collect()
}

/// A single optional reason input, used when staff resolve a request from a button.
pub fn reason_input() -> Vec<Component> {
	vec![text_input_row(TextInput {
		custom_id: String::from("reason"),
		label: String::from("Reason"),
		max_length: Some(1000),
		min_length: None,
		placeholder: Some(String::from("Optional")),
		required: Some(false),
		style: TextInputStyle::Paragraph,
		value: None,
	})]
}

#[cfg(test)]
mod tests {
	use super::*;

	fn button(index: usize) -> ActionButton {
		ActionButton {
			custom_id: format!("request/BUG-0001/{}", index),
			label: index.to_string(),
			kind: ButtonKind::Secondary,
			disabled: index % 2 == 0,
		}
	}

	#[test]
	fn buttons_wrap_after_five() {
		let buttons: Vec<ActionButton> = (0..7).map(button).collect();
		let rows = button_rows(&buttons);
		assert_eq!(rows.len(), 2);
		let Component::ActionRow(second_row) = &rows[1] else {
			panic!("expected an action row");
		};
		assert_eq!(second_row.components.len(), 2);
	}

	#[test]
	fn question_labels_fit_discord_limits() {
		let questions = ["How would you handle a disagreement with another staff member?"];
		let inputs = question_inputs(7, &questions);
		let Component::ActionRow(row) = &inputs[0] else {
			panic!("expected an action row");
		};
		let Component::TextInput(input) = &row.components[0] else {
			panic!("expected a text input");
		};
		assert_eq!(input.custom_id, "question/7");
		assert!(input.label.starts_with("8. "));
		assert!(input.label.chars().count() <= MAX_LABEL_LENGTH);
	}

	#[test]
	fn panel_offers_every_kind() {
		let rows = request_panel_components();
		let Component::ActionRow(row) = &rows[0] else {
			panic!("expected an action row");
		};
		let Component::SelectMenu(menu) = &row.components[0] else {
			panic!("expected a select menu");
		};
		assert_eq!(menu.options.as_ref().map(|options| options.len()), Some(7));
	}
}
