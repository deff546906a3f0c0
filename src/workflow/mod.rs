// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod engine;
pub mod error;
pub mod forms;
pub mod kind;
pub mod platform;
pub mod provisioning;
pub mod request;
pub mod settings;
pub mod store;
pub mod transcript;
pub mod voting;

#[cfg(test)]
pub(crate) mod testing;
