/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use smol_str::SmolStr;

pub struct OwnerRecord {
    pub number: u32,
    pub(crate) name: String,
    pub(crate) country: Option<SmolStr>,
}

impl OwnerRecord {
    pub fn new(number: u32, name: impl Into<String>) -> Self {
        OwnerRecord {
            number,
            name: name.into(),
            country: None,
        }
    }

    pub fn set_country(&mut self, code: &str) {
        self.country = Some(SmolStr::new(code));
    }

    pub fn owner_name(&self) -> &str {
        &self.name
    }

    pub fn country_code(&self) -> Option<&str> {
        self.country.as_deref()
    }
}
