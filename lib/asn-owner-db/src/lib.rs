/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod error;
pub use error::{BuildError, RangeError};

mod record;
pub use record::OwnerRecord;

mod range;
pub use range::AddressRange;

mod table;
pub use table::{OwnerTable, OwnerTableBuilder};

pub mod file;
pub use file::InvalidRecordPolicy;
