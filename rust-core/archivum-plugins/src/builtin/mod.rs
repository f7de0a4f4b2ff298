// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Plugins shipped with the repository.

mod conversion;
mod fixity;
mod reindex;

pub use conversion::ConversionPlugin;
pub use fixity::FixityCheckPlugin;
pub use reindex::ReindexPlugin;
