// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

/// Lifecycle of one routed request, logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Classifying,
    Selecting,
    /// Trying the candidate at this index (0 is the primary).
    Attempting(usize),
    Succeeded,
    Failed,
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestPhase::Classifying => write!(f, "classifying"),
            RequestPhase::Selecting => write!(f, "selecting"),
            RequestPhase::Attempting(i) => write!(f, "attempting({i})"),
            RequestPhase::Succeeded => write!(f, "succeeded"),
            RequestPhase::Failed => write!(f, "failed"),
        }
    }
}
