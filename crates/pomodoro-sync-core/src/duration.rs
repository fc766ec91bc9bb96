//! Canonical duration resolution.

use crate::{PresetType, SessionType, Settings};

/// Seconds per configured minute.
pub const SECONDS_PER_MINUTE: u64 = 60;

/// Resolve the canonical duration in seconds for `preset` and `session_type`.
///
/// Returns `None` when no settings are available or the preset has no table;
/// callers keep their current remaining time in that case.
#[must_use]
pub fn resolve(
    settings: Option<&Settings>,
    preset: PresetType,
    session_type: SessionType,
) -> Option<u64> {
    let durations = settings?.preset(preset)?;
    Some(u64::from(durations.minutes_for(session_type)) * SECONDS_PER_MINUTE)
}
