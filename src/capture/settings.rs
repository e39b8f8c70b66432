//! Cached per-device picture controls.
//!
//! Controls are queried once at initialization. Whatever the driver
//! reports then is the truth for the rest of the session: an absent,
//! disabled, or unanswerable control stays unavailable, and the advertised
//! range is what every later write is validated against.

use std::collections::BTreeMap;

use tracing::warn;

use crate::capture::traits::{DeviceIo, SettingId};
use crate::error::CaptureError;

/// Availability and advertised range of one control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingState {
    /// Control exists and accepts writes within `min..=max`.
    Available {
        /// Smallest accepted value.
        min: i32,
        /// Largest accepted value.
        max: i32,
        /// Driver default at discovery time.
        default: i32,
    },
    /// Control is absent, disabled, or unanswerable on this device.
    Unavailable,
}

/// One picture control and its cached state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    /// Which control this is.
    pub id: SettingId,
    /// Availability and advertised range.
    pub state: SettingState,
}

/// Controls discovered on one device.
#[derive(Debug)]
pub(crate) struct SettingTable {
    entries: BTreeMap<SettingId, SettingState>,
}

impl SettingTable {
    /// Queries every managed control once. Absence, a disabled flag, or a
    /// failed query all mark the control unavailable for the session;
    /// discovery itself never fails.
    pub(crate) fn query<Io: DeviceIo>(io: &mut Io) -> Self {
        let mut entries = BTreeMap::new();
        for id in SettingId::ALL {
            let state = match io.query_control(id) {
                Ok(range) => SettingState::Available {
                    min: range.min,
                    max: range.max,
                    default: range.default,
                },
                Err(CaptureError::SettingUnavailable(_)) => SettingState::Unavailable,
                Err(err) => {
                    warn!("control {id:?} query failed: {err}");
                    SettingState::Unavailable
                }
            };
            entries.insert(id, state);
        }
        Self { entries }
    }

    /// Descriptor for `id`.
    pub(crate) fn get(&self, id: SettingId) -> Setting {
        Setting {
            id,
            state: self.state(id),
        }
    }

    /// Validates a prospective write without touching the device.
    pub(crate) fn check(&self, id: SettingId, value: i32) -> Result<(), CaptureError> {
        match self.state(id) {
            SettingState::Available { min, max, .. } => {
                if (min..=max).contains(&value) {
                    Ok(())
                } else {
                    Err(CaptureError::SettingOutOfRange {
                        id,
                        value,
                        min,
                        max,
                    })
                }
            }
            SettingState::Unavailable => Err(CaptureError::SettingUnavailable(id)),
        }
    }

    /// Snapshot of every entry, in id order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = Setting> + '_ {
        self.entries.iter().map(|(id, state)| Setting {
            id: *id,
            state: *state,
        })
    }

    fn state(&self, id: SettingId) -> SettingState {
        self.entries
            .get(&id)
            .copied()
            .unwrap_or(SettingState::Unavailable)
    }
}
