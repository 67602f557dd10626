use bitcode::{Decode, Encode};

use super::timer::{CleanupTimers, TimerRecord};
use crate::Saveable;

#[derive(Encode, Decode, Default)]
struct CleanupTimersSave {
    records: Vec<TimerRecord>,
}

impl Saveable for CleanupTimers {
    const SAVE_KEY: &'static str = "cleanup_timers";

    fn save_to_bytes(&self) -> Option<Vec<u8>> {
        let records = self.records();
        if records.is_empty() {
            return None;
        }
        Some(bitcode::encode(&CleanupTimersSave { records }))
    }

    /// Everything restored is parked until its grid is tracked again.
    fn load_from_bytes(bytes: &[u8]) -> Self {
        let save: CleanupTimersSave = crate::decode_or_warn(Self::SAVE_KEY, bytes);
        CleanupTimers::restored(save.records)
    }
}
