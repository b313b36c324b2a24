use parking_lot::Mutex;

use crate::ActionKind;
use crate::ActionRecord;
use crate::ActionSubscriber;
use crate::BoxError;

/// Keeps every record it receives
#[derive(Debug, Default)]
pub struct RecordingSubscriber {
    records: Mutex<Vec<ActionRecord>>,
}

impl RecordingSubscriber {
    pub fn records(&self) -> Vec<ActionRecord> {
        self.records.lock().clone()
    }

    pub fn kinds(&self) -> Vec<ActionKind> {
        self.records.lock().iter().map(|r| r.kind).collect()
    }
}

impl ActionSubscriber for RecordingSubscriber {
    fn on_action(
        &self,
        record: &ActionRecord,
    ) -> Result<(), BoxError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}
