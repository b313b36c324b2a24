use tracing::info;

use super::ActionRecord;
use super::ActionSubscriber;
use crate::BoxError;

/// Default subscriber: one structured log line per record
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSubscriber;

impl ActionSubscriber for LoggingSubscriber {
    fn on_action(
        &self,
        record: &ActionRecord,
    ) -> std::result::Result<(), BoxError> {
        let data = record
            .payload
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        info!(
            kind = record.kind.as_str(),
            handle = %record.origin.id,
            "ZooKeeper event: type [{}], server [{}], path [{}], data [{}]",
            record.kind,
            record.origin.server,
            record.path,
            data
        );
        Ok(())
    }
}
