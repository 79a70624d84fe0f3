use super::conflicts::Conflict;
use super::model::PublishStatus;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("cannot publish with {0} unresolved conflict(s)")]
    Conflicts(usize),
}

/// Draft -> published gate. Only the conflict list at the moment of the
/// request matters; nothing stops later edits from reintroducing conflicts.
pub fn publish(
    current: PublishStatus,
    conflicts: &[Conflict],
) -> Result<PublishStatus, PublishError> {
    if !conflicts.is_empty() {
        return Err(PublishError::Conflicts(conflicts.len()));
    }
    if current == PublishStatus::Published {
        tracing::debug!("republishing an already published timetable");
    }
    Ok(PublishStatus::Published)
}
