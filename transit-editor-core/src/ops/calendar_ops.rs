use crate::{
    model::{ExemplarService, ScheduleException, ServiceCalendar},
    store::{StoreError, Transaction},
};

/// deletes a calendar that no trip uses, dropping it from any custom or swap
/// exception that names it.
pub fn delete_calendar(
    tx: &mut Transaction,
    calendar_id: &str,
) -> Result<ServiceCalendar, StoreError> {
    tx.calendars().try_get(calendar_id)?;
    let trip_count = tx.indices().trip_count_by_calendar(calendar_id);
    if trip_count > 0 {
        return Err(StoreError::Conflict(format!(
            "calendar {calendar_id} is used by {trip_count} trips and cannot be deleted"
        )));
    }
    let exceptions: Vec<ScheduleException> = tx
        .indices()
        .exceptions_by_calendar(calendar_id)
        .into_iter()
        .filter_map(|id| tx.exceptions().get_cloned(id))
        .collect();
    let exception_table = tx.exceptions_mut();
    for mut exception in exceptions {
        match &mut exception.exemplar {
            ExemplarService::Custom { calendar_ids } => {
                calendar_ids.remove(calendar_id);
            }
            ExemplarService::Swap { added, removed } => {
                added.retain(|id| id != calendar_id);
                removed.retain(|id| id != calendar_id);
            }
            ExemplarService::Weekday { .. } | ExemplarService::NoService => {}
        }
        exception_table.put(exception);
    }
    let removed = tx
        .calendars_mut()
        .remove(calendar_id)
        .ok_or_else(|| StoreError::entity_not_found::<ServiceCalendar>(calendar_id))?;
    Ok(removed.as_ref().clone())
}

/// validates and stores a schedule exception. a date may belong to at most one
/// exception, and any calendars the exception names must exist.
pub fn put_schedule_exception(
    tx: &mut Transaction,
    exception: ScheduleException,
) -> Result<(), StoreError> {
    if exception.dates.is_empty() {
        return Err(StoreError::Validation(format!(
            "schedule exception {} has no dates",
            exception.id
        )));
    }
    let mut seen = std::collections::BTreeSet::new();
    for date in exception.dates.iter() {
        if !seen.insert(*date) {
            return Err(StoreError::Validation(format!(
                "schedule exception {} lists {date} twice",
                exception.id
            )));
        }
        let own = tx
            .exceptions()
            .get(&exception.id)
            .map(|previous| previous.dates.contains(date) as usize)
            .unwrap_or(0);
        if tx.indices().exception_count_by_date(date) > own {
            return Err(StoreError::Validation(format!(
                "another schedule exception already covers {date}"
            )));
        }
    }
    for calendar_id in exception.referenced_calendars() {
        tx.calendars().try_get(calendar_id)?;
    }
    tx.exceptions_mut().put(exception);
    Ok(())
}
