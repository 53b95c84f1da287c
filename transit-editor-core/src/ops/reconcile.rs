use crate::{
    model::{StopTime, Trip, TripPattern},
    store::{StoreError, Transaction},
};

/// the single structural change between two pattern stop sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternStopEdit {
    Unchanged,
    /// a new stop at `index`
    Insert { index: usize },
    /// the stop at `index` was removed
    Delete { index: usize, stop_id: String },
    /// one stop moved from `from` to `to`
    Move { from: usize, to: usize },
    /// `count` new stops after the existing ones
    Append { count: usize },
}

/// classifies the edit from `original` to `edited`.
///
/// only one insertion, deletion, move or trailing append is accepted per edit.
/// anything else, including substituting one stop for another and swapping two
/// neighbors, is rejected since the trips' stop times cannot be carried over
/// unambiguously.
pub fn diff_pattern_stops(original: &[&str], edited: &[&str]) -> Result<PatternStopEdit, StoreError> {
    let (n, m) = (original.len(), edited.len());
    if m == n + 1 {
        let index = first_difference(original, edited).unwrap_or(n);
        if original[index..] != edited[index + 1..] {
            return Err(multiple_differences());
        }
        Ok(PatternStopEdit::Insert { index })
    } else if n == m + 1 {
        let index = first_difference(original, edited).unwrap_or(m);
        if original[index + 1..] != edited[index..] {
            return Err(multiple_differences());
        }
        Ok(PatternStopEdit::Delete {
            index,
            stop_id: original[index].to_string(),
        })
    } else if n == m {
        let Some(first) = first_difference(original, edited) else {
            return Ok(PatternStopEdit::Unchanged);
        };
        let last = (0..n)
            .rev()
            .find(|i| original[*i] != edited[*i])
            .unwrap_or(first);
        if first == last {
            return Err(StoreError::Validation(format!(
                "stop substitutions are not supported, region of difference must have length > 1 (position {first})"
            )));
        }
        // moved right: the first stop reappears at the end of the span
        let moved_right = original[first] == edited[last]
            && original[first + 1..=last] == edited[first..last];
        // moved left: the last stop reappears at the start of the span
        let moved_left = edited[first] == original[last]
            && original[first..last] == edited[first + 1..=last];
        match (moved_right, moved_left) {
            (true, false) => Ok(PatternStopEdit::Move {
                from: first,
                to: last,
            }),
            (false, true) => Ok(PatternStopEdit::Move {
                from: last,
                to: first,
            }),
            (true, true) => Err(StoreError::Validation(format!(
                "swapping stops at positions {first} and {last} is ambiguous, move one stop at a time"
            ))),
            (false, false) => Err(StoreError::Validation(String::from(
                "pattern stop changes are not a simple, single move",
            ))),
        }
    } else if m > n {
        if original != &edited[..n] {
            return Err(StoreError::Validation(String::from(
                "when adding multiple stops to patterns, new stops must all be at the end",
            )));
        }
        Ok(PatternStopEdit::Append { count: m - n })
    } else {
        Err(multiple_differences())
    }
}

fn first_difference(a: &[&str], b: &[&str]) -> Option<usize> {
    a.iter().zip(b.iter()).position(|(x, y)| x != y)
}

fn multiple_differences() -> StoreError {
    StoreError::Validation(String::from(
        "multiple or ambiguous differences between pattern stops, changes must be made one at a time",
    ))
}

/// applies an edit to one trip's stop time slots. returns true if the trip's
/// times need review afterwards.
pub fn apply_to_stop_times(edit: &PatternStopEdit, stop_times: &mut Vec<Option<StopTime>>) -> bool {
    match edit {
        PatternStopEdit::Unchanged => false,
        PatternStopEdit::Insert { index } => {
            stop_times.insert(*index, None);
            false
        }
        PatternStopEdit::Delete { index, .. } => {
            stop_times.remove(*index);
            false
        }
        PatternStopEdit::Move { from, to } => {
            let moved = stop_times.remove(*from);
            stop_times.insert(*to, moved);
            true
        }
        PatternStopEdit::Append { count } => {
            stop_times.extend((0..*count).map(|_| None));
            false
        }
    }
}

/// carries a pattern stop edit over to every trip of the pattern, within the
/// caller's transaction. all trips are checked before any is written, so on
/// error no trip has changed.
///
/// # Arguments
///
/// * `tx` - open transaction holding the pattern's trips
/// * `original` - pattern as currently stored
/// * `edited` - pattern with its new stop sequence
///
/// # Returns
///
/// * the edit that was applied
pub fn reconcile_pattern_stops(
    tx: &mut Transaction,
    original: &TripPattern,
    edited: &TripPattern,
) -> Result<PatternStopEdit, StoreError> {
    let edit = diff_pattern_stops(&original.stop_ids(), &edited.stop_ids())?;
    if edit == PatternStopEdit::Unchanged {
        return Ok(edit);
    }
    let n = original.pattern_stops.len();
    let mut trips: Vec<Trip> = tx
        .trips_for_pattern(&original.id)
        .into_iter()
        .cloned()
        .collect();

    for trip in trips.iter() {
        if trip.stop_times.len() != n {
            return Err(StoreError::Validation(format!(
                "trip {} has {} stop times but pattern {} has {n} stops",
                trip.id,
                trip.stop_times.len(),
                original.id
            )));
        }
        if let PatternStopEdit::Delete { index, stop_id } = &edit {
            if let Some(Some(stop_time)) = trip.stop_times.get(*index) {
                if &stop_time.stop_id != stop_id {
                    return Err(StoreError::ConsistencyViolation(format!(
                        "trip {} stop time at position {index} is at stop {} but pattern {} has stop {stop_id}",
                        trip.id, stop_time.stop_id, original.id
                    )));
                }
            }
        }
    }

    for trip in trips.iter_mut() {
        if apply_to_stop_times(&edit, &mut trip.stop_times) {
            trip.invalid = true;
        }
    }
    let count = trips.len();
    for trip in trips {
        tx.trips_mut().put(trip);
    }
    log::debug!(
        "applied {edit:?} to {count} trips of pattern {}",
        original.id
    );
    Ok(edit)
}
