use kdam::{BarBuilder, BarExt};
use transit_editor_gtfs::{GtfsError, ProgressReporter};

use super::EditorAppError;

/// runs a pipeline on a worker thread, drawing its status events as a progress bar.
///
/// # Arguments
///
/// * `desc` - label shown next to the bar
/// * `job` - the pipeline. it reports through the given reporter, and the bar
///   closes once the job returns.
pub fn run_with_progress<T, F>(desc: &str, job: F) -> Result<T, EditorAppError>
where
    T: Send,
    F: FnOnce(&ProgressReporter) -> Result<T, GtfsError> + Send,
{
    let mut bar = BarBuilder::default()
        .desc(desc)
        .total(100)
        .animation("fillup")
        .build()
        .map_err(|e| EditorAppError::Internal(format!("failure building progress bar: {e}")))?;
    let (reporter, receiver) = ProgressReporter::channel();
    let joined = std::thread::scope(|scope| {
        let handle = scope.spawn(move || job(&reporter));
        for event in receiver.iter() {
            if event.error {
                log::error!("{}", event.message);
            } else {
                log::debug!("{}", event.message);
            }
            let _ = bar.update_to(event.percent_complete.round() as usize);
        }
        handle.join()
    });
    eprintln!(); // end progress bar
    let result = joined
        .map_err(|_| EditorAppError::Internal(format!("{desc} job panicked")))?;
    Ok(result?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_returns_job_result() {
        let result = run_with_progress("test", |reporter| {
            reporter.report(50.0, "halfway");
            reporter.report(100.0, "done");
            Ok(42)
        })
        .unwrap();
        assert_eq!(result, 42);
    }

    #[test]
    fn test_returns_job_error() {
        let result: Result<(), EditorAppError> = run_with_progress("test", |reporter| {
            reporter.fail("nope");
            Err(GtfsError::Cancelled)
        });
        assert!(matches!(result, Err(EditorAppError::Gtfs(GtfsError::Cancelled))));
    }
}
