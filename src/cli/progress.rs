// src/cli/progress.rs — Terminal progress lines

use crate::core::types::ProgressEvent;

/// One human-readable line per progress event.
pub fn format_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::BatchGenerated { batch_index, cases } => {
            format!("[generate] batch {batch_index}: {cases} case(s)")
        }
        ProgressEvent::BatchFailed {
            batch_index,
            message,
        } => format!(
            "[generate] batch {batch_index} FAILED: {}",
            crate::util::ellipsize(message, 100)
        ),
        ProgressEvent::CaseGraded {
            index,
            total,
            test_id,
            label,
            composite,
        } => format!("[evaluate {index}/{total}] {test_id} {label:<9} {composite:.2}"),
        ProgressEvent::FlightStarted {
            target_id,
            track_id,
            steps,
        } => format!("[{target_id}] track {track_id}, {steps} step(s)"),
        ProgressEvent::StepFinished {
            target_id,
            step,
            ok,
        } => format!(
            "[{target_id}]   {step}: {}",
            if *ok { "ok" } else { "failed" }
        ),
        ProgressEvent::FlightFinished { target_id, status } => {
            format!("[{target_id}] {status}")
        }
    }
}

/// Progress callback printing to stdout, for the `with_progress()` builders.
pub fn terminal_progress() -> impl Fn(ProgressEvent) + Send + Sync + 'static {
    move |event| println!("{}", format_event(&event))
}
