use crate::model::Observation;

fn progress_line(observation: &Observation) -> String {
    let status = if observation.success { "Typed" } else { "Failed" };
    format!(
        "{status} {:>3.0}% {:?} at {}",
        observation.progress * 100.0,
        observation.ch,
        observation.position
    )
}

/// Console trace of one consumed character, colored by outcome.
pub fn print_progress_line(observation: &Observation) {
    const RESET: &str = "\x1b[0m";
    const TYPED: &str = "\x1b[34m";
    const FAILED: &str = "\x1b[31m";

    let line = progress_line(observation);
    if let Some(rest) = line.strip_prefix("Typed") {
        eprintln!("{TYPED}Typed{RESET}{rest}");
    } else if let Some(rest) = line.strip_prefix("Failed") {
        eprintln!("{FAILED}Failed{RESET}{rest}");
    } else {
        eprintln!("{line}");
    }
}
