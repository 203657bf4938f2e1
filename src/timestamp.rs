/// Formats a millisecond duration as `HH:MM:SS.mmm`.
pub fn time_str(ms: f64) -> String {
    let total = ms.max(0.0) as u64;
    let hours = total / 3_600_000;
    let minutes = total % 3_600_000 / 60_000;
    let seconds = total % 60_000 / 1_000;
    let millis = total % 1_000;

    format!(
        "{hours:0width$}:{minutes:02}:{seconds:02}.{millis:03}",
        width = if hours >= 100 { 0 } else { 2 }
    )
}
