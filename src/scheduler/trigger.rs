//! Buffering trigger.

/// Index to request next, if any.
///
/// `settled` counts indices that are either generated or given up on. They
/// always form the prefix `1..=settled`, because requests are issued one at a
/// time in increasing order, so the next index is `settled + 1`.
pub fn next_request(
    settled: u32,
    playback: u32,
    lookahead: u32,
    total: u32,
    in_flight: Option<u32>,
) -> Option<u32> {
    if in_flight.is_some() {
        return None;
    }
    let needed_ahead = playback.saturating_add(lookahead);
    (settled < needed_ahead && settled < total).then_some(settled + 1)
}
