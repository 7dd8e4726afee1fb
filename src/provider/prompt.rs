//! Prompt construction for text-generating providers.

use crate::defaults::PROMPT_CONTEXT_CHARS;
use crate::provider::{OutlineRequest, SegmentRequest};
use crate::story::store::tail_chars;

/// Prompt asking for a JSON array of chapter summaries.
pub fn outline_prompt(request: &OutlineRequest) -> String {
    let route = &request.route;
    let stops = if route.waypoints.is_empty() {
        String::new()
    } else {
        format!("Intermediate stops: {}.", route.waypoints.join(", "))
    };

    format!(
        "You are an expert storyteller. Write an outline for a story that is exactly {total} chapters long.\n\
         \n\
         Journey Details:\n\
         From: {from}\n\
         To: {to}\n\
         {stops}\n\
         Duration: {duration}\n\
         \n\
         {style}\n\
         \n\
         Ensure the story arc includes the intermediate stops naturally as milestones in the journey.\n\
         Output strictly valid JSON: An array of {total} strings representing chapter summaries.",
        total = request.total_segments,
        from = route.start_address,
        to = route.end_address,
        duration = route.duration_text,
        style = route.style.instruction(),
    )
}

/// Prompt asking for the raw narrative of one segment.
pub fn segment_prompt(request: &SegmentRequest) -> String {
    let route = &request.route;
    let stops = if route.waypoints.is_empty() {
        String::new()
    } else {
        format!("Waypoints to keep in mind: {}.", route.waypoints.join(", "))
    };

    format!(
        "Generate segment {index} of {total} for an immersive travel narrative.\n\
         \n\
         Route: {from} to {to}.\n\
         {stops}\n\
         \n\
         {style}\n\
         Current Goal: {beat}\n\
         Previous Content Summary: {context}\n\
         \n\
         Write ~{words} words. Focus on the sensory experience of movement.\n\
         Output ONLY the raw narrative text.",
        index = request.index,
        total = request.total_segments,
        from = route.start_address,
        to = route.end_address,
        style = route.style.instruction(),
        beat = request.beat,
        context = tail_chars(&request.context, PROMPT_CONTEXT_CHARS),
        words = request.target_words,
    )
}
