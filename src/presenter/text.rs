use crate::models::TextResponse;
use crate::presenter::{SortOrder, TextEntry, TextFeed};

/// Sorted copy of the answers; the stored responses are left as received.
pub fn render(responses: &[TextResponse], order: SortOrder, expanded: bool) -> TextFeed {
    let mut entries: Vec<TextEntry> = responses
        .iter()
        .map(|response| TextEntry {
            answer_value: response.answer_value.clone(),
            submitted_at: response.submitted_at,
        })
        .collect();

    match order {
        SortOrder::NewestFirst => entries.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at)),
        SortOrder::OldestFirst => entries.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at)),
    }

    TextFeed {
        expanded,
        order,
        entries,
    }
}
