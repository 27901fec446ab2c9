use crate::models::OptionCount;
use crate::presenter::{Bar, BarChart, Chart, NO_OPTIONS_DATA};

/// One bar per option, in the order the server sent them. The axis is scaled
/// to this question's largest count only.
pub fn render(options: Option<&[OptionCount]>) -> Chart {
    match options {
        Some(options) if !options.is_empty() => Chart::Bars(BarChart::new(
            options
                .iter()
                .map(|option| Bar {
                    label: option.option_text.clone(),
                    count: option.count,
                })
                .collect(),
        )),
        // An empty list would only draw an empty chart
        _ => Chart::Placeholder(NO_OPTIONS_DATA),
    }
}
