use crate::models::RatingBucket;
use crate::presenter::{Bar, BarChart, Chart, NO_DISTRIBUTION_DATA, NOT_AVAILABLE, RatingView};

pub fn render(average_rating: Option<f64>, distribution: Option<&[RatingBucket]>) -> RatingView {
    let average_display = match average_rating {
        Some(average) if average.is_finite() => format!("{:.1}", average),
        _ => NOT_AVAILABLE.to_string(),
    };

    let distribution = match distribution {
        Some(buckets) if !buckets.is_empty() => Chart::Bars(BarChart::new(
            buckets
                .iter()
                .map(|bucket| Bar {
                    label: bucket.label.clone(),
                    count: bucket.count,
                })
                .collect(),
        )),
        _ => Chart::Placeholder(NO_DISTRIBUTION_DATA),
    };

    RatingView {
        average: average_rating,
        average_display,
        distribution,
    }
}
