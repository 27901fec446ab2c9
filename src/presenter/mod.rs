pub mod choice;
pub mod rating;
pub mod text;

use std::fmt;

use chrono::{DateTime, Utc};

use crate::loader::LoadState;
use crate::models::{QuestionAggregate, QuestionResults};
use crate::store::SurveyHeader;
use crate::stream::ConnectionState;

pub const LOADING: &str = "Loading results...";
pub const NO_DATA_YET: &str = "No data yet";
pub const NO_OPTIONS_DATA: &str = "No options data";
pub const NO_DISTRIBUTION_DATA: &str = "No distribution data";
pub const NOT_AVAILABLE: &str = "Not available";

const BAR_WIDTH: u64 = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bar {
    pub label: String,
    pub count: u64,
}

/// Horizontal bar chart scaled to its own largest bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarChart {
    pub axis_max: u64,
    pub bars: Vec<Bar>,
}

impl BarChart {
    pub fn new(bars: Vec<Bar>) -> Self {
        let axis_max = bars.iter().map(|bar| bar.count).max().unwrap_or(0);
        Self { axis_max, bars }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chart {
    Bars(BarChart),
    Placeholder(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingView {
    pub average: Option<f64>,
    pub average_display: String,
    pub distribution: Chart,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            SortOrder::NewestFirst => SortOrder::OldestFirst,
            SortOrder::OldestFirst => SortOrder::NewestFirst,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortOrder::NewestFirst => "newest first",
            SortOrder::OldestFirst => "oldest first",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEntry {
    pub answer_value: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFeed {
    pub expanded: bool,
    pub order: SortOrder,
    pub entries: Vec<TextEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuestionChart {
    MultipleChoice(Chart),
    Rating(RatingView),
    Text(TextFeed),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionView {
    pub question_id: String,
    pub question_text: String,
    pub response_count: u64,
    pub chart: QuestionChart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNav {
    pub index: usize,
    pub total: usize,
    pub can_previous: bool,
    pub can_next: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageBody {
    Loading,
    Empty,
    Question(QuestionView),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultsPage {
    pub title: String,
    pub description: String,
    pub total_responses: u64,
    pub error: Option<String>,
    pub connection: Option<ConnectionState>,
    pub nav: Option<PageNav>,
    pub body: PageBody,
}

/// View logic for the results page: which question is showing and how the
/// text feed is ordered. Holds no results data of its own.
#[derive(Debug, Default)]
pub struct ResultsPresenter {
    cursor: usize,
    text_order: SortOrder,
    text_collapsed: bool,
}

impl ResultsPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.cursor
    }

    pub fn text_order(&self) -> SortOrder {
        self.text_order
    }

    fn clamp(&mut self, len: usize) {
        self.cursor = if len == 0 { 0 } else { self.cursor.min(len - 1) };
    }

    pub fn previous(&mut self, len: usize) {
        self.clamp(len);
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn next(&mut self, len: usize) {
        self.clamp(len);
        if self.cursor + 1 < len {
            self.cursor += 1;
        }
    }

    pub fn toggle_sort(&mut self) {
        self.text_order = self.text_order.toggled();
    }

    pub fn toggle_text_panel(&mut self) {
        self.text_collapsed = !self.text_collapsed;
    }

    pub fn render(
        &mut self,
        header: Option<&SurveyHeader>,
        questions: &[QuestionAggregate],
        load: &LoadState,
    ) -> ResultsPage {
        self.clamp(questions.len());

        // Recomputed from the questions on screen, not the survey's own total
        let total_responses = questions.iter().map(|q| q.response_count).sum();

        let (nav, body) = match questions.get(self.cursor) {
            Some(question) => (
                Some(PageNav {
                    index: self.cursor,
                    total: questions.len(),
                    can_previous: self.cursor > 0,
                    can_next: self.cursor + 1 < questions.len(),
                }),
                PageBody::Question(self.render_question(question)),
            ),
            None if matches!(load, LoadState::Loading) => (None, PageBody::Loading),
            None => (None, PageBody::Empty),
        };

        ResultsPage {
            title: header.map(|h| h.title.clone()).unwrap_or_default(),
            description: header.map(|h| h.description.clone()).unwrap_or_default(),
            total_responses,
            error: match load {
                LoadState::Failed(message) => Some(message.clone()),
                _ => None,
            },
            connection: None,
            nav,
            body,
        }
    }

    fn render_question(&self, question: &QuestionAggregate) -> QuestionView {
        let chart = match &question.results {
            QuestionResults::MultipleChoice { options } => {
                QuestionChart::MultipleChoice(choice::render(options.as_deref()))
            }
            QuestionResults::Rating {
                average_rating,
                distribution,
            } => QuestionChart::Rating(rating::render(*average_rating, distribution.as_deref())),
            QuestionResults::Text { responses } => {
                QuestionChart::Text(text::render(responses, self.text_order, !self.text_collapsed))
            }
        };

        QuestionView {
            question_id: question.question_id.clone(),
            question_text: question.question_text.clone(),
            response_count: question.response_count,
            chart,
        }
    }
}

fn write_chart(f: &mut fmt::Formatter<'_>, chart: &Chart) -> fmt::Result {
    match chart {
        Chart::Placeholder(text) => writeln!(f, "  ({})", text),
        Chart::Bars(chart) => {
            let label_width = chart.bars.iter().map(|b| b.label.chars().count()).max().unwrap_or(0);
            for bar in &chart.bars {
                let filled = if chart.axis_max == 0 {
                    0
                } else {
                    (bar.count * BAR_WIDTH).div_ceil(chart.axis_max)
                };
                writeln!(
                    f,
                    "  {:<width$} |{}{} {}",
                    bar.label,
                    "#".repeat(filled as usize),
                    " ".repeat((BAR_WIDTH - filled) as usize),
                    bar.count,
                    width = label_width
                )?;
            }
            Ok(())
        }
    }
}

impl fmt::Display for ResultsPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = if self.title.is_empty() { "Survey results" } else { &self.title };
        writeln!(f, "== {} ==", title)?;
        if !self.description.is_empty() {
            writeln!(f, "{}", self.description)?;
        }
        write!(f, "Total responses: {}", self.total_responses)?;
        if let Some(connection) = &self.connection {
            write!(f, "  [{}]", connection.label())?;
        }
        writeln!(f)?;
        if let Some(error) = &self.error {
            writeln!(f, "! {}", error)?;
        }
        writeln!(f)?;

        match &self.body {
            PageBody::Loading => writeln!(f, "{}", LOADING)?,
            PageBody::Empty => writeln!(f, "{}", NO_DATA_YET)?,
            PageBody::Question(question) => {
                if let Some(nav) = &self.nav {
                    write!(f, "Question {} of {}: ", nav.index + 1, nav.total)?;
                }
                writeln!(f, "{} ({} responses)", question.question_text, question.response_count)?;

                match &question.chart {
                    QuestionChart::MultipleChoice(chart) => write_chart(f, chart)?,
                    QuestionChart::Rating(view) => {
                        writeln!(f, "  Average rating: {}", view.average_display)?;
                        write_chart(f, &view.distribution)?;
                    }
                    QuestionChart::Text(feed) => {
                        let marker = if feed.expanded { "-" } else { "+" };
                        writeln!(
                            f,
                            "  [{}] {} answers, {}",
                            marker,
                            feed.entries.len(),
                            feed.order.label()
                        )?;
                        if feed.expanded {
                            for entry in &feed.entries {
                                writeln!(
                                    f,
                                    "    {}  {}",
                                    entry.submitted_at.format("%Y-%m-%d %H:%M"),
                                    entry.answer_value
                                )?;
                            }
                        }
                    }
                }
            }
        }

        if let Some(nav) = &self.nav {
            writeln!(f)?;
            writeln!(
                f,
                "{}  {}",
                if nav.can_previous { "[< prev]" } else { "[      ]" },
                if nav.can_next { "[next >]" } else { "[      ]" }
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::decode_survey;
    use crate::store::ResultsStore;
    use crate::store::tests::choice;

    fn question_of(page: &ResultsPage) -> &QuestionView {
        match &page.body {
            PageBody::Question(q) => q,
            other => panic!("expected a question, got {:?}", other),
        }
    }

    #[test]
    fn clamps_cursor_when_snapshot_shrinks() {
        let mut presenter = ResultsPresenter::new();
        let three = vec![choice("q1", &[1]), choice("q2", &[1]), choice("q3", &[1])];
        presenter.next(3);
        presenter.next(3);
        let page = presenter.render(None, &three, &LoadState::Ready);
        assert_eq!(page.nav.unwrap().index, 2);
        assert_eq!(question_of(&page).question_id, "q3");

        let one = vec![choice("q1", &[1])];
        let page = presenter.render(None, &one, &LoadState::Ready);
        let nav = page.nav.unwrap();
        assert_eq!(nav.index, 0);
        assert!(!nav.can_previous && !nav.can_next);
        assert_eq!(question_of(&page).question_id, "q1");
    }

    #[test]
    fn navigation_clamps_instead_of_wrapping() {
        let mut presenter = ResultsPresenter::new();
        let questions = vec![choice("q1", &[1]), choice("q2", &[1])];

        presenter.previous(2);
        assert_eq!(presenter.index(), 0);
        let nav = presenter.render(None, &questions, &LoadState::Ready).nav.unwrap();
        assert!(!nav.can_previous);
        assert!(nav.can_next);

        presenter.next(2);
        presenter.next(2);
        assert_eq!(presenter.index(), 1);
        let nav = presenter.render(None, &questions, &LoadState::Ready).nav.unwrap();
        assert!(nav.can_previous);
        assert!(!nav.can_next);
    }

    #[test]
    fn total_is_summed_from_questions() {
        let mut presenter = ResultsPresenter::new();
        let questions = vec![choice("q1", &[2, 3]), choice("q2", &[4])];
        let page = presenter.render(None, &questions, &LoadState::Ready);
        assert_eq!(page.total_responses, 9);
    }

    #[test]
    fn empty_and_loading_placeholders() {
        let mut presenter = ResultsPresenter::new();
        let page = presenter.render(None, &[], &LoadState::Loading);
        assert_eq!(page.body, PageBody::Loading);
        assert!(page.nav.is_none());

        let page = presenter.render(None, &[], &LoadState::Ready);
        assert_eq!(page.body, PageBody::Empty);
        assert!(page.to_string().contains(NO_DATA_YET));

        let page = presenter.render(None, &[], &LoadState::Failed("Survey not found".into()));
        assert_eq!(page.body, PageBody::Empty);
        assert_eq!(page.error.as_deref(), Some("Survey not found"));
    }

    #[test]
    fn multiple_choice_end_to_end() {
        let survey = decode_survey(
            r#"{"questions": [{"id": "q1", "type": "multiple-choice",
                "options": [{"option_text": "A", "count": 2}, {"option_text": "B", "count": 5}]}]}"#,
        )
        .unwrap();
        let mut store = ResultsStore::new();
        store.apply_questions(survey.questions);

        let mut presenter = ResultsPresenter::new();
        let page = presenter.render(store.header(), &store.snapshot(), &LoadState::Ready);
        match &question_of(&page).chart {
            QuestionChart::MultipleChoice(Chart::Bars(chart)) => {
                assert_eq!(chart.axis_max, 5);
                let counts: Vec<u64> = chart.bars.iter().map(|b| b.count).collect();
                assert_eq!(counts, vec![2, 5]);
            }
            other => panic!("expected bars, got {:?}", other),
        }
    }

    #[test]
    fn rating_without_data_renders_placeholders() {
        let survey = decode_survey(r#"{"questions": [{"id": "q2", "type": "rating"}]}"#).unwrap();
        let mut store = ResultsStore::new();
        store.apply_questions(survey.questions);

        let mut presenter = ResultsPresenter::new();
        let page = presenter.render(None, &store.snapshot(), &LoadState::Ready);
        match &question_of(&page).chart {
            QuestionChart::Rating(view) => {
                assert_eq!(view.average, None);
                assert_eq!(view.average_display, NOT_AVAILABLE);
                assert_eq!(view.distribution, Chart::Placeholder(NO_DISTRIBUTION_DATA));
            }
            other => panic!("expected rating, got {:?}", other),
        }
        let text = page.to_string();
        assert!(text.contains(NOT_AVAILABLE));
        assert!(text.contains(NO_DISTRIBUTION_DATA));
    }

    #[test]
    fn text_feed_sort_toggle() {
        let survey = decode_survey(
            r#"{"questions": [{"id": "q3", "type": "text", "responses": [
                {"answer_value": "x", "submitted_at": "2024-01-01T00:00:00Z"},
                {"answer_value": "y", "submitted_at": "2024-02-01T00:00:00Z"}]}]}"#,
        )
        .unwrap();
        let mut store = ResultsStore::new();
        store.apply_questions(survey.questions);
        let snapshot = store.snapshot();

        let answers = |page: &ResultsPage| -> Vec<String> {
            match &question_of(page).chart {
                QuestionChart::Text(feed) => {
                    feed.entries.iter().map(|e| e.answer_value.clone()).collect()
                }
                other => panic!("expected text, got {:?}", other),
            }
        };

        let mut presenter = ResultsPresenter::new();
        assert_eq!(answers(&presenter.render(None, &snapshot, &LoadState::Ready)), vec!["y", "x"]);

        presenter.toggle_sort();
        assert_eq!(presenter.text_order(), SortOrder::OldestFirst);
        assert_eq!(answers(&presenter.render(None, &snapshot, &LoadState::Ready)), vec!["x", "y"]);

        presenter.toggle_sort();
        assert_eq!(answers(&presenter.render(None, &snapshot, &LoadState::Ready)), vec!["y", "x"]);

        // Underlying data keeps its arrival order
        match &store.get("q3").unwrap().results {
            QuestionResults::Text { responses } => assert_eq!(responses[0].answer_value, "x"),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn collapsed_text_panel_hides_entries_in_output() {
        let survey = decode_survey(
            r#"{"questions": [{"id": "q3", "type": "text", "responses": [
                {"answer_value": "nakama", "submitted_at": "2024-01-01T00:00:00Z"}]}]}"#,
        )
        .unwrap();
        let mut presenter = ResultsPresenter::new();
        assert!(presenter.render(None, &survey.questions, &LoadState::Ready).to_string().contains("nakama"));

        presenter.toggle_text_panel();
        let page = presenter.render(None, &survey.questions, &LoadState::Ready);
        assert!(!page.to_string().contains("nakama"));
        match &question_of(&page).chart {
            QuestionChart::Text(feed) => assert!(!feed.expanded),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn display_shows_header_and_bars() {
        let header = SurveyHeader {
            survey_id: "s1".into(),
            title: "Best opening".into(),
            description: "Season 2024".into(),
        };
        let mut presenter = ResultsPresenter::new();
        let mut page = presenter.render(Some(&header), &[choice("q1", &[1, 4])], &LoadState::Ready);
        page.connection = Some(ConnectionState::Open);

        let text = page.to_string();
        assert!(text.contains("== Best opening =="));
        assert!(text.contains("Total responses: 5  [live]"));
        assert!(text.contains("Question 1 of 1"));
        assert!(text.contains(&format!("|{} 4", "#".repeat(BAR_WIDTH as usize))));
    }
}
