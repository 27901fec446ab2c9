use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::models::{QuestionAggregate, SurveyAggregate};

/// Survey-level fields of the most recent aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurveyHeader {
    pub survey_id: String,
    pub title: String,
    pub description: String,
}

/// Aggregates keyed by question id, listed in first-seen order.
#[derive(Debug, Default)]
pub struct ResultsStore {
    order: Vec<String>,
    entries: HashMap<String, QuestionAggregate>,
    header: Option<SurveyHeader>,
    generation: u64,
}

impl ResultsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.order.clear();
        self.entries.clear();
        self.header = None;
        self.generation += 1;
    }

    /// Insert or fully replace each question by id. A question id seen for the
    /// first time is appended to the display order; known ids keep their slot.
    pub fn apply_questions<I>(&mut self, questions: I)
    where
        I: IntoIterator<Item = QuestionAggregate>,
    {
        for question in questions {
            if !self.entries.contains_key(&question.question_id) {
                self.order.push(question.question_id.clone());
            }
            self.entries.insert(question.question_id.clone(), question);
        }
        self.generation += 1;
    }

    pub fn apply_survey(&mut self, survey: SurveyAggregate) {
        self.header = Some(SurveyHeader {
            survey_id: survey.survey_id,
            title: survey.title,
            description: survey.description,
        });
        self.apply_questions(survey.questions);
    }

    pub fn snapshot(&self) -> Vec<QuestionAggregate> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .cloned()
            .collect()
    }

    pub fn header(&self) -> Option<&SurveyHeader> {
        self.header.as_ref()
    }

    pub fn get(&self, question_id: &str) -> Option<&QuestionAggregate> {
        self.entries.get(question_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Bumped on every write, used to detect changes between renders.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

// Shared by the loader and the live feed. Writes check the cancel token under
// the lock, and detach() cancels under the same lock.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<Mutex<ResultsStore>>,
    cancel: CancellationToken,
    changed: Arc<watch::Sender<u64>>,
}

impl StoreHandle {
    pub fn new(cancel: CancellationToken) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(ResultsStore::new())),
            cancel,
            changed: Arc::new(changed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ResultsStore> {
        match self.inner.lock() {
            Ok(store) => store,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn reset(&self) -> bool {
        self.write(|store| store.reset())
    }

    /// Returns false when the view was already torn down and nothing was written.
    pub fn apply_survey(&self, survey: SurveyAggregate) -> bool {
        self.write(|store| store.apply_survey(survey))
    }

    pub fn apply_questions(&self, questions: Vec<QuestionAggregate>) -> bool {
        self.write(|store| store.apply_questions(questions))
    }

    fn write<F>(&self, mutate: F) -> bool
    where
        F: FnOnce(&mut ResultsStore),
    {
        let mut store = self.lock();
        if self.cancel.is_cancelled() {
            debug!("Dropping results write after view teardown");
            return false;
        }
        mutate(&mut store);
        self.changed.send_replace(store.generation());
        true
    }

    pub fn snapshot(&self) -> (Option<SurveyHeader>, Vec<QuestionAggregate>) {
        let store = self.lock();
        (store.header().cloned(), store.snapshot())
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_detached(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Tear down: cancel every writer and discard the contents.
    pub fn detach(&self) {
        let mut store = self.lock();
        self.cancel.cancel();
        store.reset();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{OptionCount, QuestionResults};

    pub(crate) fn choice(id: &str, counts: &[u64]) -> QuestionAggregate {
        QuestionAggregate {
            question_id: id.to_string(),
            question_text: format!("Question {}", id),
            response_count: counts.iter().sum(),
            results: QuestionResults::MultipleChoice {
                options: Some(
                    counts
                        .iter()
                        .enumerate()
                        .map(|(i, count)| OptionCount {
                            option_text: format!("Option {}", i + 1),
                            count: *count,
                        })
                        .collect(),
                ),
            },
        }
    }

    fn ids(store: &ResultsStore) -> Vec<String> {
        store.snapshot().into_iter().map(|q| q.question_id).collect()
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let batch = vec![choice("q1", &[1, 2]), choice("q2", &[3])];
        let mut store = ResultsStore::new();

        store.apply_questions(batch.clone());
        let first = store.snapshot();
        store.apply_questions(batch);
        assert_eq!(store.snapshot(), first);
    }

    #[test]
    fn later_write_replaces_whole_entry() {
        let mut store = ResultsStore::new();
        store.apply_questions(vec![choice("q1", &[3])]);

        let mut update = choice("q1", &[5]);
        update.question_text = "Renamed".to_string();
        store.apply_questions(vec![update.clone()]);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0], update);
        assert_eq!(snapshot[0].response_count, 5);
    }

    #[test]
    fn last_occurrence_wins_within_one_call() {
        let mut store = ResultsStore::new();
        store.apply_questions(vec![choice("q1", &[1]), choice("q2", &[2]), choice("q1", &[9])]);
        assert_eq!(ids(&store), vec!["q1", "q2"]);
        assert_eq!(store.get("q1").unwrap().response_count, 9);
    }

    #[test]
    fn updates_keep_first_seen_order() {
        let mut store = ResultsStore::new();
        store.apply_questions(vec![choice("q1", &[1])]);
        store.apply_questions(vec![choice("q2", &[1])]);
        store.apply_questions(vec![choice("q1", &[4])]);
        assert_eq!(ids(&store), vec!["q1", "q2"]);
    }

    #[test]
    fn reset_clears_everything() {
        let mut store = ResultsStore::new();
        store.apply_survey(SurveyAggregate {
            survey_id: "s1".to_string(),
            title: "Favourite mecha".to_string(),
            description: String::new(),
            total_responses: 1,
            questions: vec![choice("q1", &[1])],
        });
        assert_eq!(store.header().unwrap().title, "Favourite mecha");

        let before = store.generation();
        store.reset();
        assert!(store.is_empty());
        assert!(store.header().is_none());
        assert!(store.generation() > before);
    }

    #[test]
    fn handle_refuses_writes_after_detach() {
        let handle = StoreHandle::new(CancellationToken::new());
        let mut changes = handle.subscribe();

        assert!(handle.apply_questions(vec![choice("q1", &[1])]));
        assert!(changes.has_changed().unwrap());
        changes.mark_unchanged();

        handle.detach();
        assert!(handle.is_detached());
        assert!(!handle.apply_questions(vec![choice("q2", &[1])]));

        let (header, questions) = handle.snapshot();
        assert!(header.is_none());
        assert!(questions.is_empty());
        assert!(!changes.has_changed().unwrap());
    }
}
