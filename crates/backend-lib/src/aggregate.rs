// ============================
// crates/backend-lib/src/aggregate.rs
// ============================
//! Per-session aggregation of audience responses.
//!
//! Responses are keyed by (slide, participant) with upsert semantics:
//! a resubmission replaces the prior content and the tally is patched
//! with the delta of that one response, never recomputed from scratch.
//! Anonymous submissions carry no participant key, so duplicate
//! prevention for them is best-effort only: each one counts once.
use crate::error::AppError;
use chrono::Utc;
use livedeck_common::{
    OptionId, ParticipantId, Response, ResponseContent, SessionId, Slide, SlideId, SlideKind,
};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Running tally for one slide.
#[derive(Debug, Clone)]
enum SlideTally {
    Choice { votes: HashMap<OptionId, u64> },
    Text { total: u64 },
}

/// Accumulates responses and derived tallies for one session.
pub struct AggregationEngine {
    session_id: SessionId,
    by_key: HashMap<(SlideId, ParticipantId), Response>,
    anonymous: HashMap<SlideId, Vec<Response>>,
    tallies: HashMap<SlideId, SlideTally>,
}

impl AggregationEngine {
    pub fn new(session_id: SessionId) -> Self {
        AggregationEngine {
            session_id,
            by_key: HashMap::new(),
            anonymous: HashMap::new(),
            tallies: HashMap::new(),
        }
    }

    /// Store a response and patch the slide tally. Returns the stored
    /// `Response`; a repeat submission from the same participant to
    /// the same slide replaces the earlier one and never double
    /// counts.
    pub fn submit(
        &mut self,
        slide: &Slide,
        participant_id: Option<ParticipantId>,
        content: ResponseContent,
    ) -> Result<Response, AppError> {
        let content = validate_content(slide, content)?;

        let response = Response {
            id: Uuid::new_v4(),
            session_id: self.session_id,
            slide_id: slide.id,
            participant_id,
            content,
            is_ai_response: false,
            created_at: Utc::now(),
        };

        match participant_id {
            Some(pid) => {
                let key = (slide.id, pid);
                if let Some(prior) = self.by_key.insert(key, response.clone()) {
                    self.retract(slide, &prior.content);
                }
                self.apply(slide, &response.content);
            },
            None => {
                // No identity to dedupe on; append and count once.
                self.apply(slide, &response.content);
                self.anonymous
                    .entry(slide.id)
                    .or_default()
                    .push(response.clone());
            },
        }

        Ok(response)
    }

    /// Derived tally for a slide: option-id to count for choice
    /// slides (every option present, zeroes included), response count
    /// for text slides.
    pub fn tally_for(&self, slide: &Slide) -> (BTreeMap<OptionId, u64>, u64) {
        match (&slide.kind, self.tallies.get(&slide.id)) {
            (SlideKind::QuestionChoice { options, .. }, tally) => {
                let votes = match tally {
                    Some(SlideTally::Choice { votes }) => votes.clone(),
                    _ => HashMap::new(),
                };
                let map: BTreeMap<OptionId, u64> = options
                    .iter()
                    .map(|opt| (opt.id.clone(), votes.get(&opt.id).copied().unwrap_or(0)))
                    .collect();
                let total = self.live_response_count(slide.id);
                (map, total)
            },
            (_, Some(SlideTally::Text { total })) => (BTreeMap::new(), *total),
            _ => (BTreeMap::new(), 0),
        }
    }

    /// Live responses for one slide (each participant at most once,
    /// plus any anonymous submissions).
    pub fn live_response_count(&self, slide_id: SlideId) -> u64 {
        let keyed = self
            .by_key
            .keys()
            .filter(|(sid, _)| *sid == slide_id)
            .count() as u64;
        let anon = self
            .anonymous
            .get(&slide_id)
            .map_or(0, |rs| rs.len() as u64);
        keyed + anon
    }

    /// Total live responses across all slides.
    pub fn total_responses(&self) -> u64 {
        let anon: usize = self.anonymous.values().map(Vec::len).sum();
        (self.by_key.len() + anon) as u64
    }

    /// Live response count per slide, for session statistics.
    pub fn responses_per_slide(&self) -> HashMap<SlideId, u64> {
        let mut per_slide: HashMap<SlideId, u64> = HashMap::new();
        for (slide_id, _) in self.by_key.keys() {
            *per_slide.entry(*slide_id).or_default() += 1;
        }
        for (slide_id, responses) in &self.anonymous {
            *per_slide.entry(*slide_id).or_default() += responses.len() as u64;
        }
        per_slide
    }

    fn apply(&mut self, slide: &Slide, content: &ResponseContent) {
        let tally = self.tallies.entry(slide.id).or_insert_with(|| {
            if matches!(slide.kind, SlideKind::QuestionChoice { .. }) {
                SlideTally::Choice {
                    votes: HashMap::new(),
                }
            } else {
                SlideTally::Text { total: 0 }
            }
        });
        match (tally, content) {
            (SlideTally::Choice { votes }, ResponseContent::Choice { option_ids }) => {
                for id in option_ids {
                    *votes.entry(id.clone()).or_default() += 1;
                }
            },
            (SlideTally::Text { total }, ResponseContent::Text { .. }) => *total += 1,
            _ => {},
        }
    }

    fn retract(&mut self, slide: &Slide, content: &ResponseContent) {
        let Some(tally) = self.tallies.get_mut(&slide.id) else {
            return;
        };
        match (tally, content) {
            (SlideTally::Choice { votes }, ResponseContent::Choice { option_ids }) => {
                for id in option_ids {
                    if let Some(count) = votes.get_mut(id) {
                        *count = count.saturating_sub(1);
                    }
                }
            },
            (SlideTally::Text { total }, ResponseContent::Text { .. }) => {
                *total = total.saturating_sub(1);
            },
            _ => {},
        }
    }
}

/// Check a content payload against the slide kind. Returns the
/// normalized content (duplicate option selections collapsed) or a
/// `ValidationError` with no aggregate mutation.
pub fn validate_content(
    slide: &Slide,
    content: ResponseContent,
) -> Result<ResponseContent, AppError> {
    match (&slide.kind, content) {
        (
            SlideKind::QuestionText { max_length, .. },
            ResponseContent::Text { text },
        ) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(AppError::Validation("text response is empty".to_string()));
            }
            if let Some(max) = max_length {
                if trimmed.chars().count() > *max {
                    return Err(AppError::Validation(format!(
                        "text response exceeds {max} characters"
                    )));
                }
            }
            Ok(ResponseContent::Text {
                text: trimmed.to_string(),
            })
        },
        (
            SlideKind::QuestionChoice {
                options,
                allow_multiple,
                ..
            },
            ResponseContent::Choice { option_ids },
        ) => {
            let mut seen = Vec::new();
            for id in option_ids {
                if !options.iter().any(|opt| opt.id == id) {
                    return Err(AppError::Validation(format!("unknown option id: {id}")));
                }
                if !seen.contains(&id) {
                    seen.push(id);
                }
            }
            if seen.is_empty() {
                return Err(AppError::Validation("no option selected".to_string()));
            }
            if !allow_multiple && seen.len() > 1 {
                return Err(AppError::Validation(
                    "slide allows a single selection".to_string(),
                ));
            }
            Ok(ResponseContent::Choice { option_ids: seen })
        },
        (kind, _) if !kind.accepts_responses() => Err(AppError::Validation(
            "slide does not accept responses".to_string(),
        )),
        _ => Err(AppError::Validation(
            "content shape does not match slide kind".to_string(),
        )),
    }
}

/// Tally a stored batch of responses for one slide. Used by the
/// snapshot query path, where rows come from the store rather than
/// the in-memory engine. AI-origin rows are excluded.
pub fn tally_responses(slide: &Slide, responses: &[Response]) -> (BTreeMap<OptionId, u64>, u64) {
    let live: Vec<&Response> = responses.iter().filter(|r| !r.is_ai_response).collect();
    match &slide.kind {
        SlideKind::QuestionChoice { options, .. } => {
            let mut map: BTreeMap<OptionId, u64> =
                options.iter().map(|opt| (opt.id.clone(), 0)).collect();
            for response in &live {
                if let ResponseContent::Choice { option_ids } = &response.content {
                    for id in option_ids {
                        if let Some(count) = map.get_mut(id) {
                            *count += 1;
                        }
                    }
                }
            }
            (map, live.len() as u64)
        },
        _ => (BTreeMap::new(), live.len() as u64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livedeck_common::ChoiceOption;

    fn choice_slide() -> Slide {
        Slide {
            id: Uuid::new_v4(),
            order_index: 0,
            kind: SlideKind::QuestionChoice {
                question: "pick one".to_string(),
                options: vec![
                    ChoiceOption {
                        id: "opt1".to_string(),
                        text: "One".to_string(),
                    },
                    ChoiceOption {
                        id: "opt2".to_string(),
                        text: "Two".to_string(),
                    },
                ],
                allow_multiple: false,
            },
        }
    }

    fn text_slide() -> Slide {
        Slide {
            id: Uuid::new_v4(),
            order_index: 1,
            kind: SlideKind::QuestionText {
                question: "why?".to_string(),
                max_length: Some(10),
                required: true,
            },
        }
    }

    fn vote(option: &str) -> ResponseContent {
        ResponseContent::Choice {
            option_ids: vec![option.to_string()],
        }
    }

    #[test]
    fn test_vote_counts_accumulate() {
        let slide = choice_slide();
        let mut engine = AggregationEngine::new(Uuid::new_v4());

        engine
            .submit(&slide, Some(Uuid::new_v4()), vote("opt1"))
            .unwrap();
        engine
            .submit(&slide, Some(Uuid::new_v4()), vote("opt1"))
            .unwrap();
        engine
            .submit(&slide, Some(Uuid::new_v4()), vote("opt2"))
            .unwrap();

        let (votes, total) = engine.tally_for(&slide);
        assert_eq!(votes["opt1"], 2);
        assert_eq!(votes["opt2"], 1);
        assert_eq!(total, 3);
    }

    #[test]
    fn test_resubmission_replaces_not_duplicates() {
        let slide = choice_slide();
        let mut engine = AggregationEngine::new(Uuid::new_v4());
        let alice = Uuid::new_v4();

        engine.submit(&slide, Some(alice), vote("opt1")).unwrap();
        let (votes, total) = engine.tally_for(&slide);
        assert_eq!(votes["opt1"], 1);
        assert_eq!(total, 1);

        engine.submit(&slide, Some(alice), vote("opt2")).unwrap();
        let (votes, total) = engine.tally_for(&slide);
        assert_eq!(votes["opt1"], 0);
        assert_eq!(votes["opt2"], 1);
        assert_eq!(total, 1);
    }

    #[test]
    fn test_anonymous_submissions_count_individually() {
        let slide = choice_slide();
        let mut engine = AggregationEngine::new(Uuid::new_v4());

        engine.submit(&slide, None, vote("opt1")).unwrap();
        engine.submit(&slide, None, vote("opt1")).unwrap();

        let (votes, total) = engine.tally_for(&slide);
        // no identity, no dedupe
        assert_eq!(votes["opt1"], 2);
        assert_eq!(total, 2);
    }

    #[test]
    fn test_text_responses_tally_as_count() {
        let slide = text_slide();
        let mut engine = AggregationEngine::new(Uuid::new_v4());
        let alice = Uuid::new_v4();

        engine
            .submit(
                &slide,
                Some(alice),
                ResponseContent::Text {
                    text: "because".to_string(),
                },
            )
            .unwrap();
        engine
            .submit(
                &slide,
                Some(Uuid::new_v4()),
                ResponseContent::Text {
                    text: "why not".to_string(),
                },
            )
            .unwrap();
        // Alice edits her answer
        engine
            .submit(
                &slide,
                Some(alice),
                ResponseContent::Text {
                    text: "changed".to_string(),
                },
            )
            .unwrap();

        let (votes, total) = engine.tally_for(&slide);
        assert!(votes.is_empty());
        assert_eq!(total, 2);
    }

    #[test]
    fn test_wrong_content_shape_rejected_without_mutation() {
        let slide = choice_slide();
        let mut engine = AggregationEngine::new(Uuid::new_v4());

        let err = engine
            .submit(
                &slide,
                Some(Uuid::new_v4()),
                ResponseContent::Text {
                    text: "not a vote".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let (_, total) = engine.tally_for(&slide);
        assert_eq!(total, 0);
    }

    #[test]
    fn test_unknown_option_rejected() {
        let slide = choice_slide();
        let mut engine = AggregationEngine::new(Uuid::new_v4());
        let err = engine
            .submit(&slide, Some(Uuid::new_v4()), vote("opt9"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_single_choice_rejects_multi_select() {
        let slide = choice_slide();
        let mut engine = AggregationEngine::new(Uuid::new_v4());
        let err = engine
            .submit(
                &slide,
                Some(Uuid::new_v4()),
                ResponseContent::Choice {
                    option_ids: vec!["opt1".to_string(), "opt2".to_string()],
                },
            )
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_duplicate_selection_collapsed() {
        let slide = choice_slide();
        let content = validate_content(
            &slide,
            ResponseContent::Choice {
                option_ids: vec!["opt1".to_string(), "opt1".to_string()],
            },
        )
        .unwrap();
        assert_eq!(
            content,
            ResponseContent::Choice {
                option_ids: vec!["opt1".to_string()]
            }
        );
    }

    #[test]
    fn test_text_length_limit() {
        let slide = text_slide();
        let err = validate_content(
            &slide,
            ResponseContent::Text {
                text: "far too long an answer".to_string(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_content_slide_rejects_responses() {
        let slide = Slide {
            id: Uuid::new_v4(),
            order_index: 0,
            kind: SlideKind::Content {
                text: "welcome".to_string(),
                image_url: None,
            },
        };
        let err = validate_content(
            &slide,
            ResponseContent::Text {
                text: "hi".to_string(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_tally_responses_from_store_rows() {
        let slide = choice_slide();
        let session_id = Uuid::new_v4();
        let row = |content: ResponseContent, ai: bool| Response {
            id: Uuid::new_v4(),
            session_id,
            slide_id: slide.id,
            participant_id: None,
            content,
            is_ai_response: ai,
            created_at: Utc::now(),
        };

        let rows = vec![
            row(vote("opt1"), false),
            row(vote("opt2"), false),
            row(vote("opt2"), true), // AI rows are excluded
        ];
        let (votes, total) = tally_responses(&slide, &rows);
        assert_eq!(votes["opt1"], 1);
        assert_eq!(votes["opt2"], 1);
        assert_eq!(total, 2);
    }
}
