use uuid::Uuid;

use crate::models::question::{Question, QuestionType, Translation};

#[derive(Debug, Clone, PartialEq)]
pub struct LocalizedOption {
    pub id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalizedQuestion {
    pub id: Uuid,
    pub question_type: QuestionType,
    pub field_key: Option<String>,
    pub text: Option<String>,
    pub options: Vec<LocalizedOption>,
}

impl LocalizedQuestion {
    /// Untranslated questions, and choice questions left without a single
    /// translated option, keep their slot but are skipped.
    pub fn is_servable(&self) -> bool {
        self.text.is_some()
            && (self.question_type != QuestionType::Choice || !self.options.is_empty())
    }

    pub fn option(&self, option_id: Uuid) -> Option<&LocalizedOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step<'a> {
    Ask(&'a LocalizedQuestion),
    Complete,
}

pub fn pick_translation<'a>(
    translations: &'a [Translation],
    lang: &str,
    default_lang: &str,
) -> Option<&'a str> {
    translations
        .iter()
        .find(|t| t.lang == lang)
        .or_else(|| translations.iter().find(|t| t.lang == default_lang))
        .or_else(|| translations.first())
        .map(|t| t.text.as_str())
}

pub fn resolve_questions(
    questions: &[Question],
    lang: &str,
    default_lang: &str,
) -> Vec<LocalizedQuestion> {
    let mut active: Vec<&Question> = questions.iter().filter(|q| q.is_active).collect();
    active.sort_by_key(|q| q.order);

    active
        .into_iter()
        .map(|q| {
            let mut options: Vec<_> = q.options.iter().collect();
            options.sort_by_key(|o| o.order);
            LocalizedQuestion {
                id: q.id,
                question_type: q.question_type,
                field_key: q.field_key.clone(),
                text: pick_translation(&q.translations, lang, default_lang).map(str::to_string),
                options: options
                    .into_iter()
                    .filter_map(|o| {
                        pick_translation(&o.translations, lang, default_lang).map(|text| {
                            LocalizedOption {
                                id: o.id,
                                text: text.to_string(),
                            }
                        })
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Pure cursor lookup. A step at or past the end is completion, which also covers
/// questions that were deactivated after the candidate advanced.
pub fn resolve_step(questions: &[LocalizedQuestion], step: i32) -> Step<'_> {
    usize::try_from(step)
        .ok()
        .and_then(|i| questions.get(i))
        .map_or(Step::Complete, Step::Ask)
}

pub fn next_servable(questions: &[LocalizedQuestion], from: i32) -> i32 {
    let start = usize::try_from(from).unwrap_or(0);
    let index = questions
        .iter()
        .enumerate()
        .skip(start)
        .find(|(_, q)| q.is_servable())
        .map_or(questions.len(), |(i, _)| i);
    i32::try_from(index).unwrap_or(i32::MAX)
}
