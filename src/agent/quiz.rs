//! Quiz generation and grading

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::lesson::Lesson;
use super::llm::{parse_json, ChatMessage, CompletionService, GenerationError};
use crate::progress::UserSkillProgress;
use crate::types::Difficulty;

const SYSTEM_PROMPT: &str = "You are a quiz expert. Always respond with valid JSON.";
const QUIZ_MAX_TOKENS: u32 = 1200;
const TEMPERATURE: f32 = 0.7;

/// One quiz question, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Question {
    MultipleChoice {
        question: String,
        #[serde(default)]
        options: Vec<String>,
        #[serde(deserialize_with = "deserialize_text")]
        correct_answer: String,
        #[serde(default)]
        explanation: String,
    },
    TrueFalse {
        question: String,
        #[serde(deserialize_with = "deserialize_bool_answer")]
        correct_answer: bool,
        #[serde(default)]
        explanation: String,
    },
    ShortAnswer {
        question: String,
        #[serde(deserialize_with = "deserialize_text")]
        correct_answer: String,
        #[serde(default)]
        explanation: String,
    },
}

/// Accept a string or any scalar, normalized to a string
fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

/// Accept `true`/`false` as booleans or case-insensitive strings
fn deserialize_bool_answer<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(serde::de::Error::custom(format!("invalid true/false answer: {}", s))),
        },
        other => Err(serde::de::Error::custom(format!("invalid true/false answer: {}", other))),
    }
}

fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}

impl Question {
    pub fn text(&self) -> &str {
        match self {
            Question::MultipleChoice { question, .. }
            | Question::TrueFalse { question, .. }
            | Question::ShortAnswer { question, .. } => question,
        }
    }

    pub fn explanation(&self) -> &str {
        match self {
            Question::MultipleChoice { explanation, .. }
            | Question::TrueFalse { explanation, .. }
            | Question::ShortAnswer { explanation, .. } => explanation,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Question::MultipleChoice { .. } => "multiple_choice",
            Question::TrueFalse { .. } => "true_false",
            Question::ShortAnswer { .. } => "short_answer",
        }
    }

    /// Answer choices shown to the learner
    pub fn options(&self) -> Vec<String> {
        match self {
            Question::MultipleChoice { options, .. } => options.clone(),
            Question::TrueFalse { .. } => vec!["True".to_string(), "False".to_string()],
            Question::ShortAnswer { .. } => Vec::new(),
        }
    }

    pub fn correct_answer(&self) -> String {
        match self {
            Question::MultipleChoice { correct_answer, .. }
            | Question::ShortAnswer { correct_answer, .. } => correct_answer.clone(),
            Question::TrueFalse { correct_answer, .. } => correct_answer.to_string(),
        }
    }

    /// Trimmed, case-insensitive comparison against the correct answer
    pub fn is_correct(&self, answer: &str) -> bool {
        normalize(answer) == normalize(&self.correct_answer())
    }

    fn validate(&self) -> Result<(), String> {
        if self.text().trim().is_empty() {
            return Err("question text is empty".to_string());
        }
        match self {
            Question::MultipleChoice { options, correct_answer, .. } => {
                if options.iter().all(|o| o.trim().is_empty()) {
                    return Err("multiple choice question has no options".to_string());
                }
                if correct_answer.trim().is_empty() {
                    return Err("multiple choice question has no answer".to_string());
                }
            }
            Question::ShortAnswer { correct_answer, .. } if correct_answer.trim().is_empty() => {
                return Err("short answer question has no answer".to_string());
            }
            _ => {}
        }
        Ok(())
    }
}

/// Outcome for a single question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionResult {
    pub question: String,
    pub user_answer: Option<String>,
    pub correct_answer: String,
    pub correct: bool,
    pub explanation: String,
}

/// Graded quiz
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizResult {
    pub correct: u32,
    pub total: u32,
    /// Fraction in 0.0..=1.0
    pub score: f64,
    pub results: Vec<QuestionResult>,
}

impl QuizResult {
    pub fn is_perfect(&self) -> bool {
        self.total > 0 && self.correct == self.total
    }

    pub fn percentage(&self) -> f64 {
        self.score * 100.0
    }
}

/// A quiz over one lesson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub skill: String,
    pub difficulty: Difficulty,
    pub lesson_title: String,
    pub questions: Vec<Question>,
}

impl Quiz {
    /// One-question quiz served when generation fails
    pub fn fallback(lesson: &Lesson) -> Self {
        let skill = &lesson.skill;
        Self {
            skill: skill.clone(),
            difficulty: lesson.difficulty,
            lesson_title: lesson.title.clone(),
            questions: vec![Question::MultipleChoice {
                question: format!("What is the main topic of this lesson about {}?", skill),
                options: vec![
                    skill.clone(),
                    "Something else".to_string(),
                    "Not sure".to_string(),
                    "All of the above".to_string(),
                ],
                correct_answer: skill.clone(),
                explanation: format!("This lesson focuses on {}", skill),
            }],
        }
    }

    /// Grade answers positionally. Missing answers count as wrong.
    pub fn grade(&self, answers: &[String]) -> QuizResult {
        let results: Vec<QuestionResult> = self
            .questions
            .iter()
            .enumerate()
            .map(|(i, question)| {
                let user_answer = answers.get(i).cloned();
                let correct = user_answer
                    .as_deref()
                    .map(|a| question.is_correct(a))
                    .unwrap_or(false);
                QuestionResult {
                    question: question.text().to_string(),
                    user_answer,
                    correct_answer: question.correct_answer(),
                    correct,
                    explanation: question.explanation().to_string(),
                }
            })
            .collect();

        let total = results.len() as u32;
        let correct = results.iter().filter(|r| r.correct).count() as u32;
        let score = if total == 0 { 0.0 } else { correct as f64 / total as f64 };

        QuizResult { correct, total, score, results }
    }
}

#[derive(Debug, Deserialize)]
struct QuizPayload {
    questions: Vec<Value>,
}

/// Parse and validate the model's question list, keeping at most `max_questions`
fn parse_questions(text: &str, max_questions: usize) -> Result<Vec<Question>, GenerationError> {
    let payload: QuizPayload = parse_json(text)?;

    let mut questions = Vec::new();
    for raw in payload.questions {
        let question = match serde_json::from_value::<Question>(raw) {
            Ok(q) => q,
            Err(e) => {
                debug!("Skipping unparseable question: {}", e);
                continue;
            }
        };
        if let Err(reason) = question.validate() {
            debug!("Skipping invalid question: {}", reason);
            continue;
        }
        questions.push(question);
    }

    if questions.is_empty() {
        return Err(GenerationError::Invalid("quiz has no usable questions".to_string()));
    }
    questions.truncate(max_questions.max(1));
    Ok(questions)
}

/// Generates quizzes through a completion service
#[derive(Clone)]
pub struct QuizAgent {
    completion: Arc<dyn CompletionService>,
    max_questions: usize,
}

impl QuizAgent {
    pub fn new(completion: Arc<dyn CompletionService>, max_questions: usize) -> Self {
        Self { completion, max_questions }
    }

    /// Generate a quiz for a lesson, falling back to a single question on any failure
    pub async fn generate(&self, lesson: &Lesson, progress: &UserSkillProgress) -> Quiz {
        match self.try_generate(lesson, progress).await {
            Ok(quiz) => {
                debug!("Generated {} questions for '{}'", quiz.questions.len(), lesson.title);
                quiz
            }
            Err(e) => {
                warn!("Quiz generation for '{}' failed, using fallback: {}", lesson.title, e);
                Quiz::fallback(lesson)
            }
        }
    }

    async fn try_generate(&self, lesson: &Lesson, progress: &UserSkillProgress) -> Result<Quiz, GenerationError> {
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(quiz_prompt(lesson, progress.average_score(), self.max_questions)),
        ];
        let text = self.completion.complete(messages, QUIZ_MAX_TOKENS, TEMPERATURE).await?;
        let questions = parse_questions(&text, self.max_questions)?;

        Ok(Quiz {
            skill: lesson.skill.clone(),
            difficulty: lesson.difficulty,
            lesson_title: lesson.title.clone(),
            questions,
        })
    }
}

fn quiz_prompt(lesson: &Lesson, average_score: f64, max_questions: usize) -> String {
    let upper = max_questions.max(1);
    let lower = upper.min(3);
    format!(
        r#"Create a quiz for this lesson:
Title: {title}
Content: {content}
Key concepts: {concepts}

User's average score: {average:.0}%
Current difficulty: {difficulty}

Create {lower}-{upper} questions that test understanding of the lesson.
Mix question types: multiple choice, true/false, and short answer.

Format as JSON:
{{
    "questions": [
        {{
            "type": "multiple_choice",
            "question": "Question text?",
            "options": ["A", "B", "C", "D"],
            "correct_answer": "A",
            "explanation": "Why this is correct"
        }},
        {{
            "type": "true_false",
            "question": "Statement to evaluate",
            "correct_answer": true,
            "explanation": "Explanation"
        }},
        {{
            "type": "short_answer",
            "question": "Question text?",
            "correct_answer": "Expected answer",
            "explanation": "Explanation"
        }}
    ]
}}"#,
        title = lesson.title,
        content = lesson.content,
        concepts = lesson.key_concepts.join(", "),
        average = average_score * 100.0,
        difficulty = lesson.difficulty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::llm::MockCompletionService;
    use serde_json::json;

    fn lesson() -> Lesson {
        Lesson {
            title: "Variables".to_string(),
            content: "Variables hold values.".to_string(),
            skill: "Python".to_string(),
            difficulty: Difficulty::Beginner,
            duration_minutes: 4,
            key_concepts: vec!["assignment".to_string()],
        }
    }

    fn agent_returning(text: &'static str, max_questions: usize) -> QuizAgent {
        let mut mock = MockCompletionService::new();
        mock.expect_complete()
            .times(1)
            .returning(move |_, _, _| Ok(text.to_string()));
        QuizAgent::new(Arc::new(mock), max_questions)
    }

    #[test]
    fn test_true_false_accepts_strings() {
        let q: Question = serde_json::from_value(json!({
            "type": "true_false", "question": "Is Python typed?", "correct_answer": "False"
        }))
        .unwrap();
        assert_eq!(q.correct_answer(), "false");
        assert!(q.is_correct(" FALSE "));

        let q: Question = serde_json::from_value(json!({
            "type": "true_false", "question": "Q", "correct_answer": true, "explanation": "E"
        }))
        .unwrap();
        assert!(q.is_correct("true"));
        assert_eq!(q.explanation(), "E");

        let bad = serde_json::from_value::<Question>(json!({
            "type": "true_false", "question": "Q", "correct_answer": "maybe"
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_numeric_answer_is_stringified() {
        let q: Question = serde_json::from_value(json!({
            "type": "short_answer", "question": "2 + 2?", "correct_answer": 4
        }))
        .unwrap();
        assert!(q.is_correct("4"));
    }

    #[test]
    fn test_grading_is_trimmed_and_case_insensitive() {
        let quiz = Quiz::fallback(&lesson());
        let result = quiz.grade(&["  python ".to_string()]);
        assert_eq!(result.correct, 1);
        assert_eq!(result.total, 1);
        assert_eq!(result.score, 1.0);
        assert!(result.is_perfect());
        assert_eq!(result.results[0].explanation, "This lesson focuses on Python");
    }

    #[test]
    fn test_missing_answers_are_wrong() {
        let quiz = Quiz {
            skill: "Python".to_string(),
            difficulty: Difficulty::Beginner,
            lesson_title: "Variables".to_string(),
            questions: vec![
                Question::ShortAnswer {
                    question: "Keyword for functions?".to_string(),
                    correct_answer: "def".to_string(),
                    explanation: String::new(),
                },
                Question::TrueFalse {
                    question: "Lists are mutable".to_string(),
                    correct_answer: true,
                    explanation: String::new(),
                },
            ],
        };
        let result = quiz.grade(&["def".to_string()]);
        assert_eq!(result.correct, 1);
        assert_eq!(result.total, 2);
        assert_eq!(result.score, 0.5);
        assert_eq!(result.results[1].user_answer, None);
        assert!(!result.results[1].correct);
    }

    #[test]
    fn test_empty_quiz_scores_zero() {
        let mut quiz = Quiz::fallback(&lesson());
        quiz.questions.clear();
        let result = quiz.grade(&["anything".to_string()]);
        assert_eq!(result.total, 0);
        assert_eq!(result.score, 0.0);
        assert!(!result.is_perfect());
    }

    #[test]
    fn test_parse_questions_skips_invalid_and_truncates() {
        let text = r#"{"questions": [
            {"type": "multiple_choice", "question": "No options", "options": [], "correct_answer": "A"},
            {"type": "essay", "question": "Unknown type"},
            {"type": "short_answer", "question": "Q1", "correct_answer": "a"},
            {"type": "true_false", "question": "Q2", "correct_answer": "true"},
            {"type": "short_answer", "question": "Q3", "correct_answer": "c"}
        ]}"#;
        let questions = parse_questions(text, 2).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].text(), "Q1");
        assert_eq!(questions[1].kind(), "true_false");
    }

    #[test]
    fn test_parse_questions_rejects_empty() {
        assert!(matches!(parse_questions(r#"{"questions": []}"#, 5), Err(GenerationError::Invalid(_))));
        assert!(matches!(parse_questions("nope", 5), Err(GenerationError::Parse(_))));
    }

    #[tokio::test]
    async fn test_generate_parses_quiz() {
        let agent = agent_returning(
            r#"```json
{"questions": [
  {"type": "multiple_choice", "question": "Which assigns?", "options": ["=", "=="], "correct_answer": "=", "explanation": "Single equals assigns"},
  {"type": "true_false", "question": "Variables need declarations", "correct_answer": false, "explanation": "Python is dynamic"}
]}
```"#,
            5,
        );
        let progress = UserSkillProgress::new("u1", "Python");
        let quiz = agent.generate(&lesson(), &progress).await;

        assert_eq!(quiz.questions.len(), 2);
        assert_eq!(quiz.skill, "Python");
        assert_eq!(quiz.lesson_title, "Variables");
        assert_eq!(quiz.questions[0].options(), vec!["=", "=="]);
    }

    #[tokio::test]
    async fn test_generate_falls_back_on_garbage() {
        let agent = agent_returning("I cannot help with that", 5);
        let progress = UserSkillProgress::new("u1", "Python");
        let quiz = agent.generate(&lesson(), &progress).await;

        assert_eq!(quiz, Quiz::fallback(&lesson()));
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].correct_answer(), "Python");
        assert_eq!(
            quiz.questions[0].options(),
            vec!["Python", "Something else", "Not sure", "All of the above"]
        );
    }

    #[tokio::test]
    async fn test_generate_falls_back_on_error() {
        let mut mock = MockCompletionService::new();
        mock.expect_complete()
            .returning(|_, _, _| Err(GenerationError::NotConfigured("offline".to_string())));
        let agent = QuizAgent::new(Arc::new(mock), 5);
        let quiz = agent.generate(&lesson(), &UserSkillProgress::new("u1", "Python")).await;
        assert_eq!(quiz.questions.len(), 1);
    }

    #[test]
    fn test_prompt_mentions_lesson_context() {
        let prompt = quiz_prompt(&lesson(), 0.8, 5);
        assert!(prompt.contains("Title: Variables"));
        assert!(prompt.contains("Key concepts: assignment"));
        assert!(prompt.contains("User's average score: 80%"));
        assert!(prompt.contains("Current difficulty: beginner"));
        assert!(prompt.contains("Create 3-5 questions"));
    }
}
