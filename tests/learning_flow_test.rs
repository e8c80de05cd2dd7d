//! End-to-end learning flow against a scripted completion service

use async_trait::async_trait;
use mockall::mock;
use skillsprout::agent::{ChatMessage, CompletionService, GenerationError};
use skillsprout::config::LearningConfig;
use skillsprout::gamification::AchievementId;
use skillsprout::{Difficulty, SessionError, SkillBuilder};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

mock! {
    pub Completion {}

    #[async_trait]
    impl CompletionService for Completion {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            max_tokens: u32,
            temperature: f32,
        ) -> Result<String, GenerationError>;
    }
}

const LESSON_JSON: &str = r#"```json
{
  "title": "Python Functions",
  "content": "Functions group reusable logic. Define them with def.",
  "duration_minutes": 4,
  "key_concepts": ["def", "parameters", "return values"]
}
```"#;

const QUIZ_JSON: &str = r#"{
  "questions": [
    {
      "type": "multiple_choice",
      "question": "Which keyword defines a function?",
      "options": ["func", "def", "lambda", "fn"],
      "correct_answer": "def",
      "explanation": "def starts a function definition"
    },
    {
      "type": "true_false",
      "question": "A function must always return a value",
      "correct_answer": "false",
      "explanation": "Functions without return give None"
    },
    {
      "type": "short_answer",
      "question": "What value does a function without return produce?",
      "correct_answer": "None",
      "explanation": "The implicit return value is None"
    }
  ]
}"#;

fn is_lesson_request(messages: &[ChatMessage]) -> bool {
    messages[0].content.contains("micro-lessons")
}

/// Completion service that answers lesson and quiz prompts with fixed JSON
fn scripted_completion() -> MockCompletion {
    let mut mock = MockCompletion::new();
    mock.expect_complete().returning(|messages, _, _| {
        if is_lesson_request(&messages) {
            Ok(LESSON_JSON.to_string())
        } else {
            Ok(QUIZ_JSON.to_string())
        }
    });
    mock
}

fn answers(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_lesson_quiz_round_trip() {
    let builder = SkillBuilder::new(Arc::new(scripted_completion()), &LearningConfig::default());

    let lesson = assert_ok!(builder.start_lesson("alice", "Python Programming", None).await);
    assert_eq!(lesson.title, "Python Functions");
    assert_eq!(lesson.duration_minutes, 4);

    let done = assert_ok!(builder.complete_lesson("alice").await);
    assert_eq!(done.quiz.questions.len(), 3);
    assert_eq!(done.stats.total_lessons, 1);

    // Two of three correct, answers compared case-insensitively
    let outcome = assert_ok!(
        builder
            .submit_quiz("alice", &answers(&["DEF", "true", " none "]))
            .await
    );
    assert_eq!(outcome.result.correct, 2);
    assert_eq!(outcome.result.total, 3);
    assert!(!outcome.result.results[1].correct);
    assert_eq!(
        outcome.result.results[1].explanation,
        "Functions without return give None"
    );

    // lesson 10 + speed 50 + first steps 50 + two correct answers 10
    assert_eq!(outcome.stats.total_points, 120);
    assert_eq!(outcome.stats.level, 2);
    assert_eq!(outcome.stats.total_quizzes, 3);
    assert_eq!(outcome.stats.correct_answers, 2);
    assert!(outcome.new_achievements.is_empty());

    let stats = builder.ledger().get_or_create("alice").await;
    assert!(stats.achievements.contains(&AchievementId::FirstSteps));
    assert!(stats.achievements.contains(&AchievementId::Speed));
}

#[tokio::test]
async fn test_perfect_quizzes_raise_difficulty() {
    let mut mock = MockCompletion::new();
    mock.expect_complete().returning(|messages, _, _| {
        if is_lesson_request(&messages) {
            let prompt = &messages[1].content;
            if prompt.contains("Difficulty level: intermediate") {
                Ok(r#"{"title": "Decorators", "content": "Wrap functions."}"#.to_string())
            } else {
                Ok(LESSON_JSON.to_string())
            }
        } else {
            Ok(QUIZ_JSON.to_string())
        }
    });
    let builder = SkillBuilder::new(Arc::new(mock), &LearningConfig::default());

    for round in 0..3 {
        let lesson = assert_ok!(builder.start_lesson("bob", "Python", None).await);
        assert_eq!(lesson.difficulty, Difficulty::Beginner, "round {}", round);
        assert_ok!(builder.complete_lesson("bob").await);
        let outcome = assert_ok!(
            builder
                .submit_quiz("bob", &answers(&["def", "false", "None"]))
                .await
        );
        assert!(outcome.result.is_perfect());
    }

    let progress = builder.tracker().get("bob", "Python").await.unwrap();
    assert_eq!(progress.current_difficulty, Difficulty::Intermediate);
    assert_eq!(progress.lessons_completed, 3);

    let lesson = assert_ok!(builder.start_lesson("bob", "Python", None).await);
    assert_eq!(lesson.title, "Decorators");
    assert_eq!(lesson.difficulty, Difficulty::Intermediate);

    let stats = builder.ledger().get_or_create("bob").await;
    assert!(stats.achievements.contains(&AchievementId::QuizMaster));
    assert_eq!(builder.ledger().accuracy("bob").await, 100.0);
}

#[tokio::test]
async fn test_failing_provider_serves_fallbacks() {
    let mut mock = MockCompletion::new();
    mock.expect_complete().returning(|_, _, _| {
        Err(GenerationError::Api {
            status: 503,
            body: "unavailable".to_string(),
        })
    });
    let builder = SkillBuilder::new(Arc::new(mock), &LearningConfig::default());

    let lesson = assert_ok!(builder.start_lesson("carol", "Photography", None).await);
    assert_eq!(lesson.title, "Introduction to Photography");
    assert_eq!(lesson.key_concepts, vec!["basics", "fundamentals", "getting started"]);

    let done = assert_ok!(builder.complete_lesson("carol").await);
    assert_eq!(done.quiz.questions.len(), 1);
    assert_eq!(done.quiz.questions[0].correct_answer(), "Photography");

    let outcome = assert_ok!(builder.submit_quiz("carol", &answers(&["photography"])).await);
    assert_eq!(outcome.result.score, 1.0);
}

#[tokio::test]
async fn test_quiz_is_truncated_to_configured_maximum() {
    let learning = LearningConfig {
        max_quiz_questions: 2,
        ..LearningConfig::default()
    };
    let builder = SkillBuilder::new(Arc::new(scripted_completion()), &learning);

    let quiz = assert_ok!(builder.generate_quiz("dave", "Python", "Functions").await);
    assert_eq!(quiz.questions.len(), 2);
}

#[tokio::test]
async fn test_session_errors_leave_state_untouched() {
    let mut mock = MockCompletion::new();
    mock.expect_complete().never();
    let builder = SkillBuilder::new(Arc::new(mock), &LearningConfig::default());

    let err = assert_err!(builder.complete_lesson("erin").await);
    assert_eq!(err, SessionError::NoActiveLesson("erin".to_string()));

    let err = assert_err!(builder.submit_quiz("erin", &answers(&["x"])).await);
    assert_eq!(err, SessionError::NoActiveQuiz("erin".to_string()));

    assert!(builder.tracker().all().await.is_empty());
    let stats = builder.ledger().get_or_create("erin").await;
    assert_eq!(stats.total_points, 0);
    assert_eq!(stats.total_lessons, 0);
}

#[tokio::test]
async fn test_users_do_not_share_sessions() {
    let builder = SkillBuilder::new(Arc::new(scripted_completion()), &LearningConfig::default());

    assert_ok!(builder.start_lesson("frank", "Python", None).await);
    let err = assert_err!(builder.complete_lesson("grace").await);
    assert_eq!(err, SessionError::NoActiveLesson("grace".to_string()));
    assert_ok!(builder.complete_lesson("frank").await);
}
