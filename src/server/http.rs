//! HTTP handlers for the learning endpoints

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use crate::agent::{Question, Quiz};
use crate::gamification::{AchievementId, CATALOG};
use crate::orchestrator::SessionError;
use crate::progress::{recommendation, UserSkillProgress};
use crate::server::ServerState;
use crate::types::{Difficulty, PREDEFINED_SKILLS};

fn default_user() -> String {
    "default_user".to_string()
}

/// Lesson generation request
#[derive(Debug, Deserialize)]
pub struct LessonRequest {
    pub skill: String,
    #[serde(default = "default_user")]
    pub user_id: String,
    /// Overrides the tracked difficulty when present
    #[serde(default)]
    pub difficulty: Option<String>,
}

/// Request naming only a user
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    #[serde(default = "default_user")]
    pub user_id: String,
}

/// Quiz generation request
#[derive(Debug, Deserialize)]
pub struct QuizRequest {
    pub skill: String,
    #[serde(default)]
    pub lesson_title: String,
    #[serde(default = "default_user")]
    pub user_id: String,
}

/// Quiz answers, in question order
#[derive(Debug, Deserialize)]
pub struct QuizSubmission {
    #[serde(default = "default_user")]
    pub user_id: String,
    pub answers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    #[serde(default)]
    pub skill: Option<String>,
}

/// Progress for one skill
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub user_id: String,
    pub skill: String,
    pub lessons_completed: u32,
    pub average_score: f64,
    pub current_difficulty: Difficulty,
    pub mastery_level: f64,
    pub recent_lessons: Vec<String>,
    pub recommendations: String,
}

impl ProgressResponse {
    fn from_progress(progress: &UserSkillProgress) -> Self {
        Self {
            user_id: progress.user_id.clone(),
            skill: progress.skill.clone(),
            lessons_completed: progress.lessons_completed,
            average_score: progress.average_score(),
            current_difficulty: progress.current_difficulty,
            mastery_level: progress.enhanced().mastery_level,
            recent_lessons: progress.recent_lessons(3),
            recommendations: recommendation(progress),
        }
    }
}

/// A question as shown to the learner, without its answer
#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub number: usize,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub question: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl QuestionView {
    fn new(number: usize, question: &Question) -> Self {
        Self {
            number,
            kind: question.kind(),
            question: question.text().to_string(),
            options: question.options(),
        }
    }
}

/// A quiz as shown to the learner
#[derive(Debug, Serialize)]
pub struct QuizView {
    pub skill: String,
    pub lesson_title: String,
    pub difficulty: Difficulty,
    pub questions: Vec<QuestionView>,
}

impl From<&Quiz> for QuizView {
    fn from(quiz: &Quiz) -> Self {
        Self {
            skill: quiz.skill.clone(),
            lesson_title: quiz.lesson_title.clone(),
            difficulty: quiz.difficulty,
            questions: quiz
                .questions
                .iter()
                .enumerate()
                .map(|(i, q)| QuestionView::new(i + 1, q))
                .collect(),
        }
    }
}

fn error_response(status: StatusCode, error: &str, details: impl ToString) -> Response {
    (
        status,
        Json(json!({
            "error": error,
            "details": details.to_string()
        })),
    )
        .into_response()
}

fn session_error(e: SessionError) -> Response {
    if e.is_invalid_input() {
        error_response(StatusCode::BAD_REQUEST, "Invalid request", e)
    } else {
        error_response(StatusCode::CONFLICT, "No active session", e)
    }
}

/// API information
pub async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "name": "SkillSprout MCP Server",
        "version": crate::VERSION,
        "description": "MCP endpoints for AI-powered microlearning",
        "endpoints": {
            "GET /mcp/skills": "List available skills",
            "GET /mcp/achievements": "List achievements",
            "POST /mcp/lesson/generate": "Start a lesson for a skill",
            "POST /mcp/lesson/complete": "Complete the active lesson and receive its quiz",
            "POST /mcp/quiz/generate": "Generate a quiz for a lesson title",
            "POST /mcp/quiz/submit": "Submit answers for the active quiz",
            "GET /mcp/progress/{user_id}": "Get user progress data",
            "GET /mcp/stats/{user_id}": "Get points, level and achievements",
            "POST /mcp/narration": "Record use of voice narration"
        }
    }))
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "service": "SkillSprout MCP Server"
    }))
}

pub async fn skills_handler() -> impl IntoResponse {
    Json(json!({
        "predefined_skills": PREDEFINED_SKILLS,
        "custom_skills_supported": true,
        "message": "You can also request lessons for any custom skill"
    }))
}

pub async fn achievements_handler() -> impl IntoResponse {
    Json(json!({ "achievements": CATALOG }))
}

/// Generate a lesson and make it the user's active lesson
pub async fn generate_lesson_handler(
    State(state): State<ServerState>,
    Json(req): Json<LessonRequest>,
) -> Response {
    let difficulty = match req.difficulty.as_deref().filter(|d| !d.trim().is_empty()) {
        None => None,
        Some(name) => match Difficulty::parse(name) {
            Some(d) => Some(d),
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "Invalid difficulty",
                    format!("'{}' is not one of beginner, intermediate, advanced", name),
                )
            }
        },
    };

    let lesson = match state.builder.start_lesson(&req.user_id, &req.skill, difficulty).await {
        Ok(lesson) => lesson,
        Err(e) => return session_error(e),
    };
    let progress = state.builder.tracker().get_or_create(&req.user_id, &lesson.skill).await;

    (
        StatusCode::OK,
        Json(json!({
            "lesson": lesson,
            "user_context": {
                "user_id": req.user_id,
                "current_difficulty": progress.current_difficulty,
                "lessons_completed": progress.lessons_completed
            },
            "timestamp": Utc::now().to_rfc3339()
        })),
    )
        .into_response()
}

/// Complete the active lesson; the response carries the new quiz without answers
pub async fn complete_lesson_handler(
    State(state): State<ServerState>,
    Json(req): Json<UserRequest>,
) -> Response {
    match state.builder.complete_lesson(&req.user_id).await {
        Ok(done) => (
            StatusCode::OK,
            Json(json!({
                "lesson_title": done.lesson_title,
                "skill": done.skill,
                "time_spent_secs": done.time_spent_secs,
                "progress": ProgressResponse::from_progress(&done.progress),
                "new_achievements": done.new_achievements,
                "stats": done.stats,
                "quiz": QuizView::from(&done.quiz),
                "instructions": "Submit answers using the /mcp/quiz/submit endpoint",
                "timestamp": Utc::now().to_rfc3339()
            })),
        )
            .into_response(),
        Err(e) => session_error(e),
    }
}

pub async fn generate_quiz_handler(
    State(state): State<ServerState>,
    Json(req): Json<QuizRequest>,
) -> Response {
    match state
        .builder
        .generate_quiz(&req.user_id, &req.skill, &req.lesson_title)
        .await
    {
        Ok(quiz) => (
            StatusCode::OK,
            Json(json!({
                "quiz": QuizView::from(&quiz),
                "instructions": "Submit answers using the /mcp/quiz/submit endpoint",
                "timestamp": Utc::now().to_rfc3339()
            })),
        )
            .into_response(),
        Err(e) => session_error(e),
    }
}

pub async fn submit_quiz_handler(
    State(state): State<ServerState>,
    Json(req): Json<QuizSubmission>,
) -> Response {
    let outcome = match state.builder.submit_quiz(&req.user_id, &req.answers).await {
        Ok(outcome) => outcome,
        Err(e) => return session_error(e),
    };

    (
        StatusCode::OK,
        Json(json!({
            "quiz_results": {
                "score": outcome.result.score,
                "correct_answers": outcome.result.correct,
                "total_questions": outcome.result.total,
                "percentage": format!("{:.1}%", outcome.result.percentage())
            },
            "results": outcome.result.results,
            "updated_progress": {
                "lessons_completed": outcome.progress.lessons_completed,
                "average_score": outcome.progress.average_score(),
                "current_difficulty": outcome.progress.current_difficulty,
                "mastery_level": outcome.mastery_level
            },
            "recommendation": outcome.recommendation,
            "new_achievements": outcome.new_achievements,
            "stats": outcome.stats,
            "timestamp": Utc::now().to_rfc3339()
        })),
    )
        .into_response()
}

/// Progress for one skill (`?skill=`) or every skill of the user
pub async fn progress_handler(
    State(state): State<ServerState>,
    Path(user_id): Path<String>,
    Query(query): Query<ProgressQuery>,
) -> Response {
    let tracker = state.builder.tracker();

    if let Some(skill) = query.skill.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let progress = tracker.get_or_create(&user_id, skill).await;
        return (StatusCode::OK, Json(ProgressResponse::from_progress(&progress))).into_response();
    }

    let skills: BTreeMap<String, serde_json::Value> = tracker
        .skills_for(&user_id)
        .await
        .into_iter()
        .map(|p| {
            let entry = json!({
                "lessons_completed": p.lessons_completed,
                "average_score": p.average_score(),
                "current_difficulty": p.current_difficulty,
                "quiz_scores": p.quiz_scores,
                "last_activity": p.last_activity,
                "mastery_level": p.enhanced().mastery_level
            });
            (p.skill, entry)
        })
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "user_id": user_id,
            "total_skills_learning": skills.len(),
            "skills_progress": skills,
            "timestamp": Utc::now().to_rfc3339()
        })),
    )
        .into_response()
}

pub async fn stats_handler(
    State(state): State<ServerState>,
    Path(user_id): Path<String>,
) -> Response {
    let stats = state.builder.ledger().get_or_create(&user_id).await;
    let unlocked: Vec<_> = stats
        .achievements
        .iter()
        .map(|id: &AchievementId| id.achievement())
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "accuracy": stats.accuracy(),
            "achievements": unlocked,
            "stats": stats
        })),
    )
        .into_response()
}

pub async fn narration_handler(
    State(state): State<ServerState>,
    Json(req): Json<UserRequest>,
) -> Response {
    let unlocked = state.builder.record_narration(&req.user_id).await;
    let stats = state.builder.ledger().get_or_create(&req.user_id).await;
    (
        StatusCode::OK,
        Json(json!({
            "unlocked": unlocked,
            "stats": stats
        })),
    )
        .into_response()
}
