use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use time::OffsetDateTime;
use tokio::sync::{Mutex, Notify, OwnedMutexGuard};
use tokio::task::JoinHandle;

use crate::api::{ApiClient, ApiError, AssessmentBackend};
use crate::core::config::Settings;
use crate::core::time::Clock;
use crate::models::{
    AnswerPayload, Assessment, AssessmentKind, AssessmentStatus, CloseEndedType, Question,
    QuestionKind, QuestionsType,
};

const SESSION_COOKIE: &str = "portal_session=fake-session";

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn t0() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_740_805_200).expect("timestamp")
    }

    fn question(id: &str, text: &str, kind: QuestionKind, choices: &[&str]) -> Question {
        Question {
            id: id.to_string(),
            text: text.to_string(),
            kind,
            choices: choices.iter().map(|choice| choice.to_string()).collect(),
            marks: 2.0,
            status: None,
        }
    }

    /// Three multi-answer questions with the given duration.
    pub(crate) fn multi_answer_cat(duration_minutes: u32) -> Assessment {
        let kind = QuestionKind::MultiChoice;
        Assessment {
            id: "cat-1".to_string(),
            title: "Data Structures CAT".to_string(),
            topic: Some("Trees".to_string()),
            kind: AssessmentKind::Cat,
            status: AssessmentStatus::Start,
            questions_type: QuestionsType::CloseEnded,
            close_ended_type: Some(CloseEndedType::MultipleAnswers),
            question_count: 3,
            deadline: None,
            duration_minutes: Some(duration_minutes),
            total_marks: 6.0,
            questions: vec![
                question("q1", "Which trees are self-balancing?", kind, &["AVL", "Red-black", "Heap"]),
                question("q2", "Which traversals are depth-first?", kind, &["Inorder", "Level order"]),
                question("q3", "Which structures allow O(1) lookup?", kind, &["Hash map", "List"]),
            ],
            score: None,
        }
    }

    pub(crate) fn single_answer_quiz() -> Assessment {
        let kind = QuestionKind::SingleChoice;
        Assessment {
            id: "quiz-2".to_string(),
            title: "Networking Quiz".to_string(),
            topic: None,
            kind: AssessmentKind::Assignment,
            status: AssessmentStatus::InProgress,
            questions_type: QuestionsType::CloseEnded,
            close_ended_type: Some(CloseEndedType::SingleAnswer),
            question_count: 2,
            deadline: None,
            duration_minutes: None,
            total_marks: 4.0,
            questions: vec![
                question("n1", "Which layer routes packets?", kind, &["Network", "Transport"]),
                question("n2", "Default HTTP port?", kind, &["80", "443", "8080"]),
            ],
            score: None,
        }
    }

    pub(crate) fn open_ended_assignment() -> Assessment {
        let kind = QuestionKind::OpenEnded;
        Assessment {
            id: "essay-3".to_string(),
            title: "Operating Systems Assignment".to_string(),
            topic: Some("Concurrency".to_string()),
            kind: AssessmentKind::Assignment,
            status: AssessmentStatus::Start,
            questions_type: QuestionsType::OpenEnded,
            close_ended_type: None,
            question_count: 2,
            deadline: None,
            duration_minutes: Some(0),
            total_marks: 4.0,
            questions: vec![
                question("e1", "Sketch the dining philosophers solution.", kind, &[]),
                question("e2", "Explain priority inversion.", kind, &[]),
            ],
            score: None,
        }
    }

    pub(crate) fn with_status(mut assessment: Assessment, status: AssessmentStatus) -> Assessment {
        assessment.status = status;
        assessment
    }

    pub(crate) fn scored(id: &str, status: AssessmentStatus, score: Option<f64>) -> Assessment {
        let mut assessment = single_answer_quiz();
        assessment.id = id.to_string();
        assessment.status = status;
        assessment.score = score;
        assessment
    }
}

/// Wall clock that follows tokio's (possibly paused) timer.
#[derive(Debug)]
pub(crate) struct TokioClock {
    origin: OffsetDateTime,
    start: tokio::time::Instant,
}

impl TokioClock {
    pub(crate) fn new(origin: OffsetDateTime) -> Self {
        Self { origin, start: tokio::time::Instant::now() }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> OffsetDateTime {
        self.origin + self.start.elapsed()
    }
}

/// In-process backend that records calls and replays scripted failures.
#[derive(Debug, Default)]
pub(crate) struct RecordingBackend {
    assessments: Vec<Assessment>,
    list_fails: bool,
    answers: Mutex<Vec<(String, AnswerPayload)>>,
    submissions: Mutex<Vec<String>>,
    answer_errors: Mutex<VecDeque<ApiError>>,
    submit_errors: Mutex<VecDeque<ApiError>>,
    answer_gate: Option<Arc<Notify>>,
}

impl RecordingBackend {
    pub(crate) fn new(assessments: Vec<Assessment>) -> Self {
        Self { assessments, ..Default::default() }
    }

    pub(crate) fn failing_list() -> Self {
        Self { list_fails: true, ..Default::default() }
    }

    /// Answer submissions block until the returned gate is notified.
    pub(crate) fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.answer_gate = Some(gate.clone());
        (self, gate)
    }

    pub(crate) async fn queue_answer_error(&self, err: ApiError) {
        self.answer_errors.lock().await.push_back(err);
    }

    pub(crate) async fn queue_submit_error(&self, err: ApiError) {
        self.submit_errors.lock().await.push_back(err);
    }

    pub(crate) async fn answers(&self) -> Vec<(String, AnswerPayload)> {
        self.answers.lock().await.clone()
    }

    pub(crate) async fn answered_ids(&self) -> Vec<String> {
        self.answers.lock().await.iter().map(|(id, _)| id.clone()).collect()
    }

    pub(crate) async fn submissions(&self) -> Vec<String> {
        self.submissions.lock().await.clone()
    }
}

#[async_trait]
impl AssessmentBackend for RecordingBackend {
    async fn list_assessments(&self) -> Result<Vec<Assessment>, ApiError> {
        if self.list_fails {
            return Err(ApiError::Network {
                path: "/bd/student/assessments".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(self.assessments.clone())
    }

    async fn submit_answer(&self, question_id: &str, payload: &AnswerPayload) -> Result<(), ApiError> {
        if let Some(gate) = &self.answer_gate {
            gate.notified().await;
        }
        self.answers.lock().await.push((question_id.to_string(), payload.clone()));
        match self.answer_errors.lock().await.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn submit_assessment(&self, assessment_id: &str) -> Result<(), ApiError> {
        self.submissions.lock().await.push(assessment_id.to_string());
        match self.submit_errors.lock().await.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub(crate) fn unavailable(path: &str) -> ApiError {
    ApiError::Status { path: path.to_string(), status: 503, detail: "Service unavailable".to_string() }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedAnswer {
    pub(crate) question_id: String,
    pub(crate) answer_type: String,
    pub(crate) text_answer: Option<String>,
    pub(crate) image_name: Option<String>,
    pub(crate) image_len: usize,
}

#[derive(Debug, Default)]
struct PortalData {
    answers: Vec<RecordedAnswer>,
    submitted: Vec<String>,
    authenticated_calls: usize,
    profile_updates: usize,
    profile: Value,
    collections: Vec<(String, Vec<Value>)>,
    next_id: u64,
}

impl PortalData {
    fn collection(&mut self, name: &str) -> Option<&mut Vec<Value>> {
        self.collections.iter_mut().find(|(key, _)| key == name).map(|(_, items)| items)
    }
}

type SharedData = Arc<Mutex<PortalData>>;

/// Portal backend stand-in served over real HTTP on an ephemeral port.
pub(crate) struct FakePortal {
    addr: SocketAddr,
    data: SharedData,
    task: JoinHandle<()>,
}

impl FakePortal {
    pub(crate) async fn start() -> Self {
        let data: SharedData = Arc::new(Mutex::new(PortalData {
            profile: json!({
                "id": 42,
                "first_name": "Achieng",
                "last_name": "Odhiambo",
                "email": "achieng@students.uni.ac.ke",
                "role": "Student"
            }),
            collections: ["courses", "units", "students"]
                .into_iter()
                .map(|name| (name.to_string(), Vec::new()))
                .collect(),
            next_id: 100,
            ..Default::default()
        }));

        let app = Router::new()
            .route("/bd/student/assessments", get(list_assessments))
            .route("/bd/student/questions/:id/answer", post(record_answer))
            .route("/bd/student/assessments/:id/submit", get(submit_assessment))
            .route("/auth/me", get(me).put(update_me))
            .route("/lecturer/:collection", get(list_records).post(create_record))
            .route(
                "/lecturer/:collection/:id",
                put(update_record).delete(delete_record).post(upload_records),
            )
            .with_state(data.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake portal");
        });

        Self { addr, data, task }
    }

    pub(crate) fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn client(&self) -> ApiClient {
        let settings = Settings::with_base_url(&self.base_url()).expect("settings");
        ApiClient::from_settings(&settings).expect("client")
    }

    pub(crate) async fn recorded_answers(&self) -> Vec<RecordedAnswer> {
        self.data.lock().await.answers.clone()
    }

    pub(crate) async fn submitted_assessments(&self) -> Vec<String> {
        self.data.lock().await.submitted.clone()
    }

    pub(crate) async fn authenticated_calls(&self) -> usize {
        self.data.lock().await.authenticated_calls
    }

    pub(crate) async fn profile_updates(&self) -> usize {
        self.data.lock().await.profile_updates
    }
}

impl Drop for FakePortal {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found" }))).into_response()
}

async fn list_assessments() -> Json<Value> {
    Json(json!({
        "assessments": [
            {
                "_id": 1,
                "name": "Operating Systems CAT",
                "type": "CAT",
                "status": "start",
                "questionsType": "close-ended",
                "closeEndedType": "multiple choice with multiple answers",
                "duration": "30",
                "dueDate": "2025-03-01T09:00:00Z",
                "questions": [
                    { "id": 11, "question": "Memory management schemes?", "options": ["Paging", "Segmentation", "Spooling"], "marks": 2 },
                    { "id": 12, "question": "Scheduling algorithms?", "options": ["FCFS", "Round robin"], "marks": "3" }
                ]
            },
            {
                "id": "2",
                "title": "Compilers Assignment",
                "assessment_type": "Assignment",
                "status": "completed",
                "questions_type": "open-ended",
                "total_marks": 10,
                "marks_obtained": 7.5,
                "question_list": [
                    { "_id": "21", "question_text": "Describe LR parsing." }
                ]
            }
        ]
    }))
}

async fn record_answer(
    State(data): State<SharedData>,
    Path(question_id): Path<String>,
    mut multipart: Multipart,
) -> Json<Value> {
    let mut answer = RecordedAnswer {
        question_id,
        answer_type: String::new(),
        text_answer: None,
        image_name: None,
        image_len: 0,
    };
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "answer_type" => answer.answer_type = field.text().await.expect("answer_type"),
            "text_answer" => answer.text_answer = Some(field.text().await.expect("text_answer")),
            "image" => {
                answer.image_name = field.file_name().map(str::to_string);
                answer.image_len = field.bytes().await.expect("image").len();
            }
            _ => {}
        }
    }

    data.lock().await.answers.push(answer);
    Json(json!({ "message": "Answer saved" }))
}

async fn submit_assessment(State(data): State<SharedData>, Path(id): Path<String>) -> Response {
    if id == "closed" {
        return (StatusCode::CONFLICT, Json(json!({ "detail": "Assessment already submitted" })))
            .into_response();
    }
    data.lock().await.submitted.push(id);
    Json(json!({ "message": "Assessment submitted" })).into_response()
}

async fn me(State(data): State<SharedData>, headers: HeaderMap) -> Response {
    let has_session = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.contains(SESSION_COOKIE));

    let mut data = data.lock().await;
    let body = Json(json!({ "user": data.profile.clone() }));
    if has_session {
        data.authenticated_calls += 1;
        return body.into_response();
    }
    ([(header::SET_COOKIE, format!("{SESSION_COOKIE}; Path=/; HttpOnly"))], body).into_response()
}

async fn update_me(State(data): State<SharedData>, Json(update): Json<Value>) -> Json<Value> {
    let mut data = data.lock().await;
    data.profile_updates += 1;
    merge(&mut data.profile, update);
    Json(json!({ "user": data.profile.clone() }))
}

async fn list_records(State(data): State<SharedData>, Path(collection): Path<String>) -> Response {
    let mut data = data.lock().await;
    match data.collection(&collection) {
        Some(items) => Json(json!({ "data": items.clone() })).into_response(),
        None => not_found(),
    }
}

async fn create_record(
    State(data): State<SharedData>,
    Path(collection): Path<String>,
    Json(mut record): Json<Value>,
) -> Response {
    let mut data = data.lock().await;
    data.next_id += 1;
    let id = data.next_id.to_string();
    let Some(items) = data.collection(&collection) else {
        return not_found();
    };
    record["id"] = Value::String(id);
    items.push(record.clone());
    (StatusCode::CREATED, Json(record)).into_response()
}

async fn update_record(
    State(data): State<SharedData>,
    Path((collection, id)): Path<(String, String)>,
    Json(update): Json<Value>,
) -> Response {
    let mut data = data.lock().await;
    let Some(items) = data.collection(&collection) else {
        return not_found();
    };
    match items.iter_mut().find(|item| item["id"] == Value::String(id.clone())) {
        Some(record) => {
            merge(record, update);
            Json(record.clone()).into_response()
        }
        None => not_found(),
    }
}

async fn delete_record(
    State(data): State<SharedData>,
    Path((collection, id)): Path<(String, String)>,
) -> Response {
    let mut data = data.lock().await;
    let Some(items) = data.collection(&collection) else {
        return not_found();
    };
    let before = items.len();
    items.retain(|item| item["id"] != Value::String(id.clone()));
    if items.len() == before {
        return not_found();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn upload_records(
    Path((collection, action)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Response {
    if collection != "students" || action != "upload" {
        return not_found();
    }

    let mut rows = 0;
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        if field.name() == Some("file") {
            let bytes = field.bytes().await.expect("file");
            let text = String::from_utf8_lossy(&bytes);
            rows = text.lines().filter(|line| !line.trim().is_empty()).count().saturating_sub(1);
        }
    }

    Json(json!({ "created": rows, "failed": 0, "errors": [] })).into_response()
}

fn merge(target: &mut Value, update: Value) {
    if let (Value::Object(target), Value::Object(update)) = (target, update) {
        for (key, value) in update {
            target.insert(key, value);
        }
    }
}
