use crate::infra::{AppState, InMemoryDirectory, InMemorySurveyRepository};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use questionnaire::error::AppError;
use questionnaire::mobile::{mobile_router, MemoryCache, MobileService};
use questionnaire::survey::{AttemptReceipt, AttemptService, Submission};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

pub(crate) type SurveyMobileService =
    MobileService<InMemoryDirectory, InMemorySurveyRepository, MemoryCache>;

#[derive(Clone)]
pub(crate) struct SubmissionState {
    pub(crate) attempts: Arc<AttemptService<InMemorySurveyRepository>>,
    pub(crate) mobile: Arc<SurveyMobileService>,
}

pub(crate) fn with_questionnaire_routes(state: SubmissionState) -> Router {
    let submissions = Router::new()
        .route("/api/v1/attempts", post(submit_attempt_endpoint))
        .with_state(state.clone());

    mobile_router(state.mobile)
        .merge(submissions)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn submit_attempt_endpoint(
    State(state): State<SubmissionState>,
    Json(submission): Json<Submission>,
) -> Result<(StatusCode, Json<AttemptReceipt>), AppError> {
    let questionnaire = submission.questionnaire;
    let receipt = state.attempts.submit(submission)?;
    let invalidated = state.mobile.attempt_recorded(questionnaire);
    debug!(%questionnaire, invalidated, "cached analysis dropped");

    Ok((StatusCode::CREATED, Json(receipt)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{
        demo_directory, DEMO_MANAGER, DEMO_QUESTIONNAIRE, DEMO_STUDENT, DEMO_SURVEY_JSON,
    };
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Duration;
    use questionnaire::mobile::router::USER_HEADER;
    use questionnaire::survey::SurveyDocument;
    use serde_json::Value;
    use tower::ServiceExt;

    fn state() -> SubmissionState {
        let document = SurveyDocument::from_reader(DEMO_SURVEY_JSON.as_bytes())
            .expect("fixture parses");
        let survey = document.survey.id;
        let repository = Arc::new(InMemorySurveyRepository::from_document(document));
        let mobile = Arc::new(MobileService::new(
            Arc::new(demo_directory(survey)),
            repository.clone(),
            Arc::new(MemoryCache::new(Duration::minutes(5))),
        ));
        SubmissionState {
            attempts: Arc::new(AttemptService::new(repository)),
            mobile,
        }
    }

    fn post_json(path: &str, user: Option<u64>, body: Value) -> Request<Body> {
        let mut request = Request::post(path).header(header::CONTENT_TYPE, "application/json");
        if let Some(user) = user {
            request = request.header(USER_HEADER, user.to_string());
        }
        request
            .body(Body::from(serde_json::to_vec(&body).expect("serialize")))
            .expect("request")
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    fn submission(answers: Value) -> Value {
        json!({
            "questionnaire": DEMO_QUESTIONNAIRE,
            "survey": 1,
            "user": DEMO_STUDENT,
            "group": 1,
            "answers": answers,
        })
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn submitted_attempt_returns_feedback_and_refreshes_analysis() {
        let app = with_questionnaire_routes(state());

        let before = app
            .clone()
            .oneshot(post_json(
                "/webservice/mod_questionnaire_get_analysis",
                Some(DEMO_MANAGER.0),
                json!({ "questionnaireid": DEMO_QUESTIONNAIRE }),
            ))
            .await
            .expect("route executes");
        assert_eq!(before.status(), StatusCode::OK);
        assert_eq!(read_json(before).await["responses"], 0);

        let created = app
            .clone()
            .oneshot(post_json(
                "/api/v1/attempts",
                None,
                submission(json!({
                    "1": { "yes_no": true },
                    "2": { "choices": [21] },
                    "4": { "ranks": { "40": 2, "41": 2, "42": 2 } },
                })),
            ))
            .await
            .expect("route executes");
        assert_eq!(created.status(), StatusCode::CREATED);
        let receipt = read_json(created).await;
        assert_eq!(receipt["rows"], 5);
        assert_eq!(receipt["feedback"][0]["heading"], "Engagement");
        assert_eq!(receipt["feedback"][0]["message"], "Keep it up");

        let after = app
            .oneshot(post_json(
                "/webservice/mod_questionnaire_get_analysis",
                Some(DEMO_MANAGER.0),
                json!({ "questionnaireid": DEMO_QUESTIONNAIRE }),
            ))
            .await
            .expect("route executes");
        assert_eq!(read_json(after).await["responses"], 1);
    }

    #[tokio::test]
    async fn missing_required_answers_are_rejected() {
        let response = with_questionnaire_routes(state())
            .oneshot(post_json(
                "/api/v1/attempts",
                None,
                submission(json!({ "1": { "yes_no": false } })),
            ))
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload = read_json(response).await;
        assert!(payload["error"]
            .as_str()
            .expect("error text")
            .contains("required questions left unanswered"));
    }
}
