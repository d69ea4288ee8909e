use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;

use super::cache::WsCache;
use super::domain::{AnalysisRequest, CoursesRequest, QuestionnaireRequest, UserResponsesRequest};
use super::service::{MobileService, QuestionnaireDirectory};
use super::MobileError;
use crate::survey::domain::UserId;
use crate::survey::repository::SurveyRepository;

/// Header carrying the authenticated user id, set by the gateway in front of the service.
pub const USER_HEADER: &str = "x-user-id";

/// Router builder exposing the mobile web-service functions.
pub fn mobile_router<D, R, C>(service: Arc<MobileService<D, R, C>>) -> Router
where
    D: QuestionnaireDirectory + 'static,
    R: SurveyRepository + 'static,
    C: WsCache + 'static,
{
    Router::new()
        .route(
            "/webservice/mod_questionnaire_get_questionnaires_by_courses",
            post(questionnaires_handler::<D, R, C>),
        )
        .route(
            "/webservice/mod_questionnaire_get_questionnaire_access_information",
            post(access_handler::<D, R, C>),
        )
        .route(
            "/webservice/mod_questionnaire_get_user_responses",
            post(user_responses_handler::<D, R, C>),
        )
        .route(
            "/webservice/mod_questionnaire_view_questionnaire",
            post(view_handler::<D, R, C>),
        )
        .route(
            "/webservice/mod_questionnaire_get_analysis",
            post(analysis_handler::<D, R, C>),
        )
        .with_state(service)
}

fn caller(headers: &HeaderMap) -> Result<UserId, MobileError> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(UserId)
        .ok_or(MobileError::Unauthenticated)
}

fn respond<T: Serialize>(result: Result<T, MobileError>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(error) => {
            let status = error.status();
            let payload = json!({
                "error": error.to_string(),
            });
            (status, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn questionnaires_handler<D, R, C>(
    State(service): State<Arc<MobileService<D, R, C>>>,
    headers: HeaderMap,
    Json(request): Json<CoursesRequest>,
) -> Response
where
    D: QuestionnaireDirectory + 'static,
    R: SurveyRepository + 'static,
    C: WsCache + 'static,
{
    respond(caller(&headers).and_then(|user| service.questionnaires_by_courses(user, request)))
}

pub(crate) async fn access_handler<D, R, C>(
    State(service): State<Arc<MobileService<D, R, C>>>,
    headers: HeaderMap,
    Json(request): Json<QuestionnaireRequest>,
) -> Response
where
    D: QuestionnaireDirectory + 'static,
    R: SurveyRepository + 'static,
    C: WsCache + 'static,
{
    respond(caller(&headers).and_then(|user| service.access_information(user, request)))
}

pub(crate) async fn user_responses_handler<D, R, C>(
    State(service): State<Arc<MobileService<D, R, C>>>,
    headers: HeaderMap,
    Json(request): Json<UserResponsesRequest>,
) -> Response
where
    D: QuestionnaireDirectory + 'static,
    R: SurveyRepository + 'static,
    C: WsCache + 'static,
{
    respond(caller(&headers).and_then(|user| service.user_responses(user, request)))
}

pub(crate) async fn view_handler<D, R, C>(
    State(service): State<Arc<MobileService<D, R, C>>>,
    headers: HeaderMap,
    Json(request): Json<QuestionnaireRequest>,
) -> Response
where
    D: QuestionnaireDirectory + 'static,
    R: SurveyRepository + 'static,
    C: WsCache + 'static,
{
    respond(caller(&headers).and_then(|user| service.view(user, request)))
}

pub(crate) async fn analysis_handler<D, R, C>(
    State(service): State<Arc<MobileService<D, R, C>>>,
    headers: HeaderMap,
    Json(request): Json<AnalysisRequest>,
) -> Response
where
    D: QuestionnaireDirectory + 'static,
    R: SurveyRepository + 'static,
    C: WsCache + 'static,
{
    respond(caller(&headers).and_then(|user| service.analysis(user, request)))
}
