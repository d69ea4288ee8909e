use crate::cli::ServeArgs;
use crate::infra::{
    demo_directory, AppState, InMemorySurveyRepository, DEMO_QUESTIONNAIRE, DEMO_RESPONSES_CSV,
    DEMO_SURVEY_JSON,
};
use crate::routes::{with_questionnaire_routes, SubmissionState};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use questionnaire::config::AppConfig;
use questionnaire::error::AppError;
use questionnaire::mobile::{MemoryCache, MobileService};
use questionnaire::survey::{AttemptService, ResponseImporter, SurveyDocument};
use questionnaire::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let document = SurveyDocument::from_reader(DEMO_SURVEY_JSON.as_bytes())?;
    let survey = document.survey.id;
    let imported = ResponseImporter::from_reader(DEMO_RESPONSES_CSV.as_bytes(), &document.questions)?;
    let repository = Arc::new(
        InMemorySurveyRepository::from_document(document).with_responses(
            DEMO_QUESTIONNAIRE,
            survey,
            imported,
        ),
    );
    let mobile = Arc::new(MobileService::new(
        Arc::new(demo_directory(survey)),
        repository.clone(),
        Arc::new(MemoryCache::new(config.cache.ttl())),
    ));
    let state = SubmissionState {
        attempts: Arc::new(AttemptService::new(repository)),
        mobile,
    };

    let app = with_questionnaire_routes(state)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, %survey, "questionnaire service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
