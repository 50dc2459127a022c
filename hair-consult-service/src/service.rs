use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::{
        Json,
        sse::{Event, KeepAlive, KeepAliveStream, Sse},
    },
    routing::{get, post},
};
use consult_flow::{
    ChatSession, ConsultError, FormData, GenerativeProvider, Session, SessionStorage, Step,
    WizardEvent,
};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, info, warn};
use uuid::Uuid;

use crate::appointment::{AppointmentConfirmation, AppointmentRequest, PROCESSING_DELAY};
use crate::models::{ChatRequest, SessionView};
use crate::prompts::ANALYSIS_ERROR_MESSAGE;

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Clone)]
pub struct AppState {
    pub session_storage: Arc<dyn SessionStorage>,
    pub provider: Arc<dyn GenerativeProvider>,
}

fn error_response(err: ConsultError) -> ApiError {
    let status = match &err {
        ConsultError::Validation(_) => StatusCode::BAD_REQUEST,
        ConsultError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        ConsultError::InvalidTransition { .. } | ConsultError::ExchangeInFlight => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() })))
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/consultation", post(create_consultation))
        .route("/consultation/{id}", get(get_consultation))
        .route("/consultation/{id}/start", post(start_consultation))
        .route("/consultation/{id}/form", post(submit_form))
        .route("/consultation/{id}/continue", post(continue_to_chat))
        .route("/consultation/{id}/chat", post(send_chat_message))
        .route("/consultation/{id}/appointment", post(book_appointment))
        .route(
            "/consultation/{id}/appointment/submit",
            post(submit_appointment),
        )
        .route(
            "/consultation/{id}/appointment/close",
            post(close_appointment),
        )
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn load_session(state: &AppState, id: &str) -> Result<Session, ApiError> {
    match state.session_storage.get(id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(error_response(ConsultError::SessionNotFound(
            id.to_string(),
        ))),
        Err(e) => Err(error_response(e)),
    }
}

/// Applies one wizard event to a session and persists the result.
async fn apply_event(
    state: &AppState,
    id: &str,
    event: WizardEvent,
) -> Result<Session, ApiError> {
    let mut session = load_session(state, id).await?;
    session.state.apply(event).map_err(error_response)?;
    state
        .session_storage
        .save(session.clone())
        .await
        .map_err(error_response)?;
    Ok(session)
}

async fn create_consultation(State(state): State<AppState>) -> ApiResult<SessionView> {
    let session = Session::new();
    info!(session_id = %session.id, "creating new consultation session");
    state
        .session_storage
        .save(session.clone())
        .await
        .map_err(error_response)?;
    Ok(Json(SessionView::from_session(&session)))
}

async fn get_consultation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionView> {
    let session = load_session(&state, &id).await?;
    Ok(Json(SessionView::from_session(&session)))
}

async fn start_consultation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionView> {
    let session = apply_event(&state, &id, WizardEvent::Start).await?;
    Ok(Json(SessionView::from_session(&session)))
}

/// The one-shot analysis request. The session sits in its loading window
/// between the two saves; a failure surfaces the fixed error string and
/// returns control to the form.
async fn submit_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<FormData>,
) -> ApiResult<SessionView> {
    let mut session =
        apply_event(&state, &id, WizardEvent::FormSubmitted(form.clone())).await?;

    let event = match state.provider.generate_analysis(&form).await {
        Ok(analysis) => {
            info!(session_id = %id, "analysis generated");
            WizardEvent::AnalysisReady(analysis)
        }
        Err(e) => {
            warn!(session_id = %id, error = %e, "analysis request failed");
            WizardEvent::AnalysisFailed(ANALYSIS_ERROR_MESSAGE.to_string())
        }
    };

    session.state.apply(event).map_err(error_response)?;
    state
        .session_storage
        .save(session.clone())
        .await
        .map_err(error_response)?;
    Ok(Json(SessionView::from_session(&session)))
}

async fn continue_to_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionView> {
    let session = apply_event(&state, &id, WizardEvent::ContinueToChat).await?;
    Ok(Json(SessionView::from_session(&session)))
}

type EventStream = ReceiverStream<Result<Event, Infallible>>;

/// One chat turn, streamed back as SSE. The transcript placeholder grows
/// fragment by fragment; a failure anywhere replaces it with the fixed
/// apology and leaves the session usable.
async fn send_chat_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<KeepAliveStream<EventStream>>, ApiError> {
    let mut session = load_session(&state, &id).await?;
    session
        .state
        .begin_exchange(&request.message)
        .map_err(error_response)?;
    let chat = session
        .state
        .chat
        .clone()
        .ok_or_else(|| error_response(ConsultError::InvalidTransition {
            step: session.state.step,
            event: "send-message",
        }))?;
    state
        .session_storage
        .save(session)
        .await
        .map_err(error_response)?;

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(32);
    let storage = state.session_storage.clone();
    let provider = state.provider.clone();
    tokio::spawn(async move {
        run_exchange(storage, provider, id, chat, request.message, tx).await;
    });

    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}

/// Mutates one session under load-modify-save; the wizard itself has no
/// other writers while an exchange is in flight.
async fn update_session<F>(
    storage: &Arc<dyn SessionStorage>,
    id: &str,
    mutate: F,
) -> consult_flow::Result<()>
where
    F: FnOnce(&mut Session) -> consult_flow::Result<()>,
{
    let mut session = storage
        .get(id)
        .await?
        .ok_or_else(|| ConsultError::SessionNotFound(id.to_string()))?;
    mutate(&mut session)?;
    storage.save(session).await
}

/// Drives one exchange to completion: consumes the fragment stream,
/// growing the transcript and forwarding each fragment to the client.
/// Client disconnects don't interrupt the transcript; stream errors
/// abort into the apology.
pub(crate) async fn run_exchange(
    storage: Arc<dyn SessionStorage>,
    provider: Arc<dyn GenerativeProvider>,
    session_id: String,
    chat: ChatSession,
    user_turn: String,
    tx: mpsc::Sender<Result<Event, Infallible>>,
) {
    let mut stream = match provider.stream_chat(&chat, &user_turn).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "chat request failed");
            abort_exchange(&storage, &session_id).await;
            let _ = tx
                .send(Ok(Event::default()
                    .event("error")
                    .data(consult_flow::APOLOGY_MESSAGE)))
                .await;
            return;
        }
    };

    use futures_util::StreamExt;
    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                let appended = update_session(&storage, &session_id, |session| {
                    session.state.append_fragment(&fragment)
                })
                .await;
                if let Err(e) = appended {
                    warn!(session_id = %session_id, error = %e, "dropping exchange");
                    return;
                }
                // A closed receiver means the client went away; the
                // transcript still runs to completion.
                let _ = tx.send(Ok(Event::default().data(fragment))).await;
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "chat stream failed");
                abort_exchange(&storage, &session_id).await;
                let _ = tx
                    .send(Ok(Event::default()
                        .event("error")
                        .data(consult_flow::APOLOGY_MESSAGE)))
                    .await;
                return;
            }
        }
    }

    let completed = update_session(&storage, &session_id, |session| {
        session.state.complete_exchange(&user_turn).map(|_| ())
    })
    .await;
    match completed {
        Ok(()) => {
            let _ = tx.send(Ok(Event::default().event("done"))).await;
        }
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "failed to close exchange");
        }
    }
}

async fn abort_exchange(storage: &Arc<dyn SessionStorage>, session_id: &str) {
    let aborted = update_session(storage, session_id, |session| {
        session.state.fail_exchange();
        Ok(())
    })
    .await;
    if let Err(e) = aborted {
        warn!(session_id = %session_id, error = %e, "failed to abort exchange");
    }
}

async fn book_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionView> {
    let session = apply_event(&state, &id, WizardEvent::BookAppointment).await?;
    Ok(Json(SessionView::from_session(&session)))
}

/// Simulated submission: validates, waits the fixed delay, declares
/// success. Deliberately no network call and nothing persisted.
async fn submit_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AppointmentRequest>,
) -> ApiResult<AppointmentConfirmation> {
    let session = load_session(&state, &id).await?;
    if session.state.step != Step::Appointment {
        return Err(error_response(ConsultError::InvalidTransition {
            step: session.state.step,
            event: "submit-appointment",
        }));
    }
    request.validate().map_err(error_response)?;

    tokio::time::sleep(PROCESSING_DELAY).await;

    let confirmation = AppointmentConfirmation::new();
    info!(
        session_id = %id,
        reference = %confirmation.reference,
        "appointment request received"
    );
    Ok(Json(confirmation))
}

async fn close_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionView> {
    let session = apply_event(&state, &id, WizardEvent::CloseAppointment).await?;
    Ok(Json(SessionView::from_session(&session)))
}
