use anyhow::{bail, Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post, put},
    Form, Json, Router,
};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::Deserialize;
use std::{convert::Infallible, net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::sync::Mutex;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

use crate::answer_service::AnswerService;
use crate::chat_turn::{ChatTurn, ChatTurnController};
use crate::constants::{APP_TITLE, CHAT_HEADING, DEVELOPER, INPUT_PLACEHOLDER};
use crate::tagline::Typewriter;

pub const LANDING_PATH: &str = "/";
pub const CHAT_PATH: &str = "/home";

const LANDING_TEMPLATE: &str = "landing.html";
const CHAT_TEMPLATE: &str = "chat.html";

/// Settings for `agiles serve`.
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    pub port: u16,
    /// Load templates from here and reload on change instead of the built-in ones.
    pub templates_dir: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
}

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    controller: Arc<Mutex<ChatTurnController>>,
}

impl AppState {
    pub fn new(templates: AutoReloader, service: Arc<dyn AnswerService>) -> Self {
        Self {
            templates: Arc::new(templates),
            controller: Arc::new(Mutex::new(ChatTurnController::new(service))),
        }
    }

    pub async fn turn(&self) -> ChatTurn {
        self.controller.lock().await.state().clone()
    }

    /// Run one turn without holding the lock across the outbound request.
    ///
    /// The request and its resolution run on their own task, so a client that
    /// disconnects mid-turn still leaves the turn answered.
    pub async fn ask(&self, question: &str) -> ChatTurn {
        let (pending, service) = {
            let mut controller = self.controller.lock().await;
            let pending = controller.begin(question);
            if pending.is_some() {
                controller.edit_input(question);
            }
            (pending, controller.service())
        };

        if let Some(pending) = pending {
            let controller = self.controller.clone();
            let turn = tokio::spawn(async move {
                let outcome = service.ask(&pending.question).await;
                controller.lock().await.resolve(pending, outcome);
            });
            if let Err(e) = turn.await {
                error!("Answer task failed: {:?}", e);
            }
        }
        self.turn().await
    }

    async fn edit_input(&self, text: String) -> ChatTurn {
        let mut controller = self.controller.lock().await;
        controller.edit_input(text);
        controller.state().clone()
    }

    fn render(&self, name: &str, context: minijinja::Value) -> Result<Html<String>, Response> {
        self.templates
            .acquire_env()
            .and_then(|env| env.get_template(name).and_then(|tmpl| tmpl.render(context)))
            .map(Html)
            .map_err(|e| {
                error!("Failed to get or render template {}: {}", name, e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(format!("Internal Server Error: {}", e)),
                )
                    .into_response()
            })
    }
}

// Minijinja environment: built-in templates, or a watched directory during development
pub fn create_minijinja_env(templates_dir: Option<PathBuf>) -> Result<AutoReloader> {
    if let Some(dir) = &templates_dir {
        if !dir.is_dir() {
            bail!("Templates directory {} does not exist", dir.display());
        }
    }

    let reloader = AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        match &templates_dir {
            Some(dir) => {
                env.set_loader(path_loader(dir));
                notifier.watch_path(dir, true);
            }
            None => {
                env.add_template(LANDING_TEMPLATE, include_str!("../templates/landing.html"))?;
                env.add_template(CHAT_TEMPLATE, include_str!("../templates/chat.html"))?;
            }
        }
        Ok(env)
    });
    Ok(reloader)
}

async fn landing_handler(State(state): State<AppState>) -> Result<Html<String>, Response> {
    let typewriter = Typewriter::landing();
    let context = minijinja::context! {
        title => APP_TITLE,
        taglines => typewriter.strings(),
        timing => typewriter.timing(),
        chat_path => CHAT_PATH,
    };
    state.render(LANDING_TEMPLATE, context)
}

#[derive(Debug, Default, Deserialize)]
struct ChatPageQuery {
    #[serde(default)]
    about: bool,
}

async fn chat_handler(
    State(state): State<AppState>,
    Query(query): Query<ChatPageQuery>,
) -> Result<Html<String>, Response> {
    let turn = state.turn().await;
    let phase = turn.phase();
    let context = minijinja::context! {
        title => APP_TITLE,
        heading => CHAT_HEADING,
        placeholder => INPUT_PLACEHOLDER,
        turn => turn,
        phase => phase,
        about_open => query.about,
        developer => DEVELOPER,
        chat_path => CHAT_PATH,
    };
    state.render(CHAT_TEMPLATE, context)
}

#[derive(Debug, Deserialize)]
struct AskForm {
    #[serde(default)]
    question: String,
}

// Plain form post for browsers without JavaScript
async fn chat_form_handler(State(state): State<AppState>, Form(form): Form<AskForm>) -> Redirect {
    state.ask(&form.question).await;
    Redirect::to(CHAT_PATH)
}

async fn turn_handler(State(state): State<AppState>) -> Json<ChatTurn> {
    Json(state.turn().await)
}

#[derive(Debug, Deserialize)]
struct EditInput {
    text: String,
}

async fn input_handler(State(state): State<AppState>, Json(input): Json<EditInput>) -> Json<ChatTurn> {
    Json(state.edit_input(input.text).await)
}

async fn ask_handler(State(state): State<AppState>, Json(form): Json<AskForm>) -> Json<ChatTurn> {
    Json(state.ask(&form.question).await)
}

async fn about_handler() -> impl IntoResponse {
    Json(DEVELOPER)
}

/// Router for both views and the JSON API.
pub fn app(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let mut router = Router::new()
        .route(LANDING_PATH, get(landing_handler))
        .route(CHAT_PATH, get(chat_handler).post(chat_form_handler))
        .route("/api/turn", get(turn_handler))
        .route("/api/input", put(input_handler))
        .route("/api/ask", post(ask_handler))
        .route("/api/about", get(about_handler));

    if let Some(dir) = static_dir {
        let not_found = tower::service_fn(|_: axum::extract::Request| async {
            Ok::<_, Infallible>((StatusCode::NOT_FOUND, "Not Found").into_response())
        });
        let static_files_service = ServeDir::new(dir).not_found_service(not_found);
        router = router.nest_service("/static", static_files_service);
    }

    router.with_state(state).layer(TraceLayer::new_for_http())
}

pub async fn start_web_server(config: WebServerConfig, service: Arc<dyn AnswerService>) -> Result<()> {
    let templates =
        create_minijinja_env(config.templates_dir.clone()).context("Failed to initialize template engine")?;
    let state = AppState::new(templates, service);
    let app = app(state, config.static_dir.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    axum::serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_templates_load() {
        let reloader = create_minijinja_env(None).unwrap();
        let env = reloader.acquire_env().unwrap();
        assert!(env.get_template(LANDING_TEMPLATE).is_ok());
        assert!(env.get_template(CHAT_TEMPLATE).is_ok());
    }

    #[test]
    fn test_missing_templates_dir_is_rejected() {
        let err = create_minijinja_env(Some(PathBuf::from("/definitely/not/here"))).err().expect("expected an error for a missing templates dir");
        assert!(err.to_string().contains("does not exist"));
    }
}
