use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::dto::{
    ConnectPersonsDto, CreatePersonDto, PersonDto, PersonPairDto, RelationshipDto,
    RelationshipTypeDto, RelationshipsQuery,
};
use super::error::ErrorResponse;
use super::extract::{ApiPath, ApiQuery};
use crate::config::HttpServerConfig;
use crate::error::{DetectiveError, Result};
use crate::graph::{Relationship, RelationshipType};
use crate::service::PersonService;

/// Check if a port is available by attempting to bind to it
async fn check_port_available(host: &str, port: u16) -> bool {
    tokio::net::TcpListener::bind((host, port)).await.is_ok()
}

/// Privilege a route needs. Reads are GETs, everything else edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Edit,
}

impl Access {
    fn for_method(method: &Method) -> Self {
        if method == Method::GET || method == Method::HEAD {
            Access::Read
        } else {
            Access::Edit
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PersonService>,
    /// Key granting read and edit access
    pub edit_key: String,
    /// Optional key granting read access only
    pub read_key: Option<String>,
    pub allowed_origins: Vec<String>,
    pub authless: bool,
}

/// HTTP server over a [`PersonService`]
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Resolve API keys from the environment and build the server.
    pub fn new(service: Arc<PersonService>, config: &HttpServerConfig) -> Result<Self> {
        // API key is optional if authless mode is enabled
        let (edit_key, read_key) = if config.authless {
            (String::new(), None)
        } else {
            let edit_key = std::env::var(&config.api_key_env).map_err(|_| {
                DetectiveError::Config(format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable, or enable authless mode.",
                    config.api_key_env
                ))
            })?;
            if edit_key.trim().is_empty() {
                return Err(DetectiveError::Config(format!(
                    "Environment variable {} is empty. Set a non-empty API key or enable authless mode.",
                    config.api_key_env
                )));
            }
            let read_key = std::env::var(&config.read_api_key_env)
                .ok()
                .filter(|key| !key.is_empty());
            (edit_key, read_key)
        };

        if config.authless {
            log::warn!("HTTP server running in authless mode: every client may edit relationships");
        }

        Ok(Self {
            state: AppState {
                service,
                edit_key,
                read_key,
                allowed_origins: config.allowed_origins.clone(),
                authless: config.authless,
            },
        })
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Run the HTTP server
    pub async fn run(&self, host: &str, port: u16) -> Result<()> {
        let app = self.router();
        let addr = format!("{}:{}", host, port);
        log::info!("Starting Detective HTTP server on http://{}", addr);

        if !check_port_available(host, port).await {
            return Err(DetectiveError::Config(format!(
                "Port {} is already in use. Stop the other process or set http_server.port in config.toml",
                port
            )));
        }

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            DetectiveError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind to {}: {}", addr, e),
            ))
        })?;

        axum::serve(listener, app).await.map_err(|e| {
            DetectiveError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {}", e),
            ))
        })?;

        Ok(())
    }
}

/// Create the axum router
pub fn create_router(state: AppState) -> Router {
    // Build CORS layer.
    // - If allowed_origins is configured: set it explicitly so preflight responses are consistent
    //   with the origin validation done in `authorize`.
    // - If empty (local dev / authless): allow Any.
    let cors = if state.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = state
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let protected = Router::new()
        .route(
            "/persons/relationships",
            get(get_persons_relationship)
                .post(connect_persons)
                .delete(delete_relationship),
        )
        .route("/persons", axum::routing::post(create_person))
        .route("/persons/:id", get(get_person).delete(delete_person))
        .route("/persons/:id/relationships", get(get_person_relationships))
        .route_layer(middleware::from_fn_with_state(state.clone(), authorize));

    Router::new()
        .route("/health", get(handle_health))
        .route("/relationship-types", get(list_relationship_types))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Auth and origin checks for every non-public route (skipped in authless mode)
async fn authorize(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.authless {
        let access = Access::for_method(request.method());
        if let Err(response) = validate_auth(request.headers(), &state, access) {
            return response;
        }
        if let Err(response) = validate_origin(request.headers(), &state.allowed_origins) {
            return response;
        }
    }
    next.run(request).await
}

/// Handle health check endpoint
async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "detective",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}

async fn list_relationship_types() -> Json<Vec<RelationshipTypeDto>> {
    Json(
        RelationshipType::ALL
            .into_iter()
            .map(RelationshipTypeDto::from)
            .collect(),
    )
}

async fn get_person_relationships(
    State(state): State<AppState>,
    ApiPath(person_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<RelationshipsQuery>,
) -> Result<Json<Vec<RelationshipDto>>> {
    let filter = query.type_filter()?;
    let cancel = CancellationToken::new();
    // Cancelled when the handler future is dropped on client disconnect.
    let _guard = cancel.clone().drop_guard();
    let deadline = state.service.graph_config().request_timeout();

    let lookup = state
        .service
        .get_person_relationships(person_id, query.depth, &filter, &cancel);
    let edges = match tokio::time::timeout(deadline, lookup).await {
        Ok(result) => result?,
        Err(_) => {
            cancel.cancel();
            log::warn!("Relationships of {} exceeded the {:?} deadline", person_id, deadline);
            return Err(DetectiveError::Cancelled);
        }
    };

    Ok(Json(edges.into_iter().map(RelationshipDto::from).collect()))
}

async fn get_persons_relationship(
    State(state): State<AppState>,
    ApiQuery(pair): ApiQuery<PersonPairDto>,
) -> Result<Json<RelationshipDto>> {
    let kind = state
        .service
        .get_persons_relationship(pair.person1_id, pair.person2_id)
        .await?;
    Ok(Json(
        Relationship::new(pair.person1_id, pair.person2_id, kind).into(),
    ))
}

async fn connect_persons(
    State(state): State<AppState>,
    Json(body): Json<ConnectPersonsDto>,
) -> Result<StatusCode> {
    state
        .service
        .set_persons_relationship(body.person1_id, body.person2_id, body.kind)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_relationship(
    State(state): State<AppState>,
    Json(body): Json<PersonPairDto>,
) -> Result<StatusCode> {
    state
        .service
        .delete_relationship(body.person1_id, body.person2_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_person(
    State(state): State<AppState>,
    Json(body): Json<CreatePersonDto>,
) -> Result<(StatusCode, Json<PersonDto>)> {
    let person = state.service.create_person(body.full_name).await?;
    Ok((StatusCode::CREATED, Json(person.into())))
}

async fn get_person(
    State(state): State<AppState>,
    ApiPath(person_id): ApiPath<Uuid>,
) -> Result<Json<PersonDto>> {
    let person = state.service.get_person(person_id).await?;
    Ok(Json(person.into()))
}

async fn delete_person(
    State(state): State<AppState>,
    ApiPath(person_id): ApiPath<Uuid>,
) -> Result<StatusCode> {
    state.service.delete_person(person_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Validate Authorization header against the edit key and the optional read key
fn validate_auth(
    headers: &HeaderMap,
    state: &AppState,
    access: Access,
) -> std::result::Result<(), Response> {
    let auth_header = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            ErrorResponse::new(
                "Missing Authorization header",
                "Use 'Authorization: Bearer <api-key>' header",
            )
            .into_response_with(StatusCode::UNAUTHORIZED)
        })?;

    let provided_key = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        ErrorResponse::new(
            "Invalid Authorization header format",
            "Use 'Authorization: Bearer <api-key>' header",
        )
        .into_response_with(StatusCode::UNAUTHORIZED)
    })?;

    if provided_key == state.edit_key {
        return Ok(());
    }

    match &state.read_key {
        Some(read_key) if provided_key == read_key => match access {
            Access::Read => Ok(()),
            Access::Edit => Err(ErrorResponse::new(
                "Insufficient privileges",
                "The read-only API key can't modify relationships",
            )
            .into_response_with(StatusCode::FORBIDDEN)),
        },
        _ => Err(ErrorResponse::new("Invalid API key", "The API key was not recognised")
            .into_response_with(StatusCode::UNAUTHORIZED)),
    }
}

/// Validate Origin header (prevents DNS rebinding attacks)
fn validate_origin(
    headers: &HeaderMap,
    allowed_origins: &[String],
) -> std::result::Result<(), Response> {
    // If no origins are configured, allow all (for local development)
    if allowed_origins.is_empty() {
        return Ok(());
    }

    // No origin header means a direct request, not a browser
    let origin = match headers.get("origin").and_then(|h| h.to_str().ok()) {
        Some(o) => o,
        None => return Ok(()),
    };

    if allowed_origins.iter().any(|allowed| origin == allowed) {
        Ok(())
    } else {
        Err(ErrorResponse::new(
            "Origin not allowed",
            format!("Origin '{}' is not in the allowed origins list", origin),
        )
        .into_response_with(StatusCode::FORBIDDEN))
    }
}
