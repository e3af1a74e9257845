use crate::config::{BackendConfig, Config};
use ambry_core::{
    AmbryError, BlobService, BlobServiceOptions, ConnectorRegistry, CreateEntryRequest,
    EntryFilter, GetEntryRequest, IpfsBlobStorageConnector, IpfsConfig, MemoryBlobStorageConnector,
    MemoryEntryIndex, MemoryVaultConnector, OrderField, QueryEntriesRequest, RemoveEntryRequest,
    Result, SortDirection, UpdateEntryRequest,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub struct ServerState {
    pub service: BlobService,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody {
    blob: String,
    #[serde(default)]
    encoding_format: Option<String>,
    #[serde(default)]
    file_extension: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetBlobQuery {
    #[serde(default)]
    include_content: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody {
    #[serde(default)]
    encoding_format: Option<String>,
    #[serde(default)]
    file_extension: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryParams {
    #[serde(default)]
    conditions: Option<String>,
    #[serde(default)]
    order_by: Option<OrderField>,
    #[serde(default)]
    order_by_direction: Option<SortDirection>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Wire the configured backends, index and vault into a service instance.
pub fn build_service(config: &Config) -> Result<BlobService> {
    let mut registry = ConnectorRegistry::new();
    for backend in &config.backends {
        match backend {
            BackendConfig::Memory { namespace } => {
                registry.register(namespace.clone(), Arc::new(MemoryBlobStorageConnector::new()));
            }
            BackendConfig::Ipfs {
                namespace,
                api_url,
                bearer_token,
            } => {
                registry.register(
                    namespace.clone(),
                    Arc::new(IpfsBlobStorageConnector::new(IpfsConfig {
                        api_url: api_url.clone(),
                        bearer_token: bearer_token.clone(),
                    })),
                );
            }
        }
    }

    let mut options = BlobServiceOptions::new(registry, Arc::new(MemoryEntryIndex::new()));
    options.default_namespace = config.default_namespace.clone();
    options.scoping = config.scoping.to_scoping();

    if let Some(vault) = &config.vault {
        let hex_key = vault.resolve_master_key()?;
        options.vault = Some(Arc::new(MemoryVaultConnector::from_hex(&hex_key)?));
        options.vault_key_id = vault.key_id.clone();
    }

    BlobService::new(options)
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/blob", axum::routing::post(create_blob).get(query_blobs))
        .route(
            "/blob/:id",
            get(get_blob).put(update_blob).delete(remove_blob),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: Config) -> Result<()> {
    let service = build_service(&config)?;
    let state = Arc::new(ServerState { service });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| AmbryError::Config(format!("failed to bind {}: {}", config.bind_addr, e)))?;
    tracing::info!("listening on {}", config.bind_addr);

    axum::serve(listener, router(state))
        .await
        .map_err(|e| AmbryError::Backend(e.to_string()))?;

    Ok(())
}

/// Status is decided by the root cause so wrapped operation failures map the
/// same as unwrapped guard failures.
fn error_response(error: AmbryError) -> Response {
    let status = match error.root_cause() {
        AmbryError::NotFound(_) => StatusCode::NOT_FOUND,
        AmbryError::MissingIdentity(_) => StatusCode::UNAUTHORIZED,
        AmbryError::MalformedLocator(_)
        | AmbryError::NamespaceMismatch { .. }
        | AmbryError::NoBackendRegistered(_)
        | AmbryError::Validation { .. }
        | AmbryError::InvalidMetadata(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("request failed: {}", error);
    } else {
        tracing::debug!("request rejected: {}", error);
    }

    let body = ErrorBody {
        error: error.root_cause().to_string(),
    };
    (status, Json(body)).into_response()
}

fn identities(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    (
        header_value("x-user-identity"),
        header_value("x-node-identity"),
    )
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn create_blob(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBody>,
) -> Response {
    let (user_identity, node_identity) = identities(&headers);
    let request = CreateEntryRequest {
        blob: body.blob,
        encoding_format: body.encoding_format,
        file_extension: body.file_extension,
        metadata: body.metadata,
        namespace: body.namespace,
        user_identity,
        node_identity,
    };

    match state.service.create(request).await {
        Ok(locator) => {
            let location = format!("/blob/{}", locator);
            (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(CreateResponse {
                    id: locator.to_string(),
                }),
            )
                .into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn get_blob(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Query(query): Query<GetBlobQuery>,
    headers: HeaderMap,
) -> Response {
    let (user_identity, node_identity) = identities(&headers);
    let request = GetEntryRequest {
        id,
        include_content: query.include_content,
        user_identity,
        node_identity,
    };

    match state.service.get(request).await {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn update_blob(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<UpdateBody>,
) -> Response {
    let (user_identity, node_identity) = identities(&headers);
    let request = UpdateEntryRequest {
        id,
        encoding_format: body.encoding_format,
        file_extension: body.file_extension,
        metadata: body.metadata,
        user_identity,
        node_identity,
    };

    match state.service.update(request).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

async fn remove_blob(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let (user_identity, node_identity) = identities(&headers);
    let request = RemoveEntryRequest {
        id,
        user_identity,
        node_identity,
    };

    match state.service.remove(request).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

async fn query_blobs(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<QueryParams>,
    headers: HeaderMap,
) -> Response {
    // Conditions arrive URL-encoded as a flat JSON filter tree:
    // {"property","op","value"} or {"logic","filters"}.
    let filter = match params.conditions.as_deref() {
        Some(raw) => match serde_json::from_str::<EntryFilter>(raw) {
            Ok(filter) => Some(filter),
            Err(error) => {
                return error_response(AmbryError::Validation {
                    property: "conditions".to_string(),
                    reason: error.to_string(),
                });
            }
        },
        None => None,
    };

    let (user_identity, node_identity) = identities(&headers);
    let request = QueryEntriesRequest {
        filter,
        order_by: params.order_by,
        order_direction: params.order_by_direction,
        cursor: params.cursor,
        page_size: params.page_size,
        user_identity,
        node_identity,
    };

    match state.service.query(request).await {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(error) => error_response(error),
    }
}
