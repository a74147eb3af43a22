//! OpenAPI documentation and schema generation

use utoipa::OpenApi;

/// OpenAPI documentation for the download-gate REST API
///
/// Served at `/openapi.json`, and browsable at `/swagger-ui` when enabled.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "download-gate REST API",
        version = "0.1.0",
        description = "Fetches downloads, unpacks archives, scans every file for malware and hands clean files out through single-use links",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    paths(
        crate::api::routes::submit_data,
        crate::api::routes::retrieve,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::api::routes::SubmitDataRequest,
        crate::api::routes::SubmitDataResponse,
        crate::types::ScanSummary,
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "scan", description = "Submit downloads for scanning and redeem one-shot links"),
        (name = "system", description = "Health check and OpenAPI document"),
    )
)]
pub struct ApiDoc;
