//! HTTP handlers. Each one unpacks its request, calls into the library flow
//! and lets [`ServiceError`]'s `IntoResponse` produce the error body.

use super::form::{ApiJson, InputForm};
use super::AppState;
use crate::error::ServiceError;
use crate::extract::extract_questions;
use crate::output::{
    ExtractionResult, ForkRequest, ForkResponse, GenerateHtmlRequest, ResumeDiff, SolveRequest,
    SolveResponse, TextResponse,
};
use crate::resume::{extract_document_text, fork_template, generate_html, resume_diff};
use crate::solve::solve_question;
use axum::{extract::State, response::Html, Json};
use serde_json::{json, Value};

/// Fields accepted as a document URL, in priority order.
const URL_FIELDS: &[&str] = &["file_url", "url"];

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn extract(
    State(state): State<AppState>,
    mut form: InputForm,
) -> Result<Json<ExtractionResult>, ServiceError> {
    let source = form.require_source("file", URL_FIELDS)?;
    let result =
        extract_questions(source, state.model.as_ref(), &state.http, &state.config).await?;
    Ok(Json(result))
}

pub async fn solve(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SolveRequest>,
) -> Result<Json<SolveResponse>, ServiceError> {
    let response = solve_question(request, state.model.as_ref(), &state.http, &state.config).await?;
    Ok(Json(response))
}

pub async fn extract_pdf_text(
    State(state): State<AppState>,
    mut form: InputForm,
) -> Result<Json<TextResponse>, ServiceError> {
    let source = form.require_source("file", URL_FIELDS)?;
    let response = extract_document_text(source, &state.http, &state.config).await?;
    Ok(Json(response))
}

pub async fn fork(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ForkRequest>,
) -> Result<Json<ForkResponse>, ServiceError> {
    let response = fork_template(request, state.model.as_ref()).await?;
    Ok(Json(response))
}

pub async fn diff(
    State(state): State<AppState>,
    mut form: InputForm,
) -> Result<Json<ResumeDiff>, ServiceError> {
    let first = form.require_source("resume1_file", &["resume1_url"])?;
    let second = form.require_source("resume2_file", &["resume2_url"])?;
    let response = resume_diff(
        first,
        second,
        state.model.as_ref(),
        &state.http,
        &state.config,
    )
    .await?;
    Ok(Json(response))
}

pub async fn html(ApiJson(request): ApiJson<GenerateHtmlRequest>) -> Html<String> {
    Html(generate_html(&request))
}
