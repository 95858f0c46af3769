//! Request body extractors.
//!
//! The document endpoints accept either `multipart/form-data` (file uploads
//! and text fields) or a JSON object of string fields, so handlers take an
//! [`InputForm`] and ask it for a [`PdfSource`] by field name. JSON-only
//! endpoints use [`ApiJson`], which turns axum's rejections into the
//! service's `{"detail": …}` error body.

use crate::error::ServiceError;
use crate::pipeline::input::PdfSource;
use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Json,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// JSON body whose rejection is a [`ServiceError`] (400).
#[derive(Debug, axum::extract::FromRequest)]
#[from_request(via(axum::Json), rejection(ServiceError))]
pub struct ApiJson<T>(pub T);

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Files and text fields of a multipart or JSON request.
#[derive(Debug, Default)]
pub struct InputForm {
    files: HashMap<String, Upload>,
    fields: HashMap<String, String>,
}

impl InputForm {
    /// Non-blank text field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Take the upload in `file_field`, else the first URL field present.
    pub fn take_source(&mut self, file_field: &str, url_fields: &[&str]) -> Option<PdfSource> {
        if let Some(upload) = self.files.remove(file_field) {
            return Some(PdfSource::Upload {
                filename: upload.filename,
                bytes: upload.bytes,
            });
        }
        url_fields
            .iter()
            .find_map(|name| self.field(name))
            .map(|url| PdfSource::Url(url.to_string()))
    }

    /// Like [`take_source`](Self::take_source), failing with `MissingInput`.
    pub fn require_source(
        &mut self,
        file_field: &str,
        url_fields: &[&str],
    ) -> Result<PdfSource, ServiceError> {
        self.take_source(file_field, url_fields).ok_or_else(|| {
            ServiceError::MissingInput(format!(
                "upload a PDF in '{}' or pass {}",
                file_field,
                url_fields
                    .iter()
                    .map(|f| format!("'{f}'"))
                    .collect::<Vec<_>>()
                    .join(" or ")
            ))
        })
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ServiceError> {
        let mut form = InputForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServiceError::InvalidUpload(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ServiceError::InvalidUpload(e.body_text()))?;
                    // Browsers send an empty part for an untouched file input.
                    if filename.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    debug!("Multipart file '{}': {} ({} bytes)", name, filename, bytes.len());
                    form.files.insert(
                        name,
                        Upload {
                            filename,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ServiceError::InvalidUpload(e.body_text()))?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    fn from_json(object: Map<String, Value>) -> Self {
        let fields = object
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect();
        InputForm {
            files: HashMap::new(),
            fields,
        }
    }
}

#[async_trait]
impl<S> FromRequest<S> for InputForm
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ServiceError::InvalidUpload(e.body_text()))?;
            Self::from_multipart(multipart).await
        } else if content_type.starts_with("application/json") {
            let Json(object) = Json::<Map<String, Value>>::from_request(req, state).await?;
            Ok(Self::from_json(object))
        } else {
            Err(ServiceError::MissingInput(
                "expected a multipart/form-data or application/json body".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_form(v: Value) -> InputForm {
        match v {
            Value::Object(m) => InputForm::from_json(m),
            _ => unreachable!(),
        }
    }

    #[test]
    fn json_url_becomes_source() {
        let mut form = json_form(json!({"file_url": " https://example.org/p.pdf "}));
        match form.take_source("file", &["file_url", "url"]) {
            Some(PdfSource::Url(u)) => assert_eq!(u, "https://example.org/p.pdf"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn upload_wins_over_url() {
        let mut form = json_form(json!({"url": "https://example.org/p.pdf"}));
        form.files.insert(
            "file".into(),
            Upload {
                filename: "a.pdf".into(),
                bytes: b"%PDF".to_vec(),
            },
        );
        assert!(matches!(
            form.take_source("file", &["url"]),
            Some(PdfSource::Upload { .. })
        ));
    }

    #[test]
    fn blank_and_non_string_fields_are_ignored() {
        let mut form = json_form(json!({"file_url": "   ", "url": 42}));
        let err = form.require_source("file", &["file_url", "url"]).unwrap_err();
        assert!(matches!(err, ServiceError::MissingInput(_)));
        assert!(err.to_string().contains("'file_url' or 'url'"));
    }
}
