//! Multipart request handlers.
//!
//! Every endpoint reads the whole form up front, then hands the pixel
//! work to a blocking thread so the runtime stays responsive while large
//! pages are compared.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
};
use pagediff_export::{ComparisonPayload, CropPayload, encode_png_rgb};
use pagediff_pipeline::{
    CompareConfig, Document, PartRectangle, PipelineError, PolygonSelection, Rasterizer,
    RgbImage,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::server::AppState;

/// A multipart form, buffered by field name.
///
/// Repeated fields keep their upload order.
#[derive(Debug, Default)]
pub struct Form {
    fields: HashMap<String, Vec<Bytes>>,
}

impl Form {
    /// Buffer every named field of the request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Multipart`] if the body is not valid
    /// multipart data or exceeds the body limit.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            let data = field.bytes().await?;
            form.fields.entry(name).or_default().push(data);
        }
        tracing::debug!(fields = form.fields.len(), "read multipart form");
        Ok(form)
    }

    fn values(&self, name: &str) -> &[Bytes] {
        self.fields.get(name).map_or(&[], Vec::as_slice)
    }

    /// The first upload under `name`.
    fn file(&self, name: &'static str) -> Result<Bytes, ApiError> {
        self.values(name)
            .first()
            .cloned()
            .ok_or(ApiError::MissingField(name))
    }

    /// Every upload under `name`, at least one.
    fn files(&self, name: &'static str) -> Result<Vec<Bytes>, ApiError> {
        let files = self.values(name);
        if files.is_empty() {
            return Err(ApiError::MissingField(name));
        }
        Ok(files.to_vec())
    }

    /// Trimmed text of the first value under `name`, `None` when absent
    /// or blank.
    fn text(&self, name: &'static str) -> Result<Option<String>, ApiError> {
        let Some(raw) = self.values(name).first() else {
            return Ok(None);
        };
        let text = std::str::from_utf8(raw).map_err(|e| ApiError::InvalidField {
            field: name,
            message: e.to_string(),
        })?;
        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_owned()))
    }

    fn number<T>(&self, name: &'static str, default: T) -> Result<T, ApiError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.text(name)?.map_or(Ok(default), |text| {
            text.parse().map_err(|e: T::Err| ApiError::InvalidField {
                field: name,
                message: e.to_string(),
            })
        })
    }

    /// HTML-form style boolean; absent means `false`.
    fn flag(&self, name: &'static str) -> Result<bool, ApiError> {
        match self.text(name)?.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("false" | "0" | "off" | "no") => Ok(false),
            Some("true" | "1" | "on" | "yes") => Ok(true),
            Some(other) => Err(ApiError::InvalidField {
                field: name,
                message: format!("expected a boolean, got {other:?}"),
            }),
        }
    }

    fn json<T: DeserializeOwned>(&self, name: &'static str) -> Result<T, ApiError> {
        let text = self.text(name)?.ok_or(ApiError::MissingField(name))?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidField {
            field: name,
            message: e.to_string(),
        })
    }

    /// Zero-based index from a 1-based page field, defaulting to the
    /// first page.
    fn page_index(&self, name: &'static str) -> Result<usize, ApiError> {
        match self.number::<usize>(name, 1)? {
            0 => Err(ApiError::InvalidField {
                field: name,
                message: "pages are numbered from 1".into(),
            }),
            page => Ok(page - 1),
        }
    }

    /// Comparison parameters, each falling back to its default.
    fn config(&self) -> Result<CompareConfig, ApiError> {
        Ok(CompareConfig {
            threshold: self.number("threshold", CompareConfig::DEFAULT_THRESHOLD)?,
            box_size: self.number("box_size", CompareConfig::DEFAULT_BOX_SIZE)?,
            dilation_iterations: self.number(
                "dilation_iterations",
                CompareConfig::DEFAULT_DILATION_ITERATIONS,
            )?,
        })
    }
}

/// Run CPU-bound work off the async runtime.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Rasterize a list of uploads into one document, pages in upload order.
fn load_document<R>(rasterizer: &R, files: &[Bytes]) -> Result<Document, PipelineError>
where
    R: Rasterizer + ?Sized,
{
    let mut pages = Vec::new();
    for file in files {
        pages.extend(rasterizer.rasterize(file)?.into_pages());
    }
    Document::from_pages(pages)
}

/// Rasterize both documents concurrently.
async fn load_documents(
    state: &AppState,
    first: Vec<Bytes>,
    second: Vec<Bytes>,
) -> Result<(Document, Document), ApiError> {
    let rasterizer1 = Arc::clone(&state.rasterizer);
    let rasterizer2 = Arc::clone(&state.rasterizer);
    tokio::try_join!(
        blocking(move || Ok(load_document(rasterizer1.as_ref(), &first)?)),
        blocking(move || Ok(load_document(rasterizer2.as_ref(), &second)?)),
    )
}

/// First page of `file1` and of `file2`.
async fn load_first_pages(state: &AppState, form: &Form) -> Result<(RgbImage, RgbImage), ApiError> {
    let (doc1, doc2) =
        load_documents(state, vec![form.file("file1")?], vec![form.file("file2")?]).await?;
    Ok((first_page(doc1)?, first_page(doc2)?))
}

fn first_page(document: Document) -> Result<RgbImage, PipelineError> {
    document
        .into_pages()
        .into_iter()
        .next()
        .ok_or(PipelineError::EmptyDocument)
}

/// The pages chosen by `page1`/`page2` from `doc1`/`doc2`.
async fn load_selected_pages(
    state: &AppState,
    form: &Form,
) -> Result<(RgbImage, RgbImage), ApiError> {
    let index1 = form.page_index("page1")?;
    let index2 = form.page_index("page2")?;
    let (doc1, doc2) = load_documents(state, form.files("doc1")?, form.files("doc2")?).await?;
    Ok((doc1.page(index1)?.clone(), doc2.page(index2)?.clone()))
}

/// `POST /api/diff`: the highlighted first page as a PNG.
pub async fn handle_diff(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = Form::read(multipart).await?;
    let config = form.config()?;
    let (image1, image2) = load_first_pages(&state, &form).await?;
    let png = blocking(move || {
        let result = pagediff_pipeline::compare(&image1, &image2, &config)?;
        Ok(encode_png_rgb(&result.diff_image)?)
    })
    .await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// `POST /api/compare`: full comparison payload.
pub async fn handle_compare(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ComparisonPayload>, ApiError> {
    let form = Form::read(multipart).await?;
    let config = form.config()?;
    let (image1, image2) = load_first_pages(&state, &form).await?;
    let payload = blocking(move || {
        let result = pagediff_pipeline::compare(&image1, &image2, &config)?;
        Ok(ComparisonPayload::from_result(&result)?)
    })
    .await?;
    Ok(Json(payload))
}

/// `POST /api/compare-pages`: one payload per paired page.
pub async fn handle_compare_pages(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Vec<ComparisonPayload>>, ApiError> {
    let form = Form::read(multipart).await?;
    let config = form.config()?;
    let (doc1, doc2) = load_documents(&state, form.files("doc1")?, form.files("doc2")?).await?;
    let payloads = blocking(move || {
        pagediff_pipeline::compare_pages(doc1.pages(), doc2.pages(), &config)?
            .iter()
            .map(|result| ComparisonPayload::from_result(result).map_err(ApiError::from))
            .collect()
    })
    .await?;
    Ok(Json(payloads))
}

/// `POST /api/compare-independent`: comparison of differently sized pages.
pub async fn handle_compare_independent(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ComparisonPayload>, ApiError> {
    let form = Form::read(multipart).await?;
    let config = form.config()?;
    let (image1, image2) = load_first_pages(&state, &form).await?;
    let payload = blocking(move || {
        let result = pagediff_pipeline::compare_independent(&image1, &image2, &config)?;
        Ok(ComparisonPayload::from_result(&result)?)
    })
    .await?;
    Ok(Json(payload))
}

/// `POST /api/realign`: move the part under `rect` onto its match, then
/// compare.
pub async fn handle_realign(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ComparisonPayload>, ApiError> {
    let form = Form::read(multipart).await?;
    let config = form.config()?;
    let rectangle: PartRectangle = form.json("rect")?;
    let (image1, image2) = load_first_pages(&state, &form).await?;
    let payload = blocking(move || {
        let result = pagediff_pipeline::realign_part(&image1, &image2, rectangle, &config)?;
        Ok(ComparisonPayload::from_result(&result)?)
    })
    .await?;
    Ok(Json(payload))
}

/// `POST /api/crop`: one polygon cut from both selected pages.
pub async fn handle_crop(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CropPayload>, ApiError> {
    let form = Form::read(multipart).await?;
    let polygon: PolygonSelection = form.json("polygon")?;
    let same_frame = form.flag("same_frame")?;
    let (image1, image2) = load_selected_pages(&state, &form).await?;
    let payload = blocking(move || {
        let (first, second) =
            pagediff_pipeline::crop_by_selection(&image1, &image2, &polygon, same_frame)?;
        Ok(CropPayload::from_regions(&first, &second)?)
    })
    .await?;
    Ok(Json(payload))
}

/// `POST /api/crop-independent`: each page cut with its own polygon.
pub async fn handle_crop_independent(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CropPayload>, ApiError> {
    let form = Form::read(multipart).await?;
    let polygon1: PolygonSelection = form.json("polygon1")?;
    let polygon2: PolygonSelection = form.json("polygon2")?;
    let (image1, image2) = load_selected_pages(&state, &form).await?;
    let payload = blocking(move || {
        let (first, second) = pagediff_pipeline::crop_by_independent_selections(
            &image1, &image2, &polygon1, &polygon2,
        )?;
        Ok(CropPayload::from_regions(&first, &second)?)
    })
    .await?;
    Ok(Json(payload))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(entries: &[(&str, &str)]) -> Form {
        let mut form = Form::default();
        for (name, value) in entries {
            form.fields
                .entry((*name).to_owned())
                .or_default()
                .push(Bytes::copy_from_slice(value.as_bytes()));
        }
        form
    }

    #[test]
    fn config_uses_defaults_for_missing_fields() {
        let config = form(&[("threshold", "12")]).config().unwrap();
        assert_eq!(config.threshold, 12);
        assert_eq!(config.box_size, CompareConfig::DEFAULT_BOX_SIZE);
        assert_eq!(
            config.dilation_iterations,
            CompareConfig::DEFAULT_DILATION_ITERATIONS
        );
    }

    #[test]
    fn blank_numbers_fall_back_to_default() {
        let config = form(&[("box_size", "  ")]).config().unwrap();
        assert_eq!(config.box_size, CompareConfig::DEFAULT_BOX_SIZE);
    }

    #[test]
    fn malformed_number_names_the_field() {
        let err = form(&[("threshold", "lots")]).config().unwrap_err();
        assert!(matches!(
            err,
            ApiError::InvalidField {
                field: "threshold",
                ..
            }
        ));
    }

    #[test]
    fn flags_accept_form_spellings() {
        assert!(form(&[("same_frame", "true")]).flag("same_frame").unwrap());
        assert!(form(&[("same_frame", "ON")]).flag("same_frame").unwrap());
        assert!(!form(&[("same_frame", "0")]).flag("same_frame").unwrap());
        assert!(!form(&[]).flag("same_frame").unwrap());
        assert!(form(&[("same_frame", "maybe")]).flag("same_frame").is_err());
    }

    #[test]
    fn pages_are_one_based() {
        assert_eq!(form(&[]).page_index("page1").unwrap(), 0);
        assert_eq!(form(&[("page1", "3")]).page_index("page1").unwrap(), 2);
        assert!(form(&[("page1", "0")]).page_index("page1").is_err());
    }

    #[test]
    fn repeated_files_keep_upload_order() {
        let form = form(&[("doc1", "a"), ("doc1", "b")]);
        let files = form.files("doc1").unwrap();
        assert_eq!(files, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
        assert!(matches!(
            form.files("doc2"),
            Err(ApiError::MissingField("doc2"))
        ));
    }

    #[test]
    fn json_fields_parse_or_report() {
        let rect: PartRectangle = form(&[("rect", r#"{"x":1,"y":2,"w":3,"h":4}"#)])
            .json("rect")
            .unwrap();
        assert_eq!(rect, PartRectangle::new(1, 2, 3, 4));

        let empty = form(&[("polygon", "[]")]).json::<PolygonSelection>("polygon");
        assert!(matches!(
            empty,
            Err(ApiError::InvalidField {
                field: "polygon",
                ..
            })
        ));
        assert!(matches!(
            form(&[]).json::<PolygonSelection>("polygon"),
            Err(ApiError::MissingField("polygon"))
        ));
    }
}
