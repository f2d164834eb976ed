use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::Serialize;

use super::wire::{
    FindLabelRequest, ImageInfo, LassoRequest, SamPayload, SliceKind, SliceRequest, StrokeRequest,
};
use super::{Backend, RemoteError, npy};
use crate::ops::ingest::RawSlice;
use crate::volume::{SliceCoordinate, VolumeShape};

/// `Backend` over HTTP: every operation is a POST to `base_url + path`.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .user_agent(concat!("volpaint/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn check(path: &str, resp: Response) -> Result<Response, RemoteError> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            Err(RemoteError::Status { path: path.to_string(), code: status.as_u16() })
        }
    }

    fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<Vec<u8>, RemoteError> {
        let resp = self.client.post(self.url(path)).json(body).send()?;
        Ok(Self::check(path, resp)?.bytes()?.to_vec())
    }

    fn post_empty(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let resp = self.client.post(self.url(path)).send()?;
        Ok(Self::check(path, resp)?.bytes()?.to_vec())
    }
}

impl Backend for HttpBackend {
    fn fetch_slice(
        &self,
        kind: SliceKind,
        coord: SliceCoordinate,
        contour: bool,
    ) -> Result<RawSlice, RemoteError> {
        let body = self.post_json(kind.path(), &SliceRequest::for_kind(kind, coord, contour))?;
        npy::decode_slice(&body)
    }

    fn submit_stroke(&self, stroke: &StrokeRequest) -> Result<(), RemoteError> {
        self.post_json("/draw", stroke).map(|_| ())
    }

    fn submit_sam(&self, payload: &SamPayload) -> Result<(), RemoteError> {
        self.post_json("/sam", payload).map(|_| ())
    }

    fn apply_lasso(&self, lasso: &LassoRequest) -> Result<(), RemoteError> {
        self.post_json("/apply_lasso/annotation", lasso).map(|_| ())
    }

    fn find_label_by_click(&self, req: &FindLabelRequest) -> Result<i64, RemoteError> {
        let body = self.post_json("/find_label_by_click", req)?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn undo(&self) -> Result<(), RemoteError> {
        self.post_empty("/undo_annot").map(|_| ())
    }

    fn new_annotation(&self) -> Result<(), RemoteError> {
        self.post_empty("/new_annot/annotation").map(|_| ())
    }

    fn is_annotation_empty(&self) -> Result<bool, RemoteError> {
        let body = self.post_empty("/is_annotation_empty")?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn image_info(&self) -> Result<VolumeShape, RemoteError> {
        let body = self.post_empty("/get_image_info/image_info")?;
        let info: ImageInfo = serde_json::from_slice(&body)?;
        Ok(info.image_shape)
    }
}
