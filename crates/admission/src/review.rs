//! review - AdmissionReview 信封

use std::collections::BTreeMap;

use mcv_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::request::AdmissionRequest;
use crate::{OWNER_ANNOTATION_KEY, OWNER_ANNOTATION_VALUE};

pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";
pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

impl AdmissionReview {
    /// 从请求体解码，并取出其中的请求
    pub fn decode_request(body: &[u8]) -> AppResult<AdmissionRequest> {
        let review: Self = serde_json::from_slice(body)?;
        if review.kind != ADMISSION_REVIEW_KIND {
            return Err(AppError::decode(format!(
                "unexpected kind {:?}, expected {}",
                review.kind, ADMISSION_REVIEW_KIND
            )));
        }
        review
            .request
            .ok_or_else(|| AppError::decode("AdmissionReview carries no request"))
    }

    /// 构造响应信封
    pub fn respond(response: AdmissionResponse) -> Self {
        Self {
            api_version: ADMISSION_API_VERSION.to_string(),
            kind: ADMISSION_REVIEW_KIND.to_string(),
            request: None,
            response: Some(response),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResponseStatus>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub audit_annotations: BTreeMap<String, String>,
}

impl AdmissionResponse {
    pub fn new(uid: impl Into<String>, allowed: bool, status: ResponseStatus) -> Self {
        let mut audit_annotations = BTreeMap::new();
        audit_annotations.insert(
            OWNER_ANNOTATION_KEY.to_string(),
            OWNER_ANNOTATION_VALUE.to_string(),
        );
        Self {
            uid: uid.into(),
            allowed,
            status: Some(status),
            audit_annotations,
        }
    }
}

/// metav1.Status 的子集
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
    pub code: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_request_from_review() {
        let body = json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5",
                "kind": {"group": "", "version": "v1", "kind": "Namespace"},
                "resource": {"group": "", "version": "v1", "resource": "namespaces"},
                "name": "openshift-foo",
                "operation": "DELETE",
                "userInfo": {"username": "bob"},
                "oldObject": {"metadata": {"name": "openshift-foo"}}
            }
        });
        let req = AdmissionReview::decode_request(body.to_string().as_bytes()).unwrap();
        assert_eq!(req.uid, "705ab4f5");
        assert_eq!(req.name, "openshift-foo");
    }

    #[test]
    fn test_decode_rejects_missing_request_and_bad_json() {
        let body = json!({"apiVersion": "admission.k8s.io/v1", "kind": "AdmissionReview"});
        let err = AdmissionReview::decode_request(body.to_string().as_bytes()).unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = AdmissionReview::decode_request(b"{not json").unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));

        let body = json!({"kind": "Pod"});
        assert!(AdmissionReview::decode_request(body.to_string().as_bytes()).is_err());
    }

    #[test]
    fn test_response_envelope_shape() {
        let response = AdmissionResponse::new(
            "uid-1",
            false,
            ResponseStatus {
                code: 403,
                message: "nope".to_string(),
                reason: Some("Forbidden".to_string()),
            },
        );
        let value = serde_json::to_value(AdmissionReview::respond(response)).unwrap();
        assert_eq!(value["apiVersion"], "admission.k8s.io/v1");
        assert_eq!(value["kind"], "AdmissionReview");
        assert_eq!(value["response"]["uid"], "uid-1");
        assert_eq!(value["response"]["allowed"], false);
        assert_eq!(value["response"]["status"]["code"], 403);
        assert_eq!(
            value["response"]["auditAnnotations"]["owner"],
            "srep-managed-webhook"
        );
        assert!(value.get("request").is_none());
    }
}
