use anyhow::Result;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::storage::ObjectStorage;

const MAX_RESUME_BYTES: i64 = 5 * 1024 * 1024;
const MAX_IMAGE_BYTES: i64 = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Resume,
    ProfilePicture,
    CompanyLogo,
}

impl UploadKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "resume" => Some(UploadKind::Resume),
            "profile_picture" => Some(UploadKind::ProfilePicture),
            "company_logo" => Some(UploadKind::CompanyLogo),
            _ => None,
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            UploadKind::Resume => "resumes",
            UploadKind::ProfilePicture => "pictures",
            UploadKind::CompanyLogo => "logos",
        }
    }

    fn max_bytes(&self) -> i64 {
        match self {
            UploadKind::Resume => MAX_RESUME_BYTES,
            UploadKind::ProfilePicture | UploadKind::CompanyLogo => MAX_IMAGE_BYTES,
        }
    }

    /// Extension for an accepted content type, None when the type is not
    /// allowed for this kind of upload.
    fn extension_for(&self, content_type: &str) -> Option<&'static str> {
        match self {
            UploadKind::Resume => match content_type {
                "application/pdf" => Some("pdf"),
                "application/msword" => Some("doc"),
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                    Some("docx")
                }
                _ => None,
            },
            UploadKind::ProfilePicture => image_extension(content_type),
            UploadKind::CompanyLogo => {
                image_extension(content_type).or(match content_type {
                    "image/svg+xml" => Some("svg"),
                    _ => None,
                })
            }
        }
    }
}

fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PresignedUpload {
    pub url: String,
    pub key: String,
}

#[derive(Debug)]
pub enum UploadOutcome {
    Ready(PresignedUpload),
    UnsupportedType,
    TooLarge { max_bytes: i64 },
}

#[derive(Clone)]
pub struct UploadService {
    storage: ObjectStorage,
    url_ttl_seconds: u64,
}

impl UploadService {
    pub fn new(storage: ObjectStorage, url_ttl_seconds: u64) -> Self {
        Self {
            storage,
            url_ttl_seconds,
        }
    }

    /// Validates the declared type and size, then hands back a presigned PUT
    /// the client uploads against directly. The returned key is what the
    /// client stores on its profile or application afterwards.
    pub async fn presign(
        &self,
        user_id: Uuid,
        kind: UploadKind,
        content_type: &str,
        content_length: i64,
    ) -> Result<UploadOutcome> {
        let Some(extension) = kind.extension_for(content_type) else {
            return Ok(UploadOutcome::UnsupportedType);
        };
        if content_length <= 0 || content_length > kind.max_bytes() {
            return Ok(UploadOutcome::TooLarge {
                max_bytes: kind.max_bytes(),
            });
        }

        let key = format!(
            "{}/{}/{}.{}",
            kind.prefix(),
            user_id,
            Uuid::new_v4(),
            extension
        );
        let url = self
            .storage
            .presign_upload(&key, content_type, content_length, self.url_ttl_seconds)
            .await?;

        Ok(UploadOutcome::Ready(PresignedUpload { url, key }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_accepts_documents_only() {
        assert_eq!(UploadKind::Resume.extension_for("application/pdf"), Some("pdf"));
        assert_eq!(
            UploadKind::Resume.extension_for(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            ),
            Some("docx")
        );
        assert_eq!(UploadKind::Resume.extension_for("image/png"), None);
    }

    #[test]
    fn logo_accepts_svg_but_picture_does_not() {
        assert_eq!(UploadKind::CompanyLogo.extension_for("image/svg+xml"), Some("svg"));
        assert_eq!(UploadKind::ProfilePicture.extension_for("image/svg+xml"), None);
    }

    #[test]
    fn size_caps_differ_by_kind() {
        assert_eq!(UploadKind::Resume.max_bytes(), 5 * 1024 * 1024);
        assert_eq!(UploadKind::ProfilePicture.max_bytes(), 2 * 1024 * 1024);
    }
}
