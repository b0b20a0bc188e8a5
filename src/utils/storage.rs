use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

//
// Attachments are stored under:
//   {storage_root}/{resource}/{record_id}/{uuid}.pdf
//

pub fn attachment_dir(root: &Path, resource: &str, record_id: i32) -> PathBuf {
    root.join(resource.trim_start_matches('/')).join(record_id.to_string())
}

/// PDFs are accepted on the declared content type and the `%PDF` magic bytes.
pub fn looks_like_pdf(content_type: Option<&str>, bytes: &[u8]) -> bool {
    content_type.map_or(true, |ct| ct == "application/pdf") && bytes.starts_with(b"%PDF")
}

/// Writes the upload to a fresh file and returns its path.
pub async fn store_pdf(
    root: &Path,
    resource: &str,
    record_id: i32,
    bytes: &[u8],
) -> std::io::Result<PathBuf> {
    let dir = attachment_dir(root, resource, record_id);
    fs::create_dir_all(&dir).await?;

    let path = dir.join(format!("{}.pdf", Uuid::new_v4()));
    let mut file = fs::File::create(&path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(path)
}

/// Deletes a stored file; a file that is already gone is not an error.
pub async fn remove_stored(path: &str) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Streams a stored PDF back to the client, `404` when it is missing on disk.
pub async fn stream_pdf(path: &str, download_name: &str) -> Result<Response, StatusCode> {
    if fs::metadata(path).await.is_err() {
        tracing::warn!("Attachment missing on disk: {}", path);
        return Err(StatusCode::NOT_FOUND);
    }
    let file = fs::File::open(path)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let stream = ReaderStream::new(file);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", download_name),
        )
        .body(Body::from_stream(stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("office-workflow-{}-{}", name, Uuid::new_v4()))
    }

    #[test]
    fn directory_layout_is_resource_then_id() {
        let dir = attachment_dir(Path::new("/srv/files"), "/invoices", 42);
        assert_eq!(dir, PathBuf::from("/srv/files/invoices/42"));
    }

    #[test]
    fn pdf_detection_checks_magic_and_type() {
        assert!(looks_like_pdf(Some("application/pdf"), b"%PDF-1.7 ..."));
        assert!(looks_like_pdf(None, b"%PDF-1.4"));
        assert!(!looks_like_pdf(Some("image/png"), b"%PDF-1.4"));
        assert!(!looks_like_pdf(Some("application/pdf"), b"\x89PNG"));
    }

    #[test]
    fn missing_file_streams_as_not_found() {
        let result = tokio_test::block_on(stream_pdf("/definitely/not/here.pdf", "x.pdf"));
        assert_eq!(result.err(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn stored_file_can_be_streamed_and_removed() {
        let root = scratch_root("store");
        tokio_test::block_on(async {
            let path = store_pdf(&root, "expense-reports", 5, b"%PDF-1.4 body")
                .await
                .unwrap();
            assert!(path.starts_with(root.join("expense-reports/5")));

            let path_str = path.to_string_lossy().to_string();
            let response = stream_pdf(&path_str, "spj-5.pdf").await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers().get(header::CONTENT_TYPE).unwrap(),
                "application/pdf"
            );

            remove_stored(&path_str).await.unwrap();
            remove_stored(&path_str).await.unwrap();
            assert!(fs::metadata(&path).await.is_err());
        });
        let _ = std::fs::remove_dir_all(root);
    }
}
