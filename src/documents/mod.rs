//! Downloads documents linked from detail pages through the streaming proxy.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::fetch_engine::{FetchError, RetryPolicy};
use crate::utils::{CHROME_USER_AGENT, last_path_segment, with_query};

/// Directory under the storage root that receives documents.
pub const DOCUMENTS_DIR: &str = "documents";

/// Local file name of the `index`-th document of a tender (0-based).
///
/// The first document is `tender_{n}.pdf`, later ones `tender_{n}_{index+1}.pdf`.
#[must_use]
pub fn document_file_name(tender_number: &str, index: usize) -> String {
    let stem = sanitize_filename::sanitize(tender_number);
    if index == 0 {
        format!("tender_{stem}.pdf")
    } else {
        format!("tender_{stem}_{}.pdf", index + 1)
    }
}

pub struct DocumentDownloader {
    http: reqwest::Client,
    proxy_url: String,
    root: PathBuf,
    policy: RetryPolicy,
}

impl DocumentDownloader {
    /// Files land in `{root}/documents/`.
    pub fn new(
        proxy_url: impl Into<String>,
        root: impl Into<PathBuf>,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(CHROME_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            proxy_url: proxy_url.into(),
            root: root.into(),
            policy,
        })
    }

    /// Download every link of one tender page.
    ///
    /// Returns the paths (relative to the storage root) of the files that
    /// made it; failed documents are logged and skipped.
    pub async fn download_all(&self, page_url: &str, links: &[String]) -> Vec<String> {
        if links.is_empty() {
            return Vec::new();
        }
        let tender_number = last_path_segment(page_url).unwrap_or_else(|| "unknown".to_string());

        if let Err(e) = tokio::fs::create_dir_all(self.root.join(DOCUMENTS_DIR)).await {
            warn!("Cannot create documents directory under {}: {e}", self.root.display());
            return Vec::new();
        }

        let mut saved = Vec::new();
        for (index, link) in links.iter().enumerate() {
            let relative = Path::new(DOCUMENTS_DIR).join(document_file_name(&tender_number, index));
            match self.download(link, &self.root.join(&relative)).await {
                Ok(bytes) => {
                    info!("Saved {} ({bytes} bytes)", relative.display());
                    saved.push(relative.to_string_lossy().into_owned());
                }
                Err(e) => warn!("Skipping document {link}: {e}"),
            }
        }
        debug!("Downloaded {}/{} documents for {page_url}", saved.len(), links.len());
        saved
    }

    /// Stream one document into `dest`. Returns the byte count.
    pub async fn download(&self, link: &str, dest: &Path) -> Result<u64, FetchError> {
        let proxied = with_query(&self.proxy_url, &[("url", link)])
            .map_err(|e| FetchError::MalformedTarget {
                url: link.to_string(),
                reason: e.to_string(),
            })?;

        self.policy
            .execute(&proxied, |_| self.stream_to_file(&proxied, dest))
            .await
            .into_result()
    }

    async fn stream_to_file(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let response = self.http.get(url).send().await?;
        let status = response.status().as_u16();
        match status {
            200..=299 => {}
            502..=504 => {
                return Err(FetchError::ServerError {
                    status,
                    url: url.to_string(),
                });
            }
            _ => return Err(FetchError::Internal(format!("unexpected status {status} from {url}"))),
        }

        let partial = dest.with_extension("pdf.part");
        let written = match write_stream(response, &partial).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };
        tokio::fs::rename(&partial, dest)
            .await
            .map_err(|e| {
                FetchError::Internal(format!("Failed to finalize {}: {e}", dest.display()))
            })?;
        Ok(written)
    }
}

async fn write_stream(response: reqwest::Response, path: &Path) -> Result<u64, FetchError> {
    let io_err = |e: std::io::Error| {
        FetchError::Internal(format!("Failed to write {}: {e}", path.display()))
    };

    let mut file = tokio::fs::File::create(path).await.map_err(io_err)?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_err)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_follow_index() {
        assert_eq!(document_file_name("1766385752801", 0), "tender_1766385752801.pdf");
        assert_eq!(document_file_name("1766385752801", 1), "tender_1766385752801_2.pdf");
        assert_eq!(document_file_name("a/b", 2), "tender_ab_3.pdf");
    }
}
