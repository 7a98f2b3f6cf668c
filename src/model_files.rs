//! Fetches frozen-graph artifacts on first start.

use std::{env, path::Path};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};

use crate::config::TensorflowConfig;
use crate::error::BackendError;

async fn download_file(http: &reqwest::Client, url: &str, path: &str) -> Result<(), BackendError> {
    tracing::info!("Downloading {} from {}", path, url);

    let mut headers = HeaderMap::new();
    if let Ok(token) = env::var("GITHUB_TOKEN") {
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| BackendError::Malformed("GITHUB_TOKEN is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, auth_value);
    }
    headers.insert(ACCEPT, HeaderValue::from_static("application/octet-stream"));

    let response = http.get(url).headers(headers).send().await?;
    if !response.status().is_success() {
        return Err(BackendError::status(
            response.status().as_u16(),
            &format!("failed to download {}", url),
        ));
    }

    let bytes = response.bytes().await?;
    if let Some(parent) = Path::new(path).parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BackendError::Model(e.to_string()))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| BackendError::Model(e.to_string()))
}

/// Downloads the graph and label list when they are missing and a source URL is set.
pub async fn ensure_files_exist(http: &reqwest::Client, config: &TensorflowConfig) -> Result<(), BackendError> {
    let artifacts = [
        (&config.model_path, &config.model_url, "MODEL_URL"),
        (&config.labels_path, &config.labels_url, "CLASS_LIST_URL"),
    ];

    for (path, url, url_var) in artifacts {
        if Path::new(path).exists() {
            continue;
        }
        match url {
            Some(url) => download_file(http, url, path).await?,
            None => {
                return Err(BackendError::Model(format!(
                    "{} is missing and {} is not set",
                    path, url_var
                )))
            }
        }
    }

    Ok(())
}
