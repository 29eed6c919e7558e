//! Asset pipeline: fetching bytes, decoding images and OBJ/MTL models.
//!
//! All loading goes through an [`AssetSource`]. The native build reads from the asset
//! directory with tokio, the web build fetches relative to the page origin. Fetches are
//! retried with exponential backoff before a failure is reported.

use std::{pin::Pin, sync::Arc, time::Duration};

use anyhow::Context as _;

use crate::config::RetryPolicy;

pub mod mesh;
pub mod model;
pub mod texture;

/// Boxed future returned by asset sources. Native futures must be `Send` so they can
/// run on the tokio runtime, web futures live on the single JS thread.
#[cfg(not(target_arch = "wasm32"))]
pub type AssetFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
#[cfg(target_arch = "wasm32")]
pub type AssetFuture<T> = Pin<Box<dyn Future<Output = T> + 'static>>;

/// Resolves asset paths to bytes.
pub trait AssetSource: Send + Sync + 'static {
    fn fetch(&self, path: &str) -> AssetFuture<anyhow::Result<Vec<u8>>>;

    /// Waits between retries.
    fn backoff(&self, delay: Duration) -> AssetFuture<()>;
}

impl<S: AssetSource + ?Sized> AssetSource for Arc<S> {
    fn fetch(&self, path: &str) -> AssetFuture<anyhow::Result<Vec<u8>>> {
        (**self).fetch(path)
    }

    fn backoff(&self, delay: Duration) -> AssetFuture<()> {
        (**self).backoff(delay)
    }
}

/// Reads assets relative to a root directory.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Clone, Debug)]
pub struct FileSource {
    root: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileSource {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl AssetSource for FileSource {
    fn fetch(&self, path: &str) -> AssetFuture<anyhow::Result<Vec<u8>>> {
        let full_path = self.root.join(path);
        Box::pin(async move {
            tokio::fs::read(&full_path)
                .await
                .with_context(|| format!("could not read {}", full_path.display()))
        })
    }

    fn backoff(&self, delay: Duration) -> AssetFuture<()> {
        Box::pin(tokio::time::sleep(delay))
    }
}

/// Fetches assets from `<origin>/assets/` of the hosting page.
#[cfg(target_arch = "wasm32")]
#[derive(Clone, Debug, Default)]
pub struct HttpSource;

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("no window")?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("page has no origin"))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
    Ok(base.join(file_name)?)
}

#[cfg(target_arch = "wasm32")]
impl AssetSource for HttpSource {
    fn fetch(&self, path: &str) -> AssetFuture<anyhow::Result<Vec<u8>>> {
        let path = path.to_string();
        Box::pin(async move {
            let url = format_url(&path)?;
            let response = reqwest::get(url).await?.error_for_status()?;
            Ok(response.bytes().await?.to_vec())
        })
    }

    fn backoff(&self, delay: Duration) -> AssetFuture<()> {
        let ms = delay.as_millis().min(i32::MAX as u128) as i32;
        let timer = js_sys::Promise::new(&mut |resolve, _reject| {
            let scheduled = web_sys::window().is_some_and(|window| {
                window
                    .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
                    .is_ok()
            });
            if !scheduled {
                let _ = resolve.call0(&wasm_bindgen::JsValue::NULL);
            }
        });
        Box::pin(async move {
            let _ = wasm_bindgen_futures::JsFuture::from(timer).await;
        })
    }
}

/// Fetches `path`, retrying according to `policy`. The last error is returned once
/// all attempts are used up.
pub async fn fetch_with_retry<S: AssetSource + ?Sized>(
    source: &S,
    path: &str,
    policy: &RetryPolicy,
) -> anyhow::Result<Vec<u8>> {
    let mut attempt = 1;
    loop {
        match source.fetch(path).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) if attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                log::warn!(
                    "loading {} failed (attempt {}/{}), retrying in {:?}: {:#}",
                    path,
                    attempt,
                    policy.max_attempts,
                    delay,
                    e
                );
                source.backoff(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e.context(format!(
                    "giving up on {} after {} attempts",
                    path, attempt
                )));
            }
        }
    }
}

pub async fn load_string<S: AssetSource + ?Sized>(
    source: &S,
    path: &str,
    policy: &RetryPolicy,
) -> anyhow::Result<String> {
    let bytes = fetch_with_retry(source, path, policy).await?;
    String::from_utf8(bytes).with_context(|| format!("{} is not valid UTF-8", path))
}
