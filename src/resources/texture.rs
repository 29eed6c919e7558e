use crate::{
    config::RetryPolicy,
    data_structures::model::{TextureImage, TextureOptions},
    resources::{AssetSource, fetch_with_retry},
};

/// Decodes an encoded image (png, jpeg, hdr, ...) into RGBA8.
pub fn decode_image(
    bytes: &[u8],
    label: &str,
    options: TextureOptions,
) -> anyhow::Result<TextureImage> {
    let img = image::load_from_memory(bytes)?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(TextureImage {
        label: label.to_string(),
        width,
        height,
        rgba: rgba.into_raw(),
        options,
        placeholder: false,
    })
}

/// Loads and decodes `path`. Any failure after retries degrades to a magenta
/// placeholder so the scene can still be built.
pub async fn load_texture<S: AssetSource + ?Sized>(
    source: &S,
    path: &str,
    options: TextureOptions,
    policy: &RetryPolicy,
) -> TextureImage {
    match try_load_texture(source, path, options, policy).await {
        Ok(img) => img,
        Err(e) => {
            log::warn!("using placeholder for texture {}: {:#}", path, e);
            TextureImage::placeholder(path, options)
        }
    }
}

/// Like [`load_texture`] but reports the failure instead of substituting.
pub async fn try_load_texture<S: AssetSource + ?Sized>(
    source: &S,
    path: &str,
    options: TextureOptions,
    policy: &RetryPolicy,
) -> anyhow::Result<TextureImage> {
    let bytes = fetch_with_retry(source, path, policy).await?;
    decode_image(&bytes, path, options)
}
