//! `data:` URL payloads carried by image-like elements.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use pdf_engine::ImageFormat;

#[derive(Debug, thiserror::Error)]
pub enum ImageDataError {
    #[error("not a data URL")]
    NotDataUrl,
    #[error("unsupported image type {0:?}")]
    UnsupportedMime(String),
    #[error("data URL is not base64 encoded")]
    NotBase64,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

/// Splits `data:image/png;base64,....` into its format and raw bytes. The
/// format comes from the declared MIME type only.
pub fn decode_data_url(data: &str) -> Result<DecodedImage, ImageDataError> {
    let rest = data.trim().strip_prefix("data:").ok_or(ImageDataError::NotDataUrl)?;
    let (header, payload) = rest.split_once(',').ok_or(ImageDataError::NotDataUrl)?;

    let mut params = header.split(';');
    let mime = params.next().unwrap_or_default();
    if !params.any(|param| param.trim().eq_ignore_ascii_case("base64")) {
        return Err(ImageDataError::NotBase64);
    }
    let format = ImageFormat::from_mime(mime)
        .ok_or_else(|| ImageDataError::UnsupportedMime(mime.to_owned()))?;

    let payload: String = payload.split_ascii_whitespace().collect();
    let bytes = B64.decode(payload.as_bytes())?;
    Ok(DecodedImage { format, bytes })
}

pub fn encode_data_url(format: ImageFormat, bytes: &[u8]) -> String {
    let mime = match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
    };
    format!("data:{mime};base64,{}", B64.encode(bytes))
}
