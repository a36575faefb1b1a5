//! Delivery URL helpers.
//!
//! Delivery URLs look like
//! `https://res.cloudinary.com/<cloud>/<kind>/upload/<transforms>/<version>/<public_id>.<ext>`.
//! Transformations are inserted right after the single `/upload` marker.

use std::fmt;

use cirrus_core::{MediaError, MediaResult};

use crate::types::{ResourceKind, Size};

const UPLOAD_MARKER: &str = "/upload/";

/// A delivery-time transformation segment
#[derive(Debug, Clone, PartialEq)]
pub enum Transformation {
    /// Rotate according to EXIF orientation (`a_exif`)
    AutoOrient,
    /// Scale width by a factor, height follows (`w_<factor>`)
    WidthScale(f64),
    /// Any other pre-formatted segment
    Raw(String),
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transformation::AutoOrient => write!(f, "a_exif"),
            Transformation::WidthScale(factor) => write!(f, "w_{factor}"),
            Transformation::Raw(segment) => write!(f, "{segment}"),
        }
    }
}

/// Structured delivery URL: `prefix` + transformations + `rest`
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryUrl {
    /// Everything up to and including `/upload`
    prefix: String,
    transformations: Vec<Transformation>,
    /// Whatever followed the marker (version, public id, extension)
    rest: String,
}

impl DeliveryUrl {
    /// Split a URL at its `/upload/` marker, which must occur exactly once
    pub fn parse(url: &str) -> MediaResult<Self> {
        match url.matches(UPLOAD_MARKER).count() {
            0 => return Err(MediaError::malformed_url(url, "no '/upload/' marker")),
            1 => {}
            n => {
                return Err(MediaError::malformed_url(
                    url,
                    format!("'/upload/' marker appears {n} times"),
                ))
            }
        }

        let at = url
            .find(UPLOAD_MARKER)
            .ok_or_else(|| MediaError::malformed_url(url, "no '/upload/' marker"))?;
        let prefix_end = at + UPLOAD_MARKER.len() - 1;
        let rest = &url[prefix_end + 1..];
        if rest.is_empty() {
            return Err(MediaError::malformed_url(url, "nothing after '/upload/'"));
        }

        Ok(Self {
            prefix: url[..prefix_end].to_string(),
            transformations: Vec::new(),
            rest: rest.to_string(),
        })
    }

    pub fn with_transformation(mut self, transformation: Transformation) -> Self {
        self.transformations.push(transformation);
        self
    }

    pub fn transformations(&self) -> &[Transformation] {
        &self.transformations
    }

    /// Public id of the addressed asset
    pub fn public_id(&self) -> MediaResult<String> {
        derive_public_id(&self.to_string())
    }

    /// Kind from the `/<kind>/upload` path, else from the extension
    pub fn resource_kind(&self) -> ResourceKind {
        if self.prefix.ends_with("/video/upload") {
            return ResourceKind::Video;
        }
        if self.prefix.ends_with("/image/upload") {
            return ResourceKind::Image;
        }
        self.rest
            .rsplit_once('.')
            .map(|(_, ext)| ResourceKind::from_extension(ext))
            .unwrap_or(ResourceKind::Image)
    }
}

impl fmt::Display for DeliveryUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/", self.prefix)?;
        for t in &self.transformations {
            write!(f, "{t}/")?;
        }
        write!(f, "{}", self.rest)
    }
}

/// Public identifier of an asset: last path segment without its extension.
///
/// ```rust
/// use cirrus_upload::derive_public_id;
///
/// let id = derive_public_id("https://res.cloudinary.com/demo/image/upload/v123/sample.jpg").unwrap();
/// assert_eq!(id, "sample");
/// ```
pub fn derive_public_id(url: &str) -> MediaResult<String> {
    let path = url
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or(url);

    let (_, last) = path
        .rsplit_once('/')
        .ok_or_else(|| MediaError::malformed_url(url, "no '/' in URL"))?;

    let (stem, ext) = last
        .rsplit_once('.')
        .ok_or_else(|| MediaError::malformed_url(url, "no file extension"))?;

    if !ResourceKind::is_known_extension(ext) {
        return Err(MediaError::malformed_url(url, format!("unknown extension '.{ext}'")));
    }
    if stem.is_empty() {
        return Err(MediaError::malformed_url(url, "empty public id"));
    }

    Ok(stem.to_string())
}

/// URL delivering the asset scaled to fit within `max`.
///
/// Assets already smaller than `max` in both dimensions only get
/// orientation correction; larger ones get a width-scale factor of
/// `1 / max(width / max.width, height / max.height)`.
pub fn scaled_url(width: u32, height: u32, url: &str, max: Size) -> MediaResult<String> {
    if max.width == 0 || max.height == 0 {
        return Err(MediaError::invalid("maximum size must be non-zero"));
    }

    let delivery = DeliveryUrl::parse(url)?;

    let transformation = if width < max.width && height < max.height {
        Transformation::AutoOrient
    } else {
        let ratio = f64::max(
            f64::from(width) / f64::from(max.width),
            f64::from(height) / f64::from(max.height),
        );
        Transformation::WidthScale(1.0 / ratio)
    };

    Ok(delivery.with_transformation(transformation).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://res.cloudinary.com/demo/image/upload";

    #[test]
    fn public_id_from_versioned_url() {
        let id = derive_public_id(&format!("{BASE}/v123/sample.jpg")).unwrap();
        assert_eq!(id, "sample");
    }

    #[test]
    fn public_id_ignores_query_and_case() {
        let id = derive_public_id(&format!("{BASE}/clip.MP4?_a=1")).unwrap();
        assert_eq!(id, "clip");
    }

    #[test]
    fn public_id_accepts_every_video_extension() {
        for ext in ["mp4", "MOV", "m4v", "webm", "avi"] {
            let url = format!("https://res.cloudinary.com/demo/video/upload/v1/clip.{ext}");
            assert_eq!(derive_public_id(&url).unwrap(), "clip");
        }
    }

    #[test]
    fn public_id_errors() {
        assert!(derive_public_id("sample.jpg").is_err());
        assert!(derive_public_id(&format!("{BASE}/sample")).is_err());
        assert!(derive_public_id(&format!("{BASE}/sample.txt")).is_err());
        assert!(derive_public_id(&format!("{BASE}/.jpg")).is_err());
    }

    #[test]
    fn small_asset_gets_orientation_only() {
        let url = scaled_url(500, 400, &format!("{BASE}/sample.jpg"), Size::new(1000, 1000)).unwrap();
        assert_eq!(url, format!("{BASE}/a_exif/sample.jpg"));
    }

    #[test]
    fn large_asset_gets_scale_factor() {
        let url = scaled_url(2000, 1000, &format!("{BASE}/sample.jpg"), Size::new(1000, 1000)).unwrap();
        assert_eq!(url, format!("{BASE}/w_0.5/sample.jpg"));
    }

    #[test]
    fn tall_asset_scales_by_height() {
        let url = scaled_url(500, 4000, &format!("{BASE}/sample.jpg"), Size::new(1000, 1000)).unwrap();
        assert_eq!(url, format!("{BASE}/w_0.25/sample.jpg"));
    }

    #[test]
    fn equal_to_bound_is_scaled() {
        let url = scaled_url(1000, 200, &format!("{BASE}/sample.jpg"), Size::new(1000, 1000)).unwrap();
        assert_eq!(url, format!("{BASE}/w_1/sample.jpg"));
    }

    #[test]
    fn marker_must_appear_once() {
        let missing = scaled_url(1, 1, "https://cdn.example.com/sample.jpg", Size::new(10, 10));
        assert!(matches!(missing, Err(MediaError::MalformedUrl { .. })));

        let twice = scaled_url(1, 1, &format!("{BASE}/v1/upload/sample.jpg"), Size::new(10, 10));
        assert!(matches!(twice, Err(MediaError::MalformedUrl { .. })));
    }

    #[test]
    fn zero_bound_is_invalid() {
        let err = scaled_url(1, 1, &format!("{BASE}/sample.jpg"), Size::new(0, 10)).unwrap_err();
        assert!(matches!(err, MediaError::Invalid { .. }));
    }

    #[test]
    fn builder_keeps_order_and_kind() {
        let url = DeliveryUrl::parse("https://res.cloudinary.com/demo/video/upload/v9/clip.mp4")
            .unwrap()
            .with_transformation(Transformation::AutoOrient)
            .with_transformation(Transformation::Raw("q_auto".into()));

        assert_eq!(
            url.to_string(),
            "https://res.cloudinary.com/demo/video/upload/a_exif/q_auto/v9/clip.mp4"
        );
        assert_eq!(url.resource_kind(), ResourceKind::Video);
        assert_eq!(url.public_id().unwrap(), "clip");
        assert_eq!(url.transformations().len(), 2);
    }
}
