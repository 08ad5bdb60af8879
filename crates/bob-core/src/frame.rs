// ── Video frame resource ──
//
// The backend serves an MJPEG stream at `/stream`; in simulated mode a
// static SVG stands in. Either way the host receives an opaque URL.

use std::fmt;

use url::Url;

const PLACEHOLDER_WIDTH: u32 = 640;
const PLACEHOLDER_HEIGHT: u32 = 480;

/// Caption lines drawn on the placeholder frame.
pub const PLACEHOLDER_CAPTION: [&str; 3] = [
    "BOB Camera - Mock Mode",
    "Live detections simulated",
    "Backend offline - using mock data",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameResource {
    /// Live MJPEG stream from the backend.
    Stream(Url),
    /// Static placeholder shown while simulated.
    Placeholder,
}

impl FrameResource {
    /// The URL a host should load.
    pub fn url(&self) -> String {
        match self {
            Self::Stream(url) => url.to_string(),
            Self::Placeholder => placeholder_data_uri(),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Stream(_))
    }
}

impl fmt::Display for FrameResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(url) => write!(f, "{url}"),
            Self::Placeholder => f.write_str("placeholder (simulated)"),
        }
    }
}

fn placeholder_svg() -> String {
    let (w, h) = (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT);
    let cx = w / 2;
    let [title, line1, line2] = PLACEHOLDER_CAPTION;
    format!(
        concat!(
            r#"<svg width="{w}" height="{h}" xmlns="http://www.w3.org/2000/svg">"#,
            r#"<defs><linearGradient id="sky" x1="0%" y1="0%" x2="100%" y2="100%">"#,
            r##"<stop offset="0%" stop-color="#87CEEB"/><stop offset="100%" stop-color="#98FB98"/>"##,
            r#"</linearGradient></defs>"#,
            r#"<rect width="{w}" height="{h}" fill="url(#sky)"/>"#,
            r##"<text x="{cx}" y="200" font-family="sans-serif" font-size="24" fill="#333" text-anchor="middle">{title}</text>"##,
            r##"<text x="{cx}" y="240" font-family="sans-serif" font-size="16" fill="#666" text-anchor="middle">{line1}</text>"##,
            r##"<text x="{cx}" y="260" font-family="sans-serif" font-size="16" fill="#666" text-anchor="middle">{line2}</text>"##,
            r#"</svg>"#,
        ),
        w = w,
        h = h,
        cx = cx,
        title = title,
        line1 = line1,
        line2 = line2,
    )
}

/// Percent-encoded `data:` URI of the placeholder SVG.
pub fn placeholder_data_uri() -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(placeholder_svg().as_bytes())
        .collect::<String>()
        .replace('+', "%20");
    format!("data:image/svg+xml,{encoded}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_passes_through() {
        let url: Url = "http://bob.local:8000/stream".parse().unwrap();
        let frame = FrameResource::Stream(url);
        assert!(frame.is_live());
        assert_eq!(frame.url(), "http://bob.local:8000/stream");
    }

    #[test]
    fn placeholder_is_svg_data_uri() {
        let uri = FrameResource::Placeholder.url();
        assert!(uri.starts_with("data:image/svg+xml,"));
        assert!(!uri.contains(' '));
        assert!(!uri.contains('+'));
        assert!(uri.contains("Mock%20Mode"));
    }
}
