//! Extension to media type table and Content-Type helpers.
//!
//! The table answers two questions for the pipeline: what `Content-Type` a response gets when a
//! handler assigns a short alias (`"html"`, `"json"`, `".css"`, `"index.js"`), and whether a
//! request path points at a static resource at all.

use mime::Mime;

const MIME_TYPES: &[(&str, &str)] = &[
    // aliases
    ("text", "text/plain"),
    ("image", "image/*"),
    ("audio", "audio/*"),
    ("video", "video/*"),
    ("application", "application/*"),
    ("bin", "application/octet-stream"),
    ("buffer", "application/octet-stream"),
    // text
    ("html", "text/html"),
    ("htm", "text/html"),
    ("js", "text/javascript"),
    ("mjs", "text/javascript"),
    ("css", "text/css"),
    ("md", "text/markdown"),
    ("rt", "text/richtext"),
    ("rtf", "text/richtext"),
    ("csv", "text/csv"),
    ("tsv", "text/tab-separated-values"),
    ("sh", "text/x-script.sh"),
    ("log", "text/plain"),
    ("txt", "text/plain"),
    // images
    ("ico", "image/x-icon"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("tiff", "image/tiff"),
    ("webp", "image/webp"),
    // audio
    ("wav", "audio/wav"),
    ("mp3", "audio/mpeg"),
    ("flac", "audio/flac"),
    ("m4a", "audio/mp4"),
    ("oga", "audio/ogg"),
    // video
    ("ogv", "video/ogg"),
    ("ogg", "video/ogg"),
    ("mpeg", "video/mpeg"),
    ("mov", "video/quicktime"),
    ("webm", "video/webm"),
    ("mkv", "video/webm"),
    ("flv", "video/x-flv"),
    ("wmv", "video/x-ms-wmv"),
    ("avi", "video/x-msvideo"),
    ("m4v", "video/mp4"),
    ("mp4", "video/mp4"),
    // application
    ("json", "application/json"),
    ("map", "application/json"),
    ("xml", "application/xml"),
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    ("word", "application/msword"),
    ("ppt", "application/powerpoint"),
    ("book", "application/book"),
    ("tgz", "application/x-tar"),
    ("zip", "application/zip"),
    ("wasm", "application/wasm"),
    ("exe", "application/octet-stream"),
    ("dmg", "application/octet-stream"),
    ("dll", "application/octet-stream"),
    ("iso", "application/octet-stream"),
    ("msi", "application/octet-stream"),
    ("pkg", "application/octet-stream"),
    ("img", "application/octet-stream"),
    ("ai", "application/postscript"),
    ("eps", "application/postscript"),
    ("ps", "application/postscript"),
    ("fw", "application/postscript"),
    // fonts
    ("ttf", "application/x-font-ttf"),
    ("otf", "application/x-font-otf"),
    ("woff", "application/font-woff"),
    ("woff2", "font/woff2"),
    ("eot", "application/vnd.ms-fontobject"),
    // archives
    ("gz", "application/gzip"),
    ("gzip", "multipart/x-gzip"),
];

/// Looks up the media type registered for an extension (without the leading dot).
pub fn lookup(extension: &str) -> Option<&'static str> {
    MIME_TYPES
        .iter()
        .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
        .map(|(_, media_type)| *media_type)
}

/// Resolves an alias, an extension, a file name or a full media type into a `Content-Type`
/// header value. Textual types get `; charset=utf-8` appended.
///
/// Returns `None` when the value can't be resolved, in which case callers remove the header.
pub fn content_type(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let media_type = if value.contains('/') {
        value
    } else {
        // "html", ".html" and "index.html" all resolve through the last extension
        let extension = value.rsplit('.').next().unwrap_or(value);
        lookup(extension)?
    };

    let parsed: Mime = media_type.parse().ok()?;
    if parsed.get_param(mime::CHARSET).is_none() && is_textual(&parsed) {
        Some(format!("{media_type}; charset=utf-8"))
    } else {
        Some(media_type.to_owned())
    }
}

fn is_textual(media_type: &Mime) -> bool {
    media_type.type_() == mime::TEXT
        || (media_type.type_() == mime::APPLICATION
            && matches!(media_type.subtype().as_str(), "json" | "javascript" | "xml"))
}

/// Returns true when files with this extension are worth storing gzip-encoded.
pub fn is_compressible_extension(extension: &str) -> bool {
    let Some(media_type) = lookup(extension).and_then(|value| value.parse::<Mime>().ok()) else {
        return false;
    };

    is_textual(&media_type) || media_type.suffix().is_some_and(|suffix| suffix == mime::XML || suffix == mime::JSON)
}

/// Checks a media type against a list of candidates.
///
/// A candidate matches when it equals the full type (`"text/html"`), when it is contained in the
/// subtype (`"html"`) or equals its suffix (`"json"` for `application/ld+json`), when it names the top level group
/// (`"image"` matches any image), or when it is a wildcard (`"text/*"`).
pub fn type_is(value: &str, candidates: &[&str]) -> bool {
    let Ok(media_type) = value.parse::<Mime>() else {
        return false;
    };
    let essence = media_type.essence_str();

    candidates.iter().any(|candidate| {
        if candidate.eq_ignore_ascii_case(essence) {
            return true;
        }

        match candidate.split_once('/') {
            Some((group, "*")) => group.eq_ignore_ascii_case(media_type.type_().as_str()),
            Some(_) => false,
            None => {
                let candidate = candidate.to_ascii_lowercase();
                candidate == media_type.type_().as_str()
                    || media_type.subtype().as_str().contains(&*candidate)
                    || media_type.suffix().is_some_and(|suffix| suffix.as_str() == candidate)
            }
        }
    })
}
