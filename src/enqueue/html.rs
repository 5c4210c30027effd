//! Tag rendering

use super::registry::RegisteredAsset;

/// Escape a value for use inside a double-quoted attribute
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// `src` with the `ver` query parameter appended
pub fn versioned_url(src: &str, version: Option<&str>) -> String {
    match version {
        Some(ver) if !ver.is_empty() => {
            let sep = if src.contains('?') { '&' } else { '?' };
            format!("{}{}ver={}", src, sep, ver)
        }
        _ => src.to_string(),
    }
}

fn data_attributes(asset: &RegisteredAsset) -> String {
    // crossorigin is only meaningful alongside integrity
    let Some(integrity) = asset.integrity() else {
        return String::new();
    };

    let mut out = format!(" integrity=\"{}\"", escape_attr(integrity));
    if let Some(crossorigin) = asset.data.get("crossorigin") {
        out.push_str(&format!(" crossorigin=\"{}\"", escape_attr(crossorigin)));
    }
    out
}

/// `<script src=... id="<handle>-js" ...></script>`
pub fn script_tag(asset: &RegisteredAsset) -> String {
    format!(
        "<script src=\"{}\" id=\"{}-js\"{}></script>",
        escape_attr(&versioned_url(&asset.src, asset.version.as_deref())),
        escape_attr(&asset.handle),
        data_attributes(asset)
    )
}

/// `<link rel="stylesheet" ... />`
pub fn style_tag(asset: &RegisteredAsset) -> String {
    let media = if asset.media.is_empty() { "all" } else { asset.media.as_str() };
    format!(
        "<link rel=\"stylesheet\" id=\"{}-css\" href=\"{}\" media=\"{}\"{} />",
        escape_attr(&asset.handle),
        escape_attr(&versioned_url(&asset.src, asset.version.as_deref())),
        escape_attr(media),
        data_attributes(asset)
    )
}
