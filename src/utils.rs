use std::path::{Path, PathBuf};

use url::Url;

use crate::hashing::url_digest;

/// Picks the filename from a `Content-Disposition` value. An RFC 5987
/// `filename*=UTF-8''...` parameter wins over a plain `filename`.
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    let params = disposition_params(value);
    let find = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    };

    find("filename*")
        .and_then(decode_extended_value)
        .or_else(|| find("filename").map(str::to_string))
        .filter(|name| !name.trim().is_empty())
}

/// Splits the parameters after the disposition type on `;`, ignoring
/// separators inside quoted strings and unescaping `\x` within them.
fn disposition_params(value: &str) -> Vec<(String, String)> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in value.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);

    segments
        .into_iter()
        .skip(1)
        .filter_map(|segment| {
            let (key, value) = segment.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// `charset'lang'percent-encoded`, as used by `filename*`.
fn decode_extended_value(value: &str) -> Option<String> {
    let mut pieces = value.splitn(3, '\'');
    let charset = pieces.next()?;
    let _language = pieces.next()?;
    let encoded = pieces.next()?;
    let bytes = urlencoding::decode_binary(encoded.as_bytes());

    if charset.eq_ignore_ascii_case("utf-8") {
        String::from_utf8(bytes.into_owned()).ok()
    } else {
        // ISO-8859-1 maps each byte to the code point of the same value.
        Some(bytes.iter().map(|&b| b as char).collect())
    }
}

/// Last non-empty path segment of `url_str`, or a stable name derived from the
/// URL when the path has none.
pub fn get_filename_from_url(url_str: &str) -> String {
    let last_segment = Url::parse(url_str).ok().and_then(|url| {
        url.path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
    });

    last_segment
        .and_then(|name| usable_filename(&name))
        .unwrap_or_else(|| format!("download_{}", &url_digest(url_str)[..16]))
}

pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(
        |c: char| !c.is_ascii_alphanumeric() && c != '.' && c != '-' && c != '_',
        "_",
    )
}

/// Sanitized name, or `None` when nothing usable as a file inside the save
/// directory is left.
pub fn usable_filename(name: &str) -> Option<String> {
    let name = sanitize_filename(name.trim());
    match name.as_str() {
        "" | "." | ".." => None,
        _ => Some(name),
    }
}

/// Content-Disposition first, then the URL.
pub fn resolve_filename(content_disposition: Option<&str>, url: &str) -> String {
    content_disposition
        .and_then(filename_from_content_disposition)
        .and_then(|name| usable_filename(&name))
        .unwrap_or_else(|| get_filename_from_url(url))
}

pub fn part_path(save_dir: &Path, filename: &str, index: usize) -> PathBuf {
    save_dir.join(format!("{}.part{}", filename, index))
}

pub fn checkpoint_path(save_dir: &Path, filename: &str) -> PathBuf {
    save_dir.join(format!("{}.json", filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_disposition_filename() {
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="foo.zip""#).as_deref(),
            Some("foo.zip")
        );
        assert_eq!(
            filename_from_content_disposition("inline; FileName=report.pdf; size=10").as_deref(),
            Some("report.pdf")
        );
        assert_eq!(filename_from_content_disposition("attachment"), None);
        assert_eq!(filename_from_content_disposition(r#"attachment; filename="""#), None);

        // separators and escapes inside a quoted value belong to the name
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="a;b.zip"; size=3"#).as_deref(),
            Some("a;b.zip")
        );
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="say \"hi\".txt""#).as_deref(),
            Some(r#"say "hi".txt"#)
        );
    }

    #[test]
    fn extended_filename_wins() {
        assert_eq!(
            filename_from_content_disposition(
                r#"attachment; filename="fallback.zip"; filename*=UTF-8''na%C3%AFve%20file.zip"#
            )
            .as_deref(),
            Some("naïve file.zip")
        );
        assert_eq!(
            filename_from_content_disposition("attachment; filename*=iso-8859-1'en'%E9t%E9.txt").as_deref(),
            Some("été.txt")
        );
        // undecodable extended value falls back to the plain one
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename*=UTF-8''%FF%FE; filename="plain.bin""#)
                .as_deref(),
            Some("plain.bin")
        );
    }

    #[test]
    fn resolve_prefers_disposition_then_url() {
        let url = "https://example.com/pub/bar.tar.gz";
        assert_eq!(resolve_filename(Some(r#"attachment; filename="a;b.zip""#), url), "a_b.zip");
        assert_eq!(resolve_filename(None, url), "bar.tar.gz");
        assert_eq!(resolve_filename(Some("attachment"), url), "bar.tar.gz");
    }

    #[test]
    fn resolve_rejects_dot_names() {
        let url = "https://example.com/pub/bar.tar.gz";
        assert_eq!(resolve_filename(Some(r#"attachment; filename="..""#), url), "bar.tar.gz");
        assert_eq!(resolve_filename(Some("attachment; filename=."), url), "bar.tar.gz");
        assert!(get_filename_from_url("https://example.com/%2E%2E").starts_with("download_"));
    }

    #[test]
    fn url_last_segment() {
        assert_eq!(
            get_filename_from_url("https://example.com/dist/v1/bar.tar.gz"),
            "bar.tar.gz"
        );
        assert_eq!(get_filename_from_url("https://example.com/dir/file.iso/"), "file.iso");
    }

    #[test]
    fn url_without_path_gets_stable_name() {
        let a = get_filename_from_url("https://example.com/");
        let b = get_filename_from_url("https://example.com/");
        assert!(a.starts_with("download_"));
        assert_eq!(a, b);
        assert_ne!(a, get_filename_from_url("https://example.org/"));
    }

    #[test]
    fn sanitize_strips_path_separators() {
        assert_eq!(sanitize_filename("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_filename("bar.tar.gz"), "bar.tar.gz");
        assert_eq!(sanitize_filename("résumé.pdf"), "r_sum_.pdf");
    }

    #[test]
    fn artifact_paths() {
        let dir = Path::new("/tmp/dl");
        assert_eq!(part_path(dir, "f.bin", 3), PathBuf::from("/tmp/dl/f.bin.part3"));
        assert_eq!(checkpoint_path(dir, "f.bin"), PathBuf::from("/tmp/dl/f.bin.json"));
    }
}
