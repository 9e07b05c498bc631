//! Bidirectional rich-text translation between the host's canonical markup
//! and each tracker's embedding syntax.
//!
//! Canonical markup embeds images as `<img>` tags carrying a preview path
//! (`src`), optionally a local-file reference (`fileid`), a permanent link
//! (`permalinksrc`) and, once an image has been synchronized at least once,
//! the remote-side name (`psrc`). The dialect modules translate that form to
//! and from wiki markup (`!name|width=…!`), rebased html, and markdown
//! image links.

use std::collections::{HashMap, HashSet};

use chrono::Utc;

use crate::error::Result;
use crate::files::{LocalFile, LocalFileStore};

/// Host preview-path prefix identifying images served by the host itself.
pub const PREVIEW_SRC_PREFIX: &str = "/bug/attachment/preview/md";

/// Result of translating canonical markup to a tracker dialect.
#[derive(Debug, Default)]
pub struct Translation {
    /// Canonical markup echoed back, annotated with the remote names of
    /// newly staged images so the next edit round-trips.
    pub canonical: String,
    pub remote: String,
    /// Remote image names still referenced after the edit; the reconciler
    /// treats everything else as an orphan candidate.
    pub remain: HashSet<String>,
    /// Files staged for upload, already renamed to their remote names.
    pub uploads: Vec<LocalFile>,
}

/// Result of translating a tracker dialect back to canonical markup.
#[derive(Debug, Default)]
pub struct ReverseTranslation {
    pub canonical: String,
    /// Synthetic host-side file id -> fetchable remote key or URL, for
    /// images the host has not re-hosted yet.
    pub pending_downloads: HashMap<String, String>,
}

/// One parsed `<img>` tag.
#[derive(Debug, Clone, Default)]
struct ImgTag {
    attrs: Vec<(String, String)>,
    raw: String,
}

impl ImgTag {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn render(attrs: &[(&str, &str)]) -> String {
        let body: Vec<String> = attrs
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{k}=\"{v}\""))
            .collect();
        format!("<img {}/>", body.join(" ") + " ")
    }
}

#[derive(Debug)]
enum Segment<'a> {
    Text(&'a str),
    Img(ImgTag),
}

/// Splits markup into plain-text runs and parsed image tags. A `<img` with
/// no closing `>` is left as text.
fn split_segments(content: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find("<img") {
        let Some(end) = rest[start..].find('>') else {
            break;
        };
        if start > 0 {
            segments.push(Segment::Text(&rest[..start]));
        }
        let raw = &rest[start..start + end + 1];
        segments.push(Segment::Img(parse_img_tag(raw)));
        rest = &rest[start + end + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    segments
}

fn parse_img_tag(raw: &str) -> ImgTag {
    let body = raw
        .trim_start_matches("<img")
        .trim_end_matches('>')
        .trim_end_matches('/');
    let mut attrs = Vec::new();
    let mut rest = body;
    while let Some(eq) = rest.find('=') {
        let key = rest[..eq].trim().to_string();
        rest = rest[eq + 1..].trim_start();
        let value;
        if let Some(stripped) = rest.strip_prefix('"') {
            let close = stripped.find('"').unwrap_or(stripped.len());
            value = stripped[..close].to_string();
            rest = &stripped[close..];
            rest = rest.strip_prefix('"').unwrap_or(rest);
        } else {
            let close = rest.find(char::is_whitespace).unwrap_or(rest.len());
            value = rest[..close].to_string();
            rest = &rest[close..];
        }
        if !key.is_empty() {
            attrs.push((key, value));
        }
    }
    ImgTag {
        attrs,
        raw: raw.to_string(),
    }
}

fn is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Wiki-markup dialect (Jira-style): images embed as
/// `!name|width=1360,height=876,alt='backref'!`.
pub mod wiki {
    use super::*;

    const IMAGE_STYLE: &str = "width=1360,height=876";

    /// Translates canonical markup to wiki markup, staging any referenced
    /// local files for upload under their remote names.
    pub fn from_canonical(content: &str, files: &mut LocalFileStore) -> Result<Translation> {
        let mut out = Translation::default();
        let mut canonical = String::new();
        let mut remote = String::new();
        for segment in split_segments(content) {
            match segment {
                Segment::Text(text) => {
                    canonical.push_str(text);
                    remote.push_str(text);
                }
                Segment::Img(tag) => {
                    translate_tag(&tag, files, &mut canonical, &mut remote, &mut out)?;
                }
            }
        }
        out.canonical = canonical;
        out.remote = remote;
        Ok(out)
    }

    fn translate_tag(
        tag: &ImgTag,
        files: &mut LocalFileStore,
        canonical: &mut String,
        remote: &mut String,
        out: &mut Translation,
    ) -> Result<()> {
        let src = tag.attr("src").unwrap_or_default();
        let permalink = tag.attr("permalinksrc").unwrap_or_default();
        if is_http(src) || is_http(permalink) {
            let url = if is_http(permalink) { permalink } else { src };
            canonical.push_str(&tag.raw);
            remote.push_str(&format!("!{url}|{IMAGE_STYLE}!"));
            return Ok(());
        }
        if let Some(remote_name) = tag.attr("psrc") {
            // Already synchronized once; the local temp copy is redundant.
            remote.push_str(&format!("!{remote_name}|{IMAGE_STYLE},alt='{src}'!"));
            out.remain.insert(remote_name.to_string());
            if let Some(file_id) = tag.attr("fileid") {
                files.take(file_id);
            }
            canonical.push_str(&tag.raw);
            return Ok(());
        }
        if let Some(file_id) = tag.attr("fileid") {
            if files.contains(file_id) {
                let remote_name =
                    format!("image-{file_id}-{}.jpg", Utc::now().timestamp_millis());
                let staged = files.stage_as(file_id, &remote_name)?;
                remote.push_str(&format!(
                    "!{remote_name}|{IMAGE_STYLE},alt='{permalink}'!"
                ));
                out.remain.insert(remote_name.clone());
                out.uploads.push(staged);
                canonical.push_str(&ImgTag::render(&[
                    ("src", src),
                    ("fileid", file_id),
                    ("permalinksrc", permalink),
                    ("psrc", &remote_name),
                ]));
                return Ok(());
            }
        }
        // No recognizable source; inert passthrough.
        canonical.push_str(&tag.raw);
        remote.push_str(&tag.raw);
        Ok(())
    }

    /// Translates wiki markup back to canonical markup. `attachments` maps
    /// remote image name to content key; names with no entry are queued as
    /// pending downloads under a synthetic host file id.
    pub fn to_canonical(
        content: &str,
        attachments: &mut HashMap<String, String>,
    ) -> ReverseTranslation {
        let mut out = ReverseTranslation::default();
        let mut canonical = String::new();
        let mut synthetic = 0usize;
        for segment in split_wiki(content) {
            match segment {
                WikiSegment::Text(text) => canonical.push_str(text),
                WikiSegment::Image { target, params } => {
                    if is_http(target) {
                        canonical.push_str(&ImgTag::render(&[
                            ("src", target),
                            ("permalinksrc", target),
                        ]));
                        continue;
                    }
                    let alt = extract_alt(params);
                    if alt.starts_with(PREVIEW_SRC_PREFIX) {
                        attachments.remove(target);
                        canonical
                            .push_str(&ImgTag::render(&[("src", &alt), ("psrc", target)]));
                        continue;
                    }
                    let file_key = attachments.remove(target).unwrap_or_else(|| {
                        synthetic += 1;
                        format!("download-{synthetic}")
                    });
                    canonical.push_str(&ImgTag::render(&[("alt", &file_key), ("psrc", target)]));
                    out.pending_downloads.insert(file_key, target.to_string());
                }
            }
        }
        out.canonical = canonical;
        out
    }

    enum WikiSegment<'a> {
        Text(&'a str),
        Image { target: &'a str, params: &'a str },
    }

    /// Scans for `!target|params!` image runs; any `!` that does not open a
    /// well-formed single-line image is literal text.
    fn split_wiki(content: &str) -> Vec<WikiSegment<'_>> {
        let mut segments = Vec::new();
        let mut rest = content;
        while let Some(open) = rest.find('!') {
            let after = &rest[open + 1..];
            let Some(close) = after.find('!') else {
                break;
            };
            let interior = &after[..close];
            let looks_like_image = !interior.is_empty()
                && !interior.contains('\n')
                && (is_http(interior) || interior.contains("|width"));
            if !looks_like_image {
                segments.push(WikiSegment::Text(&rest[..open + 1]));
                rest = after;
                continue;
            }
            if open > 0 {
                segments.push(WikiSegment::Text(&rest[..open]));
            }
            let (target, params) = interior.split_once('|').unwrap_or((interior, ""));
            segments.push(WikiSegment::Image { target, params });
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(WikiSegment::Text(rest));
        }
        segments
    }

    fn extract_alt(params: &str) -> String {
        let Some(idx) = params.find("alt=") else {
            return String::new();
        };
        params[idx + 4..].trim_matches('\'').trim_matches('"').to_string()
    }
}

/// Html dialect (Tapd-style): attribute swaps with the host preview prefix
/// rebased onto the tracker's base URL.
pub mod html {
    use super::*;

    /// Translates canonical markup to the tracker's html form. No files are
    /// staged; the tracker fetches host-preview URLs directly.
    pub fn from_canonical(content: &str, base_url: &str) -> Translation {
        let mut canonical = String::new();
        let mut remote = String::new();
        for segment in split_segments(content) {
            match segment {
                Segment::Text(text) => {
                    canonical.push_str(text);
                    remote.push_str(text);
                }
                Segment::Img(tag) => {
                    let src = tag.attr("src").unwrap_or_default();
                    if let Some(remote_src) = tag.attr("psrc") {
                        // Previously synchronized; point the tracker back at
                        // its own copy.
                        remote.push_str(&ImgTag::render(&[("src", remote_src), ("alt", src)]));
                        canonical.push_str(&tag.raw);
                    } else if src.starts_with(PREVIEW_SRC_PREFIX) {
                        let rebased = format!("{base_url}{src}");
                        let permalink = tag.attr("permalinksrc").unwrap_or(src);
                        remote.push_str(&ImgTag::render(&[("src", &rebased), ("alt", permalink)]));
                        canonical.push_str(&ImgTag::render(&[("psrc", &rebased), ("src", src)]));
                    } else {
                        canonical.push_str(&tag.raw);
                        remote.push_str(&tag.raw);
                    }
                }
            }
        }
        Translation {
            canonical,
            remote,
            remain: HashSet::new(),
            uploads: Vec::new(),
        }
    }

    /// Tracker-local image sources (`/tfl/…`) that must be resolved to
    /// temporary download URLs before calling [`to_canonical`].
    pub fn tracker_image_sources(content: &str) -> Vec<String> {
        split_segments(content)
            .into_iter()
            .filter_map(|segment| match segment {
                Segment::Img(tag) => tag
                    .attr("src")
                    .filter(|src| src.starts_with("/tfl"))
                    .map(str::to_string),
                Segment::Text(_) => None,
            })
            .collect()
    }

    /// Translates tracker html back to canonical markup. `resolved` maps a
    /// `/tfl/…` source to its temporary download URL; unresolved tracker
    /// images pass through untouched.
    pub fn to_canonical(content: &str, resolved: &HashMap<String, String>) -> ReverseTranslation {
        let mut out = ReverseTranslation::default();
        let mut canonical = String::new();
        let mut synthetic = 0usize;
        for segment in split_segments(content) {
            match segment {
                Segment::Text(text) => canonical.push_str(text),
                Segment::Img(tag) => {
                    let src = tag.attr("src").unwrap_or_default();
                    let alt = tag.attr("alt").unwrap_or_default();
                    if alt.starts_with(PREVIEW_SRC_PREFIX) {
                        // Image the host already serves; swap back.
                        canonical.push_str(&ImgTag::render(&[("src", alt), ("psrc", src)]));
                    } else if src.starts_with("/tfl") {
                        if let Some(download_url) = resolved.get(src) {
                            synthetic += 1;
                            canonical.push_str(&ImgTag::render(&[
                                ("psrc", src),
                                ("src", download_url),
                            ]));
                            out.pending_downloads
                                .insert(format!("image-{synthetic}.jpg"), download_url.clone());
                        } else {
                            canonical.push_str(&tag.raw);
                        }
                    } else {
                        canonical.push_str(&tag.raw);
                    }
                }
            }
        }
        out.canonical = canonical;
        out
    }
}

/// Markdown dialect (Zentao-style): canonical markdown image links rewritten
/// against the tracker's uploaded-file ids.
pub mod markdown {
    use super::*;

    pub const IMAGE_EXTENSIONS: [&str; 6] = ["bmp", "jpg", "png", "tif", "gif", "jpeg"];

    const LOCAL_RESOURCE_PREFIX: &str = "/resource/md/get";

    pub fn is_image_name(name: &str) -> bool {
        name.rsplit_once('.')
            .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Local file names referenced from canonical markup that the adapter
    /// must upload before translation.
    pub fn local_refs(content: &str) -> Vec<String> {
        split_markdown(content)
            .into_iter()
            .filter_map(|segment| match segment {
                MarkdownSegment::Image { target, .. } => local_file_name(target),
                MarkdownSegment::Text(_) => None,
            })
            .collect()
    }

    /// Translates canonical markdown to the tracker form. `uploaded` maps a
    /// local file name to the remote file id the adapter obtained for it; a
    /// link whose upload is missing is left unchanged.
    pub fn from_canonical(content: &str, uploaded: &HashMap<String, String>) -> String {
        let mut remote = String::new();
        for segment in split_markdown(content) {
            match segment {
                MarkdownSegment::Text(text) => remote.push_str(text),
                MarkdownSegment::Image { name, target } => {
                    if is_http(target) {
                        remote.push_str(&ImgTag::render(&[("src", target), ("alt", name)]));
                    } else if let Some(synced) = synced_file_name(target) {
                        remote.push_str(&format!("![{name}]({{{synced}}})"));
                    } else if let Some(local) = local_file_name(target) {
                        match uploaded.get(&local) {
                            Some(file_id) => {
                                let ext = local.rsplit_once('.').map(|(_, e)| e).unwrap_or("jpg");
                                remote.push_str(&format!("![{name}]({{{file_id}.{ext}}})"));
                            }
                            None => remote.push_str(&format!("![{name}]({target})")),
                        }
                    } else {
                        remote.push_str(&format!("![{name}]({target})"));
                    }
                }
            }
        }
        remote
    }

    /// Translates tracker markdown-plus-html back to canonical markdown.
    /// `proxy` rewrites a tracker-relative file path to the host's proxied
    /// preview path.
    pub fn to_canonical(content: &str, proxy: impl Fn(&str) -> String) -> String {
        let mut canonical = String::new();
        for segment in split_segments(content) {
            match segment {
                Segment::Text(text) => canonical.push_str(text),
                Segment::Img(tag) => {
                    let src = tag.attr("src").unwrap_or_default();
                    let alt = tag.attr("alt").unwrap_or_default();
                    match lift_image(src, alt, &proxy) {
                        Some(link) => canonical.push_str(&link),
                        None => canonical.push_str(&tag.raw),
                    }
                }
            }
        }
        canonical
    }

    fn lift_image(src: &str, alt: &str, proxy: &impl Fn(&str) -> String) -> Option<String> {
        if src.is_empty() {
            return None;
        }
        if is_http(src) {
            let name = if alt.is_empty() { src } else { alt };
            return Some(format!("\n\n![{name}]({src})"));
        }
        if let Some(inner) = src.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            // Tracker-local upload reference; only image files are lifted.
            if !is_image_name(inner) {
                return None;
            }
            let name = if alt.is_empty() { inner } else { alt };
            let path = proxy(&format!("/file-read-{inner}"));
            return Some(format!("\n\n![{name}]({path})"));
        }
        let trailing = src.rsplit('/').next().unwrap_or(src).replace("&amp;", "&");
        let kept: Vec<&str> = trailing
            .split('&')
            .filter(|part| !part.contains("platform") && !part.contains("workspaceId"))
            .collect();
        let name = if alt.is_empty() { src } else { alt };
        let path = proxy(&format!("/{}", kept.join("&")));
        Some(format!("\n\n![{name}]({path})"))
    }

    /// A markdown target that was synchronized before carries the remote
    /// file reference inside a host proxy URL.
    fn synced_file_name(target: &str) -> Option<String> {
        if !target.contains("/url?url=") && !target.contains("/path?") {
            return None;
        }
        let decoded = urlencoding::decode(target).ok()?.into_owned();
        if let Some(idx) = decoded.find("fileID=") {
            return Some(decoded[idx + 7..].to_string());
        }
        decoded
            .find("file-read-")
            .map(|idx| decoded[idx + 10..].to_string())
    }

    fn local_file_name(target: &str) -> Option<String> {
        if is_http(target)
            || !target.contains(LOCAL_RESOURCE_PREFIX)
            || target.contains("/url?url=")
            || target.contains("/path?")
        {
            return None;
        }
        target.rsplit('/').next().map(str::to_string)
    }

    enum MarkdownSegment<'a> {
        Text(&'a str),
        Image { name: &'a str, target: &'a str },
    }

    fn split_markdown(content: &str) -> Vec<MarkdownSegment<'_>> {
        let mut segments = Vec::new();
        let mut rest = content;
        while let Some(open) = rest.find("![") {
            let Some(mid) = rest[open..].find("](") else {
                break;
            };
            let Some(close) = rest[open + mid..].find(')') else {
                break;
            };
            if open > 0 {
                segments.push(MarkdownSegment::Text(&rest[..open]));
            }
            let name = &rest[open + 2..open + mid];
            let target = &rest[open + mid + 2..open + mid + close];
            segments.push(MarkdownSegment::Image { name, target });
            rest = &rest[open + mid + close + 1..];
        }
        if !rest.is_empty() {
            segments.push(MarkdownSegment::Text(rest));
        }
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn markup_without_images_is_unchanged() {
        let mut files = LocalFileStore::default();
        let out = wiki::from_canonical("plain steps to reproduce", &mut files).unwrap();
        assert_eq!(out.remote, "plain steps to reproduce");
        assert!(out.remain.is_empty());
        assert!(out.uploads.is_empty());
    }

    #[test]
    fn wiki_http_images_round_trip() {
        let mut files = LocalFileStore::default();
        let canonical =
            "before <img src=\"https://pic.example/1.jpeg\" permalinksrc=\"https://pic.example/1.jpeg\"> after";
        let out = wiki::from_canonical(canonical, &mut files).unwrap();
        assert_eq!(
            out.remote,
            "before !https://pic.example/1.jpeg|width=1360,height=876! after"
        );

        let back = wiki::to_canonical(&out.remote, &mut HashMap::new());
        assert!(back
            .canonical
            .contains("src=\"https://pic.example/1.jpeg\""));
        assert!(back.pending_downloads.is_empty());
    }

    #[test]
    fn wiki_local_image_is_staged_and_removed_from_index() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("upload.tmp");
        fs::write(&source, b"bytes").unwrap();
        let mut files = LocalFileStore::new(HashMap::from([(
            "f1".to_string(),
            LocalFile::new(&source),
        )]));

        let canonical =
            "<img src=\"/bug/attachment/preview/md/p/f/true\" fileid=\"f1\" permalinksrc=\"/bug/attachment/preview/md/p/f/true\">";
        let out = wiki::from_canonical(canonical, &mut files).unwrap();

        assert_eq!(out.uploads.len(), 1);
        let staged_name = &out.uploads[0].file_name;
        assert!(staged_name.starts_with("image-"));
        assert!(!files.contains("f1"));
        assert!(out.remain.contains(staged_name));
        assert!(out.remote.contains(staged_name));
        assert!(out.remote.contains("alt='/bug/attachment/preview/md/p/f/true'"));
        // Canonical echo carries the remote name for the next edit.
        assert!(out.canonical.contains(&format!("psrc=\"{staged_name}\"")));
    }

    #[test]
    fn wiki_unknown_remote_image_becomes_pending_download() {
        let mut attachments =
            HashMap::from([("image-known.jpg".to_string(), "key-1".to_string())]);
        let remote = "!image-known.jpg|width=1360,height=876! !image-new.jpg|width=1360,height=876!";
        let back = wiki::to_canonical(remote, &mut attachments);
        assert_eq!(back.pending_downloads.get("key-1").unwrap(), "image-known.jpg");
        assert!(back
            .pending_downloads
            .values()
            .any(|name| name == "image-new.jpg"));
    }

    #[test]
    fn wiki_literal_bangs_are_inert() {
        let out = wiki::to_canonical("wow! that failed! badly", &mut HashMap::new());
        assert_eq!(out.canonical, "wow! that failed! badly");
    }

    #[test]
    fn html_rebases_preview_urls_onto_tracker() {
        let canonical =
            "<img src=\"/bug/attachment/preview/md/p/f/true\" permalinksrc=\"/bug/attachment/preview/md/p/f/true\">";
        let out = html::from_canonical(canonical, "https://host.example");
        assert!(out
            .remote
            .contains("src=\"https://host.example/bug/attachment/preview/md/p/f/true\""));
        assert!(out.remote.contains("alt=\"/bug/attachment/preview/md/p/f/true\""));
        assert!(out.canonical.contains("psrc=\"https://host.example"));
    }

    #[test]
    fn html_tracker_images_resolve_to_download_urls() {
        let remote = "<img src=\"/tfl/pic-1.png\" alt=\"\">";
        assert_eq!(html::tracker_image_sources(remote), vec!["/tfl/pic-1.png"]);

        let resolved = HashMap::from([(
            "/tfl/pic-1.png".to_string(),
            "https://dl.example/tmp/pic-1".to_string(),
        )]);
        let back = html::to_canonical(remote, &resolved);
        assert!(back.canonical.contains("psrc=\"/tfl/pic-1.png\""));
        assert!(back.canonical.contains("src=\"https://dl.example/tmp/pic-1\""));
        assert_eq!(back.pending_downloads.len(), 1);
    }

    #[test]
    fn html_round_trip_preserves_synced_images() {
        let canonical =
            "<img src=\"/bug/attachment/preview/md/p/f/true\" permalinksrc=\"/bug/attachment/preview/md/p/f/true\">";
        let forward = html::from_canonical(canonical, "https://host.example");
        let back = html::to_canonical(&forward.remote, &HashMap::new());
        assert!(back
            .canonical
            .contains("src=\"/bug/attachment/preview/md/p/f/true\""));
    }

    #[test]
    fn markdown_http_links_become_img_tags_and_back() {
        let canonical = "steps\n![crash](https://pic.example/crash.png)";
        let remote = markdown::from_canonical(canonical, &HashMap::new());
        assert!(remote.contains("<img src=\"https://pic.example/crash.png\" alt=\"crash\""));

        let back = markdown::to_canonical(&remote, |path| path.to_string());
        assert!(back.contains("![crash](https://pic.example/crash.png)"));
    }

    #[test]
    fn markdown_local_ref_rewrites_to_uploaded_id() {
        let canonical = "![shot](/resource/md/get/shot-1.png)";
        assert_eq!(markdown::local_refs(canonical), vec!["shot-1.png"]);

        let uploaded = HashMap::from([("shot-1.png".to_string(), "42".to_string())]);
        let remote = markdown::from_canonical(canonical, &uploaded);
        assert_eq!(remote, "![shot]({42.png})");
    }

    #[test]
    fn markdown_lifts_tracker_file_refs_only_for_images() {
        let remote = "<img src=\"{7.png}\" alt=\"shot\"/> <img src=\"{9.exe}\" alt=\"tool\"/>";
        let canonical = markdown::to_canonical(remote, |path| format!("/proxy{path}"));
        assert!(canonical.contains("![shot](/proxy/file-read-7.png)"));
        assert!(!canonical.contains("9.exe)"));
    }

    #[test]
    fn unrecognizable_tag_is_inert() {
        let mut files = LocalFileStore::default();
        let canonical = "<img data-x=\"1\"> tail";
        let out = wiki::from_canonical(canonical, &mut files).unwrap();
        assert_eq!(out.remote, canonical);
    }
}
