use std::sync::LazyLock;

use regex::Regex;

use crate::types::StorageLocation;

static S3_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[?(s3://[^\s\]]+)\]?").expect("s3 link pattern is valid"));

/// Sentence punctuation a model tends to glue onto a link.
const TRAILING: &[char] = &['.', ',', ';', ':', ')', '"', '\''];

/// Every `s3://bucket/key` link in generated text, in order. Links may be
/// wrapped in `[...]`; ones without a key are skipped.
pub fn find_s3_links(text: &str) -> Vec<StorageLocation> {
    S3_LINK
        .captures_iter(text)
        .filter_map(|caps| {
            let uri = caps.get(1)?.as_str().trim_end_matches(TRAILING);
            StorageLocation::parse_s3_uri(uri)
        })
        .collect()
}

/// The first usable `s3://` link in generated text.
pub fn find_s3_link(text: &str) -> Option<StorageLocation> {
    find_s3_links(text).into_iter().next()
}
