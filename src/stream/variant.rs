//! The capability seam between the shared engine and the two stream flavors.

use serde_json::Value;

use crate::{
    error::FinlightResult,
    models::{Article, RawArticle},
};

/// What distinguishes one stream flavor from another: the endpoint path
/// suffix, the log prefix, the payload transform, and whether articles carry
/// an identifier for duplicate suppression.
///
/// The engine ([`StreamActor`](super::actor::StreamActor)) is generic over
/// this trait; everything else about the connection lifecycle is shared.
pub trait StreamVariant: Send + Sync + 'static {
    /// The record type delivered to the caller's sink.
    type Article: Send + 'static;

    /// Appended to the stream base URL.
    const PATH_SUFFIX: &'static str;

    /// Prefix for log events from this stream.
    const LOG_PREFIX: &'static str;

    /// Coerce an inbound article payload to the public record shape.
    fn transform(data: Value) -> FinlightResult<Self::Article>;

    /// Identifier used by the duplicate filter; `None` disables filtering.
    fn article_id(article: &Self::Article) -> Option<String>;
}

/// The enriched stream: full article records, deduplicated by link.
pub struct Enriched;

impl StreamVariant for Enriched {
    type Article = Article;

    const PATH_SUFFIX: &'static str = "";
    const LOG_PREFIX: &'static str = "stream";

    fn transform(data: Value) -> FinlightResult<Article> {
        Ok(serde_json::from_value(data)?)
    }

    fn article_id(article: &Article) -> Option<String> {
        Some(article.link.clone())
    }
}

/// The raw stream: unenriched source records, no duplicate filtering.
pub struct Raw;

impl StreamVariant for Raw {
    type Article = RawArticle;

    const PATH_SUFFIX: &'static str = "/raw";
    const LOG_PREFIX: &'static str = "raw-stream";

    fn transform(data: Value) -> FinlightResult<RawArticle> {
        Ok(serde_json::from_value(data)?)
    }

    fn article_id(_article: &RawArticle) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enriched_identity_is_the_link() {
        let article = Enriched::transform(json!({"link": "a", "confidence": "0.5"})).unwrap();
        assert_eq!(Enriched::article_id(&article).as_deref(), Some("a"));
        assert_eq!(article.confidence, Some(0.5));
    }

    #[test]
    fn test_raw_disables_deduplication() {
        let article = Raw::transform(json!({"link": "a"})).unwrap();
        assert!(Raw::article_id(&article).is_none());
    }

    #[test]
    fn test_transform_rejects_non_article_payloads() {
        assert!(Enriched::transform(json!(null)).is_err());
        assert!(Raw::transform(json!({"title": "no link"})).is_err());
    }
}
