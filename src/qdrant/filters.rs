//! Filter helpers for Qdrant queries.

use serde_json::{Value, json};

use crate::store::CorpusFilter;

/// Payload field holding the corpus tag.
pub const CORPUS_TAG_FIELD: &str = "corpus_tag";

/// Qdrant filter matching entries whose corpus tag equals any tag of `filter`.
pub fn build_corpus_filter(filter: &CorpusFilter) -> Value {
    let tags: Vec<&str> = filter.tags().collect();
    json!({
        "must": [
            {
                "key": CORPUS_TAG_FIELD,
                "match": { "any": tags }
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_tags_become_a_single_any_clause() {
        let filter = CorpusFilter::from_tags(["beta", "alpha"]).expect("filter");
        assert_eq!(
            build_corpus_filter(&filter),
            json!({
                "must": [
                    { "key": "corpus_tag", "match": { "any": ["alpha", "beta"] } }
                ]
            })
        );
    }

    #[test]
    fn tags_are_passed_through_verbatim() {
        let filter = CorpusFilter::single(" spaced ");
        assert_eq!(
            build_corpus_filter(&filter)["must"][0]["match"]["any"],
            json!([" spaced "])
        );
    }
}
