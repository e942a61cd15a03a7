//! Markdown rendering for tool results.

use std::fmt::Write as _;

use crate::store::ScoredEntry;

/// Text returned when `search_documents` is called without a query.
pub(crate) const EMPTY_QUERY_MESSAGE: &str = "Error: query must not be empty";

/// Render ranked search hits as a markdown report.
pub(crate) fn format_search_results(query: &str, hits: &[ScoredEntry]) -> String {
    if hits.is_empty() {
        return format!("# Search results\n\nNo documents matched \"{query}\".\n");
    }

    let mut markdown = format!("# Search results: {query}\n\n");
    let _ = write!(markdown, "Found {} relevant results\n\n", hits.len());
    markdown.push_str("---\n\n");
    for (rank, hit) in hits.iter().enumerate() {
        let _ = write!(markdown, "## {}. {}\n\n", rank + 1, hit.payload.file_name);
        let _ = write!(markdown, "**Source**: {}\n\n", hit.payload.corpus_tag);
        let _ = write!(markdown, "**Score**: {:.4}\n\n", hit.score);
        markdown.push_str("### Content\n\n");
        let _ = write!(markdown, "{}\n\n", hit.payload.text);
        markdown.push_str("---\n\n");
    }
    markdown
}

/// Render the configured corpus allow-list.
pub(crate) fn format_data_sources(tags: &[String]) -> String {
    let mut markdown = String::from("# Available data sources\n\n");
    if tags.is_empty() {
        markdown.push_str("No data sources are currently available.\n");
        return markdown;
    }

    let _ = write!(
        markdown,
        "This server provides the following {} data sources:\n\n",
        tags.len()
    );
    for tag in tags {
        let _ = writeln!(markdown, "- **{tag}**");
    }
    markdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntryPayload;

    fn hit(file_name: &str, tag: &str, score: f32, text: &str) -> ScoredEntry {
        ScoredEntry {
            id: "id".into(),
            score,
            payload: EntryPayload {
                text: text.into(),
                file_name: file_name.into(),
                corpus_tag: tag.into(),
                ordinal: 0,
            },
        }
    }

    #[test]
    fn search_report_lists_rank_source_score_and_text() {
        let report = format_search_results(
            "retention",
            &[
                hit("policy.md", "hr", 0.912_345, "Keep records for 7 years."),
                hit("faq.txt", "support", 0.5, "Ask the archive team."),
            ],
        );

        assert!(report.starts_with("# Search results: retention\n\nFound 2 relevant results\n\n---\n\n"));
        assert!(report.contains("## 1. policy.md\n\n**Source**: hr\n\n**Score**: 0.9123\n\n"));
        assert!(report.contains("### Content\n\nKeep records for 7 years.\n\n---\n\n"));
        assert!(report.contains("## 2. faq.txt"));
        assert!(report.contains("**Score**: 0.5000"));
    }

    #[test]
    fn empty_search_report_names_the_query() {
        assert_eq!(
            format_search_results("nothing", &[]),
            "# Search results\n\nNo documents matched \"nothing\".\n"
        );
    }

    #[test]
    fn data_sources_render_as_bold_list() {
        let text = format_data_sources(&["A".into(), "B".into()]);
        assert_eq!(
            text,
            "# Available data sources\n\nThis server provides the following 2 data sources:\n\n- **A**\n- **B**\n"
        );
        assert!(format_data_sources(&[]).contains("No data sources are currently available."));
    }
}
