use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use common::{error::AppError, storage::types::MetricsRecord};
use regex::Regex;
use tracing::debug;

use crate::utils::document::{self, PageEvidence, PageSource};

const PAGE_PATTERN: &str = r"(?i)Page\s+(\d+)";

/// Page numbers cited by the record's metrics, first `Page N` per citation.
pub fn cited_pages(record: &MetricsRecord) -> Result<BTreeSet<u32>, AppError> {
    let pattern = Regex::new(PAGE_PATTERN)
        .map_err(|err| AppError::InternalError(format!("invalid page pattern: {err}")))?;

    Ok(record
        .citations()
        .filter_map(|citation| {
            let page = pattern
                .captures(citation)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok());
            if page.is_none() {
                debug!(citation, "citation carries no page reference");
            }
            page
        })
        .collect())
}

/// Renders per-page evidence as CSV, pages ascending.
pub fn render_csv(evidence: &BTreeMap<u32, PageEvidence>) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    for (page, content) in evidence {
        match content {
            PageEvidence::Tables(tables) => {
                writer.write_record([format!("--- TABLES FROM PAGE {page} ---")])?;
                for table in tables {
                    for row in table {
                        writer.write_record(row)?;
                    }
                    writer.write_record([""])?;
                }
            }
            PageEvidence::TextPreview(preview) => {
                writer.write_record([format!("--- TEXT FROM PAGE {page} ---")])?;
                writer.write_record([preview])?;
            }
        }
    }

    writer
        .into_inner()
        .map_err(|err| AppError::InternalError(format!("failed to flush evidence csv: {err}")))
}

/// CSV bytes for the pages the record cites, or `None` when no cited page is
/// inside the document.
pub async fn build_evidence(
    source: Arc<dyn PageSource>,
    record: &MetricsRecord,
    preview_chars: usize,
) -> Result<Option<Vec<u8>>, AppError> {
    let pages = cited_pages(record)?;
    if pages.is_empty() {
        return Ok(None);
    }

    let evidence = document::extract_tables(source, pages.into_iter().collect(), preview_chars).await?;
    if evidence.is_empty() {
        return Ok(None);
    }

    render_csv(&evidence).map(Some)
}
