use std::{collections::BTreeMap, sync::Arc};

use bytes::Bytes;
use common::error::AppError;
use lopdf::Document;
use tracing::{debug, warn};

/// Page-addressable text source. Pages are numbered from 1.
///
/// Implementations are CPU-bound and are only called from the blocking pool.
pub trait PageSource: Send + Sync {
    fn page_count(&self) -> u32;

    fn page_text(&self, page: u32) -> Result<String, AppError>;
}

/// Text of one page, prefixed with a `[Page N]` marker line models can cite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSegment {
    pub page_number: u32,
    pub text: String,
}

impl PageSegment {
    pub fn new(page_number: u32, raw: &str) -> Self {
        Self {
            page_number,
            text: format!("[Page {page_number}]\n{raw}"),
        }
    }
}

pub type TableRows = Vec<Vec<String>>;

/// Auditable content recovered from one cited page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvidence {
    Tables(Vec<TableRows>),
    /// Leading text of a page without detectable tables, suffixed with `...`.
    TextPreview(String),
}

pub struct PdfDocument {
    document: Document,
    page_ids: BTreeMap<u32, lopdf::ObjectId>,
}

impl PdfDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AppError> {
        let document = Document::load_mem(bytes)
            .map_err(|err| AppError::Processing(format!("Failed to parse PDF: {err}")))?;
        let page_ids = document.get_pages();
        Ok(Self { document, page_ids })
    }
}

impl PageSource for PdfDocument {
    fn page_count(&self) -> u32 {
        u32::try_from(self.page_ids.len()).unwrap_or(u32::MAX)
    }

    fn page_text(&self, page: u32) -> Result<String, AppError> {
        if !self.page_ids.contains_key(&page) {
            return Err(AppError::Processing(format!("page {page} out of range")));
        }
        self.document
            .extract_text(&[page])
            .map_err(|err| AppError::Processing(format!("Failed to extract page {page}: {err}")))
    }
}

/// Parses PDF bytes on the blocking pool.
pub async fn open_pdf(bytes: Bytes) -> Result<Arc<dyn PageSource>, AppError> {
    let document = tokio::task::spawn_blocking(move || PdfDocument::from_bytes(&bytes)).await??;
    Ok(Arc::new(document))
}

/// Extracts text for pages `1..=min(max_pages, page_count)`, skipping pages that
/// fail or are blank.
pub async fn load(source: Arc<dyn PageSource>, max_pages: u32) -> Result<Vec<PageSegment>, AppError> {
    let segments = tokio::task::spawn_blocking(move || {
        let last_page = source.page_count().min(max_pages);
        let mut segments = Vec::new();

        for page in 1..=last_page {
            match source.page_text(page) {
                Ok(text) if !text.trim().is_empty() => segments.push(PageSegment::new(page, &text)),
                Ok(_) => debug!(page, "skipping blank page"),
                Err(err) => debug!(page, error = %err, "skipping page that failed to extract"),
            }
        }

        segments
    })
    .await?;

    Ok(segments)
}

/// Table rows (or a text preview) for each requested in-range page.
pub async fn extract_tables(
    source: Arc<dyn PageSource>,
    pages: Vec<u32>,
    preview_chars: usize,
) -> Result<BTreeMap<u32, PageEvidence>, AppError> {
    let evidence = tokio::task::spawn_blocking(move || {
        let page_count = source.page_count();
        let mut evidence = BTreeMap::new();

        for page in pages {
            if page == 0 || page > page_count {
                debug!(page, page_count, "cited page out of range");
                continue;
            }

            match source.page_text(page) {
                Ok(text) => {
                    evidence.insert(page, page_evidence(&text, preview_chars));
                }
                Err(err) => warn!(page, error = %err, "failed to read cited page"),
            }
        }

        evidence
    })
    .await?;

    Ok(evidence)
}

const MIN_TABLE_ROWS: usize = 2;
const MIN_NUMERIC_COLUMNS: usize = 2;

fn page_evidence(text: &str, preview_chars: usize) -> PageEvidence {
    let tables = detect_tables(text);
    if tables.is_empty() {
        let preview: String = text.chars().take(preview_chars).collect();
        PageEvidence::TextPreview(format!("{preview}..."))
    } else {
        PageEvidence::Tables(tables)
    }
}

/// Groups consecutive row-like lines into tables.
pub fn detect_tables(text: &str) -> Vec<TableRows> {
    let mut tables = Vec::new();
    let mut current: TableRows = Vec::new();

    for line in text.lines() {
        if let Some(row) = split_row(line) {
            current.push(row);
        } else if !current.is_empty() {
            let finished = std::mem::take(&mut current);
            if finished.len() >= MIN_TABLE_ROWS {
                tables.push(finished);
            }
        }
    }

    if current.len() >= MIN_TABLE_ROWS {
        tables.push(current);
    }

    tables
}

fn split_row(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let delimited = if trimmed.contains('\t') {
        cells(trimmed.split('\t'))
    } else if trimmed.matches('|').count() >= 2 {
        cells(trimmed.split('|'))
    } else {
        cells(trimmed.split("   "))
    };
    if delimited.len() >= 2 {
        return Some(delimited);
    }

    label_with_numbers(trimmed)
}

fn cells<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<String> {
    parts
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(str::to_owned)
        .collect()
}

// "Revenue from operations 1,23,456 1,10,200" => ["Revenue from operations", "1,23,456", "1,10,200"]
fn label_with_numbers(line: &str) -> Option<Vec<String>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let numeric_tail = tokens
        .iter()
        .rev()
        .take_while(|token| is_numeric_token(token))
        .count();
    let label_len = tokens.len().saturating_sub(numeric_tail);

    if numeric_tail < MIN_NUMERIC_COLUMNS || label_len == 0 {
        return None;
    }

    let (label, numbers) = tokens.split_at(label_len);
    let mut row = vec![label.join(" ")];
    row.extend(numbers.iter().map(|n| (*n).to_owned()));
    Some(row)
}

fn is_numeric_token(token: &str) -> bool {
    let core: String = token
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '%' | '₹' | '$' | '-'))
        .collect();
    !core.is_empty() && core.chars().all(|c| c.is_ascii_digit() || c == '.')
}

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::{AppError, PageSource};

    /// Page source over fixed strings; `None` pages fail to extract.
    pub struct InMemoryDocument {
        pages: Vec<Option<String>>,
    }

    impl InMemoryDocument {
        pub fn new<I, S>(pages: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                pages: pages.into_iter().map(|p| Some(p.into())).collect(),
            }
        }

        pub fn with_pages(pages: Vec<Option<String>>) -> Self {
            Self { pages }
        }
    }

    impl PageSource for InMemoryDocument {
        fn page_count(&self) -> u32 {
            u32::try_from(self.pages.len()).unwrap_or(u32::MAX)
        }

        fn page_text(&self, page: u32) -> Result<String, AppError> {
            let idx = usize::try_from(page.saturating_sub(1)).unwrap_or(usize::MAX);
            match self.pages.get(idx) {
                Some(Some(text)) if page > 0 => Ok(text.clone()),
                Some(_) => Err(AppError::Processing(format!("page {page} is unreadable"))),
                None => Err(AppError::Processing(format!("page {page} out of range"))),
            }
        }
    }

    /// Builds a minimal PDF with one text line per `BT`/`ET` block.
    pub fn build_pdf(pages: &[&[&str]]) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for lines in pages {
            let mut operations = Vec::new();
            let mut y = 800_i64;
            for line in *lines {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), 10.into()]));
                operations.push(Operation::new("Td", vec![50.into(), y.into()]));
                operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
                operations.push(Operation::new("ET", vec![]));
                y = y.saturating_sub(14);
            }
            let encoded = Content { operations }.encode().unwrap_or_default();
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = i64::try_from(kids.len()).unwrap_or(0);
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        if doc.save_to(&mut bytes).is_err() {
            bytes.clear();
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{build_pdf, InMemoryDocument};
    use super::*;

    #[tokio::test]
    async fn load_tags_pages_and_skips_blank_or_failed_pages() {
        let source: Arc<dyn PageSource> = Arc::new(InMemoryDocument::with_pages(vec![
            Some("Chairman's letter".into()),
            Some("   \n".into()),
            None,
            Some("Balance sheet".into()),
        ]));

        let segments = load(source, 250).await.expect("load");

        assert_eq!(
            segments,
            vec![
                PageSegment::new(1, "Chairman's letter"),
                PageSegment::new(4, "Balance sheet"),
            ]
        );
        assert!(segments
            .first()
            .is_some_and(|s| s.text.starts_with("[Page 1]\n")));
    }

    #[tokio::test]
    async fn load_respects_page_cap() {
        let source: Arc<dyn PageSource> = Arc::new(InMemoryDocument::new(["a", "b", "c"]));
        let segments = load(source, 2).await.expect("load");
        let pages: Vec<u32> = segments.iter().map(|s| s.page_number).collect();
        assert_eq!(pages, vec![1, 2]);
    }

    #[test]
    fn detects_delimited_and_numeric_rows() {
        let text = "Standalone Statement of Profit and Loss\n\
                    Particulars\tFY24\tFY23\n\
                    Revenue\t1,000\t900\n\
                    \n\
                    Other income 120.5 (30)\n\
                    Total expenses 800 700\n\
                    Notes follow below";

        let tables = detect_tables(text);
        assert_eq!(tables.len(), 2);
        assert_eq!(
            tables.first().and_then(|t| t.first()).cloned(),
            Some(vec!["Particulars".to_string(), "FY24".into(), "FY23".into()])
        );
        assert_eq!(
            tables.get(1).and_then(|t| t.first()).cloned(),
            Some(vec!["Other income".to_string(), "120.5".into(), "(30)".into()])
        );
    }

    #[test]
    fn single_row_like_line_is_not_a_table() {
        assert!(detect_tables("Revenue 100 200\nplain prose line").is_empty());
    }

    #[tokio::test]
    async fn pages_without_tables_fall_back_to_preview() {
        let long_text = "x".repeat(800);
        let source: Arc<dyn PageSource> = Arc::new(InMemoryDocument::new([
            long_text.clone(),
            "A | B | C\n1 | 2 | 3".to_string(),
        ]));

        let evidence = extract_tables(source, vec![1, 2, 9, 0], 500)
            .await
            .expect("tables");

        assert_eq!(evidence.len(), 2);
        assert_eq!(
            evidence.get(&1),
            Some(&PageEvidence::TextPreview(format!("{}...", "x".repeat(500))))
        );
        assert!(matches!(evidence.get(&2), Some(PageEvidence::Tables(t)) if t.len() == 1));
    }

    #[tokio::test]
    async fn reads_text_from_generated_pdf() {
        let bytes = build_pdf(&[&["Annual Report 2024"], &["Revenue grew"]]);
        let source = open_pdf(Bytes::from(bytes)).await.expect("parse pdf");

        assert_eq!(source.page_count(), 2);
        let segments = load(source, 250).await.expect("load");
        assert_eq!(segments.len(), 2);
        assert!(segments
            .get(1)
            .is_some_and(|s| s.text.contains("Revenue grew")));
    }

    #[tokio::test]
    async fn rejects_non_pdf_bytes() {
        let result = open_pdf(Bytes::from_static(b"not a pdf")).await;
        assert!(matches!(result, Err(AppError::Processing(_))));
    }
}
