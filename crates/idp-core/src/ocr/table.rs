//! Table recovery from located text blocks, plus per-page headers and footers.

use tracing::debug;

use crate::extraction::rules::has_digit;
use crate::extraction::rules::patterns::{AMOUNT_SHAPE, DATE_TOKEN};
use crate::extraction::scoped_fields;
use crate::models::config::TableConfig;
use crate::models::{ColumnType, DocumentType, PageSection, TableCandidate, TextBlock};

/// Words that mark a table header line.
const HEADER_KEYWORDS: &[&str] = &[
    "id", "date", "description", "amount", "quantity", "qty", "price", "total", "item", "unit",
];

/// Table categories by header vocabulary, checked in order.
const TABLE_TYPES: &[(&str, &[&str])] = &[
    ("technical_specs", &["specification", "specifications", "spec", "parameter", "value", "model"]),
    ("dimensions", &["dimension", "dimensions", "width", "height", "length", "depth", "size"]),
    ("line_items", &["item", "description", "qty", "quantity", "unit", "price"]),
    ("financial", &["amount", "total", "balance", "debit", "credit", "tax"]),
];

/// One visual line: cells left to right.
type Line = Vec<String>;

/// Groups located blocks into lines and lines into tables.
#[derive(Debug, Clone, Default)]
pub struct TableExtractor {
    config: TableConfig,
}

impl TableExtractor {
    pub fn new(config: TableConfig) -> Self {
        Self { config }
    }

    /// Group located blocks into lines by y-centre, each sorted by x.
    ///
    /// A block joins the current line while its centre is within the
    /// tolerance of the line's first block.
    pub fn group_lines(&self, blocks: &[TextBlock]) -> Vec<Line> {
        let mut located: Vec<(f32, f32, &str)> = blocks
            .iter()
            .filter_map(|b| {
                let (x, y) = b.center()?;
                let text = b.text.trim();
                (!text.is_empty()).then_some((x, y, text))
            })
            .collect();
        located.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut lines: Vec<Vec<(f32, &str)>> = Vec::new();
        let mut anchor_y = f32::NEG_INFINITY;

        for (x, y, text) in located {
            match lines.last_mut() {
                Some(line) if (y - anchor_y).abs() <= self.config.y_tolerance => line.push((x, text)),
                _ => {
                    lines.push(vec![(x, text)]);
                    anchor_y = y;
                }
            }
        }

        lines
            .into_iter()
            .map(|mut line| {
                line.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
                line.into_iter().map(|(_, t)| t.to_string()).collect()
            })
            .collect()
    }

    /// Find tables among the located blocks of one page.
    pub fn extract(&self, blocks: &[TextBlock], doc_type: DocumentType) -> Vec<TableCandidate> {
        let lines = self.group_lines(blocks);
        let mut tables = Vec::new();
        let mut current: Option<(Line, Vec<Line>)> = None;

        for line in lines {
            if let Some((header, rows)) = current.as_mut() {
                if self.is_row(&line, header.len()) {
                    rows.push(line);
                    continue;
                }
                if let Some((header, rows)) = current.take() {
                    tables.extend(self.finish(header, rows, doc_type));
                }
            }

            if is_header(&line) {
                current = Some((line, Vec::new()));
            }
        }

        if let Some((header, rows)) = current {
            tables.extend(self.finish(header, rows, doc_type));
        }

        debug!("Table extraction: {} table(s)", tables.len());
        tables
    }

    fn is_row(&self, line: &Line, header_columns: usize) -> bool {
        let columns = line.len() as f32;
        let expected = header_columns as f32;

        columns >= expected * 0.5
            && columns <= expected * 1.5
            && line.iter().any(|cell| has_digit(cell))
            && line
                .iter()
                .all(|cell| (1..=self.config.max_cell_length).contains(&cell.chars().count()))
    }

    fn finish(&self, header: Line, rows: Vec<Line>, doc_type: DocumentType) -> Option<TableCandidate> {
        let column_count = header.len();
        if rows.len() < self.config.min_rows || column_count < self.config.min_columns {
            return None;
        }

        let column_types = (0..column_count)
            .map(|col| majority_type(rows.iter().filter_map(|row| row.get(col))))
            .collect();

        let text = std::iter::once(&header)
            .chain(rows.iter())
            .map(|line| line.join(" "))
            .collect::<Vec<_>>()
            .join("\n");

        Some(TableCandidate {
            table_type: table_type(&header).to_string(),
            fields: scoped_fields(&text, doc_type),
            row_count: rows.len(),
            column_count,
            column_types,
            header: Some(header),
            rows,
        })
    }
}

fn words(line: &Line) -> impl Iterator<Item = String> + '_ {
    line.iter()
        .flat_map(|cell| cell.split_whitespace())
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
}

/// Two or more header keywords, or two or more capitalized cells.
fn is_header(line: &Line) -> bool {
    let keywords = words(line).filter(|w| HEADER_KEYWORDS.contains(&w.as_str())).count();
    let capitalized = line
        .iter()
        .filter(|cell| cell.chars().next().is_some_and(char::is_uppercase))
        .count();
    keywords >= 2 || capitalized >= 2
}

fn table_type(header: &Line) -> &'static str {
    let header_words: Vec<String> = words(header).collect();
    TABLE_TYPES
        .iter()
        .find(|(_, keys)| header_words.iter().any(|w| keys.contains(&w.as_str())))
        .map(|(name, _)| *name)
        .unwrap_or("generic")
}

/// Semantic type of one cell.
pub fn cell_type(cell: &str) -> ColumnType {
    let cell = cell.trim();
    match cell.to_lowercase().as_str() {
        "yes" | "no" | "true" | "false" => return ColumnType::Boolean,
        _ => {}
    }

    if has_digit(cell) && AMOUNT_SHAPE.is_match(cell) {
        ColumnType::Numeric
    } else if DATE_TOKEN.find(cell).is_some_and(|m| m.as_str().trim() == cell) {
        ColumnType::Date
    } else {
        ColumnType::Text
    }
}

/// Most common cell type; ties and empty columns resolve to text.
fn majority_type<'a>(cells: impl Iterator<Item = &'a String>) -> ColumnType {
    let mut counts = [0usize; 4];
    for cell in cells {
        let idx = match cell_type(cell) {
            ColumnType::Numeric => 0,
            ColumnType::Date => 1,
            ColumnType::Boolean => 2,
            ColumnType::Text => 3,
        };
        counts[idx] += 1;
    }

    let best = counts.iter().copied().max().unwrap_or(0);
    let winners: Vec<usize> = (0..4).filter(|&i| counts[i] == best).collect();
    match winners.as_slice() {
        [0] if best > 0 => ColumnType::Numeric,
        [1] if best > 0 => ColumnType::Date,
        [2] if best > 0 => ColumnType::Boolean,
        _ => ColumnType::Text,
    }
}

/// Header and footer sections of PDF pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderFooter;

impl HeaderFooter {
    /// First and last text unit of a page, each with its own fields.
    ///
    /// Units are the page's blocks, only the located ones when a page mixes
    /// OCR output with its text layer. A page that is a single block (a text
    /// layer) is split into lines instead. A single-unit page has a header only.
    pub fn extract(
        page: u32,
        blocks: &[TextBlock],
        doc_type: DocumentType,
    ) -> (Option<PageSection>, Option<PageSection>) {
        let located: Vec<&TextBlock> = blocks.iter().filter(|b| b.bbox.is_some()).collect();
        let blocks: Vec<&TextBlock> = if located.is_empty() {
            blocks.iter().collect()
        } else {
            located
        };

        let units: Vec<&str> = if blocks.len() == 1 {
            blocks[0].text.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
        } else {
            blocks.iter().map(|b| b.text.trim()).filter(|t| !t.is_empty()).collect()
        };

        let section = |text: &str| PageSection {
            page,
            text: text.to_string(),
            fields: scoped_fields(text, doc_type),
        };

        match units.as_slice() {
            [] => (None, None),
            [only] => (Some(section(only)), None),
            [first, .., last] => (Some(section(first)), Some(section(last))),
        }
    }
}
