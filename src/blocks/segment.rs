//! Markdown block segmentation
//!
//! Splits finished message text into text spans and pipe tables. A line is a
//! table line iff its trimmed form starts and ends with `|`. The second line
//! of every table run is taken as the separator row and skipped unchecked.

use tracing::debug;

use super::{ContentBlock, TableBlock, TextBlock};

/// Whether a line belongs to a pipe table
pub fn is_table_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|') && trimmed.ends_with('|')
}

/// Split a pipe-delimited row into trimmed cells, dropping the empty
/// fields produced by the leading and trailing pipes
pub fn split_table_row(line: &str) -> Vec<String> {
    let mut cells: Vec<&str> = line.trim().split('|').collect();
    if cells.first().is_some_and(|c| c.trim().is_empty()) {
        cells.remove(0);
    }
    if cells.last().is_some_and(|c| c.trim().is_empty()) {
        cells.pop();
    }
    cells.into_iter().map(|c| c.trim().to_string()).collect()
}

struct Segmenter<'a> {
    message_id: &'a str,
    counter: usize,
    blocks: Vec<ContentBlock>,
    text_lines: Vec<&'a str>,
    table_lines: Vec<&'a str>,
}

impl<'a> Segmenter<'a> {
    fn new(message_id: &'a str) -> Self {
        Self {
            message_id,
            counter: 0,
            blocks: vec![],
            text_lines: vec![],
            table_lines: vec![],
        }
    }

    fn next_id(&mut self, kind: &str) -> String {
        let id = format!("{}-{}-{}", self.message_id, kind, self.counter);
        self.counter += 1;
        id
    }

    fn flush_text(&mut self) {
        if self.text_lines.is_empty() {
            return;
        }
        let markdown = self.text_lines.join("\n").trim().to_string();
        self.text_lines.clear();
        if markdown.is_empty() {
            return;
        }
        let id = self.next_id("text");
        self.blocks.push(ContentBlock::Text(TextBlock { id, markdown }));
    }

    fn flush_table(&mut self) {
        if self.table_lines.is_empty() {
            return;
        }
        let lines = std::mem::take(&mut self.table_lines);

        match parse_table(&lines) {
            Some((columns, rows)) => {
                let id = self.next_id("table");
                debug!(id = %id, columns = columns.len(), rows = rows.len(), "Table block");
                self.blocks.push(ContentBlock::Table(TableBlock {
                    id,
                    columns,
                    rows,
                    meta: None,
                }));
            }
            // Not a usable table, keep the lines as prose
            None => self.text_lines.extend(lines),
        }
    }
}

/// Header + data rows, or `None` when the header is blank or no data row
/// has the header's arity
fn parse_table(lines: &[&str]) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let columns = split_table_row(lines.first()?);
    if columns.iter().all(|c| c.is_empty()) {
        return None;
    }

    let rows: Vec<Vec<String>> = lines
        .iter()
        .skip(2)
        .map(|line| split_table_row(line))
        .filter(|cells| cells.len() == columns.len())
        .collect();

    if rows.is_empty() {
        return None;
    }
    Some((columns, rows))
}

/// Split completed message text into ordered text and table blocks.
///
/// Ids are `{message_id}-text-{n}` / `{message_id}-table-{n}` with one
/// counter shared by both kinds. Non-empty input always yields at least one
/// block.
pub fn segment_blocks(content: &str, message_id: &str) -> Vec<ContentBlock> {
    let mut segmenter = Segmenter::new(message_id);

    for line in content.lines() {
        if is_table_line(line) {
            if segmenter.table_lines.is_empty() {
                segmenter.flush_text();
            }
            segmenter.table_lines.push(line);
        } else {
            segmenter.flush_table();
            segmenter.text_lines.push(line);
        }
    }
    segmenter.flush_table();
    segmenter.flush_text();

    if segmenter.blocks.is_empty() && !content.is_empty() {
        let id = segmenter.next_id("text");
        return vec![ContentBlock::Text(TextBlock {
            id,
            markdown: content.to_string(),
        })];
    }
    segmenter.blocks
}
