//! In-memory view of a worksheet part that supports row deletion

use std::fmt;

use anyhow::{bail, Context, Result};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

/// A rectangular cell reference such as `A2:D9`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CellRange {
    first_col: String,
    first_row: usize,
    last_col: String,
    last_row: usize,
}

impl CellRange {
    pub(crate) fn parse(text: &str) -> Option<Self> {
        let (first, last) = text.split_once(':').unwrap_or((text, text));
        let (first_col, first_row) = split_cell_ref(first)?;
        let (last_col, last_row) = split_cell_ref(last)?;
        Some(Self {
            first_col: first_col.to_string(),
            first_row,
            last_col: last_col.to_string(),
            last_row,
        })
    }

    fn is_single_cell(&self) -> bool {
        self.first_col == self.last_col && self.first_row == self.last_row
    }

    /// Shift for a deleted row; `None` when the range disappears
    fn without_row(mut self, row: usize) -> Option<Self> {
        if self.last_row < row {
            return Some(self);
        }
        if self.first_row > row {
            self.first_row -= 1;
            self.last_row -= 1;
            return Some(self);
        }
        if self.first_row == self.last_row {
            return None;
        }
        self.last_row -= 1;
        Some(self)
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}{}", self.first_col, self.first_row)
        } else {
            write!(
                f,
                "{}{}:{}{}",
                self.first_col, self.first_row, self.last_col, self.last_row
            )
        }
    }
}

/// Split `BC12` into (`BC`, 12); absolute markers (`$`) are dropped
fn split_cell_ref(text: &str) -> Option<(&str, usize)> {
    let text = text.trim();
    let digits = text.find(|c: char| c.is_ascii_digit())?;
    let col = text[..digits].trim_matches('$');
    let row = text[digits..].parse().ok()?;
    if col.is_empty() || !col.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((col, row))
}

struct RowXml {
    number: usize,
    start: BytesStart<'static>,
    body: Vec<Event<'static>>,
    empty: bool,
}

enum Part {
    Event(Event<'static>),
    Dimension(BytesStart<'static>, Option<CellRange>),
    Rows,
    MergeCells(BytesStart<'static>),
}

/// A worksheet XML part split into untouched events and editable rows.
///
/// Row numbers are 1-based, as in the sheet. Cells keep every attribute
/// (style indices included); only their references move.
pub(crate) struct SheetXml {
    parts: Vec<Part>,
    rows: Vec<RowXml>,
    merges: Vec<CellRange>,
    shared_formulas: bool,
}

enum State {
    Outside,
    SheetData,
    Row(RowXml),
    MergeCells,
}

impl SheetXml {
    pub(crate) fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        let mut parts = Vec::new();
        let mut rows: Vec<RowXml> = Vec::new();
        let mut merges = Vec::new();
        let mut state = State::Outside;
        let mut last_row = 0usize;
        let mut shared_formulas = false;

        loop {
            let event = reader
                .read_event()
                .with_context(|| format!("Malformed worksheet XML at {}", reader.buffer_position()))?
                .into_owned();
            if matches!(event, Event::Eof) {
                break;
            }

            state = match state {
                State::Outside => match event {
                    Event::Start(e) if local_name(&e) == b"sheetData" => {
                        parts.push(Part::Event(Event::Start(e)));
                        State::SheetData
                    }
                    Event::Empty(e) if local_name(&e) == b"dimension" => {
                        let range = attr_value(&e, b"ref")?.and_then(|r| CellRange::parse(&r));
                        parts.push(Part::Dimension(e, range));
                        State::Outside
                    }
                    Event::Start(e) if local_name(&e) == b"mergeCells" => {
                        parts.push(Part::MergeCells(e));
                        State::MergeCells
                    }
                    other => {
                        parts.push(Part::Event(other));
                        State::Outside
                    }
                },
                State::SheetData => match event {
                    Event::Start(e) if local_name(&e) == b"row" => {
                        let number = row_number(&e, last_row)?;
                        last_row = number;
                        State::Row(RowXml {
                            number,
                            start: e,
                            body: Vec::new(),
                            empty: false,
                        })
                    }
                    Event::Empty(e) if local_name(&e) == b"row" => {
                        let number = row_number(&e, last_row)?;
                        last_row = number;
                        rows.push(RowXml {
                            number,
                            start: e,
                            body: Vec::new(),
                            empty: true,
                        });
                        State::SheetData
                    }
                    Event::End(e) => {
                        parts.push(Part::Rows);
                        parts.push(Part::Event(Event::End(e)));
                        State::Outside
                    }
                    // Whitespace between rows is not kept
                    _ => State::SheetData,
                },
                State::Row(mut row) => match event {
                    Event::End(ref e) if e.local_name().as_ref() == b"row" => {
                        rows.push(row);
                        State::SheetData
                    }
                    other => {
                        if let Event::Start(e) | Event::Empty(e) = &other {
                            if local_name(e) == b"f" && shared_group(e)?.is_some() {
                                shared_formulas = true;
                            }
                        }
                        row.body.push(other);
                        State::Row(row)
                    }
                },
                State::MergeCells => match event {
                    Event::Start(e) | Event::Empty(e) if local_name(&e) == b"mergeCell" => {
                        if let Some(range) = attr_value(&e, b"ref")?.and_then(|r| CellRange::parse(&r))
                        {
                            merges.push(range);
                        }
                        State::MergeCells
                    }
                    Event::End(e) if e.local_name().as_ref() == b"mergeCells" => State::Outside,
                    _ => State::MergeCells,
                },
            };
        }

        if !matches!(state, State::Outside) {
            bail!("Unexpected end of worksheet XML");
        }

        Ok(Self {
            parts,
            rows,
            merges,
            shared_formulas,
        })
    }

    /// Highest row number present in the sheet data
    pub(crate) fn last_row(&self) -> usize {
        self.rows.iter().map(|r| r.number).max().unwrap_or(0)
    }

    pub(crate) fn row_numbers(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.iter().map(|r| r.number)
    }

    pub(crate) fn merges(&self) -> &[CellRange] {
        &self.merges
    }

    /// Remove one row and move every row below it up by one.
    ///
    /// Row numbers of pending deletions above `row` are unaffected, which is
    /// why callers apply deletions highest row first.
    ///
    /// Shared formulas anchored on the deleted row lose their master cell, so
    /// the remaining cells of those groups keep only their cached values.
    pub(crate) fn delete_row(&mut self, row: usize) -> Result<()> {
        let mut orphaned = Vec::new();
        for r in self.rows.iter().filter(|r| r.number == row) {
            orphaned.extend(shared_masters(r)?);
        }

        self.rows.retain(|r| r.number != row);
        for r in &mut self.rows {
            if self.shared_formulas {
                let body = std::mem::take(&mut r.body);
                r.body = shift_formulas(body, row, &orphaned)?;
            }
            if r.number > row {
                r.number -= 1;
            }
        }

        self.merges = std::mem::take(&mut self.merges)
            .into_iter()
            .filter_map(|m| m.without_row(row))
            .filter(|m| !m.is_single_cell())
            .collect();

        for part in &mut self.parts {
            if let Part::Dimension(_, Some(range)) = part {
                if range.last_row >= row && range.last_row > range.first_row {
                    range.last_row -= 1;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());

        for part in &self.parts {
            match part {
                Part::Event(event) => writer.write_event(event)?,
                Part::Dimension(start, range) => {
                    let start = match range {
                        Some(range) => with_attr(start, "ref", &range.to_string())?,
                        None => start.clone(),
                    };
                    writer.write_event(Event::Empty(start))?;
                }
                Part::Rows => {
                    for row in &self.rows {
                        write_row(&mut writer, row)?;
                    }
                }
                Part::MergeCells(start) => {
                    if self.merges.is_empty() {
                        continue;
                    }
                    let name = element_name(start)?;
                    let prefix = name.strip_suffix("mergeCells").unwrap_or("");
                    let cell_name = format!("{prefix}mergeCell");

                    let count = self.merges.len().to_string();
                    writer.write_event(Event::Start(with_attr(start, "count", &count)?))?;
                    for merge in &self.merges {
                        let mut cell = BytesStart::new(cell_name.as_str());
                        cell.push_attribute(("ref", merge.to_string().as_str()));
                        writer.write_event(Event::Empty(cell))?;
                    }
                    writer.write_event(Event::End(BytesEnd::new(name)))?;
                }
            }
        }

        Ok(writer.into_inner())
    }
}

fn write_row(writer: &mut Writer<Vec<u8>>, row: &RowXml) -> Result<()> {
    let number = row.number.to_string();
    let start = with_attr(&row.start, "r", &number)?;

    if row.empty {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for event in &row.body {
        match event {
            Event::Start(e) if local_name(e) == b"c" => {
                writer.write_event(Event::Start(renumber_cell(e, row.number)?))?;
            }
            Event::Empty(e) if local_name(e) == b"c" => {
                writer.write_event(Event::Empty(renumber_cell(e, row.number)?))?;
            }
            other => writer.write_event(other)?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element_name(&row.start)?)))?;
    Ok(())
}

/// Group id (`si`) of a shared formula element, `None` for other formulas
fn shared_group(f: &BytesStart<'_>) -> Result<Option<String>> {
    if attr_value(f, b"t")?.as_deref() != Some("shared") {
        return Ok(None);
    }
    attr_value(f, b"si")
}

/// Groups whose master formula (the one carrying `ref`) sits in `row`
fn shared_masters(row: &RowXml) -> Result<Vec<String>> {
    let mut groups = Vec::new();
    for event in &row.body {
        let (Event::Start(e) | Event::Empty(e)) = event else {
            continue;
        };
        if local_name(e) != b"f" || attr_value(e, b"ref")?.is_none() {
            continue;
        }
        if let Some(si) = shared_group(e)? {
            groups.push(si);
        }
    }
    Ok(groups)
}

/// Rewrite the formulas of one row after sheet row `deleted` is gone.
///
/// Shared master ranges shrink or shift; formulas of `orphaned` groups are
/// removed, leaving the cell's cached `<v>` in place.
fn shift_formulas(
    body: Vec<Event<'static>>,
    deleted: usize,
    orphaned: &[String],
) -> Result<Vec<Event<'static>>> {
    let mut out = Vec::with_capacity(body.len());
    let mut skip_depth = 0usize;

    for event in body {
        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                _ => {}
            }
            continue;
        }

        let (Event::Start(e) | Event::Empty(e)) = &event else {
            out.push(event);
            continue;
        };
        if local_name(e) != b"f" {
            out.push(event);
            continue;
        }
        let Some(si) = shared_group(e)? else {
            out.push(event);
            continue;
        };

        if orphaned.contains(&si) {
            if matches!(event, Event::Start(_)) {
                skip_depth = 1;
            }
            continue;
        }

        let shifted = attr_value(e, b"ref")?
            .and_then(|r| CellRange::parse(&r))
            .and_then(|range| range.without_row(deleted));
        let event = match (shifted, event) {
            (Some(range), Event::Start(e)) => Event::Start(with_attr(&e, "ref", &range.to_string())?),
            (Some(range), Event::Empty(e)) => Event::Empty(with_attr(&e, "ref", &range.to_string())?),
            (_, other) => other,
        };
        out.push(event);
    }

    Ok(out)
}

fn renumber_cell(cell: &BytesStart<'_>, row: usize) -> Result<BytesStart<'static>> {
    match attr_value(cell, b"r")? {
        Some(reference) => {
            let (col, _) = split_cell_ref(&reference)
                .with_context(|| format!("Invalid cell reference: {reference}"))?;
            with_attr(cell, "r", &format!("{col}{row}"))
        }
        None => Ok(cell.clone().into_owned()),
    }
}

fn row_number(row: &BytesStart<'_>, previous: usize) -> Result<usize> {
    match attr_value(row, b"r")? {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid row number: {value}")),
        None => Ok(previous + 1),
    }
}

/// Tag name without its namespace prefix (`x:row` -> `row`)
fn local_name<'a>(e: &'a BytesStart<'_>) -> &'a [u8] {
    e.local_name().into_inner()
}

fn element_name(e: &BytesStart<'_>) -> Result<String> {
    Ok(std::str::from_utf8(e.name().as_ref())?.to_string())
}

pub(crate) fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(unescape_attr(&attr.value)?));
        }
    }
    Ok(None)
}

/// Attribute text with XML entities resolved
pub(crate) fn unescape_attr(raw: &[u8]) -> Result<String> {
    Ok(unescape(std::str::from_utf8(raw)?)?.into_owned())
}

/// Copy of `e` with attribute `key` set to `value`
fn with_attr(e: &BytesStart<'_>, key: &str, value: &str) -> Result<BytesStart<'static>> {
    let mut out = BytesStart::new(element_name(e)?);
    let mut replaced = false;
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key.as_bytes() {
            out.push_attribute((key, value));
            replaced = true;
        } else {
            out.push_attribute(attr);
        }
    }
    if !replaced {
        out.push_attribute((key, value));
    }
    Ok(out)
}
