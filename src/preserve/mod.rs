//! Style-preserving row deletion on an xlsx package.
//!
//! Only the target worksheet part is rewritten. Every other part of the
//! package (styles, shared strings, themes, other sheets) is copied
//! byte for byte, so fonts, fills, borders and widths survive.

mod sheet;

use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::filter::RowDeletionSet;

use self::sheet::{attr_value, unescape_attr, SheetXml};

const ROOT_RELS: &str = "_rels/.rels";
const CONTENT_TYPES: &str = "[Content_Types].xml";
const DEFAULT_WORKBOOK: &str = "xl/workbook.xml";
const OFFICE_DOCUMENT_REL: &str = "/officeDocument";
const CALC_CHAIN_REL: &str = "/calcChain";

/// An xlsx package opened for editing one worksheet
pub struct WorkbookPackage {
    source: Vec<u8>,
    sheet_name: String,
    sheet_part: String,
    sheet: SheetXml,
    workbook_rels: String,
    calc_chain: Option<String>,
    rows_shifted: bool,
}

impl WorkbookPackage {
    /// Load the package at `path` and parse the worksheet called `sheet_name`
    pub fn open(path: &Path, sheet_name: &str) -> Result<Self> {
        let source = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_bytes(source, sheet_name)
    }

    pub fn from_bytes(source: Vec<u8>, sheet_name: &str) -> Result<Self> {
        let mut archive =
            ZipArchive::new(Cursor::new(source.as_slice())).context("Not an xlsx package")?;

        let workbook = read_part(&mut archive, ROOT_RELS)?
            .map(|rels| find_relationship(&rels, |rel| rel.kind.ends_with(OFFICE_DOCUMENT_REL)))
            .transpose()?
            .flatten()
            .map(|rel| resolve_target("", &rel.target))
            .unwrap_or_else(|| DEFAULT_WORKBOOK.to_string());
        let workbook_rels = rels_path_for(&workbook);

        let workbook_xml = read_part(&mut archive, &workbook)?
            .ok_or_else(|| anyhow!("Missing workbook part {workbook}"))?;
        let rels_xml = read_part(&mut archive, &workbook_rels)?
            .ok_or_else(|| anyhow!("Missing relationships part {workbook_rels}"))?;

        let rel_id = sheet_relationship_id(&workbook_xml, sheet_name)?
            .ok_or_else(|| anyhow!("Sheet not found: {sheet_name}"))?;
        let base = parent_dir(&workbook);
        let sheet_part = find_relationship(&rels_xml, |rel| rel.id == rel_id)?
            .map(|rel| resolve_target(base, &rel.target))
            .ok_or_else(|| anyhow!("No part for relationship {rel_id}"))?;
        let calc_chain = find_relationship(&rels_xml, |rel| rel.kind.ends_with(CALC_CHAIN_REL))?
            .map(|rel| resolve_target(base, &rel.target));

        let sheet_xml = read_part(&mut archive, &sheet_part)?
            .ok_or_else(|| anyhow!("Missing worksheet part {sheet_part}"))?;
        let sheet = SheetXml::parse(&sheet_xml)
            .with_context(|| format!("Failed to parse {sheet_part}"))?;

        debug!(
            sheet = sheet_name,
            part = %sheet_part,
            rows = sheet.row_numbers().count(),
            merges = sheet.merges().len(),
            "opened worksheet part"
        );
        drop(archive);

        Ok(Self {
            source,
            sheet_name: sheet_name.to_string(),
            sheet_part,
            sheet,
            workbook_rels,
            calc_chain,
            rows_shifted: false,
        })
    }

    /// Path of the worksheet part inside the package
    pub fn sheet_part(&self) -> &str {
        &self.sheet_part
    }

    /// Highest row number still present on the sheet
    pub fn last_row(&self) -> usize {
        self.sheet.last_row()
    }

    /// Delete the given sheet rows, highest first, shifting the rest up.
    ///
    /// Returns how many of the rows were present on the sheet. Rows with no
    /// XML element still shift everything below them.
    pub fn delete_rows(&mut self, rows: &RowDeletionSet) -> Result<usize> {
        let present: Vec<usize> = self.sheet.row_numbers().collect();
        let mut deleted = 0;
        for row in rows.descending() {
            if present.contains(&row) {
                deleted += 1;
            }
            self.sheet.delete_row(row)?;
            self.rows_shifted = true;
        }
        debug!(sheet = %self.sheet_name, deleted, "deleted worksheet rows");
        Ok(deleted)
    }

    /// Write the edited package.
    ///
    /// Once rows have moved the calculation chain is stale, so it is dropped
    /// along with its relationship and content type entry; Excel rebuilds it.
    pub fn write_to<W: Write + Seek>(&self, out: W) -> Result<()> {
        let mut archive = ZipArchive::new(Cursor::new(self.source.as_slice()))?;
        let mut writer = ZipWriter::new(out);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let drop_calc_chain = self.rows_shifted && self.calc_chain.is_some();
        let calc_chain = self.calc_chain.as_deref().unwrap_or_default();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();

            let replacement = if name == self.sheet_part {
                Some(self.sheet.to_bytes()?)
            } else if drop_calc_chain && name == calc_chain {
                debug!(part = %name, "dropping calculation chain");
                continue;
            } else if drop_calc_chain && name == CONTENT_TYPES {
                let xml = read_all(&mut file)?;
                let part_name = format!("/{calc_chain}");
                Some(strip_elements(&xml, |e| {
                    Ok(e.local_name().as_ref() == b"Override"
                        && attr_value(e, b"PartName")?.as_deref() == Some(part_name.as_str()))
                })?)
            } else if drop_calc_chain && name == self.workbook_rels {
                let xml = read_all(&mut file)?;
                Some(strip_elements(&xml, |e| {
                    Ok(e.local_name().as_ref() == b"Relationship"
                        && attr_value(e, b"Type")?.is_some_and(|t| t.ends_with(CALC_CHAIN_REL)))
                })?)
            } else {
                None
            };

            match replacement {
                Some(bytes) => {
                    writer.start_file(name.as_str(), options)?;
                    writer.write_all(&bytes)?;
                }
                None => writer.raw_copy_file(file)?,
            }
        }

        writer.finish()?;
        Ok(())
    }
}

struct Relationship {
    id: String,
    kind: String,
    target: String,
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<Vec<u8>>> {
    match archive.by_name(name) {
        Ok(mut file) => Ok(Some(read_all(&mut file)?)),
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to open {name}")),
    }
}

fn read_all<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}

/// First `<Relationship>` in a .rels part that satisfies `pred`
fn find_relationship<F>(xml: &[u8], pred: F) -> Result<Option<Relationship>>
where
    F: Fn(&Relationship) -> bool,
{
    let mut reader = Reader::from_reader(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let rel = Relationship {
                    id: attr_value(&e, b"Id")?.unwrap_or_default(),
                    kind: attr_value(&e, b"Type")?.unwrap_or_default(),
                    target: attr_value(&e, b"Target")?.unwrap_or_default(),
                };
                if pred(&rel) {
                    return Ok(Some(rel));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Relationship id (`r:id`) of the sheet named `name` in workbook.xml
fn sheet_relationship_id(xml: &[u8], name: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_reader(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                if attr_value(&e, b"name")?.as_deref() != Some(name) {
                    continue;
                }
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.local_name().as_ref() == b"id" {
                        return Ok(Some(unescape_attr(&attr.value)?));
                    }
                }
                return Ok(None);
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Copy `xml`, leaving out every element for which `drop` is true
fn strip_elements<F>(xml: &[u8], drop: F) -> Result<Vec<u8>>
where
    F: Fn(&BytesStart<'_>) -> Result<bool>,
{
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::new());
    let mut skip_depth = 0usize;

    loop {
        let event = reader.read_event()?;
        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }
        let dropped = match &event {
            Event::Start(e) | Event::Empty(e) => drop(e)?,
            Event::Eof => break,
            _ => false,
        };
        if dropped {
            if matches!(event, Event::Start(_)) {
                skip_depth = 1;
            }
            continue;
        }
        writer.write_event(event)?;
    }

    Ok(writer.into_inner())
}

fn parent_dir(part: &str) -> &str {
    part.rfind('/').map(|pos| &part[..pos]).unwrap_or("")
}

/// `xl/workbook.xml` -> `xl/_rels/workbook.xml.rels`
fn rels_path_for(part: &str) -> String {
    match part.rfind('/') {
        Some(pos) => format!("{}/_rels/{}.rels", &part[..pos], &part[pos + 1..]),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the directory of its source part
fn resolve_target(base: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None if base.is_empty() => target.to_string(),
        None => format!("{base}/{target}"),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
