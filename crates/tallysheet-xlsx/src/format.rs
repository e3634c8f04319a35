//! Template cell formats
//!
//! calamine reads values and formulas only, so the formatting of the template
//! sheet is read straight from the package parts: the first worksheet listed
//! in `xl/workbook.xml`, the style index of each of its cells, its custom
//! column widths, and the number formats, fonts, fills and alignments of
//! `xl/styles.xml`.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tallysheet_core::CellRef;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::WorkbookError;

// ============================================================================
// Formats
// ============================================================================

/// Number format of a cell
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NumberFormat {
    /// Predefined format, by index (`3` is `#,##0`, `10` is `0.00%`)
    BuiltIn(u8),
    Custom(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HorizontalAlign {
    General,
    Left,
    Center,
    Right,
    Fill,
    Justify,
    CenterAcross,
    Distributed,
}

impl HorizontalAlign {
    fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "general" => Self::General,
            "left" => Self::Left,
            "center" => Self::Center,
            "right" => Self::Right,
            "fill" => Self::Fill,
            "justify" => Self::Justify,
            "centerContinuous" => Self::CenterAcross,
            "distributed" => Self::Distributed,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerticalAlign {
    Top,
    Center,
    Bottom,
    Justify,
    Distributed,
}

impl VerticalAlign {
    fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "top" => Self::Top,
            "center" => Self::Center,
            "bottom" => Self::Bottom,
            "justify" => Self::Justify,
            "distributed" => Self::Distributed,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Font {
    pub name: Option<String>,
    pub size: Option<f64>,
    /// RGB
    pub color: Option<u32>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

/// Formatting a template cell carries into the report
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellFormat {
    pub number_format: Option<NumberFormat>,
    /// `None` is the workbook default font
    pub font: Option<Font>,
    /// Solid fill colour, RGB
    pub fill: Option<u32>,
    pub horizontal: Option<HorizontalAlign>,
    pub vertical: Option<VerticalAlign>,
    pub wrap: bool,
}

impl CellFormat {
    pub fn is_default(&self) -> bool {
        *self == CellFormat::default()
    }

    /// This format copied onto another cell of its column.
    ///
    /// Font, alignment and number format follow `self`; the fill stays the
    /// target cell's own.
    pub fn copied_onto(&self, own: Option<&CellFormat>) -> CellFormat {
        CellFormat {
            fill: own.and_then(|f| f.fill),
            ..self.clone()
        }
    }
}

/// Formats of one worksheet
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SheetFormats {
    pub cells: BTreeMap<CellRef, CellFormat>,
    /// Custom column widths as stored in the sheet, in character units
    /// including cell padding
    pub column_widths: BTreeMap<u16, f64>,
}

impl SheetFormats {
    pub fn get(&self, cell: CellRef) -> Option<&CellFormat> {
        self.cells.get(&cell)
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Read the formats of the first worksheet of an xlsx workbook.
pub fn read_sheet_formats(path: &Path) -> Result<SheetFormats, WorkbookError> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))?;

    let workbook = read_part(&mut archive, "xl/workbook.xml")?;
    let rels = read_part(&mut archive, "xl/_rels/workbook.xml.rels")?;
    let sheet_part = first_sheet_part(&workbook, &rels)?
        .ok_or_else(|| WorkbookError::NoWorksheet(path.to_path_buf()))?;

    let styles = match read_part(&mut archive, "xl/styles.xml") {
        Ok(xml) => parse_styles(&xml)?,
        Err(WorkbookError::Zip(ZipError::FileNotFound)) => Vec::new(),
        Err(e) => return Err(e),
    };
    let formats = parse_sheet(&read_part(&mut archive, &sheet_part)?, &styles)?;

    debug!(
        path = %path.display(),
        part = %sheet_part,
        styles = styles.len(),
        cells = formats.cells.len(),
        widths = formats.column_widths.len(),
        "read template formats"
    );
    Ok(formats)
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<String, WorkbookError> {
    let mut part = archive.by_name(name)?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)?;
    Ok(xml)
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, WorkbookError> {
    for a in e.attributes().with_checks(false) {
        let a = a?;
        if a.key.local_name().as_ref() == name {
            return Ok(Some(a.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn parsed_attr<T: std::str::FromStr>(
    e: &BytesStart<'_>,
    name: &[u8],
) -> Result<Option<T>, WorkbookError> {
    Ok(attr(e, name)?.and_then(|v| v.trim().parse().ok()))
}

/// Boolean attribute; absent reads as `default`
fn flag(e: &BytesStart<'_>, name: &[u8], default: bool) -> Result<bool, WorkbookError> {
    Ok(match attr(e, name)? {
        Some(v) => {
            let v = v.trim();
            v == "1" || v.eq_ignore_ascii_case("true")
        }
        None => default,
    })
}

/// `rgb="FFF2F2F2"` as RGB; theme and indexed colours are not resolved
fn rgb(e: &BytesStart<'_>) -> Result<Option<u32>, WorkbookError> {
    Ok(attr(e, b"rgb")?.and_then(|argb| {
        let hex = argb.get(argb.len().saturating_sub(6)..)?;
        u32::from_str_radix(hex, 16).ok()
    }))
}

/// Package path of the first worksheet, from the workbook part and its rels
pub(crate) fn first_sheet_part(
    workbook_xml: &str,
    rels_xml: &str,
) -> Result<Option<String>, WorkbookError> {
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    let mut id = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                id = attr(&e, b"id")?;
                break;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    let Some(id) = id else {
        return Ok(None);
    };

    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attr(&e, b"Id")?.as_deref() != Some(id.as_str()) {
                    continue;
                }
                return Ok(attr(&e, b"Target")?.map(|target| match target.strip_prefix('/') {
                    Some(absolute) => absolute.to_string(),
                    None => format!("xl/{target}"),
                }));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Other,
    NumFmts,
    Fonts,
    Fills,
    CellXfs,
}

#[derive(Clone, Debug, Default)]
struct Xf {
    num_fmt: u32,
    font: usize,
    fill: usize,
    horizontal: Option<HorizontalAlign>,
    vertical: Option<VerticalAlign>,
    wrap: bool,
}

fn font_property(font: &mut Font, e: &BytesStart<'_>) -> Result<(), WorkbookError> {
    match e.local_name().as_ref() {
        b"b" => font.bold = flag(e, b"val", true)?,
        b"i" => font.italic = flag(e, b"val", true)?,
        b"u" => font.underline = attr(e, b"val")?.as_deref() != Some("none"),
        b"sz" => font.size = parsed_attr(e, b"val")?,
        b"name" => font.name = attr(e, b"val")?,
        b"color" => font.color = rgb(e)?,
        _ => {}
    }
    Ok(())
}

/// Cell formats of a styles part, indexed like the `s` attribute of cells
pub(crate) fn parse_styles(xml: &str) -> Result<Vec<CellFormat>, WorkbookError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut section = Section::Other;
    let mut custom: BTreeMap<u32, String> = BTreeMap::new();
    let mut fonts: Vec<Font> = Vec::new();
    let mut fills: Vec<Option<u32>> = Vec::new();
    let mut solid = false;
    let mut xfs: Vec<Xf> = Vec::new();

    loop {
        let (e, empty) = match reader.read_event()? {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::End(e) => {
                if matches!(
                    e.local_name().as_ref(),
                    b"numFmts" | b"fonts" | b"fills" | b"cellXfs"
                ) {
                    section = Section::Other;
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        match (section, e.local_name().as_ref()) {
            (_, b"numFmts") if !empty => section = Section::NumFmts,
            (_, b"fonts") if !empty => section = Section::Fonts,
            (_, b"fills") if !empty => section = Section::Fills,
            (_, b"cellXfs") if !empty => section = Section::CellXfs,
            (Section::NumFmts, b"numFmt") => {
                if let (Some(id), Some(code)) =
                    (parsed_attr(&e, b"numFmtId")?, attr(&e, b"formatCode")?)
                {
                    custom.insert(id, code);
                }
            }
            (Section::Fonts, b"font") => fonts.push(Font::default()),
            (Section::Fonts, _) => {
                if let Some(font) = fonts.last_mut() {
                    font_property(font, &e)?;
                }
            }
            (Section::Fills, b"fill") => fills.push(None),
            (Section::Fills, b"patternFill") => {
                solid = attr(&e, b"patternType")?.as_deref() == Some("solid");
            }
            (Section::Fills, b"fgColor") if solid => {
                if let Some(fill) = fills.last_mut() {
                    *fill = rgb(&e)?;
                }
            }
            (Section::CellXfs, b"xf") => xfs.push(Xf {
                num_fmt: parsed_attr(&e, b"numFmtId")?.unwrap_or(0),
                font: parsed_attr(&e, b"fontId")?.unwrap_or(0),
                fill: parsed_attr(&e, b"fillId")?.unwrap_or(0),
                ..Xf::default()
            }),
            (Section::CellXfs, b"alignment") => {
                if let Some(xf) = xfs.last_mut() {
                    xf.horizontal = attr(&e, b"horizontal")?
                        .as_deref()
                        .and_then(HorizontalAlign::parse);
                    xf.vertical = attr(&e, b"vertical")?
                        .as_deref()
                        .and_then(VerticalAlign::parse);
                    xf.wrap = flag(&e, b"wrapText", false)?;
                }
            }
            _ => {}
        }
    }

    Ok(xfs
        .into_iter()
        .map(|xf| CellFormat {
            number_format: match custom.get(&xf.num_fmt) {
                Some(code) => Some(NumberFormat::Custom(code.clone())),
                None if xf.num_fmt == 0 => None,
                None => u8::try_from(xf.num_fmt).ok().map(NumberFormat::BuiltIn),
            },
            // Font 0 is the workbook default
            font: (xf.font > 0).then(|| fonts.get(xf.font).cloned()).flatten(),
            fill: fills.get(xf.fill).copied().flatten(),
            horizontal: xf.horizontal,
            vertical: xf.vertical,
            wrap: xf.wrap,
        })
        .collect())
}

/// Cell formats and column widths of a worksheet part
pub(crate) fn parse_sheet(
    xml: &str,
    styles: &[CellFormat],
) -> Result<SheetFormats, WorkbookError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut formats = SheetFormats::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"col" => {
                    if !flag(&e, b"customWidth", false)? {
                        continue;
                    }
                    let min: Option<u16> = parsed_attr(&e, b"min")?;
                    let max: Option<u16> = parsed_attr(&e, b"max")?;
                    let width: Option<f64> = parsed_attr(&e, b"width")?;
                    if let (Some(min), Some(max), Some(width)) = (min, max, width) {
                        for col in min.max(1)..=max {
                            formats.column_widths.insert(col - 1, width);
                        }
                    }
                }
                b"c" => {
                    let cell = attr(&e, b"r")?.and_then(|r| CellRef::parse_a1(&r));
                    let style: Option<usize> = parsed_attr(&e, b"s")?;
                    if let (Some(cell), Some(style)) = (cell, style) {
                        if let Some(format) = styles.get(style).filter(|f| !f.is_default()) {
                            formats.cells.insert(cell, format.clone());
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(formats)
}
