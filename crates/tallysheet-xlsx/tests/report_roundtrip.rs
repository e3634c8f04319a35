//! End-to-end: xlsx template and export in, formatted report out

use pretty_assertions::assert_eq;
use rust_xlsxwriter::{Format, Workbook};
use std::collections::BTreeMap;
use std::path::Path;
use tallysheet_core::{CellRef, CellValue};
use tallysheet_engine::{ColumnSemantics, EngineConfig, GroupingConfig, ReportPipeline};
use tallysheet_xlsx::{
    load_records, load_template, prepare_output, read_sheet_formats, save_atomic, ReportWriter,
    StyleConfig, StylePlan, WorkbookError,
};
use tallysheet_xlsx::format::NumberFormat;

fn write_template(path: &Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Template").unwrap();
    sheet.write_string(0, 0, "<icon>").unwrap();
    sheet.write_string(1, 1, "Delivery report").unwrap();
    sheet.write_string(3, 1, "<header_start>").unwrap();
    sheet.write_string(4, 1, "<data_start>").unwrap();
    sheet.write_string(4, 4, "<data_end>").unwrap();
    sheet.write_string(4, 0, "<order_id>").unwrap();
    workbook.save(path).unwrap();
}

/// Template with a styled header, number formats on the data row and a wide
/// first column
fn write_formatted_template(path: &Path) {
    let header = Format::new().set_bold().set_background_color(0xDDEBF7);
    let thousands = Format::new().set_num_format("#,##0.0");
    let percent = Format::new().set_num_format("0.0%");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Template").unwrap();
    sheet.set_column_width(1, 30).unwrap();
    sheet.write_string(0, 0, "<icon>").unwrap();
    sheet
        .write_string_with_format(3, 1, "<header_start>", &header)
        .unwrap();
    sheet.write_string(4, 1, "<data_start>").unwrap();
    sheet.write_blank(4, 2, &thousands).unwrap();
    sheet
        .write_string_with_format(4, 4, "<data_end>", &percent)
        .unwrap();
    sheet.write_string(4, 0, "<order_id>").unwrap();
    workbook.save(path).unwrap();
}

fn write_export(path: &Path, rows: &[(&str, f64, f64)]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Report data").unwrap();
    for (col, header) in ["Name", "Impressions", "Clicks", "CTR"].iter().enumerate() {
        sheet.write_string(0, col as u16, *header).unwrap();
    }
    for (i, (name, impressions, clicks)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, *name).unwrap();
        sheet.write_number(row, 1, *impressions).unwrap();
        sheet.write_number(row, 2, *clicks).unwrap();
        sheet.write_number(row, 3, clicks / impressions).unwrap();
    }
    workbook.save(path).unwrap();
}

fn engine_config() -> EngineConfig {
    EngineConfig {
        grouping: GroupingConfig {
            line_item: "Name".into(),
            ..GroupingConfig::default()
        },
        semantics: ColumnSemantics {
            ratio: vec!["CTR".into()],
            count: vec!["Impressions".into(), "Clicks".into()],
            label: vec!["Name".into()],
            ..ColumnSemantics::default()
        },
    }
}

fn cell(a1: &str) -> CellRef {
    CellRef::parse_a1(a1).unwrap()
}

#[test]
fn report_survives_a_round_trip_through_xlsx() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = dir.path().join("template.xlsx");
    let export_path = dir.path().join("export.xlsx");
    let output_path = dir.path().join("out").join("formatted_export.xlsx");

    write_template(&template_path);
    write_export(
        &export_path,
        &[
            ("ORD-5-2-1 a", 100.0, 5.0),
            ("ORD-5-2-1 b", 200.0, 10.0),
            ("ORD-5-2-2 c", 50.0, 1.0),
        ],
    );

    let mut template = load_template(&template_path).unwrap();
    assert_eq!(template.sheet_name, "Template");
    let records = load_records(&export_path, "Report data").unwrap();
    assert_eq!(records.len(), 3);

    let pipeline = ReportPipeline::new(engine_config()).unwrap();
    let placeholders = BTreeMap::from([("order_id".to_string(), CellValue::from("ORD-5"))]);
    let outcome = pipeline
        .run(&mut template.grid, &records, &placeholders)
        .unwrap();

    let plan = StylePlan::build(
        &template.grid,
        &outcome,
        &StyleConfig::default(),
        &template.formats,
    );
    let bytes = ReportWriter::new(&template.sheet_name, &plan)
        .to_bytes(&template.grid)
        .unwrap();
    prepare_output(&output_path, false).unwrap();
    save_atomic(&output_path, &bytes).unwrap();

    let report = load_template(&output_path).unwrap();
    let grid = &report.grid;
    assert_eq!(grid.get(cell("C4")), &CellValue::from("Impressions"));
    assert_eq!(grid.get(cell("B5")), &CellValue::from("ORD-5-2-1 a"));
    assert_eq!(grid.get(cell("C7")), &CellValue::Formula("=SUM(C5:C6)".into()));
    assert_eq!(grid.get(cell("E7")), &CellValue::Formula("=D7/C7".into()));
    assert_eq!(grid.get(cell("C11")), &CellValue::Formula("=C7+C9".into()));
    assert_eq!(grid.get(cell("B7")), &CellValue::from("Total"));
    assert_eq!(grid.get(cell("B11")), &CellValue::from("TOTAL"));
    assert_eq!(grid.get(cell("A5")), &CellValue::from("ORD-5"));
    // Tags are gone, including the icon marker
    assert_eq!(grid.get(cell("A1")), &CellValue::Empty);
    assert_eq!(grid.get(cell("B12")), &CellValue::Empty);
}

#[test]
fn order_block_is_merged_down_the_report() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = dir.path().join("template.xlsx");
    let export_path = dir.path().join("export.xlsx");
    write_template(&template_path);
    write_export(&export_path, &[("ORD-5-2-1 a", 100.0, 5.0)]);

    let mut template = load_template(&template_path).unwrap();
    let records = load_records(&export_path, "Report data").unwrap();
    let placeholders = BTreeMap::from([("order_id".to_string(), CellValue::from("ORD-5"))]);
    let outcome = ReportPipeline::new(engine_config())
        .unwrap()
        .run(&mut template.grid, &records, &placeholders)
        .unwrap();

    let plan = StylePlan::build(
        &template.grid,
        &outcome,
        &StyleConfig::default(),
        &template.formats,
    );
    let block = plan.merge_at(cell("A5")).unwrap();
    assert_eq!(block.last, CellRef::new(outcome.extent.end.row, 0));
    assert!(plan.style_of(cell("A5")).vertical);
    // Total bar is filled
    let bar = CellRef::new(outcome.extent.end.row, 1);
    assert_eq!(plan.style_of(bar).fill, Some(0xF2F2F2));
}

#[test]
fn missing_record_sheet_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let export_path = dir.path().join("export.xlsx");
    write_export(&export_path, &[]);

    match load_records(&export_path, "Other") {
        Err(WorkbookError::MissingSheet { sheet, .. }) => assert_eq!(sheet, "Other"),
        other => panic!("expected MissingSheet, got {other:?}"),
    }
}

#[test]
fn header_only_export_has_no_records() {
    let dir = tempfile::tempdir().unwrap();
    let export_path = dir.path().join("export.xlsx");
    write_export(&export_path, &[]);

    let records = load_records(&export_path, "Report data").unwrap();
    assert!(records.is_empty());
    assert_eq!(records.columns, vec!["Name", "Impressions", "Clicks", "CTR"]);
}

#[test]
fn template_formats_carry_into_the_report() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = dir.path().join("template.xlsx");
    let export_path = dir.path().join("export.xlsx");
    let output_path = dir.path().join("formatted_export.xlsx");
    write_formatted_template(&template_path);
    write_export(
        &export_path,
        &[
            ("ORD-5-2-1 a", 1000.0, 5.0),
            ("ORD-5-2-1 b", 2000.0, 10.0),
            ("ORD-5-2-2 c", 500.0, 1.0),
        ],
    );

    let mut template = load_template(&template_path).unwrap();
    let thousands = Some(NumberFormat::Custom("#,##0.0".into()));
    let percent = Some(NumberFormat::Custom("0.0%".into()));
    assert_eq!(
        template.formats.get(cell("C5")).unwrap().number_format,
        thousands
    );

    let records = load_records(&export_path, "Report data").unwrap();
    let outcome = ReportPipeline::new(engine_config())
        .unwrap()
        .run(&mut template.grid, &records, &BTreeMap::new())
        .unwrap();
    let plan = StylePlan::build(
        &template.grid,
        &outcome,
        &StyleConfig::default(),
        &template.formats,
    );
    let bytes = ReportWriter::new(&template.sheet_name, &plan)
        .to_bytes(&template.grid)
        .unwrap();
    save_atomic(&output_path, &bytes).unwrap();

    let report = read_sheet_formats(&output_path).unwrap();
    let format = |a1: &str| report.get(cell(a1)).cloned().unwrap_or_default();

    // Data, subtotal and total rows all take the first data row's format
    for a1 in ["C5", "C6", "C7", "C9", "C11"] {
        assert_eq!(format(a1).number_format, thousands, "{a1}");
    }
    for a1 in ["E5", "E7", "E11"] {
        assert_eq!(format(a1).number_format, percent, "{a1}");
    }
    assert!(format("C7").font.unwrap().bold);

    let header = format("B4");
    assert_eq!(header.fill, Some(0xDDEBF7));
    assert!(header.font.unwrap().bold);

    assert_eq!(
        report.column_widths.get(&1),
        template.formats.column_widths.get(&1)
    );
    assert!(report.column_widths.contains_key(&1));
}
