use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use subval_model::{ErrorType, Release, Report, ReportState};

/// Sample lines and values shown per error row.
const SAMPLE_LIMIT: usize = 5;
const REPORT_WIDTH: u16 = 120;
const ERROR_WIDTH: u16 = 180;

pub fn print_report(report: &Report) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Data type"),
        header_cell("File"),
        header_cell("State"),
        header_cell("Columns"),
        header_cell("Errors"),
    ]);
    apply_grid_style(&mut table, REPORT_WIDTH);
    align_column(&mut table, 2, CellAlignment::Center);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Right);
    for data_type_report in &report.data_type_reports {
        let mut first = true;
        for file in data_type_report.files() {
            let data_type_cell = if first {
                Cell::new(data_type_report.data_type)
                    .fg(Color::Blue)
                    .add_attribute(Attribute::Bold)
            } else {
                dim_cell("")
            };
            first = false;
            table.add_row(vec![
                data_type_cell,
                Cell::new(&file.file_name),
                state_cell(file.state),
                Cell::new(file.field_reports.len()),
                count_cell(file.error_count()),
            ]);
        }
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(format!("{} files", report.files().count())).add_attribute(Attribute::Bold),
        overall_cell(report),
        dim_cell("-"),
        count_cell(report.error_count()).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
    print_error_table(report);
}

fn print_error_table(report: &Report) {
    let mut rows = Vec::new();
    for file in report.files() {
        for error_report in &file.error_reports {
            for field_report in &error_report.field_error_reports {
                rows.push((file.file_name.as_str(), error_report.error_type, field_report));
            }
        }
    }
    if rows.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("File"),
        header_cell("Error"),
        header_cell("Fields"),
        header_cell("Count"),
        header_cell("Lines"),
        header_cell("Values"),
        header_cell("Description"),
    ]);
    apply_grid_style(&mut table, ERROR_WIDTH);
    align_column(&mut table, 3, CellAlignment::Right);
    for (file_name, error_type, field_report) in rows {
        let fields = if field_report.field_names.is_empty() {
            "-".to_string()
        } else {
            field_report.field_names.join(", ")
        };
        table.add_row(vec![
            Cell::new(file_name),
            error_cell(error_type),
            Cell::new(fields),
            Cell::new(field_report.count).fg(Color::Red),
            Cell::new(sample(field_report.line_numbers.iter().map(u64::to_string))),
            Cell::new(sample(field_report.values.iter().cloned())),
            dim_cell(error_type.description()),
        ]);
    }
    println!();
    println!("Errors:");
    println!("{table}");
}

pub fn print_release(release: &Release) {
    println!("Release: {}", release.name);
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Project"),
        header_cell("State"),
        header_cell("Errors"),
        header_cell("Last updated"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    for (project_key, submission) in &release.submissions {
        table.add_row(vec![
            Cell::new(project_key)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(submission.state),
            count_cell(submission.report.error_count()),
            dim_cell(submission.last_updated.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    println!("{table}");
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

/// Full grid used for the report tables; the error table is wider.
fn apply_grid_style(table: &mut Table, width: u16) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(width);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn sample(values: impl Iterator<Item = String>) -> String {
    let mut values: Vec<String> = values.take(SAMPLE_LIMIT + 1).collect();
    if values.len() > SAMPLE_LIMIT {
        values.truncate(SAMPLE_LIMIT);
        values.push("...".to_string());
    }
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(", ")
    }
}

fn state_label(state: ReportState) -> &'static str {
    match state {
        ReportState::Error => "ERROR",
        ReportState::Invalid => "INVALID",
        ReportState::Validating => "VALIDATING",
        ReportState::Queued => "QUEUED",
        ReportState::NotValidated => "NOT_VALIDATED",
        ReportState::Valid => "VALID",
    }
}

fn state_cell(state: ReportState) -> Cell {
    let cell = Cell::new(state_label(state));
    match state {
        ReportState::Valid => cell.fg(Color::Green),
        ReportState::Invalid | ReportState::Error => cell.fg(Color::Red).add_attribute(Attribute::Bold),
        _ => cell.fg(Color::DarkGrey),
    }
}

fn overall_cell(report: &Report) -> Cell {
    if report.is_valid() {
        state_cell(ReportState::Valid)
    } else if report.has_errors() {
        state_cell(ReportState::Invalid)
    } else {
        state_cell(ReportState::NotValidated)
    }
}

fn error_cell(error_type: ErrorType) -> Cell {
    match error_type {
        ErrorType::MissingFile | ErrorType::TooManyFiles | ErrorType::FileHeader => {
            Cell::new(error_type).fg(Color::Magenta)
        }
        _ => Cell::new(error_type).fg(Color::Red),
    }
}

fn count_cell(count: u64) -> Cell {
    if count > 0 {
        Cell::new(count).fg(Color::Red).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
