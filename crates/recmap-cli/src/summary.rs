use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use recmap_cli::types::TableSummary;

pub fn print_check(tables: &[TableSummary]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Table"),
        header_cell("Layout"),
        header_cell("Klasses"),
        header_cell("Columns"),
        header_cell("Header"),
        header_cell("Footer"),
    ]);
    apply_table_style(&mut table);
    for index in 3..6 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for summary in tables {
        table.add_row(vec![
            Cell::new(&summary.name).add_attribute(Attribute::Bold),
            Cell::new(summary.layout),
            Cell::new(summary.klasses.join(", ")),
            Cell::new(summary.columns),
            line_count_cell(summary.header_lines),
            line_count_cell(summary.footer_lines),
        ]);
    }
    println!("{table}");
    println!("{} table(s) valid", tables.len());
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn line_count_cell(count: usize) -> Cell {
    if count == 0 {
        Cell::new("-").fg(Color::DarkGrey)
    } else {
        Cell::new(count)
    }
}
