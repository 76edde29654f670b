use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use ndarray::ArrayView2;

/// Renders attention weights as a table with one row per query or decoding
/// step and one column per source position.
///
/// Cells are shaded by weight so the alignment reads like a heatmap on a
/// terminal. Masked positions show as dim zeros.
///
/// # Arguments
///
/// * `weights` - Weight matrix with shape (rows, positions)
/// * `row_labels` - One label per row
/// * `col_labels` - One label per position
pub fn heatmap_table(weights: ArrayView2<f32>, row_labels: &[String], col_labels: &[String]) -> Table {
    let mut header = vec![Cell::new("").fg(Color::Cyan).add_attribute(Attribute::Bold)];
    header.extend(
        col_labels
            .iter()
            .map(|label| Cell::new(label).fg(Color::Cyan).add_attribute(Attribute::Bold)),
    );

    let mut table = Table::new();
    table
        .set_header(header)
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    for (label, row) in row_labels.iter().zip(weights.outer_iter()) {
        let mut cells = vec![Cell::new(label).fg(Color::Yellow)];
        cells.extend(row.iter().map(|&w| {
            Cell::new(format!("{:.3}", w))
                .fg(shade(w))
                .set_alignment(CellAlignment::Right)
        }));
        table.add_row(cells);
    }

    table
}

/// Plain numeric table, e.g. for context vectors
pub fn matrix_table(values: ArrayView2<f32>, row_labels: &[String]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    for (label, row) in row_labels.iter().zip(values.outer_iter()) {
        let mut cells = vec![Cell::new(label).fg(Color::Yellow)];
        cells.extend(
            row.iter()
                .map(|&v| Cell::new(format!("{:+.4}", v)).set_alignment(CellAlignment::Right)),
        );
        table.add_row(cells);
    }

    table
}

/// Converts a matrix to nested vectors for JSON output
pub fn to_nested(values: ArrayView2<f32>) -> Vec<Vec<f32>> {
    values.outer_iter().map(|row| row.to_vec()).collect()
}

fn shade(weight: f32) -> Color {
    match weight {
        w if w == 0.0 => Color::DarkGrey,
        w if w < 0.1 => Color::Blue,
        w if w < 0.3 => Color::Cyan,
        w if w < 0.6 => Color::Green,
        _ => Color::Red,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_heatmap_contains_labels_and_weights() {
        let weights = array![[0.25, 0.75, 0.0]];
        let rows = vec!["q0".to_string()];
        let cols = vec!["k0".to_string(), "k1".to_string(), "k2".to_string()];

        let rendered = heatmap_table(weights.view(), &rows, &cols).to_string();

        assert!(rendered.contains("q0"));
        assert!(rendered.contains("k2"));
        assert!(rendered.contains("0.250"));
        assert!(rendered.contains("0.750"));
        assert!(rendered.contains("0.000"));
    }

    #[test]
    fn test_to_nested() {
        let values = array![[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(to_nested(values.view()), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_shade_buckets() {
        assert_eq!(shade(0.0), Color::DarkGrey);
        assert_eq!(shade(0.05), Color::Blue);
        assert_eq!(shade(0.9), Color::Red);
    }
}
