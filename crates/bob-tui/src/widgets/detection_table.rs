//! Recent-detections table: class, confidence, age and box.

use std::sync::Arc;

use ratatui::layout::Constraint;
use ratatui::style::Style;
use ratatui::text::Span;
use ratatui::widgets::{Block, BorderType, Borders, Cell, Row, Table};

use bob_core::{Detection, class_color, format_age};

use crate::theme;

/// Plain-text cells for one row.
pub fn row_cells(det: &Detection, now_ms: i64) -> [String; 4] {
    let b = det.bbox;
    [
        det.class_name.clone(),
        format!("{:.0}%", det.confidence * 100.0),
        format_age(det.age_ms(now_ms)),
        format!("{:.0},{:.0} {:.0}×{:.0}", b.x, b.y, b.width, b.height),
    ]
}

pub fn detection_table(rows: &[Arc<Detection>], now_ms: i64, focused: bool) -> Table<'static> {
    let header = Row::new(["Class", "Conf", "Age", "Box"]).style(theme::table_header());

    let body: Vec<Row<'static>> = rows
        .iter()
        .map(|det| {
            let [class, conf, age, bbox] = row_cells(det, now_ms);
            let swatch = theme::rgb(class_color(&det.class_name));
            Row::new([
                Cell::from(Span::styled(format!("■ {class}"), Style::default().fg(swatch))),
                Cell::from(conf),
                Cell::from(age),
                Cell::from(bbox),
            ])
            .style(theme::table_row())
        })
        .collect();

    let border = if focused {
        theme::border_focused()
    } else {
        theme::border_default()
    };

    Table::new(
        body,
        [
            Constraint::Min(14),
            Constraint::Length(5),
            Constraint::Length(4),
            Constraint::Min(16),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .title(format!(" Recent ({}) ", rows.len()))
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(border),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bob_core::BoundingBox;
    use pretty_assertions::assert_eq;

    #[test]
    fn cells_format_confidence_age_and_box() {
        let det = Detection {
            id: "1700000000000-0".into(),
            bbox: BoundingBox::new(10.0, 20.0, 30.4, 40.6),
            confidence: 0.926,
            class_name: "Robin".into(),
            timestamp_ms: 1_000,
        };
        assert_eq!(
            row_cells(&det, 13_500),
            [
                "Robin".to_owned(),
                "93%".to_owned(),
                "12s".to_owned(),
                "10,20 30×41".to_owned(),
            ]
        );
    }
}
