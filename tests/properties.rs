use annotate_mask::{
    Color4, DrawingConfig, Editor, ExportOptions, Point, Stroke, StrokeHistory, StrokeShape, Tool,
    ViewMetrics,
};
use image::{Rgba, RgbaImage};
use proptest::prelude::*;

fn eraser(points: Vec<(f64, f64)>, width: f64) -> Stroke {
    Stroke {
        tool: Tool::Eraser,
        color: Color4::default(),
        line_width: width,
        is_mask: true,
        shape: StrokeShape::Freehand {
            points: points.into_iter().map(Point::from).collect(),
        },
    }
}

fn commit_line(history: &mut StrokeHistory, y: f64) {
    let cfg = DrawingConfig::default();
    history.begin_stroke(Point::new(0.0, y), &cfg);
    history.extend_stroke(Point::new(10.0, y + 1.0));
    history.commit_stroke();
}

proptest! {
    #[test]
    fn prop_coordinate_round_trip(
        nw in 1u32..5000,
        nh in 1u32..5000,
        aw in 0.0f64..4000.0,
        ah in 0.0f64..4000.0,
        x in -2000.0f64..6000.0,
        y in -2000.0f64..6000.0,
    ) {
        let metrics = ViewMetrics::compute((nw, nh), (aw, ah), 1024.0, 0.98);
        prop_assert!(metrics.scale.is_finite() && metrics.scale > 0.0);

        let p = Point::new(x, y);
        let back = metrics.to_natural(metrics.to_display(p));
        prop_assert!((back.x - p.x).abs() < 1e-6 && (back.y - p.y).abs() < 1e-6);

        let d = Point::new(x, y);
        let again = metrics.to_display(metrics.to_natural(d));
        prop_assert!((again.x - d.x).abs() < 1e-6 && (again.y - d.y).abs() < 1e-6);
    }

    #[test]
    fn prop_undo_then_redo_restores_history(strokes in 1usize..12, undos in 0usize..12) {
        let mut history = StrokeHistory::default();
        for i in 0..strokes {
            commit_line(&mut history, i as f64);
        }
        let before = history.committed().to_vec();
        let undone = (0..undos).filter(|_| history.undo()).count();
        prop_assert_eq!(undone, undos.min(strokes));
        for _ in 0..undone {
            prop_assert!(history.redo());
        }
        prop_assert_eq!(history.committed(), before.as_slice());
        prop_assert!(!history.redo());
    }

    #[test]
    fn prop_commit_after_undo_clears_redo(strokes in 1usize..8, undos in 1usize..8) {
        let mut history = StrokeHistory::default();
        for i in 0..strokes {
            commit_line(&mut history, i as f64);
        }
        for _ in 0..undos {
            history.undo();
        }
        commit_line(&mut history, 99.0);
        prop_assert_eq!(history.redo_len(), 0);
        prop_assert!(!history.can_redo());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_mask_is_bilevel(
        lines in proptest::collection::vec(
            (proptest::collection::vec((-8.0f64..40.0, -8.0f64..30.0), 1..6), 0.5f64..12.0),
            0..5,
        ),
    ) {
        let mut editor = Editor::default();
        editor.load_image(RgbaImage::from_pixel(32, 24, Rgba([90, 160, 30, 255])));
        editor
            .replay(lines.into_iter().map(|(pts, w)| eraser(pts, w)).collect())
            .unwrap();
        let mask = editor
            .export_mask(&ExportOptions::png())
            .unwrap()
            .decode()
            .unwrap();
        prop_assert_eq!(mask.dimensions(), (32, 24));
        for px in mask.pixels() {
            prop_assert!(px.0 == [0, 0, 0, 255] || px.0 == [255, 255, 255, 255]);
        }
    }

    #[test]
    fn prop_resize_leaves_strokes_and_mask_alone(
        first in (50.0f64..2000.0, 50.0f64..2000.0),
        second in (0.0f64..2000.0, 0.0f64..2000.0),
    ) {
        let mut editor = Editor::default();
        editor.load_image(RgbaImage::from_pixel(40, 30, Rgba([255, 255, 255, 255])));
        editor.resize(first.0, first.1);
        editor.set_tool(Tool::Eraser);
        editor.set_line_width(5.0);
        let m = editor.metrics().unwrap();
        editor.pointer_down(m.to_display(Point::new(5.0, 5.0)));
        editor.pointer_move(m.to_display(Point::new(30.0, 20.0)));
        editor.pointer_up();

        let strokes = editor.history().committed().to_vec();
        let mask = editor.export_mask(&ExportOptions::png()).unwrap();

        editor.resize(second.0, second.1);
        prop_assert_eq!(editor.history().committed(), strokes.as_slice());
        prop_assert_eq!(editor.export_mask(&ExportOptions::png()).unwrap(), mask);
    }
}
