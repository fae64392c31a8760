use dwell_metrics::core_modules::detection::Prediction;
use opencv::{
    core::{self, Mat, Point, Rect, Scalar},
    imgproc,
    prelude::*,
};

const PANEL_WIDTH: i32 = 380;
const LINE_HEIGHT: i32 = 22;
const BOX_COLOR: (f64, f64, f64) = (0.0, 200.0, 0.0);

/// Draws each prediction's box and label onto `frame`.
pub fn markup_image(frame: &mut Mat, predictions: &[Prediction]) -> opencv::Result<()> {
    let color = Scalar::new(BOX_COLOR.0, BOX_COLOR.1, BOX_COLOR.2, 0.0);
    for prediction in predictions {
        let b = &prediction.bbox;
        let rect = Rect::new(
            b.start_x as i32,
            b.start_y as i32,
            b.width() as i32,
            b.height() as i32,
        );
        imgproc::rectangle(frame, rect, color, 2, imgproc::LINE_8, 0)?;
        let origin = Point::new(rect.x, (rect.y - 6).max(12));
        imgproc::put_text(
            frame,
            &prediction.label,
            origin,
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.5,
            color,
            1,
            imgproc::LINE_8,
            false,
        )?;
    }
    Ok(())
}

/// Returns `frame` with a white text panel appended on its right-hand side.
pub fn with_text_panel(frame: &Mat, text: &[String]) -> opencv::Result<Mat> {
    let mut panel = Mat::new_rows_cols_with_default(
        frame.rows(),
        PANEL_WIDTH,
        core::CV_8UC3,
        Scalar::all(255.0),
    )?;
    for (i, line) in text.iter().enumerate() {
        imgproc::put_text(
            &mut panel,
            line,
            Point::new(10, LINE_HEIGHT * (i as i32 + 1)),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.5,
            Scalar::all(0.0),
            1,
            imgproc::LINE_AA,
            false,
        )?;
    }

    let mut combined = Mat::default();
    core::hconcat2(frame, &panel, &mut combined)?;
    Ok(combined)
}
