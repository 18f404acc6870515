use rtcurve::{
    CurveError,
    Point,
    fit_anchored,
};

fn diagonal(n: usize, scale: f64, offset: f64) -> Vec<Point> {
    (1..=n)
        .map(|i| Point::new(i as f64 * 10.0, i as f64 * 10.0 * scale + offset))
        .collect()
}

#[test]
fn test_anchored_without_points() {
    assert_eq!(
        fit_anchored(&[], Point::new(0.0, 0.0), Point::new(100.0, 100.0), 50).unwrap_err(),
        CurveError::NoPoints
    );
}

#[test]
fn test_anchored_with_zero_bins_is_degenerate() {
    let points = diagonal(5, 1.0, 0.0);
    assert_eq!(
        fit_anchored(&points, Point::new(0.0, 0.0), Point::new(100.0, 100.0), 0).unwrap_err(),
        CurveError::ZeroRange
    );
}

#[test]
fn test_anchored_identity_stays_identity() {
    let points = diagonal(50, 1.0, 0.0);
    let end = Point::new(660.0, 660.0);
    let curve = fit_anchored(&points, Point::new(0.0, 0.0), end, 100).unwrap();

    assert_eq!(curve.knots().first().unwrap().x, 0.0);
    assert_eq!(curve.knots().last().unwrap().x, 660.0);
    for x in [5.0, 100.0, 250.0, 490.0, 640.0] {
        let y = curve.predict(x).unwrap();
        // Knots sit on cell centers, so allow one cell of slack.
        assert!((y - x).abs() < 6.6, "x {} predicted {}", x, y);
    }
}

#[test]
fn test_anchored_shift_is_recovered() {
    // Sample runs 5% late relative to the reference.
    let points: Vec<Point> = (1..=40)
        .map(|i| {
            let reference = i as f64 * 12.0;
            Point::new(reference * 1.05, reference)
        })
        .collect();
    let curve = fit_anchored(&points, Point::new(0.0, 0.0), Point::new(600.0, 600.0), 100).unwrap();
    let y = curve.predict(252.0).unwrap();
    assert!((y - 240.0).abs() < 8.0, "predicted {}", y);
    assert!(curve.is_monotonic());
}

#[test]
fn test_anchored_ignores_points_outside_anchors() {
    let points = vec![Point::new(-5.0, 3.0), Point::new(700.0, 700.0)];
    assert_eq!(
        fit_anchored(&points, Point::new(0.0, 0.0), Point::new(600.0, 600.0), 100).unwrap_err(),
        CurveError::NoPoints
    );
}

#[test]
fn test_anchored_extrapolates_past_right_end() {
    let points = diagonal(10, 1.0, 0.0);
    let curve = fit_anchored(&points, Point::new(0.0, 0.0), Point::new(200.0, 200.0), 50).unwrap();
    match curve.predict(210.0) {
        Err(CurveError::OutOfBounds(y)) => assert!(y > 200.0),
        other => panic!("Expected out of bounds, got {:?}", other),
    }
}

#[test]
fn test_weighted_outlier_does_not_break_monotonicity() {
    let mut points = diagonal(30, 1.0, 0.0);
    points.push(Point {
        x: 150.0,
        y: 20.0,
        weight: 3.0,
    });
    let curve = fit_anchored(&points, Point::new(0.0, 0.0), Point::new(400.0, 400.0), 80).unwrap();
    assert!(curve.is_monotonic());
    assert!(curve.wrmse(points.iter()).is_finite());
}
