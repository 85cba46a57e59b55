use crate::types::{BoundaryArea, DataTable, JoinLevel};
use anyhow::{anyhow, Result};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::Rect;
use image::RgbImage;
use plotters::prelude::*;
use std::ops::Range;

pub const FIGURE_WIDTH: u32 = 1000;
pub const FIGURE_HEIGHT: u32 = 600;

const MARGIN: i32 = 10;
// Vertical band ChartBuilder reserves for the title
const TITLE_BAND: i32 = 40;
const TITLE_FONT_SIZE: i32 = 25;
const CAPTION_FONT_SIZE: i32 = 12;
const CAPTION_COLOR: RGBColor = RGBColor(0x55, 0x55, 0x55);
// Caption anchor: 10% in from the left edge, 8% up from the bottom
const CAPTION_X_FRACTION: f64 = 0.10;
const CAPTION_Y_FRACTION: f64 = 0.08;
const OUTLINE_WIDTH: u32 = 1;

// Endpoints of the sequential blue ramp
const BLUES_LOW: (u8, u8, u8) = (247, 251, 255);
const BLUES_HIGH: (u8, u8, u8) = (8, 48, 107);

/// Linear light-to-dark blue colormap over [0, 1].
fn blues(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(
        lerp(BLUES_LOW.0, BLUES_HIGH.0),
        lerp(BLUES_LOW.1, BLUES_HIGH.1),
        lerp(BLUES_LOW.2, BLUES_HIGH.2),
    )
}

/// Position of a value on the color scale. The scale is anchored to the
/// bounds of the whole input table, so it stays stable even when the
/// join drops rows.
fn scale_position(value: f64, vmin: f64, vmax: f64) -> f64 {
    if vmax > vmin {
        (value - vmin) / (vmax - vmin)
    } else {
        0.0
    }
}

/// Inner join of boundary areas to the table on the chosen key. Areas
/// without a matching row, and rows without a matching area, drop out
/// silently.
pub fn join_areas<'a>(
    areas: &'a [BoundaryArea],
    table: &DataTable,
    variable: &str,
    join: JoinLevel,
) -> Vec<(&'a BoundaryArea, f64)> {
    areas
        .iter()
        .filter_map(|area| {
            table
                .get(area.join_key(join), variable)
                .map(|value| (area, value))
        })
        .collect()
}

/// Render the choropleth figure. Pure with respect to its inputs: the
/// boundary data is passed in, nothing is written to disk, and the
/// figure comes back as an in-memory image.
pub fn render(
    table: &DataTable,
    variable: &str,
    join: JoinLevel,
    title: &str,
    caption: &str,
    areas: &[BoundaryArea],
) -> Result<RgbImage> {
    let (vmin, vmax) = table.column_bounds(variable).ok_or_else(|| {
        anyhow!("Variable '{}' has no numeric values in the input table", variable)
    })?;

    let joined = join_areas(areas, table, variable, join);
    println!("Joined {} of {} boundary areas", joined.len(), areas.len());

    let bbox = joined
        .iter()
        .filter_map(|(area, _)| area.geometry.bounding_rect())
        .reduce(|acc, r| {
            Rect::new(
                geo::Coord {
                    x: acc.min().x.min(r.min().x),
                    y: acc.min().y.min(r.min().y),
                },
                geo::Coord {
                    x: acc.max().x.max(r.max().x),
                    y: acc.max().y.max(r.max().y),
                },
            )
        })
        // Nothing matched: draw an empty frame with title and caption
        .unwrap_or_else(|| Rect::new(geo::Coord { x: 0.0, y: 0.0 }, geo::Coord { x: 1.0, y: 1.0 }));

    let plot_aspect = (FIGURE_WIDTH as i32 - 2 * MARGIN) as f64
        / (FIGURE_HEIGHT as i32 - 2 * MARGIN - TITLE_BAND) as f64;
    let (x_range, y_range) = fit_bounds(bbox, plot_aspect);

    let mut buffer = vec![0u8; (FIGURE_WIDTH * FIGURE_HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (FIGURE_WIDTH, FIGURE_HEIGHT))
            .into_drawing_area();
        root.fill(&WHITE)
            .map_err(|e| anyhow!("Failed to fill figure background: {}", e))?;

        let mut chart = ChartBuilder::on(&root)
            .margin(MARGIN)
            .caption(title, ("sans-serif", TITLE_FONT_SIZE))
            .build_cartesian_2d(x_range, y_range)
            .map_err(|e| anyhow!("Failed to build map axes: {}", e))?;

        // No configure_mesh call: no axis frame, ticks or grid.
        for (area, value) in &joined {
            let color = blues(scale_position(*value, vmin, vmax));
            for polygon in &area.geometry.0 {
                let ring: Vec<(f64, f64)> =
                    polygon.exterior().coords().map(|c| (c.x, c.y)).collect();
                chart
                    .draw_series(std::iter::once(Polygon::new(ring.clone(), color.filled())))
                    .map_err(|e| anyhow!("Failed to draw polygon fill: {}", e))?;
                chart
                    .draw_series(std::iter::once(PathElement::new(
                        ring,
                        color.stroke_width(OUTLINE_WIDTH),
                    )))
                    .map_err(|e| anyhow!("Failed to draw polygon outline: {}", e))?;
            }
        }

        let caption_pos = (
            (FIGURE_WIDTH as f64 * CAPTION_X_FRACTION) as i32,
            (FIGURE_HEIGHT as f64 * (1.0 - CAPTION_Y_FRACTION)) as i32,
        );
        let caption_style = ("sans-serif", CAPTION_FONT_SIZE)
            .into_font()
            .color(&CAPTION_COLOR);
        root.draw(&Text::new(caption.to_string(), caption_pos, caption_style))
            .map_err(|e| anyhow!("Failed to draw caption: {}", e))?;

        root.present()
            .map_err(|e| anyhow!("Failed to finalise figure: {}", e))?;
    }

    RgbImage::from_raw(FIGURE_WIDTH, FIGURE_HEIGHT, buffer)
        .ok_or_else(|| anyhow!("Figure buffer size mismatch"))
}

/// Expand the data bounding box on one axis so it matches the plot
/// area's aspect ratio. The box only ever grows, keeping the map's
/// native proportions.
fn fit_bounds(bbox: Rect<f64>, aspect: f64) -> (Range<f64>, Range<f64>) {
    let mut width = bbox.width();
    let mut height = bbox.height();
    let cx = (bbox.min().x + bbox.max().x) / 2.0;
    let cy = (bbox.min().y + bbox.max().y) / 2.0;

    if width <= 0.0 {
        width = 1.0;
    }
    if height <= 0.0 {
        height = 1.0;
    }

    if width / height < aspect {
        width = height * aspect;
    } else {
        height = width / aspect;
    }

    (
        (cx - width / 2.0)..(cx + width / 2.0),
        (cy - height / 2.0)..(cy + height / 2.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};
    use std::collections::HashMap;

    fn square(x0: f64, y0: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + 1.0, y: y0),
            (x: x0 + 1.0, y: y0 + 1.0),
            (x: x0, y: y0 + 1.0),
            (x: x0, y: y0),
        ]])
    }

    fn borough_areas() -> Vec<BoundaryArea> {
        vec![
            BoundaryArea {
                ward_name: "St James's".to_string(),
                borough: "Westminster".to_string(),
                geometry: square(0.0, 0.0),
            },
            BoundaryArea {
                ward_name: "Holborn".to_string(),
                borough: "Camden".to_string(),
                geometry: square(2.0, 0.0),
            },
        ]
    }

    fn table(entries: &[(&str, f64)]) -> DataTable {
        let mut rows = HashMap::new();
        for (key, value) in entries {
            let mut row = HashMap::new();
            row.insert("value".to_string(), *value);
            rows.insert(key.to_string(), row);
        }
        DataTable { rows }
    }

    #[test]
    fn blues_ramp_endpoints() {
        assert_eq!(blues(0.0), RGBColor(247, 251, 255));
        assert_eq!(blues(1.0), RGBColor(8, 48, 107));
        // out-of-range input clamps
        assert_eq!(blues(-3.0), blues(0.0));
        assert_eq!(blues(7.0), blues(1.0));
    }

    #[test]
    fn scale_position_is_linear_and_handles_flat_data() {
        assert_eq!(scale_position(15.0, 10.0, 20.0), 0.5);
        assert_eq!(scale_position(10.0, 10.0, 20.0), 0.0);
        assert_eq!(scale_position(20.0, 10.0, 20.0), 1.0);
        assert_eq!(scale_position(5.0, 5.0, 5.0), 0.0);
    }

    #[test]
    fn join_is_inner_both_ways() {
        let areas = borough_areas();
        let t = table(&[
            ("Westminster", 10.0),
            ("Camden", 20.0),
            ("Nowhereshire", 99.0),
        ]);

        let joined = join_areas(&areas, &t, "value", JoinLevel::Borough);

        // Nowhereshire has no polygon, so only two rows survive
        assert_eq!(joined.len(), 2);
        assert!(joined.len() <= areas.len().min(t.rows.len()));
        assert!(joined.iter().all(|(a, _)| a.borough != "Nowhereshire"));
    }

    #[test]
    fn join_on_ward_name() {
        let areas = borough_areas();
        let t = table(&[("Holborn", 3.0)]);

        let joined = join_areas(&areas, &t, "value", JoinLevel::WardName);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].0.ward_name, "Holborn");
        assert_eq!(joined[0].1, 3.0);
    }

    #[test]
    fn scale_bounds_come_from_the_whole_table() {
        // Nowhereshire drops out of the join but still widens the scale
        let t = table(&[
            ("Westminster", 5.0),
            ("Camden", 50.0),
            ("Nowhereshire", 100.0),
        ]);
        let (vmin, vmax) = t.column_bounds("value").unwrap();
        assert_eq!((vmin, vmax), (5.0, 100.0));
        assert!(scale_position(50.0, vmin, vmax) < 0.5);
    }

    #[test]
    fn fit_bounds_only_grows_the_box() {
        let bbox = Rect::new(geo::Coord { x: 0.0, y: 0.0 }, geo::Coord { x: 2.0, y: 2.0 });
        let (xs, ys) = fit_bounds(bbox, 2.0);

        assert_eq!(ys, 0.0..2.0);
        // x range widened to 4 units, centered on the box
        assert_eq!(xs, -1.0..3.0);
    }

    #[test]
    fn renders_two_borough_figure() {
        let areas = borough_areas();
        let t = table(&[("Westminster", 10.0), ("Camden", 20.0)]);

        let img = render(&t, "value", JoinLevel::Borough, "Title", "Caption", &areas).unwrap();

        assert_eq!(img.width(), FIGURE_WIDTH);
        assert_eq!(img.height(), FIGURE_HEIGHT);
        // the max-value borough is drawn in the darkest blue
        let dark = blues(1.0);
        assert!(img.pixels().any(|p| p.0 == [dark.0, dark.1, dark.2]));
    }

    #[test]
    fn unmatched_rows_render_without_error() {
        let areas = borough_areas();
        let t = table(&[("Nowhereshire", 1.0)]);

        let img = render(&t, "value", JoinLevel::Borough, "Title", "Caption", &areas).unwrap();
        assert_eq!(img.width(), FIGURE_WIDTH);
    }

    #[test]
    fn missing_variable_is_an_error() {
        let areas = borough_areas();
        let t = table(&[("Camden", 1.0)]);

        assert!(render(&t, "population", JoinLevel::Borough, "T", "C", &areas).is_err());
    }
}
