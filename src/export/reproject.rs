//! Coordinate reprojection between the grid CRS and an export target.
//!
//! Same-CRS exports pass coordinates through untouched. Real transforms
//! go through the PROJ library and are gated behind the `proj` cargo
//! feature; without it any cross-CRS export fails with a projection error.

use glam::DVec2;

use crate::error::{Error, Result};
use crate::grid::CrsDescriptor;

/// Reproject points in place from the source CRS to the target CRS.
///
/// Rules:
/// - no target requested: pass-through
/// - target equals the source EPSG code: pass-through
/// - source unset but a different target requested: projection error
pub fn reproject_points(
    points: &mut [DVec2],
    source: Option<&CrsDescriptor>,
    target: Option<&CrsDescriptor>,
) -> Result<()> {
    let Some(target) = target else {
        return Ok(());
    };

    let Some(source) = source else {
        return Err(Error::Projection(format!(
            "grid has no CRS set but export to {} was requested",
            target.authority()
        )));
    };

    if source.epsg == target.epsg {
        return Ok(());
    }

    transform(points, source, target)
}

#[cfg(feature = "proj")]
fn transform(points: &mut [DVec2], source: &CrsDescriptor, target: &CrsDescriptor) -> Result<()> {
    use proj::Proj;

    let transformer = Proj::new_known_crs(&source.authority(), &target.authority(), None)
        .map_err(|e| {
            Error::Projection(format!(
                "failed to create transform {} -> {}: {}",
                source.authority(),
                target.authority(),
                e
            ))
        })?;

    for point in points.iter_mut() {
        let (x, y) = transformer.convert((point.x, point.y)).map_err(|e| {
            Error::Projection(format!(
                "transform failed at ({}, {}): {}",
                point.x, point.y, e
            ))
        })?;
        *point = DVec2::new(x, y);
    }

    Ok(())
}

#[cfg(not(feature = "proj"))]
fn transform(
    _points: &mut [DVec2],
    source: &CrsDescriptor,
    target: &CrsDescriptor,
) -> Result<()> {
    Err(Error::Projection(format!(
        "export from {} to {} requires the `proj` feature",
        source.authority(),
        target.authority()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_target_is_pass_through() {
        let mut points = vec![DVec2::new(1.0, 2.0)];
        reproject_points(&mut points, None, None).unwrap();
        assert_eq!(points[0], DVec2::new(1.0, 2.0));
    }

    #[test]
    fn matching_epsg_is_pass_through() {
        let crs = CrsDescriptor::from_epsg(26911);
        let mut points = vec![DVec2::new(3.0, 4.0)];
        reproject_points(&mut points, Some(&crs), Some(&crs)).unwrap();
        assert_eq!(points[0], DVec2::new(3.0, 4.0));
    }

    #[test]
    fn missing_source_crs_fails() {
        let target = CrsDescriptor::from_epsg(26911);
        let mut points = vec![DVec2::ZERO];
        let err = reproject_points(&mut points, None, Some(&target)).unwrap_err();
        assert!(matches!(err, Error::Projection(_)));
    }

    #[cfg(not(feature = "proj"))]
    #[test]
    fn cross_crs_without_proj_feature_fails() {
        let source = CrsDescriptor::from_epsg(4326);
        let target = CrsDescriptor::from_epsg(26911);
        let mut points = vec![DVec2::ZERO];
        let err =
            reproject_points(&mut points, Some(&source), Some(&target)).unwrap_err();
        assert!(matches!(err, Error::Projection(_)));
    }
}
