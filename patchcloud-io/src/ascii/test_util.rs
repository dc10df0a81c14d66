use patchcloud_core::{
    containers::{PatchCloud, PatchKind, PointCloud},
    math::{Color, Point},
    nalgebra::Vector3,
};

/// One patch of every kind, with and without colors and normals
pub(crate) fn test_data_patches() -> PatchCloud {
    let mut patches = PatchCloud::new();
    let regular = (0..10)
        .map(|i| {
            Point::new(i as f64 * 0.1, 0.25, 1.0)
                .with_color(Color::new(10, 20, 30))
                .with_normal(Vector3::new(0.0, 0.6, 0.8))
        })
        .collect::<PointCloud>();
    let irregular = (0..5)
        .map(|i| Point::new(5.0, i as f64 * 0.3, -1.5).with_color(Color::new(200, 100, 0)))
        .collect::<PointCloud>();
    let isolated = vec![Point::new(-7.125, 3.5, 0.0)]
        .into_iter()
        .collect::<PointCloud>();
    patches.add_classified(regular, PatchKind::Regular);
    patches.add_classified(irregular, PatchKind::Irregular);
    patches.add_classified(isolated, PatchKind::Isolated);
    patches
}
