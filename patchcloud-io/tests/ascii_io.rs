use std::io::Cursor;

use anyhow::Result;
use patchcloud_algorithms::classification::{classify, PatchParameters};
use patchcloud_core::{
    containers::{PatchKind, PointCloud},
    math::{Color, Point},
    nalgebra::Vector3,
};
use patchcloud_io::{
    ascii::{AsciiReader, AsciiWriter},
    base::{read_all, write_all, PatchReader, PatchWriter},
};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_cloud(count: usize, seed: u64) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            Point::new(
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-0.05..0.05),
            )
            .with_color(Color::new(rng.gen(), rng.gen(), rng.gen()))
            .with_normal(Vector3::new(
                rng.gen_range(-0.1..0.1),
                rng.gen_range(-0.1..0.1),
                1.0,
            ))
        })
        .collect()
}

fn small_params() -> PatchParameters {
    PatchParameters {
        max_patch_size: 100,
        irregular_min_size: 4,
        ..Default::default()
    }
}

#[test]
fn test_classified_patches_survive_round_trip() -> Result<()> {
    let expected = classify(&random_cloud(600, 1), &small_params());
    assert!(expected.len() > 1);

    let mut in_memory_buffer: Cursor<Vec<u8>> = Cursor::new(Vec::default());
    {
        let mut writer = AsciiWriter::from_write(&mut in_memory_buffer);
        writer.write(&expected)?;
        writer.flush()?;
    }

    in_memory_buffer.set_position(0);
    let actual = AsciiReader::from_read(in_memory_buffer).read()?;
    actual.validate()?;

    assert_eq!(expected.len(), actual.len());
    assert_eq!(expected.point_count(), actual.point_count());
    for kind in PatchKind::ALL.iter() {
        assert_eq!(expected.keys_of(*kind), actual.keys_of(*kind));
    }
    for (key, patch) in expected.iter() {
        let read = actual.get(key).expect("patch is missing");
        for point in patch.iter() {
            let read_point = read.get(&point.key()).expect("point is missing");
            assert_eq!(point, read_point);
            assert_eq!(point.color, read_point.color);
            assert_eq!(point.normal, read_point.normal);
        }
    }
    Ok(())
}

#[test]
fn test_unclassified_file_is_classified_on_read() -> Result<()> {
    let text = random_cloud(300, 2)
        .iter()
        .map(|point| {
            let color = point.color.unwrap_or(Color::WHITE);
            let normal = point.normal.unwrap_or_else(Vector3::zeros);
            format!(
                "{} {} {} {} {} {} {} {} {}",
                point.x(),
                point.y(),
                point.z(),
                color.red,
                color.green,
                color.blue,
                normal.x,
                normal.y,
                normal.z
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let patches = AsciiReader::from_read(Cursor::new(text))
        .with_parameters(small_params())
        .read()?;
    patches.validate()?;
    assert_eq!(300, patches.point_count());
    assert_eq!(0, patches.unclassified().count());
    Ok(())
}

#[test]
fn test_read_and_write_files() -> Result<()> {
    let expected = classify(&random_cloud(200, 3), &small_params());
    let path = std::env::temp_dir().join(format!("patchcloud_io_test_{}.txt", std::process::id()));
    write_all(&expected, &path)?;
    let actual = read_all(&path, &small_params());
    std::fs::remove_file(&path)?;
    let actual = actual?;
    assert_eq!(expected.len(), actual.len());
    assert_eq!(expected.point_count(), actual.point_count());
    Ok(())
}
