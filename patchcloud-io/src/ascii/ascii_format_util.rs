use anyhow::{bail, Context, Result};
use itertools::Itertools;
use patchcloud_core::{
    containers::PatchKind,
    math::{Color, Point, PointKey},
    nalgebra::Vector3,
};
use std::str::FromStr;

/// First character of an index line
pub(crate) const INDEX_MARKER: char = '%';
/// First characters of comment lines
pub(crate) const COMMENT_MARKERS: [char; 2] = ['#', '/'];
/// Column delimiter used by the writer
pub(crate) const DELIMITER: &str = "\t";

/// A single line of an ASCII patch file
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AsciiLine {
    Empty,
    Comment,
    /// Keys of all patches of one kind. Index lines with an unknown tag hold no kind
    Index(Option<PatchKind>, Vec<PointKey>),
    /// A point, with the key of its patch if the line has one
    Point(Point, Option<PointKey>),
}

fn parse_column<T: FromStr>(columns: &[&str], index: usize, name: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    columns[index]
        .parse()
        .with_context(|| format!("ParseError at parsing {} from '{}'", name, columns[index]))
}

impl AsciiLine {
    /// Parses a line of the form `x y z [r g b [nx ny nz [key]]]`, an index line `% <tag> <key>...` or a
    /// comment. Columns are separated by any whitespace. A missing color is white, a missing or zero normal is
    /// no normal
    pub(crate) fn parse(line: &str) -> Result<Self> {
        let columns = line.split_whitespace().collect::<Vec<_>>();
        let first = match columns.first() {
            Some(first) => *first,
            None => return Ok(AsciiLine::Empty),
        };

        if first.starts_with(INDEX_MARKER) && columns.len() > 1 {
            let kind = columns[1].chars().next().and_then(PatchKind::from_tag);
            let keys = columns[2..]
                .iter()
                .map(|key| {
                    key.parse::<PointKey>()
                        .with_context(|| format!("Invalid patch key '{}' in index line", key))
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(AsciiLine::Index(kind, keys));
        }
        if first.starts_with(&COMMENT_MARKERS[..]) {
            return Ok(AsciiLine::Comment);
        }
        if columns.len() < 3 {
            bail!(
                "A point needs at least 3 coordinates, but the line has {} columns",
                columns.len()
            );
        }

        let mut point = Point::new(
            parse_column(&columns, 0, "x")?,
            parse_column(&columns, 1, "y")?,
            parse_column(&columns, 2, "z")?,
        )
        .with_color(Color::WHITE);
        if columns.len() >= 6 {
            point = point.with_color(Color::new(
                parse_column(&columns, 3, "red")?,
                parse_column(&columns, 4, "green")?,
                parse_column(&columns, 5, "blue")?,
            ));
        }
        if columns.len() >= 9 {
            let normal = Vector3::new(
                parse_column(&columns, 6, "nx")?,
                parse_column(&columns, 7, "ny")?,
                parse_column(&columns, 8, "nz")?,
            );
            if normal != Vector3::zeros() {
                point = point.with_normal(normal);
            }
        }
        let key = if columns.len() >= 10 {
            Some(columns[9].parse::<PointKey>()?)
        } else {
            None
        };
        Ok(AsciiLine::Point(point, key))
    }
}

/// Removes trailing zeros of a formatted decimal number, but keeps one digit after the decimal point
pub(crate) fn trim_unnecessary_tailing_zeros(slice: &str) -> &str {
    if !slice.contains('.') {
        return slice;
    }
    let mut end = slice.len();
    while slice[..end].ends_with('0') && !slice[..end].ends_with(".0") {
        end -= 1;
    }
    &slice[..end]
}

/// Formats `value` with `precision` decimals, or with the shortest representation that reads back to the same
/// value if `precision` is `None`
pub(crate) fn format_value(value: f64, precision: Option<usize>) -> String {
    match precision {
        Some(precision) => {
            trim_unnecessary_tailing_zeros(&format!("{:.1$}", value, precision)).to_string()
        }
        None => value.to_string(),
    }
}

/// Formats a point line `x y z r g b nx ny nz key`
pub(crate) fn format_point(point: &Point, key: &PointKey, precision: Option<usize>) -> String {
    let color = point.color.unwrap_or(Color::WHITE);
    let normal = point.normal.unwrap_or_else(Vector3::zeros);
    [
        format_value(point.x(), precision),
        format_value(point.y(), precision),
        format_value(point.z(), precision),
        color.red.to_string(),
        color.green.to_string(),
        color.blue.to_string(),
        format_value(normal.x, precision),
        format_value(normal.y, precision),
        format_value(normal.z, precision),
        key.to_string(),
    ]
    .join(DELIMITER)
}

/// Formats the index line of `kind`, or returns `None` if `keys` is empty
pub(crate) fn format_index<'a, I: IntoIterator<Item = &'a PointKey>>(
    kind: PatchKind,
    keys: I,
) -> Option<String> {
    let mut keys = keys.into_iter().peekable();
    keys.peek()?;
    Some(format!(
        "{}{}{}{}{}",
        INDEX_MARKER,
        DELIMITER,
        kind.tag(),
        DELIMITER,
        keys.join(DELIMITER)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point_lines() -> Result<()> {
        match AsciiLine::parse("1.5 2 -3")? {
            AsciiLine::Point(point, None) => {
                assert_eq!(Point::new(1.5, 2.0, -3.0), point);
                assert_eq!(Some(Color::WHITE), point.color);
                assert_eq!(None, point.normal);
            }
            other => panic!("Unexpected line {:?}", other),
        }

        match AsciiLine::parse("1\t2\t3\t10\t20\t30\t0\t0\t1\t10000_20000_30000")? {
            AsciiLine::Point(point, Some(key)) => {
                assert_eq!(Some(Color::new(10, 20, 30)), point.color);
                assert_eq!(Some(Vector3::z()), point.normal);
                assert_eq!(point.key(), key);
            }
            other => panic!("Unexpected line {:?}", other),
        }

        match AsciiLine::parse("1 2 3 10 20 30 0 0 0")? {
            AsciiLine::Point(point, None) => assert_eq!(None, point.normal),
            other => panic!("Unexpected line {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_parse_other_lines() -> Result<()> {
        assert_eq!(AsciiLine::Empty, AsciiLine::parse("   ")?);
        assert_eq!(AsciiLine::Comment, AsciiLine::parse("# x y z")?);
        assert_eq!(AsciiLine::Comment, AsciiLine::parse("// header")?);
        assert_eq!(
            AsciiLine::Index(Some(PatchKind::Irregular), vec!["1_-2_3".parse()?]),
            AsciiLine::parse("%\ti\t1_-2_3")?
        );
        assert_eq!(AsciiLine::Index(None, vec![]), AsciiLine::parse("%\tq")?);
        Ok(())
    }

    #[test]
    fn test_parse_errors() {
        assert!(AsciiLine::parse("1 2").is_err());
        assert!(AsciiLine::parse("1 two 3").is_err());
        assert!(AsciiLine::parse("1 2 3 256 0 0").is_err());
        assert!(AsciiLine::parse("%\tr\tnot_a_key").is_err());
    }

    #[test]
    fn test_format_point() {
        let point = Point::new(1.25, -2.0, 0.5).with_color(Color::RED);
        let line = format_point(&point, &point.key(), Some(4));
        assert_eq!("1.25\t-2.0\t0.5\t255\t0\t0\t0.0\t0.0\t0.0\t12500_-20000_5000", line);
        match AsciiLine::parse(&line).unwrap() {
            AsciiLine::Point(read, Some(key)) => {
                assert_eq!(point, read);
                assert_eq!(point.key(), key);
                assert_eq!(None, read.normal);
            }
            other => panic!("Unexpected line {:?}", other),
        }
    }

    #[test]
    fn test_format_index() {
        let keys = vec![
            Point::new(0.0001, 0.0002, 0.0003).key(),
            Point::new(0.0004, 0.0005, 0.0006).key(),
        ];
        assert_eq!(
            Some("%\tr\t1_2_3\t4_5_6".to_string()),
            format_index(PatchKind::Regular, keys.iter())
        );
        assert_eq!(None, format_index(PatchKind::Isolated, vec![].iter()));
    }

    #[test]
    fn test_trim_zeros() {
        assert_eq!("1.5", trim_unnecessary_tailing_zeros("1.50000"));
        assert_eq!("2.0", trim_unnecessary_tailing_zeros("2.00000"));
        assert_eq!("100", trim_unnecessary_tailing_zeros("100"));
    }
}
