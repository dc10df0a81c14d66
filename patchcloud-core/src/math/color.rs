use std::collections::HashMap;

use lazy_static::lazy_static;

/// Default color bucket size for perceptual color comparisons
pub const DEFAULT_COLOR_ACCURACY: u8 = 69;

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const RED: Color = Color::new(255, 0, 0);
    pub const GREEN: Color = Color::new(0, 255, 0);
    pub const BLUE: Color = Color::new(0, 0, 255);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Reduces each channel to the lower bound of its `accuracy` sized bucket. Two colors that fall into the
    /// same buckets are hard to tell apart for a human observer.
    /// ```
    /// # use patchcloud_core::math::Color;
    /// let a = Color::new(70, 130, 200);
    /// let b = Color::new(100, 137, 206);
    /// assert_eq!(a.as_human_perception(69), b.as_human_perception(69));
    /// assert_eq!(Color::new(69, 69, 138), a.as_human_perception(69));
    /// ```
    ///
    /// An accuracy of zero is treated as one, i.e. the color is returned unchanged.
    pub fn as_human_perception(&self, accuracy: u8) -> Color {
        let accuracy = accuracy.max(1);
        let bucket = |channel: u8| channel / accuracy * accuracy;
        Color::new(bucket(self.red), bucket(self.green), bucket(self.blue))
    }

    /// Looks up a color by its (case insensitive) CSS name
    /// ```
    /// # use patchcloud_core::math::Color;
    /// assert_eq!(Some(Color::new(255, 127, 80)), Color::named("Coral"));
    /// assert_eq!(None, Color::named("not a color"));
    /// ```
    pub fn named(name: &str) -> Option<Color> {
        NAMED_COLORS.get(name.to_lowercase().as_str()).copied()
    }

    pub fn to_array(&self) -> [u8; 3] {
        [self.red, self.green, self.blue]
    }
}

impl From<[u8; 3]> for Color {
    fn from(rgb: [u8; 3]) -> Self {
        Color::new(rgb[0], rgb[1], rgb[2])
    }
}

lazy_static! {
    static ref NAMED_COLORS: HashMap<&'static str, Color> = {
        let colors: &[(&'static str, [u8; 3])] = &[
            ("black", [0, 0, 0]),
            ("white", [255, 255, 255]),
            ("red", [255, 0, 0]),
            ("lime", [0, 255, 0]),
            ("green", [0, 128, 0]),
            ("blue", [0, 0, 255]),
            ("yellow", [255, 255, 0]),
            ("cyan", [0, 255, 255]),
            ("magenta", [255, 0, 255]),
            ("silver", [192, 192, 192]),
            ("gray", [128, 128, 128]),
            ("maroon", [128, 0, 0]),
            ("olive", [128, 128, 0]),
            ("purple", [128, 0, 128]),
            ("teal", [0, 128, 128]),
            ("navy", [0, 0, 128]),
            ("orange", [255, 165, 0]),
            ("coral", [255, 127, 80]),
            ("tomato", [255, 99, 71]),
            ("gold", [255, 215, 0]),
            ("khaki", [240, 230, 140]),
            ("brown", [165, 42, 42]),
            ("chocolate", [210, 105, 30]),
            ("salmon", [250, 128, 114]),
            ("pink", [255, 192, 203]),
            ("violet", [238, 130, 238]),
            ("indigo", [75, 0, 130]),
            ("orchid", [218, 112, 214]),
            ("turquoise", [64, 224, 208]),
            ("skyblue", [135, 206, 235]),
            ("steelblue", [70, 130, 180]),
            ("forestgreen", [34, 139, 34]),
            ("seagreen", [46, 139, 87]),
            ("darkgreen", [0, 100, 0]),
            ("darkblue", [0, 0, 139]),
            ("darkred", [139, 0, 0]),
            ("beige", [245, 245, 220]),
            ("ivory", [255, 255, 240]),
            ("lavender", [230, 230, 250]),
            ("tan", [210, 180, 140]),
        ];
        colors
            .iter()
            .map(|(name, rgb)| (*name, Color::from(*rgb)))
            .collect()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_perception_buckets() {
        let color = Color::new(68, 69, 255);
        assert_eq!(
            Color::new(0, 69, 207),
            color.as_human_perception(DEFAULT_COLOR_ACCURACY)
        );
        assert_eq!(color, color.as_human_perception(1));
        assert_eq!(color, color.as_human_perception(0));
    }

    #[test]
    fn test_named_colors_are_case_insensitive() {
        assert_eq!(Some(Color::RED), Color::named("RED"));
        assert_eq!(Some(Color::BLUE), Color::named("blue"));
        assert_eq!(Color::named("SteelBlue"), Color::named("steelblue"));
    }
}
